//! Pipeline controller: the one place that owns pipeline state.
//!
//! ## State Machine
//!
//! ```text
//!            select (valid)            generate
//!  Idle ──────────────────▶ FileSelected ────────▶ Encoding
//!   ▲                            ▲                    │
//!   │ reset / 3 s after success  │ select             ▼
//!   │                            │           AwaitingConversion
//!   │                            │                    │
//!   └──── Succeeded ◀── AwaitingPresentation ◀────────┘
//!                              │
//!          any step fails ──▶ Failed ──generate (retry)──▶ Encoding
//! ```
//!
//! A selection passes through `Validating` synchronously. A rejected
//! selection restores whatever was there before.
//!
//! ## Concurrency
//!
//! The controller is cheap to clone; all clones share one state. The lock is
//! never held across an `.await`. Every run gets a generation number, and any
//! `reset` or accepted selection bumps it. A step that finishes under a stale
//! generation is dropped on the floor, which is how a reset during an
//! in-flight call and the delayed auto-reset both stay correct without
//! cancellation.

use crate::config::PipelineConfig;
use crate::error::{Pdf2SlidesError, PipelineError, RejectReason};
use crate::pipeline::dispatch::{capability_from_config, PresentationDispatcher};
use crate::pipeline::encode::encode_document;
use crate::pipeline::input::InputDocument;
use crate::pipeline::remote::{service_from_config, ConversionService};
use crate::pipeline::validate::validate_document;
use crate::progress::SharedObserver;
use crate::state::{DocumentSummary, PipelineState, StatusSnapshot};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Blocking notice raised when `generate` is called with nothing selected.
pub const NO_DOCUMENT_NOTICE: &str = "Please upload a PDF first!";

/// Progress reported once the outline has arrived, before dispatch starts.
const OUTLINE_RECEIVED_PROGRESS: u8 = 70;

/// Result of [`PipelineController::select_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Accepted,
    Rejected(RejectReason),
    /// A run is in flight; the selection was ignored.
    Busy,
}

/// Result of [`PipelineController::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded { slides: usize },
    Failed(PipelineError),
    /// Nothing selected; the user was notified.
    NoDocument,
    /// Another run is in flight; nothing happened.
    Busy,
    /// The run was overtaken by a reset or a new selection; its result
    /// was discarded.
    Abandoned,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }
}

enum Start {
    Busy,
    NoDocument,
    Run(u64, InputDocument),
}

enum Event {
    State { from: PipelineState, to: PipelineState },
    Status { status: String, progress: u8 },
    Notice(String),
}

struct Inner {
    state: PipelineState,
    document: Option<InputDocument>,
    status: String,
    progress: u8,
    run_id: u64,
}

impl Inner {
    fn enter(
        &mut self,
        to: PipelineState,
        status: impl Into<String>,
        progress: u8,
        events: &mut Vec<Event>,
    ) {
        let from = self.state;
        self.state = to;
        self.status = status.into();
        self.progress = progress;
        if from != to {
            info!("Pipeline {} → {}", from, to);
            events.push(Event::State { from, to });
        }
        events.push(Event::Status {
            status: self.status.clone(),
            progress,
        });
    }

    fn clear(&mut self, events: &mut Vec<Event>) {
        self.run_id += 1;
        let already_clear =
            self.state == PipelineState::Idle && self.document.is_none() && self.status.is_empty();
        if already_clear {
            return;
        }
        self.document = None;
        self.enter(PipelineState::Idle, String::new(), 0, events);
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state,
            status: self.status.clone(),
            progress: self.progress,
            in_progress: self.state.is_busy(),
            document: self.document.as_ref().map(|d| DocumentSummary {
                name: d.name().to_string(),
                size: d.size(),
            }),
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    snapshots: watch::Sender<StatusSnapshot>,
    observer: SharedObserver,
    service: Arc<dyn ConversionService>,
    dispatcher: PresentationDispatcher,
    reset_delay: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.snapshots.send_replace(inner.snapshot());
    }

    fn emit(&self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::State { from, to } => self.observer.on_state_change(from, to),
                Event::Status { status, progress } => self.observer.on_status(&status, progress),
                Event::Notice(notice) => self.observer.on_notice(&notice),
            }
        }
    }
}

/// Drives validate → encode → convert → dispatch for one document at a time.
#[derive(Clone)]
pub struct PipelineController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("state", &self.state())
            .field("service", &self.shared.service.name())
            .field("dispatcher", &self.shared.dispatcher)
            .finish()
    }
}

impl PipelineController {
    pub fn new(
        service: Arc<dyn ConversionService>,
        dispatcher: PresentationDispatcher,
        observer: SharedObserver,
        reset_delay: Duration,
    ) -> Self {
        let (snapshots, _) = watch::channel(StatusSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: PipelineState::Idle,
                    document: None,
                    status: String::new(),
                    progress: 0,
                    run_id: 0,
                }),
                snapshots,
                observer,
                service,
                dispatcher,
                reset_delay,
            }),
        }
    }

    /// Build the service and host named in `config`.
    pub fn from_config(
        config: &PipelineConfig,
        observer: SharedObserver,
    ) -> Result<Self, Pdf2SlidesError> {
        let service = service_from_config(config)?;
        let capability = capability_from_config(config)?;
        debug!(
            "Controller: service={}, host={:?}",
            service.name(),
            capability
        );
        Ok(Self::new(
            service,
            PresentationDispatcher::new(capability, config.host_timeout()),
            observer,
            config.reset_delay(),
        ))
    }

    /// Offer a document. Only documents that pass validation are kept.
    pub fn select_file(&self, document: InputDocument) -> Selection {
        let mut events = Vec::new();
        let selection = {
            let mut inner = self.shared.lock();
            if inner.state.is_busy() {
                debug!("Ignoring selection of {}: run in progress", document.name());
                return Selection::Busy;
            }

            let previous = (inner.state, inner.status.clone(), inner.progress);
            inner.enter(PipelineState::Validating, previous.1.clone(), 0, &mut events);

            let selection = match validate_document(&document) {
                Ok(()) => {
                    let status =
                        format!("Selected: {} ({:.2} KB)", document.name(), document.size_kib());
                    inner.run_id += 1;
                    inner.document = Some(document);
                    inner.enter(PipelineState::FileSelected, status, 0, &mut events);
                    Selection::Accepted
                }
                Err(reason) => {
                    warn!("Rejected {}: {}", document.name(), reason);
                    let (state, status, progress) = previous;
                    inner.enter(state, status, progress, &mut events);
                    events.push(Event::Notice(reason.notice()));
                    Selection::Rejected(reason)
                }
            };
            self.shared.publish(&inner);
            selection
        };
        self.shared.emit(events);
        selection
    }

    /// Run the pipeline on the selected document.
    ///
    /// Starts only from `FileSelected` or `Failed`; a retry from `Failed`
    /// reuses the stored document without validating it again.
    pub async fn generate(&self) -> RunOutcome {
        let mut events = Vec::new();
        let start = {
            let mut inner = self.shared.lock();
            match inner.document.clone() {
                _ if inner.state.is_busy() => Start::Busy,
                None => {
                    events.push(Event::Notice(NO_DOCUMENT_NOTICE.to_string()));
                    Start::NoDocument
                }
                Some(_) if !inner.state.can_generate() => Start::Busy,
                Some(doc) => {
                    inner.run_id += 1;
                    inner.enter(PipelineState::Encoding, "Reading PDF file...", 10, &mut events);
                    self.shared.publish(&inner);
                    Start::Run(inner.run_id, doc)
                }
            }
        };
        self.shared.emit(events);

        let (run_id, doc) = match start {
            Start::Busy => {
                debug!("generate ignored: run in progress");
                return RunOutcome::Busy;
            }
            Start::NoDocument => return RunOutcome::NoDocument,
            Start::Run(run_id, doc) => (run_id, doc),
        };

        info!("Generating slides from {} ({} bytes)", doc.name(), doc.size());

        let payload = match encode_document(&doc).await {
            Ok(payload) => payload,
            Err(e) => return self.fail(run_id, e),
        };
        if !self.advance(run_id, PipelineState::AwaitingConversion, "Uploading to server...".into()) {
            return RunOutcome::Abandoned;
        }

        let outline = match self.shared.service.convert(&payload).await {
            Ok(outline) => outline,
            Err(e) => return self.fail(run_id, e),
        };
        drop(payload);
        if !self.report_progress(run_id, OUTLINE_RECEIVED_PROGRESS) {
            return RunOutcome::Abandoned;
        }

        let slides = outline.len();
        info!("Outline received: {} slides, {} images", slides, outline.image_count());
        let status = format!("AI generated {slides} slides. Creating presentation...");
        if !self.advance(run_id, PipelineState::AwaitingPresentation, status) {
            return RunOutcome::Abandoned;
        }

        match self.shared.dispatcher.dispatch(outline).await.into_result() {
            Ok(()) => self.succeed(run_id, slides),
            Err(e) => self.fail(run_id, e),
        }
    }

    /// Return to `Idle`, dropping the document and any in-flight result.
    /// Allowed in every state.
    pub fn reset(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.lock();
            inner.clear(&mut events);
            self.shared.publish(&inner);
        }
        self.shared.emit(events);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.shared.lock().snapshot()
    }

    pub fn state(&self) -> PipelineState {
        self.shared.lock().state
    }

    pub fn status(&self) -> String {
        self.shared.lock().status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_busy()
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Move to the next in-flight state if `run_id` is still current.
    fn advance(&self, run_id: u64, to: PipelineState, status: String) -> bool {
        self.apply(run_id, |inner, events| {
            inner.enter(to, status, to.progress(), events);
        })
    }

    fn report_progress(&self, run_id: u64, progress: u8) -> bool {
        self.apply(run_id, |inner, events| {
            inner.progress = progress;
            events.push(Event::Status {
                status: inner.status.clone(),
                progress,
            });
        })
    }

    fn apply(&self, run_id: u64, f: impl FnOnce(&mut Inner, &mut Vec<Event>)) -> bool {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.lock();
            if inner.run_id != run_id {
                debug!("Dropping result of superseded run {}", run_id);
                return false;
            }
            f(&mut inner, &mut events);
            self.shared.publish(&inner);
        }
        self.shared.emit(events);
        true
    }

    fn fail(&self, run_id: u64, error: PipelineError) -> RunOutcome {
        let notice = error.notice();
        let status = error.status_message();
        let applied = self.apply(run_id, |inner, events| {
            warn!("Run failed ({:?}): {}", error.kind(), error);
            inner.enter(PipelineState::Failed, status, 0, events);
            events.push(Event::Notice(notice));
        });
        if applied {
            RunOutcome::Failed(error)
        } else {
            RunOutcome::Abandoned
        }
    }

    fn succeed(&self, run_id: u64, slides: usize) -> RunOutcome {
        let applied = self.apply(run_id, |inner, events| {
            inner.document = None;
            inner.enter(
                PipelineState::Succeeded,
                "✅ Slides created successfully!",
                PipelineState::Succeeded.progress(),
                events,
            );
        });
        if !applied {
            return RunOutcome::Abandoned;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let controller = self.clone();
                let delay = self.shared.reset_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    controller.auto_reset(run_id);
                });
            }
            Err(_) => debug!("No async runtime; run {} stays in Succeeded until reset", run_id),
        }
        RunOutcome::Succeeded { slides }
    }

    fn auto_reset(&self, run_id: u64) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.lock();
            if inner.run_id != run_id || inner.state != PipelineState::Succeeded {
                return;
            }
            debug!("Auto-reset after success");
            inner.clear(&mut events);
            self.shared.publish(&inner);
        }
        self.shared.emit(events);
    }
}

//! Presentation dispatch: hand the outline to the host and wait for its verdict.
//!
//! Hosts report back through a pair of callbacks — one for success, one for
//! failure — in the style of `withSuccessHandler(...).withFailureHandler(...)`.
//! [`PresentationDispatcher`] folds that pair into exactly one
//! [`DispatchOutcome`]:
//!
//! * both handlers share a one-shot slot; whichever fires first fills it and
//!   any later call is ignored,
//! * if neither fires within the host timeout the outcome is `HostUnavailable`,
//! * if the host drops both handlers without calling either, likewise.
//!
//! Whether a host exists at all is decided by the caller and injected as a
//! [`HostCapability`]. With `Absent` the step is skipped and reported as
//! `Created`, which lets the whole pipeline run outside any host.

use crate::config::{HostTarget, PipelineConfig};
use crate::error::{Pdf2SlidesError, PipelineError};
use crate::outline::SlideOutline;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// The single result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Created,
    CreationFailed { message: String },
    HostUnavailable { message: String },
}

impl DispatchOutcome {
    pub fn into_result(self) -> Result<(), PipelineError> {
        match self {
            DispatchOutcome::Created => Ok(()),
            DispatchOutcome::CreationFailed { message } => {
                Err(PipelineError::CreationFailed { message })
            }
            DispatchOutcome::HostUnavailable { message } => {
                Err(PipelineError::HostUnavailable { message })
            }
        }
    }
}

/// Diagnostic passed to the failure callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFailure {
    pub message: String,
}

impl HostFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

enum HostSignal {
    Success,
    Failure(HostFailure),
}

type Slot = Arc<Mutex<Option<oneshot::Sender<HostSignal>>>>;

/// Fill the shared slot if nobody has yet. Returns whether this call decided
/// the outcome.
fn resolve(slot: &Slot, signal: HostSignal) -> bool {
    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    match sender {
        Some(tx) => tx.send(signal).is_ok(),
        None => {
            debug!("Ignoring host callback: outcome already decided");
            false
        }
    }
}

/// Success callback handed to a host.
pub struct SuccessHandler {
    slot: Slot,
}

impl SuccessHandler {
    /// Report success. Returns `false` if the outcome was already decided
    /// or nobody is waiting any more.
    pub fn call(self) -> bool {
        resolve(&self.slot, HostSignal::Success)
    }
}

/// Failure callback handed to a host.
pub struct FailureHandler {
    slot: Slot,
}

impl FailureHandler {
    /// Report failure. Returns `false` if the outcome was already decided
    /// or nobody is waiting any more.
    pub fn call(self, failure: HostFailure) -> bool {
        resolve(&self.slot, HostSignal::Failure(failure))
    }
}

/// A presentation-creation host with a two-callback completion protocol.
///
/// `run` must return promptly; the actual work happens in the background and
/// ends with a call to one of the handlers.
pub trait PresentationHost: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, outline: SlideOutline, on_success: SuccessHandler, on_failure: FailureHandler);
}

/// Whether a presentation host exists in this environment.
#[derive(Clone)]
pub enum HostCapability {
    Present(Arc<dyn PresentationHost>),
    Absent,
}

impl std::fmt::Debug for HostCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostCapability::Present(h) => write!(f, "Present({})", h.name()),
            HostCapability::Absent => f.write_str("Absent"),
        }
    }
}

/// Build the host capability selected in the configuration.
pub fn capability_from_config(config: &PipelineConfig) -> Result<HostCapability, Pdf2SlidesError> {
    match &config.host {
        HostTarget::None => Ok(HostCapability::Absent),
        HostTarget::AppsScript {
            script_id,
            access_token,
            function,
        } => Ok(HostCapability::Present(Arc::new(AppsScriptHost::new(
            &config.script_api_base,
            script_id.clone(),
            function.clone(),
            access_token.clone(),
        )?))),
        HostTarget::File { path } => {
            Ok(HostCapability::Present(Arc::new(FileHost::new(path.clone()))))
        }
    }
}

/// Adapts a [`PresentationHost`] into a single awaited outcome.
#[derive(Debug, Clone)]
pub struct PresentationDispatcher {
    capability: HostCapability,
    timeout: Duration,
}

impl PresentationDispatcher {
    pub fn new(capability: HostCapability, timeout: Duration) -> Self {
        Self {
            capability,
            timeout,
        }
    }

    pub fn is_host_present(&self) -> bool {
        matches!(self.capability, HostCapability::Present(_))
    }

    /// Send the outline to the host and wait for the first callback.
    pub async fn dispatch(&self, outline: SlideOutline) -> DispatchOutcome {
        let host = match &self.capability {
            HostCapability::Present(host) => Arc::clone(host),
            HostCapability::Absent => {
                debug!(
                    "No presentation host in this environment; skipped creating {} slides",
                    outline.len()
                );
                return DispatchOutcome::Created;
            }
        };

        info!("Dispatching {} slides to host '{}'", outline.len(), host.name());

        let (tx, rx) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(tx)));
        host.run(
            outline,
            SuccessHandler {
                slot: Arc::clone(&slot),
            },
            FailureHandler { slot },
        );

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(HostSignal::Success)) => {
                info!("Host '{}' created the presentation", host.name());
                DispatchOutcome::Created
            }
            Ok(Ok(HostSignal::Failure(failure))) => {
                warn!("Host '{}' failed: {}", host.name(), failure.message);
                DispatchOutcome::CreationFailed {
                    message: failure.message,
                }
            }
            Ok(Err(_)) => {
                warn!("Host '{}' dropped both callbacks", host.name());
                DispatchOutcome::HostUnavailable {
                    message: "host released its callbacks without calling either".to_string(),
                }
            }
            Err(_) => {
                warn!("Host '{}' did not call back within {:?}", host.name(), self.timeout);
                DispatchOutcome::HostUnavailable {
                    message: format!("no callback within {}s", self.timeout.as_secs()),
                }
            }
        }
    }
}

/// Start `work` on the current Tokio runtime, or fail straight away if there
/// is none.
fn spawn_host_work<F>(on_failure: FailureHandler, work: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(work);
        }
        Err(_) => {
            on_failure.call(HostFailure::new("no async runtime to run the host call on"));
        }
    }
}

// ── Apps Script host ─────────────────────────────────────────────────────

/// Runs an Apps Script function through the Apps Script Execution API,
/// passing the outline as its only parameter.
pub struct AppsScriptHost {
    client: reqwest::Client,
    run_url: String,
    function: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScriptRunResponse {
    #[serde(default)]
    error: Option<ScriptError>,
}

#[derive(Debug, Deserialize)]
struct ScriptError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<ScriptErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptErrorDetail {
    #[serde(default)]
    error_message: Option<String>,
}

impl ScriptError {
    fn best_message(&self) -> String {
        self.details
            .iter()
            .find_map(|d| d.error_message.clone())
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "script execution failed".to_string())
    }
}

impl AppsScriptHost {
    pub fn new(
        api_base: &str,
        script_id: String,
        function: String,
        access_token: Option<String>,
    ) -> Result<Self, Pdf2SlidesError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Pdf2SlidesError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            run_url: format!("{}/v1/scripts/{}:run", api_base.trim_end_matches('/'), script_id),
            function,
            access_token,
        })
    }

    pub fn run_url(&self) -> &str {
        &self.run_url
    }
}

impl PresentationHost for AppsScriptHost {
    fn name(&self) -> &str {
        "apps-script"
    }

    fn run(&self, outline: SlideOutline, on_success: SuccessHandler, on_failure: FailureHandler) {
        let mut request = self.client.post(&self.run_url).json(&serde_json::json!({
            "function": self.function,
            "parameters": [outline],
            "devMode": false,
        }));
        if let Some(ref token) = self.access_token {
            request = request.bearer_auth(token);
        }

        let work_failure = FailureHandler {
            slot: Arc::clone(&on_failure.slot),
        };
        spawn_host_work(on_failure, async move {
            let result = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.text().await {
                        Ok(body) => interpret_script_response(status, &body),
                        Err(e) => Err(format!("reading script response: {e}")),
                    }
                }
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(()) => {
                    on_success.call();
                }
                Err(message) => {
                    work_failure.call(HostFailure::new(message));
                }
            }
        });
    }
}

/// Decide success/failure from an Execution API response.
fn interpret_script_response(status: reqwest::StatusCode, body: &str) -> Result<(), String> {
    let parsed = serde_json::from_str::<ScriptRunResponse>(body);
    match parsed {
        Ok(ScriptRunResponse { error: Some(err) }) => Err(err.best_message()),
        Ok(_) if status.is_success() => Ok(()),
        _ if status.is_success() => Err("script response is not JSON".to_string()),
        _ => {
            let hint = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            Err(format!("HTTP {status} {hint}").trim_end().to_string())
        }
    }
}

// ── File host ────────────────────────────────────────────────────────────

/// Writes the outline as pretty-printed JSON. Useful for local runs and for
/// feeding other tooling.
pub struct FileHost {
    path: PathBuf,
}

impl FileHost {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PresentationHost for FileHost {
    fn name(&self) -> &str {
        "file"
    }

    fn run(&self, outline: SlideOutline, on_success: SuccessHandler, on_failure: FailureHandler) {
        let json = match serde_json::to_vec_pretty(&outline) {
            Ok(json) => json,
            Err(e) => {
                on_failure.call(HostFailure::new(format!("serialising outline: {e}")));
                return;
            }
        };
        let path = self.path.clone();
        let work_failure = FailureHandler {
            slot: Arc::clone(&on_failure.slot),
        };
        spawn_host_work(on_failure, async move {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    work_failure.call(HostFailure::new(format!("{}: {e}", parent.display())));
                    return;
                }
            }
            match tokio::fs::write(&path, &json).await {
                Ok(()) => {
                    debug!("Wrote outline to {}", path.display());
                    on_success.call();
                }
                Err(e) => {
                    work_failure.call(HostFailure::new(format!("{}: {e}", path.display())));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::Slide;
    use reqwest::StatusCode;

    fn outline() -> SlideOutline {
        SlideOutline::new(vec![Slide {
            page: 1,
            title: "Intro".into(),
            bullets: vec!["a".into()],
            images: vec![],
        }])
    }

    enum Behaviour {
        SuccessThenFailure,
        FailureThenSuccess,
        Silent,
        DropBoth,
        SucceedLater(Duration),
    }

    struct ScriptedHost {
        behaviour: Behaviour,
        kept: Mutex<Vec<(SuccessHandler, FailureHandler)>>,
    }

    impl ScriptedHost {
        fn capability(behaviour: Behaviour) -> HostCapability {
            HostCapability::Present(Arc::new(ScriptedHost {
                behaviour,
                kept: Mutex::new(Vec::new()),
            }))
        }
    }

    impl PresentationHost for ScriptedHost {
        fn name(&self) -> &str {
            "scripted"
        }

        fn run(&self, _outline: SlideOutline, ok: SuccessHandler, fail: FailureHandler) {
            match self.behaviour {
                Behaviour::SuccessThenFailure => {
                    assert!(ok.call());
                    assert!(!fail.call(HostFailure::new("late")));
                }
                Behaviour::FailureThenSuccess => {
                    assert!(fail.call(HostFailure::new("Slides API disabled")));
                    assert!(!ok.call());
                }
                Behaviour::Silent => self.kept.lock().unwrap().push((ok, fail)),
                Behaviour::DropBoth => {}
                Behaviour::SucceedLater(delay) => {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        ok.call();
                        drop(fail);
                    });
                }
            }
        }
    }

    fn dispatcher(cap: HostCapability) -> PresentationDispatcher {
        PresentationDispatcher::new(cap, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn absent_host_is_created() {
        let d = dispatcher(HostCapability::Absent);
        assert!(!d.is_host_present());
        assert_eq!(d.dispatch(outline()).await, DispatchOutcome::Created);
    }

    #[tokio::test]
    async fn first_callback_wins_success() {
        let d = dispatcher(ScriptedHost::capability(Behaviour::SuccessThenFailure));
        assert_eq!(d.dispatch(outline()).await, DispatchOutcome::Created);
    }

    #[tokio::test]
    async fn first_callback_wins_failure() {
        let d = dispatcher(ScriptedHost::capability(Behaviour::FailureThenSuccess));
        assert_eq!(
            d.dispatch(outline()).await,
            DispatchOutcome::CreationFailed {
                message: "Slides API disabled".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_host_times_out() {
        let d = dispatcher(ScriptedHost::capability(Behaviour::Silent));
        let outcome = d.dispatch(outline()).await;
        assert!(matches!(outcome, DispatchOutcome::HostUnavailable { .. }), "{outcome:?}");
    }

    #[tokio::test]
    async fn dropped_callbacks_are_unavailable() {
        let d = dispatcher(ScriptedHost::capability(Behaviour::DropBoth));
        let outcome = d.dispatch(outline()).await;
        assert!(matches!(outcome, DispatchOutcome::HostUnavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_success_inside_timeout() {
        let d = dispatcher(ScriptedHost::capability(Behaviour::SucceedLater(
            Duration::from_secs(10),
        )));
        assert_eq!(d.dispatch(outline()).await, DispatchOutcome::Created);
    }

    #[tokio::test]
    async fn file_host_writes_outline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/deck.json");
        let d = dispatcher(HostCapability::Present(Arc::new(FileHost::new(path.clone()))));

        assert_eq!(d.dispatch(outline()).await, DispatchOutcome::Created);
        let written: SlideOutline =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, outline());
    }

    #[test]
    fn outcome_maps_to_pipeline_errors() {
        assert_eq!(DispatchOutcome::Created.into_result(), Ok(()));
        assert!(matches!(
            DispatchOutcome::HostUnavailable {
                message: "x".into()
            }
            .into_result(),
            Err(PipelineError::HostUnavailable { .. })
        ));
    }

    #[test]
    fn script_response_success() {
        let body = r#"{"done": true, "response": {"@type": "type.googleapis.com/google.apps.script.v1.ExecutionResponse", "result": null}}"#;
        assert_eq!(interpret_script_response(StatusCode::OK, body), Ok(()));
    }

    #[test]
    fn script_response_prefers_detail_message() {
        let body = r#"{"done": true, "error": {"code": 3, "message": "ScriptError",
            "details": [{"errorMessage": "Exception: Slides quota", "errorType": "ScriptError"}]}}"#;
        assert_eq!(
            interpret_script_response(StatusCode::OK, body),
            Err("Exception: Slides quota".to_string())
        );
    }

    #[test]
    fn script_response_http_error() {
        let body = r#"{"error": {"code": 401, "message": "Request had invalid authentication credentials."}}"#;
        let err = interpret_script_response(StatusCode::UNAUTHORIZED, body).unwrap_err();
        assert!(err.contains("invalid authentication"), "{err}");

        let err = interpret_script_response(StatusCode::BAD_GATEWAY, "oops").unwrap_err();
        assert!(err.starts_with("HTTP 502"), "{err}");
    }

    #[test]
    fn apps_script_run_url() {
        let host = AppsScriptHost::new(
            "https://script.googleapis.com/",
            "abc123".into(),
            "convertPdfToSlide".into(),
            None,
        )
        .unwrap();
        assert_eq!(host.run_url(), "https://script.googleapis.com/v1/scripts/abc123:run");
    }
}

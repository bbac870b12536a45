//! One-shot entry points: resolve an input, run the pipeline once, report.
//!
//! Interactive surfaces hold a [`PipelineController`] and call
//! `select_file` / `generate` / `reset` themselves. Batch callers (the CLI,
//! scripts, tests) just want "this file in, outcome out"; that is what
//! [`convert`] does.

use crate::config::PipelineConfig;
use crate::controller::{PipelineController, RunOutcome, Selection};
use crate::error::{Pdf2SlidesError, PipelineError};
use crate::pipeline::input::{self, InputDocument};
use crate::progress::SharedObserver;
use crate::state::{DocumentSummary, StatusSnapshot};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// What a one-shot run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub document: DocumentSummary,
    /// Slides in the outline, when the run succeeded.
    pub slides: Option<usize>,
    /// Final status snapshot, taken right after the run returned.
    pub snapshot: StatusSnapshot,
    #[serde(skip)]
    pub outcome: RunOutcome,
    pub duration_ms: u64,
}

impl ConversionReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// The run failure, if any.
    pub fn error(&self) -> Option<&PipelineError> {
        match &self.outcome {
            RunOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Generate slides from a PDF path, HTTP(S) URL or data URL.
///
/// # Errors
/// `Err` only when no run could take place: the input could not be resolved,
/// the backend could not be built, or the document was rejected by the
/// validator (`Pdf2SlidesError::Pipeline(PipelineError::Validation(..))`).
/// A run that starts and fails is reported through
/// [`ConversionReport::outcome`].
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
    observer: SharedObserver,
) -> Result<ConversionReport, Pdf2SlidesError> {
    let input_str = input_str.as_ref();
    info!("Starting slide generation: {}", input::truncate(input_str, 80));

    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_document(document, config, observer).await
}

/// Same as [`convert`] for a document that is already in hand.
pub async fn convert_document(
    document: InputDocument,
    config: &PipelineConfig,
    observer: SharedObserver,
) -> Result<ConversionReport, Pdf2SlidesError> {
    let start = Instant::now();
    let controller = PipelineController::from_config(config, observer)?;
    let summary = DocumentSummary {
        name: document.name().to_string(),
        size: document.size(),
    };

    match controller.select_file(document) {
        Selection::Accepted => {}
        Selection::Rejected(reason) => return Err(PipelineError::Validation(reason).into()),
        Selection::Busy => {
            return Err(Pdf2SlidesError::Internal(
                "fresh controller reported a run in progress".into(),
            ))
        }
    }

    let outcome = controller.generate().await;
    let slides = match outcome {
        RunOutcome::Succeeded { slides } => Some(slides),
        _ => None,
    };
    let duration_ms = start.elapsed().as_millis() as u64;
    info!("Run finished in {}ms: {:?}", duration_ms, outcome);

    Ok(ConversionReport {
        document: summary,
        slides,
        snapshot: controller.snapshot(),
        outcome,
        duration_ms,
    })
}

/// Blocking wrapper around [`convert`] for non-async callers.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
    observer: SharedObserver,
) -> Result<ConversionReport, Pdf2SlidesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2SlidesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config, observer))
}

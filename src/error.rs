//! Error types for the pdf2slides library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — a **run** failed. Every variant is terminal for the
//!   current pipeline run and maps to exactly one user-facing status line and
//!   one blocking notice. The controller never lets these escape as panics;
//!   they end up in [`crate::controller::RunOutcome::Failed`].
//!
//! * [`Pdf2SlidesError`] — **setup** failed before a run could even start
//!   (input file missing, download failed, provider not configured, bad
//!   configuration). Returned as `Err` from constructors and from the
//!   one-shot [`crate::convert::convert`] entry point.

use std::path::PathBuf;
use thiserror::Error;

/// Why the validator refused a candidate file.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum RejectReason {
    /// The file is larger than [`crate::pipeline::validate::MAX_FILE_BYTES`].
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// The declared media type is not `application/pdf`.
    #[error("declared media type '{media_type}' is not application/pdf")]
    WrongType { media_type: String },
}

impl RejectReason {
    /// Text of the blocking notice shown when a selection is refused.
    pub fn notice(&self) -> String {
        match self {
            RejectReason::TooLarge { .. } => "File too large! Maximum size is 10MB".to_string(),
            RejectReason::WrongType { .. } => "Please upload a PDF file".to_string(),
        }
    }
}

/// Coarse classification of a [`PipelineError`], handy for matching and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    ValidationRejected,
    EncodingFailed,
    ServiceUnavailable,
    QuotaExceeded,
    ExtractionFailed,
    ConversionRejected,
    MalformedResponse,
    CreationFailed,
    HostUnavailable,
}

/// Every way a single pipeline run can fail.
///
/// Remote and host failures are classified once, at the client boundary
/// ([`crate::pipeline::remote`] and [`crate::pipeline::dispatch`]), and are
/// passed through the controller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PipelineError {
    // ── Local errors ──────────────────────────────────────────────────────
    #[error("File rejected: {0}")]
    Validation(RejectReason),

    /// Reading the document content failed.
    #[error("Could not read the PDF: {detail}")]
    EncodingFailed { detail: String },

    // ── Remote conversion errors ──────────────────────────────────────────
    /// Transport-level failure: no structured response at all.
    #[error("Conversion service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Provider-side rate or usage limit.
    #[error("Conversion quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// The document had no extractable text (typically a scanned image).
    #[error("Text extraction failed: {message}")]
    ExtractionFailed { message: String },

    /// A structured error from the service that matched no specific class.
    #[error("Conversion service error: {message}")]
    ConversionRejected { message: String },

    /// The call completed but returned no usable outline.
    #[error("Malformed conversion response: {message}")]
    MalformedResponse { message: String },

    // ── Presentation host errors ──────────────────────────────────────────
    /// The host invoked its failure callback.
    #[error("Presentation creation failed: {message}")]
    CreationFailed { message: String },

    /// The host never answered (timeout or dropped callbacks).
    #[error("Presentation host unavailable: {message}")]
    HostUnavailable { message: String },
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Validation(_) => FailureKind::ValidationRejected,
            PipelineError::EncodingFailed { .. } => FailureKind::EncodingFailed,
            PipelineError::ServiceUnavailable { .. } => FailureKind::ServiceUnavailable,
            PipelineError::QuotaExceeded { .. } => FailureKind::QuotaExceeded,
            PipelineError::ExtractionFailed { .. } => FailureKind::ExtractionFailed,
            PipelineError::ConversionRejected { .. } => FailureKind::ConversionRejected,
            PipelineError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            PipelineError::CreationFailed { .. } => FailureKind::CreationFailed,
            PipelineError::HostUnavailable { .. } => FailureKind::HostUnavailable,
        }
    }

    /// The status line shown while the pipeline sits in `Failed`.
    ///
    /// Each kind renders a distinct template so a status alone is enough to
    /// tell failures apart.
    pub fn status_message(&self) -> String {
        match self {
            PipelineError::Validation(reason) => format!("❌ {}", reason.notice()),
            PipelineError::EncodingFailed { detail } => {
                format!("❌ Could not read PDF file: {detail}")
            }
            PipelineError::ServiceUnavailable { message } => {
                format!("❌ Conversion service unavailable: {message}")
            }
            PipelineError::QuotaExceeded { .. } => "❌ OpenAI API quota exceeded".to_string(),
            PipelineError::ExtractionFailed { .. } => {
                "❌ Could not extract text from PDF".to_string()
            }
            PipelineError::ConversionRejected { message } => format!("❌ Error: {message}"),
            PipelineError::MalformedResponse { .. } => {
                "❌ No data received from conversion service".to_string()
            }
            PipelineError::CreationFailed { .. } => {
                "❌ Error creating slides in the presentation host".to_string()
            }
            PipelineError::HostUnavailable { .. } => {
                "❌ Presentation host did not respond".to_string()
            }
        }
    }

    /// The blocking notice raised alongside the status update.
    pub fn notice(&self) -> String {
        match self {
            PipelineError::Validation(reason) => reason.notice(),
            PipelineError::EncodingFailed { detail } => format!("Could not read PDF file: {detail}"),
            PipelineError::ServiceUnavailable { message } => {
                format!("The conversion service could not be reached: {message}")
            }
            PipelineError::QuotaExceeded { .. } => {
                "OpenAI API quota exceeded. Please try again later.".to_string()
            }
            PipelineError::ExtractionFailed { .. } => {
                "Could not extract text from PDF. It might be a scanned image.".to_string()
            }
            PipelineError::ConversionRejected { message } => format!("Error: {message}"),
            PipelineError::MalformedResponse { message } => format!("Error: {message}"),
            PipelineError::CreationFailed { message } => format!("Error creating slides: {message}"),
            PipelineError::HostUnavailable { message } => {
                format!("The presentation host did not respond: {message}")
            }
        }
    }
}

impl From<RejectReason> for PipelineError {
    fn from(reason: RejectReason) -> Self {
        PipelineError::Validation(reason)
    }
}

/// Fatal errors raised before or around a pipeline run.
#[derive(Debug, Error)]
pub enum Pdf2SlidesError {
    // ── Input errors ──────────────────────────────────────────────────────
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a file path, a URL nor a data URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The configured LLM provider could not be created (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Config errors ─────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Run errors ────────────────────────────────────────────────────────
    /// The pipeline ran and failed; see the inner error for the class.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn every_kind() -> Vec<PipelineError> {
        let m = || "boom".to_string();
        vec![
            PipelineError::Validation(RejectReason::TooLarge {
                size: 11,
                limit: 10,
            }),
            PipelineError::Validation(RejectReason::WrongType {
                media_type: "text/plain".into(),
            }),
            PipelineError::EncodingFailed { detail: m() },
            PipelineError::ServiceUnavailable { message: m() },
            PipelineError::QuotaExceeded { message: m() },
            PipelineError::ExtractionFailed { message: m() },
            PipelineError::ConversionRejected { message: m() },
            PipelineError::MalformedResponse { message: m() },
            PipelineError::CreationFailed { message: m() },
            PipelineError::HostUnavailable { message: m() },
        ]
    }

    #[test]
    fn status_messages_are_distinct_and_non_empty() {
        let statuses: Vec<String> = every_kind().iter().map(|e| e.status_message()).collect();
        assert!(statuses.iter().all(|s| !s.trim().is_empty()));
        let unique: HashSet<&String> = statuses.iter().collect();
        assert_eq!(unique.len(), statuses.len(), "got: {statuses:?}");
    }

    #[test]
    fn quota_notice_matches_ui_wording() {
        let e = PipelineError::QuotaExceeded {
            message: "quota exceeded for project".into(),
        };
        assert_eq!(e.kind(), FailureKind::QuotaExceeded);
        assert!(e.notice().contains("try again later"));
    }

    #[test]
    fn creation_failed_notice_carries_diagnostic() {
        let e = PipelineError::CreationFailed {
            message: "Slides API disabled".into(),
        };
        assert_eq!(e.notice(), "Error creating slides: Slides API disabled");
    }

    #[test]
    fn pipeline_error_converts_into_fatal_error() {
        let fatal: Pdf2SlidesError = PipelineError::HostUnavailable {
            message: "timeout".into(),
        }
        .into();
        assert!(fatal.to_string().contains("timeout"));
    }

    #[test]
    fn reject_reason_display() {
        let e = RejectReason::TooLarge {
            size: 11_534_336,
            limit: 10_485_760,
        };
        assert!(e.to_string().contains("11534336"));
    }
}

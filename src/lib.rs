//! # pdf2slides
//!
//! Turn a PDF into a slide outline with an AI service, then hand the outline
//! to a presentation host that builds the deck.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     local path, HTTP(S) URL, bytes or data URL
//!  ├─ 2. Validate  application/pdf, at most 10 MiB
//!  ├─ 3. Encode    base64, no data-URL prefix
//!  ├─ 4. Convert   callable function or direct multimodal LLM → SlideOutline
//!  └─ 5. Dispatch  Apps Script / JSON file / no host → Created | Failed
//! ```
//!
//! [`PipelineController`] sequences the steps, owns the only mutable state,
//! and classifies every failure into one [`PipelineError`] kind with its own
//! status line.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2slides::{convert, NoopObserver, PipelineConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // With no host configured the outline is produced and dropped.
//!     let config = PipelineConfig::builder()
//!         .callable_url("http://localhost:5001/my-project/us-central1/convertPdfToSlides")
//!         .build()?;
//!     let report = convert("deck.pdf", &config, Arc::new(NoopObserver)).await?;
//!     println!("{}", report.snapshot.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2slides` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! pdf2slides = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod outline;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod state;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{HostTarget, PipelineConfig, PipelineConfigBuilder, ServiceBackend};
pub use controller::{PipelineController, RunOutcome, Selection};
pub use convert::{convert, convert_document, convert_sync, ConversionReport};
pub use error::{FailureKind, Pdf2SlidesError, PipelineError, RejectReason};
pub use outline::{OutlineMetadata, Slide, SlideImage, SlideOutline};
pub use pipeline::dispatch::{
    DispatchOutcome, FailureHandler, HostCapability, HostFailure, PresentationDispatcher,
    PresentationHost, SuccessHandler,
};
pub use pipeline::input::InputDocument;
pub use pipeline::remote::ConversionService;
pub use progress::{NoopObserver, PipelineObserver, SharedObserver};
pub use state::{DocumentSummary, PipelineState, StatusSnapshot};
pub use stream::{run_stream, status_stream, StatusStream};

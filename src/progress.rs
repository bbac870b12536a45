//! Observer trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] when constructing a
//! [`crate::controller::PipelineController`] to receive every state change,
//! status update and blocking notice as the pipeline runs.
//!
//! Callers forward events wherever their surface lives — a terminal progress
//! bar, a WebSocket, a GUI dialog — without the library knowing anything about
//! it. For a pull-style alternative see [`crate::stream::status_stream`].
//!
//! # Example
//!
//! ```rust
//! use pdf2slides::PipelineObserver;
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct NoticeLog {
//!     notices: Mutex<Vec<String>>,
//! }
//!
//! impl PipelineObserver for NoticeLog {
//!     fn on_notice(&self, notice: &str) {
//!         self.notices.lock().unwrap().push(notice.to_string());
//!     }
//! }
//!
//! let observer: Arc<dyn PipelineObserver> = Arc::new(NoticeLog::default());
//! observer.on_notice("Please upload a PDF file");
//! ```

use crate::state::PipelineState;
use std::sync::Arc;

/// Called by the controller as the pipeline moves.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events are delivered after the controller released
/// its internal lock, so implementations may call back into the controller.
pub trait PipelineObserver: Send + Sync {
    /// Called on every state transition, including the transient
    /// `Validating` step of a selection.
    fn on_state_change(&self, from: PipelineState, to: PipelineState) {
        let _ = (from, to);
    }

    /// Called whenever the status line or progress changes.
    ///
    /// # Arguments
    /// * `status`   — the new status line (empty after a reset)
    /// * `progress` — 0–100
    fn on_status(&self, status: &str, progress: u8) {
        let _ = (status, progress);
    }

    /// Called when the user must be told something that blocks the flow:
    /// a rejected selection, a failed run, or a generate without a file.
    fn on_notice(&self, notice: &str) {
        let _ = notice;
    }
}

/// A no-op observer; the default when none is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias for the type the controller stores.
pub type SharedObserver = Arc<dyn PipelineObserver>;

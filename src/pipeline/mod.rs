//! Pipeline stages for PDF-to-slides generation.
//!
//! Each submodule implements exactly one step. The controller in
//! [`crate::controller`] sequences them and owns all state; the stages
//! themselves keep none.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ validate ──▶ encode ──▶ remote/llm ──▶ dispatch
//! (path/URL)  (type+size)  (base64)   (outline)     (host)
//! ```
//!
//! 1. [`input`]    — describe the user-supplied path, URL or data URL
//! 2. [`validate`] — accept only PDFs up to 10 MiB
//! 3. [`encode`]   — base64 the bytes with no transport prefix
//! 4. [`remote`]   — the conversion service seam, plus the callable backend;
//!    [`llm`] is the direct-model backend, with [`postprocess`] cleaning its
//!    replies
//! 5. [`dispatch`] — hand the outline to a presentation host, if any

pub mod dispatch;
pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod remote;
pub mod validate;

//! The structured slide outline exchanged between the AI service and the
//! presentation host.
//!
//! The JSON shape is fixed by both collaborators, so field names here follow
//! the wire format rather than Rust naming where the two differ.

use serde::{Deserialize, Serialize};

/// An ordered sequence of slides produced by the conversion service.
///
/// Once received, an outline is only ever read; the dispatch client takes it
/// by value so nothing can touch it after hand-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideOutline {
    pub slides: Vec<Slide>,

    /// Service-side statistics, when the service sent an envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<OutlineMetadata>,
}

impl SlideOutline {
    pub fn new(slides: Vec<Slide>) -> Self {
        Self {
            slides,
            metadata: None,
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Total number of embedded images across all slides.
    pub fn image_count(&self) -> usize {
        self.slides.iter().map(|s| s.images.len()).sum()
    }
}

/// One slide: a title, bullets, and optional images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-indexed page/order number. Defaults to 0 when the service omits it.
    #[serde(default)]
    pub page: u32,
    pub title: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default)]
    pub images: Vec<SlideImage>,
}

/// An image embedded in a slide, carried as base64 bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideImage {
    #[serde(rename = "base64")]
    pub data: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Statistics some services attach next to the slides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineMetadata {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub pages_processed: Option<u32>,
    #[serde(default)]
    pub slides_generated: Option<u32>,
}

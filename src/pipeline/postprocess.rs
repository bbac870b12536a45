//! Post-processing: deterministic clean-up of LLM outline replies.
//!
//! Even well-prompted models wrap JSON in ```json fences, prepend a sentence
//! of chatter, or write bullets as `- item`. These rules fix such quirks
//! before and after parsing without touching content. Each rule is a small
//! pure function so it can be tested on its own.
//!
//! ## Rule Order
//!
//! On the raw reply: strip invisible characters, then outer fences, then cut
//! to the outermost JSON object. On the parsed outline: trim titles, strip
//! bullet markers, drop empty bullets, number unnumbered slides.

use crate::outline::SlideOutline;
use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a raw model reply down to the JSON text it should contain.
pub fn clean_outline_reply(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = strip_code_fences(&s);
    extract_json_object(&s)
}

/// Normalise a parsed outline in place.
pub fn tidy_outline(outline: &mut SlideOutline) {
    for (idx, slide) in outline.slides.iter_mut().enumerate() {
        slide.title = slide.title.trim().to_string();
        slide.bullets = slide
            .bullets
            .iter()
            .map(|b| strip_bullet_marker(b))
            .filter(|b| !b.is_empty())
            .collect();
        if slide.page == 0 {
            slide.page = idx as u32 + 1;
        }
    }
}

// ── Rule 1: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'))
        .collect()
}

// ── Rule 2: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule 3: Cut to the outermost JSON object ─────────────────────────────────

fn extract_json_object(input: &str) -> String {
    match (input.find('{'), input.rfind('}')) {
        (Some(start), Some(end)) if start < end => input[start..=end].to_string(),
        _ => input.trim().to_string(),
    }
}

// ── Rule 4: Bullet markers ───────────────────────────────────────────────────

static RE_BULLET_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•‣◦]|\d+[.)])\s+").unwrap());

fn strip_bullet_marker(bullet: &str) -> String {
    RE_BULLET_MARKER.replace(bullet, "").trim().to_string()
}

//! System prompt for the direct-LLM conversion backend.
//!
//! Keeping the prompt here means changing the outline contract touches one
//! place, and unit tests can inspect it without calling a model. Callers can
//! override it via [`crate::config::PipelineConfig::system_prompt`].

/// Default system prompt asking the model for a JSON slide outline.
pub const SLIDES_SYSTEM_PROMPT: &str = r#"You are an expert presentation designer. The attached PDF must be turned into a slide deck outline.

Follow these rules precisely:

1. STRUCTURE
   - One slide per major topic, in the document's reading order
   - Number slides with "page", starting at 1
   - Each slide has a short "title" (at most 8 words)
   - Each slide has 2 to 5 "bullets", each a single concise sentence

2. CONTENT
   - Use only facts present in the document
   - Do not repeat the same bullet on several slides
   - Leave "images" as an empty list

3. FAILURE
   - If the document has no extractable text, reply exactly:
     {"error": "Could not extract text from PDF"}

4. OUTPUT FORMAT
   - Output ONLY JSON matching:
     {"slides": [{"page": 1, "title": "...", "bullets": ["..."], "images": []}]}
   - Do NOT wrap in ```json fences
   - Do NOT add commentary or explanations"#;

/// User-turn text sent alongside the PDF attachment.
pub const SLIDES_USER_PROMPT: &str = "Create the slide outline for this document.";

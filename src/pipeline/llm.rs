//! Direct-LLM conversion backend.
//!
//! Sends the encoded PDF as an inline attachment to a multimodal model and
//! parses its JSON reply into a [`SlideOutline`]. All prompt wording lives in
//! [`crate::prompts`]; all reply clean-up lives in
//! [`crate::pipeline::postprocess`]. One call per run, no retries: a failed
//! call is classified and returned.

use crate::config::PipelineConfig;
use crate::error::{Pdf2SlidesError, PipelineError};
use crate::outline::SlideOutline;
use crate::pipeline::encode::EncodedPayload;
use crate::pipeline::input::PDF_MEDIA_TYPE;
use crate::pipeline::postprocess::clean_outline_reply;
use crate::pipeline::remote::{classify_failure, ensure_payload, outline_from_value, ConversionService};
use crate::prompts::{SLIDES_SYSTEM_PROMPT, SLIDES_USER_PROMPT};
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError, ProviderFactory,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Conversion service backed by an `edgequake-llm` provider.
pub struct LlmService {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    timeout: Duration,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| SLIDES_SYSTEM_PROMPT.to_string()),
            options: build_options(config),
            timeout: config.service_timeout(),
        }
    }

    /// Resolve the provider from the configuration or environment.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, Pdf2SlidesError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn call(&self, payload: &EncodedPayload) -> Result<SlideOutline, PipelineError> {
        ensure_payload(payload)?;

        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user_with_images(
                SLIDES_USER_PROMPT,
                vec![ImageData::new(payload.as_str().to_string(), PDF_MEDIA_TYPE)],
            ),
        ];

        info!("Requesting slide outline from LLM ({} chars attached)", payload.len());
        let start = Instant::now();

        let response = tokio::time::timeout(self.timeout, self.provider.chat(&messages, Some(&self.options)))
            .await
            .map_err(|_| PipelineError::ServiceUnavailable {
                message: format!("no response within {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| {
                warn!("LLM call failed: {}", e);
                classify_llm_error(e)
            })?;

        debug!(
            "LLM replied: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        parse_outline_reply(&response.content)
    }
}

impl ConversionService for LlmService {
    fn name(&self) -> &str {
        "llm"
    }

    fn convert<'a>(
        &'a self,
        payload: &'a EncodedPayload,
    ) -> BoxFuture<'a, Result<SlideOutline, PipelineError>> {
        Box::pin(self.call(payload))
    }
}

/// Parse the model's reply text into an outline.
pub fn parse_outline_reply(reply: &str) -> Result<SlideOutline, PipelineError> {
    let cleaned = clean_outline_reply(reply);
    if cleaned.is_empty() {
        return Err(PipelineError::MalformedResponse {
            message: "model returned an empty reply".to_string(),
        });
    }
    let value: serde_json::Value =
        serde_json::from_str(&cleaned).map_err(|e| PipelineError::MalformedResponse {
            message: format!("model reply is not JSON: {e}"),
        })?;
    let mut outline = outline_from_value(value)?;
    crate::pipeline::postprocess::tidy_outline(&mut outline);
    Ok(outline)
}

/// Map a provider error onto the failure taxonomy.
///
/// Transport and rate-limit variants are classified by type; everything
/// else goes through the message heuristics.
fn classify_llm_error(err: LlmError) -> PipelineError {
    match err {
        LlmError::NetworkError(message) => PipelineError::ServiceUnavailable { message },
        LlmError::Timeout => PipelineError::ServiceUnavailable {
            message: "provider request timed out".to_string(),
        },
        LlmError::RateLimited(message) => PipelineError::QuotaExceeded { message },
        other => classify_failure(None, other.to_string()),
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider + model** (`config.provider_name`)
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **OpenAI key present** (`OPENAI_API_KEY`)
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, Pdf2SlidesError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-mini");
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2SlidesError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY or OPENAI_API_KEY, or pass --endpoint to use a conversion function.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2SlidesError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2SlidesError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[test]
    fn network_errors_are_service_unavailable() {
        let err = classify_llm_error(LlmError::NetworkError(
            "error sending request for url (http://127.0.0.1:9/api/chat)".into(),
        ));
        assert_eq!(err.kind(), FailureKind::ServiceUnavailable);
        assert!(err.to_string().contains("127.0.0.1:9"));
    }

    #[test]
    fn timeouts_are_service_unavailable() {
        let err = classify_llm_error(LlmError::Timeout);
        assert_eq!(err.kind(), FailureKind::ServiceUnavailable);
    }

    #[test]
    fn rate_limits_are_quota_exceeded() {
        let err = classify_llm_error(LlmError::RateLimited("slow down".into()));
        assert_eq!(err.kind(), FailureKind::QuotaExceeded);
    }

    #[test]
    fn other_provider_errors_use_message_rules() {
        let err = classify_llm_error(LlmError::ApiError("You exceeded your current quota".into()));
        assert_eq!(err.kind(), FailureKind::QuotaExceeded);
        let err = classify_llm_error(LlmError::ProviderError("model overloaded".into()));
        assert_eq!(err.kind(), FailureKind::ConversionRejected);
    }

    #[test]
    fn parses_fenced_reply() {
        let reply = "```json\n{\"slides\": [{\"page\": 1, \"title\": \" Intro \", \"bullets\": [\"- one\", \"\"]}]}\n```";
        let outline = parse_outline_reply(reply).expect("parses");
        assert_eq!(outline.slides[0].title, "Intro");
        assert_eq!(outline.slides[0].bullets, vec!["one".to_string()]);
    }

    #[test]
    fn extraction_reply_is_classified() {
        let err = parse_outline_reply(r#"{"error": "Could not extract text from PDF"}"#).unwrap_err();
        assert_eq!(err.kind(), FailureKind::ExtractionFailed);
    }

    #[test]
    fn prose_reply_is_malformed() {
        let err = parse_outline_reply("Sure! Here are your slides.").unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedResponse);
        let err = parse_outline_reply("   ").unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedResponse);
    }
}

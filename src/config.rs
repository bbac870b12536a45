//! Configuration for the conversion pipeline.
//!
//! All behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The builder lets callers set only what they
//! care about and rely on documented defaults for the rest.

use crate::error::Pdf2SlidesError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Which conversion service turns the encoded PDF into an outline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ServiceBackend {
    /// Call an LLM provider directly with the PDF attached. (default)
    #[default]
    Llm,
    /// POST to an HTTPS callable function at this URL.
    Callable { url: String },
}

/// Which presentation host receives the outline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostTarget {
    /// No host in this environment; the dispatch step is skipped. (default)
    #[default]
    None,
    /// Apps Script Execution API.
    AppsScript {
        script_id: String,
        /// Opaque OAuth bearer token, obtained elsewhere.
        access_token: Option<String>,
        /// Apps Script function to run. Default: `convertPdfToSlide`.
        function: String,
    },
    /// Write the outline as JSON to a file.
    File { path: PathBuf },
}

/// Default Apps Script function name invoked with the outline.
pub const DEFAULT_SCRIPT_FUNCTION: &str = "convertPdfToSlide";

/// Configuration for a pipeline controller.
///
/// # Example
/// ```rust
/// use pdf2slides::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .callable_url("https://us-central1-demo.cloudfunctions.net/convertPdfToSlides")
///     .host_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Conversion backend. Default: [`ServiceBackend::Llm`].
    pub service: ServiceBackend,

    /// Presentation host. Default: [`HostTarget::None`].
    pub host: HostTarget,

    /// LLM model identifier, e.g. "gemini-2.5-flash". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini"). If None, auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the outline completion. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate for the outline. Default: 8192.
    ///
    /// A 40-slide outline with four bullets each is roughly 3 000 tokens;
    /// the headroom covers verbose models.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses [`crate::prompts::SLIDES_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Timeout for the single conversion call, in seconds. Default: 120.
    pub service_timeout_secs: u64,

    /// How long to wait for the host's callback, in seconds. Default: 360.
    ///
    /// Matches the Apps Script execution ceiling of six minutes; past that
    /// the host will never answer.
    pub host_timeout_secs: u64,

    /// Delay before a succeeded pipeline resets itself to Idle. Default: 3000.
    pub reset_delay_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Base URL of the Apps Script API. Default: `https://script.googleapis.com`.
    pub script_api_base: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            service: ServiceBackend::default(),
            host: HostTarget::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 8192,
            system_prompt: None,
            service_timeout_secs: 120,
            host_timeout_secs: 360,
            reset_delay_ms: 3000,
            download_timeout_secs: 120,
            script_api_base: "https://script.googleapis.com".to_string(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = match &self.host {
            HostTarget::None => "none".to_string(),
            HostTarget::AppsScript {
                script_id, function, ..
            } => format!("apps-script:{script_id}/{function}"),
            HostTarget::File { path } => format!("file:{}", path.display()),
        };
        f.debug_struct("PipelineConfig")
            .field("service", &self.service)
            .field("host", &host)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("service_timeout_secs", &self.service_timeout_secs)
            .field("host_timeout_secs", &self.host_timeout_secs)
            .field("reset_delay_ms", &self.reset_delay_ms)
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    pub fn host_timeout(&self) -> Duration {
        Duration::from_secs(self.host_timeout_secs)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn service(mut self, backend: ServiceBackend) -> Self {
        self.config.service = backend;
        self
    }

    /// Shorthand for `service(ServiceBackend::Callable { url })`.
    pub fn callable_url(mut self, url: impl Into<String>) -> Self {
        self.config.service = ServiceBackend::Callable { url: url.into() };
        self
    }

    pub fn host(mut self, host: HostTarget) -> Self {
        self.config.host = host;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn service_timeout_secs(mut self, secs: u64) -> Self {
        self.config.service_timeout_secs = secs;
        self
    }

    pub fn host_timeout_secs(mut self, secs: u64) -> Self {
        self.config.host_timeout_secs = secs;
        self
    }

    pub fn reset_delay_ms(mut self, ms: u64) -> Self {
        self.config.reset_delay_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn script_api_base(mut self, base: impl Into<String>) -> Self {
        self.config.script_api_base = base.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Pdf2SlidesError> {
        let c = &self.config;
        if c.service_timeout_secs == 0 {
            return Err(Pdf2SlidesError::InvalidConfig(
                "service timeout must be ≥ 1s".into(),
            ));
        }
        if c.host_timeout_secs == 0 {
            return Err(Pdf2SlidesError::InvalidConfig(
                "host timeout must be ≥ 1s".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Pdf2SlidesError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let ServiceBackend::Callable { url } = &c.service {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Pdf2SlidesError::InvalidConfig(format!(
                    "callable URL must be http(s), got '{url}'"
                )));
            }
        }
        if let HostTarget::AppsScript {
            script_id, function, ..
        } = &c.host
        {
            if script_id.trim().is_empty() || function.trim().is_empty() {
                return Err(Pdf2SlidesError::InvalidConfig(
                    "Apps Script host needs a script id and a function name".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.service, ServiceBackend::Llm);
        assert_eq!(c.host, HostTarget::None);
        assert_eq!(c.reset_delay(), Duration::from_secs(3));
        assert_eq!(c.host_timeout(), Duration::from_secs(360));
        assert_eq!(c.service_timeout_secs, 120);
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = PipelineConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn rejects_zero_timeouts() {
        assert!(PipelineConfig::builder().host_timeout_secs(0).build().is_err());
        assert!(PipelineConfig::builder()
            .service_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn rejects_non_http_callable_url() {
        let err = PipelineConfig::builder()
            .callable_url("ftp://example.com/fn")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp://"));
    }

    #[test]
    fn rejects_blank_script_id() {
        let err = PipelineConfig::builder()
            .host(HostTarget::AppsScript {
                script_id: " ".into(),
                access_token: None,
                function: DEFAULT_SCRIPT_FUNCTION.into(),
            })
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn debug_hides_provider_and_token() {
        let c = PipelineConfig::builder()
            .host(HostTarget::AppsScript {
                script_id: "abc".into(),
                access_token: Some("secret-token".into()),
                function: DEFAULT_SCRIPT_FUNCTION.into(),
            })
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("apps-script:abc/convertPdfToSlide"));
        assert!(!dbg.contains("secret-token"));
    }
}

//! Remote conversion: encoded PDF in, slide outline out.
//!
//! Every backend implements [`ConversionService`] and performs exactly one
//! remote invocation per call — no retries. Failures are classified here,
//! once, into the [`PipelineError`] taxonomy; the controller passes them on
//! unchanged.
//!
//! ## Classification
//!
//! A structured error code from the service wins. Only when the service
//! sends no code, or one we do not recognise, do we fall back to looking for
//! "quota" / "extract text" in the diagnostic message. The substring rules
//! exist for services that only ever answer with free text.

use crate::config::{PipelineConfig, ServiceBackend};
use crate::error::{Pdf2SlidesError, PipelineError};
use crate::outline::{OutlineMetadata, SlideOutline};
use crate::pipeline::encode::EncodedPayload;
use crate::pipeline::llm::LlmService;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A service that turns an encoded PDF into a slide outline.
///
/// On success the outline holds at least one slide.
pub trait ConversionService: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    fn convert<'a>(
        &'a self,
        payload: &'a EncodedPayload,
    ) -> BoxFuture<'a, Result<SlideOutline, PipelineError>>;
}

/// Build the backend selected in the configuration.
pub fn service_from_config(
    config: &PipelineConfig,
) -> Result<Arc<dyn ConversionService>, Pdf2SlidesError> {
    match &config.service {
        ServiceBackend::Callable { url } => Ok(Arc::new(CallableService::new(
            url.clone(),
            config.service_timeout(),
        )?)),
        ServiceBackend::Llm => Ok(Arc::new(LlmService::from_config(config)?)),
    }
}

// ── Classification ───────────────────────────────────────────────────────

/// Map a remote diagnostic to a failure kind.
///
/// `code` is the service's structured error code, if it sent one
/// (`RESOURCE_EXHAUSTED`, `resource-exhausted`, `extraction-failed`, …).
pub fn classify_failure(code: Option<&str>, message: impl Into<String>) -> PipelineError {
    let message = message.into();

    if let Some(code) = code {
        let code = code.trim().to_ascii_lowercase().replace('_', "-");
        match code.as_str() {
            "resource-exhausted" | "quota-exceeded" | "rate-limited" => {
                return PipelineError::QuotaExceeded { message };
            }
            "extraction-failed" | "no-text" | "no-extractable-text" => {
                return PipelineError::ExtractionFailed { message };
            }
            "unavailable" | "deadline-exceeded" => {
                return PipelineError::ServiceUnavailable { message };
            }
            other => debug!("Unrecognised error code '{}', classifying by message", other),
        }
    }

    let lower = message.to_lowercase();
    if lower.contains("quota") {
        PipelineError::QuotaExceeded { message }
    } else if lower.contains("extract text") {
        PipelineError::ExtractionFailed { message }
    } else {
        PipelineError::ConversionRejected { message }
    }
}

// ── Response normalisation ───────────────────────────────────────────────

const NO_DATA: &str = "No data received from conversion service";

/// Normalise whatever the service returned into a non-empty outline.
///
/// Accepted shapes:
/// - `{"slides": [...]}`
/// - `{"success": true, "data": {"slides": [...]}, "metadata": {...}}`
/// - `{"success": false, "error": "..."}` or `{"error": "..."}` → classified failure
pub fn outline_from_value(value: Value) -> Result<SlideOutline, PipelineError> {
    let outline = match value {
        Value::Null => {
            return Err(PipelineError::MalformedResponse {
                message: NO_DATA.to_string(),
            })
        }
        Value::Object(mut map) => {
            if let Some(err) = map.get("error").filter(|e| !e.is_null()) {
                let (code, message) = error_parts(err);
                return Err(classify_failure(code.as_deref(), message));
            }
            if map.contains_key("slides") {
                serde_json::from_value::<SlideOutline>(Value::Object(map)).map_err(|e| {
                    PipelineError::MalformedResponse {
                        message: format!("outline does not match the slide schema: {e}"),
                    }
                })?
            } else if let Some(data) = map.remove("data") {
                let metadata = map
                    .remove("metadata")
                    .and_then(|m| serde_json::from_value::<OutlineMetadata>(m).ok());
                let mut inner = outline_from_value(data)?;
                if inner.metadata.is_none() {
                    inner.metadata = metadata;
                }
                inner
            } else {
                return Err(PipelineError::MalformedResponse {
                    message: "response has no slides field".to_string(),
                });
            }
        }
        other => {
            return Err(PipelineError::MalformedResponse {
                message: format!("expected an object, got {}", json_kind(&other)),
            })
        }
    };

    if outline.is_empty() {
        return Err(PipelineError::MalformedResponse {
            message: "service returned zero slides".to_string(),
        });
    }
    Ok(outline)
}

/// Pull `(code, message)` out of an error value that is either a bare string
/// or an object with `message` and optionally `code`/`status`.
fn error_parts(err: &Value) -> (Option<String>, String) {
    match err {
        Value::String(s) => (None, s.clone()),
        Value::Object(obj) => {
            let message = obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            let code = obj
                .get("code")
                .or_else(|| obj.get("status"))
                .and_then(Value::as_str)
                .map(str::to_string);
            (code, message)
        }
        other => (None, other.to_string()),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Empty payloads never reach the network: an empty document has nothing
/// to extract.
pub(crate) fn ensure_payload(payload: &EncodedPayload) -> Result<(), PipelineError> {
    if payload.is_empty() {
        return Err(PipelineError::ExtractionFailed {
            message: "document is empty; could not extract text".to_string(),
        });
    }
    Ok(())
}

// ── Callable-function backend ────────────────────────────────────────────

/// HTTPS callable function: `POST {"data": payload}` →
/// `{"result": ...}` or `{"error": {"message", "status", "details"}}`.
pub struct CallableService {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CallableResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<CallableError>,
}

#[derive(Debug, Deserialize)]
struct CallableError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

impl CallableError {
    /// The most specific code available: `details.code`, else `status`.
    fn code(&self) -> Option<String> {
        self.details
            .as_ref()
            .and_then(|d| d.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.status.clone())
    }
}

impl CallableService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, Pdf2SlidesError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Pdf2SlidesError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    /// Deployed function URL: `https://<region>-<project>.cloudfunctions.net/<function>`.
    pub fn cloud_url(project: &str, region: &str, function: &str) -> String {
        format!("https://{region}-{project}.cloudfunctions.net/{function}")
    }

    /// Local emulator URL: `http://localhost:5001/<project>/<region>/<function>`.
    pub fn emulator_url(project: &str, region: &str, function: &str) -> String {
        format!("http://localhost:5001/{project}/{region}/{function}")
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, payload: &EncodedPayload) -> Result<SlideOutline, PipelineError> {
        ensure_payload(payload)?;
        info!("Calling conversion function {} ({} chars)", self.url, payload.len());

        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "data": payload.as_str() }))
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("no response within {}s", self.timeout.as_secs())
                } else {
                    e.to_string()
                };
                warn!("Conversion call failed at transport level: {}", message);
                PipelineError::ServiceUnavailable { message }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::ServiceUnavailable {
                message: format!("reading response body: {e}"),
            })?;

        interpret_callable_response(status, &body)
    }
}

impl ConversionService for CallableService {
    fn name(&self) -> &str {
        "callable"
    }

    fn convert<'a>(
        &'a self,
        payload: &'a EncodedPayload,
    ) -> BoxFuture<'a, Result<SlideOutline, PipelineError>> {
        Box::pin(self.call(payload))
    }
}

/// Turn a callable-function HTTP response into an outline or a classified error.
fn interpret_callable_response(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<SlideOutline, PipelineError> {
    let parsed = serde_json::from_str::<CallableResponse>(body);

    if !status.is_success() {
        return match parsed {
            Ok(CallableResponse {
                error: Some(err), ..
            }) => Err(classify_failure(err.code().as_deref(), err.message)),
            _ => Err(PipelineError::ServiceUnavailable {
                message: format!("HTTP {status}: {}", snippet(body)),
            }),
        };
    }

    let parsed = parsed.map_err(|e| PipelineError::MalformedResponse {
        message: format!("response is not a callable-function envelope: {e}"),
    })?;

    if let Some(err) = parsed.error {
        return Err(classify_failure(err.code().as_deref(), err.message));
    }

    // Plain HTTP functions answer with the outline itself, unwrapped.
    let value = match parsed.result.or(parsed.data) {
        Some(value) => value,
        None => serde_json::from_str::<Value>(body).unwrap_or(Value::Null),
    };
    let outline = outline_from_value(value)?;
    debug!("Conversion returned {} slides", outline.len());
    Ok(outline)
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use reqwest::StatusCode;
    use serde_json::json;

    #[test]
    fn substring_quota_is_quota() {
        let e = classify_failure(None, "OpenAI: You exceeded your current quota exceeded");
        assert_eq!(e.kind(), FailureKind::QuotaExceeded);
        let e = classify_failure(None, "Quota reached");
        assert_eq!(e.kind(), FailureKind::QuotaExceeded);
    }

    #[test]
    fn substring_extract_text_is_extraction() {
        let e = classify_failure(None, "Could not extract text from PDF");
        assert_eq!(e.kind(), FailureKind::ExtractionFailed);
    }

    #[test]
    fn other_messages_are_rejections() {
        let e = classify_failure(None, "model overloaded");
        assert_eq!(e.kind(), FailureKind::ConversionRejected);
    }

    #[test]
    fn structured_code_beats_message() {
        // Message mentions quota, but the code says the service is down.
        let e = classify_failure(Some("UNAVAILABLE"), "quota backend unreachable");
        assert_eq!(e.kind(), FailureKind::ServiceUnavailable);

        let e = classify_failure(Some("resource-exhausted"), "try later");
        assert_eq!(e.kind(), FailureKind::QuotaExceeded);

        let e = classify_failure(Some("EXTRACTION_FAILED"), "scanned");
        assert_eq!(e.kind(), FailureKind::ExtractionFailed);
    }

    #[test]
    fn unknown_code_falls_back_to_message() {
        let e = classify_failure(Some("INTERNAL"), "quota exceeded");
        assert_eq!(e.kind(), FailureKind::QuotaExceeded);
    }

    #[test]
    fn bare_outline_parses() {
        let outline = outline_from_value(json!({
            "slides": [{"page": 1, "title": "Intro", "bullets": ["a"]}]
        }))
        .unwrap();
        assert_eq!(outline.len(), 1);
    }

    #[test]
    fn envelope_outline_keeps_metadata() {
        let outline = outline_from_value(json!({
            "success": true,
            "data": {"slides": [{"title": "A"}, {"title": "B"}]},
            "metadata": {"model": "gemini-2.5-flash", "pagesProcessed": 5, "slidesGenerated": 2}
        }))
        .unwrap();
        assert_eq!(outline.len(), 2);
        let meta = outline.metadata.expect("metadata kept");
        assert_eq!(meta.model.as_deref(), Some("gemini-2.5-flash"));
    }

    #[test]
    fn envelope_error_is_classified() {
        let err = outline_from_value(json!({"success": false, "error": "quota exceeded"}))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::QuotaExceeded);
    }

    #[test]
    fn null_or_shapeless_is_malformed() {
        for v in [json!(null), json!({}), json!([1, 2]), json!("slides")] {
            let err = outline_from_value(v).unwrap_err();
            assert_eq!(err.kind(), FailureKind::MalformedResponse);
        }
    }

    #[test]
    fn empty_slides_are_malformed() {
        let err = outline_from_value(json!({"slides": []})).unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedResponse);
    }

    #[test]
    fn callable_success_result() {
        let body = r#"{"result": {"slides": [{"title": "Only"}]}}"#;
        let outline = interpret_callable_response(StatusCode::OK, body).unwrap();
        assert_eq!(outline.slides[0].title, "Only");
    }

    #[test]
    fn callable_bare_outline_body() {
        let body = r#"{"slides": [{"title": "Intro"}, {"title": "Results"}], "metadata": {"pagesProcessed": 2}}"#;
        let outline = interpret_callable_response(StatusCode::OK, body).unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline.slides[1].title, "Results");
    }

    #[test]
    fn callable_error_uses_status_code() {
        let body = r#"{"error": {"message": "Too many requests", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = interpret_callable_response(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert_eq!(err.kind(), FailureKind::QuotaExceeded);
    }

    #[test]
    fn callable_error_details_code_wins_over_status() {
        let body = r#"{"error": {"message": "no text", "status": "INTERNAL",
                       "details": {"code": "extraction-failed"}}}"#;
        let err = interpret_callable_response(StatusCode::INTERNAL_SERVER_ERROR, body).unwrap_err();
        assert_eq!(err.kind(), FailureKind::ExtractionFailed);
    }

    #[test]
    fn callable_http_failure_without_envelope_is_unavailable() {
        let err =
            interpret_callable_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
                .unwrap_err();
        assert_eq!(err.kind(), FailureKind::ServiceUnavailable);
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn callable_missing_result_is_malformed() {
        let err = interpret_callable_response(StatusCode::OK, "{}").unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedResponse);
        let err = interpret_callable_response(StatusCode::OK, "not json").unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedResponse);
    }

    #[test]
    fn function_urls() {
        assert_eq!(
            CallableService::cloud_url("demo", "us-central1", "convertPdfToSlides"),
            "https://us-central1-demo.cloudfunctions.net/convertPdfToSlides"
        );
        assert_eq!(
            CallableService::emulator_url("demo", "us-central1", "convertPdfToSlides"),
            "http://localhost:5001/demo/us-central1/convertPdfToSlides"
        );
    }

    #[tokio::test]
    async fn empty_payload_never_reaches_the_network() {
        // Port 9 (discard) would fail at transport level if a call were made.
        let svc = CallableService::new("http://127.0.0.1:9/fn", Duration::from_secs(1)).unwrap();
        let doc = crate::pipeline::input::InputDocument::from_bytes(
            "empty.pdf",
            "application/pdf",
            Vec::new(),
        );
        let payload = crate::pipeline::encode::encode_document(&doc).await.unwrap();
        let err = svc.convert(&payload).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ExtractionFailed);
    }
}

//! Input resolution: turn a user-supplied path, URL or data URL into an
//! [`InputDocument`].
//!
//! Nothing here decides whether the document is acceptable — that is the
//! validator's job. This module only gathers what the validator and encoder
//! need: a display name, the declared media type, the byte size, and where
//! the content lives. Local files are not read here; the encoder reads them
//! when the run starts, which is the pipeline's first suspension point.

use crate::error::{Pdf2SlidesError, PipelineError, RejectReason};
use crate::pipeline::encode::split_data_url;
use crate::pipeline::validate::MAX_FILE_BYTES;
use futures::StreamExt;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Media type the validator accepts.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Media type declared when nothing better is known.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// Where a document's content comes from.
#[derive(Clone)]
pub enum DocumentSource {
    /// Content already in memory.
    Bytes(Arc<[u8]>),
    /// A local file, read by the encoder.
    Path(PathBuf),
    /// A `data:<mime>;base64,<payload>` string, as browser file readers produce.
    DataUrl(Arc<str>),
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            DocumentSource::Path(p) => write!(f, "Path({})", p.display()),
            DocumentSource::DataUrl(s) => write!(f, "DataUrl({} chars)", s.len()),
        }
    }
}

/// A candidate document: name, declared type, size, and content source.
#[derive(Debug, Clone)]
pub struct InputDocument {
    name: String,
    media_type: String,
    size: u64,
    source: DocumentSource,
}

impl InputDocument {
    /// Build a document from already-known parts.
    ///
    /// `size` is what the selection surface reported; the validator trusts it.
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        size: u64,
        source: DocumentSource,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size,
            source,
        }
    }

    /// An in-memory document; the size is the buffer length.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let bytes: Arc<[u8]> = bytes.into();
        Self::new(name, media_type, bytes.len() as u64, DocumentSource::Bytes(bytes))
    }

    /// A document given as a data URL. The media type comes from the URL
    /// header and the size is the decoded payload length.
    pub fn from_data_url(
        name: impl Into<String>,
        data_url: impl Into<String>,
    ) -> Result<Self, Pdf2SlidesError> {
        let data_url: String = data_url.into();
        let (media_type, payload) =
            split_data_url(&data_url).ok_or_else(|| Pdf2SlidesError::InvalidInput {
                input: truncate(&data_url, 48),
                reason: "not a base64 data URL".into(),
            })?;
        let media_type = if media_type.is_empty() {
            UNKNOWN_MEDIA_TYPE.to_string()
        } else {
            media_type.to_string()
        };
        let size = decoded_len(payload);
        Ok(Self::new(
            name,
            media_type,
            size,
            DocumentSource::DataUrl(data_url.into()),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &DocumentSource {
        &self.source
    }

    /// Size in KiB, as shown in the selection status line.
    pub fn size_kib(&self) -> f64 {
        self.size as f64 / 1024.0
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an [`InputDocument`].
///
/// URLs are downloaded into memory, data URLs are taken as-is, anything else
/// is treated as a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<InputDocument, Pdf2SlidesError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.starts_with("data:") {
        InputDocument::from_data_url("upload.pdf", input)
    } else {
        resolve_local(Path::new(input))
    }
}

/// Resolve a local file path, checking existence and permissions.
///
/// The media type is declared from the `.pdf` extension, or from the `%PDF`
/// magic bytes when the extension says nothing.
pub fn resolve_local(path: &Path) -> Result<InputDocument, Pdf2SlidesError> {
    if !path.exists() {
        return Err(Pdf2SlidesError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2SlidesError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Pdf2SlidesError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let size = file
        .metadata()
        .map_err(|e| Pdf2SlidesError::Internal(format!("metadata for {}: {e}", path.display())))?
        .len();

    let has_pdf_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    let media_type = if has_pdf_extension {
        PDF_MEDIA_TYPE
    } else {
        let mut magic = [0u8; 4];
        if file.read_exact(&mut magic).is_ok() && has_pdf_magic(&magic) {
            PDF_MEDIA_TYPE
        } else {
            UNKNOWN_MEDIA_TYPE
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Resolved local document: {} ({} bytes, {})", path.display(), size, media_type);
    Ok(InputDocument::new(
        name,
        media_type,
        size,
        DocumentSource::Path(path.to_path_buf()),
    ))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<InputDocument, Pdf2SlidesError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2SlidesError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| transfer_error(url, timeout_secs, e))?;

    if !response.status().is_success() {
        return Err(Pdf2SlidesError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // Oversized bodies are refused before they are buffered.
    if let Some(len) = response.content_length() {
        if len > MAX_FILE_BYTES {
            return Err(too_large(len));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| transfer_error(url, timeout_secs, e))?;
        bytes.extend_from_slice(&chunk);
        if bytes.len() as u64 > MAX_FILE_BYTES {
            return Err(too_large(bytes.len() as u64));
        }
    }

    // Servers often send octet-stream for PDFs; trust the magic bytes then.
    let media_type = match declared {
        Some(ct) if !ct.starts_with(UNKNOWN_MEDIA_TYPE) => ct,
        _ if has_pdf_magic(&bytes) => PDF_MEDIA_TYPE.to_string(),
        _ => UNKNOWN_MEDIA_TYPE.to_string(),
    };

    let name = extract_filename(url);
    info!("Downloaded {} ({} bytes, {})", name, bytes.len(), media_type);

    Ok(InputDocument::from_bytes(name, media_type, bytes))
}

fn transfer_error(url: &str, timeout_secs: u64, e: reqwest::Error) -> Pdf2SlidesError {
    if e.is_timeout() {
        Pdf2SlidesError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        Pdf2SlidesError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// A download that would exceed the validator's limit. `size` is the
/// declared length, or the bytes received when the overflow was noticed.
fn too_large(size: u64) -> Pdf2SlidesError {
    Pdf2SlidesError::Pipeline(PipelineError::Validation(RejectReason::TooLarge {
        size,
        limit: MAX_FILE_BYTES,
    }))
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == b"%PDF"
}

/// Decoded byte length of a padded base64 payload, ignoring whitespace.
fn decoded_len(payload: &str) -> u64 {
    let chars = payload.bytes().filter(|b| !b.is_ascii_whitespace()).count() as u64;
    let padding = payload.trim_end().bytes().rev().take_while(|&b| b == b'=').count() as u64;
    (chars / 4 * 3).saturating_sub(padding)
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("data:application/pdf;base64,AAAA"));
        assert!(!is_url(""));
    }

    #[test]
    fn extract_filename_from_url_path() {
        assert_eq!(extract_filename("https://x.org/papers/deck.pdf"), "deck.pdf");
        assert_eq!(extract_filename("https://x.org/papers/"), "downloaded.pdf");
        assert_eq!(extract_filename("https://x.org/pdf/1706"), "downloaded.pdf");
    }

    #[test]
    fn local_pdf_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.PDF");
        std::fs::write(&path, b"not really a pdf").unwrap();

        let doc = resolve_local(&path).expect("resolves");
        assert_eq!(doc.name(), "report.PDF");
        assert_eq!(doc.media_type(), PDF_MEDIA_TYPE);
        assert_eq!(doc.size(), 16);
        assert!(matches!(doc.source(), DocumentSource::Path(_)));
    }

    #[test]
    fn local_pdf_by_magic_bytes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n...").unwrap();

        let doc = resolve_local(tmp.path()).expect("resolves");
        assert_eq!(doc.media_type(), PDF_MEDIA_TYPE);
    }

    #[test]
    fn local_non_pdf_is_declared_unknown() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();

        let doc = resolve_local(tmp.path()).expect("resolves");
        assert_eq!(doc.media_type(), UNKNOWN_MEDIA_TYPE);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2SlidesError::FileNotFound { .. }));
    }

    #[test]
    fn data_url_declares_type_and_decoded_size() {
        // "hello" → aGVsbG8=
        let doc = InputDocument::from_data_url("a.pdf", "data:application/pdf;base64,aGVsbG8=")
            .expect("valid data url");
        assert_eq!(doc.media_type(), PDF_MEDIA_TYPE);
        assert_eq!(doc.size(), 5);
    }

    #[test]
    fn malformed_data_url_is_invalid_input() {
        let err = InputDocument::from_data_url("a.pdf", "data:application/pdf,plain").unwrap_err();
        assert!(matches!(err, Pdf2SlidesError::InvalidInput { .. }));
    }

    #[test]
    fn size_kib_matches_selection_rendering() {
        let doc = InputDocument::new(
            "deck.pdf",
            PDF_MEDIA_TYPE,
            2_000_000,
            DocumentSource::Path("deck.pdf".into()),
        );
        assert!(format!("{:.2}", doc.size_kib()).starts_with("1953.1"));
    }

    #[test]
    fn decoded_len_handles_padding() {
        assert_eq!(decoded_len(""), 0);
        assert_eq!(decoded_len("QQ=="), 1);
        assert_eq!(decoded_len("QUI="), 2);
        assert_eq!(decoded_len("QUJD"), 3);
    }

    /// Serve one HTTP response on a local port: a PDF body of `body_len`
    /// bytes, with or without a Content-Length header.
    async fn serve_pdf(body_len: usize, declare_length: bool) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;

            let mut head = "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nConnection: close\r\n"
                .to_string();
            if declare_length {
                head.push_str(&format!("Content-Length: {}\r\n", body_len));
            }
            head.push_str("\r\n");
            let mut body = b"%PDF-1.7\n".to_vec();
            body.resize(body_len, b'0');

            // The client may hang up early; that is the point.
            if socket.write_all(head.as_bytes()).await.is_ok() {
                let _ = socket.write_all(&body).await;
            }
            let _ = socket.shutdown().await;
        });
        format!("http://{}/big.pdf", addr)
    }

    fn assert_too_large(result: Result<InputDocument, Pdf2SlidesError>) {
        match result {
            Err(Pdf2SlidesError::Pipeline(PipelineError::Validation(RejectReason::TooLarge {
                size,
                limit,
            }))) => {
                assert_eq!(limit, MAX_FILE_BYTES);
                assert!(size > MAX_FILE_BYTES);
            }
            other => panic!("expected TooLarge, got {:?}", other.map(|d| d.size())),
        }
    }

    #[tokio::test]
    async fn download_with_oversized_content_length_is_refused() {
        let url = serve_pdf(11 * 1024 * 1024, true).await;
        assert_too_large(download_url(&url, 30).await);
    }

    #[tokio::test]
    async fn download_without_length_stops_past_limit() {
        let url = serve_pdf(11 * 1024 * 1024, false).await;
        assert_too_large(download_url(&url, 30).await);
    }

    #[tokio::test]
    async fn small_download_keeps_name_and_type() {
        let url = serve_pdf(2048, true).await;
        let doc = download_url(&url, 30).await.expect("downloads");
        assert_eq!(doc.name(), "big.pdf");
        assert_eq!(doc.media_type(), PDF_MEDIA_TYPE);
        assert_eq!(doc.size(), 2048);
    }
}

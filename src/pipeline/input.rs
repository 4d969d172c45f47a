//! Input resolution: turn a user-supplied path or URL into a [`SourceDocument`].
//!
//! This sits in front of the orchestrator. Jobs themselves only ever see byte
//! buffers; reading files and downloading URLs happens here, before a job is
//! created.
//!
//! The format is sniffed from magic bytes first. The file extension (or the
//! last URL path segment) is only a fallback, so a mislabelled `scan.pdf`
//! that is really a PNG still decodes as a PNG.

use crate::error::{DecodeError, PipelineError};
use crate::format::Format;
use crate::model::SourceDocument;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceDocument, PipelineError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input)).await
    }
}

/// Read several inputs in order.
pub async fn resolve_inputs(
    inputs: &[String],
    timeout_secs: u64,
) -> Result<Vec<SourceDocument>, PipelineError> {
    let mut docs = Vec::with_capacity(inputs.len());
    for input in inputs {
        docs.push(resolve_input(input, timeout_secs).await?);
    }
    Ok(docs)
}

async fn resolve_local(path: &Path) -> Result<SourceDocument, PipelineError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => PipelineError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PipelineError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let hint = path.extension().and_then(|e| e.to_str());
    let doc = identify(bytes, hint)?;
    debug!(
        "Resolved local {} ({} bytes): {}",
        doc.format(),
        doc.len(),
        path.display()
    );
    Ok(doc)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, PipelineError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PipelineError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            PipelineError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let name = url_filename(url);
    let hint = name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str());
    let doc = identify(bytes.to_vec(), hint)?;
    info!("Downloaded {} bytes ({})", doc.len(), doc.format());
    Ok(doc)
}

/// Sniff, then fall back to the extension hint.
fn identify(bytes: Vec<u8>, extension: Option<&str>) -> Result<SourceDocument, PipelineError> {
    let format = Format::sniff(&bytes)
        .or_else(|| extension.and_then(Format::from_extension))
        .ok_or_else(|| {
            PipelineError::decode(
                0,
                DecodeError::UnknownFormat {
                    declared: extension.unwrap_or("<no extension>").to_string(),
                },
            )
        })?;
    Ok(SourceDocument::new(bytes, format))
}

/// Last non-empty path segment of a URL, if it has an extension.
fn url_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if !last.is_empty() && last.contains('.') {
        Some(last.to_string())
    } else {
        None
    }
}

/// Default output path: the input's stem plus the format's extension.
pub fn default_output_path(input: &str, format: Format) -> PathBuf {
    let stem = if is_url(input) {
        url_filename(input)
            .as_deref()
            .and_then(|n| Path::new(n).file_stem())
            .and_then(|s| s.to_str())
            .map(str::to_string)
    } else {
        Path::new(input)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
    }
    .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{}.{}", stem, format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_url_filename() {
        assert_eq!(
            url_filename("https://example.com/files/scan.png?x=1").as_deref(),
            Some("scan.png")
        );
        assert_eq!(url_filename("https://example.com/files/"), None);
    }

    #[test]
    fn identify_prefers_magic_over_extension() {
        let doc = identify(b"%PDF-1.4 rest".to_vec(), Some("png")).unwrap();
        assert_eq!(doc.format(), Format::Pdf);
    }

    #[test]
    fn identify_falls_back_to_extension() {
        let doc = identify(b"garbage".to_vec(), Some("jpg")).unwrap();
        assert_eq!(doc.format(), Format::Jpeg);
        assert!(identify(b"garbage".to_vec(), None).is_err());
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path("/tmp/report.docx", Format::Pdf),
            PathBuf::from("report.pdf")
        );
        assert_eq!(
            default_output_path("https://x.org/a/photo.png", Format::Webp),
            PathBuf::from("photo.webp")
        );
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/no/such/file.pdf", 5).await.unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read_and_sniffed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.bin");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        let doc = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.format(), Format::Pdf);
        assert_eq!(doc.len(), 9);
    }
}

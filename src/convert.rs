//! Eager entry points: run a job and hand back the whole artifact.
//!
//! [`run`] is the primary API. It builds a [`Job`], drives it to a terminal
//! state and returns the artifact together with its statistics. Use
//! [`crate::stream::rasterize_stream`] instead when rendered pages should be
//! consumed as they finish rather than collected first.

use crate::codec;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::format::Format;
use crate::job::Job;
use crate::model::{PageContent, SourceDocument};
use crate::output::{ArtifactBody, DocumentMetadata, JobOutput, JobStats, PageSize};
use crate::request::TransformRequest;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Run one transform request to completion.
///
/// # Example
/// ```rust,no_run
/// use toolsherd::{run, PipelineConfig, SourceDocument, TransformRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let a = SourceDocument::sniffed(std::fs::read("a.pdf")?)?;
/// let b = SourceDocument::sniffed(std::fs::read("b.pdf")?)?;
/// let output = run(TransformRequest::merge([a, b]), &PipelineConfig::default()).await?;
/// std::fs::write("merged.pdf", output.artifact.as_single().unwrap_or_default())?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// Any [`PipelineError`]; the job never returns a partial artifact.
pub async fn run(
    request: TransformRequest,
    config: &PipelineConfig,
) -> Result<JobOutput, PipelineError> {
    Job::new(request).execute(config).await
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    request: TransformRequest,
    config: &PipelineConfig,
) -> Result<JobOutput, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(request, config))
}

/// Run a request and write its artifact under `output_path`.
///
/// A single-buffer artifact is written atomically: to a temp file in the
/// target directory, then persisted over `output_path`. A page set (from
/// Rasterize) treats `output_path` as a directory and writes
/// `page_1.png`, `page_2.png`, … into it.
///
/// Returns the paths written, in page order, and the job statistics.
pub async fn run_to_file(
    request: TransformRequest,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<(Vec<PathBuf>, JobStats), PipelineError> {
    let output = run(request, config).await?;
    let path = output_path.as_ref().to_path_buf();
    let format = output.artifact.format;

    let written = match output.artifact.body {
        ArtifactBody::Single(bytes) => {
            let target = path.clone();
            tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
                .await
                .map_err(|e| PipelineError::Internal(format!("Write task failed: {}", e)))??;
            vec![path]
        }
        ArtifactBody::Pages(pages) => write_pages(&path, format, pages).await?,
    };
    info!("Wrote {} file(s) under {}", written.len(), output_path.as_ref().display());
    Ok((written, output.stats))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let write_failed = |e: std::io::Error| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_failed)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

async fn write_pages(
    dir: &Path,
    format: Format,
    pages: Vec<Vec<u8>>,
) -> Result<Vec<PathBuf>, PipelineError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
    let mut written = Vec::with_capacity(pages.len());
    for (i, bytes) in pages.into_iter().enumerate() {
        let path = dir.join(format!("page_{}.{}", i + 1, format.extension()));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| PipelineError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        written.push(path);
    }
    Ok(written)
}

/// Describe a document without transforming it. Needs no renderer.
///
/// Encrypted PDFs are reported with `is_encrypted` set rather than failing.
pub fn inspect(source: &SourceDocument) -> Result<DocumentMetadata, PipelineError> {
    if source.format() == Format::Pdf {
        return codec::pdf::inspect(source).map_err(|e| PipelineError::decode(0, e));
    }
    let pages = codec::decode(source).map_err(|e| PipelineError::decode(0, e))?;
    let page_sizes = pages
        .iter()
        .filter_map(|p| match &p.content {
            PageContent::Raster(r) => Some(PageSize {
                width: r.width() as f32,
                height: r.height() as f32,
            }),
            _ => None,
        })
        .collect();
    Ok(DocumentMetadata {
        format: Some(source.format()),
        byte_len: source.len(),
        page_count: pages.len(),
        page_sizes,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode;

    fn png(w: u32, h: u32) -> SourceDocument {
        let bytes = encode::encode_page(&image::DynamicImage::new_rgb8(w, h)).unwrap();
        SourceDocument::new(bytes, Format::Png)
    }

    #[test]
    fn inspect_image_reports_pixels() {
        let meta = inspect(&png(30, 20)).unwrap();
        assert_eq!(meta.format, Some(Format::Png));
        assert_eq!(meta.page_count, 1);
        assert_eq!(
            meta.page_sizes,
            vec![PageSize {
                width: 30.0,
                height: 20.0
            }]
        );
        assert!(meta.pdf_version.is_none());
    }

    #[test]
    fn run_sync_converts() {
        let out = run_sync(
            TransformRequest::convert(png(3, 3), Format::Webp),
            &PipelineConfig::default(),
        )
        .unwrap();
        assert_eq!(Format::sniff(out.artifact.as_single().unwrap()), Some(Format::Webp));
    }

    #[tokio::test]
    async fn run_to_file_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.pdf");
        let (written, stats) = run_to_file(
            TransformRequest::merge([png(2, 2), png(4, 4)]),
            &path,
            &PipelineConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(written, vec![path.clone()]);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(stats.output_bytes, bytes.len());
        // Only the final file remains; the temp file was renamed over it.
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }
}

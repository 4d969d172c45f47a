//! Streaming rasterisation: emit page PNGs as they are encoded.
//!
//! Rendering is not streamed. [`rasterize_stream`] decodes and renders every
//! page before it returns, so all rendered images are in memory at once.
//! Only PNG encoding is deferred: each page is compressed when the stream
//! reaches it, and the caller can write (or upload) that PNG before the next
//! one is produced. [`crate::convert::run`] instead returns only after every
//! PNG exists.
//!
//! Pages are yielded in page order. Encoding of later pages overlaps with
//! the consumer's handling of earlier ones, bounded by `concurrency`.

use crate::codec;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, ValidationError};
use crate::job::encode_raster_task;
use crate::model::SourceDocument;
use crate::transform::rasterize;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of `(page_number, png_bytes)`, 1-based and in order.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<(usize, Vec<u8>), PipelineError>> + Send>>;

/// Decode and render `source`, streaming the PNG of each page.
///
/// # Returns
/// - `Ok(PageStream)` once every page is rendered
/// - `Err(PipelineError)` if the scale is invalid, the document does not
///   decode, or rendering fails
///
/// # Example
/// ```rust,no_run
/// use toolsherd::{rasterize_stream, PipelineConfig, SourceDocument};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = SourceDocument::sniffed(std::fs::read("slides.pdf")?)?;
/// let mut pages = rasterize_stream(source, 2.0, &PipelineConfig::default()).await?;
/// while let Some(page) = pages.next().await {
///     let (n, png) = page?;
///     std::fs::write(format!("slide_{n}.png"), png)?;
/// }
/// # Ok(())
/// # }
/// ```
pub async fn rasterize_stream(
    source: SourceDocument,
    scale: f32,
    config: &PipelineConfig,
) -> Result<PageStream, PipelineError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(ValidationError::InvalidScale { scale }.into());
    }
    info!(
        "Starting streaming rasterisation: {} ({} bytes) at scale {}",
        source.format(),
        source.len(),
        scale
    );

    let cfg = config.clone();
    let rasters = tokio::task::spawn_blocking(move || {
        let pages = codec::decode(&source).map_err(|e| PipelineError::decode(0, e))?;
        rasterize::rasterize(&pages, scale, &cfg)
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Render task failed: {}", e)))??;
    info!("Rendered {} pages", rasters.len());

    let total = rasters.len();
    let callback = config.progress_callback.clone();
    let s = stream::iter(rasters.into_iter().enumerate())
        .map(|(i, raster)| encode_raster_task(i, raster))
        .buffered(config.concurrency.max(1))
        .inspect(move |result| {
            if let (Ok((page_num, _)), Some(cb)) = (result, &callback) {
                cb.on_page_complete(*page_num, total);
            }
        });
    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::pipeline::encode;

    #[tokio::test]
    async fn images_stream_in_order() {
        let bytes = encode::encode_page(&image::DynamicImage::new_rgb8(5, 2)).unwrap();
        let source = SourceDocument::new(bytes, Format::Png);
        let pages: Vec<_> = rasterize_stream(source, 3.0, &PipelineConfig::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(pages.len(), 1);
        let (n, png) = pages.into_iter().next().unwrap().unwrap();
        assert_eq!(n, 1);
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (15, 6));
    }

    #[tokio::test]
    async fn bad_scale_fails_before_decoding() {
        let source = SourceDocument::new(b"junk".to_vec(), Format::Pdf);
        let err = match rasterize_stream(source, -1.0, &PipelineConfig::default()).await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidScale { .. })
        ));
    }
}

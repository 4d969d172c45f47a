//! Rasterize: one pixel buffer per page.
//!
//! At scale 1.0 one PDF point becomes one pixel, so a US-Letter page renders
//! at 612×792 and scale 2.0 gives 1224×1584. Raster pages are resampled by
//! the same factor. Text pages are first laid out as PDF (see
//! [`crate::codec::pdf`]) and rendered like any other PDF page; a long text
//! page can therefore produce several images.
//!
//! Consecutive pages from the same PDF are handed to the renderer in one
//! call, so pdfium opens each document once per run of pages rather than
//! once per page.

use crate::codec::pdf::PdfCodec;
use crate::codec::Codec;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, ValidationError};
use crate::format::Format;
use crate::model::{Page, PageContent, PageSequence, PdfPage, RasterPage, SourceDocument};
use crate::pipeline::render::{self, RenderTarget};
use image::imageops::FilterType;
use std::sync::Arc;
use tracing::{debug, warn};

/// Render every page of `pages` at `scale`, in page order.
///
/// This blocks while the renderer works; async callers run it on the
/// blocking pool.
pub fn rasterize(
    pages: &PageSequence,
    scale: f32,
    config: &PipelineConfig,
) -> Result<Vec<RasterPage>, PipelineError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(ValidationError::InvalidScale { scale }.into());
    }
    let prepared = lay_out_text(pages, config)?;
    let renderer = render::renderer_for(config);
    debug!(
        "Rasterising {} pages at scale {} with {}",
        prepared.len(),
        scale,
        renderer.name()
    );

    let mut out = Vec::with_capacity(prepared.len());
    let mut i = 0;
    while i < prepared.len() {
        match &prepared[i].content {
            PageContent::Raster(r) => {
                out.push(scale_raster(r, scale, config.max_rendered_pixels));
                i += 1;
            }
            PageContent::Pdf(first) => {
                let source = Arc::clone(first.source());
                let mut targets = Vec::new();
                while let Some(PageContent::Pdf(p)) = prepared.get(i).map(|p| &p.content) {
                    if p.source().id() != source.id() {
                        break;
                    }
                    targets.push(target_for(p, i + 1, scale, config.max_rendered_pixels)?);
                    i += 1;
                }
                let images = renderer.render(source.bytes(), &targets)?;
                if images.len() != targets.len() {
                    return Err(PipelineError::RenderFailed {
                        page: targets.first().map(|t| t.page_number).unwrap_or(i),
                        detail: format!(
                            "renderer returned {} images for {} pages",
                            images.len(),
                            targets.len()
                        ),
                    });
                }
                out.extend(images.into_iter().map(RasterPage::new));
            }
            PageContent::Text(_) => {
                return Err(PipelineError::Internal(
                    "text page reached the renderer without layout".into(),
                ))
            }
        }
    }
    Ok(out)
}

/// Replace text pages by the PDF pages they lay out to.
fn lay_out_text(pages: &PageSequence, config: &PipelineConfig) -> Result<Vec<Page>, PipelineError> {
    let mut prepared = Vec::with_capacity(pages.len());
    for page in pages {
        if !matches!(page.content, PageContent::Text(_)) {
            prepared.push(page.clone());
            continue;
        }
        let single = PageSequence::new(vec![page.clone()]);
        let bytes = PdfCodec.encode(&single, config)?;
        let laid_out = PdfCodec
            .decode(&SourceDocument::new(bytes, Format::Pdf))
            .map_err(|e| PipelineError::Internal(format!("laid-out text did not decode: {}", e)))?;
        prepared.extend(
            laid_out
                .into_pages()
                .into_iter()
                .map(|p| Page::new(page.original_index, p.content)),
        );
    }
    Ok(prepared)
}

fn target_for(
    page: &PdfPage,
    page_number: usize,
    scale: f32,
    max_edge: u32,
) -> Result<RenderTarget, PipelineError> {
    let page_index = page.index_in_source().ok_or_else(|| {
        PipelineError::Internal(format!("page {} is not in its own source", page_number))
    })?;
    let (w, h) = page.size();
    let (width, height) = scaled_size(w * scale, h * scale, max_edge, page_number);
    Ok(RenderTarget {
        page_index,
        page_number,
        width,
        height,
    })
}

fn scale_raster(raster: &RasterPage, scale: f32, max_edge: u32) -> RasterPage {
    let (w, h) = scaled_size(
        raster.width() as f32 * scale,
        raster.height() as f32 * scale,
        max_edge,
        0,
    );
    if (w, h) == (raster.width(), raster.height()) {
        return raster.clone();
    }
    RasterPage::new(raster.image.resize_exact(w, h, FilterType::Lanczos3))
}

/// Round to whole pixels, shrinking proportionally when the longest edge
/// exceeds `max_edge`. Never returns a zero dimension.
pub(crate) fn scaled_size(w: f32, h: f32, max_edge: u32, page_number: usize) -> (u32, u32) {
    let longest = w.max(h);
    let (w, h) = if longest > max_edge as f32 {
        warn!(
            "Page {}: {:.0}x{:.0} px exceeds the {} px limit; shrinking",
            page_number, w, h, max_edge
        );
        let k = max_edge as f32 / longest;
        (w * k, h * k)
    } else {
        (w, h)
    };
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextPage;
    use image::DynamicImage;

    #[test]
    fn scaled_size_rounds_and_clamps() {
        assert_eq!(scaled_size(1224.0, 1584.0, 10_000, 1), (1224, 1584));
        assert_eq!(scaled_size(0.2, 0.4, 10_000, 1), (1, 1));
        assert_eq!(scaled_size(4000.0, 2000.0, 1000, 1), (1000, 500));
    }

    #[test]
    fn raster_pages_are_resampled() {
        let page = Page::new(
            0,
            PageContent::Raster(RasterPage::new(DynamicImage::new_rgb8(10, 4))),
        );
        let out = rasterize(&PageSequence::new(vec![page]), 2.0, &PipelineConfig::default()).unwrap();
        assert_eq!((out[0].width(), out[0].height()), (20, 8));
    }

    #[test]
    fn bad_scale_is_rejected() {
        let err = rasterize(&PageSequence::default(), 0.0, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidScale { .. })
        ));
    }

    #[test]
    fn text_pages_are_laid_out_first() {
        let page = Page::new(
            3,
            PageContent::Text(TextPage {
                heading: Some("Title".into()),
                paragraphs: vec!["body".into()],
            }),
        );
        let prepared =
            lay_out_text(&PageSequence::new(vec![page]), &PipelineConfig::default()).unwrap();
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].original_index, 3);
        let PageContent::Pdf(p) = &prepared[0].content else {
            panic!("expected vector page");
        };
        assert_eq!(p.size(), (612.0, 792.0));
    }
}

//! ExtractText: one flat paragraph per page, under a page-number heading.
//!
//! No layout reconstruction is attempted. PDF pages contribute their text
//! runs in content-stream order; text pages are flattened. Raster pages
//! cannot be read without OCR: they are left as they are and the Word
//! encoder rejects them in the encoding stage.

use crate::codec::pdf::extract_page_text;
use crate::error::DecodeError;
use crate::model::{Page, PageContent, PageSequence, TextPage};
use crate::pipeline::postprocess;
use tracing::debug;

/// A text page per input page, headed "Page N" (1-based position).
///
/// Fails when a PDF page's content stream cannot be parsed.
pub fn extract_text(pages: &PageSequence) -> Result<PageSequence, DecodeError> {
    let mut out = Vec::with_capacity(pages.len());
    for (position, page) in pages.iter().enumerate() {
        let body = match &page.content {
            PageContent::Pdf(p) => extract_page_text(p)?,
            PageContent::Text(t) => postprocess::clean_text(&t.paragraphs.join("\n")),
            PageContent::Raster(_) => {
                out.push(page.clone());
                continue;
            }
        };
        debug!("Page {}: extracted {} chars", position + 1, body.len());
        out.push(Page::new(
            page.original_index,
            PageContent::Text(TextPage {
                heading: Some(format!("Page {}", position + 1)),
                paragraphs: if body.is_empty() { Vec::new() } else { vec![body] },
            }),
        ));
    }
    Ok(PageSequence::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::EncodeError;
    use crate::format::Format;
    use crate::model::RasterPage;

    #[test]
    fn text_pages_are_flattened_under_a_heading() {
        let seq = PageSequence::new(vec![
            Page::new(
                5,
                PageContent::Text(TextPage {
                    heading: None,
                    paragraphs: vec!["one".into(), "two  three".into()],
                }),
            ),
            Page::new(6, PageContent::Text(TextPage::default())),
        ]);
        let out = extract_text(&seq).unwrap();
        let pages: Vec<TextPage> = out
            .iter()
            .map(|p| match &p.content {
                PageContent::Text(t) => t.clone(),
                _ => panic!("expected text page"),
            })
            .collect();
        assert_eq!(
            pages,
            vec![
                TextPage {
                    heading: Some("Page 1".into()),
                    paragraphs: vec!["one two three".into()],
                },
                TextPage {
                    heading: Some("Page 2".into()),
                    paragraphs: Vec::new(),
                },
            ]
        );
        assert_eq!(out.original_indices(), vec![5, 6]);
    }

    #[test]
    fn images_are_left_for_the_word_encoder_to_reject() {
        let seq = PageSequence::new(vec![Page::new(
            0,
            PageContent::Raster(RasterPage::new(image::DynamicImage::new_rgb8(1, 1))),
        )]);
        let out = extract_text(&seq).unwrap();
        assert!(matches!(out.get(0).unwrap().content, PageContent::Raster(_)));

        let err = crate::codec::encode(&out, Format::Docx, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::UnsupportedFeature { to: Format::Docx, .. }
        ));
    }
}

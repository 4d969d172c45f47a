//! PNG, JPEG and WebP adapter built on the `image` crate.
//!
//! A raster file is always exactly one page. Decoding keeps the original
//! bytes next to the pixels, so re-encoding to the same format (or embedding
//! a JPEG into a PDF) does not pay for a lossy round trip.

use crate::codec::Codec;
use crate::config::PipelineConfig;
use crate::error::{DecodeError, EncodeError};
use crate::format::Format;
use crate::model::{Page, PageContent, PageSequence, SourceDocument};
use crate::model::RasterPage;
use crate::pipeline::encode;
use tracing::debug;

/// Encodes and decodes one raster format.
pub struct RasterCodec {
    format: Format,
}

impl RasterCodec {
    /// # Panics
    /// Never; non-raster formats are accepted but every call then fails
    /// with an encode or decode error.
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    fn malformed(&self, detail: impl Into<String>) -> DecodeError {
        DecodeError::Malformed {
            format: self.format,
            detail: detail.into(),
        }
    }
}

impl Codec for RasterCodec {
    fn format(&self) -> Format {
        self.format
    }

    fn decode(&self, source: &SourceDocument) -> Result<PageSequence, DecodeError> {
        let bytes = source.bytes();
        if Format::sniff(bytes) != Some(self.format) {
            return Err(self.malformed(format!("bytes do not start with a {} signature", self.format)));
        }
        let image_format = self
            .format
            .image_format()
            .ok_or_else(|| self.malformed("not a raster format"))?;
        let image = image::load_from_memory_with_format(bytes, image_format)
            .map_err(|e| self.malformed(e.to_string()))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(self.malformed("image has zero width or height"));
        }
        debug!(
            "Decoded {} image {}x{} ({} bytes)",
            self.format,
            image.width(),
            image.height(),
            bytes.len()
        );
        let page = RasterPage::with_encoded(image, self.format, source.shared_bytes());
        Ok(PageSequence::new(vec![Page::new(0, PageContent::Raster(page))]))
    }

    fn encode(&self, pages: &PageSequence, config: &PipelineConfig) -> Result<Vec<u8>, EncodeError> {
        let raster = match pages.pages() {
            [page] => match &page.content {
                PageContent::Raster(r) => r,
                other => {
                    return Err(EncodeError::UnsupportedFeature {
                        from: other.kind().into(),
                        to: self.format,
                        detail: "only pixel content can be written as an image; rasterize first"
                            .into(),
                    })
                }
            },
            _ => {
                return Err(EncodeError::UnsupportedFeature {
                    from: format!("{} pages", pages.len()),
                    to: self.format,
                    detail: "an image file holds exactly one page".into(),
                })
            }
        };

        if let Some(encoded) = raster.encoded.as_ref().filter(|e| e.format == self.format) {
            return Ok(encoded.bytes.to_vec());
        }
        encode::encode_raster(&raster.image, self.format, config.jpeg_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextPage;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        encode::encode_png(&DynamicImage::ImageRgba8(img), encode::PngEffort::Default).unwrap()
    }

    #[test]
    fn decodes_one_page() {
        let src = SourceDocument::new(png_bytes(6, 4), Format::Png);
        let seq = RasterCodec::new(Format::Png).decode(&src).unwrap();
        assert_eq!(seq.len(), 1);
        let PageContent::Raster(r) = &seq.get(0).unwrap().content else {
            panic!("expected raster page");
        };
        assert_eq!((r.width(), r.height()), (6, 4));
        assert_eq!(r.encoded.as_ref().map(|e| e.format), Some(Format::Png));
    }

    #[test]
    fn mislabelled_bytes_are_malformed() {
        let src = SourceDocument::new(png_bytes(2, 2), Format::Jpeg);
        let err = RasterCodec::new(Format::Jpeg).decode(&src).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { format: Format::Jpeg, .. }));
    }

    #[test]
    fn same_format_reuses_original_bytes() {
        let bytes = png_bytes(3, 3);
        let codec = RasterCodec::new(Format::Png);
        let seq = codec.decode(&SourceDocument::new(bytes.clone(), Format::Png)).unwrap();
        let out = codec.encode(&seq, &PipelineConfig::default()).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn converts_between_raster_formats() {
        let seq = RasterCodec::new(Format::Png)
            .decode(&SourceDocument::new(png_bytes(5, 7), Format::Png))
            .unwrap();
        for target in [Format::Jpeg, Format::Webp] {
            let out = RasterCodec::new(target)
                .encode(&seq, &PipelineConfig::default())
                .unwrap();
            assert_eq!(Format::sniff(&out), Some(target));
            let back = RasterCodec::new(target)
                .decode(&SourceDocument::new(out, target))
                .unwrap();
            let PageContent::Raster(r) = &back.get(0).unwrap().content else {
                panic!("expected raster page");
            };
            assert_eq!((r.width(), r.height()), (5, 7));
        }
    }

    #[test]
    fn text_and_multi_page_inputs_are_unsupported() {
        let codec = RasterCodec::new(Format::Png);
        let text: PageSequence = vec![Page::new(0, PageContent::Text(TextPage::default()))]
            .into_iter()
            .collect();
        assert!(matches!(
            codec.encode(&text, &PipelineConfig::default()),
            Err(EncodeError::UnsupportedFeature { .. })
        ));

        let one = codec
            .decode(&SourceDocument::new(png_bytes(2, 2), Format::Png))
            .unwrap();
        let two = PageSequence::concat([&one, &one]);
        assert!(matches!(
            codec.encode(&two, &PipelineConfig::default()),
            Err(EncodeError::UnsupportedFeature { .. })
        ));
    }
}

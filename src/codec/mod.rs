//! Codec adapters: translate between a format's bytes and the page model.
//!
//! Each adapter is a pure function pair over byte buffers. The orchestrator
//! picks one adapter per input and one for the output via [`codec_for`];
//! nothing downstream of that choice inspects format tags again.
//!
//! | Adapter | decode | encode |
//! |---------|--------|--------|
//! | [`pdf::PdfCodec`] | one vector page per PDF page | vector, raster and text pages |
//! | [`raster::RasterCodec`] | one raster page | exactly one raster page |
//! | [`docx::DocxCodec`] | one text page | text pages |

pub mod docx;
pub mod pdf;
pub mod raster;

use crate::config::PipelineConfig;
use crate::error::{DecodeError, EncodeError};
use crate::format::Format;
use crate::model::{PageSequence, SourceDocument};

/// Decode and encode one container format.
pub trait Codec: Send + Sync {
    fn format(&self) -> Format;

    /// Parse `source` into pages. Fails with [`DecodeError::Malformed`] when
    /// the bytes are not a valid instance of the format.
    fn decode(&self, source: &SourceDocument) -> Result<PageSequence, DecodeError>;

    /// Serialise `pages`. Fails with [`EncodeError::UnsupportedFeature`] when
    /// a page cannot be represented in this format.
    fn encode(&self, pages: &PageSequence, config: &PipelineConfig) -> Result<Vec<u8>, EncodeError>;
}

/// The adapter for `format`.
pub fn codec_for(format: Format) -> Box<dyn Codec> {
    match format {
        Format::Pdf => Box::new(pdf::PdfCodec),
        Format::Png | Format::Jpeg | Format::Webp => Box::new(raster::RasterCodec::new(format)),
        Format::Docx => Box::new(docx::DocxCodec),
    }
}

/// Decode with the codec matching the document's own tag.
pub fn decode(source: &SourceDocument) -> Result<PageSequence, DecodeError> {
    codec_for(source.format()).decode(source)
}

/// Encode with the codec for `target`.
pub fn encode(
    pages: &PageSequence,
    target: Format,
    config: &PipelineConfig,
) -> Result<Vec<u8>, EncodeError> {
    codec_for(target).encode(pages, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_format_has_a_codec() {
        for f in Format::ALL {
            assert_eq!(codec_for(f).format(), f);
        }
    }

    #[test]
    fn garbage_is_malformed_for_every_codec() {
        for f in Format::ALL {
            let src = SourceDocument::new(b"not a real file".to_vec(), f);
            let err = decode(&src).unwrap_err();
            assert!(
                matches!(err, DecodeError::Malformed { format, .. } if format == f),
                "{f}: {err:?}"
            );
        }
    }
}

//! ConvertFormat: bridge decoded content to what the target codec accepts.
//!
//! | From \ To | pdf | png / jpeg / webp | docx |
//! |-----------|-----|-------------------|------|
//! | vector page | as is | unsupported (use Rasterize) | extracted text |
//! | raster page | image page | re-encoded | unsupported (no OCR) |
//! | text page | laid out | unsupported (use Rasterize) | as is |
//!
//! Only the vector-to-Word bridge does work here. Unsupported pairs pass
//! through unchanged and the target codec rejects them with
//! `UnsupportedFeature` once the job reaches the encoding stage.

use crate::error::DecodeError;
use crate::format::Format;
use crate::model::{PageContent, PageSequence};
use crate::transform::text;

/// Map `pages` onto content the `target` codec can encode.
pub fn convert(pages: PageSequence, target: Format) -> Result<PageSequence, DecodeError> {
    let needs_text = target == Format::Docx
        && pages
            .iter()
            .any(|p| matches!(p.content, PageContent::Pdf(_)));
    if needs_text {
        text::extract_text(&pages)
    } else {
        Ok(pages)
    }
}

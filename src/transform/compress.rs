//! Compress: re-encode with format-native size controls.
//!
//! ## Images
//!
//! The image is first shrunk to the tier's longest edge. JPEG output then
//! searches downwards from the tier's quality in steps of
//! [`JPEG_QUALITY_STEP`] until it fits `target_size_bytes` or reaches
//! [`MIN_JPEG_QUALITY`]. PNG is re-encoded with best compression; WebP is
//! re-encoded losslessly, so only downscaling shrinks it.
//!
//! ## PDFs
//!
//! Every tier prunes unreachable objects and Flate-compresses plain streams.
//! Medium and High also strip metadata and re-encode embedded JPEGs; High
//! halves their dimensions and drops the info dictionary.
//!
//! Whatever the format, the original bytes win when the candidate is not
//! smaller. They decoded, so they are known to be valid.

use crate::codec::pdf::jpeg_components;
use crate::config::{CompressionProfile, PipelineConfig, JPEG_QUALITY_STEP, MIN_JPEG_QUALITY};
use crate::error::{EncodeError, PipelineError};
use crate::format::Format;
use crate::model::{PageContent, PageSequence, PdfSource, RasterPage, SourceDocument};
use crate::pipeline::encode::{self, PngEffort};
use image::imageops::FilterType;
use image::DynamicImage;
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info};

/// Compressed bytes of `source`, in its own format.
pub fn compress(
    source: &SourceDocument,
    pages: &PageSequence,
    profile: CompressionProfile,
    config: &PipelineConfig,
) -> Result<Vec<u8>, PipelineError> {
    let candidate = match source.format() {
        Format::Pdf => {
            let pdf = pages.single_pdf_source().ok_or_else(|| {
                PipelineError::Internal("decoded PDF has no vector pages".into())
            })?;
            compress_pdf(pdf, profile)?
        }
        Format::Png | Format::Jpeg | Format::Webp => {
            let raster = match pages.pages() {
                [page] => match &page.content {
                    PageContent::Raster(r) => r,
                    _ => {
                        return Err(PipelineError::Internal(
                            "decoded image is not a raster page".into(),
                        ))
                    }
                },
                _ => {
                    return Err(PipelineError::Internal(format!(
                        "decoded image has {} pages",
                        pages.len()
                    )))
                }
            };
            compress_raster(raster, source.format(), profile, config.target_size_bytes)?
        }
        Format::Docx => {
            return Err(EncodeError::UnsupportedFeature {
                from: "text page".into(),
                to: Format::Docx,
                detail: "Word documents have no compression controls".into(),
            }
            .into())
        }
    };

    if candidate.len() >= source.len() {
        info!(
            "Compressed {} is not smaller ({} ≥ {} bytes); keeping the original",
            source.format(),
            candidate.len(),
            source.len()
        );
        return Ok(source.bytes().to_vec());
    }
    info!(
        "Compressed {}: {} → {} bytes",
        source.format(),
        source.len(),
        candidate.len()
    );
    Ok(candidate)
}

// ── Raster ───────────────────────────────────────────────────────────────

/// Re-encode one image under `profile`.
pub fn compress_raster(
    raster: &RasterPage,
    format: Format,
    profile: CompressionProfile,
    target_size_bytes: Option<u64>,
) -> Result<Vec<u8>, EncodeError> {
    let image = shrink_to(&raster.image, profile.max_edge);
    match format {
        Format::Jpeg => {
            let mut quality = profile.jpeg_quality;
            loop {
                let out = encode::encode_jpeg(&image, quality)?;
                let fits = target_size_bytes.map_or(true, |t| out.len() as u64 <= t);
                if fits || quality <= MIN_JPEG_QUALITY {
                    debug!("JPEG at quality {}: {} bytes", quality, out.len());
                    return Ok(out);
                }
                quality = quality.saturating_sub(JPEG_QUALITY_STEP).max(MIN_JPEG_QUALITY);
            }
        }
        Format::Png => encode::encode_png(&image, PngEffort::Best),
        Format::Webp => encode::encode_webp(&image),
        Format::Pdf | Format::Docx => Err(EncodeError::UnsupportedFeature {
            from: "raster page".into(),
            to: format,
            detail: "not a raster format".into(),
        }),
    }
}

/// `image` shrunk so its longest edge is at most `max_edge`.
fn shrink_to(image: &DynamicImage, max_edge: u32) -> DynamicImage {
    if image.width().max(image.height()) <= max_edge {
        return image.clone();
    }
    debug!(
        "Downscaling {}x{} to fit {} px",
        image.width(),
        image.height(),
        max_edge
    );
    image.resize(max_edge, max_edge, FilterType::Lanczos3)
}

// ── PDF ──────────────────────────────────────────────────────────────────

/// Run the PDF passes of `profile` over a copy of `source`.
pub fn compress_pdf(source: &PdfSource, profile: CompressionProfile) -> Result<Vec<u8>, EncodeError> {
    let mut doc = source.document().clone();
    if profile.strip_metadata {
        strip_metadata(&mut doc);
    }
    if profile.drop_info {
        doc.trailer.remove(b"Info");
    }
    if let Some(quality) = profile.pdf_image_quality {
        let replaced = recompress_images(&mut doc, quality, profile.pdf_image_downscale);
        debug!("Re-encoded {} embedded JPEG images", replaced);
    }
    let pruned = doc.prune_objects();
    debug!("Pruned {} unreachable objects", pruned.len());
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| EncodeError::Malformed {
        format: Format::Pdf,
        detail: format!("failed to serialise: {}", e),
    })?;
    Ok(buf)
}

fn strip_metadata(doc: &mut Document) {
    for object in doc.objects.values_mut() {
        let dict = match object {
            Object::Dictionary(d) => d,
            Object::Stream(s) => &mut s.dict,
            _ => continue,
        };
        dict.remove(b"Metadata");
        dict.remove(b"PieceInfo");
        if dict.type_is(b"Page") {
            dict.remove(b"Thumb");
        }
    }
}

/// Re-encode RGB `DCTDecode` images, keeping each only if it shrank.
fn recompress_images(doc: &mut Document, quality: u8, downscale: bool) -> usize {
    let candidates: Vec<ObjectId> = doc
        .objects
        .iter()
        .filter_map(|(id, obj)| match obj {
            Object::Stream(s) if is_plain_rgb_jpeg(s) => Some(*id),
            _ => None,
        })
        .collect();

    let mut replaced = 0;
    for id in candidates {
        let Some(Object::Stream(stream)) = doc.objects.get_mut(&id) else {
            continue;
        };
        let Ok(image) = image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
        else {
            continue;
        };
        let image = if downscale && image.width() >= 2 && image.height() >= 2 {
            image.resize_exact(image.width() / 2, image.height() / 2, FilterType::Lanczos3)
        } else {
            image
        };
        let Ok(bytes) = encode::encode_jpeg(&image, quality) else {
            continue;
        };
        if bytes.len() >= stream.content.len() {
            continue;
        }
        stream.dict.set("Width", image.width() as i64);
        stream.dict.set("Height", image.height() as i64);
        stream.dict.remove(b"DecodeParms");
        stream.set_content(bytes);
        stream.allows_compression = false;
        replaced += 1;
    }
    replaced
}

/// An image stream that is a single-filter, 3-component JPEG with no mask
/// or decode array.
fn is_plain_rgb_jpeg(stream: &lopdf::Stream) -> bool {
    let dict = &stream.dict;
    let is_image = matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image");
    let is_dct = match dict.get(b"Filter") {
        Ok(Object::Name(n)) => n == b"DCTDecode",
        Ok(Object::Array(a)) => {
            a.len() == 1 && matches!(&a[0], Object::Name(n) if n == b"DCTDecode")
        }
        _ => false,
    };
    is_image
        && is_dct
        && dict.get(b"SMask").is_err()
        && dict.get(b"Mask").is_err()
        && dict.get(b"Decode").is_err()
        && jpeg_components(&stream.content) == Some(3)
}

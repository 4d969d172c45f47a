//! Raster encoding: `DynamicImage` → PNG, JPEG or WebP bytes, and data URIs.
//!
//! Rendered pages always leave the pipeline as PNG: lossless, so rendered
//! text stays crisp. JPEG is used only when the caller asks for it (format
//! conversion, compression of JPEG sources); alpha is flattened onto white
//! first because JPEG has no alpha channel.

use crate::error::EncodeError;
use crate::format::Format;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// How hard the PNG encoder works.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngEffort {
    /// Default zlib level; used for rendered pages.
    Default,
    /// Best compression with adaptive filtering; used by Compress.
    Best,
}

/// Encode a rendered page as PNG.
pub fn encode_page(img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
    let buf = encode_png(img, PngEffort::Default)?;
    debug!(
        "Encoded {}x{} page → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Encode `img` in a raster `format`. `quality` (1–100) applies to JPEG only.
pub fn encode_raster(img: &DynamicImage, format: Format, quality: u8) -> Result<Vec<u8>, EncodeError> {
    match format {
        Format::Png => encode_png(img, PngEffort::Default),
        Format::Jpeg => encode_jpeg(img, quality),
        Format::Webp => encode_webp(img),
        Format::Pdf | Format::Docx => Err(EncodeError::UnsupportedFeature {
            from: "pixel buffer".into(),
            to: format,
            detail: "not a raster format".into(),
        }),
    }
}

pub fn encode_png(img: &DynamicImage, effort: PngEffort) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    let encoder = match effort {
        PngEffort::Default => PngEncoder::new(&mut buf),
        PngEffort::Best => {
            PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
        }
    };
    img.write_with_encoder(encoder)
        .map_err(|e| malformed(Format::Png, e))?;
    Ok(buf)
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let rgb = DynamicImage::ImageRgb8(flatten_alpha(img));
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| malformed(Format::Jpeg, e))?;
    Ok(buf.into_inner())
}

/// Lossless WebP; the encoder bundled with `image` has no lossy mode.
pub fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let mut buf = Vec::new();
    rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        .map_err(|e| malformed(Format::Webp, e))?;
    Ok(buf)
}

/// Composite any alpha channel onto a white background.
pub fn flatten_alpha(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// `data:<mime>;base64,<payload>`.
pub fn data_uri(format: Format, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", format.mime(), STANDARD.encode(bytes))
}

fn malformed(format: Format, e: image::ImageError) -> EncodeError {
    EncodeError::Malformed {
        format,
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_small_image() {
        let png = encode_page(&red_square()).expect("encode should succeed");
        assert_eq!(Format::sniff(&png), Some(Format::Png));
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn each_raster_format_sniffs_back() {
        for f in [Format::Png, Format::Jpeg, Format::Webp] {
            let bytes = encode_raster(&red_square(), f, 80).unwrap();
            assert_eq!(Format::sniff(&bytes), Some(f), "{f}");
        }
    }

    #[test]
    fn non_raster_target_is_unsupported() {
        let err = encode_raster(&red_square(), Format::Pdf, 80).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedFeature { .. }));
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        assert_eq!(flatten_alpha(&img).get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn data_uri_prefix() {
        let uri = data_uri(Format::Png, &[1, 2, 3]);
        assert_eq!(uri, "data:image/png;base64,AQID");
    }
}

//! Format tags understood by the pipeline.
//!
//! A [`Format`] is chosen once per job, either from the caller's declared MIME
//! type or by sniffing magic bytes, and from then on selects the codec. No
//! other module compares MIME strings.

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// The five container formats the pipeline reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Png,
    Jpeg,
    Webp,
    /// Word (`.docx`). Decoding keeps text only.
    Docx,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Pdf,
        Format::Png,
        Format::Jpeg,
        Format::Webp,
        Format::Docx,
    ];

    /// The MIME type used on output artifacts.
    pub fn mime(self) -> &'static str {
        match self {
            Format::Pdf => "application/pdf",
            Format::Png => "image/png",
            Format::Jpeg => "image/jpeg",
            Format::Webp => "image/webp",
            Format::Docx => DOCX_MIME,
        }
    }

    /// Preferred file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Png => "png",
            Format::Jpeg => "jpg",
            Format::Webp => "webp",
            Format::Docx => "docx",
        }
    }

    /// Parse a declared MIME type. Parameters after `;` are ignored.
    pub fn from_mime(mime: &str) -> Result<Self, DecodeError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Ok(Format::Pdf),
            "image/png" => Ok(Format::Png),
            "image/jpeg" | "image/jpg" => Ok(Format::Jpeg),
            "image/webp" => Ok(Format::Webp),
            DOCX_MIME => Ok(Format::Docx),
            _ => Err(DecodeError::UnknownFormat {
                declared: mime.to_string(),
            }),
        }
    }

    /// Parse a file extension (case-insensitive, with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Format::Pdf),
            "png" => Some(Format::Png),
            "jpg" | "jpeg" => Some(Format::Jpeg),
            "webp" => Some(Format::Webp),
            "docx" => Some(Format::Docx),
            _ => None,
        }
    }

    /// Identify a buffer by its magic bytes.
    ///
    /// A ZIP container is reported as [`Format::Docx`]; the Word codec rejects
    /// archives that are not Word documents when it decodes them.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            Some(Format::Pdf)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Format::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Format::Jpeg)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Format::Webp)
        } else if bytes.starts_with(b"PK\x03\x04") {
            Some(Format::Docx)
        } else {
            None
        }
    }

    /// The `image` crate format for raster tags.
    pub(crate) fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            Format::Png => Some(image::ImageFormat::Png),
            Format::Jpeg => Some(image::ImageFormat::Jpeg),
            Format::Webp => Some(image::ImageFormat::WebP),
            Format::Pdf | Format::Docx => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_roundtrip_for_every_tag() {
        for f in Format::ALL {
            assert_eq!(Format::from_mime(f.mime()).unwrap(), f);
        }
    }

    #[test]
    fn mime_accepts_jpg_alias_and_parameters() {
        assert_eq!(Format::from_mime("image/jpg").unwrap(), Format::Jpeg);
        assert_eq!(
            Format::from_mime("application/PDF; charset=binary").unwrap(),
            Format::Pdf
        );
    }

    #[test]
    fn unknown_mime_is_rejected() {
        let err = Format::from_mime("video/mp4").unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownFormat {
                declared: "video/mp4".into()
            }
        );
    }

    #[test]
    fn sniff_magic_bytes() {
        assert_eq!(Format::sniff(b"%PDF-1.7\n"), Some(Format::Pdf));
        assert_eq!(Format::sniff(b"\x89PNG\r\n\x1a\n...."), Some(Format::Png));
        assert_eq!(Format::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(Format::Jpeg));
        assert_eq!(Format::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(Format::Webp));
        assert_eq!(Format::sniff(b"PK\x03\x04rest"), Some(Format::Docx));
        assert_eq!(Format::sniff(b"RIFF\0\0\0\0WAVE"), None);
        assert_eq!(Format::sniff(b""), None);
    }

    #[test]
    fn extensions() {
        assert_eq!(Format::from_extension(".JPEG"), Some(Format::Jpeg));
        assert_eq!(Format::from_extension("docx"), Some(Format::Docx));
        assert_eq!(Format::from_extension("mp4"), None);
        assert_eq!(Format::Jpeg.extension(), "jpg");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Format::Webp).unwrap(), "\"webp\"");
    }
}

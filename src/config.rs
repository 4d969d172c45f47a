//! Configuration types for pipeline jobs.
//!
//! Every knob lives in [`PipelineConfig`], built through
//! [`PipelineConfigBuilder`]. Setters clamp to valid ranges; `build()` checks
//! the rest. A config is cheap to clone and can be shared across jobs.

use crate::error::PipelineError;
use crate::pipeline::render::PageRenderer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration shared by every job run with it.
///
/// # Example
/// ```rust
/// use toolsherd::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .concurrency(8)
///     .max_rendered_pixels(4000)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Pages encoded in parallel while rasterising. Default: 4.
    pub concurrency: usize,

    /// Scale used by callers that do not pick one (the CLI). Default: 1.0.
    ///
    /// At 1.0 one PDF point becomes one pixel.
    pub default_scale: f32,

    /// Longest edge of a rendered page, in pixels. Default: 10 000.
    ///
    /// Targets above this are shrunk proportionally and a warning is logged.
    pub max_rendered_pixels: u32,

    /// Upper bound on pages in one encoded document. Default: 10 000.
    pub max_pages: usize,

    /// JPEG quality for format conversion. Range 1–100. Default: 92.
    pub jpeg_quality: u8,

    /// Raster compression keeps lowering JPEG quality until the output is
    /// under this many bytes. `None` encodes once at the tier's quality.
    /// Default: 1 MiB.
    pub target_size_bytes: Option<u64>,

    /// Body font size for text laid out onto PDF pages. Default: 12.
    pub text_font_size: f32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Page renderer used by Rasterize. `None` binds pdfium on first use.
    pub renderer: Option<Arc<dyn PageRenderer>>,

    /// Optional job event callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            default_scale: 1.0,
            max_rendered_pixels: 10_000,
            max_pages: 10_000,
            jpeg_quality: 92,
            target_size_bytes: Some(1024 * 1024),
            text_font_size: 12.0,
            download_timeout_secs: 120,
            renderer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("concurrency", &self.concurrency)
            .field("default_scale", &self.default_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("max_pages", &self.max_pages)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("target_size_bytes", &self.target_size_bytes)
            .field("text_font_size", &self.text_font_size)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("renderer", &self.renderer.as_ref().map(|r| r.name().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn default_scale(mut self, scale: f32) -> Self {
        self.config.default_scale = scale;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(16);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n.max(1);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn target_size_bytes(mut self, bytes: Option<u64>) -> Self {
        self.config.target_size_bytes = bytes;
        self
    }

    pub fn text_font_size(mut self, pt: f32) -> Self {
        self.config.text_font_size = pt.clamp(4.0, 72.0);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if !(c.default_scale.is_finite() && c.default_scale > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "default scale must be > 0, got {}",
                c.default_scale
            )));
        }
        if c.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.target_size_bytes == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "target size must be at least 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Compression tiers ────────────────────────────────────────────────────

/// Quality tier for `Compress`. Low favours fidelity, High favours size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionLevel {
    /// The concrete knobs for this tier.
    pub fn profile(self) -> CompressionProfile {
        match self {
            CompressionLevel::Low => CompressionProfile {
                jpeg_quality: 85,
                max_edge: 3840,
                pdf_image_quality: None,
                pdf_image_downscale: false,
                strip_metadata: false,
                drop_info: false,
            },
            CompressionLevel::Medium => CompressionProfile {
                jpeg_quality: 70,
                max_edge: 1920,
                pdf_image_quality: Some(75),
                pdf_image_downscale: false,
                strip_metadata: true,
                drop_info: false,
            },
            CompressionLevel::High => CompressionProfile {
                jpeg_quality: 50,
                max_edge: 1280,
                pdf_image_quality: Some(50),
                pdf_image_downscale: true,
                strip_metadata: true,
                drop_info: true,
            },
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompressionLevel::Low => "low",
            CompressionLevel::Medium => "medium",
            CompressionLevel::High => "high",
        })
    }
}

/// Format-native size controls derived from a [`CompressionLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionProfile {
    /// Starting JPEG quality for raster images.
    pub jpeg_quality: u8,
    /// Longest raster edge in pixels; larger images are downscaled.
    pub max_edge: u32,
    /// Re-encode quality for JPEG images embedded in PDFs. `None` leaves them.
    pub pdf_image_quality: Option<u8>,
    /// Halve embedded JPEG dimensions when re-encoding.
    pub pdf_image_downscale: bool,
    /// Strip XMP metadata, thumbnails and `PieceInfo` from PDFs.
    pub strip_metadata: bool,
    /// Drop the PDF document information dictionary.
    pub drop_info: bool,
}

/// Lowest JPEG quality the size search will try.
pub const MIN_JPEG_QUALITY: u8 = 20;

/// Quality step of the size search.
pub const JPEG_QUALITY_STEP: u8 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.default_scale, 1.0);
        assert_eq!(c.max_rendered_pixels, 10_000);
        assert_eq!(c.jpeg_quality, 92);
        assert_eq!(c.target_size_bytes, Some(1_048_576));
        assert!(c.renderer.is_none());
    }

    #[test]
    fn setters_clamp() {
        let c = PipelineConfig::builder()
            .concurrency(0)
            .jpeg_quality(0)
            .text_font_size(500.0)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.text_font_size, 72.0);
    }

    #[test]
    fn build_rejects_bad_scale() {
        for bad in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = PipelineConfig::builder()
                .default_scale(bad)
                .build()
                .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidConfig(_)), "{bad}");
        }
    }

    #[test]
    fn tiers_trade_fidelity_for_size() {
        let low = CompressionLevel::Low.profile();
        let med = CompressionLevel::Medium.profile();
        let high = CompressionLevel::High.profile();
        assert!(low.jpeg_quality > med.jpeg_quality && med.jpeg_quality > high.jpeg_quality);
        assert!(low.max_edge > med.max_edge && med.max_edge > high.max_edge);
        assert!(!low.strip_metadata && med.strip_metadata && high.drop_info);
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", PipelineConfig::default());
        assert!(s.contains("concurrency: 4"));
        assert!(s.contains("renderer: None"));
    }
}

//! Page rendering: rasterise PDF pages to `DynamicImage`.
//!
//! Rendering sits behind the [`PageRenderer`] trait so the orchestrator does
//! not care which engine draws the pixels. The production backend is
//! [`PdfiumRenderer`]; tests inject a deterministic renderer through
//! [`crate::config::PipelineConfig::renderer`].
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which keeps
//! thread-local state and is not safe to drive from async contexts.
//! [`PageRenderer::render`] is synchronous; the job runs the whole
//! Rasterize transform on the blocking pool so Tokio worker threads never
//! stall on CPU-heavy rendering.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming a pdfium library file or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// One page to render, and the pixel size to render it at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// 0-based page index inside the PDF handed to the renderer.
    pub page_index: usize,
    /// 1-based position in the job's output, for error reporting.
    pub page_number: usize,
    pub width: u32,
    pub height: u32,
}

/// Draws PDF pages into pixel buffers.
///
/// `render` returns exactly one image per target, in target order.
pub trait PageRenderer: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    fn render(
        &self,
        pdf: &[u8],
        targets: &[RenderTarget],
    ) -> Result<Vec<DynamicImage>, PipelineError>;
}

/// The renderer a job should use: the configured one, or pdfium.
pub fn renderer_for(config: &PipelineConfig) -> Arc<dyn PageRenderer> {
    match &config.renderer {
        Some(r) => Arc::clone(r),
        None => Arc::new(PdfiumRenderer::from_env()),
    }
}

// ── pdfium backend ───────────────────────────────────────────────────────

/// Renders through a dynamically bound pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// Use `PDFIUM_LIB_PATH` when set, else the system library.
    pub fn from_env() -> Self {
        Self {
            library_path: std::env::var_os(PDFIUM_LIB_PATH_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Bind to the library at `path` (a file, or a directory holding it).
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, PipelineError> {
        let bindings = match &self.library_path {
            Some(path) if path.is_dir() => {
                let dir = path.to_string_lossy();
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&*dir))
            }
            Some(path) => Pdfium::bind_to_library(path.as_path()),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PipelineError::RendererUnavailable(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PageRenderer for PdfiumRenderer {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn render(
        &self,
        pdf: &[u8],
        targets: &[RenderTarget],
    ) -> Result<Vec<DynamicImage>, PipelineError> {
        let pdfium = self.bind()?;

        let first_page = targets.first().map(|t| t.page_number).unwrap_or(1);
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PipelineError::RenderFailed {
                page: first_page,
                detail: format!("pdfium could not open document: {:?}", e),
            })?;

        let pages = document.pages();
        info!("pdfium loaded document: {} pages", pages.len());

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let page = pages
                .get(pdfium_page_index(target)?)
                .map_err(|e| PipelineError::RenderFailed {
                    page: target.page_number,
                    detail: format!("{:?}", e),
                })?;

            let render_config = PdfRenderConfig::new()
                .set_target_width(target.width as i32)
                .set_maximum_height(target.height as i32);

            let bitmap =
                page.render_with_config(&render_config)
                    .map_err(|e| PipelineError::RenderFailed {
                        page: target.page_number,
                        detail: format!("{:?}", e),
                    })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                target.page_number,
                image.width(),
                image.height()
            );
            results.push(image);
        }

        Ok(results)
    }
}

/// pdfium addresses pages with a `u16`; larger indices cannot be rendered.
fn pdfium_page_index(target: &RenderTarget) -> Result<u16, PipelineError> {
    u16::try_from(target.page_index).map_err(|_| PipelineError::RenderFailed {
        page: target.page_number,
        detail: format!(
            "page index {} is beyond pdfium's {}-page limit",
            target.page_index,
            u32::from(u16::MAX) + 1
        ),
    })
}

/// `true` when a pdfium library can be bound with the current environment.
pub fn pdfium_available() -> bool {
    PdfiumRenderer::from_env().bind().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;

    impl PageRenderer for Blank {
        fn name(&self) -> &str {
            "blank"
        }

        fn render(
            &self,
            _pdf: &[u8],
            targets: &[RenderTarget],
        ) -> Result<Vec<DynamicImage>, PipelineError> {
            Ok(targets
                .iter()
                .map(|t| DynamicImage::new_rgb8(t.width, t.height))
                .collect())
        }
    }

    #[test]
    fn configured_renderer_wins() {
        let config = PipelineConfig::builder()
            .renderer(Arc::new(Blank))
            .build()
            .unwrap();
        assert_eq!(renderer_for(&config).name(), "blank");
        assert_eq!(renderer_for(&PipelineConfig::default()).name(), "pdfium");
    }

    #[test]
    fn page_index_past_u16_fails_instead_of_wrapping() {
        let target = |page_index| RenderTarget {
            page_index,
            page_number: page_index + 1,
            width: 1,
            height: 1,
        };
        assert_eq!(pdfium_page_index(&target(65_535)).unwrap(), 65_535);
        match pdfium_page_index(&target(65_536)) {
            Err(PipelineError::RenderFailed { page, .. }) => assert_eq!(page, 65_537),
            other => panic!("expected RenderFailed, got {:?}", other),
        }
    }

    #[test]
    fn missing_library_path_is_unavailable() {
        let r = PdfiumRenderer::with_library_path("/definitely/not/here/libpdfium.so");
        assert!(matches!(
            r.bind(),
            Err(PipelineError::RendererUnavailable(_))
        ));
    }
}

//! Stages shared by the orchestrator, the streaming API and the CLI.
//!
//! Each submodule does one step and knows nothing about jobs, so each can be
//! tested on its own and swapped (e.g. another rendering backend) without
//! touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ [ job: decode ─▶ transform ─▶ encode ] ──▶ output file
//! (path/URL)           │          │           │
//!                 postprocess   render      encode
//!                 (text runs)  (pdfium)   (PNG/JPEG/WebP)
//! ```
//!
//! 1. [`input`] : read a local file or download a URL into a
//!    `SourceDocument`; the only stage with network I/O, and it runs before
//!    a job exists
//! 2. [`render`]: rasterise PDF pages; runs on the blocking pool because
//!    pdfium is not async-safe
//! 3. [`encode`]: encode pixel buffers as PNG, JPEG or WebP, and wrap
//!    artifacts as data URIs
//! 4. [`postprocess`]: deterministic cleanup of text pulled from PDF
//!    content streams and Word runs

pub mod encode;
pub mod input;
pub mod postprocess;
pub mod render;

//! The page/content model: the pivot representation between codecs.
//!
//! Every decode produces a private [`PageSequence`]; transforms build new
//! sequences from old ones and never mutate a sequence in place. Pages are
//! cheap to clone because their payloads sit behind `Arc`s, so the same page
//! can appear in several sequences (or several times in one) during a job.

use crate::error::DecodeError;
use crate::format::Format;
use image::DynamicImage;
use lopdf::{Document, Object, ObjectId};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// US Letter, used when a PDF page has no usable MediaBox.
pub const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Depth limit when walking a page's `Parent` chain.
const MAX_TREE_DEPTH: usize = 32;

// ── SourceDocument ───────────────────────────────────────────────────────

/// An immutable input buffer plus its format tag.
#[derive(Clone)]
pub struct SourceDocument {
    bytes: Arc<[u8]>,
    format: Format,
}

impl SourceDocument {
    pub fn new(bytes: impl Into<Arc<[u8]>>, format: Format) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    /// Build from a caller-declared MIME type.
    pub fn from_mime(bytes: impl Into<Arc<[u8]>>, mime: &str) -> Result<Self, DecodeError> {
        Ok(Self::new(bytes, Format::from_mime(mime)?))
    }

    /// Build by sniffing magic bytes.
    pub fn sniffed(bytes: impl Into<Arc<[u8]>>) -> Result<Self, DecodeError> {
        let bytes = bytes.into();
        let format = Format::sniff(&bytes).ok_or_else(|| DecodeError::UnknownFormat {
            declared: describe_magic(&bytes),
        })?;
        Ok(Self { bytes, format })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn describe_magic(bytes: &[u8]) -> String {
    let head: Vec<String> = bytes.iter().take(4).map(|b| format!("{b:02x}")).collect();
    if head.is_empty() {
        "<empty buffer>".to_string()
    } else {
        format!("<unrecognised magic {}>", head.join(" "))
    }
}

// ── PDF payloads ─────────────────────────────────────────────────────────

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// A parsed PDF shared by all of its pages.
pub struct PdfSource {
    id: u64,
    document: Document,
    bytes: Arc<[u8]>,
    page_ids: Vec<ObjectId>,
}

impl PdfSource {
    pub(crate) fn new(document: Document, bytes: Arc<[u8]>) -> Self {
        let page_ids = document.get_pages().values().copied().collect();
        Self {
            id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
            document,
            bytes,
            page_ids,
        }
    }

    /// Process-unique identity, used to import each source once per encode.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The bytes this source was parsed from.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Page object ids in document order.
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Follow a reference to its target; other objects pass through.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Look `key` up on the page, then on its ancestors.
    ///
    /// MediaBox, CropBox, Resources and Rotate are inheritable page
    /// attributes; a page that omits them takes them from the nearest `Pages`
    /// node that defines them.
    pub fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = Some(page_id);
        for _ in 0..MAX_TREE_DEPTH {
            let id = current?;
            let dict = self.document.get_dictionary(id).ok()?;
            if let Ok(value) = dict.get(key) {
                return self.resolve(value);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    fn rect(&self, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
        let arr = self.inherited(page_id, key)?.as_array().ok()?;
        if arr.len() != 4 {
            return None;
        }
        let mut out = [0f32; 4];
        for (slot, value) in out.iter_mut().zip(arr) {
            *slot = number(self.resolve(value)?)?;
        }
        // Normalise so x0 < x1 and y0 < y1.
        Some([
            out[0].min(out[2]),
            out[1].min(out[3]),
            out[0].max(out[2]),
            out[1].max(out[3]),
        ])
    }
}

/// Read an integer or real PDF number.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// One page of a parsed PDF: a handle into its shared source.
#[derive(Clone)]
pub struct PdfPage {
    source: Arc<PdfSource>,
    object_id: ObjectId,
}

impl PdfPage {
    pub(crate) fn new(source: Arc<PdfSource>, object_id: ObjectId) -> Self {
        Self { source, object_id }
    }

    pub fn source(&self) -> &Arc<PdfSource> {
        &self.source
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// 0-based position of this page inside its source document.
    pub fn index_in_source(&self) -> Option<usize> {
        self.source
            .page_ids
            .iter()
            .position(|id| *id == self.object_id)
    }

    /// The effective MediaBox, defaulting to US Letter.
    pub fn media_box(&self) -> [f32; 4] {
        self.source
            .rect(self.object_id, b"MediaBox")
            .unwrap_or([0.0, 0.0, DEFAULT_PAGE_SIZE.0, DEFAULT_PAGE_SIZE.1])
    }

    /// The visible region: CropBox when present, else MediaBox.
    pub fn crop_box(&self) -> [f32; 4] {
        self.source
            .rect(self.object_id, b"CropBox")
            .unwrap_or_else(|| self.media_box())
    }

    /// Page rotation in degrees, normalised to 0, 90, 180 or 270.
    pub fn rotation(&self) -> i64 {
        let raw = self
            .source
            .inherited(self.object_id, b"Rotate")
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);
        raw.rem_euclid(360) / 90 * 90
    }

    /// Displayed size in points, after rotation.
    pub fn size(&self) -> (f32, f32) {
        let [x0, y0, x1, y1] = self.crop_box();
        let (w, h) = (x1 - x0, y1 - y0);
        if self.rotation() % 180 == 0 {
            (w, h)
        } else {
            (h, w)
        }
    }

    /// The page's decoded content stream bytes (all streams concatenated).
    ///
    /// A missing stream object or a filter that cannot be undone is
    /// `Malformed`. A page with no `Contents` is empty.
    pub fn content(&self) -> Result<Vec<u8>, DecodeError> {
        let document = &self.source.document;
        let mut out = Vec::new();
        for id in document.get_page_contents(self.object_id) {
            let stream = document
                .get_object(id)
                .and_then(Object::as_stream)
                .map_err(|e| self.malformed(format!("content stream {:?}: {}", id, e)))?;
            if stream.dict.get(b"Filter").is_err() {
                out.extend_from_slice(&stream.content);
            } else {
                let data = stream.decompressed_content().map_err(|e| {
                    self.malformed(format!("content stream {:?} cannot be decoded: {}", id, e))
                })?;
                out.extend_from_slice(&data);
            }
            out.push(b'\n');
        }
        Ok(out)
    }

    /// A `Malformed` error naming this page (1-based) when its position is known.
    pub(crate) fn malformed(&self, detail: impl fmt::Display) -> DecodeError {
        let detail = match self.index_in_source() {
            Some(i) => format!("page {}: {}", i + 1, detail),
            None => format!("page object {:?}: {}", self.object_id, detail),
        };
        DecodeError::Malformed {
            format: Format::Pdf,
            detail,
        }
    }
}

impl fmt::Debug for PdfPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfPage")
            .field("source", &self.source.id)
            .field("object_id", &self.object_id)
            .finish()
    }
}

// ── Raster and text payloads ─────────────────────────────────────────────

/// An encoded image kept next to its pixels so encoders can reuse it.
#[derive(Clone)]
pub struct EncodedImage {
    pub format: Format,
    pub bytes: Arc<[u8]>,
}

/// A pixel buffer, optionally with the bytes it was decoded from.
#[derive(Clone)]
pub struct RasterPage {
    pub image: Arc<DynamicImage>,
    pub encoded: Option<EncodedImage>,
}

impl RasterPage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            encoded: None,
        }
    }

    pub fn with_encoded(image: DynamicImage, format: Format, bytes: Arc<[u8]>) -> Self {
        Self {
            image: Arc::new(image),
            encoded: Some(EncodedImage { format, bytes }),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl fmt::Debug for RasterPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterPage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("encoded", &self.encoded.as_ref().map(|e| e.format))
            .finish()
    }
}

/// Flat text: an optional heading and its paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPage {
    pub heading: Option<String>,
    pub paragraphs: Vec<String>,
}

impl TextPage {
    pub fn is_blank(&self) -> bool {
        self.heading.is_none() && self.paragraphs.iter().all(|p| p.trim().is_empty())
    }
}

// ── Page and PageSequence ────────────────────────────────────────────────

/// The per-format payload of a page.
#[derive(Debug, Clone)]
pub enum PageContent {
    /// Vector content from a PDF.
    Pdf(PdfPage),
    /// Pixels from an image or a rendered page.
    Raster(RasterPage),
    /// Text without layout.
    Text(TextPage),
}

impl PageContent {
    /// Short label used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PageContent::Pdf(_) => "vector page",
            PageContent::Raster(_) => "raster page",
            PageContent::Text(_) => "text page",
        }
    }
}

/// One page plus its provenance.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based index in the document it was decoded from. Metadata only;
    /// position in the sequence is the ordering authority.
    pub original_index: usize,
    pub content: PageContent,
}

impl Page {
    pub fn new(original_index: usize, content: PageContent) -> Self {
        Self {
            original_index,
            content,
        }
    }

    /// SHA-256 over what the page shows, hex-encoded.
    ///
    /// PDF pages hash their decoded content stream (or, when it cannot be
    /// read, their source and object id), raster pages their dimensions and
    /// pixels, text pages their heading and paragraphs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        match &self.content {
            PageContent::Pdf(p) => {
                hasher.update(b"pdf");
                match p.content() {
                    Ok(bytes) => hasher.update(bytes),
                    Err(_) => {
                        hasher.update(p.source().id().to_be_bytes());
                        hasher.update(p.object_id().0.to_be_bytes());
                    }
                }
            }
            PageContent::Raster(r) => {
                hasher.update(b"raster");
                hasher.update(r.width().to_be_bytes());
                hasher.update(r.height().to_be_bytes());
                hasher.update(r.image.as_bytes());
            }
            PageContent::Text(t) => {
                hasher.update(b"text");
                if let Some(h) = &t.heading {
                    hasher.update(h.as_bytes());
                }
                for p in &t.paragraphs {
                    hasher.update([0]);
                    hasher.update(p.as_bytes());
                }
            }
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// An ordered, immutable-once-built list of pages.
#[derive(Debug, Clone, Default)]
pub struct PageSequence {
    pages: Vec<Page>,
}

impl PageSequence {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Page> {
        self.pages.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Page> {
        self.pages.iter()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    /// Original indices in sequence order.
    pub fn original_indices(&self) -> Vec<usize> {
        self.pages.iter().map(|p| p.original_index).collect()
    }

    /// A new sequence holding every page of `parts`, in order.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a PageSequence>) -> Self {
        Self {
            pages: parts
                .into_iter()
                .flat_map(|s| s.pages.iter().cloned())
                .collect(),
        }
    }

    /// A new sequence whose position `i` holds this sequence's page
    /// `order[i]`. Returns `None` if any position is out of range.
    pub fn select(&self, order: &[usize]) -> Option<Self> {
        let pages = order
            .iter()
            .map(|&i| self.pages.get(i).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(Self { pages })
    }

    /// `true` when every page is vector content from one PDF.
    pub(crate) fn single_pdf_source(&self) -> Option<&Arc<PdfSource>> {
        let mut source: Option<&Arc<PdfSource>> = None;
        for page in &self.pages {
            match &page.content {
                PageContent::Pdf(p) => match source {
                    None => source = Some(p.source()),
                    Some(s) if s.id() == p.source().id() => {}
                    Some(_) => return None,
                },
                _ => return None,
            }
        }
        source
    }
}

impl<'a> IntoIterator for &'a PageSequence {
    type Item = &'a Page;
    type IntoIter = std::slice::Iter<'a, Page>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}

impl FromIterator<Page> for PageSequence {
    fn from_iter<I: IntoIterator<Item = Page>>(iter: I) -> Self {
        Self {
            pages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn text(idx: usize, body: &str) -> Page {
        Page::new(
            idx,
            PageContent::Text(TextPage {
                heading: None,
                paragraphs: vec![body.to_string()],
            }),
        )
    }

    fn seq(bodies: &[&str]) -> PageSequence {
        bodies
            .iter()
            .enumerate()
            .map(|(i, b)| text(i, b))
            .collect()
    }

    #[test]
    fn concat_keeps_document_order() {
        let a = seq(&["a0", "a1"]);
        let b = seq(&["b0"]);
        let merged = PageSequence::concat([&a, &b]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.original_indices(), vec![0, 1, 0]);
        // Sources are untouched.
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn select_builds_new_sequence() {
        let s = seq(&["p0", "p1", "p2"]);
        let r = s.select(&[2, 0, 1]).unwrap();
        assert_eq!(r.original_indices(), vec![2, 0, 1]);
        assert_eq!(s.original_indices(), vec![0, 1, 2]);
        assert!(s.select(&[3]).is_none());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = text(0, "same");
        let b = text(5, "same");
        let c = text(0, "different");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn raster_fingerprint_includes_dimensions() {
        let wide = RasterPage::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            4,
            2,
            Rgb([9, 9, 9]),
        )));
        let tall = RasterPage::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            2,
            4,
            Rgb([9, 9, 9]),
        )));
        let fp = |r: RasterPage| Page::new(0, PageContent::Raster(r)).fingerprint();
        assert_ne!(fp(wide), fp(tall));
    }

    #[test]
    fn sniffed_source_rejects_unknown_magic() {
        let err = SourceDocument::sniffed(b"hello".to_vec()).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownFormat { .. }));
        let ok = SourceDocument::sniffed(b"%PDF-1.4".to_vec()).unwrap();
        assert_eq!(ok.format(), Format::Pdf);
    }
}

//! PDF adapter built on `lopdf`.
//!
//! ## Decoding
//!
//! A PDF decodes to one [`PdfPage`] per page, all sharing one parsed
//! [`PdfSource`]. Nothing is copied per page: a page is a handle (source,
//! object id) and the source stays alive while any page refers to it.
//!
//! ## Encoding
//!
//! Encoding assembles a fresh document:
//!
//! 1. Each distinct source is imported once, its object ids shifted past the
//!    destination's highest id so nothing collides (the same offset scheme a
//!    plain merge uses).
//! 2. Inheritable attributes (MediaBox, CropBox, Resources, Rotate) are copied
//!    onto each page, because the page is about to lose its old parent.
//! 3. A page used twice gets a second page object sharing the same content.
//! 4. Raster pages become one full-page image XObject; text pages are laid
//!    out with the standard Helvetica fonts.
//! 5. Unreachable objects are pruned and streams Flate-compressed.
//!
//! A sequence that is exactly one source's pages in their original order is
//! saved from a clone of that source instead, keeping its outline, forms and
//! metadata intact.

use crate::codec::Codec;
use crate::config::PipelineConfig;
use crate::error::{DecodeError, EncodeError};
use crate::format::Format;
use crate::model::{
    number, Page, PageContent, PageSequence, PdfPage, PdfSource, RasterPage, SourceDocument,
    TextPage,
};
use crate::output::{DocumentMetadata, PageSize};
use crate::pipeline::postprocess;
use image::GenericImageView;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// US Letter in points.
pub const LETTER: (f32, f32) = (612.0, 792.0);

/// Margin around laid-out text, in points.
pub const TEXT_MARGIN: f32 = 72.0;

/// Attributes a page may inherit from its ancestors.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Encodes and decodes `application/pdf`.
pub struct PdfCodec;

impl Codec for PdfCodec {
    fn format(&self) -> Format {
        Format::Pdf
    }

    fn decode(&self, source: &SourceDocument) -> Result<PageSequence, DecodeError> {
        let parsed = Arc::new(parse(source)?);
        if parsed.page_count() == 0 {
            return Err(malformed("document has no pages"));
        }
        debug!(
            "Decoded PDF {}: {} pages, version {}",
            parsed.id(),
            parsed.page_count(),
            parsed.document().version
        );
        Ok(parsed
            .page_ids()
            .iter()
            .enumerate()
            .map(|(i, id)| {
                Page::new(
                    i,
                    PageContent::Pdf(PdfPage::new(Arc::clone(&parsed), *id)),
                )
            })
            .collect())
    }

    fn encode(&self, pages: &PageSequence, config: &PipelineConfig) -> Result<Vec<u8>, EncodeError> {
        if pages.is_empty() {
            return Err(EncodeError::Malformed {
                format: Format::Pdf,
                detail: "cannot write a PDF with no pages".into(),
            });
        }
        if pages.len() > config.max_pages {
            return Err(EncodeError::Malformed {
                format: Format::Pdf,
                detail: format!(
                    "{} pages exceeds the limit of {}",
                    pages.len(),
                    config.max_pages
                ),
            });
        }

        if let Some(source) = whole_source_in_order(pages) {
            debug!("Encoding unchanged PDF {} from its parsed source", source.id());
            let mut doc = source.document().clone();
            return save(&mut doc);
        }

        let mut assembler = Assembler::new(config);
        for page in pages {
            match &page.content {
                PageContent::Pdf(p) => assembler.add_pdf_page(p)?,
                PageContent::Raster(r) => assembler.add_raster_page(r)?,
                PageContent::Text(t) => assembler.add_text_page(t)?,
            }
        }
        let mut doc = assembler.finish()?;
        if doc.get_pages().len() > config.max_pages {
            return Err(EncodeError::Malformed {
                format: Format::Pdf,
                detail: format!(
                    "laid-out text produced more than {} pages",
                    config.max_pages
                ),
            });
        }
        save(&mut doc)
    }
}

/// Parse and vet a PDF buffer.
pub(crate) fn parse(source: &SourceDocument) -> Result<PdfSource, DecodeError> {
    let bytes = source.bytes();
    if !bytes.starts_with(b"%PDF") {
        return Err(malformed("missing %PDF header"));
    }
    let document = Document::load_mem(bytes).map_err(|e| {
        let msg = e.to_string();
        let lower = msg.to_ascii_lowercase();
        if lower.contains("encrypt") || lower.contains("decrypt") || lower.contains("password") {
            DecodeError::Encrypted {
                format: Format::Pdf,
            }
        } else {
            malformed(msg)
        }
    })?;
    if document.trailer.get(b"Encrypt").is_ok() {
        return Err(DecodeError::Encrypted {
            format: Format::Pdf,
        });
    }
    if document.trailer.get(b"Root").is_err() {
        return Err(malformed("trailer has no document catalog"));
    }
    Ok(PdfSource::new(document, source.shared_bytes()))
}

fn malformed(detail: impl Into<String>) -> DecodeError {
    DecodeError::Malformed {
        format: Format::Pdf,
        detail: detail.into(),
    }
}

fn write_error(detail: impl Into<String>) -> EncodeError {
    EncodeError::Malformed {
        format: Format::Pdf,
        detail: detail.into(),
    }
}

/// The source, if `pages` is all of it in its own order with no repeats.
fn whole_source_in_order(pages: &PageSequence) -> Option<&Arc<PdfSource>> {
    let source = pages.single_pdf_source()?;
    if pages.len() != source.page_count() {
        return None;
    }
    let in_order = pages.iter().zip(source.page_ids()).all(|(page, id)| {
        matches!(&page.content, PageContent::Pdf(p) if p.object_id() == *id)
    });
    in_order.then_some(source)
}

fn save(doc: &mut Document) -> Result<Vec<u8>, EncodeError> {
    doc.compress();
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| write_error(format!("failed to serialise: {}", e)))?;
    Ok(buf)
}

// ── Assembly ─────────────────────────────────────────────────────────────

struct Assembler<'a> {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    /// Source id → object id offset applied on import.
    offsets: HashMap<u64, u32>,
    placed: HashSet<ObjectId>,
    fonts: Option<ObjectId>,
    config: &'a PipelineConfig,
}

impl<'a> Assembler<'a> {
    fn new(config: &'a PipelineConfig) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            offsets: HashMap::new(),
            placed: HashSet::new(),
            fonts: None,
            config,
        }
    }

    fn import(&mut self, source: &PdfSource) -> u32 {
        if let Some(offset) = self.offsets.get(&source.id()) {
            return *offset;
        }
        let offset = self.doc.max_id;
        for (id, object) in &source.document().objects {
            self.doc
                .objects
                .insert((id.0 + offset, id.1), remap_refs(object.clone(), offset));
        }
        self.doc.max_id = self.doc.max_id.max(source.document().max_id + offset);
        self.offsets.insert(source.id(), offset);
        offset
    }

    fn add_pdf_page(&mut self, page: &PdfPage) -> Result<(), EncodeError> {
        let source = page.source();
        let offset = self.import(source);
        let old = page.object_id();
        let imported = (old.0 + offset, old.1);

        let mut dict = self
            .doc
            .get_dictionary(imported)
            .map_err(|e| write_error(format!("page object {:?} missing: {}", old, e)))?
            .clone();

        for key in INHERITABLE {
            if dict.get(key).is_err() {
                if let Some(value) = source.inherited(old, key) {
                    dict.set(key.to_vec(), remap_refs(value.clone(), offset));
                }
            }
        }
        if dict.get(b"MediaBox").is_err() {
            dict.set("MediaBox", rect_object(LETTER.0, LETTER.1));
        }
        dict.set("Parent", Object::Reference(self.pages_id));

        let id = if self.placed.insert(imported) {
            self.doc.objects.insert(imported, Object::Dictionary(dict));
            imported
        } else {
            // Second use of the same page: annotations are per-page objects
            // and cannot be shared.
            dict.remove(b"Annots");
            self.doc.add_object(dict)
        };
        self.kids.push(id);
        Ok(())
    }

    fn add_raster_page(&mut self, raster: &RasterPage) -> Result<(), EncodeError> {
        let (w, h) = (raster.width(), raster.height());
        if w == 0 || h == 0 {
            return Err(write_error("image has zero width or height"));
        }
        let image_id = self.image_xobject(raster);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (w as f32).into(),
                        0.into(),
                        0.into(),
                        (h as f32).into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self.add_content(content)?;
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => rect_object(w as f32, h as f32),
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        self.kids.push(page_id);
        Ok(())
    }

    /// JPEG sources with gray or RGB components are embedded untouched;
    /// everything else is stored as RGB samples plus an alpha soft mask.
    fn image_xobject(&mut self, raster: &RasterPage) -> ObjectId {
        let (w, h) = raster.image.dimensions();
        if let Some(encoded) = raster.encoded.as_ref().filter(|e| e.format == Format::Jpeg) {
            let color_space = match jpeg_components(&encoded.bytes) {
                Some(1) => Some("DeviceGray"),
                Some(3) => Some("DeviceRGB"),
                _ => None,
            };
            if let Some(cs) = color_space {
                let mut stream = Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => w as i64,
                        "Height" => h as i64,
                        "ColorSpace" => cs,
                        "BitsPerComponent" => 8,
                        "Filter" => "DCTDecode",
                    },
                    encoded.bytes.to_vec(),
                );
                stream.allows_compression = false;
                return self.doc.add_object(stream);
            }
        }

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };
        if raster.image.color().has_alpha() {
            let alpha: Vec<u8> = raster.image.to_rgba8().pixels().map(|p| p.0[3]).collect();
            let mask_id = self.doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => w as i64,
                    "Height" => h as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha,
            ));
            dict.set("SMask", mask_id);
        }
        let samples = raster.image.to_rgb8().into_raw();
        self.doc.add_object(Stream::new(dict, samples))
    }

    fn add_text_page(&mut self, text: &TextPage) -> Result<(), EncodeError> {
        let fonts = self.fonts();
        for lines in layout_text(text, self.config.text_font_size) {
            let mut operations = Vec::with_capacity(lines.len() * 5);
            for line in &lines {
                let font = if line.bold { "F2" } else { "F1" };
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font.as_bytes().to_vec()), line.size.into()],
                ));
                operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(line.text.clone(), StringFormat::Literal)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            let content_id = self.add_content(Content { operations })?;
            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => self.pages_id,
                "MediaBox" => rect_object(LETTER.0, LETTER.1),
                "Resources" => dictionary! { "Font" => fonts },
                "Contents" => content_id,
            });
            self.kids.push(page_id);
        }
        Ok(())
    }

    /// The shared font resource dictionary, created on first use.
    fn fonts(&mut self) -> ObjectId {
        if let Some(id) = self.fonts {
            return id;
        }
        let regular = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let id = self.doc.add_object(dictionary! {
            "F1" => regular,
            "F2" => bold,
        });
        self.fonts = Some(id);
        id
    }

    fn add_content(&mut self, content: Content) -> Result<ObjectId, EncodeError> {
        let bytes = content
            .encode()
            .map_err(|e| write_error(format!("content stream: {}", e)))?;
        Ok(self.doc.add_object(Stream::new(Dictionary::new(), bytes)))
    }

    fn finish(mut self) -> Result<Document, EncodeError> {
        let count = self.kids.len() as i64;
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        let pruned = self.doc.prune_objects();
        debug!(
            "Assembled PDF: {} pages, {} unreachable objects pruned",
            count,
            pruned.len()
        );
        Ok(self.doc)
    }
}

/// Shift every reference inside `obj` by `offset`.
pub(crate) fn remap_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => {
            Object::Array(arr.into_iter().map(|o| remap_refs(o, offset)).collect())
        }
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, offset)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict(stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict(mut dict: Dictionary, offset: u32) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        let taken = std::mem::replace(value, Object::Null);
        *value = remap_refs(taken, offset);
    }
    dict
}

fn rect_object(w: f32, h: f32) -> Object {
    Object::Array(vec![0.into(), 0.into(), w.into(), h.into()])
}

/// Component count from the first SOF marker of a JPEG stream.
pub(crate) fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        if marker == 0xFF {
            i += 1;
            continue;
        }
        let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            return bytes.get(i + 9).copied();
        }
        i += 2 + len;
    }
    None
}

// ── Text layout ──────────────────────────────────────────────────────────

/// One positioned line of laid-out text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextLine {
    pub bold: bool,
    pub size: f32,
    pub x: f32,
    pub y: f32,
    /// WinAnsi-encoded bytes.
    pub text: Vec<u8>,
}

/// Lay `page` out on Letter pages; returns the lines of each output page.
///
/// Always yields at least one (possibly empty) page.
pub(crate) fn layout_text(page: &TextPage, font_size: f32) -> Vec<Vec<TextLine>> {
    let top = LETTER.1 - TEXT_MARGIN;
    let max_width = LETTER.0 - 2.0 * TEXT_MARGIN;
    let heading_size = font_size * 1.5;

    let mut blocks: Vec<(bool, f32, &str)> = Vec::new();
    if let Some(h) = &page.heading {
        blocks.push((true, heading_size, h));
    }
    for p in &page.paragraphs {
        blocks.push((false, font_size, p));
    }

    let mut pages = Vec::new();
    let mut current: Vec<TextLine> = Vec::new();
    let mut y = top;
    for (bold, size, text) in blocks {
        let leading = size * 1.2;
        for line in wrap(text, size, bold, max_width) {
            if y - size < TEXT_MARGIN && !current.is_empty() {
                pages.push(std::mem::take(&mut current));
                y = top;
            }
            y -= size;
            current.push(TextLine {
                bold,
                size,
                x: TEXT_MARGIN,
                y,
                text: to_win_ansi(&line),
            });
            y -= leading - size;
        }
        y -= size * 0.6;
    }
    pages.push(current);
    pages
}

/// Greedy word wrap against Helvetica metrics.
pub(crate) fn wrap(text: &str, size: f32, bold: bool, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", line, word)
        };
        if text_width(&candidate, size, bold) <= max_width {
            line = candidate;
            continue;
        }
        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if text_width(word, size, bold) <= max_width {
            line = word.to_string();
        } else {
            // A single word wider than the line is broken by characters.
            for c in word.chars() {
                let mut next = line.clone();
                next.push(c);
                if text_width(&next, size, bold) > max_width && !line.is_empty() {
                    lines.push(std::mem::replace(&mut line, c.to_string()));
                } else {
                    line = next;
                }
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Width in points of `text` set in Helvetica at `size`.
pub(crate) fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let units: u32 = text.chars().map(glyph_width).sum();
    let factor = if bold { 1.1 } else { 1.0 };
    units as f32 * size / 1000.0 * factor
}

/// Helvetica advance widths (1/1000 em) for printable ASCII.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' ' .. '/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0' .. '9'
    278, 278, 584, 584, 584, 556, 1015, // ':' .. '@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A' .. 'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N' .. 'Z'
    278, 278, 278, 469, 556, 333, // '[' .. '`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a' .. 'm'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n' .. 'z'
    334, 260, 334, 584, // '{' .. '~'
];

fn glyph_width(c: char) -> u32 {
    let code = c as u32;
    if (0x20..=0x7E).contains(&code) {
        HELVETICA_WIDTHS[(code - 0x20) as usize] as u32
    } else {
        556
    }
}

/// Encode for a WinAnsi Type1 font. Characters outside Latin-1 become `?`.
pub(crate) fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            0x09 => b' ',
            _ => b'?',
        })
        .collect()
}

// ── Text extraction ──────────────────────────────────────────────────────

/// Concatenate the text runs of `page` in content-stream order, cleaned to
/// one flat paragraph.
///
/// A content stream that cannot be read or tokenised is `Malformed`, naming
/// the page.
pub fn extract_page_text(page: &PdfPage) -> Result<String, DecodeError> {
    let raw = page.content()?;
    let content = Content::decode(&raw)
        .map_err(|e| page.malformed(format!("content stream does not parse: {}", e)))?;
    // The tokeniser stops quietly at the first bad token.
    if content.operations.is_empty() && raw.iter().any(|b| !b.is_ascii_whitespace()) {
        return Err(page.malformed("content stream holds no operators"));
    }

    let mut out = String::new();
    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" => push_operand_text(&mut out, op.operands.last()),
            "'" | "\"" => {
                out.push('\n');
                push_operand_text(&mut out, op.operands.last());
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(..) => push_operand_text(&mut out, Some(item)),
                            other => {
                                // Large negative kerning is a word gap.
                                if number(other).is_some_and(|n| n < -200.0) {
                                    out.push(' ');
                                }
                            }
                        }
                    }
                }
            }
            "Td" | "TD" => {
                let dy = op.operands.get(1).and_then(number).unwrap_or(0.0);
                out.push(if dy != 0.0 { '\n' } else { ' ' });
            }
            "T*" | "Tm" | "ET" => out.push('\n'),
            _ => {}
        }
    }
    Ok(postprocess::clean_text(&out))
}

fn push_operand_text(out: &mut String, operand: Option<&Object>) {
    if let Some(Object::String(bytes, _)) = operand {
        out.push_str(&decode_pdf_string(bytes));
    }
}

/// UTF-16BE when the string starts with a BOM, else byte-per-char.
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

// ── Inspection ───────────────────────────────────────────────────────────

/// Metadata of a PDF without decoding it into pages.
pub fn inspect(source: &SourceDocument) -> Result<DocumentMetadata, DecodeError> {
    let mut meta = DocumentMetadata {
        format: Some(Format::Pdf),
        byte_len: source.len(),
        ..Default::default()
    };
    let parsed = match parse(source) {
        Ok(p) => Arc::new(p),
        Err(DecodeError::Encrypted { .. }) => {
            meta.is_encrypted = true;
            return Ok(meta);
        }
        Err(e) => return Err(e),
    };

    let doc = parsed.document();
    meta.pdf_version = Some(doc.version.clone());
    meta.page_count = parsed.page_count();
    meta.page_sizes = parsed
        .page_ids()
        .iter()
        .map(|id| {
            let (width, height) = PdfPage::new(Arc::clone(&parsed), *id).size();
            PageSize { width, height }
        })
        .collect();

    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|o| parsed.resolve(o))
        .and_then(|o| o.as_dict().ok());
    if let Some(info) = info {
        let field = |key: &[u8]| -> Option<String> {
            match info.get(key).ok().and_then(|o| parsed.resolve(o))? {
                Object::String(bytes, _) => {
                    let s = decode_pdf_string(bytes).trim().to_string();
                    (!s.is_empty()).then_some(s)
                }
                _ => None,
            }
        };
        meta.title = field(b"Title");
        meta.author = field(b"Author");
        meta.producer = field(b"Producer");
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceDocument;

    /// An N-page PDF whose page i shows "<prefix>-Page-<i+1>".
    fn test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut kids = Vec::new();
        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("{}-Page-{}", prefix, i + 1))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        // MediaBox and Resources live on the Pages node and are inherited.
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => num_pages as i64,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn decode(bytes: Vec<u8>) -> PageSequence {
        PdfCodec
            .decode(&SourceDocument::new(bytes, Format::Pdf))
            .unwrap()
    }

    fn texts(seq: &PageSequence) -> Vec<String> {
        seq.iter()
            .map(|p| match &p.content {
                PageContent::Pdf(pdf) => extract_page_text(pdf).unwrap(),
                other => panic!("expected vector page, got {}", other.kind()),
            })
            .collect()
    }

    #[test]
    fn decode_yields_one_page_per_pdf_page() {
        let seq = decode(test_pdf(3, "A"));
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.original_indices(), vec![0, 1, 2]);
        assert_eq!(texts(&seq), vec!["A-Page-1", "A-Page-2", "A-Page-3"]);
    }

    #[test]
    fn inherited_media_box_is_found() {
        let seq = decode(test_pdf(1, "A"));
        let PageContent::Pdf(p) = &seq.get(0).unwrap().content else {
            panic!("expected vector page");
        };
        assert_eq!(p.media_box(), [0.0, 0.0, 612.0, 792.0]);
        assert_eq!(p.size(), (612.0, 792.0));
    }

    #[test]
    fn missing_header_is_malformed() {
        let err = PdfCodec
            .decode(&SourceDocument::new(b"hello".to_vec(), Format::Pdf))
            .unwrap_err();
        assert_eq!(err, malformed("missing %PDF header"));
    }

    #[test]
    fn truncated_pdf_is_malformed() {
        let mut bytes = test_pdf(2, "A");
        bytes.truncate(40);
        let err = PdfCodec
            .decode(&SourceDocument::new(bytes, Format::Pdf))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }), "{err:?}");
    }

    #[test]
    fn roundtrip_keeps_page_identity() {
        let first = decode(test_pdf(3, "R"));
        let bytes = PdfCodec.encode(&first, &PipelineConfig::default()).unwrap();
        let second = decode(bytes);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.fingerprint(), b.fingerprint());
        }
    }

    #[test]
    fn reassembled_pages_keep_inherited_resources() {
        let seq = decode(test_pdf(3, "X"));
        let reversed = seq.select(&[2, 1, 0]).unwrap();
        let bytes = PdfCodec
            .encode(&reversed, &PipelineConfig::default())
            .unwrap();
        let out = decode(bytes);
        assert_eq!(texts(&out), vec!["X-Page-3", "X-Page-2", "X-Page-1"]);
        let PageContent::Pdf(p) = &out.get(0).unwrap().content else {
            panic!("expected vector page");
        };
        let page_dict = p.source().document().get_dictionary(p.object_id()).unwrap();
        assert!(page_dict.get(b"Resources").is_ok());
        assert!(page_dict.get(b"MediaBox").is_ok());
    }

    #[test]
    fn duplicated_page_gets_its_own_object() {
        let seq = decode(test_pdf(2, "D"));
        let twice = seq.select(&[0, 0, 1]).unwrap();
        let out = decode(PdfCodec.encode(&twice, &PipelineConfig::default()).unwrap());
        assert_eq!(texts(&out), vec!["D-Page-1", "D-Page-1", "D-Page-2"]);
    }

    #[test]
    fn empty_and_oversized_sequences_are_rejected() {
        let err = PdfCodec
            .encode(&PageSequence::default(), &PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, EncodeError::Malformed { .. }));

        let config = PipelineConfig::builder().max_pages(2).build().unwrap();
        let err = PdfCodec
            .encode(&decode(test_pdf(3, "M")), &config)
            .unwrap_err();
        assert!(matches!(err, EncodeError::Malformed { .. }));
    }

    #[test]
    fn raster_page_becomes_image_page_of_same_size() {
        let img = image::DynamicImage::new_rgba8(40, 20);
        let seq: PageSequence = vec![Page::new(0, PageContent::Raster(RasterPage::new(img)))]
            .into_iter()
            .collect();
        let out = decode(PdfCodec.encode(&seq, &PipelineConfig::default()).unwrap());
        let PageContent::Pdf(p) = &out.get(0).unwrap().content else {
            panic!("expected vector page");
        };
        assert_eq!(p.size(), (40.0, 20.0));
    }

    #[test]
    fn text_page_is_laid_out_and_extractable() {
        let page = TextPage {
            heading: Some("Page 1".into()),
            paragraphs: vec!["Hello (world) \\ café".into()],
        };
        let seq: PageSequence = vec![Page::new(0, PageContent::Text(page))]
            .into_iter()
            .collect();
        let out = decode(PdfCodec.encode(&seq, &PipelineConfig::default()).unwrap());
        assert_eq!(out.len(), 1);
        assert_eq!(texts(&out), vec!["Page 1 Hello (world) \\ café"]);
    }

    #[test]
    fn long_text_overflows_onto_more_pages() {
        let page = TextPage {
            heading: None,
            paragraphs: vec!["lorem ipsum dolor sit amet ".repeat(800)],
        };
        let pages = layout_text(&page, 12.0);
        assert!(pages.len() > 1, "got {} pages", pages.len());
        for lines in &pages {
            for line in lines {
                assert!(line.y >= TEXT_MARGIN - 0.01, "line below margin: {}", line.y);
            }
        }
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap(&"word ".repeat(200), 12.0, false, 468.0);
        assert!(lines.len() > 1);
        for l in &lines {
            assert!(text_width(l, 12.0, false) <= 468.0);
        }
        let long = wrap(&"x".repeat(500), 12.0, false, 100.0);
        assert!(long.len() > 1);
    }

    #[test]
    fn win_ansi_replaces_non_latin1() {
        assert_eq!(to_win_ansi("a€é日"), vec![b'a', b'?', 0xE9, b'?']);
    }

    #[test]
    fn utf16_strings_decode() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
        assert_eq!(decode_pdf_string(b"caf\xe9"), "café");
    }

    #[test]
    fn jpeg_component_count() {
        let img = image::DynamicImage::new_rgb8(8, 8);
        let jpeg = crate::pipeline::encode::encode_jpeg(&img, 80).unwrap();
        assert_eq!(jpeg_components(&jpeg), Some(3));
        let gray = image::DynamicImage::new_luma8(8, 8);
        let jpeg = crate::pipeline::encode::encode_jpeg(&gray, 80).unwrap();
        // Flattening always produces RGB samples.
        assert_eq!(jpeg_components(&jpeg), Some(3));
    }

    #[test]
    fn inspect_reports_pages_and_info() {
        let mut doc = Document::load_mem(&test_pdf(2, "I")).unwrap();
        let info = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Quarterly"),
            "Producer" => Object::string_literal("toolsherd tests"),
        });
        doc.trailer.set("Info", info);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let meta = inspect(&SourceDocument::new(bytes, Format::Pdf)).unwrap();
        assert_eq!(meta.page_count, 2);
        assert_eq!(meta.title.as_deref(), Some("Quarterly"));
        assert_eq!(meta.producer.as_deref(), Some("toolsherd tests"));
        assert_eq!(meta.page_sizes[0].width, 612.0);
        assert!(!meta.is_encrypted);
    }

    fn rewrite(bytes: Vec<u8>, edit: impl FnOnce(&mut Document)) -> Vec<u8> {
        let mut doc = Document::load_mem(&bytes).unwrap();
        edit(&mut doc);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn encrypted_pdf() -> SourceDocument {
        let bytes = rewrite(test_pdf(1, "E"), |doc| {
            doc.trailer.set(
                "Encrypt",
                dictionary! {
                    "Filter" => "Standard",
                    "V" => 1,
                    "R" => 2,
                    "Length" => 40,
                    "P" => -4,
                    "O" => Object::String(vec![0x28; 32], StringFormat::Hexadecimal),
                    "U" => Object::String(vec![0x5c; 32], StringFormat::Hexadecimal),
                },
            );
        });
        SourceDocument::new(bytes, Format::Pdf)
    }

    #[test]
    fn encrypted_pdf_fails_decode() {
        let err = PdfCodec.decode(&encrypted_pdf()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Encrypted {
                format: Format::Pdf
            }
        );
    }

    #[test]
    fn inspect_flags_encrypted_pdf() {
        let meta = inspect(&encrypted_pdf()).unwrap();
        assert!(meta.is_encrypted);
        assert_eq!(meta.format, Some(Format::Pdf));
        assert_eq!(meta.page_count, 0);
    }

    /// Replace the first page's `Contents` with `contents`.
    fn with_first_page_contents(contents: impl FnOnce(&mut Document) -> Object) -> PageSequence {
        decode(rewrite(test_pdf(2, "C"), |doc| {
            let page_id = *doc.get_pages().values().next().unwrap();
            let contents = contents(doc);
            doc.get_dictionary_mut(page_id)
                .unwrap()
                .set("Contents", contents);
        }))
    }

    fn first_page_text(seq: &PageSequence) -> Result<String, DecodeError> {
        match &seq.get(0).unwrap().content {
            PageContent::Pdf(pdf) => extract_page_text(pdf),
            other => panic!("expected vector page, got {}", other.kind()),
        }
    }

    fn assert_malformed_first_page(result: Result<String, DecodeError>) {
        match result {
            Err(DecodeError::Malformed { format, detail }) => {
                assert_eq!(format, Format::Pdf);
                assert!(detail.starts_with("page 1:"), "{detail}");
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn missing_content_stream_is_malformed() {
        let seq = with_first_page_contents(|_| Object::Reference((9_999, 0)));
        assert_malformed_first_page(first_page_text(&seq));
        // The page still fingerprints, and its neighbour still reads.
        assert_eq!(seq.get(0).unwrap().fingerprint().len(), 64);
        let PageContent::Pdf(second) = &seq.get(1).unwrap().content else {
            panic!("expected vector page");
        };
        assert_eq!(extract_page_text(second).unwrap(), "C-Page-2");
    }

    #[test]
    fn undecodable_filter_is_malformed() {
        let seq = with_first_page_contents(|doc| {
            let id = doc.add_object(Stream::new(
                dictionary! { "Filter" => "BogusDecode" },
                b"BT (x) Tj ET".to_vec(),
            ));
            Object::Reference(id)
        });
        assert_malformed_first_page(first_page_text(&seq));
    }

    #[test]
    fn content_without_operators_is_malformed() {
        let seq = with_first_page_contents(|doc| {
            let id = doc.add_object(Stream::new(Dictionary::new(), b"(unterminated".to_vec()));
            Object::Reference(id)
        });
        assert_malformed_first_page(first_page_text(&seq));
    }

    #[test]
    fn page_without_contents_is_empty() {
        let seq = with_first_page_contents(|_| Object::Array(Vec::new()));
        assert_eq!(first_page_text(&seq).unwrap(), "");
    }
}

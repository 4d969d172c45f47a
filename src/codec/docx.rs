//! Word (`.docx`) adapter built on `docx-rs`.
//!
//! Word documents have no fixed pagination, so a `.docx` decodes to a single
//! text page: one paragraph per body paragraph, and one `a | b | c`
//! paragraph per table row. Runs are concatenated; styling is dropped.
//!
//! Encoding writes each text page's heading as a bold paragraph followed by
//! its paragraphs, with a hard page break between pages.

use crate::codec::Codec;
use crate::config::PipelineConfig;
use crate::error::{DecodeError, EncodeError};
use crate::format::Format;
use crate::model::{Page, PageContent, PageSequence, SourceDocument, TextPage};
use crate::pipeline::postprocess;
use docx_rs::{
    BreakType, DocumentChild, Docx, Paragraph, ParagraphChild, Run, RunChild, TableCellContent,
    TableChild, TableRowChild,
};
use std::io::Cursor;
use tracing::debug;

/// Heading run size in half-points (14 pt).
const HEADING_HALF_POINTS: usize = 28;

/// Encodes and decodes Word documents.
pub struct DocxCodec;

impl Codec for DocxCodec {
    fn format(&self) -> Format {
        Format::Docx
    }

    fn decode(&self, source: &SourceDocument) -> Result<PageSequence, DecodeError> {
        let doc = docx_rs::read_docx(source.bytes()).map_err(|e| DecodeError::Malformed {
            format: Format::Docx,
            detail: e.to_string(),
        })?;

        let mut paragraphs = Vec::new();
        for child in &doc.document.children {
            match child {
                DocumentChild::Paragraph(p) => {
                    let mut text = String::new();
                    paragraph_text(&p.children, &mut text);
                    push_cleaned(&mut paragraphs, &text);
                }
                DocumentChild::Table(table) => {
                    for row in &table.rows {
                        let TableChild::TableRow(tr) = row;
                        let cells: Vec<String> = tr
                            .cells
                            .iter()
                            .map(|cell| {
                                let TableRowChild::TableCell(tc) = cell;
                                let mut text = String::new();
                                for content in &tc.children {
                                    if let TableCellContent::Paragraph(p) = content {
                                        paragraph_text(&p.children, &mut text);
                                        text.push(' ');
                                    }
                                }
                                postprocess::clean_text(&text)
                            })
                            .collect();
                        push_cleaned(&mut paragraphs, &cells.join(" | "));
                    }
                }
                _ => {}
            }
        }

        debug!("Decoded DOCX: {} paragraphs", paragraphs.len());
        Ok(PageSequence::new(vec![Page::new(
            0,
            PageContent::Text(TextPage {
                heading: None,
                paragraphs,
            }),
        )]))
    }

    fn encode(&self, pages: &PageSequence, config: &PipelineConfig) -> Result<Vec<u8>, EncodeError> {
        let body_half_points = (config.text_font_size * 2.0).round() as usize;
        let mut docx = Docx::new();

        for (i, page) in pages.iter().enumerate() {
            let PageContent::Text(text) = &page.content else {
                let detail = match page.content {
                    PageContent::Raster(_) => format!(
                        "page {} is an image; editable text cannot be reconstructed from pixels",
                        i + 1
                    ),
                    _ => "only text can be written to a Word document; extract text first".into(),
                };
                return Err(EncodeError::UnsupportedFeature {
                    from: page.content.kind().into(),
                    to: Format::Docx,
                    detail,
                });
            };
            if i > 0 {
                docx = docx.add_paragraph(
                    Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
                );
            }
            if let Some(heading) = &text.heading {
                docx = docx.add_paragraph(
                    Paragraph::new().add_run(
                        Run::new()
                            .add_text(heading.as_str())
                            .bold()
                            .size(HEADING_HALF_POINTS),
                    ),
                );
            }
            for paragraph in &text.paragraphs {
                docx = docx.add_paragraph(
                    Paragraph::new().add_run(
                        Run::new()
                            .add_text(paragraph.as_str())
                            .size(body_half_points),
                    ),
                );
            }
        }

        let mut cursor = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut cursor)
            .map_err(|e| EncodeError::Malformed {
                format: Format::Docx,
                detail: format!("failed to write archive: {}", e),
            })?;
        Ok(cursor.into_inner())
    }
}

fn paragraph_text(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => run_text(&run.children, out),
            ParagraphChild::Hyperlink(link) => paragraph_text(&link.children, out),
            _ => {}
        }
    }
}

fn run_text(children: &[RunChild], out: &mut String) {
    for child in children {
        match child {
            RunChild::Text(t) => out.push_str(&t.text),
            RunChild::Tab(_) => out.push(' '),
            _ => {}
        }
    }
}

fn push_cleaned(paragraphs: &mut Vec<String>, raw: &str) {
    let cleaned = postprocess::clean_text(raw);
    if !cleaned.is_empty() {
        paragraphs.push(cleaned);
    }
}

//! Output types: the artifact a job returns and what it reports about itself.

use crate::format::Format;
use crate::job::JobState;
use crate::request::TransformKind;
use serde::{Deserialize, Serialize};

/// The finished output of a job. Ownership passes to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
    pub format: Format,
    pub body: ArtifactBody,
}

/// One buffer, or one buffer per page in page order (Rasterize).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactBody {
    Single(Vec<u8>),
    Pages(Vec<Vec<u8>>),
}

impl ResultArtifact {
    pub fn single(format: Format, bytes: Vec<u8>) -> Self {
        Self {
            format,
            body: ArtifactBody::Single(bytes),
        }
    }

    pub fn pages(format: Format, pages: Vec<Vec<u8>>) -> Self {
        Self {
            format,
            body: ArtifactBody::Pages(pages),
        }
    }

    /// Total size of all buffers.
    pub fn byte_len(&self) -> usize {
        match &self.body {
            ArtifactBody::Single(b) => b.len(),
            ArtifactBody::Pages(p) => p.iter().map(Vec::len).sum(),
        }
    }

    /// Number of buffers in the body.
    pub fn buffer_count(&self) -> usize {
        match &self.body {
            ArtifactBody::Single(_) => 1,
            ArtifactBody::Pages(p) => p.len(),
        }
    }

    /// The single buffer, if this is not a page set.
    pub fn as_single(&self) -> Option<&[u8]> {
        match &self.body {
            ArtifactBody::Single(b) => Some(b),
            ArtifactBody::Pages(_) => None,
        }
    }

    /// Consume the artifact, returning its buffers in order.
    pub fn into_buffers(self) -> Vec<Vec<u8>> {
        match self.body {
            ArtifactBody::Single(b) => vec![b],
            ArtifactBody::Pages(p) => p,
        }
    }

    /// `data:<mime>;base64,<payload>` for a single-buffer artifact.
    pub fn to_data_uri(&self) -> Option<String> {
        self.as_single()
            .map(|b| crate::pipeline::encode::data_uri(self.format, b))
    }
}

/// A completed job: the artifact plus its statistics.
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub artifact: ResultArtifact,
    pub stats: JobStats,
}

/// Timings and counts for one job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    pub kind: Option<TransformKind>,
    /// Encoded input documents.
    pub input_documents: usize,
    pub input_bytes: usize,
    /// Pages after decoding, summed over all inputs.
    pub decoded_pages: usize,
    /// Pages (or page buffers) in the output.
    pub output_pages: usize,
    pub output_bytes: usize,
    pub decode_duration_ms: u64,
    pub transform_duration_ms: u64,
    pub encode_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Every state the job passed through, in order.
    pub states: Vec<JobState>,
}

/// What `inspect` reports about a document without transforming it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub format: Option<Format>,
    pub byte_len: usize,
    pub page_count: usize,
    /// Per-page size: points for PDF pages, pixels for images.
    pub page_sizes: Vec<PageSize>,
    pub pdf_version: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub is_encrypted: bool,
}

/// Width and height of one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_len_sums_pages() {
        let a = ResultArtifact::pages(Format::Png, vec![vec![1, 2], vec![3]]);
        assert_eq!(a.byte_len(), 3);
        assert_eq!(a.buffer_count(), 2);
        assert!(a.as_single().is_none());
        assert!(a.to_data_uri().is_none());
    }

    #[test]
    fn single_data_uri() {
        let a = ResultArtifact::single(Format::Pdf, b"%PDF".to_vec());
        assert_eq!(
            a.to_data_uri().unwrap(),
            "data:application/pdf;base64,JVBERg=="
        );
        assert_eq!(a.into_buffers(), vec![b"%PDF".to_vec()]);
    }

    #[test]
    fn metadata_serialises() {
        let m = DocumentMetadata {
            format: Some(Format::Pdf),
            page_count: 1,
            page_sizes: vec![PageSize {
                width: 612.0,
                height: 792.0,
            }],
            ..Default::default()
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"format\":\"pdf\""));
        assert!(json.contains("\"page_count\":1"));
    }
}

//! Merge: concatenate decoded documents in input order.

use crate::error::ValidationError;
use crate::model::PageSequence;
use crate::request::MIN_MERGE_INPUTS;
use tracing::debug;

/// Document 1's pages in their order, then document 2's, and so on.
///
/// Pages keep their original indices, so the result usually has repeats
/// (every document starts at 0).
pub fn merge(parts: &[PageSequence]) -> Result<PageSequence, ValidationError> {
    if parts.len() < MIN_MERGE_INPUTS {
        return Err(ValidationError::InsufficientInputs {
            required: MIN_MERGE_INPUTS,
            got: parts.len(),
        });
    }
    let merged = PageSequence::concat(parts);
    debug!(
        "Merged {} documents into {} pages",
        parts.len(),
        merged.len()
    );
    Ok(merged)
}

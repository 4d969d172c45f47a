//! Reorder: permute the pages of one document.

use crate::error::ValidationError;
use crate::model::PageSequence;

/// Check that `permutation` is a bijection over `0..len`.
///
/// Entries are checked left to right, so the reported index is the first
/// offender: out of range, then duplicated. Missing indices are reported
/// after the scan, smallest first.
pub fn check_permutation(permutation: &[usize], len: usize) -> Result<(), ValidationError> {
    let mut seen = vec![false; len];
    for (position, &index) in permutation.iter().enumerate() {
        if index >= len {
            return Err(ValidationError::InvalidPermutation {
                index: Some(index),
                reason: format!(
                    "entry {} is page {}, but the document has {} pages",
                    position, index, len
                ),
            });
        }
        if std::mem::replace(&mut seen[index], true) {
            return Err(ValidationError::InvalidPermutation {
                index: Some(index),
                reason: format!("page {} appears more than once", index),
            });
        }
    }
    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(ValidationError::InvalidPermutation {
            index: Some(missing),
            reason: format!(
                "page {} is missing ({} of {} pages given)",
                missing,
                permutation.len(),
                len
            ),
        });
    }
    Ok(())
}

/// A new sequence whose position `i` holds page `permutation[i]`.
pub fn reorder(pages: &PageSequence, permutation: &[usize]) -> Result<PageSequence, ValidationError> {
    check_permutation(permutation, pages.len())?;
    pages
        .select(permutation)
        .ok_or_else(|| ValidationError::InvalidPermutation {
            index: None,
            reason: "permutation does not fit the document".into(),
        })
}

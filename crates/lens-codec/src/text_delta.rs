//! Run-length text deltas for large strings.
//!
//! When a string field changes but most of its content survives, shipping
//! the whole new string is wasteful. A delta carries the position of the
//! change, the number of bytes to delete, and the replacement text; the
//! unchanged prefix and suffix never travel.

use serde::{Deserialize, Serialize};

use crate::CodecError;

/// Strings shorter than this always ship whole.
const MIN_DELTA_LEN: usize = 100;

/// One splice into a string: at byte `position`, remove `delete` bytes and
/// insert `insert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    /// Byte offset of the splice in the base string.
    pub position: usize,
    /// Number of bytes removed from the base string.
    pub delete: usize,
    /// Replacement text inserted at `position`.
    pub insert: String,
}

/// Computes a delta from `old` to `new`, or `None` when a delta is not
/// worthwhile: `new` must be at least 100 bytes and the shared prefix plus
/// suffix must cover at least half of `new`.
pub fn compute_text_delta(old: &str, new: &str) -> Option<Vec<TextEdit>> {
    if new.len() < MIN_DELTA_LEN {
        return None;
    }

    let prefix = common_prefix(old, new);
    let suffix = common_suffix(old, new, prefix);

    if (prefix + suffix) * 2 < new.len() {
        return None;
    }

    Some(vec![TextEdit {
        position: prefix,
        delete: old.len() - prefix - suffix,
        insert: new[prefix..new.len() - suffix].to_string(),
    }])
}

/// Applies `edits` in order to `base`.
pub fn apply_text_delta(base: &str, edits: &[TextEdit]) -> Result<String, CodecError> {
    let mut out = base.to_string();
    for edit in edits {
        let end = edit.position + edit.delete;
        if end > out.len() || !out.is_char_boundary(edit.position) || !out.is_char_boundary(end) {
            return Err(CodecError::EditOutOfBounds {
                position: edit.position,
                delete: edit.delete,
                len: out.len(),
            });
        }
        out.replace_range(edit.position..end, &edit.insert);
    }
    Ok(out)
}

/// Length in bytes of the longest common prefix, aligned down to a char
/// boundary in both strings.
fn common_prefix(a: &str, b: &str) -> usize {
    let mut n = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count();
    while n > 0 && (!a.is_char_boundary(n) || !b.is_char_boundary(n)) {
        n -= 1;
    }
    n
}

/// Length in bytes of the longest common suffix that does not overlap the
/// prefix, aligned to char boundaries.
fn common_suffix(a: &str, b: &str, prefix: usize) -> usize {
    let max = a.len().min(b.len()) - prefix;
    let mut n = a
        .as_bytes()
        .iter()
        .rev()
        .zip(b.as_bytes().iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
        .min(max);
    while n > 0 && (!a.is_char_boundary(a.len() - n) || !b.is_char_boundary(b.len() - n)) {
        n -= 1;
    }
    n
}

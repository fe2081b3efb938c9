//! Cursor pagination over an ordered member list.
//!
//! Shared by the relationship engine (neighbor pages) and the entity
//! engine (argument validation for paginated listings). Cursors are
//! member values; `after` starts the window one past the cursor, `before`
//! ends it one short of the cursor, `first`/`last` trim the head or tail.

use crate::error::{StoreError, StoreResult};

/// Rejects the forbidden pagination combinations.
pub fn ensure_allowed_combination(
    first: Option<usize>,
    last: Option<usize>,
    before: Option<&str>,
    after: Option<&str>,
) -> StoreResult<()> {
    if first.is_some() && before.is_some() {
        return Err(StoreError::bad_request("first cannot be combined with before"));
    }
    if last.is_some() && after.is_some() {
        return Err(StoreError::bad_request("last cannot be combined with after"));
    }
    if first.is_some() && last.is_some() {
        return Err(StoreError::bad_request("first cannot be combined with last"));
    }
    Ok(())
}

/// Applies cursor pagination to `members`.
///
/// Returns the selected window plus `has_before` / `has_after` flags.
/// An unknown cursor is `NotFound`; a forbidden argument combination is
/// `BadRequest`.
pub fn paginate(
    members: &[String],
    first: Option<usize>,
    last: Option<usize>,
    before: Option<&str>,
    after: Option<&str>,
) -> StoreResult<(Vec<String>, bool, bool)> {
    ensure_allowed_combination(first, last, before, after)?;

    let position = |cursor: &str| -> StoreResult<isize> {
        members
            .iter()
            .position(|member| member == cursor)
            .map(|idx| idx as isize)
            .ok_or_else(|| StoreError::not_found(format!("cursor {cursor}")))
    };

    let len = members.len() as isize;
    let mut start: isize = 0;
    let mut end: isize = len - 1;

    if let Some(after) = after {
        start = position(after)? + 1;
    }
    if let Some(before) = before {
        end = position(before)? - 1;
    }
    if let Some(first) = first {
        end = end.min(start + first as isize - 1);
    }
    if let Some(last) = last {
        start = start.max(end - last as isize + 1);
    }

    let has_before = start > 0;
    let has_after = end < len - 1;
    let window = if start <= end {
        members[start as usize..=end as usize].to_vec()
    } else {
        Vec::new()
    };
    Ok((window, has_before, has_after))
}

//! Node and CPU range expressions.
//!
//! The grammar is the one the kernel uses for `cpulist`-style files: a
//! comma-separated list of tokens, each either a single id (`"5"`) or an
//! inclusive range (`"2-7"`).

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Largest id a range expression may name.
///
/// Well above any kernel's `NR_CPUS` or `MAX_NUMNODES`; larger ids are
/// rejected rather than expanded.
pub const MAX_ID: usize = (1 << 20) - 1;

/// Parse a single token into the ids it names.
///
/// `"3"` yields `[3]` and `"2-5"` yields `[2, 3, 4, 5]`. A token with more
/// than one `-`, a non-numeric side, an empty side, a reversed range
/// (`"5-2"`) or an id above [`MAX_ID`] is rejected with
/// [`Error::InvalidRangeFormat`].
pub fn parse_range(token: &str) -> Result<Vec<usize>> {
    let invalid = || Error::InvalidRangeFormat(token.to_string());

    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    match trimmed.split_once('-') {
        None => {
            let id = parse_id(trimmed).ok_or_else(invalid)?;
            Ok(vec![id])
        }
        Some((low, high)) => {
            // "1-2-3" leaves a '-' in the upper half
            let low = parse_id(low).ok_or_else(invalid)?;
            let high = parse_id(high).ok_or_else(invalid)?;
            if low > high {
                return Err(invalid());
            }
            Ok((low..=high).collect())
        }
    }
}

/// Parse a comma-separated list of tokens into a set of ids.
///
/// Ids keep the order in which they first appear; repeats are collapsed.
/// Empty or whitespace-only input is the empty set, but an empty token inside
/// a list (`"1,,2"`, `"1,"`) is an error.
pub fn parse_list(text: &str) -> Result<Vec<usize>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<usize> = Vec::new();
    let mut seen = HashSet::new();
    for token in text.split(',') {
        for id in parse_range(token)? {
            if seen.insert(id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

/// Render a set of ids in the compressed list grammar.
///
/// The output is sorted and de-duplicated, with consecutive runs collapsed:
/// `[7, 0, 1, 2, 5, 8]` renders as `"0-2,5,7-8"`.
pub fn format_list(ids: &[usize]) -> String {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{}-{}", start, end));
        }
    }
    parts.join(",")
}

#[inline]
fn parse_id(text: &str) -> Option<usize> {
    let text = text.trim();
    // usize::from_str accepts a leading '+'
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<usize>().ok().filter(|id| *id <= MAX_ID)
}

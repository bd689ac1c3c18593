//! Line-oriented edit scripts over raw bytes.
//!
//! A script starts with `@@ <base lines> <result lines>` followed by one
//! operation per line:
//!
//! - `=<n>` copy the next `n` base lines
//! - `-<n>` skip the next `n` base lines
//! - `+<hex>` insert the hex-encoded bytes
//!
//! Lines are split after `\n`, so any byte content round-trips.

use similar::{capture_diff_slices, Algorithm, DiffTag};
use thiserror::Error;

/// Why a script could not be parsed or applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("empty edit script")]
    Empty,

    #[error("malformed header: {0:?}")]
    BadHeader(String),

    #[error("malformed operation: {0:?}")]
    BadOperation(String),

    #[error("script expects {expected} base lines, base has {found}")]
    BaseMismatch { expected: usize, found: usize },

    #[error("operation {0:?} runs past the end of the base")]
    OutOfRange(String),

    #[error("{0} base lines left unconsumed")]
    Unconsumed(usize),

    #[error("script should produce {expected} lines, produced {found}")]
    ResultMismatch { expected: usize, found: usize },
}

fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    data.split_inclusive(|b| *b == b'\n').collect()
}

/// Diff two buffers. Returns `None` when they are identical.
pub fn diff(old: &[u8], new: &[u8]) -> Option<String> {
    if old == new {
        return None;
    }

    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let ops = capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines);

    let mut script = format!("@@ {} {}\n", old_lines.len(), new_lines.len());
    for op in &ops {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => script.push_str(&format!("={}\n", old_range.len())),
            DiffTag::Delete => script.push_str(&format!("-{}\n", old_range.len())),
            DiffTag::Insert => {
                script.push_str(&format!("+{}\n", hex::encode(new_lines[new_range].concat())))
            }
            DiffTag::Replace => {
                script.push_str(&format!("-{}\n", old_range.len()));
                script.push_str(&format!("+{}\n", hex::encode(new_lines[new_range].concat())));
            }
        }
    }

    Some(script)
}

/// Replay a script against `base`.
pub fn apply(base: &[u8], script: &str) -> Result<Vec<u8>, ScriptError> {
    let base_lines = split_lines(base);
    let mut ops = script.lines();

    let header = ops.next().ok_or(ScriptError::Empty)?;
    let (expected_base, expected_result) = parse_header(header)?;
    if expected_base != base_lines.len() {
        return Err(ScriptError::BaseMismatch {
            expected: expected_base,
            found: base_lines.len(),
        });
    }

    let mut out = Vec::with_capacity(base.len());
    let mut cursor = 0usize;

    for op in ops {
        if let Some(count) = op.strip_prefix('=') {
            let end = advance(cursor, count, op, base_lines.len())?;
            for line in &base_lines[cursor..end] {
                out.extend_from_slice(line);
            }
            cursor = end;
        } else if let Some(count) = op.strip_prefix('-') {
            cursor = advance(cursor, count, op, base_lines.len())?;
        } else if let Some(encoded) = op.strip_prefix('+') {
            let bytes =
                hex::decode(encoded).map_err(|_| ScriptError::BadOperation(op.to_string()))?;
            out.extend_from_slice(&bytes);
        } else {
            return Err(ScriptError::BadOperation(op.to_string()));
        }
    }

    if cursor != base_lines.len() {
        return Err(ScriptError::Unconsumed(base_lines.len() - cursor));
    }

    let produced = split_lines(&out).len();
    if produced != expected_result {
        return Err(ScriptError::ResultMismatch {
            expected: expected_result,
            found: produced,
        });
    }

    Ok(out)
}

fn parse_header(header: &str) -> Result<(usize, usize), ScriptError> {
    let bad = || ScriptError::BadHeader(header.to_string());
    let mut parts = header.strip_prefix("@@ ").ok_or_else(bad)?.split(' ');

    let base = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    let result = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }
    Ok((base, result))
}

fn advance(cursor: usize, count: &str, op: &str, len: usize) -> Result<usize, ScriptError> {
    let n: usize = count
        .parse()
        .map_err(|_| ScriptError::BadOperation(op.to_string()))?;
    match cursor.checked_add(n) {
        Some(end) if end <= len => Ok(end),
        _ => Err(ScriptError::OutOfRange(op.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_has_no_script() {
        assert_eq!(diff(b"same\n", b"same\n"), None);
        assert_eq!(diff(b"", b""), None);
    }

    #[test]
    fn test_line_edit() {
        let old = b"one\ntwo\nthree\n";
        let new = b"one\n2\nthree\nfour\n";
        let script = diff(old, new).unwrap();

        assert!(script.starts_with("@@ 3 4\n"));
        assert_eq!(apply(old, &script).unwrap(), new);
    }

    #[test]
    fn test_no_trailing_newline_and_binary() {
        let old = [0u8, 159, 146, 150, b'\n', 1, 2, 3];
        let new = [0u8, 159, 146, 150, b'\n', 9, 9];
        let script = diff(&old, &new).unwrap();
        assert_eq!(apply(&old, &script).unwrap(), new);
    }

    #[test]
    fn test_from_and_to_empty() {
        let script = diff(b"", b"new\ncontent").unwrap();
        assert_eq!(apply(b"", &script).unwrap(), b"new\ncontent");

        let script = diff(b"old\n", b"").unwrap();
        assert_eq!(apply(b"old\n", &script).unwrap(), b"");
    }

    #[test]
    fn test_wrong_base_rejected() {
        let script = diff(b"a\nb\n", b"a\nc\n").unwrap();
        assert_eq!(
            apply(b"a\nb\nextra\n", &script),
            Err(ScriptError::BaseMismatch {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_malformed_scripts() {
        assert_eq!(apply(b"", ""), Err(ScriptError::Empty));
        assert!(matches!(apply(b"", "garbage"), Err(ScriptError::BadHeader(_))));
        assert!(matches!(
            apply(b"x\n", "@@ 1 1\n?1\n"),
            Err(ScriptError::BadOperation(_))
        ));
        assert!(matches!(
            apply(b"x\n", "@@ 1 1\n=5\n"),
            Err(ScriptError::OutOfRange(_))
        ));
        assert!(matches!(
            apply(b"x\n", "@@ 1 1\n+zz\n"),
            Err(ScriptError::BadOperation(_))
        ));
        assert_eq!(apply(b"x\ny\n", "@@ 2 1\n=1\n"), Err(ScriptError::Unconsumed(1)));
    }
}

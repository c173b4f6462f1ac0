//! String literal decoding and key segment reading.
//!
//! Decoding borrows from the source document whenever it can: literal
//! strings and escape-free basic strings come back as `Cow::Borrowed`, and
//! only strings that actually contain escape sequences allocate.

use crate::error::ErrorKind;
use crate::scan;
use crate::value::Key;
use crate::Span;
use std::borrow::Cow;

#[cfg(test)]
#[path = "./str_tests.rs"]
mod tests;

/// Decodes the string literal whose opening quote is at `pos`, returning the
/// decoded text and the offset of the first byte past the closing quote.
/// Handles all four forms: basic, literal, and their multi-line variants.
pub(crate) fn read_string(
    input: &str,
    pos: usize,
) -> Result<(Cow<'_, str>, usize), (usize, ErrorKind)> {
    let bytes = input.as_bytes();
    match bytes[pos] {
        b'"' if bytes.get(pos + 1..pos + 3) == Some(b"\"\"") => {
            let start = trim_leading_newline(bytes, pos + 3);
            let close = match scan::find_multiline_basic_close(bytes, start) {
                Some(close) => scan::extend_triple_close(bytes, close, b'"'),
                None => return Err((pos, ErrorKind::MissingClose)),
            };
            let text = unescape_basic(&input[start..close], start, true)?;
            Ok((text, close + 3))
        }
        b'"' => {
            let close = scan::find_basic_close(bytes, pos + 1);
            if bytes.get(close) != Some(&b'"') {
                return Err((pos, ErrorKind::MissingClose));
            }
            let text = unescape_basic(&input[pos + 1..close], pos + 1, false)?;
            Ok((text, close + 1))
        }
        b'\'' if bytes.get(pos + 1..pos + 3) == Some(b"''") => {
            let start = trim_leading_newline(bytes, pos + 3);
            let close = match scan::find_multiline_literal_close(bytes, start) {
                Some(close) => scan::extend_triple_close(bytes, close, b'\''),
                None => return Err((pos, ErrorKind::MissingClose)),
            };
            Ok((Cow::Borrowed(&input[start..close]), close + 3))
        }
        b'\'' => {
            let close = scan::find_literal_close(bytes, pos + 1);
            if bytes.get(close) != Some(&b'\'') {
                return Err((pos, ErrorKind::MissingClose));
            }
            Ok((Cow::Borrowed(&input[pos + 1..close]), close + 1))
        }
        _ => unreachable!("caller dispatches on the opening quote"),
    }
}

/// A newline immediately after the opening delimiter of a multi-line string
/// is trimmed.
fn trim_leading_newline(bytes: &[u8], pos: usize) -> usize {
    if bytes.get(pos..pos + 2) == Some(b"\r\n") {
        pos + 2
    } else if bytes.get(pos) == Some(&b'\n') {
        pos + 1
    } else {
        pos
    }
}

/// Resolves the escape sequences of a basic string. Returns borrowed text
/// when there are none. `base` is the offset of `raw` within the document,
/// for error spans; `multiline` additionally enables the line-ending
/// backslash.
pub(crate) fn unescape_basic(
    raw: &str,
    base: usize,
    multiline: bool,
) -> Result<Cow<'_, str>, (usize, ErrorKind)> {
    if !raw.as_bytes().contains(&b'\\') {
        return Ok(Cow::Borrowed(raw));
    }
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            let next = i + 1 + scan_verbatim(&bytes[i + 1..]);
            out.push_str(&raw[i..next]);
            i = next;
            continue;
        }
        if multiline {
            // A backslash as the last non-blank character of its line eats
            // all whitespace up to the next non-blank character.
            let mut j = i + 1;
            while matches!(bytes.get(j), Some(b' ' | b'\t')) {
                j += 1;
            }
            if matches!(bytes.get(j), Some(b'\n' | b'\r')) {
                while matches!(bytes.get(j), Some(b' ' | b'\t' | b'\n' | b'\r')) {
                    j += 1;
                }
                i = j;
                continue;
            }
        }
        let Some(esc) = raw[i + 1..].chars().next() else {
            return Err((base + i, ErrorKind::InvalidEscape('\\')));
        };
        match esc {
            'b' => out.push('\u{8}'),
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'f' => out.push('\u{c}'),
            'r' => out.push('\r'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'u' => out.push(unicode_escape(raw, base, i, 4)?),
            'U' => out.push(unicode_escape(raw, base, i, 8)?),
            other => return Err((base + i, ErrorKind::InvalidEscape(other))),
        }
        i += if esc == 'u' {
            6
        } else if esc == 'U' {
            10
        } else {
            2
        };
    }
    Ok(Cow::Owned(out))
}

/// Length of the longest escape-free prefix.
fn scan_verbatim(bytes: &[u8]) -> usize {
    bytes.iter().position(|&b| b == b'\\').unwrap_or(bytes.len())
}

/// Decodes the `digits` hex digits of a `\u`/`\U` escape whose backslash is
/// at `raw[i]`.
fn unicode_escape(
    raw: &str,
    base: usize,
    i: usize,
    digits: usize,
) -> Result<char, (usize, ErrorKind)> {
    let marker = if digits == 4 { 'u' } else { 'U' };
    let err = (base + i, ErrorKind::InvalidEscape(marker));
    let hex = raw.get(i + 2..i + 2 + digits).ok_or(err.clone())?;
    let code = u32::from_str_radix(hex, 16).map_err(|_| err.clone())?;
    char::from_u32(code).ok_or(err)
}

/// Reads one key segment (bare or quoted) starting at `pos`, returning the
/// decoded key and the offset just past it. The span of a quoted key covers
/// its quotes.
pub(crate) fn read_key_segment(
    input: &str,
    pos: usize,
) -> Result<(Key<'_>, usize), (usize, ErrorKind)> {
    let bytes = input.as_bytes();
    match bytes.get(pos) {
        Some(b'"') => {
            let close = scan::find_basic_close(bytes, pos + 1);
            if bytes.get(close) != Some(&b'"') {
                return Err((pos, ErrorKind::MissingClose));
            }
            let name = unescape_basic(&input[pos + 1..close], pos + 1, false)?;
            let span = Span::new(pos as u32, close as u32 + 1);
            Ok((Key { name, span }, close + 1))
        }
        Some(b'\'') => {
            let close = scan::find_literal_close(bytes, pos + 1);
            if bytes.get(close) != Some(&b'\'') {
                return Err((pos, ErrorKind::MissingClose));
            }
            let name = Cow::Borrowed(&input[pos + 1..close]);
            let span = Span::new(pos as u32, close as u32 + 1);
            Ok((Key { name, span }, close + 1))
        }
        _ => {
            let end = scan::find_bare_key_end(bytes, pos);
            if end == pos {
                return Err((pos, ErrorKind::InvalidKey));
            }
            let name = Cow::Borrowed(&input[pos..end]);
            let span = Span::new(pos as u32, end as u32);
            Ok((Key { name, span }, end))
        }
    }
}

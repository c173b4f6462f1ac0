//! Boundary-scanning primitives.
//!
//! Pure, allocation-free functions over `(&[u8], offset)` that locate the
//! next semantically significant boundary: line ends, string closers, bare
//! key ends, the `=` of a key-value line. Each returns a new offset clamped
//! to the slice length; none of them consumes or validates content beyond
//! finding the boundary. Reaching the end of the slice plays the role a null
//! terminator plays in a C string.

#[cfg(test)]
#[path = "./scan_tests.rs"]
mod tests;

/// Offset of the end of the current line: the next `\n` or the end of input.
pub(crate) fn find_line_end(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos] != b'\n' {
        pos += 1;
    }
    pos
}

/// Offset of the next byte that is not a space or tab. Newlines are
/// significant and are not skipped.
pub(crate) fn skip_blank(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
        pos += 1;
    }
    pos
}

/// Offset of the closing single quote of a literal string, or failing that,
/// of the next newline or the end of input. Literal strings have no escape
/// sequences, so no parity check is needed. The caller must inspect the byte
/// at the returned offset; the call itself never fails.
///
/// `pos` must be beyond the opening quote.
pub(crate) fn find_literal_close(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos] != b'\'' && bytes[pos] != b'\n' {
        pos += 1;
    }
    pos
}

/// Offset of the first `'''` closing a multi-line literal string, or `None`
/// if the document ends first.
///
/// `pos` must be beyond the opening triple quote.
pub(crate) fn find_multiline_literal_close(bytes: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        match bytes.get(pos..pos + 3) {
            Some(b"'''") => return Some(pos),
            Some(_) => pos += 1,
            None => return None,
        }
    }
}

/// Returns `true` if the byte at `pos` is escaped: preceded by an odd number
/// of consecutive backslashes. Used at every candidate closing quote of a
/// basic string to distinguish `\"` from a real terminator.
pub(crate) fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    let mut backslashes = 0;
    while backslashes < pos && bytes[pos - 1 - backslashes] == b'\\' {
        backslashes += 1;
    }
    backslashes % 2 == 1
}

/// Offset of the closing double quote of a basic string, or failing that, of
/// the next newline or the end of input. Candidate quotes that the parity
/// check marks as escaped are stepped past and the search repeats. The
/// caller must inspect the byte at the returned offset.
///
/// `pos` must be beyond the opening quote.
pub(crate) fn find_basic_close(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        while pos < bytes.len() && bytes[pos] != b'"' && bytes[pos] != b'\n' {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'"' || !is_escaped(bytes, pos) {
            return pos;
        }
        pos += 1;
    }
}

/// Offset of the first unescaped `"""` closing a multi-line basic string, or
/// `None` if the document ends first.
///
/// `pos` must be beyond the opening triple quote.
pub(crate) fn find_multiline_basic_close(bytes: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        match bytes.get(pos..pos + 3) {
            Some(b"\"\"\"") => {
                if !is_escaped(bytes, pos) {
                    return Some(pos);
                }
                pos += 1;
            }
            Some(_) => pos += 1,
            None => return None,
        }
    }
}

/// Up to two quote characters directly before a closing triple delimiter
/// belong to the content, not the delimiter. Slides a candidate close right
/// to put them inside.
pub(crate) fn extend_triple_close(bytes: &[u8], mut close: usize, quote: u8) -> usize {
    let mut extra = 0;
    while extra < 2 && bytes.get(close + 3) == Some(&quote) {
        close += 1;
        extra += 1;
    }
    close
}

/// Steps over the whole string whose opening quote is at `pos`, returning
/// the offset just past its closing delimiter. Dispatches on the opening
/// bytes to the right closer; `None` means the string never closes.
pub(crate) fn skip_string(bytes: &[u8], pos: usize) -> Option<usize> {
    debug_assert!(matches!(bytes.get(pos), Some(b'"' | b'\'')));
    match bytes[pos] {
        b'"' if bytes.get(pos + 1..pos + 3) == Some(b"\"\"") => {
            let close = find_multiline_basic_close(bytes, pos + 3)?;
            Some(extend_triple_close(bytes, close, b'"') + 3)
        }
        b'"' => {
            let close = find_basic_close(bytes, pos + 1);
            (bytes.get(close) == Some(&b'"')).then_some(close + 1)
        }
        b'\'' if bytes.get(pos + 1..pos + 3) == Some(b"''") => {
            let close = find_multiline_literal_close(bytes, pos + 3)?;
            Some(extend_triple_close(bytes, close, b'\'') + 3)
        }
        _ => {
            let close = find_literal_close(bytes, pos + 1);
            (bytes.get(close) == Some(&b'\'')).then_some(close + 1)
        }
    }
}

/// Returns `true` for bytes allowed in a bare key: ASCII letters, digits,
/// `-`, and `_`.
#[inline]
pub(crate) fn is_bare_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

/// Offset of the first byte that cannot be part of a bare key.
pub(crate) fn find_bare_key_end(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && is_bare_key_byte(bytes[pos]) {
        pos += 1;
    }
    pos
}

/// Outcome of [`find_key_end_permissive`].
pub(crate) enum KeyScan {
    /// Offset of the `=` terminating the key.
    Eq(usize),
    /// A quoted key segment was never closed; offset of the failure.
    Unterminated(usize),
    /// An unescaped `#`, newline, or the end of input was reached before any
    /// `=`; offset of the offending byte.
    Invalid(usize),
}

/// Locates the `=` terminating a possibly-dotted, possibly-quoted key while
/// treating the contents of quoted segments as opaque. Only used to find the
/// `=` so the value after it can be classified; it does not validate the key
/// itself.
pub(crate) fn find_key_end_permissive(bytes: &[u8], mut pos: usize) -> KeyScan {
    loop {
        match bytes.get(pos) {
            None => return KeyScan::Invalid(pos),
            Some(b'=') => return KeyScan::Eq(pos),
            Some(b'"') => {
                let close = find_basic_close(bytes, pos + 1);
                if bytes.get(close) != Some(&b'"') {
                    return KeyScan::Unterminated(close);
                }
                pos = close;
            }
            Some(b'\'') => {
                let close = find_literal_close(bytes, pos + 1);
                if bytes.get(close) != Some(&b'\'') {
                    return KeyScan::Unterminated(close);
                }
                pos = close;
            }
            Some(b'#' | b'\n') => return KeyScan::Invalid(pos),
            Some(_) => {}
        }
        pos += 1;
    }
}

//! Bracket nesting matcher.
//!
//! Finds the closer matching an opening `[` or `{`. Nesting depth is tracked
//! with a 64-level stack of single bits, one bit per open bracket encoding
//! which closer to expect; push and pop are bit shifts, so matching up to 64
//! levels costs no allocation at all. Deeper nesting spills full 64-bit
//! windows onto a growable stack instead of recursing, so pathological depth
//! is bounded by heap, not by the host call stack.
//!
//! Quote characters are routed through the string closers of [`scan`] so
//! that bracket bytes inside strings are never mistaken for structural ones,
//! and `#` outside a string skips to the line end (multi-line arrays may
//! carry comments). Every other byte is advanced past without
//! interpretation.

use crate::scan;

#[cfg(test)]
#[path = "./bracket_tests.rs"]
mod tests;

/// How a bracket scan can fail; the payload is the byte offset of the
/// failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BracketError {
    /// The document ended with at least one bracket or string still open.
    Missing(usize),
    /// A closing bracket of the wrong type for the innermost open bracket.
    Mismatched(usize),
}

/// Number of open brackets each bit window can hold.
const WINDOW: u32 = 64;

/// Bracket type as a single bit: bit 5 of the ASCII code distinguishes
/// `{`/`}` (set) from `[`/`]` (clear), for openers and closers alike.
#[inline]
fn curly_bit(b: u8) -> u64 {
    u64::from(b & 0x20 != 0)
}

/// Given `open` positioned at an opening `[` or `{`, returns the offset of
/// its matching closer.
pub(crate) fn find_closing_bracket(bytes: &[u8], open: usize) -> Result<usize, BracketError> {
    debug_assert!(matches!(bytes.get(open), Some(b'[' | b'{')));
    let mut stack: u64 = curly_bit(bytes[open]);
    let mut depth: u32 = 1;
    let mut spill: Vec<u64> = Vec::new();
    let mut pos = open + 1;

    loop {
        match bytes.get(pos) {
            None => return Err(BracketError::Missing(open)),
            Some(b'"' | b'\'') => match scan::skip_string(bytes, pos) {
                Some(after) => pos = after,
                None => return Err(BracketError::Missing(pos)),
            },
            Some(b'#') => pos = scan::find_line_end(bytes, pos),
            Some(&b @ (b'[' | b'{')) => {
                if depth % WINDOW == 0 {
                    // Current window is full; park it and start a fresh one.
                    spill.push(stack);
                    stack = 0;
                }
                stack = (stack << 1) | curly_bit(b);
                depth += 1;
                pos += 1;
            }
            Some(&b @ (b']' | b'}')) => {
                if stack & 1 != curly_bit(b) {
                    return Err(BracketError::Mismatched(pos));
                }
                depth -= 1;
                if depth == 0 {
                    return Ok(pos);
                }
                if depth % WINDOW == 0 {
                    stack = spill.pop().unwrap_or(0);
                } else {
                    stack >>= 1;
                }
                pos += 1;
            }
            Some(_) => pos += 1,
        }
    }
}

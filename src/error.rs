use crate::Span;
use std::fmt::{self, Debug, Display};

#[cfg(test)]
#[path = "./error_tests.rs"]
mod tests;

/// Error that can occur when parsing TOML.
#[derive(Debug, Clone)]
pub struct Error {
    /// The error kind.
    pub kind: ErrorKind,
    /// The span where the error occurs.
    ///
    /// Note some [`ErrorKind`] contain additional span information.
    pub span: Span,
    /// Line and column of the error (both zero-based).
    pub line_info: Option<(usize, usize)>,
}

impl std::error::Error for Error {}

impl From<(ErrorKind, Span)> for Error {
    fn from((kind, span): (ErrorKind, Span)) -> Self {
        Self {
            kind,
            span,
            line_info: None,
        }
    }
}

/// The closed set of parse failures.
///
/// Every structural error is fatal to the whole parse: the build pass never
/// runs if the census pass failed, and no partially built tree is ever
/// returned.
#[derive(Clone, PartialEq)]
pub enum ErrorKind {
    /// An opened string, multi-line string, or bracket was never closed
    /// before its line or the document ended.
    MissingClose,

    /// A closing bracket does not match the innermost open bracket.
    MismatchedBracket,

    /// A key was malformed: empty, containing an invalid character, or not
    /// followed by `=` on its line.
    InvalidKey,

    /// A value failed to decode as any TOML literal, or unexpected text
    /// followed a well-formed value.
    InvalidValue,

    /// An invalid character was found after a backslash in a basic string.
    InvalidEscape(char),

    /// A key was assigned twice in the same table.
    DuplicateKey {
        /// The duplicate key.
        key: String,
        /// The span where the first key is located.
        first: Span,
    },

    /// A table header names an already-defined table.
    DuplicateTable {
        /// The name of the duplicate table.
        name: String,
        /// The span of the first definition.
        first: Span,
    },

    /// A previously defined table was redefined as an array of tables.
    RedefineAsArray,

    /// A dotted key attempted to descend through something that is not an
    /// extendable table.
    KeyNotTable {
        /// The span where the conflicting value was first defined.
        first: Span,
    },

    /// The 16-bit handle space of a backing store was exhausted. This is the
    /// constrained-environment analog of running out of memory.
    CapacityExceeded,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingClose => "missing-close",
            Self::MismatchedBracket => "mismatched-bracket",
            Self::InvalidKey => "invalid-key",
            Self::InvalidValue => "invalid-value",
            Self::InvalidEscape(..) => "invalid-escape",
            Self::DuplicateKey { .. } => "duplicate-key",
            Self::DuplicateTable { .. } => "duplicate-table",
            Self::RedefineAsArray => "redefine-as-array",
            Self::KeyNotTable { .. } => "key-not-table",
            Self::CapacityExceeded => "capacity-exceeded",
        };
        f.write_str(text)
    }
}

impl Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

struct Escape(char);

impl fmt::Display for Escape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use std::fmt::Write as _;

        if self.0.is_whitespace() || self.0.is_control() {
            for esc in self.0.escape_default() {
                f.write_char(esc)?;
            }
            Ok(())
        } else {
            f.write_char(self.0)
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::MissingClose => {
                f.write_str("unterminated string or bracket (missing close)")
            }
            ErrorKind::MismatchedBracket => f.write_str("mismatched closing bracket"),
            ErrorKind::InvalidKey => f.write_str("invalid key"),
            ErrorKind::InvalidValue => f.write_str("invalid value"),
            ErrorKind::InvalidEscape(c) => {
                write!(f, "invalid escape character in string: `{}`", Escape(*c))
            }
            ErrorKind::DuplicateKey { key, .. } => {
                write!(f, "duplicate key: `{key}`")
            }
            ErrorKind::DuplicateTable { name, .. } => {
                write!(f, "redefinition of table `{name}`")
            }
            ErrorKind::RedefineAsArray => f.write_str("table redefined as array"),
            ErrorKind::KeyNotTable { .. } => {
                f.write_str("dotted key attempted to extend non-table type")
            }
            ErrorKind::CapacityExceeded => {
                f.write_str("document exceeds the 16-bit handle capacity of a backing store")
            }
        }
    }
}

/// Computes zero-based `(line, column)` for a byte offset.
pub(crate) fn to_linecol(input: &str, offset: usize) -> (usize, usize) {
    let mut line_start = 0;
    let mut line_num = 0;
    for (i, b) in input.bytes().enumerate() {
        if i >= offset {
            return (line_num, offset - line_start);
        }
        if b == b'\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }
    (line_num, offset.saturating_sub(line_start))
}

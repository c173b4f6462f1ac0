//! A two-pass TOML parser for constrained environments.
//!
//! The document is walked twice. The first pass counts: how many tables the
//! document defines and how many entries each will hold, without decoding a
//! single value. The second pass allocates every table at exactly the
//! counted size and fills it in, so nothing in the finished [`Tree`] is ever
//! grown, reallocated, or moved. Tables and arrays are addressed by 16-bit
//! handles instead of pointers, which keeps the whole structure flat and
//! relocatable; strings borrow from the input wherever no unescaping is
//! needed.
//!
//! ```
//! let doc = r#"
//! [server]
//! host = "example.com"
//! ports = [8000, 8001]
//! "#;
//! let tree = toml_tally::parse(doc)?;
//! let server = tree.root().get_table("server").unwrap();
//! assert_eq!(server.get("host").and_then(|v| v.as_str()), Some("example.com"));
//! assert_eq!(server.get_array("ports").unwrap().len(), 2);
//! # Ok::<(), toml_tally::Error>(())
//! ```
//!
//! Any structural problem fails the whole parse with an [`Error`] carrying
//! the byte [`Span`] and line/column of the offending text; no partially
//! built tree is ever returned. A document needing more than 65535 tables,
//! arrays, or entries in one table exceeds the handle space and is rejected
//! with [`ErrorKind::CapacityExceeded`].

mod bracket;
mod builder;
mod census;
mod datetime;
mod error;
mod scan;
mod span;
mod str;
mod tree;
mod value;

pub use datetime::{Date, Datetime, Offset, Time};
pub use error::{Error, ErrorKind};
pub use span::Span;
pub use tree::{ArrayId, ArrayKind, ArrayRef, TableId, TableRef, Tree};
pub use value::{Key, Value, ValueKind};

/// Parses a TOML document.
///
/// The returned [`Tree`] borrows `input`; string values that needed no
/// unescaping are slices of it.
pub fn parse(input: &str) -> Result<Tree<'_>, Error> {
    // Spans store u32 offsets, so longer inputs cannot be addressed.
    if u32::try_from(input.len()).is_err() {
        return Err(Error {
            kind: ErrorKind::CapacityExceeded,
            span: Span::default(),
            line_info: None,
        });
    }
    let census = census::run(input).map_err(|(pos, kind)| error_at(input, Span::at(pos), kind))?;
    builder::build(input, census).map_err(|(span, kind)| error_at(input, span, kind))
}

fn error_at(input: &str, span: Span, kind: ErrorKind) -> Error {
    Error {
        kind,
        span,
        line_info: Some(error::to_linecol(input, span.start as usize)),
    }
}

//! The build pass.
//!
//! Walks the document a second time, in lockstep with the counts taken by
//! the counting pass, and materializes the [`Tree`]. Every table is
//! allocated at the exact entry count its census node recorded; inline
//! arrays and tables are counted on the spot with
//! [`census::count_elements`] just before allocation. Nothing in the tree is
//! ever grown or moved after it is allocated.
//!
//! This pass owns all semantic validation the counting pass skipped:
//! duplicate keys and headers, header/dotted/inline extension rules, value
//! decoding, and trailing-text checks. Errors carry a [`Span`]; the caller
//! attaches line and column information.

use crate::census::{self, Census, Child, NodeId};
use crate::datetime;
use crate::error::ErrorKind;
use crate::scan::{self, KeyScan};
use crate::str;
use crate::tree::{TableId, TableState, Tree};
use crate::value::{Key, Value};
use crate::Span;

#[cfg(test)]
#[path = "./builder_tests.rs"]
mod tests;

type BuildResult<T> = Result<T, (Span, ErrorKind)>;

/// Lifts a byte-offset error from the scanning layer into a spanned one.
fn lift((pos, kind): (usize, ErrorKind)) -> (Span, ErrorKind) {
    (Span::at(pos), kind)
}

/// Builds the tree for a document whose counts are already taken.
pub(crate) fn build<'de>(input: &'de str, census: Census) -> Result<Tree<'de>, (Span, ErrorKind)> {
    let tree = Tree::with_root(census.entry_count(census::ROOT));
    let root = (tree.root_id(), census::ROOT);
    let mut builder = Builder {
        input,
        bytes: input.as_bytes(),
        census,
        tree,
        active: root,
        pos: 0,
    };
    builder.document()?;
    Ok(builder.tree)
}

/// A table handle paired with its census node; the two trees are navigated
/// together.
type Cursor = (TableId, NodeId);

struct Builder<'de> {
    input: &'de str,
    bytes: &'de [u8],
    census: Census,
    tree: Tree<'de>,
    /// Table the current section's key-value lines land in.
    active: Cursor,
    pos: usize,
}

impl<'de> Builder<'de> {
    fn document(&mut self) -> BuildResult<()> {
        while self.pos < self.bytes.len() {
            self.pos = scan::skip_blank(self.bytes, self.pos);
            match self.bytes.get(self.pos) {
                None => break,
                Some(b'\n') => self.pos += 1,
                Some(b'\r') if self.bytes.get(self.pos + 1) == Some(&b'\n') => self.pos += 2,
                Some(b'\r') => return Err((Span::at(self.pos), ErrorKind::InvalidKey)),
                Some(b'#') => self.pos = scan::find_line_end(self.bytes, self.pos),
                Some(b'[') => self.table_header()?,
                Some(_) => self.key_value()?,
            }
        }
        Ok(())
    }

    /// Looks up an existing entry, copying out the pieces the navigation
    /// functions need so no borrow of the tree outlives the call. Entry
    /// values are handles or small scalars, so the clone is cheap on every
    /// path that can reach here.
    fn find_entry(&self, tid: TableId, name: &str) -> Option<(Span, Value<'de>)> {
        self.tree
            .table_find(tid, name)
            .map(|e| (e.key.span, e.value.clone()))
    }

    /// The census node behind the named child of `at`. For an array of
    /// tables the element the builder has most recently created is the one
    /// that corresponds.
    fn child_node(&self, at: Cursor, name: &str, elem: Option<usize>) -> Option<NodeId> {
        match self.census.child(at.1, name)? {
            Child::Table(id) => Some(*id),
            Child::Tables(ids) => Some(ids[elem?]),
        }
    }

    /// Processes a `[name]` or `[[name]]` header line and switches the
    /// active table.
    fn table_header(&mut self) -> BuildResult<()> {
        let start = self.pos;
        let aot = self.bytes.get(start + 1) == Some(&b'[');
        let mut cur = scan::skip_blank(self.bytes, start + 1 + aot as usize);
        let mut at = (self.tree.root_id(), census::ROOT);
        loop {
            let (key, next) = str::read_key_segment(self.input, cur).map_err(lift)?;
            cur = scan::skip_blank(self.bytes, next);
            match self.bytes.get(cur) {
                Some(b'.') => {
                    at = self.descend(at, key)?;
                    cur = scan::skip_blank(self.bytes, cur + 1);
                }
                Some(b']') if aot => {
                    if self.bytes.get(cur + 1) != Some(&b']') {
                        return Err((Span::at(cur), ErrorKind::MissingClose));
                    }
                    let header = Span::new(start as u32, cur as u32 + 2);
                    self.active = self.enter_aot(at, key, header)?;
                    self.pos = self.line_tail(cur + 2)?;
                    return Ok(());
                }
                Some(b']') => {
                    let header = Span::new(start as u32, cur as u32 + 1);
                    self.active = self.enter_header(at, key, header)?;
                    self.pos = self.line_tail(cur + 1)?;
                    return Ok(());
                }
                None => return Err((Span::at(cur), ErrorKind::MissingClose)),
                _ => return Err((Span::at(cur), ErrorKind::InvalidKey)),
            }
        }
    }

    /// Steps through an intermediate segment of a header path. Existing
    /// header and implicit tables may be passed through; an array of tables
    /// routes to its most recent element; anything else is a conflict.
    fn descend(&mut self, at: Cursor, key: Key<'de>) -> BuildResult<Cursor> {
        if let Some((first, value)) = self.find_entry(at.0, &key.name) {
            return match value {
                Value::Table(tid) => match self.tree.table_repr(tid).state {
                    TableState::Implicit | TableState::Header => {
                        let nid = self
                            .child_node(at, &key.name, None)
                            .ok_or((key.span, ErrorKind::InvalidKey))?;
                        Ok((tid, nid))
                    }
                    TableState::Dotted | TableState::Inline => {
                        Err((key.span, ErrorKind::KeyNotTable { first }))
                    }
                },
                Value::Array(aid) if self.tree.array_repr(aid).aot => {
                    let tid = self
                        .tree
                        .aot_last(aid)
                        .ok_or((key.span, ErrorKind::InvalidKey))?;
                    let elem = self.tree.array_repr(aid).len as usize - 1;
                    let nid = self
                        .child_node(at, &key.name, Some(elem))
                        .ok_or((key.span, ErrorKind::InvalidKey))?;
                    Ok((tid, nid))
                }
                _ => Err((key.span, ErrorKind::KeyNotTable { first })),
            };
        }
        let nid = self
            .child_node(at, &key.name, None)
            .ok_or((key.span, ErrorKind::InvalidKey))?;
        let cap = self.census.entry_count(nid);
        let tid = self.new_table(cap, TableState::Implicit, key.span)?;
        self.insert(at.0, key, Value::Table(tid))?;
        Ok((tid, nid))
    }

    /// Claims the final segment of a `[name]` header. An implicit table may
    /// be claimed once and is promoted; anything already defined is a
    /// duplicate.
    fn enter_header(&mut self, at: Cursor, key: Key<'de>, header: Span) -> BuildResult<Cursor> {
        if let Some((first, value)) = self.find_entry(at.0, &key.name) {
            return match value {
                Value::Table(tid) if self.tree.table_repr(tid).state == TableState::Implicit => {
                    let nid = self
                        .child_node(at, &key.name, None)
                        .ok_or((key.span, ErrorKind::InvalidKey))?;
                    let repr = self.tree.table_repr_mut(tid);
                    repr.state = TableState::Header;
                    repr.span = header;
                    Ok((tid, nid))
                }
                Value::Table(tid) => Err((
                    key.span,
                    ErrorKind::DuplicateTable {
                        name: key.name.into_owned(),
                        first: self.tree.table_repr(tid).span,
                    },
                )),
                _ => Err((
                    key.span,
                    ErrorKind::DuplicateTable {
                        name: key.name.into_owned(),
                        first,
                    },
                )),
            };
        }
        let nid = self
            .child_node(at, &key.name, None)
            .ok_or((key.span, ErrorKind::InvalidKey))?;
        let cap = self.census.entry_count(nid);
        let tid = self.new_table(cap, TableState::Header, header)?;
        self.insert(at.0, key, Value::Table(tid))?;
        Ok((tid, nid))
    }

    /// Appends an element for a `[[name]]` header, creating the array on
    /// the first one. The array's capacity is the total number of `[[name]]`
    /// headers the counting pass saw.
    fn enter_aot(&mut self, at: Cursor, key: Key<'de>, header: Span) -> BuildResult<Cursor> {
        if let Some((_first, value)) = self.find_entry(at.0, &key.name) {
            return match value {
                Value::Array(aid) if self.tree.array_repr(aid).aot => {
                    let elem = self.tree.array_repr(aid).len as usize;
                    let nid = self
                        .child_node(at, &key.name, Some(elem))
                        .ok_or((key.span, ErrorKind::InvalidKey))?;
                    let cap = self.census.entry_count(nid);
                    let tid = self.new_table(cap, TableState::Header, header)?;
                    if !self.tree.array_push(aid, Value::Table(tid)) {
                        return Err((key.span, ErrorKind::CapacityExceeded));
                    }
                    Ok((tid, nid))
                }
                _ => Err((key.span, ErrorKind::RedefineAsArray)),
            };
        }
        let Some(Child::Tables(ids)) = self.census.child(at.1, &key.name) else {
            return Err((key.span, ErrorKind::InvalidKey));
        };
        let nid = ids[0];
        let total = u16::try_from(ids.len()).map_err(|_| (key.span, ErrorKind::CapacityExceeded))?;
        let cap = self.census.entry_count(nid);
        let aid = self
            .tree
            .new_array(total, true)
            .ok_or((key.span, ErrorKind::CapacityExceeded))?;
        let tid = self.new_table(cap, TableState::Header, header)?;
        if !self.tree.array_push(aid, Value::Table(tid)) {
            return Err((key.span, ErrorKind::CapacityExceeded));
        }
        self.insert(at.0, key, Value::Array(aid))?;
        Ok((tid, nid))
    }

    /// Processes one key-value line under the active table.
    fn key_value(&mut self) -> BuildResult<()> {
        // Locate the `=` up front so a malformed key fails before the value
        // is touched.
        match scan::find_key_end_permissive(self.bytes, self.pos) {
            KeyScan::Eq(..) => {}
            KeyScan::Unterminated(p) => return Err((Span::at(p), ErrorKind::MissingClose)),
            KeyScan::Invalid(p) => return Err((Span::at(p), ErrorKind::InvalidKey)),
        }
        let mut cur = self.pos;
        let mut at = self.active;
        loop {
            let (key, next) = str::read_key_segment(self.input, cur).map_err(lift)?;
            cur = scan::skip_blank(self.bytes, next);
            match self.bytes.get(cur) {
                Some(b'.') => {
                    at = self.enter_dotted(at, key)?;
                    cur = scan::skip_blank(self.bytes, cur + 1);
                }
                Some(b'=') => {
                    cur = scan::skip_blank(self.bytes, cur + 1);
                    let (value, after) = self.value(cur)?;
                    self.insert(at.0, key, value)?;
                    self.pos = self.line_tail(after)?;
                    return Ok(());
                }
                _ => return Err((Span::at(cur), ErrorKind::InvalidKey)),
            }
        }
    }

    /// Steps through one segment of a dotted key. Only tables this same
    /// mechanism created may be extended; tables defined any other way are
    /// closed to dotted keys.
    fn enter_dotted(&mut self, at: Cursor, key: Key<'de>) -> BuildResult<Cursor> {
        if let Some((first, value)) = self.find_entry(at.0, &key.name) {
            return match value {
                Value::Table(tid) if self.tree.table_repr(tid).state == TableState::Dotted => {
                    let nid = self
                        .child_node(at, &key.name, None)
                        .ok_or((key.span, ErrorKind::InvalidKey))?;
                    Ok((tid, nid))
                }
                _ => Err((key.span, ErrorKind::KeyNotTable { first })),
            };
        }
        let nid = self
            .child_node(at, &key.name, None)
            .ok_or((key.span, ErrorKind::InvalidKey))?;
        let cap = self.census.entry_count(nid);
        let tid = self.new_table(cap, TableState::Dotted, key.span)?;
        self.insert(at.0, key, Value::Table(tid))?;
        Ok((tid, nid))
    }

    fn new_table(&mut self, cap: u16, state: TableState, span: Span) -> BuildResult<TableId> {
        self.tree
            .new_table(cap, state, span)
            .ok_or((span, ErrorKind::CapacityExceeded))
    }

    /// Inserts an entry, rejecting duplicates within the table.
    fn insert(&mut self, tid: TableId, key: Key<'de>, value: Value<'de>) -> BuildResult<()> {
        if let Some(first) = self.tree.table_find(tid, &key.name).map(|e| e.key.span) {
            return Err((
                key.span,
                ErrorKind::DuplicateKey {
                    key: key.name.into_owned(),
                    first,
                },
            ));
        }
        let span = key.span;
        if !self.tree.table_insert(tid, key, value) {
            return Err((span, ErrorKind::CapacityExceeded));
        }
        Ok(())
    }

    /// Decodes the value starting at `pos`, returning it with the offset of
    /// the first byte past it.
    fn value(&mut self, pos: usize) -> BuildResult<(Value<'de>, usize)> {
        match self.bytes.get(pos) {
            None => Err((Span::at(pos), ErrorKind::InvalidValue)),
            Some(b'"' | b'\'') => {
                let (text, after) = str::read_string(self.input, pos).map_err(lift)?;
                Ok((Value::String(text), after))
            }
            Some(b'{') => self.inline_table(pos),
            Some(b'[') => self.array(pos),
            Some(_) => self.scalar(pos),
        }
    }

    /// Whitespace, newlines, and comments inside an inline container. A bare
    /// carriage return is not trivia and stops the scan for the caller to
    /// reject.
    fn skip_trivia(&self, mut pos: usize) -> usize {
        loop {
            pos = scan::skip_blank(self.bytes, pos);
            match self.bytes.get(pos) {
                Some(b'\n') => pos += 1,
                Some(b'\r') if self.bytes.get(pos + 1) == Some(&b'\n') => pos += 2,
                Some(b'#') => pos = scan::find_line_end(self.bytes, pos),
                _ => return pos,
            }
        }
    }

    /// Decodes an inline table, counting its entries just before allocating
    /// it.
    fn inline_table(&mut self, open: usize) -> BuildResult<(Value<'de>, usize)> {
        let cap = census::count_elements(self.bytes, open).map_err(lift)?;
        let tid = self.new_table(cap, TableState::Inline, Span::at(open))?;
        let mut cur = self.skip_trivia(open + 1);
        if self.bytes.get(cur) == Some(&b'}') {
            return Ok((Value::Table(tid), cur + 1));
        }
        loop {
            let (key, next) = str::read_key_segment(self.input, cur).map_err(lift)?;
            cur = scan::skip_blank(self.bytes, next);
            if self.bytes.get(cur) != Some(&b'=') {
                return Err((Span::at(cur), ErrorKind::InvalidKey));
            }
            cur = self.skip_trivia(cur + 1);
            let (value, after) = self.value(cur)?;
            self.insert(tid, key, value)?;
            cur = self.skip_trivia(after);
            match self.bytes.get(cur) {
                Some(b'}') => return Ok((Value::Table(tid), cur + 1)),
                Some(b',') => {
                    cur = self.skip_trivia(cur + 1);
                    if self.bytes.get(cur) == Some(&b'}') {
                        return Ok((Value::Table(tid), cur + 1));
                    }
                }
                _ => return Err((Span::at(cur), ErrorKind::InvalidValue)),
            }
        }
    }

    /// Decodes an array, counting its elements just before allocating it.
    fn array(&mut self, open: usize) -> BuildResult<(Value<'de>, usize)> {
        let cap = census::count_elements(self.bytes, open).map_err(lift)?;
        let aid = self
            .tree
            .new_array(cap, false)
            .ok_or((Span::at(open), ErrorKind::CapacityExceeded))?;
        let mut cur = self.skip_trivia(open + 1);
        if self.bytes.get(cur) == Some(&b']') {
            return Ok((Value::Array(aid), cur + 1));
        }
        loop {
            let (value, after) = self.value(cur)?;
            if !self.tree.array_push(aid, value) {
                return Err((Span::at(cur), ErrorKind::CapacityExceeded));
            }
            cur = self.skip_trivia(after);
            match self.bytes.get(cur) {
                Some(b']') => return Ok((Value::Array(aid), cur + 1)),
                Some(b',') => {
                    cur = self.skip_trivia(cur + 1);
                    if self.bytes.get(cur) == Some(&b']') {
                        return Ok((Value::Array(aid), cur + 1));
                    }
                }
                _ => return Err((Span::at(cur), ErrorKind::InvalidValue)),
            }
        }
    }

    /// Decodes a scalar: boolean, integer, float, or date-time. Date-times
    /// are probed first because the space-separated form crosses the token
    /// boundary every other scalar ends at.
    fn scalar(&mut self, pos: usize) -> BuildResult<(Value<'de>, usize)> {
        if datetime::looks_like(self.bytes, pos) {
            return match datetime::munch(self.bytes, pos) {
                Some((dt, after)) => Ok((Value::Datetime(dt), after)),
                None => Err((Span::at(pos), ErrorKind::InvalidValue)),
            };
        }
        let end = scalar_end(self.bytes, pos);
        let token = &self.input[pos..end];
        let value = match token {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => parse_number(token)
                .ok_or((Span::new(pos as u32, end as u32), ErrorKind::InvalidValue))?,
        };
        Ok((value, end))
    }

    /// Consumes the rest of the line after a value or header: blanks, an
    /// optional comment, then a line ending or the end of input.
    fn line_tail(&self, pos: usize) -> BuildResult<usize> {
        let mut cur = scan::skip_blank(self.bytes, pos);
        if self.bytes.get(cur) == Some(&b'#') {
            cur = scan::find_line_end(self.bytes, cur);
        }
        match self.bytes.get(cur) {
            None => Ok(cur),
            Some(b'\n') => Ok(cur + 1),
            Some(b'\r') if self.bytes.get(cur + 1) == Some(&b'\n') => Ok(cur + 2),
            _ => Err((Span::at(cur), ErrorKind::InvalidValue)),
        }
    }
}

/// Offset of the first byte that ends a single-token scalar.
fn scalar_end(bytes: &[u8], mut pos: usize) -> usize {
    while let Some(b) = bytes.get(pos) {
        match b {
            b' ' | b'\t' | b',' | b']' | b'}' | b'#' | b'\n' | b'\r' => break,
            _ => pos += 1,
        }
    }
    pos
}

/// Decodes an integer or float token, `None` if it is not a well-formed
/// number.
fn parse_number<'de>(token: &str) -> Option<Value<'de>> {
    let (neg, body, signed) = match token.as_bytes().first()? {
        b'+' => (false, &token[1..], true),
        b'-' => (true, &token[1..], true),
        _ => (false, token, false),
    };
    match body {
        "inf" => {
            return Some(Value::Float(if neg {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }));
        }
        "nan" => return Some(Value::Float(if neg { -f64::NAN } else { f64::NAN })),
        _ => {}
    }
    // Radix-prefixed integers take no sign.
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(rest) = body.strip_prefix(prefix) {
            if signed {
                return None;
            }
            return parse_radix(rest, radix).map(Value::Integer);
        }
    }
    if body
        .bytes()
        .any(|b| matches!(b, b'.' | b'e' | b'E'))
    {
        parse_float(body, token).map(Value::Float)
    } else {
        parse_decimal(body, neg).map(Value::Integer)
    }
}

/// A run of digits with underscores strictly between them.
fn digits_ok(part: &str, forbid_leading_zero: bool) -> bool {
    let bytes = part.as_bytes();
    if bytes.is_empty() || bytes[0] == b'_' || bytes[bytes.len() - 1] == b'_' {
        return false;
    }
    if forbid_leading_zero && bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    let mut prev = 0u8;
    for &b in bytes {
        if b == b'_' && prev == b'_' {
            return false;
        }
        if b != b'_' && !b.is_ascii_digit() {
            return false;
        }
        prev = b;
    }
    true
}

/// Decimal integer body, without its sign. Accumulates negative so
/// `i64::MIN` round-trips.
fn parse_decimal(body: &str, neg: bool) -> Option<i64> {
    if !digits_ok(body, true) {
        return None;
    }
    let mut value: i64 = 0;
    for b in body.bytes() {
        if b == b'_' {
            continue;
        }
        value = value.checked_mul(10)?.checked_sub((b - b'0') as i64)?;
    }
    if neg { Some(value) } else { value.checked_neg() }
}

/// Radix integer body, after its prefix. Every byte must be an underscore or
/// a digit of the radix; `from_str_radix` alone would also accept a sign.
fn parse_radix(rest: &str, radix: u32) -> Option<i64> {
    let bytes = rest.as_bytes();
    if bytes.is_empty() || bytes[0] == b'_' || bytes[bytes.len() - 1] == b'_' {
        return None;
    }
    let mut prev = 0u8;
    for &b in bytes {
        if b == b'_' && prev == b'_' {
            return None;
        }
        if b != b'_' && !(b as char).is_digit(radix) {
            return None;
        }
        prev = b;
    }
    let cleaned: String = rest.chars().filter(|c| *c != '_').collect();
    i64::from_str_radix(&cleaned, radix).ok()
}

/// Float body without its sign, validated part by part, then handed (with
/// sign, underscores removed) to the standard float parser. Overflowing
/// literals are rejected rather than rounded to infinity.
fn parse_float(body: &str, token: &str) -> Option<f64> {
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (body, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    if !digits_ok(int_part, true) {
        return None;
    }
    if let Some(frac) = frac_part {
        if !digits_ok(frac, false) {
            return None;
        }
    }
    if let Some(exp) = exponent {
        let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        if !digits_ok(exp, false) {
            return None;
        }
    }
    let cleaned: String = token.chars().filter(|c| *c != '_').collect();
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

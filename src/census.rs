//! The counting pass.
//!
//! Walks the document once before anything is built, producing a tree of
//! counts: one node per table the document will define, each knowing how
//! many entries it will hold and which named children it has. The build pass
//! walks the same document in the same order and uses these counts to
//! allocate every table at its exact final size.
//!
//! Values are never decoded here. A value is only skipped over, using the
//! string closers and the bracket matcher, which is also where unterminated
//! strings and unbalanced brackets surface first. Duplicate keys, duplicate
//! headers, and type conflicts are deliberately not detected in this pass;
//! the build pass reaches the same spot in the document and reports them
//! with full context. A count taken here may therefore overshoot on a
//! document the build pass rejects, which is harmless.
//!
//! Inline tables and arrays are not counted here either: the build pass
//! counts each one on the spot with [`count_elements`] just before
//! allocating it.

use crate::bracket::{self, BracketError};
use crate::error::ErrorKind;
use crate::scan::{self, KeyScan};
use crate::str;
use foldhash::HashMap;

#[cfg(test)]
#[path = "./census_tests.rs"]
mod tests;

pub(crate) type NodeId = u32;

/// The node describing the document's top-level table.
pub(crate) const ROOT: NodeId = 0;

/// A named child of a census node.
#[derive(Debug)]
pub(crate) enum Child {
    Table(NodeId),
    /// An array of tables, one node per `[[name]]` header, in document
    /// order. Never empty.
    Tables(Vec<NodeId>),
}

#[derive(Debug, Default)]
pub(crate) struct Node {
    /// Number of entries the table will hold: explicit key-value lines plus
    /// one for each child created under it.
    pub(crate) entries: u16,
    pub(crate) children: HashMap<Box<str>, Child>,
}

/// Per-table counts for one document, produced by [`run`].
#[derive(Debug)]
pub(crate) struct Census {
    nodes: Vec<Node>,
}

/// Counts the whole document. The cursor discipline mirrors the build pass
/// line for line: both passes classify each line the same way and step over
/// the same spans, so they agree on which tables exist and when.
pub(crate) fn run(input: &str) -> Result<Census, (usize, ErrorKind)> {
    let bytes = input.as_bytes();
    let mut census = Census {
        nodes: vec![Node::default()],
    };
    let mut active = ROOT;
    let mut pos = 0;
    while pos < bytes.len() {
        pos = scan::skip_blank(bytes, pos);
        match bytes.get(pos) {
            None => break,
            // Bare carriage returns are stepped over here; the build pass
            // rejects any that are not part of a CRLF pair.
            Some(b'\n' | b'\r') => pos += 1,
            Some(b'#') => pos = scan::find_line_end(bytes, pos),
            Some(b'[') => {
                let (node, next) = census.header(input, pos)?;
                active = node;
                pos = next;
            }
            Some(_) => pos = census.key_value(input, active, pos)?,
        }
    }
    Ok(census)
}

impl Census {
    pub(crate) fn entry_count(&self, node: NodeId) -> u16 {
        self.nodes[node as usize].entries
    }

    pub(crate) fn child(&self, node: NodeId, name: &str) -> Option<&Child> {
        self.nodes[node as usize].children.get(name)
    }

    fn push_node(&mut self) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::default());
        id
    }

    /// Records one more upcoming entry for `node`.
    fn bump(&mut self, node: NodeId, pos: usize) -> Result<(), (usize, ErrorKind)> {
        let entries = &mut self.nodes[node as usize].entries;
        *entries = entries
            .checked_add(1)
            .ok_or((pos, ErrorKind::CapacityExceeded))?;
        Ok(())
    }

    /// Descends into the named child of `node`, creating it (and charging
    /// the parent one entry) if it does not exist yet. Descending into an
    /// array of tables means its most recent element.
    fn enter_table(
        &mut self,
        node: NodeId,
        name: &str,
        pos: usize,
    ) -> Result<NodeId, (usize, ErrorKind)> {
        match self.nodes[node as usize].children.get(name) {
            Some(Child::Table(id)) => return Ok(*id),
            Some(Child::Tables(ids)) => return Ok(ids[ids.len() - 1]),
            None => {}
        }
        self.bump(node, pos)?;
        let id = self.push_node();
        self.nodes[node as usize]
            .children
            .insert(name.into(), Child::Table(id));
        Ok(id)
    }

    /// Appends a node for the next `[[name]]` element. Only the first
    /// element charges the parent an entry. If the name is already an
    /// ordinary table the node is left unlinked; the build pass rejects the
    /// document before the count is ever used.
    fn append_aot(
        &mut self,
        node: NodeId,
        name: &str,
        pos: usize,
    ) -> Result<NodeId, (usize, ErrorKind)> {
        match self.nodes[node as usize].children.get(name) {
            Some(Child::Tables(_)) => {
                let id = self.push_node();
                if let Some(Child::Tables(ids)) = self.nodes[node as usize].children.get_mut(name) {
                    ids.push(id);
                }
                Ok(id)
            }
            Some(Child::Table(_)) => Ok(self.push_node()),
            None => {
                self.bump(node, pos)?;
                let id = self.push_node();
                self.nodes[node as usize]
                    .children
                    .insert(name.into(), Child::Tables(vec![id]));
                Ok(id)
            }
        }
    }

    /// Counts a `[name]` or `[[name]]` header line, returning the node the
    /// header selects and the offset of its line end.
    fn header(&mut self, input: &str, pos: usize) -> Result<(NodeId, usize), (usize, ErrorKind)> {
        let bytes = input.as_bytes();
        let aot = bytes.get(pos + 1) == Some(&b'[');
        let mut cur = scan::skip_blank(bytes, pos + 1 + aot as usize);
        let mut node = ROOT;
        loop {
            let (key, next) = str::read_key_segment(input, cur)?;
            cur = scan::skip_blank(bytes, next);
            match bytes.get(cur) {
                Some(b'.') => {
                    node = self.enter_table(node, &key.name, cur)?;
                    cur = scan::skip_blank(bytes, cur + 1);
                }
                Some(b']') if aot => {
                    if bytes.get(cur + 1) != Some(&b']') {
                        return Err((cur, ErrorKind::MissingClose));
                    }
                    let id = self.append_aot(node, &key.name, cur)?;
                    return Ok((id, scan::find_line_end(bytes, cur + 2)));
                }
                Some(b']') => {
                    let id = self.enter_table(node, &key.name, cur)?;
                    return Ok((id, scan::find_line_end(bytes, cur + 1)));
                }
                None => return Err((cur, ErrorKind::MissingClose)),
                _ => return Err((cur, ErrorKind::InvalidKey)),
            }
        }
    }

    /// Counts a key-value line under the table `active`, returning the
    /// offset of the line end past the value.
    fn key_value(
        &mut self,
        input: &str,
        active: NodeId,
        pos: usize,
    ) -> Result<usize, (usize, ErrorKind)> {
        let bytes = input.as_bytes();
        // Locate the `=` first so a malformed key fails here, in document
        // order, rather than after the value has been looked at.
        match scan::find_key_end_permissive(bytes, pos) {
            KeyScan::Eq(..) => {}
            KeyScan::Unterminated(p) => return Err((p, ErrorKind::MissingClose)),
            KeyScan::Invalid(p) => return Err((p, ErrorKind::InvalidKey)),
        }
        let mut cur = pos;
        let mut node = active;
        loop {
            let (key, next) = str::read_key_segment(input, cur)?;
            cur = scan::skip_blank(bytes, next);
            match bytes.get(cur) {
                Some(b'.') => {
                    node = self.enter_table(node, &key.name, cur)?;
                    cur = scan::skip_blank(bytes, cur + 1);
                }
                Some(b'=') => {
                    self.bump(node, cur)?;
                    cur += 1;
                    break;
                }
                _ => return Err((cur, ErrorKind::InvalidKey)),
            }
        }
        skip_value(bytes, scan::skip_blank(bytes, cur))
    }
}

/// Steps over a value without decoding it, returning the offset of the line
/// end past it. Only strings and brackets need real work; any other value
/// ends with its line.
fn skip_value(bytes: &[u8], pos: usize) -> Result<usize, (usize, ErrorKind)> {
    match bytes.get(pos) {
        Some(b'"' | b'\'') => match scan::skip_string(bytes, pos) {
            Some(after) => Ok(scan::find_line_end(bytes, after)),
            None => Err((pos, ErrorKind::MissingClose)),
        },
        Some(b'[' | b'{') => match bracket::find_closing_bracket(bytes, pos) {
            Ok(close) => Ok(scan::find_line_end(bytes, close + 1)),
            Err(BracketError::Missing(p)) => Err((p, ErrorKind::MissingClose)),
            Err(BracketError::Mismatched(p)) => Err((p, ErrorKind::MismatchedBracket)),
        },
        _ => Ok(scan::find_line_end(bytes, pos)),
    }
}

/// Counts the comma-separated elements of the inline array or table opening
/// at `open`. Nested containers and strings are stepped over whole, so only
/// top-level commas separate. Used by the build pass right before it
/// allocates the container.
pub(crate) fn count_elements(bytes: &[u8], open: usize) -> Result<u16, (usize, ErrorKind)> {
    let close_byte = if bytes[open] == b'[' { b']' } else { b'}' };
    let mut pos = open + 1;
    let mut count: u16 = 0;
    let mut in_element = false;
    loop {
        match bytes.get(pos) {
            None => return Err((open, ErrorKind::MissingClose)),
            Some(&b) if b == close_byte => {
                if in_element {
                    count = count
                        .checked_add(1)
                        .ok_or((pos, ErrorKind::CapacityExceeded))?;
                }
                return Ok(count);
            }
            Some(b']' | b'}') => return Err((pos, ErrorKind::MismatchedBracket)),
            Some(b',') => {
                if in_element {
                    count = count
                        .checked_add(1)
                        .ok_or((pos, ErrorKind::CapacityExceeded))?;
                    in_element = false;
                }
                pos += 1;
            }
            Some(b'#') => pos = scan::find_line_end(bytes, pos),
            Some(b'"' | b'\'') => match scan::skip_string(bytes, pos) {
                Some(after) => {
                    in_element = true;
                    pos = after;
                }
                None => return Err((pos, ErrorKind::MissingClose)),
            },
            Some(b'[' | b'{') => match bracket::find_closing_bracket(bytes, pos) {
                Ok(close) => {
                    in_element = true;
                    pos = close + 1;
                }
                Err(BracketError::Missing(p)) => return Err((p, ErrorKind::MissingClose)),
                Err(BracketError::Mismatched(p)) => {
                    return Err((p, ErrorKind::MismatchedBracket));
                }
            },
            Some(b'\r') if bytes.get(pos + 1) == Some(&b'\n') => pos += 2,
            Some(b'\r') => return Err((pos, ErrorKind::InvalidValue)),
            Some(b' ' | b'\t' | b'\n') => pos += 1,
            Some(_) => {
                in_element = true;
                pos += 1;
            }
        }
    }
}

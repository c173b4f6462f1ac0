//! Handle-indexed document storage.
//!
//! The tree owns four flat arenas: the per-table metadata, the per-array
//! metadata, and two shared slabs holding every table entry and every array
//! element. Tables and arrays are addressed by 16-bit handles; an entry or
//! element carrying a nested table or array stores such a handle rather than
//! a pointer.
//!
//! Every table and array is created with its final capacity up front, known
//! from the counting pass, and its slab region is reserved in one shot. A
//! region is filled in place and never moves or grows, so handles and entry
//! positions stay stable for the life of the tree.

use crate::value::{Key, Value, ValueKind};
use crate::Span;
use std::borrow::Cow;
use std::fmt;
use std::num::NonZeroU16;

#[cfg(test)]
#[path = "./tree_tests.rs"]
mod tests;

/// Handle to a table within a [`Tree`].
///
/// Internally the index plus one, so `Option<TableId>` is pointer-sized and
/// "no table" needs no reserved index.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct TableId(NonZeroU16);

/// Handle to an array within a [`Tree`].
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ArrayId(NonZeroU16);

impl TableId {
    fn from_index(index: usize) -> Option<Self> {
        let raw = u16::try_from(index.checked_add(1)?).ok()?;
        Some(Self(NonZeroU16::new(raw)?))
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

impl ArrayId {
    fn from_index(index: usize) -> Option<Self> {
        let raw = u16::try_from(index.checked_add(1)?).ok()?;
        Some(Self(NonZeroU16::new(raw)?))
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

impl fmt::Debug for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.index())
    }
}

impl fmt::Debug for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArrayId({})", self.index())
    }
}

/// How a table came to exist, which governs what may later extend it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum TableState {
    /// Created as an intermediate step of a longer header path; a later
    /// `[name]` header may still claim it.
    Implicit,
    /// Defined by its own `[name]` header (or as an array-of-tables
    /// element).
    Header,
    /// Created by a dotted key; only further dotted keys from the same
    /// context may extend it.
    Dotted,
    /// An inline table; closed to all later extension.
    Inline,
}

/// Homogeneity of an array's elements.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ArrayKind {
    /// No elements.
    Empty,
    /// Every element has the same kind.
    Uniform(ValueKind),
    /// At least two elements of different kinds.
    Mixed,
}

/// A key-value pair stored in a table.
#[derive(Clone, Debug)]
pub(crate) struct Entry<'de> {
    pub(crate) key: Key<'de>,
    pub(crate) value: Value<'de>,
}

#[derive(Debug)]
pub(crate) struct TableRepr {
    /// Index of this table's region in the entry slab.
    pub(crate) start: u32,
    pub(crate) len: u16,
    pub(crate) cap: u16,
    pub(crate) state: TableState,
    /// Span of the header or key that defined the table; used in duplicate
    /// definition errors.
    pub(crate) span: Span,
}

#[derive(Debug)]
pub(crate) struct ArrayRepr {
    /// Index of this array's region in the element slab.
    pub(crate) start: u32,
    pub(crate) len: u16,
    pub(crate) cap: u16,
    pub(crate) kind: ArrayKind,
    /// Set for arrays built from `[[name]]` headers; such arrays may be
    /// extended by further headers but never by value assignment.
    pub(crate) aot: bool,
}

/// A parsed TOML document.
///
/// Produced by [`parse`](crate::parse); the `'de` lifetime borrows the input
/// text. All storage is allocated to its exact final size before values are
/// decoded, and nothing is reallocated afterwards.
pub struct Tree<'de> {
    entries: Vec<Entry<'de>>,
    elems: Vec<Value<'de>>,
    tables: Vec<TableRepr>,
    arrays: Vec<ArrayRepr>,
}

fn placeholder<'de>() -> Value<'de> {
    Value::Boolean(false)
}

impl<'de> Tree<'de> {
    pub(crate) fn with_root(root_cap: u16) -> Tree<'de> {
        let mut tree = Tree {
            entries: Vec::new(),
            elems: Vec::new(),
            tables: Vec::new(),
            arrays: Vec::new(),
        };
        // The root always has index 0; with_root is the only caller that can
        // see an empty table list, so this cannot fail.
        let _ = tree.new_table(root_cap, TableState::Header, Span::default());
        tree
    }

    pub(crate) fn root_id(&self) -> TableId {
        TableId(NonZeroU16::MIN)
    }

    /// Allocates a table with room for exactly `cap` entries. `None` means
    /// the handle space is exhausted.
    pub(crate) fn new_table(
        &mut self,
        cap: u16,
        state: TableState,
        span: Span,
    ) -> Option<TableId> {
        let id = TableId::from_index(self.tables.len())?;
        let start = u32::try_from(self.entries.len()).ok()?;
        self.entries.resize(
            self.entries.len() + cap as usize,
            Entry {
                key: Key {
                    name: Cow::Borrowed(""),
                    span: Span::default(),
                },
                value: placeholder(),
            },
        );
        self.tables.push(TableRepr {
            start,
            len: 0,
            cap,
            state,
            span,
        });
        Some(id)
    }

    /// Allocates an array with room for exactly `cap` elements.
    pub(crate) fn new_array(&mut self, cap: u16, aot: bool) -> Option<ArrayId> {
        let id = ArrayId::from_index(self.arrays.len())?;
        let start = u32::try_from(self.elems.len()).ok()?;
        self.elems.resize(self.elems.len() + cap as usize, placeholder());
        self.arrays.push(ArrayRepr {
            start,
            len: 0,
            cap,
            kind: ArrayKind::Empty,
            aot,
        });
        Some(id)
    }

    pub(crate) fn table_repr(&self, id: TableId) -> &TableRepr {
        &self.tables[id.index()]
    }

    pub(crate) fn table_repr_mut(&mut self, id: TableId) -> &mut TableRepr {
        &mut self.tables[id.index()]
    }

    pub(crate) fn array_repr(&self, id: ArrayId) -> &ArrayRepr {
        &self.arrays[id.index()]
    }

    fn table_entries(&self, id: TableId) -> &[Entry<'de>] {
        let repr = self.table_repr(id);
        let start = repr.start as usize;
        &self.entries[start..start + repr.len as usize]
    }

    /// Writes the next entry of `id` into its reserved region. The counting
    /// pass guarantees the region is large enough; a full table here is a
    /// bug, reported as exhausted capacity rather than a panic.
    pub(crate) fn table_insert(&mut self, id: TableId, key: Key<'de>, value: Value<'de>) -> bool {
        let repr = &mut self.tables[id.index()];
        debug_assert!(repr.len < repr.cap);
        if repr.len >= repr.cap {
            return false;
        }
        let slot = repr.start as usize + repr.len as usize;
        repr.len += 1;
        self.entries[slot] = Entry { key, value };
        true
    }

    /// Finds an entry by key name. Tables are small in practice, so lookup
    /// is a linear scan of the region.
    pub(crate) fn table_find(&self, id: TableId, name: &str) -> Option<&Entry<'de>> {
        self.table_entries(id).iter().find(|e| e.key.name == name)
    }

    /// Writes the next element of `id` into its reserved region, folding the
    /// element's kind into the array's homogeneity tag.
    pub(crate) fn array_push(&mut self, id: ArrayId, value: Value<'de>) -> bool {
        let kind = value.kind();
        let repr = &mut self.arrays[id.index()];
        debug_assert!(repr.len < repr.cap);
        if repr.len >= repr.cap {
            return false;
        }
        let slot = repr.start as usize + repr.len as usize;
        repr.len += 1;
        repr.kind = match repr.kind {
            ArrayKind::Empty => ArrayKind::Uniform(kind),
            ArrayKind::Uniform(k) if k == kind => ArrayKind::Uniform(k),
            _ => ArrayKind::Mixed,
        };
        self.elems[slot] = value;
        true
    }

    /// The last element of an array-of-tables, as a table handle.
    pub(crate) fn aot_last(&self, id: ArrayId) -> Option<TableId> {
        let repr = self.array_repr(id);
        if repr.len == 0 {
            return None;
        }
        let slot = repr.start as usize + repr.len as usize - 1;
        self.elems[slot].as_table()
    }

    /// Checks that every reserved region was filled to exactly its
    /// capacity, i.e. the counting pass neither under- nor over-counted.
    #[cfg(test)]
    pub(crate) fn assert_exactly_filled(&self) {
        for (i, t) in self.tables.iter().enumerate() {
            assert_eq!(t.len, t.cap, "table {i} not filled to capacity");
        }
        for (i, a) in self.arrays.iter().enumerate() {
            assert_eq!(a.len, a.cap, "array {i} not filled to capacity");
        }
    }

    /// The document's top-level table.
    pub fn root(&self) -> TableRef<'_, 'de> {
        self.table(self.root_id())
    }

    /// Borrows the table behind a handle.
    pub fn table(&self, id: TableId) -> TableRef<'_, 'de> {
        TableRef { tree: self, id }
    }

    /// Borrows the array behind a handle.
    pub fn array(&self, id: ArrayId) -> ArrayRef<'_, 'de> {
        ArrayRef { tree: self, id }
    }
}

impl fmt::Debug for Tree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.root(), f)
    }
}

/// Borrowed view of a table in a [`Tree`].
#[derive(Copy, Clone)]
pub struct TableRef<'t, 'de> {
    tree: &'t Tree<'de>,
    id: TableId,
}

impl<'t, 'de> TableRef<'t, 'de> {
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Number of entries directly in this table.
    pub fn len(&self) -> usize {
        self.tree.table_repr(self.id).len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Span of the header or key that defined this table. Empty for the root
    /// table.
    pub fn span(&self) -> Span {
        self.tree.table_repr(self.id).span
    }

    /// Looks up an entry by key name.
    pub fn get(&self, name: &str) -> Option<&'t Value<'de>> {
        self.tree.table_find(self.id, name).map(|e| &e.value)
    }

    /// Looks up a nested table by key name.
    pub fn get_table(&self, name: &str) -> Option<TableRef<'t, 'de>> {
        self.get(name)?.as_table().map(|id| self.tree.table(id))
    }

    /// Looks up a nested array by key name.
    pub fn get_array(&self, name: &str) -> Option<ArrayRef<'t, 'de>> {
        self.get(name)?.as_array().map(|id| self.tree.array(id))
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'t Key<'de>, &'t Value<'de>)> + use<'t, 'de> {
        self.tree
            .table_entries(self.id)
            .iter()
            .map(|e| (&e.key, &e.value))
    }
}

impl fmt::Debug for TableRef<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            match value {
                Value::Table(id) => map.entry(&key.name, &self.tree.table(*id)),
                Value::Array(id) => map.entry(&key.name, &self.tree.array(*id)),
                other => map.entry(&key.name, other),
            };
        }
        map.finish()
    }
}

/// Borrowed view of an array in a [`Tree`].
#[derive(Copy, Clone)]
pub struct ArrayRef<'t, 'de> {
    tree: &'t Tree<'de>,
    id: ArrayId,
}

impl<'t, 'de> ArrayRef<'t, 'de> {
    pub fn id(&self) -> ArrayId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.tree.array_repr(self.id).len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Homogeneity of the elements, maintained as elements were appended.
    pub fn kind(&self) -> ArrayKind {
        self.tree.array_repr(self.id).kind
    }

    pub fn get(&self, index: usize) -> Option<&'t Value<'de>> {
        if index >= self.len() {
            return None;
        }
        let start = self.tree.array_repr(self.id).start as usize;
        Some(&self.tree.elems[start + index])
    }

    /// Iterates elements in document order.
    pub fn iter(&self) -> impl Iterator<Item = &'t Value<'de>> + use<'t, 'de> {
        let repr = self.tree.array_repr(self.id);
        let start = repr.start as usize;
        self.tree.elems[start..start + repr.len as usize].iter()
    }
}

impl fmt::Debug for ArrayRef<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for value in self.iter() {
            match value {
                Value::Table(id) => list.entry(&self.tree.table(*id)),
                Value::Array(id) => list.entry(&self.tree.array(*id)),
                other => list.entry(other),
            };
        }
        list.finish()
    }
}

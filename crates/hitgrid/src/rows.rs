use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::{ColumnId, EntityKind, RowId};

/// Static metadata declaring which typed comparator a column uses.
/// Owned by the row-source adapter, not by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub kind: EntityKind,
}

impl ColumnDescriptor {
    pub fn new(id: ColumnId, kind: EntityKind) -> Self {
        ColumnDescriptor { id, kind }
    }
}

/// Read-only access to the unfiltered, unsorted row collection.
///
/// Implemented by the results-model adapter on the viewer side; the engine
/// only ever reads through this surface. Cells are textual; the engine parses
/// them according to the declared column kind.
pub trait RowSource {
    /// Number of rows in the underlying dataset.
    fn row_count(&self) -> usize;

    /// Textual form of one cell, or `None` when the cell is absent.
    fn cell(&self, id: RowId, column: ColumnId) -> Option<Cow<'_, str>>;

    /// Declared kind of a column. Undeclared columns sort as text.
    fn column_kind(&self, column: ColumnId) -> EntityKind;
}

/// Owned in-memory row source.
///
/// Used by the CLI, tests and benches; a production viewer adapts its own
/// results model instead.
#[derive(Debug, Default, Clone)]
pub struct MemRows {
    kinds: HashMap<ColumnId, EntityKind>,
    rows: Vec<Vec<Option<String>>>,
}

impl MemRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, desc: ColumnDescriptor) {
        self.kinds.insert(desc.id, desc.kind);
    }

    pub fn declare_column(&mut self, column: ColumnId, kind: EntityKind) {
        self.declare(ColumnDescriptor::new(column, kind));
    }

    /// Append one row; cell position is the column id.
    pub fn push_row(&mut self, cells: Vec<Option<String>>) {
        self.rows.push(cells);
    }
}

impl RowSource for MemRows {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, id: RowId, column: ColumnId) -> Option<Cow<'_, str>> {
        self.rows
            .get(id as usize)
            .and_then(|row| row.get(column as usize))
            .and_then(|cell| cell.as_deref())
            .map(Cow::Borrowed)
    }

    fn column_kind(&self, column: ColumnId) -> EntityKind {
        self.kinds.get(&column).copied().unwrap_or(EntityKind::Text)
    }
}

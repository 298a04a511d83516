use std::{borrow::Cow, sync::Arc};

use crate::{
    cache::SortCacheStore,
    entity::{ColumnId, RowId},
    error::Result,
    rows::RowSource,
    sort::{SortBag, SortEngine},
    translate::IndexTranslator,
    view::ViewBinIndex,
};

/// Row-id predicate deciding membership in the active view.
pub type Predicate = dyn Fn(RowId) -> bool + Send + Sync;

struct ActiveSort {
    ascending: bool,
    bag: Arc<SortBag>,
}

/// The facade the table/grid layer talks to.
///
/// Composes the row source, the cached sort engine, the view binner and the
/// index translator. Every sort or filter change re-derives the visible
/// index wholesale; the previous derivation is dropped, never patched.
pub struct TableView<S: RowSource, C: SortCacheStore> {
    source: S,
    engine: SortEngine<C>,
    sort: Option<ActiveSort>,
    filter: Option<Box<Predicate>>,
    translator: IndexTranslator,
}

impl<S: RowSource, C: SortCacheStore> TableView<S, C> {
    pub fn new(source: S, engine: SortEngine<C>) -> Self {
        let translator = IndexTranslator::identity(source.row_count());
        TableView {
            source,
            engine,
            sort: None,
            filter: None,
            translator,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn engine(&self) -> &SortEngine<C> {
        &self.engine
    }

    /// Sort by `column`, reusing the cached order unless `force`.
    pub fn set_sort(&mut self, column: ColumnId, ascending: bool, force: bool) -> Result<()> {
        let bag = self.engine.sort(&self.source, column, force)?;
        self.sort = Some(ActiveSort {
            ascending,
            bag: Arc::new(bag),
        });
        self.rebuild();
        Ok(())
    }

    /// Adopt a sort bag computed elsewhere (the background worker).
    pub fn install_sort(&mut self, bag: SortBag, ascending: bool) {
        self.sort = Some(ActiveSort {
            ascending,
            bag: Arc::new(bag),
        });
        self.rebuild();
    }

    /// Back to natural row order.
    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.rebuild();
    }

    /// Replace the active view predicate; `None` shows every row.
    pub fn set_filter(&mut self, predicate: Option<Box<Predicate>>) {
        self.filter = predicate;
        self.rebuild();
    }

    /// Currently active sort as `(column, ascending)`.
    pub fn active_sort(&self) -> Option<(ColumnId, bool)> {
        self.sort.as_ref().map(|s| (s.bag.column, s.ascending))
    }

    /// Number of visible rows after the active filter.
    pub fn row_count(&self) -> usize {
        self.translator.visible_rows()
    }

    /// Cell text at a visible position, routed through the translator and
    /// the row source. `None` when the position is out of range or the cell
    /// is absent.
    pub fn value_at(&self, filtered_pos: usize, column: ColumnId) -> Option<Cow<'_, str>> {
        let id = self.translator.to_underlying(filtered_pos)?;
        self.source.cell(id, column)
    }

    pub fn to_underlying(&self, filtered_pos: usize) -> Option<RowId> {
        self.translator.to_underlying(filtered_pos)
    }

    pub fn to_filtered(&self, row_id: RowId) -> Option<usize> {
        self.translator.to_filtered(row_id)
    }

    fn rebuild(&mut self) {
        if self.sort.is_none() && self.filter.is_none() {
            self.translator = IndexTranslator::identity(self.source.row_count());
            return;
        }

        let accept = |id: RowId| self.filter.as_ref().is_none_or(|f| f(id));
        let view = match &self.sort {
            Some(active) if active.ascending => ViewBinIndex::bin(active.bag.row_ids(), accept),
            Some(active) => ViewBinIndex::bin(active.bag.row_ids_desc(), accept),
            None => ViewBinIndex::bin(0..self.source.row_count() as RowId, accept),
        };
        self.translator = IndexTranslator::binned(Arc::new(view));
    }
}

use std::sync::Arc;

use crate::{entity::RowId, view::ViewBinIndex};

/// Bidirectional mapping between on-screen (filtered) positions and stable
/// row ids.
///
/// Exists so UI selection state survives independent changes to the sort
/// order and to the active row filter. With neither active it degenerates to
/// the identity mapping over the unfiltered row count.
#[derive(Debug, Clone)]
pub struct IndexTranslator {
    mode: Mode,
}

#[derive(Debug, Clone)]
enum Mode {
    Identity { rows: usize },
    Binned(Arc<ViewBinIndex>),
}

impl IndexTranslator {
    pub fn identity(rows: usize) -> Self {
        IndexTranslator {
            mode: Mode::Identity { rows },
        }
    }

    pub fn binned(view: Arc<ViewBinIndex>) -> Self {
        IndexTranslator {
            mode: Mode::Binned(view),
        }
    }

    /// Number of visible (post-filter) rows.
    pub fn visible_rows(&self) -> usize {
        match &self.mode {
            Mode::Identity { rows } => *rows,
            Mode::Binned(view) => view.len(),
        }
    }

    /// Filtered position to underlying row id. `None` past the end.
    pub fn to_underlying(&self, filtered_pos: usize) -> Option<RowId> {
        match &self.mode {
            Mode::Identity { rows } => (filtered_pos < *rows).then_some(filtered_pos as RowId),
            Mode::Binned(view) => view.id_at(filtered_pos),
        }
    }

    /// Underlying row id to filtered position. `None` if the row was
    /// filtered out or is unknown.
    pub fn to_filtered(&self, row_id: RowId) -> Option<usize> {
        match &self.mode {
            Mode::Identity { rows } => ((row_id as usize) < *rows).then_some(row_id as usize),
            Mode::Binned(view) => view.position(row_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips_in_range_and_rejects_out_of_range() {
        let t = IndexTranslator::identity(3);
        assert_eq!(t.visible_rows(), 3);
        assert_eq!(t.to_underlying(2), Some(2));
        assert_eq!(t.to_underlying(3), None);
        assert_eq!(t.to_filtered(0), Some(0));
        assert_eq!(t.to_filtered(99), None);
    }

    #[test]
    fn binned_round_trip_law() {
        let view = Arc::new(ViewBinIndex::bin([5u64, 1, 8, 2], |id| id != 2));
        let t = IndexTranslator::binned(Arc::clone(&view));

        assert_eq!(t.visible_rows(), 3);
        for id in view.ids().to_vec() {
            let pos = t.to_filtered(id).expect("kept id translates");
            assert_eq!(t.to_underlying(pos), Some(id));
        }
        // Filtered-out and unknown ids answer None in both directions.
        assert_eq!(t.to_filtered(2), None);
        assert_eq!(t.to_filtered(77), None);
        assert_eq!(t.to_underlying(3), None);
    }

    #[test]
    fn empty_view_answers_none_everywhere() {
        let t = IndexTranslator::binned(Arc::new(ViewBinIndex::bin(0..4u64, |_| false)));
        assert_eq!(t.visible_rows(), 0);
        assert_eq!(t.to_underlying(0), None);
        assert_eq!(t.to_filtered(0), None);
    }
}

use std::{collections::HashMap, sync::OnceLock};

use crate::entity::RowId;

/// Compacted list of row ids surviving a view predicate, in the order they
/// were encountered while walking either the natural row sequence or a sort
/// bag's resolved order.
///
/// Values are immutable; a filter or sort change produces a whole new index
/// rather than patching this one. The reverse map is derived on first
/// reverse lookup and lives exactly as long as the value itself.
#[derive(Debug, Default)]
pub struct ViewBinIndex {
    ids: Vec<RowId>,
    reverse: OnceLock<HashMap<RowId, usize>>,
}

impl ViewBinIndex {
    /// Walk `order` once, keeping ids the predicate accepts.
    pub fn bin<I, P>(order: I, mut predicate: P) -> Self
    where
        I: IntoIterator<Item = RowId>,
        P: FnMut(RowId) -> bool,
    {
        let ids = order.into_iter().filter(|id| predicate(*id)).collect();
        ViewBinIndex {
            ids,
            reverse: OnceLock::new(),
        }
    }

    /// Index over `order` with no predicate applied.
    pub fn unfiltered<I>(order: I) -> Self
    where
        I: IntoIterator<Item = RowId>,
    {
        Self::bin(order, |_| true)
    }

    pub fn ids(&self) -> &[RowId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Row id at one filtered position, or `None` past the end.
    pub fn id_at(&self, pos: usize) -> Option<RowId> {
        self.ids.get(pos).copied()
    }

    /// Filtered position of a row id, or `None` if it was filtered out or
    /// never existed.
    pub fn position(&self, id: RowId) -> Option<usize> {
        let reverse = self.reverse.get_or_init(|| {
            self.ids
                .iter()
                .enumerate()
                .map(|(pos, id)| (*id, pos))
                .collect()
        });
        reverse.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_true_predicate_keeps_natural_order() {
        let view = ViewBinIndex::bin(0..5u64, |_| true);
        assert_eq!(view.ids(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn predicate_compacts_and_preserves_relative_order() {
        let view = ViewBinIndex::bin([4u64, 2, 0, 3, 1], |id| id != 0);
        assert_eq!(view.ids(), &[4, 2, 3, 1]);
        assert_eq!(view.id_at(0), Some(4));
        assert_eq!(view.position(3), Some(2));
    }

    #[test]
    fn all_rejected_is_empty_not_a_panic() {
        let view = ViewBinIndex::bin(0..10u64, |_| false);
        assert!(view.is_empty());
        assert_eq!(view.id_at(0), None);
        assert_eq!(view.position(0), None);
    }

    #[test]
    fn empty_order_is_empty() {
        let view = ViewBinIndex::bin(std::iter::empty::<RowId>(), |_| true);
        assert!(view.is_empty());
    }

    #[test]
    fn reverse_lookup_round_trips_every_kept_id() {
        let view = ViewBinIndex::bin([7u64, 3, 9, 1], |id| id > 2);
        for id in view.ids().to_vec() {
            let pos = view.position(id).expect("kept id has a position");
            assert_eq!(view.id_at(pos), Some(id));
        }
        assert_eq!(view.position(1), None);
    }
}

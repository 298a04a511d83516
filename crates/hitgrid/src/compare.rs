use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::entity::{ColumnId, EntityKind, compare_float};

/// One full hit row as held by the in-memory hit collections.
///
/// Optional fields are metadata the search backend may not have produced
/// (taxonomy annotation, organism names, run dates); comparisons treat a
/// missing side as a tie instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub query_id: String,
    pub query_definition: String,
    pub query_length: i64,
    pub hit_rank: i64,
    pub hit_id: String,
    pub hit_accession: String,
    pub hit_definition: String,
    pub hit_length: i64,
    pub hsp_count: i64,
    pub bit_score: f64,
    pub total_bit_score: f64,
    pub raw_score: i64,
    pub evalue: f64,
    pub identity_pct: f64,
    pub positive_pct: f64,
    pub gap_pct: f64,
    pub aligned_length: i64,
    pub mismatches: i64,
    pub gap_opens: i64,
    pub query_coverage: f64,
    pub hit_coverage: f64,
    pub query_start: i64,
    pub query_end: i64,
    pub hit_start: i64,
    pub hit_end: i64,
    pub query_frame: i64,
    pub hit_frame: i64,
    pub taxonomy_id: Option<i64>,
    pub organism: Option<String>,
    pub lineage: Option<String>,
    pub search_date: Option<NaiveDateTime>,
    pub database_name: Option<String>,
}

/// Which comparison rule orders two hit rows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
)]
#[strum(ascii_case_insensitive)]
pub enum SortKey {
    QueryId,
    QueryDefinition,
    QueryLength,
    HitRank,
    HitId,
    HitAccession,
    HitDefinition,
    HitLength,
    HspCount,
    BitScore,
    TotalBitScore,
    RawScore,
    Evalue,
    IdentityPct,
    PositivePct,
    GapPct,
    AlignedLength,
    Mismatches,
    GapOpens,
    QueryCoverage,
    HitCoverage,
    QueryStart,
    QueryEnd,
    HitStart,
    HitEnd,
    QueryFrame,
    HitFrame,
    TaxonomyId,
    Organism,
    Lineage,
    SearchDate,
    DatabaseName,
}

/// Declarative column table: the column id of a key is its position here.
/// Adding a column means appending a variant and a row, nothing else.
pub const COLUMN_KEYS: &[SortKey] = &[
    SortKey::QueryId,
    SortKey::QueryDefinition,
    SortKey::QueryLength,
    SortKey::HitRank,
    SortKey::HitId,
    SortKey::HitAccession,
    SortKey::HitDefinition,
    SortKey::HitLength,
    SortKey::HspCount,
    SortKey::BitScore,
    SortKey::TotalBitScore,
    SortKey::RawScore,
    SortKey::Evalue,
    SortKey::IdentityPct,
    SortKey::PositivePct,
    SortKey::GapPct,
    SortKey::AlignedLength,
    SortKey::Mismatches,
    SortKey::GapOpens,
    SortKey::QueryCoverage,
    SortKey::HitCoverage,
    SortKey::QueryStart,
    SortKey::QueryEnd,
    SortKey::HitStart,
    SortKey::HitEnd,
    SortKey::QueryFrame,
    SortKey::HitFrame,
    SortKey::TaxonomyId,
    SortKey::Organism,
    SortKey::Lineage,
    SortKey::SearchDate,
    SortKey::DatabaseName,
];

impl SortKey {
    /// Key for a column id, `None` for ids outside the declared set.
    pub fn from_column(column: ColumnId) -> Option<SortKey> {
        COLUMN_KEYS.get(column as usize).copied()
    }

    /// Which typed comparator this key's column uses when it goes through
    /// the entity-based sort engine.
    pub fn entity_kind(self) -> EntityKind {
        use SortKey::*;
        match self {
            QueryId | QueryDefinition | HitId | HitAccession | HitDefinition | Organism
            | Lineage | SearchDate | DatabaseName => EntityKind::Text,
            BitScore | TotalBitScore | Evalue | IdentityPct | PositivePct | GapPct
            | QueryCoverage | HitCoverage => EntityKind::Float,
            QueryLength | HitRank | HitLength | HspCount | RawScore | AlignedLength
            | Mismatches | GapOpens | QueryStart | QueryEnd | HitStart | HitEnd | QueryFrame
            | HitFrame | TaxonomyId => EntityKind::Integer,
        }
    }
}

/// Total order over two hit rows for one key, with the direction toggle
/// applied by reversing the raw result. Ties stay `Equal` either way.
pub fn compare(a: &HitRecord, b: &HitRecord, key: SortKey, ascending: bool) -> Ordering {
    let ord = compare_asc(a, b, key);
    if ascending { ord } else { ord.reverse() }
}

/// Like [`compare`], addressed by column id. Unknown ids compare `Equal`
/// so the surrounding sort keeps a valid total order.
pub fn compare_by_column(
    a: &HitRecord,
    b: &HitRecord,
    column: ColumnId,
    ascending: bool,
) -> Ordering {
    match SortKey::from_column(column) {
        Some(key) => compare(a, b, key, ascending),
        None => Ordering::Equal,
    }
}

fn compare_asc(a: &HitRecord, b: &HitRecord, key: SortKey) -> Ordering {
    use SortKey::*;
    match key {
        QueryId => a.query_id.cmp(&b.query_id),
        QueryDefinition => a.query_definition.cmp(&b.query_definition),
        QueryLength => a.query_length.cmp(&b.query_length),
        HitRank => a.hit_rank.cmp(&b.hit_rank),
        HitId => a.hit_id.cmp(&b.hit_id),
        HitAccession => a.hit_accession.cmp(&b.hit_accession),
        HitDefinition => a.hit_definition.cmp(&b.hit_definition),
        HitLength => a.hit_length.cmp(&b.hit_length),
        HspCount => a.hsp_count.cmp(&b.hsp_count),
        BitScore => compare_float(a.bit_score, b.bit_score),
        TotalBitScore => compare_float(a.total_bit_score, b.total_bit_score),
        RawScore => a.raw_score.cmp(&b.raw_score),
        Evalue => compare_float(a.evalue, b.evalue),
        IdentityPct => compare_float(a.identity_pct, b.identity_pct),
        PositivePct => compare_float(a.positive_pct, b.positive_pct),
        GapPct => compare_float(a.gap_pct, b.gap_pct),
        AlignedLength => a.aligned_length.cmp(&b.aligned_length),
        Mismatches => a.mismatches.cmp(&b.mismatches),
        GapOpens => a.gap_opens.cmp(&b.gap_opens),
        QueryCoverage => compare_float(a.query_coverage, b.query_coverage),
        HitCoverage => compare_float(a.hit_coverage, b.hit_coverage),
        QueryStart => a.query_start.cmp(&b.query_start),
        QueryEnd => a.query_end.cmp(&b.query_end),
        HitStart => a.hit_start.cmp(&b.hit_start),
        HitEnd => a.hit_end.cmp(&b.hit_end),
        QueryFrame => a.query_frame.cmp(&b.query_frame),
        HitFrame => a.hit_frame.cmp(&b.hit_frame),
        TaxonomyId => cmp_opt(a.taxonomy_id, b.taxonomy_id),
        Organism => cmp_opt_ref(a.organism.as_deref(), b.organism.as_deref()),
        Lineage => cmp_opt_ref(a.lineage.as_deref(), b.lineage.as_deref()),
        SearchDate => cmp_opt(a.search_date, b.search_date),
        DatabaseName => cmp_opt_ref(a.database_name.as_deref(), b.database_name.as_deref()),
    }
}

/// A missing value on either side is a tie, not an error.
#[inline]
fn cmp_opt<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => Ordering::Equal,
    }
}

#[inline]
fn cmp_opt_ref<T: Ord + ?Sized>(a: Option<&T>, b: Option<&T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn hit(bit_score: f64, evalue: f64, accession: &str) -> HitRecord {
        HitRecord {
            hit_accession: accession.to_string(),
            bit_score,
            evalue,
            ..HitRecord::default()
        }
    }

    #[test]
    fn every_key_has_a_column_and_a_kind() {
        assert_eq!(COLUMN_KEYS.len(), SortKey::iter().count());
        for (column, key) in COLUMN_KEYS.iter().enumerate() {
            assert_eq!(SortKey::from_column(column as ColumnId), Some(*key));
            // entity_kind is total over the key set.
            let _ = key.entity_kind();
        }
        assert_eq!(SortKey::from_column(COLUMN_KEYS.len() as ColumnId), None);
    }

    #[test]
    fn key_names_parse_case_insensitively() {
        assert_eq!(SortKey::from_str("bitscore").unwrap(), SortKey::BitScore);
        assert_eq!(SortKey::from_str("EVALUE").unwrap(), SortKey::Evalue);
        assert!(SortKey::from_str("nonsense").is_err());
    }

    #[test]
    fn direction_symmetry_is_exact_mirror_except_ties() {
        let a = hit(120.5, 1e-30, "NP_1");
        let b = hit(98.0, 1e-12, "NP_2");
        let c = hit(120.5, 1e-30, "NP_1");

        for key in SortKey::iter() {
            let up = compare(&a, &b, key, true);
            let down = compare(&a, &b, key, false);
            assert_eq!(up, down.reverse(), "key {key} is not mirrored");

            // Ties stay ties in both directions.
            assert_eq!(compare(&a, &c, key, true), Ordering::Equal);
            assert_eq!(compare(&a, &c, key, false), Ordering::Equal);
        }
    }

    #[test]
    fn missing_metadata_is_a_tie() {
        let mut a = HitRecord::default();
        let mut b = HitRecord::default();
        a.organism = Some("Escherichia coli".to_string());
        b.organism = None;

        assert_eq!(compare(&a, &b, SortKey::Organism, true), Ordering::Equal);
        assert_eq!(compare(&a, &b, SortKey::Organism, false), Ordering::Equal);

        b.organism = Some("Homo sapiens".to_string());
        assert_eq!(compare(&a, &b, SortKey::Organism, true), Ordering::Less);

        a.taxonomy_id = Some(562);
        b.taxonomy_id = None;
        assert_eq!(compare(&a, &b, SortKey::TaxonomyId, true), Ordering::Equal);
    }

    #[test]
    fn unknown_column_compares_equal() {
        let a = hit(1.0, 1.0, "x");
        let b = hit(2.0, 2.0, "y");
        assert_eq!(compare_by_column(&a, &b, 9999, true), Ordering::Equal);
        assert_eq!(compare_by_column(&a, &b, 9999, false), Ordering::Equal);
    }

    #[test]
    fn evalue_orders_ieee_ascending() {
        let strong = hit(200.0, 1e-100, "a");
        let weak = hit(40.0, 0.5, "b");
        assert_eq!(compare(&strong, &weak, SortKey::Evalue, true), Ordering::Less);
        assert_eq!(
            compare(&strong, &weak, SortKey::BitScore, false),
            Ordering::Less
        );
    }

    #[test]
    fn sorting_a_collection_descending_by_bit_score() {
        let mut hits = vec![hit(50.0, 1e-5, "c"), hit(200.0, 1e-80, "a"), hit(90.0, 1e-20, "b")];
        hits.sort_by(|x, y| compare(x, y, SortKey::BitScore, false));
        let order: Vec<&str> = hits.iter().map(|h| h.hit_accession.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}

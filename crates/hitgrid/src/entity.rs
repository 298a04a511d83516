use std::cmp;

use serde::{Deserialize, Serialize};
use simdutf8::basic::from_utf8;
use strum_macros::EnumString;

/// Stable identifier of a row in the unfiltered, unsorted underlying dataset.
pub type RowId = u64;

/// Identifier of a sortable column as declared by the row-source adapter.
pub type ColumnId = u32;

/// Fallback value substituted when an integer cell cannot be parsed.
pub const INT_SENTINEL: i64 = -1;

/// Fallback value substituted when a float cell cannot be parsed.
pub const FLOAT_SENTINEL: f64 = -1.0;

/// Which typed comparator a column uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum EntityKind {
    Integer,
    Float,
    Text,
}

/// A typed cell value extracted from a row for one column.
///
/// Numeric variants carry the sentinel (`-1` / `-1.0`) when the cell text did
/// not parse. A literal `-1` cell is indistinguishable from an unparsable one
/// after extraction; that ambiguity is accepted so that placeholder cells
/// still sort deterministically to the low end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl EntityValue {
    /// Parse the textual form of a cell according to the column's declared kind.
    ///
    /// `None` (absent cell) maps to the sentinel for numeric kinds and to the
    /// empty string for text. A single comma decimal separator is normalized
    /// to a period before float parsing.
    pub fn parse(kind: EntityKind, raw: Option<&str>) -> EntityValue {
        match kind {
            EntityKind::Integer => EntityValue::Integer(parse_int(raw.unwrap_or(""))),
            EntityKind::Float => EntityValue::Float(parse_float(raw.unwrap_or(""))),
            EntityKind::Text => EntityValue::Text(raw.unwrap_or("").to_string()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityValue::Integer(_) => EntityKind::Integer,
            EntityValue::Float(_) => EntityKind::Float,
            EntityValue::Text(_) => EntityKind::Text,
        }
    }

    /// Total ascending order for values of the same kind.
    ///
    /// Mixed-kind pairs cannot occur in a sort bag (one column, one declared
    /// kind); they fall back to comparing the kind tag so the order stays
    /// total anyway.
    pub fn cmp_typed(&self, other: &EntityValue) -> cmp::Ordering {
        match (self, other) {
            (EntityValue::Integer(a), EntityValue::Integer(b)) => a.cmp(b),
            (EntityValue::Float(a), EntityValue::Float(b)) => compare_float(*a, *b),
            (EntityValue::Text(a), EntityValue::Text(b)) => a.cmp(b),
            (a, b) => (a.kind() as u8).cmp(&(b.kind() as u8)),
        }
    }
}

/// One sortable value: stable row id plus the typed payload for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: RowId,
    pub value: EntityValue,
}

impl Entity {
    pub fn new(id: RowId, value: EntityValue) -> Self {
        Entity { id, value }
    }
}

#[inline]
fn parse_int(raw: &str) -> i64 {
    atoi_simd::parse::<i64>(raw.trim().as_bytes()).unwrap_or(INT_SENTINEL)
}

#[inline]
fn parse_float(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FLOAT_SENTINEL;
    }
    // Locale-tolerant: a comma decimal separator is normalized before parsing.
    if trimmed.as_bytes().contains(&b',') {
        let normalized = trimmed.replace(',', ".");
        return fast_float2::parse::<f64, _>(normalized.as_str()).unwrap_or(FLOAT_SENTINEL);
    }
    fast_float2::parse::<f64, _>(trimmed).unwrap_or(FLOAT_SENTINEL)
}

/// Float ordering with NaN pinned to the low end so the sort stays total.
#[inline]
pub(crate) fn compare_float(f1: f64, f2: f64) -> cmp::Ordering {
    match (f1.is_nan(), f2.is_nan()) {
        (true, true) => cmp::Ordering::Equal,
        (true, false) => cmp::Ordering::Less,
        (false, true) => cmp::Ordering::Greater,
        (false, false) => f1.partial_cmp(&f2).unwrap_or(cmp::Ordering::Equal),
    }
}

/// Parse a raw byte cell into its UTF-8 textual form, if valid.
#[inline]
pub fn cell_text(bytes: &[u8]) -> Option<&str> {
    from_utf8(bytes).ok()
}

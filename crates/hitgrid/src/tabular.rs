use std::path::Path;

use itertools::Itertools;

use crate::{
    entity::{ColumnId, EntityKind, cell_text},
    error::Result,
    rows::{ColumnDescriptor, MemRows},
};

/// Column layout of tab-separated search output (the 12 standard fields of
/// `outfmt 6` style reports), with the typed comparator each column uses.
pub const TABULAR_COLUMNS: &[(&str, EntityKind)] = &[
    ("qseqid", EntityKind::Text),
    ("sseqid", EntityKind::Text),
    ("pident", EntityKind::Float),
    ("length", EntityKind::Integer),
    ("mismatch", EntityKind::Integer),
    ("gapopen", EntityKind::Integer),
    ("qstart", EntityKind::Integer),
    ("qend", EntityKind::Integer),
    ("sstart", EntityKind::Integer),
    ("send", EntityKind::Integer),
    ("evalue", EntityKind::Float),
    ("bitscore", EntityKind::Float),
];

/// Column id for a field name, case-insensitive.
pub fn column_named(name: &str) -> Option<ColumnId> {
    TABULAR_COLUMNS
        .iter()
        .position(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|i| i as ColumnId)
}

/// Load a tab-separated result file into an in-memory row source with the
/// standard column kinds declared. `#`-prefixed comment lines are skipped;
/// short rows are allowed (missing cells stay absent).
pub fn load_tabular<P: AsRef<Path>>(path: P) -> Result<MemRows> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_path(path.as_ref())?;

    let mut rows = MemRows::new();
    for (column, (_, kind)) in TABULAR_COLUMNS.iter().enumerate() {
        rows.declare(ColumnDescriptor::new(column as ColumnId, *kind));
    }
    for record in rdr.byte_records() {
        let record = record?;
        // Cells that are empty or not valid UTF-8 stay absent.
        let cells = record
            .iter()
            .map(|field| {
                cell_text(field)
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
            })
            .collect_vec();
        rows.push_row(cells);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::RowSource;
    use std::io::Write;

    #[test]
    fn column_lookup_is_case_insensitive() {
        assert_eq!(column_named("bitscore"), Some(11));
        assert_eq!(column_named("EVALUE"), Some(10));
        assert_eq!(column_named("qseqid"), Some(0));
        assert_eq!(column_named("nope"), None);
    }

    #[test]
    fn loads_rows_and_declares_kinds() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "# BLASTP 2.16.0")?;
        writeln!(
            file,
            "q1\tNP_414542.1\t98.53\t204\t3\t0\t1\t204\t1\t204\t1e-140\t401"
        )?;
        writeln!(
            file,
            "q2\tYP_002791247.1\t45.10\t102\t55\t2\t10\t110\t5\t106\t2e-20\t88.6"
        )?;
        file.flush()?;

        let rows = load_tabular(file.path())?;
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.cell(0, 1).as_deref(), Some("NP_414542.1"));
        assert_eq!(rows.cell(1, 11).as_deref(), Some("88.6"));
        assert_eq!(rows.column_kind(10), EntityKind::Float);
        assert_eq!(rows.column_kind(3), EntityKind::Integer);
        Ok(())
    }

    #[test]
    fn short_rows_leave_cells_absent() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "q1\tNP_1")?;
        file.flush()?;

        let rows = load_tabular(file.path())?;
        assert_eq!(rows.row_count(), 1);
        assert_eq!(rows.cell(0, 0).as_deref(), Some("q1"));
        assert_eq!(rows.cell(0, 11), None);
        Ok(())
    }
}

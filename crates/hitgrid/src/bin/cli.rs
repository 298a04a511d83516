use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;
use itertools::Itertools;
use tracing_subscriber::EnvFilter;

use hitgrid::{
    EngineOptions, FsSortCache, MemorySortCache, RowSource, SortCacheStore, SortEngine, TableView,
    tabular::{TABULAR_COLUMNS, column_named, load_tabular},
};

/// Sort and filter a tab-separated search result file the way the viewer's
/// hit table would, printing one page of rows.
#[derive(Debug, Parser)]
#[command(name = "hitgrid-cli", version)]
struct Cli {
    /// Tab-separated result file (12-field outfmt 6 style).
    input: PathBuf,

    /// Column to sort by, e.g. bitscore, evalue, qseqid.
    #[arg(long, default_value = "bitscore")]
    sort: String,

    /// Sort descending instead of ascending.
    #[arg(long)]
    descending: bool,

    /// Keep only rows with bit score at or above this value.
    #[arg(long)]
    min_bitscore: Option<f64>,

    /// Keep only rows with e-value at or below this value.
    #[arg(long)]
    max_evalue: Option<f64>,

    /// Directory holding sort cache files; omit for in-memory only.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Recompute the sort even when a cache entry exists.
    #[arg(long)]
    force: bool,

    /// Rows to print.
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Emit rows as JSON instead of tab-separated text.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let rows = load_tabular(&cli.input)
        .with_context(|| format!("cannot load {}", cli.input.display()))?;
    let column = column_named(&cli.sort)
        .ok_or_else(|| anyhow!("unknown sort column '{}'", cli.sort))?;

    let prefix = cli
        .input
        .file_stem()
        .map(|s| format!("{}_", s.to_string_lossy()))
        .unwrap_or_else(|| "results_".to_string());

    let cache: Box<dyn SortCacheStore + Send + Sync> = match &cli.cache_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create cache dir {}", dir.display()))?;
            Box::new(FsSortCache::new(dir))
        },
        None => Box::new(MemorySortCache::new()),
    };
    let engine = SortEngine::new(cache, EngineOptions::builder().prefix(prefix).build());

    // Score predicates are evaluated against the raw cells once, up front;
    // the view then works on row ids only.
    let keep: Vec<bool> = (0..rows.row_count())
        .map(|id| {
            let id = id as u64;
            let bitscore_ok = cli.min_bitscore.is_none_or(|min| {
                rows.cell(id, 11)
                    .and_then(|c| c.parse::<f64>().ok())
                    .is_some_and(|v| v >= min)
            });
            let evalue_ok = cli.max_evalue.is_none_or(|max| {
                rows.cell(id, 10)
                    .and_then(|c| c.parse::<f64>().ok())
                    .is_some_and(|v| v <= max)
            });
            bitscore_ok && evalue_ok
        })
        .collect();

    let mut view = TableView::new(rows, engine);
    view.set_sort(column, !cli.descending, cli.force)?;
    if cli.min_bitscore.is_some() || cli.max_evalue.is_some() {
        view.set_filter(Some(Box::new(move |id| {
            keep.get(id as usize).copied().unwrap_or(false)
        })));
    }

    let shown = view.row_count().min(cli.limit);
    let columns = 0..TABULAR_COLUMNS.len() as u32;

    if cli.json {
        let page: Vec<serde_json::Value> = (0..shown)
            .map(|pos| {
                let cells: serde_json::Map<String, serde_json::Value> = TABULAR_COLUMNS
                    .iter()
                    .enumerate()
                    .map(|(c, (name, _))| {
                        let value = view
                            .value_at(pos, c as u32)
                            .map_or(serde_json::Value::Null, |v| {
                                serde_json::Value::String(v.into_owned())
                            });
                        ((*name).to_string(), value)
                    })
                    .collect();
                serde_json::json!({
                    "row": view.to_underlying(pos),
                    "cells": cells,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        println!("{}", TABULAR_COLUMNS.iter().map(|(name, _)| *name).join("\t"));
        for pos in 0..shown {
            let line = columns
                .clone()
                .map(|c| view.value_at(pos, c).unwrap_or_default())
                .join("\t");
            println!("{line}");
        }
        eprintln!("{} of {} rows shown", shown, view.row_count());
    }

    Ok(())
}

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering as AtomicOrdering},
    },
    time::Instant,
};

use bon::Builder;
use rayon::slice::ParallelSliceMut;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    cache::{CacheKey, SortCacheStore},
    entity::{ColumnId, Entity, EntityKind, EntityValue, RowId},
    error::{Error, Result},
    rows::RowSource,
};

/// Rows extracted per batch. Cancellation and progress are only observed at
/// batch boundaries, never mid-batch.
const EXTRACT_BATCH: usize = 4096;

/// The persisted/returned result of one sort operation.
///
/// `entities` is always stored in ascending order; a descending presentation
/// walks the list in reverse at read time instead of re-sorting or re-storing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortBag {
    pub column: ColumnId,
    pub ascending: bool,
    pub kind: EntityKind,
    pub entities: Vec<Entity>,
}

impl SortBag {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Row ids in stored (ascending) order.
    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.entities.iter().map(|e| e.id)
    }

    /// Row ids walked back to front, for descending presentation.
    pub fn row_ids_desc(&self) -> impl Iterator<Item = RowId> + '_ {
        self.entities.iter().rev().map(|e| e.id)
    }
}

/// Advisory cancellation flag shared between the interactive side and a
/// running sort. Checked between extraction batches only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }

    /// Re-arm the token so the next sort can run.
    pub fn reset(&self) {
        self.0.store(false, AtomicOrdering::Relaxed);
    }
}

/// Callback reporting `(rows_done, rows_total)` at batch granularity.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

#[derive(Clone, Debug, Builder)]
#[builder(derive(Clone))]
pub struct EngineOptions {
    /// Dataset identity; prefixes every cache file name.
    #[builder(into)]
    pub prefix: String,
    /// Datasets at or above this row count report extraction progress.
    #[builder(default = 50_000)]
    pub progress_threshold: usize,
}

/// Extracts typed entities for one column, sorts them, and keeps the result
/// in a pluggable cache so the next request for the same column skips the
/// whole computation.
pub struct SortEngine<C: SortCacheStore> {
    cache: C,
    opts: EngineOptions,
    progress: Option<Arc<ProgressFn>>,
    cancel: CancelToken,
}

impl<C: SortCacheStore> SortEngine<C> {
    pub fn new(cache: C, opts: EngineOptions) -> Self {
        SortEngine {
            cache,
            opts,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Token a caller can hold on to in order to abandon a long sort.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn prefix(&self) -> &str {
        &self.opts.prefix
    }

    /// Sort `column` ascending, consulting the cache first unless `force`.
    ///
    /// An unreadable cache entry is logged and treated as a miss. A failed
    /// cache write is logged and the freshly computed bag returned anyway.
    pub fn sort<S: RowSource>(&self, source: &S, column: ColumnId, force: bool) -> Result<SortBag> {
        let key = CacheKey::new(self.opts.prefix.clone(), column);
        if !force {
            match self.cache.load(&key) {
                Ok(Some(bag)) => {
                    debug!(column, entries = bag.len(), "sort served from cache");
                    return Ok(bag);
                },
                Ok(None) => {},
                Err(e) => warn!(column, error = %e, "sort cache unreadable, recomputing"),
            }
        }

        let bag = self.compute(source, column)?;
        if let Err(e) = self.cache.store(&key, &bag) {
            warn!(column, error = %e, "sort cache write skipped");
        }
        Ok(bag)
    }

    fn compute<S: RowSource>(&self, source: &S, column: ColumnId) -> Result<SortBag> {
        let started = Instant::now();
        let kind = source.column_kind(column);
        let total = source.row_count();
        let report = total >= self.opts.progress_threshold;

        let mut entities: Vec<Entity> = Vec::with_capacity(total);
        let mut done = 0;
        while done < total {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let end = (done + EXTRACT_BATCH).min(total);
            for row in done..end {
                let id = row as RowId;
                let value = EntityValue::parse(kind, source.cell(id, column).as_deref());
                entities.push(Entity::new(id, value));
            }
            done = end;
            if report {
                if let Some(progress) = &self.progress {
                    progress(done, total);
                }
            }
        }

        // Stable sort: entities were pushed in row-id order, so ties keep
        // their original row-id order and repeated runs are deterministic.
        entities.par_sort_by(|a, b| a.value.cmp_typed(&b.value));

        debug!(
            column,
            rows = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sort computed"
        );
        Ok(SortBag {
            column,
            ascending: true,
            kind,
            entities,
        })
    }
}

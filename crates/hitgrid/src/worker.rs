use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering as AtomicOrdering},
    },
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use threadpool::ThreadPool;
use tracing::debug;

use crate::{
    cache::SortCacheStore,
    entity::ColumnId,
    error::Result,
    rows::RowSource,
    sort::{CancelToken, SortBag, SortEngine},
};

/// One sort request handed to the worker.
#[derive(Debug, Clone, Copy)]
pub struct SortRequest {
    pub column: ColumnId,
    pub ascending: bool,
    pub force: bool,
}

/// Completion message for one submitted request.
///
/// `seq` identifies the submission; the receiving side compares it against
/// the latest issued sequence number and drops anything stale, so a slow
/// superseded sort can never overwrite a newer visible result.
pub struct SortCompletion {
    pub seq: u64,
    pub column: ColumnId,
    pub ascending: bool,
    pub result: Result<SortBag>,
}

/// Off-thread sort executor.
///
/// The interactive side submits requests and polls completions from its
/// event loop; sorting, cache reads and cache writes all happen on the pool.
/// The pool is bounded and defaults to a single thread: one sort in flight
/// per dataset identity, matching the serialized interactive session.
pub struct SortWorker<S, C>
where
    S: RowSource + Send + Sync + 'static,
    C: SortCacheStore + Send + Sync + 'static,
{
    pool: ThreadPool,
    source: Arc<S>,
    engine: Arc<SortEngine<C>>,
    latest: Arc<AtomicU64>,
    tx: Sender<SortCompletion>,
    rx: Receiver<SortCompletion>,
}

impl<S, C> SortWorker<S, C>
where
    S: RowSource + Send + Sync + 'static,
    C: SortCacheStore + Send + Sync + 'static,
{
    pub fn new(source: Arc<S>, engine: Arc<SortEngine<C>>) -> Self {
        Self::with_threads(source, engine, 1)
    }

    /// Bounded pool; `threads` is clamped to the machine's core count.
    pub fn with_threads(source: Arc<S>, engine: Arc<SortEngine<C>>, threads: usize) -> Self {
        let (tx, rx) = unbounded();
        SortWorker {
            pool: ThreadPool::new(threads.clamp(1, num_cpus::get())),
            source,
            engine,
            latest: Arc::new(AtomicU64::new(0)),
            tx,
            rx,
        }
    }

    /// Token cancelling the engine's extraction loop between batches.
    pub fn cancel_token(&self) -> CancelToken {
        self.engine.cancel_token()
    }

    /// Queue a sort; returns its sequence number. Submitting supersedes any
    /// earlier request whose completion has not been received yet.
    pub fn submit(&self, req: SortRequest) -> u64 {
        let seq = self.latest.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let source = Arc::clone(&self.source);
        let engine = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        self.pool.execute(move || {
            let result = engine.sort(source.as_ref(), req.column, req.force);
            // Receiver may be gone during shutdown; nothing to do then.
            let _ = tx.send(SortCompletion {
                seq,
                column: req.column,
                ascending: req.ascending,
                result,
            });
        });
        seq
    }

    /// Sequence number of the most recently submitted request.
    pub fn latest_seq(&self) -> u64 {
        self.latest.load(AtomicOrdering::SeqCst)
    }

    /// Next completion that is still current, waiting up to `timeout` for
    /// each message. Stale completions are logged and discarded.
    pub fn recv_latest(&self, timeout: Duration) -> Option<SortCompletion> {
        loop {
            match self.rx.recv_timeout(timeout) {
                Ok(completion) => {
                    if completion.seq == self.latest_seq() {
                        return Some(completion);
                    }
                    debug!(
                        seq = completion.seq,
                        latest = self.latest_seq(),
                        column = completion.column,
                        "stale sort completion dropped"
                    );
                },
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                },
            }
        }
    }

    /// Non-blocking variant of [`recv_latest`] for event-loop polling.
    pub fn try_recv_latest(&self) -> Option<SortCompletion> {
        while let Ok(completion) = self.rx.try_recv() {
            if completion.seq == self.latest_seq() {
                return Some(completion);
            }
            debug!(
                seq = completion.seq,
                latest = self.latest_seq(),
                "stale sort completion dropped"
            );
        }
        None
    }

    /// Block until every queued request has run. Test and shutdown helper.
    pub fn join(&self) {
        self.pool.join();
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache container on disk is not something we can read back.
    /// Callers treat this as a cache miss, never as a user-facing failure.
    #[error("cache container rejected: {0}")]
    CacheFormat(String),

    #[error("sort cancelled before completion")]
    Cancelled,

    #[error("results file error: {0}")]
    Tabular(#[from] csv::Error),
}

impl Error {
    pub(crate) fn cache_format(msg: impl Into<String>) -> Self {
        Error::CacheFormat(msg.into())
    }
}

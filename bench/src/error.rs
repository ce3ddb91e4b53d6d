//! Error type shared by data sources, strategies and configuration.

use authors_core::DatasetError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The backing store could not be reached. Never retried within a run.
    #[error("data source unavailable: {reason}")]
    SourceUnavailable { reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A compiled query slot was executed without a value.
    #[error("compiled query expects a value for `{slot}`")]
    UnboundParameter { slot: &'static str },

    /// A value was bound to a slot the compiled query does not have.
    #[error("compiled query has no `{slot}` slot")]
    UnexpectedParameter { slot: &'static str },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration for {key}: {reason}")]
    Config { key: String, reason: String },
}

impl Error {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

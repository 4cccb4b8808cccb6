use thiserror::Error;

use crate::store::StoreError;

/// Failure of a load or expand request. The snapshot in use is left untouched,
/// so every variant is recoverable by retrying or narrowing the request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("graph store is unavailable")]
    StoreUnavailable,
    #[error("failed to fetch graph data: {0}")]
    FetchFailed(#[source] StoreError),
    #[error("background load worker disconnected")]
    WorkerDisconnected,
}

impl From<StoreError> for LoadError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable => Self::StoreUnavailable,
            other => Self::FetchFailed(other),
        }
    }
}

use slotbook_cache::CacheError;
use slotbook_core::{CoreError, Reference};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("{reference} has been changed in the meantime")]
    VersionConflict { reference: Reference },

    /// User cancel or event-check veto. Never shown to the user.
    #[error("operation aborted: {0}")]
    Aborted(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("dispatch rejected: {0}")]
    DispatchRejected(String),

    #[error("illegal state: {0}")]
    IllegalState(String),
}

impl EngineError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

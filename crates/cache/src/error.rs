use slotbook_core::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("id can't be empty")]
    EmptyId,

    #[error("illegal local state: {0}")]
    IllegalLocalState(String),

    #[error("core error: {0}")]
    Core(#[from] slotbook_core::CoreError),
}

impl CacheError {
    pub fn not_found(kind: Option<EntityKind>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.map_or("entity", |k| k.as_str()).to_string(),
            id: id.into(),
        }
    }
}

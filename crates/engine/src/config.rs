pub const DEFAULT_UNDO_DEPTH: usize = 100;

/// Tunables of an [`EditController`](crate::EditController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Commands kept for undo. The oldest are dropped beyond this.
    pub undo_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_depth: DEFAULT_UNDO_DEPTH,
        }
    }
}

use std::collections::HashMap;

use slotbook_cache::LocalCache;
use slotbook_core::{Entity, EntityId, Reference, Reservation, Timestamp, User};
use tracing::{debug, warn};

use crate::checks::{CheckContext, EventCheckPipeline};
use crate::error::EngineError;
use crate::facade::Facade;

/// A reversible edit.
///
/// `execute` may be called again after `undo` (redo). Implementations keep
/// whatever they need for an exact undo in their own fields.
pub trait Command {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError>;
    fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError>;
    fn name(&self) -> String;
}

/// Change stamps as they were right after this engine's own dispatches.
///
/// A replayed command may only write an entity whose live stamp still
/// matches the ledger. Anything else was changed by someone else in the
/// meantime.
#[derive(Debug, Default, Clone)]
pub struct StampLedger {
    stamps: HashMap<EntityId, Option<Timestamp>>,
}

impl StampLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp recorded for `id`. The outer `None` means never written here,
    /// `Some(None)` means written and then removed.
    pub fn get(&self, id: &EntityId) -> Option<Option<Timestamp>> {
        self.stamps.get(id).copied()
    }

    fn record(&mut self, cache: &LocalCache, touched: &[Reference]) {
        for reference in touched {
            let live = cache.get(reference.id()).and_then(Entity::last_changed);
            self.stamps.insert(reference.id().clone(), live);
        }
    }
}

/// How a dispatch is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// First run through the event checks, where a veto aborts.
    Checked,
    /// First run without event checks. Only permissions and stamps of the
    /// checked-out copies are verified.
    Unchecked,
    /// Undo or redo. Live stamps must also match the ledger.
    Replay,
}

impl DispatchMode {
    pub fn first_or_replay(first_time: bool) -> Self {
        if first_time {
            Self::Checked
        } else {
            Self::Replay
        }
    }
}

/// Everything a command may touch while running.
pub struct CommandContext<'a> {
    pub facade: &'a mut dyn Facade,
    pub checks: &'a EventCheckPipeline,
    pub user: &'a User,
    pub stamps: &'a mut StampLedger,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        facade: &'a mut dyn Facade,
        checks: &'a EventCheckPipeline,
        user: &'a User,
        stamps: &'a mut StampLedger,
    ) -> Self {
        Self {
            facade,
            checks,
            user,
            stamps,
        }
    }

    /// Validate according to `mode` and commit. The ledger is updated with
    /// the stamps the dispatch left behind.
    pub fn check_and_dispatch(
        &mut self,
        store: Vec<Reservation>,
        remove: Vec<Reference>,
        mode: DispatchMode,
    ) -> Result<(), EngineError> {
        let store: Vec<Entity> = store.into_iter().map(Entity::Reservation).collect();
        let touched: Vec<Reference> = store
            .iter()
            .map(Entity::reference)
            .chain(remove.iter().cloned())
            .collect();
        if mode == DispatchMode::Checked {
            let reservations: Vec<Reservation> = store
                .iter()
                .filter_map(Entity::as_reservation)
                .cloned()
                .collect();
            let context = CheckContext {
                user: self.user,
                cache: self.facade.cache(),
            };
            if !self.checks.run(&reservations, &context) {
                debug!(count = reservations.len(), "event check vetoed edit");
                return Err(EngineError::Aborted("event check vetoed the edit".into()));
            }
        } else {
            self.facade.check_last_changed(&store, self.user, false)?;
        }
        if mode == DispatchMode::Replay {
            for reference in &touched {
                if let Some(known) = self.stamps.get(reference.id()) {
                    let live = self.facade.cache().get(reference.id()).and_then(Entity::last_changed);
                    self.ensure_current(reference, known, live)?;
                }
            }
        }
        self.facade.dispatch(store, remove)?;
        self.stamps.record(self.facade.cache(), &touched);
        Ok(())
    }

    /// Fail with a version conflict if the checked-out state no longer
    /// carries the stamp the edit was planned against. The cache is
    /// refreshed first.
    pub fn ensure_current(
        &mut self,
        reference: &Reference,
        known: Option<Timestamp>,
        live: Option<Timestamp>,
    ) -> Result<(), EngineError> {
        if known == live {
            return Ok(());
        }
        warn!(%reference, "stale version, refreshing");
        self.facade.refresh()?;
        Err(EngineError::VersionConflict {
            reference: reference.clone(),
        })
    }
}

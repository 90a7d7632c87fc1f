use chrono::Duration;
use slotbook_cache::LocalCache;
use slotbook_core::time::now;
use slotbook_core::{Entity, Reference, Timestamp, User};
use slotbook_engine::{EngineError, Facade};
use tracing::debug;

/// One committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub stored: Vec<Reference>,
    pub removed: Vec<Reference>,
}

/// In-memory authority. The cache is the stored state; dispatch validates
/// change stamps, stamps the batch and commits it.
pub struct TestFacade {
    cache: LocalCache,
    last_stamp: Option<Timestamp>,
    dispatches: Vec<DispatchRecord>,
    refresh_count: usize,
    reject_next: Option<String>,
    touch_on_edit: Vec<Reference>,
}

impl Default for TestFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFacade {
    pub fn new() -> Self {
        Self {
            cache: LocalCache::default(),
            last_stamp: None,
            dispatches: Vec::new(),
            refresh_count: 0,
            reject_next: None,
            touch_on_edit: Vec::new(),
        }
    }

    /// Store `entity` as if it had always been there, with a fresh stamp.
    pub fn seed(&mut self, mut entity: Entity) -> Result<(), EngineError> {
        entity.set_last_changed(Some(self.next_stamp()));
        self.cache.put(entity)?;
        Ok(())
    }

    /// Simulate another user's write to `reference`.
    pub fn touch(&mut self, reference: &Reference) -> Result<(), EngineError> {
        let entity = self
            .cache
            .resolve(reference.id(), Some(reference.kind()))?
            .clone();
        debug!(%reference, "concurrent write");
        self.seed(entity)
    }

    /// Touch `reference` right before it is next checked out.
    pub fn touch_on_next_edit(&mut self, reference: Reference) {
        self.touch_on_edit.push(reference);
    }

    /// Fail the next dispatch with `reason`.
    pub fn reject_next(&mut self, reason: impl Into<String>) {
        self.reject_next = Some(reason.into());
    }

    pub fn dispatches(&self) -> &[DispatchRecord] {
        &self.dispatches
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_count
    }

    pub fn cache_mut(&mut self) -> &mut LocalCache {
        &mut self.cache
    }

    fn next_stamp(&mut self) -> Timestamp {
        let current = now();
        let stamp = match self.last_stamp {
            Some(last) if current <= last => last + Duration::microseconds(1),
            _ => current,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn check_stamps(&self, entities: &[Entity]) -> Result<(), EngineError> {
        for entity in entities {
            if let Some(stored) = self.cache.get(entity.id())
                && stored.last_changed() != entity.last_changed()
            {
                return Err(EngineError::VersionConflict {
                    reference: entity.reference(),
                });
            }
        }
        Ok(())
    }
}

impl Facade for TestFacade {
    fn cache(&self) -> &LocalCache {
        &self.cache
    }

    fn edit(&mut self, reference: &Reference) -> Result<Entity, EngineError> {
        if let Some(index) = self.touch_on_edit.iter().position(|r| r == reference) {
            let touched = self.touch_on_edit.remove(index);
            self.touch(&touched)?;
        }
        Ok(self
            .cache
            .resolve(reference.id(), Some(reference.kind()))?
            .clone())
    }

    fn dispatch(&mut self, store: Vec<Entity>, remove: Vec<Reference>) -> Result<(), EngineError> {
        if let Some(reason) = self.reject_next.take() {
            return Err(EngineError::DispatchRejected(reason));
        }
        self.check_stamps(&store)?;
        let mut removed_entities = Vec::with_capacity(remove.len());
        for reference in &remove {
            let entity = self.cache.get(reference.id()).cloned().ok_or_else(|| {
                EngineError::EntityNotFound(format!("{reference} is not stored"))
            })?;
            removed_entities.push(entity);
        }

        let stamp = self.next_stamp();
        let stored: Vec<Reference> = store.iter().map(Entity::reference).collect();
        for mut entity in store {
            entity.set_last_changed(Some(stamp));
            self.cache.put(entity)?;
        }
        for entity in &removed_entities {
            self.cache.remove(entity);
        }
        debug!(stored = stored.len(), removed = remove.len(), "dispatched");
        self.dispatches.push(DispatchRecord {
            stored,
            removed: remove,
        });
        Ok(())
    }

    fn check_last_changed(&self, entities: &[Entity], user: &User, is_new: bool) -> Result<(), EngineError> {
        if is_new {
            return Ok(());
        }
        for entity in entities {
            if let Some(reservation) = entity.as_reservation()
                && self.cache.contains(reservation.id())
                && !self.cache.permissions().can_modify(reservation, user)
            {
                return Err(EngineError::DispatchRejected(format!(
                    "{} may not modify {}",
                    user.username,
                    entity.reference()
                )));
            }
        }
        self.check_stamps(entities)
    }

    fn refresh(&mut self) -> Result<(), EngineError> {
        self.refresh_count += 1;
        Ok(())
    }
}

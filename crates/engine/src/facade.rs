use chrono::NaiveDateTime;
use slotbook_cache::LocalCache;
use slotbook_core::time::move_offset;
use slotbook_core::{Entity, EntityId, EntityKind, Reference, Reservation, User};

use crate::error::EngineError;

/// Boundary to the authority that owns the data.
///
/// Commands never mutate the cache directly. They check out mutable copies
/// through [`Facade::edit`], change them and hand the result to
/// [`Facade::dispatch`], which validates and commits or rejects the batch.
pub trait Facade {
    fn cache(&self) -> &LocalCache;

    /// Fresh mutable copy of the referenced entity.
    fn edit(&mut self, reference: &Reference) -> Result<Entity, EngineError>;

    fn edit_list(&mut self, references: &[Reference]) -> Result<Vec<Entity>, EngineError> {
        references.iter().map(|r| self.edit(r)).collect()
    }

    /// Commit a batch of stored and removed entities atomically.
    fn dispatch(&mut self, store: Vec<Entity>, remove: Vec<Reference>) -> Result<(), EngineError>;

    /// Optimistic-concurrency check of `entities` against the authority.
    fn check_last_changed(
        &self,
        entities: &[Entity],
        user: &User,
        is_new: bool,
    ) -> Result<(), EngineError>;

    /// Reload the cache from the authority.
    fn refresh(&mut self) -> Result<(), EngineError>;

    /// Copy of `entity` with fresh ids, owned by `user` and not yet stored.
    fn clone_entity(&self, entity: &Entity, user: &User) -> Result<Entity, EngineError> {
        match entity {
            Entity::Reservation(r) => Ok(Entity::Reservation(r.with_new_ids(Some(user.id.clone())))),
            Entity::Appointment(a) => Ok(Entity::Appointment(a.with_new_id())),
            Entity::Allocatable(a) => {
                let mut copy = a.clone();
                copy.id = EntityId::new();
                copy.owner = Some(user.id.clone());
                copy.last_changed = None;
                Ok(Entity::Allocatable(copy))
            }
            other => Err(EngineError::IllegalState(format!(
                "{} can't be cloned",
                other.kind()
            ))),
        }
    }

    /// Clones of `reservations` shifted so the earliest appointment starts
    /// at `new_start`. With `keep_time` only the date moves.
    fn copy(
        &self,
        reservations: &[Reservation],
        new_start: NaiveDateTime,
        keep_time: bool,
        user: &User,
    ) -> Result<Vec<Reservation>, EngineError> {
        let Some(earliest) = reservations.iter().filter_map(Reservation::first_start).min() else {
            return Ok(Vec::new());
        };
        let offset = move_offset(earliest, new_start, keep_time);
        let mut clones = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            let mut clone = reservation.with_new_ids(Some(user.id.clone()));
            for appointment in clone.appointments_mut() {
                appointment.move_to(appointment.start() + offset);
            }
            clones.push(clone);
        }
        Ok(clones)
    }

    /// Checked-out copy of a reservation.
    fn edit_reservation(&mut self, id: &EntityId) -> Result<Reservation, EngineError> {
        self.edit(&Reference::new(id.clone(), EntityKind::Reservation))?
            .into_reservation()
            .ok_or_else(|| EngineError::EntityNotFound(format!("reservation {id}")))
    }
}

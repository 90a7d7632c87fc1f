use chrono::NaiveDateTime;
use slotbook_cache::LocalCache;
use slotbook_core::time::is_same_day;
use slotbook_core::{Appointment, AppointmentBlock, EntityId, Reference, Reservation};

use crate::command::{Command, CommandContext, DispatchMode};
use crate::decision::Scope;
use crate::error::EngineError;

/// True if `appointment` still has an occurrence left once `exceptions` are
/// added.
///
/// Only a bounded count series can run empty. The blocks are only generated
/// once the existing plus proposed exceptions come within one of the count.
pub fn keeps_occurrences(appointment: &Appointment, exceptions: &[NaiveDateTime]) -> bool {
    let Some(repeating) = appointment.repeating() else {
        return true;
    };
    let Some(number) = repeating.number().filter(|n| *n >= 1) else {
        return true;
    };
    let excepted = repeating.exceptions().len() + exceptions.len();
    if excepted + 1 < number as usize {
        return true;
    }
    let Some(blocks) = appointment.all_blocks() else {
        return true;
    };
    let blocked = blocks
        .iter()
        .filter(|block| exceptions.iter().any(|e| is_same_day(*e, block.start)))
        .count();
    blocked < blocks.len()
}

/// What a delete removes. Built from a block selection or a scope decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletePlan {
    /// Reservations removed as a whole.
    pub reservations: Vec<EntityId>,
    /// Appointments removed from their (surviving) reservation.
    pub appointments: Vec<(EntityId, EntityId)>,
    /// Exception days added to a recurring appointment.
    pub exceptions: Vec<(EntityId, EntityId, Vec<NaiveDateTime>)>,
}

impl DeletePlan {
    pub fn for_reservations(ids: impl IntoIterator<Item = EntityId>) -> Self {
        let mut plan = Self::default();
        for id in ids {
            if !plan.reservations.contains(&id) {
                plan.reservations.push(id);
            }
        }
        plan
    }

    /// Plan for deleting one block under the chosen scope.
    pub fn for_scope(
        reservation: &Reservation,
        appointment: &Appointment,
        block_start: NaiveDateTime,
        scope: Scope,
    ) -> Result<Self, EngineError> {
        let mut plan = Self::default();
        let pair = (appointment.id().clone(), reservation.id().clone());
        match scope {
            Scope::Single => {
                let exceptions = vec![block_start];
                if appointment.is_repeating() && keeps_occurrences(appointment, &exceptions) {
                    plan.exceptions.push((pair.0, pair.1, exceptions));
                } else {
                    plan.appointments.push(pair);
                }
            }
            Scope::Series => plan.appointments.push(pair),
            Scope::Reservation => plan.reservations.push(pair.1),
            Scope::Cancel => {
                return Err(EngineError::Aborted("delete cancelled".into()));
            }
        }
        Ok(plan)
    }

    /// Plan for deleting a selection of blocks.
    ///
    /// Occurrences of a recurring appointment become exceptions as long as
    /// the series keeps at least one occurrence; otherwise the appointment
    /// goes. A reservation losing every appointment is removed as a whole.
    pub fn for_blocks(cache: &LocalCache, blocks: &[AppointmentBlock]) -> Result<Self, EngineError> {
        let mut plan = Self::default();
        let mut removed_per_reservation: Vec<(EntityId, usize)> = Vec::new();

        for block in blocks {
            let (reservation, appointment) = locate(cache, &block.appointment)?;
            let reservation_id = reservation.id().clone();
            let app_id = appointment.id().clone();
            if plan.appointments.iter().any(|(a, _)| *a == app_id) {
                continue;
            }

            let mut exceptions_added = false;
            if appointment.is_repeating() {
                let index = match plan.exceptions.iter().position(|(a, _, _)| *a == app_id) {
                    Some(index) => index,
                    None => {
                        plan.exceptions
                            .push((app_id.clone(), reservation_id.clone(), Vec::new()));
                        plan.exceptions.len() - 1
                    }
                };
                plan.exceptions[index].2.push(block.start);
                if keeps_occurrences(appointment, &plan.exceptions[index].2) {
                    exceptions_added = true;
                } else {
                    plan.exceptions.remove(index);
                }
            }
            if !exceptions_added {
                plan.appointments.push((app_id, reservation_id.clone()));
                match removed_per_reservation.iter_mut().find(|(r, _)| *r == reservation_id) {
                    Some((_, count)) => *count += 1,
                    None => removed_per_reservation.push((reservation_id, 1)),
                }
            }
        }

        for (reservation_id, count) in removed_per_reservation {
            let reservation = cache.resolve_reservation(&reservation_id)?;
            if count == reservation.appointments().len() {
                plan.appointments.retain(|(_, r)| *r != reservation_id);
                plan.reservations.push(reservation_id);
            }
        }
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty() && self.appointments.is_empty() && self.exceptions.is_empty()
    }

    fn removes_reservation(&self, id: &EntityId) -> bool {
        self.reservations.contains(id)
    }

    /// Reservations that are edited rather than removed, in first-seen order.
    fn edited_reservations(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = Vec::new();
        let candidates = self
            .appointments
            .iter()
            .map(|(_, r)| r)
            .chain(self.exceptions.iter().map(|(_, r, _)| r));
        for id in candidates {
            if !self.removes_reservation(id) && !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// The reservation owning `appointment` and the appointment as stored in it.
pub(crate) fn locate<'c>(
    cache: &'c LocalCache,
    appointment: &EntityId,
) -> Result<(&'c Reservation, &'c Appointment), EngineError> {
    let entity = cache.resolve(appointment, Some(slotbook_core::EntityKind::Appointment))?;
    let reservation_ref = entity
        .as_appointment()
        .and_then(Appointment::reservation)
        .ok_or_else(|| EngineError::IllegalState(format!("appointment {appointment} has no reservation")))?;
    let reservation = cache.resolve_reservation(reservation_ref.id())?;
    let appointment = reservation
        .find_appointment(appointment)
        .ok_or_else(|| EngineError::EntityNotFound(format!("appointment {appointment}")))?;
    Ok((reservation, appointment))
}

/// Removes reservations and appointments and adds exception days in one
/// dispatch.
pub struct DeleteBlocks {
    plan: DeletePlan,
    name: String,
    removed_reservations: Vec<Reservation>,
    removed_appointments: Vec<(EntityId, Appointment, Vec<EntityId>)>,
    added_exceptions: Vec<(EntityId, EntityId, Vec<NaiveDateTime>)>,
    executed: bool,
}

impl DeleteBlocks {
    pub fn new(plan: DeletePlan, name: impl Into<String>) -> Self {
        Self {
            plan,
            name: name.into(),
            removed_reservations: Vec::new(),
            removed_appointments: Vec::new(),
            added_exceptions: Vec::new(),
            executed: false,
        }
    }

    pub fn plan(&self) -> &DeletePlan {
        &self.plan
    }

    fn edit_all(ctx: &mut CommandContext<'_>, ids: &[EntityId]) -> Result<Vec<Reservation>, EngineError> {
        ids.iter().map(|id| ctx.facade.edit_reservation(id)).collect()
    }
}

fn find_mut<'r>(reservations: &'r mut [Reservation], id: &EntityId) -> Result<&'r mut Reservation, EngineError> {
    reservations
        .iter_mut()
        .find(|r| r.id() == id)
        .ok_or_else(|| EngineError::IllegalState(format!("reservation {id} not checked out")))
}

impl Command for DeleteBlocks {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        let mut edited = Self::edit_all(ctx, &self.plan.edited_reservations())?;

        self.removed_appointments.clear();
        for (app_id, reservation_id) in &self.plan.appointments {
            if self.plan.removes_reservation(reservation_id) {
                continue;
            }
            let reservation = find_mut(&mut edited, reservation_id)?;
            let restricted = reservation.restricted_allocatables(app_id);
            if let Some(removed) = reservation.remove_appointment(app_id) {
                self.removed_appointments
                    .push((reservation_id.clone(), removed, restricted));
            }
        }

        self.added_exceptions.clear();
        for (app_id, reservation_id, dates) in &self.plan.exceptions {
            if self.plan.removes_reservation(reservation_id) {
                continue;
            }
            let reservation = find_mut(&mut edited, reservation_id)?;
            if let Some(repeating) = reservation
                .find_appointment_mut(app_id)
                .and_then(Appointment::repeating_mut)
            {
                let added: Vec<NaiveDateTime> = dates
                    .iter()
                    .copied()
                    .filter(|date| repeating.add_exception(*date))
                    .collect();
                self.added_exceptions
                    .push((app_id.clone(), reservation_id.clone(), added));
            }
        }

        self.removed_reservations.clear();
        let mut remove = Vec::with_capacity(self.plan.reservations.len());
        for id in &self.plan.reservations {
            let reservation = ctx.facade.cache().resolve_reservation(id)?.clone();
            remove.push(reservation.reference());
            self.removed_reservations.push(reservation);
        }

        let mode = if self.executed {
            DispatchMode::Replay
        } else {
            DispatchMode::Unchecked
        };
        ctx.check_and_dispatch(edited, remove, mode)?;
        self.executed = true;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        let mut ids: Vec<EntityId> = Vec::new();
        let touched = self
            .removed_appointments
            .iter()
            .map(|(r, _, _)| r)
            .chain(self.added_exceptions.iter().map(|(_, r, _)| r));
        for id in touched {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        let mut edited = Self::edit_all(ctx, &ids)?;

        for (reservation_id, appointment, restricted) in &self.removed_appointments {
            let reservation = find_mut(&mut edited, reservation_id)?;
            reservation.add_appointment(appointment.clone());
            reservation.set_restriction_for_appointment(appointment.id(), restricted);
        }
        for (app_id, reservation_id, dates) in &self.added_exceptions {
            let reservation = find_mut(&mut edited, reservation_id)?;
            if let Some(repeating) = reservation
                .find_appointment_mut(app_id)
                .and_then(Appointment::repeating_mut)
            {
                for date in dates {
                    repeating.remove_exception(*date);
                }
            }
        }

        edited.extend(self.removed_reservations.iter().cloned());
        ctx.check_and_dispatch(edited, Vec::<Reference>::new(), DispatchMode::Replay)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

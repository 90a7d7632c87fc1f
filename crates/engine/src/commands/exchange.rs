use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use slotbook_core::time::to_date_time;
use slotbook_core::{Appointment, AppointmentBlock, EntityId, Reference, Reservation, Timestamp};

use crate::command::{Command, CommandContext, DispatchMode};
use crate::decision::Scope;
use crate::error::EngineError;

/// True if `allocatable` is bound to every appointment, so the exchange may
/// cover the whole reservation.
pub fn includes_event(reservation: &Reservation, allocatable: &EntityId) -> bool {
    reservation.restriction(allocatable).is_empty()
}

/// Replaces one allocatable by another for a block, a series or the whole
/// reservation, optionally moving the exchanged appointment.
pub struct AllocatableExchange {
    reservation: Reference,
    appointment: EntityId,
    original_start: NaiveDateTime,
    old_allocatable: EntityId,
    new_allocatable: EntityId,
    new_start: Option<NaiveDateTime>,
    new_restrictions: Vec<(EntityId, Vec<EntityId>)>,
    old_restrictions: BTreeMap<EntityId, Vec<EntityId>>,
    remove_old: bool,
    add_new: bool,
    added_appointment: Option<Appointment>,
    exceptions: Vec<NaiveDateTime>,
    known_last_changed: Option<Timestamp>,
    first_time: bool,
}

impl AllocatableExchange {
    /// Work out the restriction changes for exchanging `old` by `new` on
    /// `block` under `scope`.
    ///
    /// A single occurrence of a recurring appointment is detached into a
    /// copy on the block's day, and every restricted allocatable of the
    /// appointment other than `old` is extended to the copy.
    pub fn plan(
        reservation: &Reservation,
        block: &AppointmentBlock,
        old: &EntityId,
        new: &EntityId,
        new_start: Option<NaiveDateTime>,
        scope: Scope,
    ) -> Result<Self, EngineError> {
        if scope == Scope::Cancel {
            return Err(EngineError::Aborted("exchange cancelled".into()));
        }
        let appointment = reservation
            .find_appointment(&block.appointment)
            .ok_or_else(|| EngineError::EntityNotFound(format!("appointment {}", block.appointment)))?;

        let copy = (scope == Scope::Single && appointment.is_repeating()).then(|| {
            let mut copy = appointment.with_new_id();
            copy.set_repeating(None);
            copy.move_to(to_date_time(block.start, appointment.start()));
            copy
        });

        let mut new_restrictions: Vec<(EntityId, Vec<EntityId>)> = Vec::new();
        let mut exceptions = Vec::new();
        let mut remove_old = false;
        let mut add_new = false;

        if scope == Scope::Reservation && includes_event(reservation, old) {
            remove_old = true;
            if reservation.has_allocated(new) {
                new_restrictions.push((new.clone(), Vec::new()));
            } else {
                add_new = true;
            }
        } else {
            let apps = reservation.appointments_for(old);
            match &copy {
                Some(copy) => {
                    exceptions.push(block.start);
                    for other in reservation.allocatables_for(appointment.id()) {
                        if &other == old {
                            continue;
                        }
                        let restriction = reservation.restriction(&other);
                        if !restriction.is_empty() {
                            let mut extended = restriction.to_vec();
                            extended.push(copy.id().clone());
                            new_restrictions.push((other, extended));
                        }
                    }
                    new_restrictions.push((old.clone(), apps));
                }
                None if apps.len() == 1 => remove_old = true,
                None => {
                    let rest = apps.into_iter().filter(|id| id != appointment.id()).collect();
                    new_restrictions.push((old.clone(), rest));
                }
            }

            let target = copy.as_ref().unwrap_or(appointment).id().clone();
            if reservation.has_allocated(new) {
                let mut restriction = reservation.restriction(new).to_vec();
                if !restriction.is_empty() && !restriction.contains(&target) {
                    restriction.push(target);
                }
                new_restrictions.push((new.clone(), restriction));
            } else {
                add_new = true;
                if reservation.appointments().len() > 1 || copy.is_some() {
                    new_restrictions.push((new.clone(), vec![target]));
                }
            }
        }

        let new_start = new_start.map(|start| {
            let moved = copy.as_ref().unwrap_or(appointment);
            moved.start() + (start - block.start)
        });

        Ok(Self {
            reservation: reservation.reference(),
            appointment: appointment.id().clone(),
            original_start: appointment.start(),
            old_allocatable: old.clone(),
            new_allocatable: new.clone(),
            new_start,
            new_restrictions,
            old_restrictions: BTreeMap::new(),
            remove_old,
            add_new,
            added_appointment: copy,
            exceptions,
            known_last_changed: reservation.last_changed(),
            first_time: true,
        })
    }

    /// Apply the exchange to a checked-out reservation.
    pub fn apply(&mut self, reservation: &mut Reservation) {
        self.old_restrictions = reservation.restriction_snapshot();
        if let Some(copy) = &self.added_appointment {
            reservation.add_appointment(copy.clone());
        }
        if let Some(repeating) = reservation
            .find_appointment_mut(&self.appointment)
            .and_then(Appointment::repeating_mut)
        {
            for exception in &self.exceptions {
                repeating.add_exception(*exception);
            }
        }
        if self.remove_old {
            reservation.remove_allocatable(&self.old_allocatable);
        }
        if self.add_new {
            reservation.add_allocatable(self.new_allocatable.clone());
        }
        for (allocatable, appointments) in &self.new_restrictions {
            reservation.set_restriction(allocatable, appointments);
        }
        if let Some(start) = self.new_start {
            let moved = self
                .added_appointment
                .as_ref()
                .map_or(&self.appointment, Appointment::id);
            if let Some(app) = reservation.find_appointment_mut(moved) {
                app.move_to(start);
            }
        }
    }

    /// Reverse [`apply`](Self::apply) on a freshly checked-out reservation.
    pub fn revert(&self, reservation: &mut Reservation) {
        if let Some(copy) = &self.added_appointment {
            reservation.remove_appointment(copy.id());
        }
        if let Some(app) = reservation.find_appointment_mut(&self.appointment) {
            if let Some(repeating) = app.repeating_mut() {
                for exception in &self.exceptions {
                    repeating.remove_exception(*exception);
                }
            }
            if self.new_start.is_some() {
                app.move_to(self.original_start);
            }
        }
        if self.remove_old {
            reservation.add_allocatable(self.old_allocatable.clone());
        }
        if self.add_new {
            reservation.remove_allocatable(&self.new_allocatable);
        }
        for (allocatable, appointments) in &self.old_restrictions {
            reservation.set_restriction(allocatable, appointments);
        }
    }
}

impl Command for AllocatableExchange {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        let mut reservation = ctx.facade.edit_reservation(self.reservation.id())?;
        let first_time = self.first_time;
        if first_time {
            ctx.ensure_current(&self.reservation, self.known_last_changed, reservation.last_changed())?;
        }
        self.apply(&mut reservation);
        ctx.check_and_dispatch(vec![reservation], Vec::new(), DispatchMode::first_or_replay(first_time))?;
        self.first_time = false;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        let mut reservation = ctx.facade.edit_reservation(self.reservation.id())?;
        self.revert(&mut reservation);
        ctx.check_and_dispatch(vec![reservation], Vec::new(), DispatchMode::Replay)
    }

    fn name(&self) -> String {
        "exchange allocatables".into()
    }
}

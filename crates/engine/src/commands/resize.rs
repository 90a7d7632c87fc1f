use chrono::NaiveDateTime;
use slotbook_core::time::move_offset;
use slotbook_core::{Appointment, EntityId, Reference, Reservation, Timestamp};

use crate::command::{Command, CommandContext, DispatchMode};
use crate::decision::Scope;
use crate::error::EngineError;

/// Where a block was and where it goes. `end` is only set for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl BlockRange {
    pub fn moved(start: NaiveDateTime) -> Self {
        Self { start, end: None }
    }

    pub fn resized(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }
}

/// Moves or resizes an appointment block under a scope.
///
/// Moving a single occurrence of a recurring appointment detaches it: a
/// non-recurring copy takes the new slot and the old day becomes an
/// exception of the series.
pub struct AppointmentResize {
    reservation: Reference,
    appointment: EntityId,
    scope: Scope,
    from: BlockRange,
    to: BlockRange,
    keep_time: bool,
    known_last_changed: Option<Timestamp>,
    detached: Option<Appointment>,
    first_time: bool,
}

impl AppointmentResize {
    pub fn new(
        reservation: &Reservation,
        appointment: EntityId,
        scope: Scope,
        from: BlockRange,
        to: BlockRange,
        keep_time: bool,
    ) -> Self {
        Self {
            reservation: reservation.reference(),
            appointment,
            scope,
            from,
            to,
            keep_time,
            known_last_changed: reservation.last_changed(),
            detached: None,
            first_time: true,
        }
    }

    /// Id of the detached copy once a single occurrence has been moved.
    pub fn detached_id(&self) -> Option<&EntityId> {
        self.detached.as_ref().map(Appointment::id)
    }

    fn do_move(&mut self, ctx: &mut CommandContext<'_>, undo: bool) -> Result<(), EngineError> {
        let mut reservation = ctx.facade.edit_reservation(self.reservation.id())?;
        if self.first_time {
            ctx.ensure_current(&self.reservation, self.known_last_changed, reservation.last_changed())?;
        }
        let original = reservation
            .find_appointment(&self.appointment)
            .cloned()
            .ok_or_else(|| {
                EngineError::IllegalState(format!(
                    "appointment {} not in {}",
                    self.appointment, self.reservation
                ))
            })?;

        let (source, dest) = if undo {
            (self.to, self.from)
        } else {
            (self.from, self.to)
        };
        let offset = move_offset(source.start, dest.start, self.keep_time);
        let place = |app: &mut Appointment, start: NaiveDateTime| match dest.end {
            Some(end) => app.move_range(start, start + (end - dest.start)),
            None => app.move_to(start),
        };

        match self.scope {
            Scope::Cancel => {
                return Err(EngineError::InvalidScope("cancel can't be applied".into()));
            }
            Scope::Reservation => {
                for app in reservation.appointments_mut() {
                    let start = app.start() + offset;
                    if *app.id() == self.appointment {
                        place(app, start);
                    } else {
                        app.move_to(start);
                    }
                }
            }
            Scope::Single if original.is_repeating() => {
                if undo {
                    if let Some(copy) = &self.detached {
                        reservation.remove_appointment(copy.id());
                    }
                    if let Some(repeating) = reservation
                        .find_appointment_mut(&self.appointment)
                        .and_then(Appointment::repeating_mut)
                    {
                        repeating.remove_exception(self.from.start);
                    }
                } else {
                    let mut copy = match &self.detached {
                        Some(copy) => copy.clone(),
                        None => original.with_new_id(),
                    };
                    copy.set_repeating(None);
                    place(&mut copy, source.start + offset);

                    let restricted = reservation.restricted_allocatables(&self.appointment);
                    reservation.add_appointment(copy.clone());
                    reservation.set_restriction_for_appointment(copy.id(), &restricted);
                    if let Some(repeating) = reservation
                        .find_appointment_mut(&self.appointment)
                        .and_then(Appointment::repeating_mut)
                    {
                        repeating.add_exception(self.from.start);
                    }
                    self.detached = Some(copy);
                }
            }
            Scope::Single | Scope::Series => {
                if let Some(app) = reservation.find_appointment_mut(&self.appointment) {
                    let start = app.start() + offset;
                    place(app, start);
                }
            }
        }

        let first_time = self.first_time;
        ctx.check_and_dispatch(vec![reservation], Vec::new(), DispatchMode::first_or_replay(first_time))?;
        self.first_time = false;
        Ok(())
    }
}

impl Command for AppointmentResize {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        self.do_move(ctx, false)
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        self.do_move(ctx, true)
    }

    fn name(&self) -> String {
        "move".into()
    }
}

use chrono::{Duration, NaiveDateTime};
use slotbook_core::{Appointment, Entity, EntityId, Reservation};

use crate::command::{Command, CommandContext, DispatchMode};
use crate::error::EngineError;

/// Pastes one appointment from the clipboard, either into its source
/// reservation or as a new reservation cloned from the source.
pub struct AppointmentPaste {
    appointment: Appointment,
    reservation: Reservation,
    restricted_allocatables: Vec<EntityId>,
    as_new: bool,
    whole_reservation: bool,
    offset: Duration,
    saved_reservation: Option<Reservation>,
    saved_appointment: Option<Appointment>,
    first_time: bool,
}

impl AppointmentPaste {
    /// A whole reservation can only be pasted as a new reservation.
    pub fn new(
        appointment: Appointment,
        reservation: Reservation,
        restricted_allocatables: Vec<EntityId>,
        as_new: bool,
        whole_reservation: bool,
        offset: Duration,
    ) -> Result<Self, EngineError> {
        if whole_reservation && !as_new {
            return Err(EngineError::InvalidScope(
                "whole reservation must be pasted as new reservation".into(),
            ));
        }
        Ok(Self {
            appointment,
            reservation,
            restricted_allocatables,
            as_new,
            whole_reservation,
            offset,
            saved_reservation: None,
            saved_appointment: None,
            first_time: true,
        })
    }

    /// The reservation stored by the last execute.
    pub fn saved_reservation(&self) -> Option<&Reservation> {
        self.saved_reservation.as_ref()
    }

    pub fn saved_appointment(&self) -> Option<&Appointment> {
        self.saved_appointment.as_ref()
    }

    fn new_reservation(&self, ctx: &CommandContext<'_>) -> Result<Reservation, EngineError> {
        let mut clone = ctx
            .facade
            .clone_entity(&Entity::Reservation(self.reservation.clone()), ctx.user)?
            .into_reservation()
            .ok_or_else(|| EngineError::IllegalState("reservation clone of another kind".into()))?;
        if self.whole_reservation {
            for app in clone.appointments_mut() {
                app.move_to(app.start() + self.offset);
            }
        } else {
            for id in clone.appointment_ids() {
                clone.remove_appointment(&id);
            }
        }
        Ok(clone)
    }
}

impl Command for AppointmentPaste {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        let replay = self.saved_reservation.as_ref().filter(|_| self.as_new).cloned();
        let target = match replay {
            Some(saved) => saved,
            None => {
                let mut target = if self.as_new {
                    self.new_reservation(ctx)?
                } else {
                    ctx.facade.edit_reservation(self.reservation.id())?
                };
                if !self.whole_reservation {
                    let app = match &self.saved_appointment {
                        Some(app) => app.clone(),
                        None => {
                            let mut app = self.appointment.with_new_id();
                            app.move_to(app.start() + self.offset);
                            app
                        }
                    };
                    target.add_appointment(app.clone());
                    target.set_restriction_for_appointment(app.id(), &self.restricted_allocatables);
                    self.saved_appointment = Some(app);
                }
                target
            }
        };
        self.saved_reservation = Some(target.clone());

        let first_time = self.first_time;
        ctx.check_and_dispatch(vec![target], Vec::new(), DispatchMode::first_or_replay(first_time))?;
        self.first_time = false;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        let saved = self
            .saved_reservation
            .as_ref()
            .ok_or_else(|| EngineError::IllegalState("paste undone before execute".into()))?;
        if self.as_new {
            return ctx.check_and_dispatch(Vec::new(), vec![saved.reference()], DispatchMode::Replay);
        }
        let mut reservation = ctx.facade.edit_reservation(saved.id())?;
        if let Some(app) = &self.saved_appointment {
            reservation.remove_appointment(app.id());
        }
        ctx.check_and_dispatch(vec![reservation], Vec::new(), DispatchMode::Replay)
    }

    fn name(&self) -> String {
        "paste".into()
    }
}

/// Pastes cloned reservations, shifted so the earliest appointment starts at
/// the paste target.
pub struct ReservationPaste {
    reservations: Vec<Reservation>,
    start: NaiveDateTime,
    keep_time: bool,
    clones: Vec<Reservation>,
    first_time: bool,
}

impl ReservationPaste {
    pub fn new(reservations: Vec<Reservation>, start: NaiveDateTime, keep_time: bool) -> Self {
        Self {
            reservations,
            start,
            keep_time,
            clones: Vec::new(),
            first_time: true,
        }
    }

    pub fn clones(&self) -> &[Reservation] {
        &self.clones
    }
}

impl Command for ReservationPaste {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        if self.clones.is_empty() {
            self.clones = ctx
                .facade
                .copy(&self.reservations, self.start, self.keep_time, ctx.user)?;
        }
        let first_time = self.first_time;
        ctx.check_and_dispatch(self.clones.clone(), Vec::new(), DispatchMode::first_or_replay(first_time))?;
        self.first_time = false;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineError> {
        let remove = self.clones.iter().map(Reservation::reference).collect();
        ctx.check_and_dispatch(Vec::new(), remove, DispatchMode::Replay)
    }

    fn name(&self) -> String {
        "paste".into()
    }
}

use serde::{Deserialize, Serialize};
use slotbook_core::{Appointment, AppointmentBlock, Reference, Reservation};

use crate::commands::delete::keeps_occurrences;
use crate::error::EngineError;

/// How much of a reservation an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// The whole reservation with all of its appointments.
    Reservation,
    /// One appointment including every occurrence.
    Series,
    /// The selected occurrence only.
    Single,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditAction {
    Delete,
    Move,
    Copy,
    Cut,
    Exchange,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Cut => "cut",
            Self::Exchange => "exchange_allocatables",
        }
    }
}

/// Question put to the user when an edit could apply to several scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRequest {
    pub action: EditAction,
    pub options: Vec<Scope>,
    pub block: AppointmentBlock,
    pub reservation: Reference,
}

/// Interaction with whoever drives the controller.
pub trait DecisionCallback {
    /// Pick one of `request.options`. Only called with two or more options.
    fn choose_scope(&mut self, request: &ScopeRequest) -> Scope;

    fn confirm_delete(&mut self, deletables: &[Reference]) -> bool;

    /// Display a failed operation. Aborted operations never get here.
    fn show_failure(&mut self, _error: &EngineError) {}
}

/// Scopes that make sense for editing `block` of `appointment`.
///
/// The reservation is offered when it has at most one appointment or the
/// action may include it. A series is offered for a recurring appointment
/// next to others. A single occurrence is offered when the series keeps
/// occurrences after dropping this one or when there are other appointments.
pub fn scope_options(
    reservation: &Reservation,
    appointment: &Appointment,
    block: &AppointmentBlock,
    include_event: bool,
) -> Vec<Scope> {
    let count = reservation.appointments().len();
    let mut options = Vec::new();
    if count <= 1 || include_event {
        options.push(Scope::Reservation);
    }
    if appointment.is_repeating() && count > 1 {
        options.push(Scope::Series);
    }
    if (appointment.is_repeating() && keeps_occurrences(appointment, &[block.start])) || count > 1 {
        options.push(Scope::Single);
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use slotbook_core::{Repeating, RepeatingType};

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn weekly(count: u32) -> Appointment {
        let mut app = Appointment::new(at(1, 9), at(1, 10));
        app.set_repeating(Some(Repeating::with_number(RepeatingType::Weekly, count)));
        app
    }

    #[test]
    fn single_plain_appointment_has_one_option() {
        let mut reservation = Reservation::new("Lunch");
        reservation.add_appointment(Appointment::new(at(1, 12), at(1, 13)));
        let app = reservation.appointments()[0].clone();
        let block = AppointmentBlock::first_of(&app);
        assert_eq!(scope_options(&reservation, &app, &block, false), vec![Scope::Reservation]);
        assert_eq!(scope_options(&reservation, &app, &block, true), vec![Scope::Reservation]);
    }

    #[test]
    fn lone_series_offers_reservation_and_single() {
        let mut reservation = Reservation::new("Course");
        reservation.add_appointment(weekly(4));
        let app = reservation.appointments()[0].clone();
        let block = AppointmentBlock::first_of(&app);
        assert_eq!(
            scope_options(&reservation, &app, &block, true),
            vec![Scope::Reservation, Scope::Single]
        );
    }

    #[test]
    fn series_next_to_others_offers_all() {
        let mut reservation = Reservation::new("Course");
        reservation.add_appointment(weekly(4));
        reservation.add_appointment(Appointment::new(at(2, 9), at(2, 10)));
        let app = reservation.appointments()[0].clone();
        let block = AppointmentBlock::first_of(&app);
        assert_eq!(
            scope_options(&reservation, &app, &block, true),
            vec![Scope::Reservation, Scope::Series, Scope::Single]
        );
        assert_eq!(
            scope_options(&reservation, &app, &block, false),
            vec![Scope::Series, Scope::Single]
        );
    }

    #[test]
    fn last_occurrence_of_lone_series_is_not_single() {
        let mut app = weekly(2);
        if let Some(repeating) = app.repeating_mut() {
            repeating.add_exception(at(8, 0));
        }
        let mut reservation = Reservation::new("Course");
        reservation.add_appointment(app);
        let app = reservation.appointments()[0].clone();
        let block = AppointmentBlock::first_of(&app);
        assert_eq!(scope_options(&reservation, &app, &block, true), vec![Scope::Reservation]);
    }
}

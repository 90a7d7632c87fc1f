use serde::{Deserialize, Serialize};
use slotbook_core::{Appointment, EntityId, Reservation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyType {
    CopyBlock,
    CutBlock,
    CopyReservation,
    CutReservation,
}

impl CopyType {
    pub fn is_whole_reservation(&self) -> bool {
        matches!(self, Self::CopyReservation | Self::CutReservation)
    }
}

/// One appointment on the clipboard together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardAppointment {
    pub appointment: Appointment,
    /// Source reservation, or its clone when the whole reservation was copied.
    pub reservation: Reservation,
    pub copy_type: CopyType,
    /// Allocatables restricted to the source appointment.
    pub restricted_allocatables: Vec<EntityId>,
}

/// Holds either cloned reservations or a single appointment, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clipboard {
    reservations: Vec<Reservation>,
    appointment: Option<ClipboardAppointment>,
    context_allocatables: Vec<EntityId>,
}

impl Clipboard {
    pub fn set_reservations(&mut self, reservations: Vec<Reservation>, context: Vec<EntityId>) {
        self.appointment = None;
        self.reservations = reservations;
        self.context_allocatables = context;
    }

    pub fn set_appointment(&mut self, appointment: ClipboardAppointment, context: Vec<EntityId>) {
        self.reservations.clear();
        self.appointment = Some(appointment);
        self.context_allocatables = context;
    }

    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    pub fn appointment(&self) -> Option<&ClipboardAppointment> {
        self.appointment.as_ref()
    }

    /// Allocatables marked in the calendar when the content was copied.
    pub fn context_allocatables(&self) -> &[EntityId] {
        &self.context_allocatables
    }

    pub fn has_content(&self) -> bool {
        self.appointment.is_some() || !self.reservations.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

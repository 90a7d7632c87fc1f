use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, EntityKind, Reference};
use crate::repeating::Repeating;
use crate::time::Timestamp;

/// One concrete occurrence of an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentBlock {
    pub appointment: EntityId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl AppointmentBlock {
    /// The first occurrence of `appointment`.
    pub fn first_of(appointment: &Appointment) -> Self {
        Self {
            appointment: appointment.id().clone(),
            start: appointment.start(),
            end: appointment.end(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    id: EntityId,
    reservation: Option<Reference>,
    start: NaiveDateTime,
    end: NaiveDateTime,
    repeating: Option<Repeating>,
    last_changed: Option<Timestamp>,
}

impl Appointment {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::with_id(EntityId::new(), start, end)
    }

    pub fn with_id(id: EntityId, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            id,
            reservation: None,
            start,
            end,
            repeating: None,
            last_changed: None,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn reference(&self) -> Reference {
        Reference::new(self.id.clone(), EntityKind::Appointment)
    }

    /// Back-reference to the owning reservation.
    pub fn reservation(&self) -> Option<&Reference> {
        self.reservation.as_ref()
    }

    pub(crate) fn set_reservation(&mut self, reservation: Option<Reference>) {
        self.reservation = reservation;
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn last_changed(&self) -> Option<Timestamp> {
        self.last_changed
    }

    pub fn set_last_changed(&mut self, last_changed: Option<Timestamp>) {
        self.last_changed = last_changed;
    }

    pub fn repeating(&self) -> Option<&Repeating> {
        self.repeating.as_ref()
    }

    pub fn repeating_mut(&mut self) -> Option<&mut Repeating> {
        self.repeating.as_mut()
    }

    /// Replace the recurrence rule; `None` turns this into a single
    /// appointment.
    pub fn set_repeating(&mut self, repeating: Option<Repeating>) {
        self.repeating = repeating;
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating.is_some()
    }

    /// Move to a new start, keeping the duration.
    pub fn move_to(&mut self, start: NaiveDateTime) {
        let duration = self.duration();
        self.start = start;
        self.end = start + duration;
    }

    pub fn move_range(&mut self, start: NaiveDateTime, end: NaiveDateTime) {
        self.start = start;
        self.end = end;
    }

    /// End of the last occurrence. `None` for an unbounded series.
    pub fn max_end(&self) -> Option<NaiveDateTime> {
        match &self.repeating {
            None => Some(self.end),
            Some(repeating) => repeating
                .last_occurrence(self.start)
                .map(|last| last + self.duration()),
        }
    }

    /// Occurrences overlapping `[from, to)`, excepted days left out.
    pub fn create_blocks(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<AppointmentBlock> {
        let duration = self.duration();
        let mut blocks = Vec::new();
        match &self.repeating {
            None => {
                if self.start < to && self.end > from {
                    blocks.push(self.block_at(self.start, duration));
                }
            }
            Some(repeating) => {
                for start in repeating.occurrences(self.start) {
                    if start >= to {
                        break;
                    }
                    if start + duration > from && !repeating.is_exception(start.date()) {
                        blocks.push(self.block_at(start, duration));
                    }
                }
            }
        }
        blocks
    }

    /// Every surviving occurrence of a bounded appointment. `None` for an
    /// unbounded series.
    pub fn all_blocks(&self) -> Option<Vec<AppointmentBlock>> {
        let duration = self.duration();
        match &self.repeating {
            None => Some(vec![self.block_at(self.start, duration)]),
            Some(repeating) if repeating.is_bounded() => Some(
                repeating
                    .occurrences(self.start)
                    .filter(|start| !repeating.is_exception(start.date()))
                    .map(|start| self.block_at(start, duration))
                    .collect(),
            ),
            Some(_) => None,
        }
    }

    /// Copy with a fresh id, detached from any reservation.
    pub fn with_new_id(&self) -> Appointment {
        Appointment {
            id: EntityId::new(),
            reservation: None,
            start: self.start,
            end: self.end,
            repeating: self.repeating.clone(),
            last_changed: None,
        }
    }

    fn block_at(&self, start: NaiveDateTime, duration: Duration) -> AppointmentBlock {
        AppointmentBlock {
            appointment: self.id.clone(),
            start,
            end: start + duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repeating::RepeatingType;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn move_to_keeps_duration() {
        let mut app = Appointment::new(at(1, 9), at(1, 11));
        app.move_to(at(3, 14));
        assert_eq!(app.start(), at(3, 14));
        assert_eq!(app.end(), at(3, 16));
    }

    #[test]
    fn blocks_skip_exceptions() {
        let mut app = Appointment::new(at(1, 9), at(1, 10));
        let mut repeating = Repeating::with_number(RepeatingType::Daily, 4);
        repeating.add_exception(at(2, 0));
        app.set_repeating(Some(repeating));

        let blocks = app.all_blocks().unwrap();
        let starts: Vec<_> = blocks.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![at(1, 9), at(3, 9), at(4, 9)]);
        assert_eq!(app.max_end(), Some(at(4, 10)));
    }

    #[test]
    fn range_blocks_clip_to_window() {
        let mut app = Appointment::new(at(1, 9), at(1, 10));
        app.set_repeating(Some(Repeating::new(RepeatingType::Daily)));
        let blocks = app.create_blocks(at(5, 0), at(8, 0));
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].start, at(5, 9));
        assert!(app.all_blocks().is_none());
        assert!(app.max_end().is_none());
    }

    #[test]
    fn single_appointment_block() {
        let app = Appointment::new(at(1, 9), at(1, 10));
        assert_eq!(app.create_blocks(at(1, 0), at(2, 0)).len(), 1);
        assert!(app.create_blocks(at(2, 0), at(3, 0)).is_empty());
    }

    #[test]
    fn new_id_copy_is_detached() {
        let app = Appointment::new(at(1, 9), at(1, 10));
        let copy = app.with_new_id();
        assert_ne!(copy.id(), app.id());
        assert!(copy.reservation().is_none());
        assert_eq!(copy.start(), app.start());
    }
}

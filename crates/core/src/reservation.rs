use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::appointment::Appointment;
use crate::ids::{EntityId, EntityKind, Reference};
use crate::time::Timestamp;

/// A booking: owns its appointments and the allocatables bound to them.
///
/// Each allocatable may be restricted to a subset of the appointments. An
/// empty (absent) restriction binds the allocatable to every appointment.
/// Restrictions only ever name appointments owned by this reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    id: EntityId,
    name: String,
    owner: Option<EntityId>,
    last_changed: Option<Timestamp>,
    appointments: Vec<Appointment>,
    allocatables: Vec<EntityId>,
    restrictions: BTreeMap<EntityId, Vec<EntityId>>,
}

impl Reservation {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(EntityId::new(), name)
    }

    pub fn with_id(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner: None,
            last_changed: None,
            appointments: Vec::new(),
            allocatables: Vec::new(),
            restrictions: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn reference(&self) -> Reference {
        Reference::new(self.id.clone(), EntityKind::Reservation)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn owner(&self) -> Option<&EntityId> {
        self.owner.as_ref()
    }

    pub fn set_owner(&mut self, owner: Option<EntityId>) {
        self.owner = owner;
    }

    pub fn last_changed(&self) -> Option<Timestamp> {
        self.last_changed
    }

    pub fn set_last_changed(&mut self, last_changed: Option<Timestamp>) {
        self.last_changed = last_changed;
    }

    // ========================================================================
    // Appointments
    // ========================================================================

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn appointments_mut(&mut self) -> &mut [Appointment] {
        &mut self.appointments
    }

    pub fn appointment_ids(&self) -> Vec<EntityId> {
        self.appointments.iter().map(|a| a.id().clone()).collect()
    }

    /// Append an appointment and point its back-reference at this reservation.
    /// An appointment with the same id is replaced in place.
    pub fn add_appointment(&mut self, mut appointment: Appointment) {
        appointment.set_reservation(Some(self.reference()));
        match self.appointments.iter_mut().find(|a| a.id() == appointment.id()) {
            Some(existing) => *existing = appointment,
            None => self.appointments.push(appointment),
        }
    }

    /// Remove an appointment and strip it from every restriction.
    ///
    /// A restriction left empty is dropped, so an allocatable that was only
    /// booked on the removed appointment becomes booked on all remaining
    /// ones. Callers that need the old booking back must restore it, as the
    /// delete undo does with `set_restriction_for_appointment`.
    pub fn remove_appointment(&mut self, appointment_id: &EntityId) -> Option<Appointment> {
        let index = self.appointments.iter().position(|a| a.id() == appointment_id)?;
        let mut removed = self.appointments.remove(index);
        removed.set_reservation(None);
        for restriction in self.restrictions.values_mut() {
            restriction.retain(|id| id != appointment_id);
        }
        self.restrictions.retain(|_, restriction| !restriction.is_empty());
        Some(removed)
    }

    pub fn find_appointment(&self, appointment_id: &EntityId) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id() == appointment_id)
    }

    pub fn find_appointment_mut(&mut self, appointment_id: &EntityId) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id() == appointment_id)
    }

    pub fn appointment_index(&self, appointment_id: &EntityId) -> Option<usize> {
        self.appointments.iter().position(|a| a.id() == appointment_id)
    }

    /// Earliest appointment start.
    pub fn first_start(&self) -> Option<NaiveDateTime> {
        self.appointments.iter().map(|a| a.start()).min()
    }

    // ========================================================================
    // Allocatables and restrictions
    // ========================================================================

    pub fn allocatables(&self) -> &[EntityId] {
        &self.allocatables
    }

    pub fn has_allocated(&self, allocatable: &EntityId) -> bool {
        self.allocatables.contains(allocatable)
    }

    pub fn add_allocatable(&mut self, allocatable: EntityId) {
        if !self.has_allocated(&allocatable) {
            self.allocatables.push(allocatable);
        }
    }

    pub fn remove_allocatable(&mut self, allocatable: &EntityId) -> bool {
        let before = self.allocatables.len();
        self.allocatables.retain(|a| a != allocatable);
        self.restrictions.remove(allocatable);
        before != self.allocatables.len()
    }

    /// Appointments `allocatable` is restricted to; empty means all of them.
    pub fn restriction(&self, allocatable: &EntityId) -> &[EntityId] {
        self.restrictions
            .get(allocatable)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Restrict an allocated allocatable. Ids of foreign appointments and
    /// duplicates are dropped; an empty list lifts the restriction.
    pub fn set_restriction(&mut self, allocatable: &EntityId, appointments: &[EntityId]) {
        if !self.has_allocated(allocatable) {
            return;
        }
        let mut filtered: Vec<EntityId> = Vec::with_capacity(appointments.len());
        for id in appointments {
            if self.find_appointment(id).is_some() && !filtered.contains(id) {
                filtered.push(id.clone());
            }
        }
        if filtered.is_empty() {
            self.restrictions.remove(allocatable);
        } else {
            self.restrictions.insert(allocatable.clone(), filtered);
        }
    }

    /// Allocatables whose restriction explicitly names `appointment`.
    pub fn restricted_allocatables(&self, appointment: &EntityId) -> Vec<EntityId> {
        self.allocatables
            .iter()
            .filter(|a| self.restriction(a).contains(appointment))
            .cloned()
            .collect()
    }

    /// Allocatables bound to `appointment`, restricted or not.
    pub fn allocatables_for(&self, appointment: &EntityId) -> Vec<EntityId> {
        self.allocatables
            .iter()
            .filter(|a| {
                let restriction = self.restriction(a);
                restriction.is_empty() || restriction.contains(appointment)
            })
            .cloned()
            .collect()
    }

    /// Appointments `allocatable` is bound to.
    pub fn appointments_for(&self, allocatable: &EntityId) -> Vec<EntityId> {
        if !self.has_allocated(allocatable) {
            return Vec::new();
        }
        let restriction = self.restriction(allocatable);
        if restriction.is_empty() {
            self.appointment_ids()
        } else {
            restriction.to_vec()
        }
    }

    /// Add `appointment` to the restriction of each of `allocatables`.
    pub fn set_restriction_for_appointment(
        &mut self,
        appointment: &EntityId,
        allocatables: &[EntityId],
    ) {
        for allocatable in allocatables {
            let mut restriction = self.restriction(allocatable).to_vec();
            restriction.push(appointment.clone());
            self.set_restriction(allocatable, &restriction);
        }
    }

    /// Snapshot of every allocatable's restriction.
    pub fn restriction_snapshot(&self) -> BTreeMap<EntityId, Vec<EntityId>> {
        self.allocatables
            .iter()
            .map(|a| (a.clone(), self.restriction(a).to_vec()))
            .collect()
    }

    /// Order-independent form for structural comparison: appointments,
    /// allocatables and restrictions sorted by id, change stamps dropped.
    pub fn normalized(&self) -> Reservation {
        let mut copy = self.clone();
        copy.last_changed = None;
        copy.appointments.sort_by(|a, b| a.id().cmp(b.id()));
        for appointment in &mut copy.appointments {
            appointment.set_last_changed(None);
        }
        copy.allocatables.sort();
        for restriction in copy.restrictions.values_mut() {
            restriction.sort();
        }
        copy
    }

    /// Deep copy with fresh ids for the reservation and every appointment.
    /// Restrictions follow the renamed appointments; the last-changed stamp
    /// is cleared so the copy counts as new.
    pub fn with_new_ids(&self, owner: Option<EntityId>) -> Reservation {
        let mut copy = Reservation::new(self.name.clone());
        copy.owner = owner;
        let mut renamed = BTreeMap::new();
        for appointment in &self.appointments {
            let fresh = appointment.with_new_id();
            renamed.insert(appointment.id().clone(), fresh.id().clone());
            copy.add_appointment(fresh);
        }
        for allocatable in &self.allocatables {
            copy.add_allocatable(allocatable.clone());
            let restriction: Vec<EntityId> = self
                .restriction(allocatable)
                .iter()
                .filter_map(|id| renamed.get(id).cloned())
                .collect();
            copy.set_restriction(allocatable, &restriction);
        }
        copy
    }
}

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{EntityId, EntityKind, Reference};
use crate::time::Timestamp;

/// Two appointments competing for the same allocatable.
///
/// Derived from reservations rather than edited directly. Each side can be
/// disabled independently; the cache keeps the disable state and a
/// last-changed overlay and merges them in on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: EntityId,
    pub allocatable: Reference,
    pub appointment1: Reference,
    pub appointment2: Reference,
    pub reservation1: Reference,
    pub reservation2: Reference,
    pub appointment1_enabled: bool,
    pub appointment2_enabled: bool,
    pub appointment1_editable: bool,
    pub appointment2_editable: bool,
    pub last_changed: Option<Timestamp>,
}

impl Conflict {
    pub fn new(
        allocatable: EntityId,
        appointment1: EntityId,
        reservation1: EntityId,
        appointment2: EntityId,
        reservation2: EntityId,
    ) -> Self {
        Self {
            id: Self::id_for(&allocatable, &appointment1, &appointment2),
            allocatable: Reference::new(allocatable, EntityKind::Allocatable),
            appointment1: Reference::new(appointment1, EntityKind::Appointment),
            appointment2: Reference::new(appointment2, EntityKind::Appointment),
            reservation1: Reference::new(reservation1, EntityKind::Reservation),
            reservation2: Reference::new(reservation2, EntityKind::Reservation),
            appointment1_enabled: true,
            appointment2_enabled: true,
            appointment1_editable: false,
            appointment2_editable: false,
            last_changed: None,
        }
    }

    pub fn id_for(allocatable: &EntityId, appointment1: &EntityId, appointment2: &EntityId) -> EntityId {
        EntityId::from_string(format!("{allocatable};{appointment1};{appointment2}"))
    }

    /// Rebuild a conflict from its id alone. Reservation references are left
    /// empty since the id does not carry them.
    pub fn from_id(id: &EntityId) -> Result<Self, CoreError> {
        let parts: Vec<&str> = id.as_str().split(';').collect();
        let [allocatable, appointment1, appointment2] = parts.as_slice() else {
            return Err(CoreError::InvalidData(format!("malformed conflict id: {id}")));
        };
        Ok(Self::new(
            EntityId::from(*allocatable),
            EntityId::from(*appointment1),
            EntityId::from(""),
            EntityId::from(*appointment2),
            EntityId::from(""),
        ))
    }

    pub fn is_enabled(&self) -> bool {
        self.appointment1_enabled && self.appointment2_enabled
    }

    pub fn involves(&self, appointment: &EntityId) -> bool {
        self.appointment1.is_reference_of(appointment) || self.appointment2.is_reference_of(appointment)
    }
}

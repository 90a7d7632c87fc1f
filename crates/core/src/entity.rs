use serde::{Deserialize, Serialize};

use crate::appointment::Appointment;
use crate::conflict::Conflict;
use crate::error::CoreError;
use crate::ids::{EntityId, EntityKind, Reference};
use crate::reservation::Reservation;
use crate::resources::{Allocatable, Category, DynamicType, Preferences, User};
use crate::time::Timestamp;

/// Every kind of object the cache can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Category(Category),
    User(User),
    DynamicType(DynamicType),
    Allocatable(Allocatable),
    Reservation(Reservation),
    Appointment(Appointment),
    Preferences(Preferences),
    Conflict(Conflict),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Category(c) => &c.id,
            Self::User(u) => &u.id,
            Self::DynamicType(t) => &t.id,
            Self::Allocatable(a) => &a.id,
            Self::Reservation(r) => r.id(),
            Self::Appointment(a) => a.id(),
            Self::Preferences(p) => &p.id,
            Self::Conflict(c) => &c.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Category(_) => EntityKind::Category,
            Self::User(_) => EntityKind::User,
            Self::DynamicType(_) => EntityKind::DynamicType,
            Self::Allocatable(_) => EntityKind::Allocatable,
            Self::Reservation(_) => EntityKind::Reservation,
            Self::Appointment(_) => EntityKind::Appointment,
            Self::Preferences(_) => EntityKind::Preferences,
            Self::Conflict(_) => EntityKind::Conflict,
        }
    }

    pub fn reference(&self) -> Reference {
        Reference::new(self.id().clone(), self.kind())
    }

    pub fn last_changed(&self) -> Option<Timestamp> {
        match self {
            Self::Category(c) => c.last_changed,
            Self::User(u) => u.last_changed,
            Self::DynamicType(t) => t.last_changed,
            Self::Allocatable(a) => a.last_changed,
            Self::Reservation(r) => r.last_changed(),
            Self::Appointment(a) => a.last_changed(),
            Self::Preferences(p) => p.last_changed,
            Self::Conflict(c) => c.last_changed,
        }
    }

    pub fn set_last_changed(&mut self, at: Option<Timestamp>) {
        match self {
            Self::Category(c) => c.last_changed = at,
            Self::User(u) => u.last_changed = at,
            Self::DynamicType(t) => t.last_changed = at,
            Self::Allocatable(a) => a.last_changed = at,
            Self::Reservation(r) => r.set_last_changed(at),
            Self::Appointment(a) => a.set_last_changed(at),
            Self::Preferences(p) => p.last_changed = at,
            Self::Conflict(c) => c.last_changed = at,
        }
    }

    /// Owned children that live in the cache next to their parent.
    pub fn sub_entities(&self) -> Vec<Entity> {
        match self {
            Self::Reservation(r) => r
                .appointments()
                .iter()
                .cloned()
                .map(Entity::Appointment)
                .collect(),
            Self::Category(c) => c.children.iter().cloned().map(Entity::Category).collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_reservation(&self) -> Option<&Reservation> {
        match self {
            Self::Reservation(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_reservation(self) -> Option<Reservation> {
        match self {
            Self::Reservation(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_appointment(&self) -> Option<&Appointment> {
        match self {
            Self::Appointment(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_allocatable(&self) -> Option<&Allocatable> {
        match self {
            Self::Allocatable(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_dynamic_type(&self) -> Option<&DynamicType> {
        match self {
            Self::DynamicType(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&Category> {
        match self {
            Self::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_preferences(&self) -> Option<&Preferences> {
        match self {
            Self::Preferences(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_conflict(&self) -> Option<&Conflict> {
        match self {
            Self::Conflict(c) => Some(c),
            _ => None,
        }
    }

    /// Serialize to MessagePack bytes.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

macro_rules! entity_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(value)
                }
            }
        )*
    };
}

entity_from!(
    Category,
    User,
    DynamicType,
    Allocatable,
    Reservation,
    Appointment,
    Preferences,
    Conflict,
);

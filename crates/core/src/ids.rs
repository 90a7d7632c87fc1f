use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

/// Well-known id of the root category every cache starts with.
pub const SUPER_CATEGORY_ID: &str = "category_0";

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh, time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(8).collect();
        write!(f, "EntityId({short})")
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Category,
    User,
    DynamicType,
    Allocatable,
    Reservation,
    Appointment,
    Preferences,
    Conflict,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::User => "user",
            Self::DynamicType => "dynamictype",
            Self::Allocatable => "allocatable",
            Self::Reservation => "reservation",
            Self::Appointment => "appointment",
            Self::Preferences => "preferences",
            Self::Conflict => "conflict",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "category" => Ok(Self::Category),
            "user" => Ok(Self::User),
            "dynamictype" => Ok(Self::DynamicType),
            "allocatable" => Ok(Self::Allocatable),
            "reservation" => Ok(Self::Reservation),
            "appointment" => Ok(Self::Appointment),
            "preferences" => Ok(Self::Preferences),
            "conflict" => Ok(Self::Conflict),
            _ => Err(CoreError::InvalidData(format!("unknown entity kind: {s}"))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed identity handle. Holds no pointer to the referent; resolve it
/// against the cache to get the current state.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    id: EntityId,
    kind: EntityKind,
}

impl Reference {
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Self { id, kind }
    }

    pub fn reservation(id: EntityId) -> Self {
        Self::new(id, EntityKind::Reservation)
    }

    pub fn appointment(id: EntityId) -> Self {
        Self::new(id, EntityKind::Appointment)
    }

    pub fn allocatable(id: EntityId) -> Self {
        Self::new(id, EntityKind::Allocatable)
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_reference_of(&self, id: &EntityId) -> bool {
        &self.id == id
    }
}

impl Ord for Reference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id).then(self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({}:{:?})", self.kind, self.id)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

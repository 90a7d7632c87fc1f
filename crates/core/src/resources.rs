use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, SUPER_CATEGORY_ID};
use crate::time::Timestamp;

/// A bookable resource such as a room or a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocatable {
    pub id: EntityId,
    pub name: String,
    pub owner: Option<EntityId>,
    /// Users allowed to see this resource. Empty means everyone.
    pub readers: BTreeSet<EntityId>,
    pub last_changed: Option<Timestamp>,
}

impl Allocatable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            owner: None,
            readers: BTreeSet::new(),
            last_changed: None,
        }
    }

    pub fn with_id(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            ..Self::new(name)
        }
    }

    pub fn is_public(&self) -> bool {
        self.readers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub username: String,
    pub name: String,
    pub admin: bool,
    pub last_changed: Option<Timestamp>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: EntityId::new(),
            name: username.clone(),
            username,
            admin: false,
            last_changed: None,
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            admin: true,
            ..Self::new(username)
        }
    }
}

/// Classification schema for allocatables and reservations, looked up by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicType {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub last_changed: Option<Timestamp>,
}

impl DynamicType {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            key: key.into(),
            name: name.into(),
            last_changed: None,
        }
    }
}

/// Node of the category tree. Children are owned and cached alongside the
/// parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub children: Vec<Category>,
    pub last_changed: Option<Timestamp>,
}

impl Category {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            key: key.into(),
            name: name.into(),
            children: Vec::new(),
            last_changed: None,
        }
    }

    /// The root of the tree with its well-known id.
    pub fn super_category() -> Self {
        Self {
            id: EntityId::from(SUPER_CATEGORY_ID),
            key: "supercategory".into(),
            name: "Super Category".into(),
            children: Vec::new(),
            last_changed: None,
        }
    }

    pub fn add_child(&mut self, child: Category) {
        self.children.retain(|c| c.id != child.id);
        self.children.push(child);
    }
}

/// Key/value settings, either system wide (`owner == None`) or per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub id: EntityId,
    pub owner: Option<EntityId>,
    pub entries: BTreeMap<String, String>,
    pub last_changed: Option<Timestamp>,
}

impl Preferences {
    pub fn new(owner: Option<EntityId>) -> Self {
        Self {
            id: Self::id_for(owner.as_ref()),
            owner,
            entries: BTreeMap::new(),
            last_changed: None,
        }
    }

    /// Preferences ids are derived from the owner so they can be looked up
    /// without an index.
    pub fn id_for(owner: Option<&EntityId>) -> EntityId {
        match owner {
            None => EntityId::from("preferences"),
            Some(user) => EntityId::from_string(format!("preferences_{user}")),
        }
    }

    pub fn is_system(&self) -> bool {
        self.owner.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

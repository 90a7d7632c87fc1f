use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use slotbook_core::time::{self, Timestamp};
use slotbook_core::{
    Allocatable, Category, Conflict, DynamicType, Entity, EntityId, EntityKind, Preferences,
    Reservation, SUPER_CATEGORY_ID, User,
};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::permission::{DefaultPermissions, PermissionController};

/// Kinds that get their own typed index next to the id map.
const INDEXED_KINDS: [EntityKind; 4] = [
    EntityKind::Reservation,
    EntityKind::Allocatable,
    EntityKind::DynamicType,
    EntityKind::User,
];

/// In-memory store of every known entity, keyed by id.
///
/// Parents (reservations, categories) are stored together with their
/// children, which are also reachable on their own by id. Conflicts are not
/// indexed; their per-side disable state and last-changed overlay are kept in
/// side tables and merged back in by [`LocalCache::fill_conflict_disable_information`].
pub struct LocalCache {
    entities: HashMap<EntityId, Entity>,
    typed: BTreeMap<EntityKind, BTreeSet<EntityId>>,
    disabled_conflict_app1: HashSet<EntityId>,
    disabled_conflict_app2: HashSet<EntityId>,
    conflict_last_changed: HashMap<EntityId, Timestamp>,
    client_user_id: Option<EntityId>,
    permissions: Box<dyn PermissionController>,
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new(Box::new(DefaultPermissions))
    }
}

impl LocalCache {
    pub fn new(permissions: Box<dyn PermissionController>) -> Self {
        let mut cache = Self {
            entities: HashMap::new(),
            typed: BTreeMap::new(),
            disabled_conflict_app1: HashSet::new(),
            disabled_conflict_app2: HashSet::new(),
            conflict_last_changed: HashMap::new(),
            client_user_id: None,
            permissions,
        };
        cache.init_super_category();
        cache
    }

    pub fn client_user_id(&self) -> Option<&EntityId> {
        self.client_user_id.as_ref()
    }

    /// Switch the cache into client-local mode for the given user.
    pub fn set_client_user_id(&mut self, user_id: Option<EntityId>) {
        self.client_user_id = user_id;
    }

    pub fn permissions(&self) -> &dyn PermissionController {
        self.permissions.as_ref()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert or replace an entity together with its children.
    pub fn put(&mut self, entity: Entity) -> Result<(), CacheError> {
        let id = entity.id().clone();
        if id.is_empty() {
            return Err(CacheError::EmptyId);
        }
        let kind = entity.kind();

        if let Some(client) = &self.client_user_id {
            match &entity {
                Entity::Reservation(_) | Entity::Appointment(_) => {
                    return Err(CacheError::IllegalLocalState(format!(
                        "can't store {kind} {id} in client cache"
                    )));
                }
                Entity::Conflict(_) => {
                    debug!(conflict = %id, "client cache ignores conflict");
                    return Ok(());
                }
                Entity::Preferences(p) => {
                    if let Some(owner) = &p.owner
                        && owner != client
                    {
                        return Err(CacheError::IllegalLocalState(format!(
                            "can't store preferences of user {owner} in client cache"
                        )));
                    }
                }
                _ => {}
            }
        }

        let new_children = entity.sub_entities();
        if let Some(old) = self.entities.get(&id) {
            let keep: HashSet<&EntityId> = new_children.iter().map(Entity::id).collect();
            let stale: Vec<Entity> = old
                .sub_entities()
                .into_iter()
                .filter(|child| !keep.contains(child.id()))
                .collect();
            for child in &stale {
                self.remove(child);
            }
        }

        if let Entity::Conflict(conflict) = &entity {
            self.track_conflict(conflict);
        }
        if INDEXED_KINDS.contains(&kind) {
            self.typed.entry(kind).or_default().insert(id.clone());
        }
        if !new_children.is_empty() {
            debug!(%kind, %id, children = new_children.len(), "put parent");
        }
        self.entities.insert(id, entity);

        for child in new_children {
            self.put(child)?;
        }
        Ok(())
    }

    pub fn put_all(&mut self, entities: impl IntoIterator<Item = Entity>) -> Result<(), CacheError> {
        for entity in entities {
            self.put(entity)?;
        }
        Ok(())
    }

    fn track_conflict(&mut self, conflict: &Conflict) {
        let id = &conflict.id;
        if conflict.appointment1_enabled {
            self.disabled_conflict_app1.remove(id);
        } else {
            self.disabled_conflict_app1.insert(id.clone());
        }
        if conflict.appointment2_enabled {
            self.disabled_conflict_app2.remove(id);
        } else {
            self.disabled_conflict_app2.insert(id.clone());
        }
        if conflict.is_enabled() {
            self.conflict_last_changed.remove(id);
        } else {
            let stamp = conflict.last_changed.unwrap_or_else(time::now);
            self.conflict_last_changed.insert(id.clone(), stamp);
        }
    }

    /// Remove an entity and, first, all of its children. Returns whether the
    /// entity itself was present.
    pub fn remove(&mut self, entity: &Entity) -> bool {
        let children = entity.sub_entities();
        if !children.is_empty() {
            debug!(kind = %entity.kind(), id = %entity.id(), children = children.len(), "remove parent");
        }
        for child in &children {
            self.remove(child);
        }
        self.remove_with_id(entity.kind(), entity.id())
    }

    /// Remove a single entry. Children are left in place.
    pub fn remove_with_id(&mut self, kind: EntityKind, id: &EntityId) -> bool {
        let removed = self.entities.remove(id).is_some();
        if let Some(index) = self.typed.get_mut(&kind) {
            index.remove(id);
        } else if kind == EntityKind::Conflict {
            self.disabled_conflict_app1.remove(id);
            self.disabled_conflict_app2.remove(id);
        }
        removed
    }

    /// Drop everything and start over with an empty root category.
    pub fn clear_all(&mut self) {
        self.entities.clear();
        self.typed.clear();
        self.disabled_conflict_app1.clear();
        self.disabled_conflict_app2.clear();
        self.conflict_last_changed.clear();
        self.init_super_category();
    }

    fn init_super_category(&mut self) {
        let root = Category::super_category();
        self.entities.insert(root.id.clone(), Entity::Category(root));
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Entity with `id`, optionally required to be of `kind`. A kind
    /// mismatch counts as not found.
    pub fn resolve(&self, id: &EntityId, kind: Option<EntityKind>) -> Result<&Entity, CacheError> {
        self.try_resolve(id, kind)
            .ok_or_else(|| CacheError::not_found(kind, id.as_str()))
    }

    pub fn try_resolve(&self, id: &EntityId, kind: Option<EntityKind>) -> Option<&Entity> {
        let entity = self.entities.get(id)?;
        match kind {
            Some(kind) if entity.kind() != kind => None,
            _ => Some(entity),
        }
    }

    pub fn resolve_reservation(&self, id: &EntityId) -> Result<&Reservation, CacheError> {
        self.try_resolve_reservation(id)
            .ok_or_else(|| CacheError::not_found(Some(EntityKind::Reservation), id.as_str()))
    }

    pub fn try_resolve_reservation(&self, id: &EntityId) -> Option<&Reservation> {
        self.entities.get(id).and_then(Entity::as_reservation)
    }

    pub fn resolve_allocatable(&self, id: &EntityId) -> Result<&Allocatable, CacheError> {
        self.entities
            .get(id)
            .and_then(Entity::as_allocatable)
            .ok_or_else(|| CacheError::not_found(Some(EntityKind::Allocatable), id.as_str()))
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn super_category(&self) -> Option<&Category> {
        self.entities
            .get(&EntityId::from(SUPER_CATEGORY_ID))
            .and_then(Entity::as_category)
    }

    /// User by login name. An exact match wins over a case-insensitive one.
    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        let users: Vec<&User> = self.users().collect();
        users
            .iter()
            .find(|u| u.username == username)
            .or_else(|| users.iter().find(|u| u.username.eq_ignore_ascii_case(username)))
            .copied()
    }

    pub fn dynamic_type_by_key(&self, key: &str) -> Option<&DynamicType> {
        self.dynamic_types().find(|t| t.key == key)
    }

    /// System preferences for `None`, otherwise the user's own.
    pub fn preferences_for_user(&self, user_id: Option<&EntityId>) -> Option<&Preferences> {
        self.entities
            .get(&Preferences::id_for(user_id))
            .and_then(Entity::as_preferences)
    }

    /// Everything a client session for `user` gets to see: the root
    /// category, all dynamic types and users, the readable allocatables and
    /// the system and user preferences.
    pub fn visible_entities(&self, user: Option<&User>) -> Vec<Entity> {
        let mut result = Vec::new();
        if let Some(root) = self.super_category() {
            result.push(Entity::Category(root.clone()));
        }
        result.extend(self.dynamic_types().cloned().map(Entity::DynamicType));
        result.extend(self.users().cloned().map(Entity::User));
        for allocatable in self.allocatables() {
            let readable = match user {
                None => true,
                Some(user) => user.admin || self.permissions.can_read(allocatable, user),
            };
            if readable {
                result.push(Entity::Allocatable(allocatable.clone()));
            }
        }
        if let Some(system) = self.preferences_for_user(None) {
            result.push(Entity::Preferences(system.clone()));
        }
        if let Some(user) = user
            && let Some(own) = self.preferences_for_user(Some(&user.id))
        {
            result.push(Entity::Preferences(own.clone()));
        }
        result
    }

    fn typed_iter(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.typed
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entities.get(id))
    }

    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.typed_iter(EntityKind::Reservation)
            .filter_map(Entity::as_reservation)
    }

    pub fn allocatables(&self) -> impl Iterator<Item = &Allocatable> {
        self.typed_iter(EntityKind::Allocatable)
            .filter_map(Entity::as_allocatable)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.typed_iter(EntityKind::User).filter_map(Entity::as_user)
    }

    pub fn dynamic_types(&self) -> impl Iterator<Item = &DynamicType> {
        self.typed_iter(EntityKind::DynamicType)
            .filter_map(Entity::as_dynamic_type)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // ========================================================================
    // Conflicts
    // ========================================================================

    /// Copy of `conflict` with the cached disable state merged in.
    ///
    /// The last-changed stamp is the later of the conflict's own stamp and
    /// the cached overlay, or now if neither exists. Editability is only
    /// computed when a user is given and is false for a side whose
    /// reservation no longer resolves.
    pub fn fill_conflict_disable_information(
        &self,
        user: Option<&User>,
        conflict: &Conflict,
    ) -> Conflict {
        let mut filled = conflict.clone();
        let id = &filled.id;
        filled.appointment1_enabled = !self.disabled_conflict_app1.contains(id);
        filled.appointment2_enabled = !self.disabled_conflict_app2.contains(id);

        let overlay = self.conflict_last_changed.get(id).copied();
        let last_changed = match (filled.last_changed, overlay) {
            (Some(own), Some(cached)) => Some(own.max(cached)),
            (own, cached) => own.or(cached),
        };
        filled.last_changed = Some(last_changed.unwrap_or_else(time::now));

        if let Some(user) = user {
            filled.appointment1_editable = self.side_editable(&filled.reservation1, user);
            filled.appointment2_editable = self.side_editable(&filled.reservation2, user);
        }
        filled
    }

    fn side_editable(&self, reservation: &slotbook_core::Reference, user: &User) -> bool {
        self.try_resolve_reservation(reservation.id())
            .is_some_and(|r| self.permissions.can_modify(r, user))
    }

    /// Ids of every conflict with at least one disabled side.
    pub fn conflict_ids(&self) -> BTreeSet<EntityId> {
        self.disabled_conflict_app1
            .iter()
            .chain(&self.disabled_conflict_app2)
            .cloned()
            .collect()
    }

    /// Conflicts with a disabled side, rebuilt from the side tables.
    pub fn disabled_conflicts(&self) -> Vec<Conflict> {
        let mut result = Vec::new();
        for id in self.conflict_ids() {
            let base = match self.entities.get(&id).and_then(Entity::as_conflict) {
                Some(conflict) => conflict.clone(),
                None => match Conflict::from_id(&id) {
                    Ok(conflict) => conflict,
                    Err(e) => {
                        warn!(conflict = %id, error = %e, "skipping unparsable conflict id");
                        continue;
                    }
                },
            };
            result.push(self.fill_conflict_disable_information(None, &base));
        }
        result
    }

    pub fn has_conflict_overlay(&self, id: &EntityId) -> bool {
        self.conflict_last_changed.contains_key(id)
    }

    // ========================================================================
    // Digest
    // ========================================================================

    /// BLAKE3 digest of the structural content of the cache. Entities are
    /// hashed in id order with change stamps cleared, so two caches holding
    /// the same graph hash equal regardless of history.
    pub fn state_digest(&self) -> Result<[u8; 32], CacheError> {
        let mut ids: Vec<&EntityId> = self.entities.keys().collect();
        ids.sort();
        let mut hasher = blake3::Hasher::new();
        for id in ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            let mut normalized = match entity {
                Entity::Reservation(r) => Entity::Reservation(r.normalized()),
                other => other.clone(),
            };
            normalized.set_last_changed(None);
            hasher.update(&normalized.to_msgpack()?);
        }
        for set in [&self.disabled_conflict_app1, &self.disabled_conflict_app2] {
            let mut disabled: Vec<&EntityId> = set.iter().collect();
            disabled.sort();
            for id in disabled {
                hasher.update(id.as_str().as_bytes());
            }
            hasher.update(b"|");
        }
        Ok(*hasher.finalize().as_bytes())
    }
}

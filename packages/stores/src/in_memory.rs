//! In-memory store.
//!
//! Entities live in a `BTreeMap` keyed by entity key, so prefix scans are a
//! range walk. Transactions snapshot the map and restore it on rollback.

use std::collections::BTreeMap;
use std::ops::Bound;

use flatstruct_core_store::{Entity, EntityId, Store, StoreError};

#[derive(Clone, Debug)]
struct Snapshot {
    entries: BTreeMap<String, Entity>,
    next_id: EntityId,
}

/// An in-memory [`Store`].
///
/// # Example
///
/// ```rust
/// use flatstruct_stores::InMemoryStore;
/// use flatstruct_core_store::{Entity, Store};
///
/// let mut store = InMemoryStore::new();
/// store.upsert_entity(Entity::new("name", Some("Alice".to_string()))).unwrap();
///
/// let entity = store.get_entity("name").unwrap().unwrap();
/// assert_eq!(entity.value.as_deref(), Some("Alice"));
/// assert!(entity.id.is_some());
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    entries: BTreeMap<String, Entity>,
    next_id: EntityId,
    snapshot: Option<Snapshot>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
            snapshot: None,
        }
    }

    /// Create a store with initial `(key, value)` rows.
    pub fn with_entries<K, V>(rows: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Option<String>>,
    {
        let mut store = Self::new();
        for (key, value) in rows {
            store.insert(Entity::new(key, value.into()));
        }
        store
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over every entity in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entries.values()
    }

    /// True while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn insert(&mut self, mut entity: Entity) {
        match self.entries.get(&entity.key) {
            Some(existing) => entity.id = existing.id,
            None => {
                entity.id = Some(self.next_id);
                self.next_id += 1;
            }
        }
        self.entries.insert(entity.key.clone(), entity);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn get_entity(&self, key: &str) -> Result<Option<Entity>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn get_entities(&self, prefix: &str) -> Result<Vec<Entity>, StoreError> {
        Ok(self
            .entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, entity)| entity.clone())
            .collect())
    }

    fn upsert_entity(&mut self, entity: Entity) -> Result<(), StoreError> {
        tracing::trace!(key = %entity.key, "upsert");
        self.insert(entity);
        Ok(())
    }

    fn delete_entity(&mut self, entity: &Entity) -> Result<bool, StoreError> {
        tracing::trace!(key = %entity.key, "delete");
        Ok(self.entries.remove(&entity.key).is_some())
    }

    fn begin_transaction(&mut self) -> Result<(), StoreError> {
        if self.snapshot.is_some() {
            return Err(StoreError::TransactionActive);
        }
        self.snapshot = Some(Snapshot {
            entries: self.entries.clone(),
            next_id: self.next_id,
        });
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), StoreError> {
        self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), StoreError> {
        let snapshot = self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        self.entries = snapshot.entries;
        self.next_id = snapshot.next_id;
        Ok(())
    }

    fn save_changes(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn basic_upsert_get() {
        let mut store = InMemoryStore::new();
        store.upsert_entity(Entity::new("foo", value("bar"))).unwrap();

        let entity = store.get_entity("foo").unwrap().unwrap();
        assert_eq!(entity.value, value("bar"));
        assert_eq!(entity.id, Some(1));
    }

    #[test]
    fn read_nonexistent_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.get_entity("nonexistent").unwrap().is_none());
    }

    #[test]
    fn overwrite_keeps_identity() {
        let mut store = InMemoryStore::new();
        store.upsert_entity(Entity::new("k", value("first"))).unwrap();
        store.upsert_entity(Entity::new("k", value("second"))).unwrap();

        let entity = store.get_entity("k").unwrap().unwrap();
        assert_eq!(entity.value, value("second"));
        assert_eq!(entity.id, Some(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn prefix_scan_is_exact() {
        let store = InMemoryStore::with_entries([
            ("a[0]", value("x")),
            ("a[1].b", value("y")),
            ("ab[0]", value("z")),
            ("a", None),
            ("b[0]", value("w")),
        ]);

        let keys: Vec<String> = store
            .get_entities("a[")
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["a[0]", "a[1].b"]);
    }

    #[test]
    fn prefix_scan_edges() {
        let store = InMemoryStore::with_entries([("m", value("1")), ("m.x", value("2"))]);

        assert_eq!(store.get_entities("").unwrap().len(), 2);
        assert_eq!(store.get_entities("m").unwrap().len(), 2);
        assert!(store.get_entities("m.y").unwrap().is_empty());
        assert!(store.get_entities("z").unwrap().is_empty());
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let mut store = InMemoryStore::with_entries([("k", value("v"))]);
        let entity = store.get_entity("k").unwrap().unwrap();

        assert!(store.delete_entity(&entity).unwrap());
        assert!(!store.delete_entity(&entity).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn rollback_restores_entries_and_ids() {
        let mut store = InMemoryStore::with_entries([("keep", value("1"))]);

        store.begin_transaction().unwrap();
        store.upsert_entity(Entity::new("new", value("2"))).unwrap();
        let keep = store.get_entity("keep").unwrap().unwrap();
        store.delete_entity(&keep).unwrap();
        store.rollback_transaction().unwrap();

        assert!(store.get_entity("new").unwrap().is_none());
        assert!(store.get_entity("keep").unwrap().is_some());

        store.upsert_entity(Entity::new("later", value("3"))).unwrap();
        assert_eq!(store.get_entity("later").unwrap().unwrap().id, Some(2));
    }

    #[test]
    fn transactions_do_not_nest() {
        let mut store = InMemoryStore::new();
        store.begin_transaction().unwrap();
        assert!(matches!(
            store.begin_transaction(),
            Err(StoreError::TransactionActive)
        ));
        store.commit_transaction().unwrap();
        assert!(matches!(
            store.commit_transaction(),
            Err(StoreError::NoTransaction)
        ));
    }

    #[test]
    fn guard_commits() {
        let mut store = InMemoryStore::new();
        let mut tx = store.transaction().unwrap();
        tx.upsert_entity(Entity::new("k", None)).unwrap();
        tx.commit().unwrap();

        assert!(!store.in_transaction());
        assert!(store.get_entity("k").unwrap().unwrap().is_tombstone());
    }
}

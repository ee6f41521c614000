//! Core traits: Store and its transaction guard.

use std::ops::{Deref, DerefMut};

use crate::{Entity, StoreError};

/// A flat, string-keyed table of [`Entity`] rows with transaction support.
///
/// Reads take `&self`; implementations that are safe for concurrent reads
/// can be shared across threads. Writes take `&mut self`.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `&mut dyn Store`.
pub trait Store: Send + Sync {
    /// Fetch the entity stored exactly at `key`.
    fn get_entity(&self, key: &str) -> Result<Option<Entity>, StoreError>;

    /// Fetch every entity whose key starts with `prefix`, in key order.
    fn get_entities(&self, prefix: &str) -> Result<Vec<Entity>, StoreError>;

    /// Create a new, unpersisted entity.
    ///
    /// Backends may override this to pre-populate backend-specific fields.
    fn create_entity(&self) -> Entity {
        Entity::default()
    }

    /// Insert `entity`, or overwrite the value of the entity with the same key.
    fn upsert_entity(&mut self, entity: Entity) -> Result<(), StoreError>;

    /// Delete `entity`. Returns `true` if something was deleted.
    fn delete_entity(&mut self, entity: &Entity) -> Result<bool, StoreError>;

    /// Open a transaction. Transactions do not nest.
    fn begin_transaction(&mut self) -> Result<(), StoreError>;

    /// Make every change since `begin_transaction` durable.
    fn commit_transaction(&mut self) -> Result<(), StoreError>;

    /// Discard every change since `begin_transaction`.
    fn rollback_transaction(&mut self) -> Result<(), StoreError>;

    /// Flush pending writes within the current transaction.
    fn save_changes(&mut self) -> Result<(), StoreError>;

    /// Open a transaction scoped to the returned guard.
    ///
    /// The guard derefs to the store. Dropping it without calling
    /// [`Transaction::commit`] rolls back.
    fn transaction(&mut self) -> Result<Transaction<'_, Self>, StoreError>
    where
        Self: Sized,
    {
        Transaction::begin(self)
    }
}

/// Scoped transaction over a [`Store`].
pub struct Transaction<'a, S: Store + ?Sized> {
    store: &'a mut S,
    active: bool,
}

impl<'a, S: Store + ?Sized> Transaction<'a, S> {
    /// Begin a transaction on `store`.
    pub fn begin(store: &'a mut S) -> Result<Self, StoreError> {
        store.begin_transaction()?;
        tracing::trace!("transaction begun");
        Ok(Self {
            store,
            active: true,
        })
    }

    /// Commit and release the transaction.
    pub fn commit(mut self) -> Result<(), StoreError> {
        // A failed commit leaves `active` set so drop still rolls back.
        self.store.commit_transaction()?;
        self.active = false;
        tracing::trace!("transaction committed");
        Ok(())
    }

    /// Roll back and release the transaction.
    pub fn rollback(mut self) -> Result<(), StoreError> {
        self.active = false;
        self.store.rollback_transaction()?;
        tracing::trace!("transaction rolled back");
        Ok(())
    }
}

impl<S: Store + ?Sized> Deref for Transaction<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.store
    }
}

impl<S: Store + ?Sized> DerefMut for Transaction<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.store
    }
}

impl<S: Store + ?Sized> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.store.rollback_transaction() {
                tracing::warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}

// Blanket implementations for references and boxes

impl<T: Store + ?Sized> Store for &mut T {
    fn get_entity(&self, key: &str) -> Result<Option<Entity>, StoreError> {
        (**self).get_entity(key)
    }

    fn get_entities(&self, prefix: &str) -> Result<Vec<Entity>, StoreError> {
        (**self).get_entities(prefix)
    }

    fn create_entity(&self) -> Entity {
        (**self).create_entity()
    }

    fn upsert_entity(&mut self, entity: Entity) -> Result<(), StoreError> {
        (**self).upsert_entity(entity)
    }

    fn delete_entity(&mut self, entity: &Entity) -> Result<bool, StoreError> {
        (**self).delete_entity(entity)
    }

    fn begin_transaction(&mut self) -> Result<(), StoreError> {
        (**self).begin_transaction()
    }

    fn commit_transaction(&mut self) -> Result<(), StoreError> {
        (**self).commit_transaction()
    }

    fn rollback_transaction(&mut self) -> Result<(), StoreError> {
        (**self).rollback_transaction()
    }

    fn save_changes(&mut self) -> Result<(), StoreError> {
        (**self).save_changes()
    }
}

impl<T: Store + ?Sized> Store for Box<T> {
    fn get_entity(&self, key: &str) -> Result<Option<Entity>, StoreError> {
        self.as_ref().get_entity(key)
    }

    fn get_entities(&self, prefix: &str) -> Result<Vec<Entity>, StoreError> {
        self.as_ref().get_entities(prefix)
    }

    fn create_entity(&self) -> Entity {
        self.as_ref().create_entity()
    }

    fn upsert_entity(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.as_mut().upsert_entity(entity)
    }

    fn delete_entity(&mut self, entity: &Entity) -> Result<bool, StoreError> {
        self.as_mut().delete_entity(entity)
    }

    fn begin_transaction(&mut self) -> Result<(), StoreError> {
        self.as_mut().begin_transaction()
    }

    fn commit_transaction(&mut self) -> Result<(), StoreError> {
        self.as_mut().commit_transaction()
    }

    fn rollback_transaction(&mut self) -> Result<(), StoreError> {
        self.as_mut().rollback_transaction()
    }

    fn save_changes(&mut self) -> Result<(), StoreError> {
        self.as_mut().save_changes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Simple store for testing: a map plus a snapshot for rollback.
    #[derive(Default)]
    struct TestStore {
        data: BTreeMap<String, Entity>,
        snapshot: Option<BTreeMap<String, Entity>>,
    }

    impl Store for TestStore {
        fn get_entity(&self, key: &str) -> Result<Option<Entity>, StoreError> {
            Ok(self.data.get(key).cloned())
        }

        fn get_entities(&self, prefix: &str) -> Result<Vec<Entity>, StoreError> {
            Ok(self
                .data
                .values()
                .filter(|e| e.key.starts_with(prefix))
                .cloned()
                .collect())
        }

        fn upsert_entity(&mut self, entity: Entity) -> Result<(), StoreError> {
            self.data.insert(entity.key.clone(), entity);
            Ok(())
        }

        fn delete_entity(&mut self, entity: &Entity) -> Result<bool, StoreError> {
            Ok(self.data.remove(&entity.key).is_some())
        }

        fn begin_transaction(&mut self) -> Result<(), StoreError> {
            if self.snapshot.is_some() {
                return Err(StoreError::TransactionActive);
            }
            self.snapshot = Some(self.data.clone());
            Ok(())
        }

        fn commit_transaction(&mut self) -> Result<(), StoreError> {
            self.snapshot.take().ok_or(StoreError::NoTransaction)?;
            Ok(())
        }

        fn rollback_transaction(&mut self) -> Result<(), StoreError> {
            self.data = self.snapshot.take().ok_or(StoreError::NoTransaction)?;
            Ok(())
        }

        fn save_changes(&mut self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn committed_transaction_keeps_writes() {
        let mut store = TestStore::default();
        let mut tx = store.transaction().unwrap();
        tx.upsert_entity(Entity::new("a", Some("1".to_string())))
            .unwrap();
        tx.commit().unwrap();

        assert!(store.get_entity("a").unwrap().is_some());
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let mut store = TestStore::default();
        {
            let mut tx = store.transaction().unwrap();
            tx.upsert_entity(Entity::new("a", Some("1".to_string())))
                .unwrap();
        }

        assert!(store.get_entity("a").unwrap().is_none());
        assert!(store.snapshot.is_none());
    }

    #[test]
    fn explicit_rollback_discards_writes() {
        let mut store = TestStore::default();
        store
            .upsert_entity(Entity::new("keep", Some("x".to_string())))
            .unwrap();

        let mut tx = store.transaction().unwrap();
        let keep = tx.get_entity("keep").unwrap().unwrap();
        assert!(tx.delete_entity(&keep).unwrap());
        tx.rollback().unwrap();

        assert!(store.get_entity("keep").unwrap().is_some());
    }

    #[test]
    fn object_safety_works() {
        let mut store = TestStore::default();
        let dynamic: &mut dyn Store = &mut store;

        let mut tx = Transaction::begin(dynamic).unwrap();
        tx.upsert_entity(Entity::new("k", None)).unwrap();
        tx.commit().unwrap();

        assert!(store.get_entity("k").unwrap().unwrap().is_tombstone());
    }

    #[test]
    fn create_entity_defaults_to_empty() {
        let store = TestStore::default();
        assert_eq!(store.create_entity(), Entity::default());
    }
}

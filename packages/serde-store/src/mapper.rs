//! The mapper: typed get/set over a store, one transaction per write.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use flatstruct_core_store::{key, Entity, Store, Transaction};

use crate::config::{Configuration, MapperConfig};
use crate::ser::delete_under;
use crate::typed::TypedStore;
use crate::Error;

/// Maps typed values to and from the flat key space of a [`Store`].
///
/// `get` never writes. `set` and `remove` each run in exactly one store
/// transaction: either every change lands or none does.
///
/// # Example
///
/// ```rust
/// use flatstruct_serde_store::Mapper;
/// use flatstruct_stores::InMemoryStore;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// #[serde(rename_all = "PascalCase")]
/// struct Account {
///     user_name: String,
///     ports: Vec<u16>,
/// }
///
/// let mut mapper = Mapper::with_defaults(InMemoryStore::new());
/// let account = Account { user_name: "john".into(), ports: vec![25, 587] };
///
/// mapper.set("Accounts[0]", &account).unwrap();
/// assert_eq!(mapper.get::<String>("Accounts[0].UserName").unwrap(), "john");
/// assert_eq!(mapper.get::<Account>("Accounts[0]").unwrap(), account);
/// ```
pub struct Mapper<S> {
    store: S,
    config: Arc<dyn Configuration>,
}

impl<S: Store> Mapper<S> {
    /// Create a mapper over `store` with the given configuration.
    pub fn new(store: S, config: impl Configuration + 'static) -> Self {
        Self::with_shared_config(store, Arc::new(config))
    }

    /// Create a mapper that shares a configuration with other mappers.
    pub fn with_shared_config(store: S, config: Arc<dyn Configuration>) -> Self {
        Self { store, config }
    }

    /// Create a mapper with the default converters and no resolvers.
    pub fn with_defaults(store: S) -> Self {
        Self::new(store, MapperConfig::new())
    }

    /// The mapper's configuration.
    pub fn config(&self) -> &dyn Configuration {
        &*self.config
    }

    /// Read a `T` at `key`, consulting key resolvers when nothing is found.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, Error> {
        self.get_with(key, true)
    }

    /// Read a `T` at `key`, optionally skipping key resolution.
    pub fn get_with<T: DeserializeOwned>(&self, key: &str, use_resolvers: bool) -> Result<T, Error> {
        self.store.read_as(key, &*self.config, use_resolvers)
    }

    /// Replace whatever is stored under `key` with the flattened `value`.
    ///
    /// On failure the transaction is rolled back and the original error is
    /// returned.
    pub fn set<T: Serialize + DeserializeOwned>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), Error> {
        tracing::debug!(key, "set");
        let config = &*self.config;
        let mut tx = self.store.transaction()?;
        let result = tx
            .write_as(key, value, config)
            .and_then(|()| Ok(tx.save_changes()?));
        finish(tx, key, result)
    }

    /// Delete the entity at `key` and everything beneath it, without
    /// leaving a tombstone. Returns the number of entities deleted.
    pub fn remove(&mut self, key: &str) -> Result<usize, Error> {
        tracing::debug!(key, "remove");
        let mut tx = self.store.transaction()?;
        let result = remove_subtree(&mut *tx, key);
        finish(tx, key, result)
    }

    /// Every raw entity whose key starts with `prefix`, in key order.
    pub fn entities(&self, prefix: &str) -> Result<Vec<Entity>, Error> {
        Ok(self.store.get_entities(prefix)?)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Mapper<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper").field("store", &self.store).finish()
    }
}

fn remove_subtree<S: Store + ?Sized>(store: &mut S, key: &str) -> Result<usize, Error> {
    let mut deleted = delete_under(store, &key::members_prefix(key))?;
    deleted += delete_under(store, &key::indices_prefix(key))?;
    if let Some(entity) = store.get_entity(key)? {
        if store.delete_entity(&entity)? {
            deleted += 1;
        }
    }
    store.save_changes()?;
    Ok(deleted)
}

/// Commit on success; roll back and hand back the original error otherwise.
fn finish<S: Store + ?Sized, T>(
    tx: Transaction<'_, S>,
    key: &str,
    result: Result<T, Error>,
) -> Result<T, Error> {
    match result {
        Ok(value) => {
            tx.commit()?;
            tracing::debug!(key, "committed");
            Ok(value)
        }
        Err(error) => {
            tracing::warn!(key, %error, "rolling back");
            if let Err(rollback) = tx.rollback() {
                tracing::warn!(key, error = %rollback, "rollback failed");
            }
            Err(error)
        }
    }
}

//! Typed read and write extension trait.

use serde::de::DeserializeOwned;
use serde::Serialize;

use flatstruct_core_store::Store;

use crate::config::Configuration;
use crate::de::from_store;
use crate::ser::to_store;
use crate::Error;

/// Extension trait for typed access to a [`Store`].
///
/// Implemented for every sized `Store` and for `dyn Store`. Writes made
/// through `write_as` are not wrapped in a transaction; see
/// [`Mapper::set`](crate::Mapper::set) for the transactional form.
///
/// # Example
///
/// ```rust
/// use flatstruct_serde_store::{MapperConfig, TypedStore};
/// use flatstruct_stores::InMemoryStore;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// struct Smtp {
///     host: String,
///     port: u16,
/// }
///
/// let config = MapperConfig::new();
/// let mut store = InMemoryStore::new();
/// let smtp = Smtp { host: "mail".into(), port: 25 };
///
/// store.write_as("Smtp", &smtp, &config).unwrap();
/// let back: Smtp = store.read_as("Smtp", &config, true).unwrap();
/// assert_eq!(back, smtp);
/// ```
pub trait TypedStore: Store {
    /// Reconstruct a `T` from the entities under `key`.
    ///
    /// With `use_resolvers`, any lookup that finds nothing, at the top-level
    /// key or beneath it, is retried with the configuration's resolved keys.
    fn read_as<T: DeserializeOwned>(
        &self,
        key: &str,
        config: &dyn Configuration,
        use_resolvers: bool,
    ) -> Result<T, Error>;

    /// Flatten `value` into entities under `key`, replacing what was there.
    ///
    /// `T`'s `Deserialize` impl supplies the payload type behind each
    /// `None`, so the same type must be readable back.
    fn write_as<T: Serialize + DeserializeOwned>(
        &mut self,
        key: &str,
        value: &T,
        config: &dyn Configuration,
    ) -> Result<(), Error>;

    /// Read the subtree under `key` without a target type.
    fn read_json(&self, key: &str, config: &dyn Configuration) -> Result<serde_json::Value, Error> {
        self.read_as(key, config, true)
    }
}

impl<S: Store> TypedStore for S {
    fn read_as<T: DeserializeOwned>(
        &self,
        key: &str,
        config: &dyn Configuration,
        use_resolvers: bool,
    ) -> Result<T, Error> {
        from_store(self, config, key, use_resolvers)
    }

    fn write_as<T: Serialize + DeserializeOwned>(
        &mut self,
        key: &str,
        value: &T,
        config: &dyn Configuration,
    ) -> Result<(), Error> {
        to_store(self, config, key, value)
    }
}

impl<'a> TypedStore for dyn Store + 'a {
    fn read_as<T: DeserializeOwned>(
        &self,
        key: &str,
        config: &dyn Configuration,
        use_resolvers: bool,
    ) -> Result<T, Error> {
        from_store(self, config, key, use_resolvers)
    }

    fn write_as<T: Serialize + DeserializeOwned>(
        &mut self,
        key: &str,
        value: &T,
        config: &dyn Configuration,
    ) -> Result<(), Error> {
        to_store(self, config, key, value)
    }
}

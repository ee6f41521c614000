//! flatstruct: typed values over a flat key/value store.
//!
//! Every value lives under a key path. `Smtp.Port` is the `Port` member of
//! `Smtp`; `Servers[2].Host` is the `Host` member of element 2 of the
//! `Servers` sequence; `Limits[daily]` is the `daily` entry of the `Limits`
//! map. A [`Mapper`] reads any `Deserialize` type back out of those keys and
//! writes any `Serialize` type into them, replacing what was there in one
//! transaction.
//!
//! # Crates
//!
//! - [`flatstruct_core_store`]: `Entity`, the `Store` trait, key helpers
//! - [`flatstruct_stores`]: `InMemoryStore` and `SqliteStore`
//! - [`flatstruct_serde_store`]: converters, resolvers, `Mapper`
//!
//! # Example
//!
//! ```rust
//! use flatstruct::{Mapper, MapperConfig, SqliteStore};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! #[serde(rename_all = "PascalCase")]
//! struct Server {
//!     host: String,
//!     port: u16,
//!     tls: Option<bool>,
//! }
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! let mut mapper = Mapper::new(store, MapperConfig::new());
//!
//! let servers = vec![
//!     Server { host: "a.example".into(), port: 25, tls: None },
//!     Server { host: "b.example".into(), port: 587, tls: Some(true) },
//! ];
//! mapper.set("Servers", &servers).unwrap();
//!
//! assert_eq!(mapper.get::<u16>("Servers[1].Port").unwrap(), 587);
//! assert_eq!(mapper.get::<Vec<Server>>("Servers").unwrap(), servers);
//! ```

pub use flatstruct_core_store as core_store;
pub use flatstruct_serde_store as serde_store;
pub use flatstruct_stores as stores;

pub use flatstruct_core_store::{key, Entity, EntityId, KeyError, Store, StoreError, Transaction};
pub use flatstruct_serde_store::{
    AliasResolver, Configuration, ConvertError, Converter, ConverterRegistry, Error, KeyResolver,
    Mapper, MapperConfig, MapperOptions, NoResolver, Scalar, ScalarKind, TypedStore,
};
pub use flatstruct_stores::{InMemoryStore, SqliteStore};

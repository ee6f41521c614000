//! Serde integration for flatstruct stores.
//!
//! This layer maps typed values onto the flat key space of a
//! [`Store`]. It adds:
//! - [`Mapper`]: transactional typed get/set
//! - [`TypedStore`]: typed reads and writes on any store
//! - [`ConverterRegistry`]: string conversions for primitive values
//! - [`KeyResolver`]: fallback keys for lookups that find nothing
//!
//! A value's shape comes from its `Serialize`/`Deserialize` impls:
//! primitives and unit enum variants occupy one key, sequences and maps
//! occupy `key[index]`, and structs occupy `key.field`.
//!
//! # Example
//!
//! ```rust
//! use flatstruct_serde_store::{AliasResolver, Mapper, MapperConfig};
//! use flatstruct_stores::InMemoryStore;
//! use std::collections::BTreeMap;
//!
//! let config = MapperConfig::new()
//!     .with_resolver(AliasResolver::new().prefix_alias("Legacy", "Ports"));
//! let mut mapper = Mapper::new(InMemoryStore::new(), config);
//!
//! let mut ports = BTreeMap::new();
//! ports.insert("smtp".to_string(), 25u16);
//! mapper.set("Ports", &ports).unwrap();
//!
//! let legacy: BTreeMap<String, u16> = mapper.get("Legacy").unwrap();
//! assert_eq!(legacy, ports);
//! ```

mod config;
mod converter;
mod de;
mod error;
mod mapper;
mod resolve;
mod ser;
mod shape;
mod typed;

pub use config::{Configuration, MapperConfig, MapperOptions};
pub use converter::{
    BooleanConverter, BytesConverter, CharConverter, ConvertError, Converter, ConverterRegistry,
    DecimalConverter, IntegerConverter, Scalar, ScalarKind, StringConverter,
};
pub use de::from_store;
pub use error::Error;
pub use mapper::Mapper;
pub use resolve::{AliasResolver, KeyResolver, NoResolver};
pub use ser::to_store;
pub use typed::TypedStore;

// Re-export core types for convenience
pub use flatstruct_core_store::{key, Entity, EntityId, KeyError, Store, StoreError, Transaction};

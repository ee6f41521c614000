//! Core flatstruct: the flat entity store layer
//!
//! This layer defines what the mapping layer stores things in:
//! - `Entity`: one `(key, value)` row with an opaque identity
//! - `key`: procedural helpers for `.` member and `[...]` index key paths
//! - `Store`: CRUD, prefix scan, and transaction scoping over entities
//! - `Transaction`: a guard that rolls back unless committed
//!
//! # Example
//!
//! ```rust
//! use flatstruct_core_store::{Entity, Store, StoreError};
//!
//! fn write_name(store: &mut impl Store, name: &str) -> Result<(), StoreError> {
//!     let mut tx = store.transaction()?;
//!     tx.upsert_entity(Entity::new("user.name", Some(name.to_string())))?;
//!     tx.commit()
//! }
//! ```

mod entity;
mod error;
pub mod key;
mod traits;

pub use entity::{Entity, EntityId};
pub use error::StoreError;
pub use key::{IndexGroup, KeyError};
pub use traits::{Store, Transaction};

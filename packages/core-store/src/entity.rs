//! The stored row: one key, one optional string value.

use std::fmt;

/// Backend-assigned identity of an entity.
pub type EntityId = i64;

/// A single `(key, value)` pair as held by a [`Store`](crate::Store).
///
/// `id` is opaque to the mapping layer. Backends assign it when the entity is
/// first persisted; a freshly created entity has `id == None`.
///
/// A `value` of `None` is a tombstone: the key was written explicitly as
/// "absent", which is distinct from never having been written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entity {
    pub id: Option<EntityId>,
    pub key: String,
    pub value: Option<String>,
}

impl Entity {
    /// Create an unpersisted entity.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            id: None,
            key: key.into(),
            value,
        }
    }

    /// True if this entity carries no value.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={:?}", self.key, value),
            None => write!(f, "{}=<null>", self.key),
        }
    }
}

//! Error types for the mapping layer.

use std::fmt;

use flatstruct_core_store::{KeyError, StoreError};

use crate::converter::{ConvertError, ScalarKind};

/// Errors from [`Mapper`](crate::Mapper) reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A stored key does not follow the key grammar.
    #[error("malformed key: {0}")]
    Key(#[from] KeyError),

    /// A stored string could not be converted to the requested type.
    #[error("cannot convert value at `{key}`: {source}")]
    Conversion {
        key: String,
        #[source]
        source: ConvertError,
    },

    /// No registered converter handles the requested kind.
    #[error("no converter registered for {0}")]
    NoConverter(ScalarKind),

    /// A value without a zero value (a unit enum) has nothing stored.
    #[error("no value stored at `{key}`")]
    MissingValue { key: String },

    /// The key resolver chain ran longer than the configured limit.
    #[error("resolving `{key}` exceeded {limit} resolver hops")]
    ResolverLimit { key: String, limit: usize },

    /// A map key would produce a key that cannot be parsed back.
    #[error("map key {0:?} has unbalanced brackets")]
    InvalidMapKey(String),

    /// The value's shape has no flat representation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Mapper options could not be loaded.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Raised by a `Serialize`/`Deserialize` implementation.
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

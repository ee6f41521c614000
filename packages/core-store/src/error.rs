//! Error types for the store layer.

/// Errors raised by [`Store`](crate::Store) implementations.
///
/// These are backend-level failures only. Conversion and key-syntax errors
/// belong to the mapping layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend failed (I/O, SQL, ...).
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// `begin_transaction` was called while a transaction is already open.
    #[error("a transaction is already active")]
    TransactionActive,

    /// `commit_transaction`/`rollback_transaction` without an open transaction.
    #[error("no transaction is active")]
    NoTransaction,

    /// A lock guarding the backend was poisoned by a panicking thread.
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Wrap any backend error.
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::backend(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn backend_error_display_and_source() {
        let e = StoreError::from(std::io::Error::other("disk on fire"));
        let display = format!("{}", e);
        assert!(display.contains("backend error"));
        assert!(display.contains("disk on fire"));
        assert!(StdError::source(&e).is_some());
    }

    #[test]
    fn transaction_errors_display() {
        assert!(format!("{}", StoreError::TransactionActive).contains("already active"));
        assert!(format!("{}", StoreError::NoTransaction).contains("no transaction"));
        assert!(StdError::source(&StoreError::Poisoned).is_none());
    }
}

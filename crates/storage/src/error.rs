//! Storage error type shared by all keyed store implementations.

use std::fmt;

/// Errors that can occur when reading or writing a keyed store.
#[derive(Debug)]
pub enum StorageError {
    /// An entry with this key already exists.
    Duplicate(String),

    /// The requested entry does not exist.
    NotFound(String),

    /// A lock guarding the in-memory map was poisoned by a panicking writer.
    Poisoned,

    /// Encoding or decoding a stored value failed.
    Serialization(String),

    /// An unclassified backend error. Inspect the inner error for details.
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(key) => write!(f, "duplicate entry: {key}"),
            Self::NotFound(key) => write!(f, "entry not found: {key}"),
            Self::Poisoned => write!(f, "store lock poisoned"),
            Self::Serialization(detail) => write!(f, "serialization error: {detail}"),
            Self::Internal(e) => write!(f, "internal storage error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Poisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_key() {
        let err = StorageError::Duplicate("note-1".into());
        assert_eq!(err.to_string(), "duplicate entry: note-1");
        assert!(!err.is_transient());
    }

    #[test]
    fn poison_converts() {
        let lock = std::sync::Mutex::new(0u8);
        let _ = std::panic::catch_unwind(|| {
            let _guard = lock.lock().unwrap();
            panic!("poison");
        });
        let err: StorageError = lock.lock().unwrap_err().into();
        assert!(matches!(err, StorageError::Poisoned));
    }
}

//! Diagnostic error types for the atom store.
//!
//! The store's public surface has no recoverable errors; these values exist
//! for the diagnostic paths (a user-defined key colliding across atom
//! types, or an override registered for one atom type and queried with
//! another) where the store logs the problem, drops the offending entry,
//! and carries on.

use alloc::string::String;
use core::fmt;

/// Result type alias for store-internal operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Diagnostic errors recorded by the store.
#[derive(Debug)]
pub enum Error {
    /// Two different atom types materialised under the same key.
    KeyCollision {
        key: String,
        expected: &'static str,
    },
    /// A stored override does not produce the queried atom type.
    IllegalOverride {
        key: String,
        expected: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyCollision { key, expected } => {
                write!(
                    f,
                    "key collision at {}: stored entry is not a {}; releasing it",
                    key, expected
                )
            }
            Error::IllegalOverride { key, expected } => {
                write!(
                    f,
                    "override for {} does not produce {}; ignoring it",
                    key, expected
                )
            }
        }
    }
}

impl Error {
    /// Creates a key collision diagnostic.
    pub fn key_collision(key: impl Into<String>, expected: &'static str) -> Self {
        Error::KeyCollision {
            key: key.into(),
            expected,
        }
    }

    /// Creates an illegal override diagnostic.
    pub fn illegal_override(key: impl Into<String>, expected: &'static str) -> Self {
        Error::IllegalOverride {
            key: key.into(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::key_collision("Counter", "AtomCache<Counter>");
        assert!(err.to_string().contains("key collision"));
        assert!(err.to_string().contains("Counter"));

        let err = Error::illegal_override("Counter", "i64");
        assert!(err.to_string().contains("override"));
    }

    #[test]
    fn test_error_constructors() {
        match Error::key_collision("k", "t") {
            Error::KeyCollision { key, expected } => {
                assert_eq!(key, "k");
                assert_eq!(expected, "t");
            }
            _ => panic!("wrong error type"),
        }
    }
}

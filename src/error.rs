//! Error types for viewkit.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned by [`ManagerBuilder::try_build`](crate::builder::ManagerBuilder::try_build)
//!   when configuration parameters are invalid (zero floor, zero capacity).
//! - [`InvariantError`]: Returned by `check_invariants` methods when a view's
//!   or cache's indices disagree with its contents.
//! - [`ListenerError`]: Returned by a [`ViewListener`](crate::traits::ViewListener)
//!   callback. Always absorbed and logged at the view boundary.
//! - [`WriteBackError`]: Returned by a [`WriteBack`](crate::traits::WriteBack)
//!   hook when the store could not queue an entity's write. The entity stays
//!   dirty.
//!
//! None of these cross the manager's notification or lookup entry points;
//! lookup misses are plain `None` / empty results.
//!
//! ## Example Usage
//!
//! ```
//! use viewkit::builder::ManagerBuilder;
//! use viewkit::error::ConfigError;
//!
//! let bad: Result<_, ConfigError> = ManagerBuilder::new().cache_floor(0).try_build();
//! assert!(bad.unwrap_err().to_string().contains("floor"));
//! ```

use std::error::Error;
use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when a view's or cache's internal invariants are violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when manager configuration parameters are invalid.
///
/// # Example
///
/// ```
/// use viewkit::builder::ManagerBuilder;
///
/// let err = ManagerBuilder::new().cache_floor(0).try_build().unwrap_err();
/// assert!(err.message().contains("cache floor"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for ConfigError {}

// ---------------------------------------------------------------------------
// ListenerError
// ---------------------------------------------------------------------------

/// Failure reported by a view listener callback.
///
/// Carries a description and, optionally, the underlying error.
#[derive(Debug)]
pub struct ListenerError {
    msg: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ListenerError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            source: None,
        }
    }

    /// Wraps an arbitrary error; its `Display` output becomes the message.
    pub fn from_error(err: impl Error + Send + Sync + 'static) -> Self {
        Self {
            msg: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl Error for ListenerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// WriteBackError
// ---------------------------------------------------------------------------

/// Failure reported by a store write-back hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBackError(String);

impl WriteBackError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WriteBackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for WriteBackError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

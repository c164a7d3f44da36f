//! Record versions for optimistic concurrency control.
//!
//! Every persisted record carries a [`Version`]. Writers read a record, decide, and then
//! write back only if the version they read is still current. A mismatch means another
//! writer got there first and the losing writer must re-evaluate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of a persisted record.
///
/// Versions start at 1 when a record is created and increment by 1 on every write.
///
/// # Examples
///
/// ```
/// use tourbook_core::version::Version;
///
/// let v1 = Version::INITIAL;
/// let v2 = v1.next();
/// assert_eq!(v2, Version::new(2));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of a freshly created record.
    pub const INITIAL: Self = Self(1);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    ///
    /// Saturates at `u64::MAX`, which no record will ever reach.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Check if this is the version of a record that was never updated.
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == Self::INITIAL.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

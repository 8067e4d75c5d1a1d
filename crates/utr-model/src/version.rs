//! Dotted version numbers for schema and server version checks.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Newest test-file schema version this interpreter understands.
pub const SUPPORTED_SCHEMA_VERSION: Version = Version::new(1, 13, 0);

/// A `major.minor[.patch]` version.
///
/// Missing components default to zero, so `"4.4"` equals `"4.4.0"`.
///
/// # Example
///
/// ```
/// use utr_model::Version;
///
/// let version: Version = "1.5".parse().expect("valid version");
/// assert_eq!(version.major(), 1);
/// assert_eq!(version.minor(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
}

impl Version {
    /// Builds a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Major component.
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Minor component.
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Patch component.
    #[must_use]
    pub const fn patch(&self) -> u32 {
        self.patch
    }

    /// Whether a test file declaring this schema version can be interpreted.
    ///
    /// The major version must match exactly and the minor version must not
    /// exceed the newest supported one; patch releases never change
    /// semantics.
    #[must_use]
    pub const fn is_supported_schema(&self) -> bool {
        self.major == SUPPORTED_SCHEMA_VERSION.major
            && self.minor <= SUPPORTED_SCHEMA_VERSION.minor
    }
}

/// Error raised for text that is not a dotted version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{text}': expected major.minor[.patch]")]
pub struct VersionParseError {
    text: String,
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let error = || VersionParseError {
            text: text.to_owned(),
        };
        let mut components = [0_u32; 3];
        let mut count = 0_usize;
        for part in text.trim().split('.') {
            let slot = components.get_mut(count).ok_or_else(error)?;
            *slot = part.parse().map_err(|_| error())?;
            count += 1;
        }
        if count < 2 {
            return Err(error());
        }
        let [major, minor, patch] = components;
        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

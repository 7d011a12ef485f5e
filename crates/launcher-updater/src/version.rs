//! Four-part version numbers.
//!
//! Game patches and the installed state use `major.minor.patch.build`
//! strings (e.g. `"1.0.0.5"`). Ordering is numeric per component, most
//! significant first, so `"1.0.0.10"` sorts after `"1.0.0.9"`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A four-component version number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Major version number.
    pub major: u32,
    /// Minor version number.
    pub minor: u32,
    /// Patch version number.
    pub patch: u32,
    /// Build number.
    pub build: u32,
}

impl Version {
    /// Create a new version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// Parse exactly four dot-separated integers.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let parts = split_components(s)?;
        match parts.as_slice() {
            [major, minor, patch, build] => Ok(Self::new(*major, *minor, *patch, *build)),
            _ => Err(ParseError::MalformedVersion(s.to_string())),
        }
    }

    /// Parse two to four dot-separated integers, treating missing trailing
    /// components as zero.
    ///
    /// Used for the launcher's own version, which comes from a three-part
    /// package version, and for the launcher descriptor published next to it.
    pub fn parse_lenient(s: &str) -> Result<Self, ParseError> {
        let parts = split_components(s)?;
        if !(2..=4).contains(&parts.len()) {
            return Err(ParseError::MalformedVersion(s.to_string()));
        }
        let component = |i: usize| parts.get(i).copied().unwrap_or(0);
        Ok(Self::new(component(0), component(1), component(2), component(3)))
    }

    /// The version of the running launcher, from its package metadata.
    #[must_use]
    pub fn current() -> Self {
        Self::parse_lenient(env!("CARGO_PKG_VERSION")).unwrap_or_default()
    }
}

fn split_components(s: &str) -> Result<Vec<u32>, ParseError> {
    let malformed = || ParseError::MalformedVersion(s.to_string());
    s.trim()
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            part.parse::<u32>().map_err(|_| malformed())
        })
        .collect()
}

/// Compare two version strings numerically.
pub fn compare(a: &str, b: &str) -> Result<Ordering, ParseError> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

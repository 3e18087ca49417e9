//! Semantic version value type

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

// ============================================================================
// SemanticVersion
// ============================================================================

/// An immutable `major.minor.patch` version.
///
/// Ordering is lexicographic on `(major, minor, patch)`. Parsing accepts
/// `"M"`, `"M.m"` and `"M.m.p"`; missing components default to `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion {
    major: u64,
    minor: u64,
    patch: u64,
}

impl SemanticVersion {
    /// The version assigned to the first registration of a model name
    pub const INITIAL: SemanticVersion = SemanticVersion::new(1, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let value = value.trim();

        if value.is_empty() {
            return Err(DomainError::validation("Version string cannot be empty"));
        }

        let parts: Vec<&str> = value.split('.').collect();

        if parts.len() > 3 {
            return Err(DomainError::validation(format!(
                "Invalid version '{}': expected major.minor.patch",
                value
            )));
        }

        let component = |index: usize| -> Result<u64, DomainError> {
            match parts.get(index) {
                Some(part) => part.parse::<u64>().map_err(|_| {
                    DomainError::validation(format!(
                        "Invalid version '{}': '{}' is not a non-negative integer",
                        value, part
                    ))
                }),
                None => Ok(0),
            }
        };

        Ok(Self::new(component(0)?, component(1)?, component(2)?))
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Breaking change: `M.m.p -> (M+1).0.0`
    pub fn bump_major(&self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    /// New feature: `M.m.p -> M.(m+1).0`
    pub fn bump_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// Fix: `M.m.p -> M.m.(p+1)`
    pub fn bump_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    pub fn bump(&self, bump_type: BumpType) -> Self {
        match bump_type {
            BumpType::Major => self.bump_major(),
            BumpType::Minor => self.bump_minor(),
            BumpType::Patch => self.bump_patch(),
        }
    }
}

impl Default for SemanticVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemanticVersion {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SemanticVersion> for String {
    fn from(version: SemanticVersion) -> Self {
        version.to_string()
    }
}

// ============================================================================
// BumpType
// ============================================================================

/// Which version component a new registration increments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    Major,
    Minor,
    #[default]
    Patch,
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for BumpType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            other => Err(DomainError::validation(format!(
                "Invalid bump type '{}': expected major, minor or patch",
                other
            ))),
        }
    }
}

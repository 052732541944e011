//! Version selector for the server package.
//!
//! The positional CLI argument is parsed once into a closed set of shapes, each
//! of which maps to exactly one pip install specification.

use crate::error::{InstallerError, Result};
use std::fmt;
use std::str::FromStr;

/// Comparison operators that mark a selector as an expression rather than a
/// bare version.
const COMPARATORS: &[&str] = &["==", ">=", "<=", ">", "<"];

/// Keyword selecting the newest release.
pub const LATEST: &str = "latest";

/// Which version of the server package to install.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSelector {
    /// No version constraint
    #[default]
    Latest,
    /// A bare version, installed as `==version`
    Exact(String),
    /// An expression that already carries a comparator, used verbatim
    Constrained(String),
}

impl VersionSelector {
    /// Classify a raw selector string. The text is kept as given.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(InstallerError::config("version selector is empty"));
        }
        if raw == LATEST {
            return Ok(Self::Latest);
        }
        if COMPARATORS.iter().any(|op| raw.contains(op)) {
            Ok(Self::Constrained(raw.to_string()))
        } else {
            Ok(Self::Exact(raw.to_string()))
        }
    }

    /// Build the pip requirement string for `package`.
    pub fn install_spec(&self, package: &str) -> String {
        match self {
            Self::Latest => package.to_string(),
            Self::Exact(version) => format!("{}=={}", package, version),
            Self::Constrained(expr) => format!("{}{}", package, expr),
        }
    }
}

impl FromStr for VersionSelector {
    type Err = InstallerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "{}", LATEST),
            Self::Exact(version) => write!(f, "{}", version),
            Self::Constrained(expr) => write!(f, "{}", expr),
        }
    }
}

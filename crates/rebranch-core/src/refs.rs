//! Branch ref names.
//!
//! Every branch name used in a ref comparison or mutation goes through
//! [`BranchRef`], which stores the fully-qualified `refs/heads/<name>` form.
//! `main` and `refs/heads/main` therefore compare equal.

use std::fmt;
use std::str::FromStr;

use crate::error::{MigrationError, Result};

/// Prefix of fully-qualified branch refs.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Normalize a branch name to its fully-qualified form.
pub fn normalize(name: &str) -> String {
    if name.starts_with(HEADS_PREFIX) {
        name.to_string()
    } else {
        format!("{HEADS_PREFIX}{name}")
    }
}

/// Fully-qualified branch ref.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchRef(String);

impl BranchRef {
    /// Parse a short (`main`) or fully-qualified (`refs/heads/main`) name.
    pub fn new(name: &str) -> Result<Self> {
        let full = normalize(name.trim());
        let short = &full[HEADS_PREFIX.len()..];
        if short.is_empty()
            || short.chars().any(char::is_whitespace)
            || short.starts_with('/')
            || short.ends_with('/')
            || short.contains("..")
        {
            return Err(MigrationError::InvalidBranchName(name.to_string()));
        }
        Ok(BranchRef(full))
    }

    /// Wrap a name known to be valid.
    pub(crate) fn from_valid(name: &str) -> Self {
        BranchRef(normalize(name))
    }

    /// `refs/heads/<name>`
    pub fn full_name(&self) -> &str {
        &self.0
    }

    /// `<name>`
    pub fn short_name(&self) -> &str {
        &self.0[HEADS_PREFIX.len()..]
    }

    /// Whether `other` names this branch, with or without the prefix.
    pub fn matches(&self, other: &str) -> bool {
        normalize(other) == self.0
    }
}

impl FromStr for BranchRef {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        BranchRef::new(s)
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Test and registration-function selection
//!
//! A criterion is either an exact name or a regular expression. Strings of
//! the form `/.../` parse as patterns, everything else is matched literally.

use std::fmt;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::common::{Error, Result};

/// Matches a test title or a callee name
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Whole-string equality
    Exact(String),
    /// Regex search anywhere in the value
    Pattern(Regex),
}

impl Matcher {
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    pub fn pattern(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(Self::Pattern)
            .map_err(|e| Error::InvalidPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            })
    }

    /// Parse a criterion as typed by a user: `/re/` is a pattern, anything else is exact
    pub fn parse(input: &str) -> Result<Self> {
        match input
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(source) if !source.is_empty() => Self::pattern(source),
            _ => Ok(Self::exact(input)),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Exact(expected) => expected == value,
            Matcher::Pattern(re) => re.is_match(value),
        }
    }

    /// Regex handed to the test framework's grep filter
    pub fn grep_pattern(&self) -> String {
        match self {
            Matcher::Exact(value) => regex::escape(value),
            Matcher::Pattern(re) => re.as_str().to_string(),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Matcher::Exact(a), Matcher::Exact(b)) => a == b,
            (Matcher::Pattern(a), Matcher::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for Matcher {}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(value) => write!(f, "{}", value),
            Matcher::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl Serialize for Matcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which tests a run should cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every test whose title satisfies the matcher
    Matching(Matcher),
    /// The test enclosing this 1-based source line
    Line(usize),
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Matching(matcher) => write!(f, "{}", matcher),
            Selection::Line(line) => write!(f, "line {}", line),
        }
    }
}

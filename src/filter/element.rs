// src/filter/element.rs

//! Matching of values for a single scope path

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix that turns a matcher into a prefix match
pub const WILDCARD: char = '*';

/// One matcher of a `PathFilter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// The value itself
    Exact(String),
    /// Text before a trailing `*`; matches every value starting with it
    Prefix(String),
    /// Values declared together in one clause (`changes=md5,size`)
    Set(Vec<String>),
}

impl Matcher {
    /// Parse a single value, `foo*` becomes a prefix matcher
    pub fn parse(value: impl Into<String>) -> Self {
        let value = value.into();
        match value.strip_suffix(WILDCARD) {
            Some(prefix) => Matcher::Prefix(prefix.to_string()),
            None => Matcher::Exact(value),
        }
    }

    /// Matcher for the values of one clause
    ///
    /// A single value is parsed like `parse`; several values form a set.
    pub fn from_values(mut values: Vec<String>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => values.pop().map(Self::parse),
            _ => Some(Matcher::Set(values)),
        }
    }

    /// Check a single value
    ///
    /// Each member of a set is checked on its own, so
    /// `name=/opt,/srv` matches `/opt` and `/srv`.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Exact(exact) => value == exact,
            Matcher::Prefix(prefix) => value.starts_with(prefix.as_str()),
            Matcher::Set(members) => members.iter().any(|m| value_matches(m, value)),
        }
    }

    /// Check a set-valued field
    ///
    /// Order and duplicates do not matter; an element missing on either
    /// side is a mismatch. Prefix matchers never match a set.
    pub fn matches_set(&self, values: &[&str]) -> bool {
        let values: BTreeSet<&str> = values.iter().copied().collect();
        match self {
            Matcher::Exact(exact) => values.len() == 1 && values.contains(exact.as_str()),
            Matcher::Prefix(_) => false,
            Matcher::Set(members) => members.iter().map(String::as_str).collect::<BTreeSet<_>>() == values,
        }
    }

    /// Values as written by the user, wildcard included
    pub fn values(&self) -> Vec<String> {
        match self {
            Matcher::Exact(exact) => vec![exact.clone()],
            Matcher::Prefix(prefix) => vec![format!("{}{}", prefix, WILDCARD)],
            Matcher::Set(members) => members.clone(),
        }
    }
}

fn value_matches(matcher: &str, value: &str) -> bool {
    match matcher.strip_suffix(WILDCARD) {
        Some(prefix) => value.starts_with(prefix),
        None => value == matcher,
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.values().join(","))
    }
}

/// Matchers for one scope path, e.g. `/unmanaged_files/files/name`
///
/// A matcher is a literal value, a value ending in `*` which matches
/// everything starting with the text before the `*`, or a set of values
/// declared in one clause:
///
/// ```
/// use sysdescribe::filter::PathFilter;
///
/// let filter = PathFilter::with_matchers("/unmanaged_files/files/name", ["/home/alfred/*"]);
/// assert!(filter.matches("/home/alfred/"));
/// assert!(filter.matches("/home/alfred/and/berta"));
/// assert!(!filter.matches("/home/alfred"));
///
/// let mut changes = PathFilter::new("/changed_managed_files/files/changes");
/// changes.add_values(vec!["md5".to_string(), "size".to_string()]);
/// assert!(changes.matches_set(&["size", "md5"]));
/// assert!(!changes.matches_set(&["size", "md5", "time"]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFilter {
    scope_path: String,
    matchers: Vec<Matcher>,
}

impl PathFilter {
    pub fn new(scope_path: impl Into<String>) -> Self {
        Self {
            scope_path: scope_path.into(),
            matchers: Vec::new(),
        }
    }

    /// Filter with one single-value matcher per item
    pub fn with_matchers<I, S>(scope_path: impl Into<String>, matchers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::new(scope_path);
        filter.add_matchers(matchers);
        filter
    }

    pub fn scope_path(&self) -> &str {
        &self.scope_path
    }

    /// Matchers in the order they were added
    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// All matcher values flattened, in declaration order
    pub fn values(&self) -> Vec<String> {
        self.matchers.iter().flat_map(Matcher::values).collect()
    }

    pub fn add_matcher(&mut self, matcher: impl Into<String>) {
        self.matchers.push(Matcher::parse(matcher));
    }

    /// Append single-value matchers; duplicates are kept
    pub fn add_matchers<I, S>(&mut self, matchers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.matchers.extend(matchers.into_iter().map(Matcher::parse));
    }

    /// Append the values of one clause as a single matcher
    pub fn add_values(&mut self, values: Vec<String>) {
        self.matchers.extend(Matcher::from_values(values));
    }

    /// Check a single value against every matcher (case-sensitive)
    pub fn matches(&self, value: &str) -> bool {
        self.matchers.iter().any(|matcher| matcher.matches(value))
    }

    /// Check a set-valued field against every matcher
    pub fn matches_set(&self, values: &[&str]) -> bool {
        self.matchers.iter().any(|matcher| matcher.matches_set(values))
    }

    /// Matchers that can never match a set-valued field
    pub fn prefix_matchers(&self) -> impl Iterator<Item = &Matcher> {
        self.matchers.iter().filter(|m| matches!(m, Matcher::Prefix(_)))
    }

    /// Add a `<value>/*` counterpart for every literal value
    ///
    /// Excluding a directory by name then also excludes everything
    /// below it.
    pub fn add_recursive_matchers(&mut self) {
        let recursive: Vec<Matcher> = self
            .values()
            .iter()
            .filter(|v| !v.ends_with(WILDCARD))
            .map(|v| Matcher::Prefix(format!("{}/", v.trim_end_matches('/'))))
            .collect();
        self.matchers.extend(recursive);
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

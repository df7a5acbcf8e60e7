// src/filter/registry.rs

//! Filters for all scope paths of an inspection

use super::definition::parse_definition;
use super::element::PathFilter;
use crate::diagnostics::Diagnostics;
use crate::error::Result;

/// At most one `PathFilter` per scope path
///
/// ```
/// use sysdescribe::filter::FilterRegistry;
///
/// let filters = FilterRegistry::parse(
///     "/unmanaged_files/files/name=/opt*,\"/changed_managed_files/files/name=/etc/a,/etc/b\"",
/// ).unwrap();
/// assert!(filters.matches("/unmanaged_files/files/name", "/opt/foo"));
/// assert!(!filters.matches("/unmanaged_files/files/name", "/srv/bar"));
/// assert!(!filters.matches("/users/name", "root"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRegistry {
    /// Declaration order is kept for `definitions()`
    filters: Vec<PathFilter>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a definition string
    pub fn parse(definition: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.add_definition(definition)?;
        Ok(registry)
    }

    /// Build a registry from several definition strings
    pub fn from_definitions<I, S>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for definition in definitions {
            registry.add_definition(definition.as_ref())?;
        }
        Ok(registry)
    }

    /// Merge a definition string; re-declared scopes extend their matchers
    pub fn add_definition(&mut self, definition: &str) -> Result<()> {
        for clause in parse_definition(definition)? {
            self.entry(&clause.scope_path).add_values(clause.values);
        }
        Ok(())
    }

    pub fn filter_for(&self, scope_path: &str) -> Option<&PathFilter> {
        self.filters.iter().find(|f| f.scope_path() == scope_path)
    }

    /// False when no filter exists for `scope_path`
    pub fn matches(&self, scope_path: &str, value: &str) -> bool {
        self.filter_for(scope_path)
            .is_some_and(|filter| filter.matches(value))
    }

    /// Remove items whose key matches the filter for `scope_path`
    pub fn reject<T, F>(&self, scope_path: &str, items: &mut Vec<T>, key: F)
    where
        F: Fn(&T) -> &str,
    {
        if let Some(filter) = self.filter_for(scope_path) {
            items.retain(|item| !filter.matches(key(item)));
        }
    }

    /// Remove items whose set of values matches the filter for `scope_path`
    ///
    /// Prefix matchers cannot describe a set; each one is reported once
    /// and otherwise ignored.
    pub fn reject_sets<T, F>(
        &self,
        scope_path: &str,
        items: &mut Vec<T>,
        values: F,
        diagnostics: &dyn Diagnostics,
    ) where
        F: Fn(&T) -> Vec<&str>,
    {
        let Some(filter) = self.filter_for(scope_path) else {
            return;
        };
        for matcher in filter.prefix_matchers() {
            diagnostics.warn(&format!(
                "WARNING: Filter '{}={}' tries to match a set of values but is not an array. Ignoring it.",
                scope_path, matcher
            ));
        }
        items.retain(|item| !filter.matches_set(&values(item)));
    }

    /// Values not matched by the filter for `scope_path`
    pub fn apply_to_paths<S: AsRef<str>>(&self, scope_path: &str, paths: &[S]) -> Vec<String> {
        paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|path| !self.matches(scope_path, path))
            .map(str::to_string)
            .collect()
    }

    /// One `scope=values` string per matcher, in declaration order
    ///
    /// Commas and quotes inside values are escaped, so the strings parse
    /// back into an equal registry.
    pub fn definitions(&self) -> Vec<String> {
        self.iter()
            .flat_map(|filter| {
                filter.matchers().iter().map(move |matcher| {
                    let values: Vec<String> = matcher.values().iter().map(|v| escape_value(v)).collect();
                    format!("{}={}", filter.scope_path(), values.join(","))
                })
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathFilter> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    fn entry(&mut self, scope_path: &str) -> &mut PathFilter {
        let idx = match self.filters.iter().position(|f| f.scope_path() == scope_path) {
            Some(idx) => idx,
            None => {
                self.filters.push(PathFilter::new(scope_path));
                self.filters.len() - 1
            }
        };
        &mut self.filters[idx]
    }
}

fn escape_value(value: &str) -> String {
    value.replace(',', "\\,").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingDiagnostics, SilentDiagnostics};

    #[test]
    fn test_empty_definition() {
        let filters = FilterRegistry::parse("").unwrap();
        assert!(filters.is_empty());
        assert!(!filters.matches("/unmanaged_files/files/name", "/opt"));
    }

    #[test]
    fn test_quoted_clauses_round_trip() {
        let filters = FilterRegistry::parse(
            "\"/unmanaged_files/files/name=/opt,/srv\",\"/changed_managed_files/files/changes=md5,size\"",
        )
        .unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(
            filters.filter_for("/unmanaged_files/files/name").unwrap().values(),
            ["/opt", "/srv"]
        );
        let changes = filters.filter_for("/changed_managed_files/files/changes").unwrap();
        assert_eq!(changes.values(), ["md5", "size"]);
        assert!(changes.matches_set(&["size", "md5"]));
    }

    #[test]
    fn test_redeclared_scope_extends() {
        let filters = FilterRegistry::from_definitions([
            "/unmanaged_files/files/name=/home/alfred",
            "/unmanaged_files/files/name=/var/cache",
            "/changed_managed_files/files/changes=md5,size",
        ])
        .unwrap();

        assert_eq!(filters.len(), 2);
        let filter = filters.filter_for("/unmanaged_files/files/name").unwrap();
        assert_eq!(filter.values(), ["/home/alfred", "/var/cache"]);
        assert!(filters.matches("/unmanaged_files/files/name", "/var/cache"));
        assert!(!filters.matches("/changed_managed_files/files/name", "/var/cache"));
        assert!(!filters.matches("/some/path", "some_value"));
    }

    #[test]
    fn test_add_definition_merges() {
        let mut filters = FilterRegistry::parse("foo=bar,baz").unwrap();
        filters.add_definition("bar=baz").unwrap();
        filters.add_definition("foo=qux").unwrap();

        let foo = filters.filter_for("foo").unwrap();
        assert_eq!(foo.matchers().len(), 2);
        assert_eq!(foo.values(), ["bar", "baz", "qux"]);
        assert_eq!(filters.filter_for("bar").unwrap().values(), ["baz"]);
    }

    #[test]
    fn test_definitions_escape_commas() {
        let filters = FilterRegistry::parse("/foo=bar,baz\\,qux,/scope=matcher").unwrap();
        let definitions = filters.definitions();
        assert_eq!(definitions, vec!["/foo=bar,baz\\,qux", "/scope=matcher"]);

        let reparsed = FilterRegistry::from_definitions(&definitions).unwrap();
        assert_eq!(reparsed, filters);
    }

    #[test]
    fn test_definitions_escape_quotes() {
        let filters = FilterRegistry::parse("/foo=say \\\"hi\\\",/foo=a\\,b").unwrap();
        assert_eq!(filters.filter_for("/foo").unwrap().values(), ["say \"hi\"", "a,b"]);
        let definitions = filters.definitions();
        assert_eq!(definitions, vec!["/foo=say \\\"hi\\\"", "/foo=a\\,b"]);

        let reparsed = FilterRegistry::from_definitions(&definitions).unwrap();
        assert_eq!(reparsed, filters);
        assert!(reparsed.matches("/foo", "say \"hi\""));
    }

    #[test]
    fn test_reject_sets() {
        let filters = FilterRegistry::parse("/changed_managed_files/files/changes=md5,size").unwrap();
        let mut records = vec![
            vec!["deleted"],
            vec!["mode"],
            vec!["size", "md5"],
            vec!["size", "md5", "time"],
        ];
        filters.reject_sets(
            "/changed_managed_files/files/changes",
            &mut records,
            |r| r.clone(),
            &SilentDiagnostics,
        );
        assert_eq!(records, vec![vec!["deleted"], vec!["mode"], vec!["size", "md5", "time"]]);
    }

    #[test]
    fn test_reject_sets_warns_on_prefix() {
        let filters = FilterRegistry::parse("/changed_managed_files/files/changes=md*").unwrap();
        let diagnostics = CollectingDiagnostics::new();
        let mut records = vec![vec!["md5"]];
        filters.reject_sets(
            "/changed_managed_files/files/changes",
            &mut records,
            |r| r.clone(),
            &diagnostics,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(diagnostics.warnings().len(), 1);
        assert!(diagnostics.warnings()[0].contains("not an array"));
    }

    #[test]
    fn test_reject() {
        let filters = FilterRegistry::parse("/unmanaged_files/files/name=/etc/c*").unwrap();
        let mut names = vec![
            "/etc/deleted changed managed".to_string(),
            "/etc/cron.daily/cleanup".to_string(),
            "/etc/cron.daily/logrotate".to_string(),
        ];
        filters.reject("/unmanaged_files/files/name", &mut names, |n| n.as_str());
        assert_eq!(names, vec!["/etc/deleted changed managed"]);

        filters.reject("/does/not/exist", &mut names, |n| n.as_str());
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_apply_to_paths() {
        let filters = FilterRegistry::parse("/unmanaged_files/files/name=/opt/*,/srv").unwrap();
        let remaining = filters.apply_to_paths(
            "/unmanaged_files/files/name",
            &["/opt/a", "/srv", "/srv/b", "/usr/local"],
        );
        assert_eq!(remaining, vec!["/srv/b", "/usr/local"]);

        let untouched = filters.apply_to_paths("/other", &["/opt/a"]);
        assert_eq!(untouched, vec!["/opt/a"]);
    }
}

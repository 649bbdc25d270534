//! Field sets requested from an issue.

use std::fmt;

/// Fields shared by every prompt variant.
pub const CORE_FIELDS: &[&str] = &[
    "summary",
    "description",
    "status",
    "assignee",
    "parent",
    "reporter",
    "labels",
    "priority",
    "created",
    "updated",
    "issuetype",
];

/// Additional fields for the full view.
pub const EXTENDED_FIELDS: &[&str] = &["resolution", "components", "fixVersions", "duedate"];

/// Ordered, duplicate-free set of field names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSet {
    names: Vec<String>,
}

impl FieldSet {
    /// Build a field set, dropping blanks and repeated names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for name in names {
            set.push(name.as_ref());
        }
        set
    }

    /// Parse a comma-separated list such as `"summary,status"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Fields for the brief view.
    pub fn brief() -> Self {
        Self::new(CORE_FIELDS)
    }

    /// Fields for the full view.
    pub fn full() -> Self {
        Self::new(CORE_FIELDS.iter().chain(EXTENDED_FIELDS))
    }

    fn push(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && !self.contains(name) {
            self.names.push(name.to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(","))
    }
}

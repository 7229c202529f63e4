// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Raw input records.
//!
//! A [`Record`] is what a source adapter (CSV row, search result row) hands
//! to the mapper: an ordered set of `column -> raw string` entries. A column
//! is either present with a value or absent; there is no null sentinel.

/// Ordered mapping from column name to raw string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<(String, String)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record by zipping column names with row values.
    ///
    /// Columns without a matching value are absent; surplus values are
    /// ignored.
    pub fn from_row<C, V>(columns: &[C], values: impl IntoIterator<Item = V>) -> Self
    where
        C: AsRef<str>,
        V: Into<String>,
    {
        let entries = columns
            .iter()
            .zip(values)
            .map(|(c, v)| (c.as_ref().to_string(), v.into()))
            .collect();
        Self { entries }
    }

    /// Append or replace a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Builder-style [`Record::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    /// Raw value of a column, if present.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_row_zips_columns() {
        let record = Record::from_row(&["t", "host", "v"], vec!["1000", "web-1", "3.5"]);

        assert_eq!(record.len(), 3);
        assert_eq!(record.get("host"), Some("web-1"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_from_row_short_row_leaves_columns_absent() {
        let record = Record::from_row(&["t", "v"], vec!["1000"]);

        assert_eq!(record.get("t"), Some("1000"));
        assert_eq!(record.get("v"), None);
    }

    #[test]
    fn test_insert_replaces_existing_column() {
        let record = Record::new().with("a", "1").with("b", "2").with("a", "3");

        let entries: Vec<_> = record.iter().collect();
        assert_eq!(entries, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_empty_string_is_present() {
        let record = Record::new().with("a", "");
        assert_eq!(record.get("a"), Some(""));
    }
}

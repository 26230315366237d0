//! Search, match navigation and replace over the selected columns

use crate::table::Table;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A cell whose value contains the active query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Match {
    /// Row index in the processed table
    pub row: usize,
    /// Column name
    pub column: String,
}

impl Match {
    /// Create a match for `column` in `row`
    pub fn new(row: usize, column: impl Into<String>) -> Self {
        Self {
            row,
            column: column.into(),
        }
    }
}

/// Case-insensitive literal pattern for a query
fn query_pattern(query: &str) -> Option<Regex> {
    Regex::new(&format!("(?i){}", regex::escape(query))).ok()
}

/// All cells in `columns` containing `query`, row-major
///
/// Within a row, matches follow the order of `columns`. Columns missing from
/// the table are skipped.
pub fn find_matches<S: AsRef<str>>(table: &Table, columns: &[S], query: &str) -> Vec<Match> {
    let Some(pattern) = query_pattern(query) else {
        return Vec::new();
    };

    let indices: Vec<(usize, &str)> = columns
        .iter()
        .filter_map(|c| table.column_index(c.as_ref()).map(|i| (i, c.as_ref())))
        .collect();

    table
        .rows
        .iter()
        .enumerate()
        .flat_map(|(row_idx, row)| {
            indices
                .iter()
                .filter(|(col_idx, _)| row.get(*col_idx).is_some_and(|v| pattern.is_match(v)))
                .map(move |(_, name)| Match::new(row_idx, *name))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Replace every case-insensitive occurrence of `query` in `value`
pub fn replace_ignore_case(value: &str, query: &str, replacement: &str) -> String {
    match query_pattern(query) {
        Some(pattern) => pattern.replace_all(value, NoExpand(replacement)).into_owned(),
        None => value.to_string(),
    }
}

/// Remembered query, its matches and a cyclic cursor
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    query: String,
    matches: Vec<Match>,
    cursor: usize,
}

impl SearchState {
    /// Create an empty search
    pub fn new() -> Self {
        Self::default()
    }

    /// The remembered (trimmed) query
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Matches in row-major order
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Index of the current match
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The match under the cursor
    pub fn current(&self) -> Option<&Match> {
        self.matches.get(self.cursor)
    }

    /// True when `(row, column)` is in the match list
    pub fn is_match(&self, row: usize, column: &str) -> bool {
        self.matches.iter().any(|m| m.row == row && m.column == column)
    }

    /// Scan the table for `query`, resetting the cursor to the first match
    ///
    /// An empty query (after trimming) clears the search. Returns the match
    /// count.
    pub fn search<S: AsRef<str>>(&mut self, table: &Table, columns: &[S], query: &str) -> usize {
        let query = query.trim();
        if query.is_empty() {
            self.clear();
            return 0;
        }

        self.query = query.to_string();
        self.matches = find_matches(table, columns, query);
        self.cursor = 0;

        debug!(query, matches = self.matches.len(), "search");
        self.matches.len()
    }

    /// Move to the next match, wrapping at the end
    pub fn next(&mut self) -> Option<&Match> {
        if self.matches.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.matches.len();
        self.current()
    }

    /// Move to the previous match, wrapping at the start
    pub fn previous(&mut self) -> Option<&Match> {
        if self.matches.is_empty() {
            return None;
        }
        let len = self.matches.len();
        self.cursor = (self.cursor + len - 1) % len;
        self.current()
    }

    /// Replace the query inside the current match's cell, then rescan
    ///
    /// Only that one cell changes. An empty replacement is ignored. After the
    /// rescan the cursor does not follow the edited cell; it starts over
    /// from the first remaining match. Returns true when a cell changed.
    pub fn replace_current<S: AsRef<str>>(
        &mut self,
        table: &mut Table,
        columns: &[S],
        replacement: &str,
    ) -> bool {
        if replacement.is_empty() {
            return false;
        }
        let Some(current) = self.current().cloned() else {
            return false;
        };
        let Some(col_idx) = table.column_index(&current.column) else {
            return false;
        };
        let Some(row) = table.rows.get(current.row) else {
            return false;
        };
        let Some(old_value) = row.get(col_idx) else {
            return false;
        };
        let contains = query_pattern(&self.query).is_some_and(|p| p.is_match(old_value));
        if !contains {
            return false;
        }

        let new_value = replace_ignore_case(old_value, &self.query, replacement);
        let new_row = row.with_cell(col_idx, new_value);
        table.replace_row(current.row, new_row);

        let query = self.query.clone();
        self.search(table, columns, &query);
        true
    }

    /// Replace the query in every matched cell, then rescan
    ///
    /// Each matched cell is edited once, so a replacement that contains the
    /// query does not loop. Returns the number of cells changed.
    pub fn replace_all<S: AsRef<str>>(
        &mut self,
        table: &mut Table,
        columns: &[S],
        replacement: &str,
    ) -> usize {
        if replacement.is_empty() || self.matches.is_empty() {
            return 0;
        }

        let mut changed = 0;
        for m in &self.matches {
            let Some(col_idx) = table.column_index(&m.column) else {
                continue;
            };
            let Some(row) = table.rows.get(m.row) else {
                continue;
            };
            let Some(old_value) = row.get(col_idx) else {
                continue;
            };
            let new_value = replace_ignore_case(old_value, &self.query, replacement);
            if new_value != old_value {
                let new_row = row.with_cell(col_idx, new_value);
                table.replace_row(m.row, new_row);
                changed += 1;
            }
        }

        let query = self.query.clone();
        self.search(table, columns, &query);
        changed
    }

    /// Forget the query, matches and cursor
    pub fn clear(&mut self) {
        self.query.clear();
        self.matches.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::from_records(
            ["name", "note", "city"],
            vec![
                vec!["Alice", "Call Bob", "Boston"],
                vec!["Bob", "no info", "Rome"],
                vec!["Carol", "bobsled", "Bobbio"],
            ],
        )
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matches_are_row_major_in_selection_order() {
        let matches = find_matches(&table(), &cols(&["note", "name"]), "bob");
        assert_eq!(
            matches,
            vec![
                Match::new(0, "note"),
                Match::new(1, "name"),
                Match::new(2, "note"),
            ]
        );
    }

    #[test]
    fn test_matches_only_selected_columns() {
        let matches = find_matches(&table(), &cols(&["city"]), "bo");
        assert_eq!(matches, vec![Match::new(0, "city"), Match::new(2, "city")]);
    }

    #[test]
    fn test_search_is_deterministic() {
        let t = table();
        let mut state = SearchState::new();
        state.search(&t, &cols(&["name", "note"]), "bob");
        let first = state.matches().to_vec();
        state.search(&t, &cols(&["name", "note"]), "bob");
        assert_eq!(state.matches(), first.as_slice());
    }

    #[test]
    fn test_search_trims_query() {
        let mut state = SearchState::new();
        let count = state.search(&table(), &cols(&["name"]), "  bob  ");
        assert_eq!(count, 1);
        assert_eq!(state.query(), "bob");
    }

    #[test]
    fn test_empty_query_clears() {
        let t = table();
        let mut state = SearchState::new();
        state.search(&t, &cols(&["name"]), "bob");
        assert_eq!(state.search(&t, &cols(&["name"]), "   "), 0);
        assert!(state.matches().is_empty());
        assert_eq!(state.query(), "");
    }

    #[test]
    fn test_cyclic_navigation() {
        let mut state = SearchState::new();
        state.search(&table(), &cols(&["name", "note", "city"]), "bo");
        let count = state.matches().len();
        assert_eq!(count, 5);

        state.next();
        let start = state.cursor();
        for _ in 0..count {
            state.next();
        }
        assert_eq!(state.cursor(), start);

        state.next();
        state.previous();
        assert_eq!(state.cursor(), start);

        state.previous();
        state.previous();
        assert_eq!(state.cursor(), count - 1);
    }

    #[test]
    fn test_navigation_on_empty_is_noop() {
        let mut state = SearchState::new();
        assert!(state.next().is_none());
        assert!(state.previous().is_none());
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn test_replace_removes_sole_occurrence() {
        let mut t = table();
        let columns = cols(&["name"]);
        let mut state = SearchState::new();
        state.search(&t, &columns, "bob");
        assert_eq!(state.current(), Some(&Match::new(1, "name")));

        assert!(state.replace_current(&mut t, &columns, "Robert"));

        assert_eq!(t.cell(1, "name"), Some("Robert"));
        assert!(!state.is_match(1, "name"));
        assert!(state.matches().is_empty());
        assert_eq!(state.query(), "bob");
    }

    #[test]
    fn test_replace_is_case_insensitive_and_limited_to_one_cell() {
        let mut t = table();
        let columns = cols(&["note", "city"]);
        let mut state = SearchState::new();
        state.search(&t, &columns, "BOB");

        // current: (0, note) "Call Bob"
        assert!(state.replace_current(&mut t, &columns, "Dan"));
        assert_eq!(t.cell(0, "note"), Some("Call Dan"));
        assert_eq!(t.cell(0, "city"), Some("Boston"));
        assert_eq!(t.cell(2, "note"), Some("bobsled"));
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.matches().len(), 2);
    }

    #[test]
    fn test_replace_cursor_restarts_after_rescan() {
        let mut t = table();
        let columns = cols(&["note", "city"]);
        let mut state = SearchState::new();
        state.search(&t, &columns, "bob");
        state.next();
        state.next();
        assert_eq!(state.current(), Some(&Match::new(2, "city")));

        assert!(state.replace_current(&mut t, &columns, "X"));
        assert_eq!(t.cell(2, "city"), Some("Xbio"));
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.current(), Some(&Match::new(0, "note")));
    }

    #[test]
    fn test_replace_empty_is_rejected() {
        let mut t = table();
        let columns = cols(&["name"]);
        let mut state = SearchState::new();
        state.search(&t, &columns, "bob");
        assert!(!state.replace_current(&mut t, &columns, ""));
        assert_eq!(t.cell(1, "name"), Some("Bob"));
    }

    #[test]
    fn test_replace_all_edits_each_cell_once() {
        let mut t = table();
        let columns = cols(&["note", "city"]);
        let mut state = SearchState::new();
        state.search(&t, &columns, "bob");

        let changed = state.replace_all(&mut t, &columns, "bobby");

        assert_eq!(changed, 3);
        assert_eq!(t.cell(0, "note"), Some("Call bobby"));
        assert_eq!(t.cell(2, "note"), Some("bobbysled"));
        assert_eq!(t.cell(2, "city"), Some("bobbybio"));
        assert_eq!(state.matches().len(), 3);
    }

    #[test]
    fn test_replace_inserts_literally() {
        assert_eq!(replace_ignore_case("a.b.A", "a", "$1"), "$1.b.$1");
        assert_eq!(replace_ignore_case("1+1", "+", "-"), "1-1");
    }

    #[test]
    fn test_clear_search() {
        let mut state = SearchState::new();
        state.search(&table(), &cols(&["name"]), "o");
        state.clear();
        assert!(state.matches().is_empty());
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.query(), "");
    }
}

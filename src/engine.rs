use std::sync::Arc;

use rayon::prelude::*;
use tracing::trace;

use crate::column::ColumnDescriptor;
use crate::record::{Record, compare_values, field, is_ordered, record_matches};

// Below this many rows the filter scan stays on the calling thread.
const PARALLEL_FILTER_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Active sort column and direction, or none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    active: Option<(String, SortDirection)>,
}

impl SortState {
    pub fn unsorted() -> Self {
        SortState { active: None }
    }

    pub fn ascending(key: impl Into<String>) -> Self {
        SortState {
            active: Some((key.into(), SortDirection::Ascending)),
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        SortState {
            active: Some((key.into(), SortDirection::Descending)),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.active.as_ref().map(|(k, _)| k.as_str())
    }

    pub fn direction(&self) -> Option<SortDirection> {
        self.active.as_ref().map(|(_, d)| *d)
    }

    /// Direction for `key` if that column is the active one.
    pub fn direction_of(&self, key: &str) -> Option<SortDirection> {
        match &self.active {
            Some((k, d)) if k == key => Some(*d),
            _ => None,
        }
    }

    /// Next state after activating column `key`.
    ///
    /// unsorted -> asc(key) -> desc(key) -> unsorted; another column always
    /// restarts at asc.
    pub fn clicked(&self, key: &str) -> Self {
        match &self.active {
            Some((k, SortDirection::Ascending)) if k == key => Self::descending(key),
            Some((k, SortDirection::Descending)) if k == key => Self::unsorted(),
            _ => Self::ascending(key),
        }
    }
}

/// Records (by reference) whose fields contain `query`, ignoring case.
pub fn filter<'a>(records: &'a [Record], query: &str) -> Vec<&'a Record> {
    let all: Vec<usize> = (0..records.len()).collect();
    filter_rows(records, &all, query)
        .into_iter()
        .map(|idx| &records[idx])
        .collect()
}

/// Records (by reference) ordered by `sort`. Ties keep input order.
pub fn sort<'a>(records: &'a [Record], sort: &SortState) -> Vec<&'a Record> {
    let all: Vec<usize> = (0..records.len()).collect();
    sort_rows(records, all, sort)
        .into_iter()
        .map(|idx| &records[idx])
        .collect()
}

/// Display value of `record` in `column`.
pub fn render(record: &Record, column: &ColumnDescriptor) -> String {
    column.display(record)
}

pub fn summarize(shown: usize, total: usize) -> String {
    format!("Showing {} of {} results", shown.min(total), total)
}

/// Subset of `rows` (indices into `records`) whose record matches `query`.
pub fn filter_rows(records: &[Record], rows: &[usize], query: &str) -> Vec<usize> {
    if query.is_empty() {
        return rows.to_vec();
    }
    let needle = query.to_lowercase();
    if rows.len() < PARALLEL_FILTER_THRESHOLD {
        rows.iter()
            .copied()
            .filter(|&idx| record_matches(&records[idx], &needle))
            .collect()
    } else {
        // Indexed parallel iterators keep their order on collect.
        rows.par_iter()
            .copied()
            .filter(|&idx| record_matches(&records[idx], &needle))
            .collect()
    }
}

/// `rows` ordered by the values under the active sort key.
///
/// Unordered values (null, missing, nested) stay after all ordered ones in
/// both directions. Equal keys keep their input order.
pub fn sort_rows(records: &[Record], mut rows: Vec<usize>, sort: &SortState) -> Vec<usize> {
    let Some((key, direction)) = &sort.active else {
        return rows;
    };
    rows.sort_by(|a, b| {
        let va = field(&records[*a], key);
        let vb = field(&records[*b], key);
        let ord = compare_values(va, vb);
        match direction {
            SortDirection::Descending if is_ordered(va) && is_ordered(vb) => ord.reverse(),
            _ => ord,
        }
    });
    rows
}

/// Search/sort state and derived row order for one on-screen table.
///
/// `rows` maps view positions to indices in `records`. The records
/// themselves are shared and never modified.
#[derive(Debug)]
pub struct TableView {
    records: Arc<Vec<Record>>,
    columns: Vec<ColumnDescriptor>,
    query: String,
    sort: SortState,
    rows: Arc<Vec<usize>>,
}

impl TableView {
    pub fn new(records: Arc<Vec<Record>>, columns: Vec<ColumnDescriptor>) -> Self {
        let mut view = TableView {
            records,
            columns,
            query: String::new(),
            sort: SortState::unsorted(),
            rows: Arc::new(Vec::new()),
        };
        view.rebuild();
        view
    }

    pub fn empty(columns: Vec<ColumnDescriptor>) -> Self {
        Self::new(Arc::new(Vec::new()), columns)
    }

    /// Replace the upstream records, keeping query and sort.
    pub fn set_records(&mut self, records: Arc<Vec<Record>>) {
        self.records = records;
        self.rebuild();
    }

    pub fn set_query(&mut self, query: &str) {
        if self.query != query {
            self.query = query.to_string();
            self.rebuild();
        }
    }

    pub fn clear_query(&mut self) {
        self.set_query("");
    }

    /// Header activation. Returns false for unknown or non-sortable columns.
    pub fn click_column(&mut self, key: &str) -> bool {
        let sortable = self.columns.iter().any(|c| c.key == key && c.sortable);
        if !sortable {
            trace!("Ignoring sort on column {key}");
            return false;
        }
        self.sort = self.sort.clicked(key);
        trace!("Sort state is now {:?}", self.sort);
        self.rebuild();
        true
    }

    fn rebuild(&mut self) {
        let all: Vec<usize> = (0..self.records.len()).collect();
        let filtered = filter_rows(&self.records, &all, &self.query);
        self.rows = Arc::new(sort_rows(&self.records, filtered, &self.sort));
        trace!(
            "Rebuilt view: query \"{}\", {:?}, {} of {} rows",
            self.query,
            self.sort,
            self.rows.len(),
            self.records.len()
        );
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, view_idx: usize) -> Option<&Record> {
        self.rows.get(view_idx).map(|&idx| &self.records[idx])
    }

    pub fn cell(&self, view_idx: usize, column_idx: usize) -> Option<String> {
        let record = self.record(view_idx)?;
        let column = self.columns.get(column_idx)?;
        Some(render(record, column))
    }

    /// Filtered and sorted records in view order.
    pub fn visible_records(&self) -> impl Iterator<Item = &Record> {
        self.rows.iter().map(|&idx| &self.records[idx])
    }

    pub fn summary(&self) -> String {
        summarize(self.len(), self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use serde_json::json;

    fn records(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn people() -> Vec<Record> {
        records(vec![
            json!({"name": "Bob", "age": 30}),
            json!({"name": "Al", "age": 25}),
            json!({"name": "Cy", "age": 25}),
        ])
    }

    fn names<'a>(rows: impl IntoIterator<Item = &'a Record>) -> Vec<String> {
        rows.into_iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::sorted("name", "Name"),
            ColumnDescriptor::sorted("age", "Age"),
            ColumnDescriptor::new("note", "Note"),
        ]
    }

    #[test]
    fn empty_query_is_identity() {
        let r = people();
        assert_eq!(filter(&r, ""), r.iter().collect::<Vec<_>>());
    }

    #[test]
    fn filter_keeps_exactly_the_matches() {
        let r = records(vec![
            json!({"name": "Bob", "city": "Linz"}),
            json!({"name": "Al", "city": "BOLZANO"}),
            json!({"name": "Cy", "city": "Wien", "zip": 1010}),
        ]);
        assert_eq!(names(filter(&r, "bo")), vec!["Bob", "Al"]);
        assert_eq!(names(filter(&r, "101")), vec!["Cy"]);
        assert!(filter(&r, "xyz").is_empty());
    }

    #[test]
    fn filter_searches_nested_objects() {
        let r = records(vec![
            json!({"name": "Acme", "address": {"city": "Graz"}}),
            json!({"name": "Bolt", "address": null}),
        ]);
        assert_eq!(names(filter(&r, "graz")), vec!["Acme"]);
    }

    #[test]
    fn filter_large_input_keeps_order() {
        let r: Vec<Record> = (0..10_000)
            .map(|i| {
                let tag = if i % 3 == 0 { "hit" } else { "miss" };
                json!({"n": i, "tag": tag})
            })
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        let hits: Vec<i64> = filter(&r, "HIT")
            .into_iter()
            .map(|r| r["n"].as_i64().unwrap())
            .collect();
        assert_eq!(hits.len(), 3334);
        assert!(hits.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn unsorted_is_input_order() {
        let r = people();
        assert_eq!(names(sort(&r, &SortState::unsorted())), vec!["Bob", "Al", "Cy"]);
    }

    #[test]
    fn sort_is_stable_both_directions() {
        let r = people();
        assert_eq!(names(sort(&r, &SortState::ascending("age"))), vec!["Al", "Cy", "Bob"]);
        assert_eq!(names(sort(&r, &SortState::descending("age"))), vec!["Bob", "Al", "Cy"]);
    }

    #[test]
    fn sort_is_a_permutation_even_with_mixed_values() {
        let r = records(vec![
            json!({"k": "pear"}),
            json!({"k": "apple"}),
            json!({"k": null}),
            json!({}),
            json!({"k": "fig"}),
            json!({"k": 3}),
            json!({"k": "apple"}),
        ]);
        for state in [SortState::ascending("k"), SortState::descending("k")] {
            let mut order = sort_rows(&r, (0..r.len()).collect(), &state);
            order.sort_unstable();
            assert_eq!(order, (0..r.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn sort_is_idempotent() {
        let r = records(vec![
            json!({"k": "pear", "n": 1}),
            json!({"k": "apple", "n": 2}),
            json!({"k": "fig", "n": 3}),
            json!({"k": "apple", "n": 4}),
            json!({"k": "kiwi", "n": 5}),
        ]);
        for state in [SortState::ascending("k"), SortState::descending("k")] {
            let once = sort_rows(&r, (0..r.len()).collect(), &state);
            let twice = sort_rows(&r, once.clone(), &state);
            assert_eq!(once, twice);
        }
        let asc = sort_rows(&r, (0..r.len()).collect(), &SortState::ascending("k"));
        assert_eq!(asc, vec![1, 3, 2, 4, 0]);
    }

    #[test]
    fn unordered_values_sort_last_both_directions() {
        let r = records(vec![json!({"v": 2}), json!({"v": null}), json!({"v": 1})]);
        let asc = sort_rows(&r, vec![0, 1, 2], &SortState::ascending("v"));
        assert_eq!(asc, vec![2, 0, 1]);
        let desc = sort_rows(&r, vec![0, 1, 2], &SortState::descending("v"));
        assert_eq!(desc, vec![0, 2, 1]);
        // Missing keys only: input order.
        let order = sort_rows(&r, vec![0, 1, 2], &SortState::ascending("missing"));
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn nulls_between_equal_values_keep_them_stable() {
        let r = records(vec![
            json!({"v": 2}),
            json!({"v": null}),
            json!({"v": 1}),
            json!({"v": 1}),
            json!({"v": null}),
            json!({"v": null}),
            json!({"v": null}),
        ]);
        let all: Vec<usize> = (0..r.len()).collect();
        let asc = sort_rows(&r, all.clone(), &SortState::ascending("v"));
        assert_eq!(asc, vec![2, 3, 0, 1, 4, 5, 6]);
        let desc = sort_rows(&r, all, &SortState::descending("v"));
        assert_eq!(desc, vec![0, 2, 3, 1, 4, 5, 6]);
        for (state, once) in [
            (SortState::ascending("v"), asc),
            (SortState::descending("v"), desc),
        ] {
            assert_eq!(sort_rows(&r, once.clone(), &state), once);
        }
    }

    #[test]
    fn stable_and_idempotent_over_mixed_values() {
        let pool = [json!(null), json!(1), json!(2), json!("a"), json!("b")];
        let n = 5;
        for code in 0..pool.len().pow(n as u32) {
            let mut c = code;
            let r: Vec<Record> = (0..n)
                .map(|_| {
                    let v = pool[c % pool.len()].clone();
                    c /= pool.len();
                    json!({ "v": v }).as_object().cloned().unwrap()
                })
                .collect();
            for state in [SortState::ascending("v"), SortState::descending("v")] {
                let once = sort_rows(&r, (0..n).collect(), &state);
                assert_eq!(sort_rows(&r, once.clone(), &state), once, "{r:?}");
                for w in once.windows(2) {
                    if r[w[0]]["v"] == r[w[1]]["v"] {
                        assert!(w[0] < w[1], "{r:?} {once:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn sort_cycle() {
        let s0 = SortState::unsorted();
        let s1 = s0.clicked("age");
        let s2 = s1.clicked("age");
        let s3 = s2.clicked("age");
        let s4 = s3.clicked("age");
        assert_eq!(s1, SortState::ascending("age"));
        assert_eq!(s2, SortState::descending("age"));
        assert_eq!(s3, SortState::unsorted());
        assert_eq!(s4, s1);
        assert_eq!(s2.clicked("name"), SortState::ascending("name"));
        assert_eq!(s1.clicked("name"), SortState::ascending("name"));
    }

    #[test]
    fn summary_label() {
        assert_eq!(summarize(1, 3), "Showing 1 of 3 results");
        assert_eq!(summarize(0, 0), "Showing 0 of 0 results");
    }

    #[test]
    fn table_view_scenario() {
        let mut view = TableView::new(Arc::new(people()), columns());
        assert_eq!(view.len(), 3);
        assert_eq!(names(view.visible_records()), vec!["Bob", "Al", "Cy"]);

        assert!(view.click_column("age"));
        assert_eq!(names(view.visible_records()), vec!["Al", "Cy", "Bob"]);

        assert!(view.click_column("age"));
        assert_eq!(names(view.visible_records()), vec!["Bob", "Al", "Cy"]);

        view.set_query("bo");
        assert_eq!(names(view.visible_records()), vec!["Bob"]);
        assert_eq!(view.summary(), "Showing 1 of 3 results");

        assert!(view.click_column("age"));
        view.clear_query();
        assert_eq!(names(view.visible_records()), vec!["Bob", "Al", "Cy"]);
    }

    #[test]
    fn non_sortable_and_unknown_columns_are_ignored() {
        let mut view = TableView::new(Arc::new(people()), columns());
        assert!(!view.click_column("note"));
        assert!(!view.click_column("nope"));
        assert_eq!(view.sort_state(), &SortState::unsorted());
    }

    #[test]
    fn new_records_keep_query_and_sort() {
        let mut view = TableView::new(Arc::new(people()), columns());
        view.click_column("name");
        view.set_query("y");
        let mut more = people();
        more.extend(records(vec![json!({"name": "Ay", "age": 40})]));
        view.set_records(Arc::new(more));
        assert_eq!(names(view.visible_records()), vec!["Ay", "Cy"]);
        assert_eq!(view.total(), 4);
    }

    #[test]
    fn cells_render_through_columns() {
        let cols = vec![
            ColumnDescriptor::sorted("name", "Name"),
            ColumnDescriptor::new("age", "Age").with_render(|v, _| format!("{} yrs", v)),
        ];
        let view = TableView::new(Arc::new(people()), cols);
        assert_eq!(view.cell(1, 0).as_deref(), Some("Al"));
        assert_eq!(view.cell(1, 1).as_deref(), Some("25 yrs"));
        assert_eq!(view.cell(5, 0), None);
        assert_eq!(view.cell(0, 9), None);
    }

    #[test]
    fn views_are_isolated() {
        let shared = Arc::new(people());
        let mut a = TableView::new(Arc::clone(&shared), columns());
        let b = TableView::new(shared, columns());
        a.set_query("al");
        a.click_column("age");
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 3);
        assert_eq!(b.sort_state(), &SortState::unsorted());
    }
}

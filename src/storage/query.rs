// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filtered, sorted, paginated reads over replica collections.
//!
//! Filters are equality matches on (optionally dotted) field paths of the
//! stored JSON document. Sorting defaults to `timestamp` descending; ties
//! are broken by natural key ascending so paging is deterministic.

use std::cmp::Ordering;

use serde_json::Value;

use crate::replication::compare::values_match;

/// Default number of documents per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Sort specification: one field, one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: "timestamp".to_string(),
            order: SortOrder::Desc,
        }
    }
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Conjunction of field equality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` (dotted path allowed) to equal `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            lookup(document, field)
                .map(|actual| values_match(expected, actual))
                .unwrap_or(false)
        })
    }
}

/// Options for a `find` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOptions {
    pub filter: Filter,
    pub sort: Sort,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            sort: Sort::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FindOptions {
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    fn effective_page(&self) -> usize {
        self.page.max(1)
    }

    fn effective_page_size(&self) -> usize {
        match self.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        }
    }

    /// Apply filter, sort and paging to `(natural_key, document)` pairs.
    pub fn paginate(&self, documents: Vec<(String, Value)>) -> Page<Value> {
        let mut matching: Vec<(String, Value)> = documents
            .into_iter()
            .filter(|(_, doc)| self.filter.matches(doc))
            .collect();

        let field = self.sort.field.as_str();
        let order = self.sort.order;
        matching.sort_by(|(key_a, a), (key_b, b)| {
            let primary = compare_fields(lookup(a, field), lookup(b, field));
            let primary = match order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| key_a.cmp(key_b))
        });

        let total = matching.len();
        let page = self.effective_page();
        let page_size = self.effective_page_size();
        let items = matching
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .map(|(_, doc)| doc)
            .collect();

        Page {
            items,
            page,
            page_size,
            total,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    /// Number of documents matching the filter across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            page: self.page,
            page_size: self.page_size,
            total: self.total,
        })
    }
}

fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

/// Missing and null sort first, then booleans, numbers, strings.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs() -> Vec<(String, Value)> {
        vec![
            ("a".into(), json!({ "owner": "u1", "timestamp": 10, "policy": { "protectionType": "SMPC" } })),
            ("b".into(), json!({ "owner": "u2", "timestamp": 30 })),
            ("c".into(), json!({ "owner": "u1", "timestamp": 20 })),
            ("d".into(), json!({ "owner": "u1" })),
        ]
    }

    fn keys(page: &Page<Value>) -> Vec<i64> {
        page.items
            .iter()
            .map(|d| d.get("timestamp").and_then(Value::as_i64).unwrap_or(-1))
            .collect()
    }

    #[test]
    fn default_sort_is_timestamp_descending() {
        let page = FindOptions::default().paginate(docs());
        assert_eq!(keys(&page), vec![30, 20, 10, -1]);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn filter_and_paging() {
        let options = FindOptions::default()
            .with_filter(Filter::new().eq("owner", "u1"))
            .with_page(2, 2);
        let page = options.paginate(docs());
        assert_eq!(page.total, 3);
        assert_eq!(keys(&page), vec![-1]);
    }

    #[test]
    fn nested_filter_path() {
        let options =
            FindOptions::default().with_filter(Filter::new().eq("policy.protectionType", "SMPC"));
        let page = options.paginate(docs());
        assert_eq!(keys(&page), vec![10]);
    }

    #[test]
    fn ties_break_on_natural_key() {
        let docs = vec![
            ("z".into(), json!({ "timestamp": 1 })),
            ("m".into(), json!({ "timestamp": 1 })),
        ];
        let page = FindOptions::default()
            .with_sort(Sort::asc("timestamp"))
            .paginate(docs.clone());
        let again = FindOptions::default()
            .with_sort(Sort::asc("timestamp"))
            .paginate(docs.into_iter().rev().collect());
        assert_eq!(page.items, again.items);
    }

    #[test]
    fn page_size_is_clamped() {
        let options = FindOptions::default().with_page(0, 10_000);
        assert_eq!(options.effective_page(), 1);
        assert_eq!(options.effective_page_size(), MAX_PAGE_SIZE);
        assert_eq!(FindOptions::default().with_page(1, 0).effective_page_size(), DEFAULT_PAGE_SIZE);
    }
}

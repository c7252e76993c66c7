//! Filter → sort → paginate pipeline shared by every listing.

mod schema;

pub use schema::{FilterField, Match, QuerySchema, SortKey};

use std::collections::BTreeMap;

use serde::Serialize;

pub const SORT_PARAM: &str = "sort";
pub const PAGE_PARAM: &str = "page";
pub const PER_PAGE_PARAM: &str = "perpage";

/// Raw listing parameters as received from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    filters: BTreeMap<String, String>,
    sort: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits query-string pairs into paging, sorting, and filter parameters.
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut query = Self::default();
        for (key, value) in params {
            let key = key.into();
            let value = value.into();
            match key.as_str() {
                SORT_PARAM => query.sort = Some(value),
                PAGE_PARAM => query.page = Some(value),
                PER_PAGE_PARAM => query.per_page = Some(value),
                _ => {
                    query.filters.insert(key, value);
                }
            }
        }
        query
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    pub fn sorted_by(mut self, key: impl Into<String>) -> Self {
        self.sort = Some(key.into());
        self
    }

    pub fn page(mut self, page: impl ToString) -> Self {
        self.page = Some(page.to_string());
        self
    }

    pub fn per_page(mut self, per_page: impl ToString) -> Self {
        self.per_page = Some(per_page.to_string());
        self
    }

    pub fn filter_value(&self, name: &str) -> Option<&str> {
        self.filters.get(name).map(String::as_str)
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.sort.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("`{param}` must be a positive integer (found '{value}')")]
    InvalidNumber { param: &'static str, value: String },
    #[error("`perpage` may not exceed {max} (found {requested})")]
    PageSizeTooLarge { requested: usize, max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_per_page: usize,
    pub max_per_page: usize,
}

/// Validated, 1-indexed page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    pub fn parse(query: &ListQuery, limits: PageLimits) -> Result<Self, QueryError> {
        let page = match query.page.as_deref() {
            Some(raw) => positive(PAGE_PARAM, raw)?,
            None => 1,
        };
        let per_page = match query.per_page.as_deref() {
            Some(raw) => positive(PER_PAGE_PARAM, raw)?,
            None => limits.default_per_page,
        };
        if per_page > limits.max_per_page {
            return Err(QueryError::PageSizeTooLarge {
                requested: per_page,
                max: limits.max_per_page,
            });
        }
        Ok(Self { page, per_page })
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

fn positive(param: &'static str, raw: &str) -> Result<usize, QueryError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(QueryError::InvalidNumber {
            param,
            value: raw.to_string(),
        }),
    }
}

/// One page of a listing plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub page: usize,
    pub per_page: usize,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            per_page: self.per_page,
            results: self.results.into_iter().map(f).collect(),
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            count: self.count,
            page: self.page,
            per_page: self.per_page,
            results: self.results.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

/// Runs the pipeline. Parameters are validated before any record is touched;
/// a page past the end yields an empty `results`.
pub fn execute<R>(
    records: Vec<R>,
    schema: &QuerySchema<R>,
    query: &ListQuery,
    limits: PageLimits,
) -> Result<Page<R>, QueryError> {
    let request = PageRequest::parse(query, limits)?;

    let active: Vec<(&FilterField<R>, &str)> = query
        .filters
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .filter_map(|(name, value)| schema.filter(name).map(|field| (field, value.as_str())))
        .collect();

    let mut matched: Vec<R> = records
        .into_iter()
        .filter(|record| active.iter().all(|(field, value)| field.accepts(record, value)))
        .collect();

    let sort = schema.resolve_sort(query.sort_key());
    matched.sort_by(sort.compare);

    let count = matched.len();
    let results = matched
        .into_iter()
        .skip(request.offset())
        .take(request.per_page)
        .collect();

    Ok(Page {
        count,
        page: request.page,
        per_page: request.per_page,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u32,
        name: String,
        kind: &'static str,
    }

    fn name(row: &Row) -> &str {
        &row.name
    }

    fn kind(row: &Row) -> &str {
        row.kind
    }

    fn by_id(a: &Row, b: &Row) -> Ordering {
        a.id.cmp(&b.id)
    }

    fn by_name(a: &Row, b: &Row) -> Ordering {
        a.name.cmp(&b.name).then_with(|| by_id(a, b))
    }

    fn schema() -> QuerySchema<Row> {
        QuerySchema {
            filters: vec![
                FilterField::contains("name", name),
                FilterField::exact("kind", kind),
            ],
            sort_keys: vec![SortKey::new("id", by_id), SortKey::new("name", by_name)],
            default_sort: SortKey::new("id", by_id),
        }
    }

    fn row(id: u32, name: &str, kind: &'static str) -> Row {
        Row {
            id,
            name: name.to_string(),
            kind,
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            row(3, "Charlie", "employer"),
            row(1, "alice", "applicant"),
            row(4, "Malice", "applicant"),
            row(2, "bob", "employer"),
        ]
    }

    const LIMITS: PageLimits = PageLimits {
        default_per_page: 10,
        max_per_page: 50,
    };

    fn ids(page: &Page<Row>) -> Vec<u32> {
        page.results.iter().map(|row| row.id).collect()
    }

    #[test]
    fn filters_are_case_insensitive_and_combined() {
        let query = ListQuery::new()
            .with_filter("name", "ALIC")
            .with_filter("kind", "Applicant");
        let page = execute(rows(), &schema(), &query, LIMITS).expect("runs");
        assert_eq!(ids(&page), vec![1, 4]);
        assert_eq!(page.count, 2);
    }

    #[test]
    fn unknown_and_empty_filters_are_ignored() {
        let query = ListQuery::new()
            .with_filter("salary", "5000")
            .with_filter("name", "");
        let page = execute(rows(), &schema(), &query, LIMITS).expect("runs");
        assert_eq!(page.count, 4);
    }

    #[test]
    fn exact_filter_does_not_match_substrings() {
        let query = ListQuery::new().with_filter("kind", "employ");
        let page = execute(rows(), &schema(), &query, LIMITS).expect("runs");
        assert!(page.results.is_empty());
    }

    #[test]
    fn unsupported_sort_falls_back_to_default() {
        let query = ListQuery::new().sorted_by("-name");
        let page = execute(rows(), &schema(), &query, LIMITS).expect("runs");
        assert_eq!(ids(&page), vec![1, 2, 3, 4]);

        let by_name = ListQuery::new().sorted_by("name");
        let page = execute(rows(), &schema(), &by_name, LIMITS).expect("runs");
        assert_eq!(ids(&page), vec![3, 4, 1, 2]);
    }

    #[test]
    fn paginates_and_reports_total() {
        let query = ListQuery::new().page(2).per_page(3);
        let page = execute(rows(), &schema(), &query, LIMITS).expect("runs");
        assert_eq!(ids(&page), vec![4]);
        assert_eq!(page.count, 4);
        assert_eq!((page.page, page.per_page), (2, 3));
    }

    #[test]
    fn page_past_the_end_is_empty() {
        for page_number in [3, 10, 1_000_000] {
            let query = ListQuery::new().page(page_number).per_page(2);
            let page = execute(rows(), &schema(), &query, LIMITS).expect("runs");
            assert!(page.results.is_empty());
            assert_eq!(page.count, 4);
        }
    }

    #[test]
    fn rejects_malformed_paging() {
        let cases = [
            ("page", "0"),
            ("page", "two"),
            ("perpage", "0"),
            ("perpage", "-5"),
        ];
        for (param, value) in cases {
            let query = ListQuery::from_params([(param, value)]);
            match execute(rows(), &schema(), &query, LIMITS) {
                Err(QueryError::InvalidNumber { param: reported, .. }) => {
                    assert_eq!(reported, param)
                }
                other => panic!("expected invalid number for {param}={value}, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_oversized_pages() {
        let query = ListQuery::new().per_page(51);
        assert_eq!(
            execute(rows(), &schema(), &query, LIMITS),
            Err(QueryError::PageSizeTooLarge {
                requested: 51,
                max: 50
            })
        );
    }

    #[test]
    fn from_params_separates_reserved_keys() {
        let query = ListQuery::from_params([
            ("title", "rust"),
            ("sort", "salary"),
            ("page", "2"),
            ("perpage", "4"),
        ]);
        assert_eq!(query.filter_value("title"), Some("rust"));
        assert_eq!(query.filter_value("sort"), None);
        assert_eq!(query.sort_key(), Some("salary"));
        let request = PageRequest::parse(&query, LIMITS).expect("valid paging");
        assert_eq!(
            request,
            PageRequest {
                page: 2,
                per_page: 4,
            }
        );
    }
}

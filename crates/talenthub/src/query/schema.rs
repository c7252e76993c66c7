use std::cmp::Ordering;

/// How a filter parameter is compared against the record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Case-insensitive substring.
    Contains,
    /// Case-insensitive equality.
    Exact,
}

/// A named predicate a listing accepts as a query parameter.
pub struct FilterField<R> {
    pub name: &'static str,
    pub matching: Match,
    pub value: fn(&R) -> &str,
}

impl<R> FilterField<R> {
    pub fn contains(name: &'static str, value: fn(&R) -> &str) -> Self {
        Self {
            name,
            matching: Match::Contains,
            value,
        }
    }

    pub fn exact(name: &'static str, value: fn(&R) -> &str) -> Self {
        Self {
            name,
            matching: Match::Exact,
            value,
        }
    }

    pub fn accepts(&self, record: &R, needle: &str) -> bool {
        let field = (self.value)(record).to_lowercase();
        let needle = needle.to_lowercase();
        match self.matching {
            Match::Contains => field.contains(&needle),
            Match::Exact => field == needle,
        }
    }
}

pub struct SortKey<R> {
    pub name: &'static str,
    pub compare: fn(&R, &R) -> Ordering,
}

impl<R> SortKey<R> {
    pub fn new(name: &'static str, compare: fn(&R, &R) -> Ordering) -> Self {
        Self { name, compare }
    }
}

/// Filters and orderings a resource listing supports.
pub struct QuerySchema<R> {
    pub filters: Vec<FilterField<R>>,
    /// Caller-selectable orderings; empty when the order is fixed.
    pub sort_keys: Vec<SortKey<R>>,
    pub default_sort: SortKey<R>,
}

impl<R> QuerySchema<R> {
    /// Unknown or missing keys resolve to the default ordering.
    pub fn resolve_sort(&self, requested: Option<&str>) -> &SortKey<R> {
        requested
            .and_then(|name| self.sort_keys.iter().find(|key| key.name == name))
            .unwrap_or(&self.default_sort)
    }

    pub fn filter(&self, name: &str) -> Option<&FilterField<R>> {
        self.filters.iter().find(|field| field.name == name)
    }
}

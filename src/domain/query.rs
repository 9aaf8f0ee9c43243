//! Find-many arguments: equality filter, sort key and pagination.
//!
//! The SQL store translates these into `WHERE` / `ORDER BY` / `LIMIT`
//! clauses; the functions here evaluate the same semantics in process.

use std::cmp::Ordering;

use super::record::Record;
use super::schema::Column;
use super::value::FieldValue;

/// `column = value`, or `column IS NULL` when the value is null.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: Column,
    pub value: FieldValue,
}

/// Conjunction of equality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition, builder style.
    pub fn and(mut self, column: Column, value: FieldValue) -> Self {
        self.conditions.push(Condition { column, value });
        self
    }

    /// Whether a record satisfies every condition.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|c| record.get(c.column.name) == c.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey {
    pub column: Column,
    pub direction: SortDirection,
}

/// Filter, sort and pagination of a list query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindManyArgs {
    pub filter: Filter,
    pub sort: Option<SortKey>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl FindManyArgs {
    /// Order two records: by the sort key (nulls last ascending, first
    /// descending), then by id.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let primary = match &self.sort {
            Some(sort) => {
                let ordering = a.get(sort.column.name).compare(&b.get(sort.column.name));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            }
            None => Ordering::Equal,
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Filter, sort and paginate an in-memory set of records.
    pub fn apply<I>(&self, records: I) -> Vec<Record>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut matched: Vec<Record> = records
            .into_iter()
            .filter(|r| self.filter.matches(r))
            .collect();
        matched.sort_by(|a, b| self.compare(a, b));

        let skip = self.skip.unwrap_or(0) as usize;
        let take = self.take.map(|t| t as usize).unwrap_or(usize::MAX);
        matched.into_iter().skip(skip).take(take).collect()
    }
}

//! The fluent select query builder.
//!
//! A `Query` accumulates select columns, tables, criteria, grouping,
//! ordering, and limits, and renders them to SQL text. `to_sql` renders
//! the clause suffix (everything from `WHERE` on); the `Display`
//! implementation renders the full `SELECT ... FROM ...` statement.

use std::fmt;

use strata_common::inflect;

use crate::criteria::{Criteria, Literal, Operator};

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Ascending order.
    Asc,
    /// Descending order; the default when unspecified.
    #[default]
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Criteria based select query interface.
///
/// Every chainable call consumes and returns the builder. List-shaped
/// state (`select`, `where_*`) accumulates across calls; single-value
/// state (`order_by`, `group_by`, `having`, `limit`) overwrites.
#[derive(Debug, Clone, Default)]
pub struct Query {
    select_fields: Vec<String>,
    table_names: Vec<String>,
    where_clauses: Vec<Criteria>,
    order_by: Option<String>,
    order_dir: Direction,
    group_by: Option<String>,
    having: Option<Criteria>,
    limit: Option<(i64, i64)>,
}

impl Query {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the given columns from the target table.
    ///
    /// Columns merge with any previously selected fields; an empty
    /// iterator is a no-op that still yields the default `*` rendering.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_fields.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Selects a column with the result as the given alias.
    pub fn select_as(self, column: &str, alias: &str) -> Self {
        self.select([format!("{column} AS {alias}")])
    }

    /// Selects a subquery with the result as the given alias.
    pub fn select_subquery(self, query: &Query, alias: &str) -> Self {
        self.select([format!("({query}) AS {alias}")])
    }

    /// Selects a count of the `id` column, aliased as `count`.
    pub fn select_count(self) -> Self {
        self.select(["COUNT(id) AS count".to_string()])
    }

    /// Selects a count of the given column, aliased as the column.
    pub fn select_count_of(self, column: &str) -> Self {
        self.select([format!("COUNT({column}) AS {column}")])
    }

    /// Selects the distinct values of the given column.
    pub fn distinct(self, column: &str) -> Self {
        self.select([format!("DISTINCT({column}) AS {column}")])
    }

    /// Sets the table list, replacing any previous one.
    pub fn from<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_names = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the primary (first) table of the query, if set.
    pub fn primary_table(&self) -> Option<&str> {
        self.table_names.first().map(String::as_str)
    }

    /// Adds a generic predicate whose value renders bare.
    ///
    /// This is the caller-literal escape hatch: `where_expr("key",
    /// Operator::Equal, "1")` renders `key = 1`, unquoted, where
    /// [`Query::where_equals`] would quote. Both conventions are part of
    /// the builder's contract.
    pub fn where_expr(mut self, field: &str, operator: Operator, value: impl Into<Literal>) -> Self {
        self.where_clauses.push(Criteria::join(field, operator, value));
        self
    }

    /// Adds a join connection between two keys, e.g.
    /// `trailers.movie_id = movies.id`.
    pub fn where_join(mut self, left: &str, right: &str) -> Self {
        self.where_clauses
            .push(Criteria::join(left, Operator::Equal, right));
        self
    }

    /// Adds an equals clause to the query.
    pub fn where_equals(mut self, key: &str, value: impl Into<Literal>) -> Self {
        self.where_clauses
            .push(Criteria::scalar(key, Operator::Equal, value));
        self
    }

    /// Adds a not-equals clause to the query.
    pub fn where_not_equals(mut self, key: &str, value: impl Into<Literal>) -> Self {
        self.where_clauses
            .push(Criteria::scalar(key, Operator::NotEqual, value));
        self
    }

    /// Column matches the given value using `LIKE '%value%'`.
    pub fn where_like(mut self, key: &str, value: &str) -> Self {
        self.where_clauses
            .push(Criteria::scalar(key, Operator::Like, format!("%{value}%")));
        self
    }

    /// Column does not match the given value using `NOT LIKE '%value%'`.
    pub fn where_not_like(mut self, key: &str, value: &str) -> Self {
        self.where_clauses
            .push(Criteria::scalar(key, Operator::NotLike, format!("%{value}%")));
        self
    }

    /// Column is greater than the given value.
    pub fn where_greater_than(mut self, key: &str, value: impl Into<Literal>) -> Self {
        self.where_clauses
            .push(Criteria::scalar(key, Operator::GreaterThan, value));
        self
    }

    /// Column is greater than or equal to the given value.
    pub fn where_greater_than_equal(mut self, key: &str, value: impl Into<Literal>) -> Self {
        self.where_clauses
            .push(Criteria::scalar(key, Operator::GreaterThanEqual, value));
        self
    }

    /// Column is less than the given value.
    pub fn where_less_than(mut self, key: &str, value: impl Into<Literal>) -> Self {
        self.where_clauses
            .push(Criteria::scalar(key, Operator::LessThan, value));
        self
    }

    /// Column is less than or equal to the given value.
    pub fn where_less_than_equal(mut self, key: &str, value: impl Into<Literal>) -> Self {
        self.where_clauses
            .push(Criteria::scalar(key, Operator::LessThanEqual, value));
        self
    }

    /// Column lies within the given inclusive range.
    pub fn where_within_range(
        mut self,
        key: &str,
        lower: impl Into<Literal>,
        upper: impl Into<Literal>,
    ) -> Self {
        self.where_clauses
            .push(Criteria::range(key, Operator::Between, lower, upper));
        self
    }

    /// Column lies outside the given inclusive range.
    pub fn where_not_within_range(
        mut self,
        key: &str,
        lower: impl Into<Literal>,
        upper: impl Into<Literal>,
    ) -> Self {
        self.where_clauses
            .push(Criteria::range(key, Operator::NotBetween, lower, upper));
        self
    }

    /// Orders the query results by the given column. Overwrites any
    /// previous ordering.
    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(inflect::property_to_column(field));
        self
    }

    /// Sorts query results in ascending order.
    pub fn asc(mut self) -> Self {
        self.order_dir = Direction::Asc;
        self
    }

    /// Sorts query results in descending order.
    pub fn desc(mut self) -> Self {
        self.order_dir = Direction::Desc;
        self
    }

    /// Groups the query results by the given column.
    pub fn group_by(mut self, field: &str) -> Self {
        self.group_by = Some(inflect::property_to_column(field));
        self
    }

    /// Adds a HAVING predicate; the value renders bare.
    pub fn having(mut self, field: &str, operator: Operator, value: impl Into<Literal>) -> Self {
        self.having = Some(Criteria::join(field, operator, value));
        self
    }

    /// Limits the query results to the given range. Both bounds are
    /// required; repeated calls overwrite.
    pub fn limit(mut self, lower: i64, upper: i64) -> Self {
        self.limit = Some((lower, upper));
        self
    }

    /// Renders the clause suffix: `WHERE` through `LIMIT`, in fixed
    /// order, with predicates joined by `AND` in insertion order.
    pub fn to_sql(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !self.where_clauses.is_empty() {
            let predicates: Vec<String> =
                self.where_clauses.iter().map(Criteria::render).collect();
            parts.push(format!("WHERE {}", predicates.join(" AND ")));
        }
        if let Some(field) = &self.group_by {
            parts.push(format!("GROUP BY {field}"));
        }
        if let Some(criteria) = &self.having {
            parts.push(format!("HAVING {}", criteria.render()));
        }
        if let Some(field) = &self.order_by {
            parts.push(format!("ORDER BY {field} {}", self.order_dir.as_sql()));
        }
        if let Some((lower, upper)) = self.limit {
            parts.push(format!("LIMIT {lower},{upper}"));
        }
        parts.join(" ")
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = if self.select_fields.is_empty() {
            "*".to_string()
        } else {
            self.select_fields.join(",")
        };
        write!(f, "SELECT {} FROM {}", fields, self.table_names.join(","))?;

        let suffix = self.to_sql();
        if !suffix.is_empty() {
            write!(f, " {suffix}")?;
        }
        Ok(())
    }
}

//! Criteria objects: single predicates in a WHERE or HAVING clause.

use std::fmt;

use strata_common::{inflect, Value};

/// A renderable SQL literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal, always rendered bare.
    Int(i64),
    /// Float literal, always rendered bare.
    Float(f64),
    /// String literal, quoted on the scalar path.
    Str(String),
    /// Boolean literal, rendered as `1` or `0`.
    Bool(bool),
    /// NULL literal.
    Null,
}

impl Literal {
    /// Renders the literal for a scalar comparison: strings are wrapped
    /// in single quotes, numerics and booleans stay bare.
    pub fn quoted(&self) -> String {
        match self {
            Literal::Str(s) => format!("'{s}'"),
            other => other.raw(),
        }
    }

    /// Renders the literal bare, for join criteria and caller-supplied
    /// fragments that are column references rather than scalar values.
    pub fn raw(&self) -> String {
        match self {
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Str(s) => s.clone(),
            Literal::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Literal::Null => "NULL".to_string(),
        }
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(i64::from(v))
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Str(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::Str(v)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

impl From<Value> for Literal {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(b),
            Value::Int(i) => Literal::Int(i),
            Value::Float(f) => Literal::Float(f),
            other => Literal::Str(other.to_sql_literal()),
        }
    }
}

/// Match operator of a criteria predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
    /// `BETWEEN lo AND hi`
    Between,
    /// `NOT BETWEEN lo AND hi`
    NotBetween,
}

impl Operator {
    /// Returns the SQL token for this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One predicate in a WHERE or HAVING clause.
///
/// A criteria consists of a field to match on, the value to match
/// against, and an operator to express the match. The field name is
/// normalized to its underscore column form at construction; the
/// criteria is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    field: String,
    operator: Operator,
    value: Literal,
    upper: Option<Literal>,
    is_join: bool,
}

impl Criteria {
    /// Creates a scalar criteria; the value is quoted when rendered.
    pub fn scalar(field: &str, operator: Operator, value: impl Into<Literal>) -> Self {
        Self {
            field: inflect::property_to_column(field),
            operator,
            value: value.into(),
            upper: None,
            is_join: false,
        }
    }

    /// Creates a join criteria; the value renders bare, as a column
    /// reference or caller-supplied fragment.
    pub fn join(field: &str, operator: Operator, value: impl Into<Literal>) -> Self {
        Self {
            is_join: true,
            ..Self::scalar(field, operator, value)
        }
    }

    /// Creates a range criteria with both bounds.
    pub fn range(
        field: &str,
        operator: Operator,
        lower: impl Into<Literal>,
        upper: impl Into<Literal>,
    ) -> Self {
        Self {
            field: inflect::property_to_column(field),
            operator,
            value: lower.into(),
            upper: Some(upper.into()),
            is_join: false,
        }
    }

    /// Returns the normalized field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Returns true if this criteria renders its value bare.
    pub fn is_join(&self) -> bool {
        self.is_join
    }

    fn render_literal(&self, literal: &Literal) -> String {
        if self.is_join {
            literal.raw()
        } else {
            literal.quoted()
        }
    }

    /// Renders this criteria as `field operator value`.
    pub fn render(&self) -> String {
        match (&self.operator, &self.upper) {
            (Operator::Between | Operator::NotBetween, Some(upper)) => format!(
                "{} {} {} AND {}",
                self.field,
                self.operator,
                self.render_literal(&self.value),
                self.render_literal(upper)
            ),
            _ => format!(
                "{} {} {}",
                self.field,
                self.operator,
                self.render_literal(&self.value)
            ),
        }
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

//! # strata-query
//!
//! Criteria-based select query interface for Strata.
//!
//! This crate implements:
//! - The [`Criteria`] predicate model (field, operator, value, join flag)
//! - The fluent [`Query`] builder and its SQL rendering
//!
//! ## Example
//!
//! ```rust
//! use strata_query::Query;
//!
//! let query = Query::new()
//!     .select(["title", "summary"])
//!     .from(["articles"])
//!     .where_equals("title", "Hello");
//! assert_eq!(
//!     query.to_string(),
//!     "SELECT title,summary FROM articles WHERE title = 'Hello'"
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod builder;
mod criteria;

pub use builder::{Direction, Query};
pub use criteria::{Criteria, Literal, Operator};

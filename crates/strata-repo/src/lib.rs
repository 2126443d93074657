//! # strata-repo
//!
//! The repository engine for Strata: record mapping with single-table
//! inheritance and associations, the storage gateway, and the per-unit-of-work
//! identity map.
//!
//! This crate implements:
//! - The [`Adapter`] capability boundary over a raw connection
//! - The [`Gateway`] issuing SQL and hydrating rows into records
//! - The record [`SchemaRegistry`] and the [`Record`] mapping layer
//! - The [`Scope`] identity map and the [`Session`] unit-of-work context
//! - An in-memory adapter for tests and embedded callers
//!
//! ## Example
//!
//! ```rust
//! use strata_repo::{MemoryAdapter, PropertyType, SchemaDef, SchemaRegistry, Session};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(SchemaRegistry::new());
//! registry
//!     .define(SchemaDef::new("Dog").property("name", PropertyType::String))
//!     .unwrap();
//!
//! let mut session = Session::new(Box::new(MemoryAdapter::new()), registry);
//! session.create_table_for("Dog").unwrap();
//!
//! let mut dog = session.build("Dog").unwrap();
//! dog.set("name", "Jack").unwrap();
//! dog.save(&mut session).unwrap();
//! assert_eq!(dog.id(), Some(1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record;
pub mod scope;
pub mod session;
pub mod store;

pub use record::{
    join_table_name, Association, AssociationKind, PropertyAccessors, PropertyDefinition,
    PropertyType, Record, RecordSchema, SchemaDef, SchemaRegistry,
};
pub use scope::Scope;
pub use session::Session;
pub use store::{Adapter, Gateway, MemoryAdapter, RowIterator, Rows};

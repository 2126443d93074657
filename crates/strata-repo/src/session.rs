//! The unit-of-work context.
//!
//! A `Session` owns the gateway, the identity map, and a handle to the
//! schema registry for the span of one unit of work: one request, one
//! job, one test. It is constructed explicitly by the caller and passed
//! where needed; there is no process-wide instance. Sessions are
//! single-threaded and must not be shared across concurrent units of
//! work; the registry alone may be shared.

use std::sync::Arc;

use indexmap::IndexMap;

use strata_common::{inflect, StrataError, StrataResult, Value};
use strata_query::Query;

use crate::record::{join_table_name, Record, SchemaRegistry};
use crate::scope::Scope;
use crate::store::{Adapter, Gateway};

/// One unit of work: gateway + identity map + registry handle.
pub struct Session {
    gateway: Gateway,
    scope: Scope,
    registry: Arc<SchemaRegistry>,
}

impl Session {
    /// Creates a session over the given adapter and registry.
    pub fn new(adapter: Box<dyn Adapter>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            gateway: Gateway::new(adapter, registry.clone()),
            scope: Scope::new(),
            registry,
        }
    }

    /// Returns the schema registry.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Returns the gateway mutably, for direct storage operations.
    pub fn gateway_mut(&mut self) -> &mut Gateway {
        &mut self.gateway
    }

    /// Returns the identity map.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Builds a new, transient record of the named type.
    pub fn build(&self, type_name: &str) -> StrataResult<Record> {
        let schema = self
            .registry
            .get(type_name)
            .ok_or_else(|| StrataError::UnknownRecordType {
                name: type_name.to_string(),
            })?;
        Ok(Record::new(schema))
    }

    /// Loads a record by id through the identity map.
    ///
    /// The row's `type` discriminator wins over the requested type, so a
    /// base-type lookup of a subtype row yields the subtype. Fails with
    /// `RecordNotFound` when no row matches.
    pub fn find(&mut self, type_name: &str, id: i64) -> StrataResult<Record> {
        let mut schema = self
            .registry
            .get(type_name)
            .ok_or_else(|| StrataError::UnknownRecordType {
                name: type_name.to_string(),
            })?;

        let row = self
            .scope
            .select_by_id(&mut self.gateway, schema.table(), id)?
            .ok_or_else(|| StrataError::not_found(format!("{}/{}", schema.table(), id)))?;

        if let Some(Value::Str(discriminator)) = row.get("type") {
            if !discriminator.is_empty() && discriminator.as_str() != schema.name() {
                if let Some(concrete) = self.registry.get(discriminator) {
                    schema = concrete;
                }
            }
        }
        Record::hydrate(schema, &row)
    }

    /// Runs a criteria query against a record type's table and hydrates
    /// the matching rows.
    ///
    /// The query supplies the clause suffix; the table comes from the
    /// registered schema. Rows resolve their own concrete type through
    /// the discriminator, so mixed hierarchies hydrate correctly.
    pub fn select(&mut self, type_name: &str, query: &Query) -> StrataResult<Vec<Record>> {
        let schema = self
            .registry
            .get(type_name)
            .ok_or_else(|| StrataError::UnknownRecordType {
                name: type_name.to_string(),
            })?;
        self.gateway.select(schema.table(), &query.to_sql())?;
        self.gateway.get_records()
    }

    /// Removes an identity from the scope, forcing the next lookup back
    /// to storage.
    pub fn evict(&mut self, table: &str, id: i64) {
        self.scope.remove(table, id);
    }

    /// Persists a property snapshot through the identity map. Used by
    /// [`Record::save`].
    pub(crate) fn persist(
        &mut self,
        table: &str,
        properties: &IndexMap<String, Value>,
        id: Option<i64>,
    ) -> StrataResult<i64> {
        self.scope.save(&mut self.gateway, table, properties, id)
    }

    /// Creates the backing table for a registered record type from its
    /// declared properties.
    pub fn create_table_for(&mut self, type_name: &str) -> StrataResult<()> {
        let schema = self
            .registry
            .get(type_name)
            .ok_or_else(|| StrataError::UnknownRecordType {
                name: type_name.to_string(),
            })?;
        self.gateway
            .create_table(schema.table(), &schema.ddl_columns())
    }

    /// Drops the backing table for a registered record type.
    pub fn drop_table_for(&mut self, type_name: &str) -> StrataResult<()> {
        let schema = self
            .registry
            .get(type_name)
            .ok_or_else(|| StrataError::UnknownRecordType {
                name: type_name.to_string(),
            })?;
        self.gateway.drop_table(schema.table())
    }

    /// Creates the join table backing a many-to-many association between
    /// two registered record types.
    pub fn create_relation_table(&mut self, left: &str, right: &str) -> StrataResult<()> {
        let left_table = self.table_of(left)?;
        let right_table = self.table_of(right)?;
        let join_table = join_table_name(&left_table, &right_table);
        let columns = vec![
            (
                inflect::column_to_property(&inflect::foreign_key(&inflect::to_singular(
                    &left_table,
                ))),
                "integer".to_string(),
            ),
            (
                inflect::column_to_property(&inflect::foreign_key(&inflect::to_singular(
                    &right_table,
                ))),
                "integer".to_string(),
            ),
        ];
        self.gateway.create_table(&join_table, &columns)
    }

    fn table_of(&self, type_name: &str) -> StrataResult<String> {
        self.registry
            .get(type_name)
            .map(|schema| schema.table().to_string())
            .ok_or_else(|| StrataError::UnknownRecordType {
                name: type_name.to_string(),
            })
    }
}

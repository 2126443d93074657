//! The identity map.
//!
//! A `Scope` caches the row snapshots loaded during one unit of work,
//! keyed by `(table, id)`. A record that already exists in scope costs
//! no storage round trip to retrieve. The scope is deliberately not
//! thread-safe: each unit of work owns exactly one.

use std::collections::HashMap;

use indexmap::IndexMap;

use strata_common::{inflect, Row, StrataResult, Value};

use crate::store::Gateway;

/// Per-unit-of-work identity map over row snapshots.
#[derive(Default)]
pub struct Scope {
    map: HashMap<(String, i64), Row>,
}

impl Scope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a row by id. A scope hit returns the cached snapshot
    /// without touching storage; a miss goes through the gateway and
    /// caches the result.
    pub fn select_by_id(
        &mut self,
        gateway: &mut Gateway,
        table: &str,
        id: i64,
    ) -> StrataResult<Option<Row>> {
        let key = (table.to_string(), id);
        if let Some(row) = self.map.get(&key) {
            tracing::trace!("scope hit for {}/{}", table, id);
            return Ok(Some(row.clone()));
        }
        tracing::trace!("scope miss for {}/{}", table, id);

        gateway.select_by_id(table, id)?;
        match gateway.get_object() {
            Some(row) => {
                self.map.insert(key, row.clone());
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    /// Saves a property snapshot persistently, routing to insert or
    /// update, and refreshes the cached snapshot under the (possibly
    /// newly generated) id. Returns the id.
    pub fn save(
        &mut self,
        gateway: &mut Gateway,
        table: &str,
        properties: &IndexMap<String, Value>,
        id: Option<i64>,
    ) -> StrataResult<i64> {
        let id = match id {
            None => gateway.insert(table, properties)?,
            Some(id) => {
                let mut target = IndexMap::new();
                target.insert("id".to_string(), Value::Int(id));
                gateway.update(table, &target, properties)?;
                id
            }
        };

        let mut row = Row::new();
        row.insert("id", Value::Int(id));
        for (property, value) in properties {
            row.insert(inflect::property_to_column(property), value.clone());
        }
        self.map.insert((table.to_string(), id), row);
        Ok(id)
    }

    /// Removes a record from the identity map, forcing the next lookup
    /// back to storage.
    pub fn remove(&mut self, table: &str, id: i64) {
        self.map.remove(&(table.to_string(), id));
    }

    /// Returns true if the given identity is cached.
    pub fn contains(&self, table: &str, id: i64) -> bool {
        self.map.contains_key(&(table.to_string(), id))
    }

    /// Returns the number of cached identities.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

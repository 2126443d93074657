//! Gateway for managing common database operations.
//!
//! The gateway translates each repository operation into exactly one SQL
//! statement, executes it through the adapter, and parks the result for
//! extraction. Property names cross the gateway boundary in camelCase and
//! are translated to their underscore column form on every read and write
//! path.

use std::sync::Arc;

use indexmap::IndexMap;

use strata_common::{inflect, Row, StrataResult, Value};

use crate::record::{Record, RecordSchema, SchemaRegistry};

use super::adapter::{Adapter, Rows};
use super::iterator::RowIterator;

/// Gateway for CRUD and DDL operations against one connection.
pub struct Gateway {
    adapter: Box<dyn Adapter>,
    registry: Arc<SchemaRegistry>,
    result: Option<Box<dyn Rows>>,
    current_table: String,
}

impl Gateway {
    /// Creates a gateway over the given adapter and schema registry.
    pub fn new(adapter: Box<dyn Adapter>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            adapter,
            registry,
            result: None,
            current_table: String::new(),
        }
    }

    /// Returns the id generated by the last insert.
    pub fn last_insert_id(&self) -> i64 {
        self.adapter.last_insert_id()
    }

    /// Returns the number of rows affected by the last mutation.
    pub fn affected_rows(&self) -> u64 {
        self.adapter.affected_rows()
    }

    fn execute(&mut self, sql: &str) -> StrataResult<Box<dyn Rows>> {
        tracing::debug!("executing: {}", sql);
        self.adapter.execute(sql)
    }

    fn execute_and_park(&mut self, table: &str, sql: &str) -> StrataResult<()> {
        self.current_table = table.to_string();
        let rows = self.execute(sql)?;
        self.result = Some(rows);
        Ok(())
    }

    fn quote(&self, value: &Value) -> String {
        format!("\"{}\"", self.adapter.escape(&value.to_sql_literal()))
    }

    fn render_key(&self, target: &IndexMap<String, Value>) -> String {
        target
            .iter()
            .map(|(key, value)| {
                format!("{}={}", inflect::property_to_column(key), self.quote(value))
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    // =========================================================================
    // Select Operations
    // =========================================================================

    /// Selects a single row by id.
    pub fn select_by_id(&mut self, table: &str, id: i64) -> StrataResult<()> {
        let sql = format!("SELECT * FROM `{table}` WHERE id=\"{id}\"");
        self.execute_and_park(table, &sql)
    }

    /// Selects every row of a table.
    pub fn select_all(&mut self, table: &str) -> StrataResult<()> {
        let sql = format!("SELECT * FROM `{table}`");
        self.execute_and_park(table, &sql)
    }

    /// Selects rows matching every `column => value` pair of the target.
    pub fn select_by_key(&mut self, table: &str, target: &IndexMap<String, Value>) -> StrataResult<()> {
        let sql = format!("SELECT * FROM `{table}` WHERE {}", self.render_key(target));
        self.execute_and_park(table, &sql)
    }

    /// Selects rows of `table` through a join table, optionally filtered
    /// by a `column => value` pair on the join table.
    ///
    /// The projection is qualified (`table.*`) so the driving table's own
    /// columns, `id` in particular, are never clobbered by join-table
    /// columns of the same name.
    pub fn select_by_association(
        &mut self,
        table: &str,
        join_table: &str,
        target: Option<&IndexMap<String, Value>>,
    ) -> StrataResult<()> {
        let mut sql = format!(
            "SELECT `{table}`.* FROM `{table}`,`{join_table}` WHERE {table}.id={join_table}.{}_id",
            inflect::to_singular(table)
        );
        if let Some(target) = target {
            for (key, value) in target {
                sql.push_str(&format!(
                    " AND {join_table}.{}={}",
                    inflect::property_to_column(key),
                    self.quote(value)
                ));
            }
        }
        self.execute_and_park(table, &sql)
    }

    /// Executes a SELECT with an arbitrary clause suffix, as rendered by
    /// the query builder's `to_sql`.
    pub fn select(&mut self, table: &str, clauses: &str) -> StrataResult<()> {
        let sql = format!("SELECT * FROM `{table}` {clauses}");
        self.execute_and_park(table, &sql)
    }

    /// Executes an arbitrary SQL query on the connection.
    pub fn query(&mut self, sql: &str) -> StrataResult<()> {
        let rows = self.execute(sql)?;
        self.result = Some(rows);
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Inserts a row and returns the generated id.
    ///
    /// Keys are property names; they are translated to column form here.
    pub fn insert(&mut self, table: &str, columns: &IndexMap<String, Value>) -> StrataResult<i64> {
        let names: Vec<String> = columns
            .keys()
            .map(|key| inflect::property_to_column(key))
            .collect();
        let values: Vec<String> = columns.values().map(|value| self.quote(value)).collect();
        let sql = format!(
            "INSERT INTO `{table}` ({}) VALUES ({})",
            names.join(","),
            values.join(",")
        );
        self.current_table = table.to_string();
        self.execute(&sql)?;
        Ok(self.adapter.last_insert_id())
    }

    /// Updates the rows matching the target key and returns the affected
    /// row count.
    pub fn update(
        &mut self,
        table: &str,
        target: &IndexMap<String, Value>,
        columns: &IndexMap<String, Value>,
    ) -> StrataResult<u64> {
        let assignments: Vec<String> = columns
            .iter()
            .map(|(key, value)| {
                format!("{}={}", inflect::property_to_column(key), self.quote(value))
            })
            .collect();
        let sql = format!(
            "UPDATE `{table}` SET {} WHERE {}",
            assignments.join(","),
            self.render_key(target)
        );
        self.current_table = table.to_string();
        self.execute(&sql)?;
        Ok(self.adapter.affected_rows())
    }

    /// Deletes the rows matching the target key and returns the affected
    /// row count.
    pub fn delete(&mut self, table: &str, target: &IndexMap<String, Value>) -> StrataResult<u64> {
        let sql = format!("DELETE FROM `{table}` WHERE {}", self.render_key(target));
        self.execute(&sql)?;
        Ok(self.adapter.affected_rows())
    }

    // =========================================================================
    // DDL
    // =========================================================================

    /// Creates a table with the given `property => type tag` columns and
    /// an implicit auto-increment `id` primary key.
    pub fn create_table(&mut self, table: &str, columns: &[(String, String)]) -> StrataResult<()> {
        let mut defs = vec!["id int(11) NOT NULL auto_increment".to_string()];
        for (name, tag) in columns {
            defs.push(format!(
                "`{}` {}",
                inflect::property_to_column(name),
                Self::define_type(tag)
            ));
        }
        defs.push("PRIMARY KEY (`id`)".to_string());
        let sql = format!(
            "CREATE TABLE `{table}` ({}) ENGINE=MyISAM AUTO_INCREMENT=1",
            defs.join(",")
        );
        self.execute(&sql)?;
        Ok(())
    }

    /// Destroys an existing table and all its data.
    pub fn drop_table(&mut self, table: &str) -> StrataResult<()> {
        self.execute(&format!("DROP TABLE `{table}`"))?;
        Ok(())
    }

    /// Checks if the given table is defined in the database.
    pub fn has_table(&mut self, table: &str) -> StrataResult<bool> {
        let rows = self.execute(&format!("SHOW TABLES LIKE '{table}'"))?;
        Ok(rows.num_rows() > 0)
    }

    /// Adds a new table column.
    pub fn add_column(&mut self, table: &str, name: &str, tag: &str) -> StrataResult<()> {
        let sql = format!(
            "ALTER TABLE `{table}` ADD COLUMN {} {}",
            inflect::property_to_column(name),
            Self::define_type(tag)
        );
        self.execute(&sql)?;
        Ok(())
    }

    /// Drops a table column.
    pub fn drop_column(&mut self, table: &str, name: &str) -> StrataResult<()> {
        let sql = format!(
            "ALTER TABLE `{table}` DROP COLUMN {}",
            inflect::property_to_column(name)
        );
        self.execute(&sql)?;
        Ok(())
    }

    /// Renames a table column. When no type tag is given the current
    /// definition is read back and kept.
    pub fn change_column(
        &mut self,
        table: &str,
        old: &str,
        new: &str,
        tag: Option<&str>,
    ) -> StrataResult<()> {
        let old = inflect::property_to_column(old);
        let new = inflect::property_to_column(new);
        let definition = match tag {
            Some(tag) => Self::define_type(tag).to_string(),
            None => {
                let mut rows = self.execute(&format!("SHOW FIELDS FROM `{table}` LIKE '{old}'"))?;
                let field = rows.next_row().ok_or_else(|| {
                    strata_common::StrataError::execution(
                        format!("SHOW FIELDS FROM `{table}`"),
                        format!("no column '{old}' on table '{table}'"),
                    )
                })?;
                field
                    .get("Type")
                    .map(Value::to_sql_literal)
                    .unwrap_or_default()
            }
        };
        let sql = format!("ALTER TABLE `{table}` CHANGE COLUMN {old} {new} {definition}");
        self.execute(&sql)?;
        Ok(())
    }

    /// Adds a named index over the given columns.
    pub fn add_index(&mut self, table: &str, name: &str, columns: &[&str]) -> StrataResult<()> {
        let columns: Vec<String> = columns
            .iter()
            .map(|column| inflect::property_to_column(column))
            .collect();
        let sql = format!(
            "ALTER TABLE `{table}` ADD INDEX `{}` ({})",
            name.to_uppercase(),
            columns.join(",")
        );
        self.execute(&sql)?;
        Ok(())
    }

    /// Removes a named index from a table.
    pub fn drop_index(&mut self, table: &str, name: &str) -> StrataResult<()> {
        let sql = format!("DROP INDEX `{}` ON `{table}`", name.to_uppercase());
        self.execute(&sql)?;
        Ok(())
    }

    /// Gets the native SQL definition for a column type tag.
    pub fn define_type(tag: &str) -> &'static str {
        match tag {
            "int" | "integer" | "number" => "INT(11)",
            "bool" | "boolean" => "TINYINT(1)",
            "decimal" => "DOUBLE(16,2) ZEROFILL",
            "float" => "DOUBLE(16,8) ZEROFILL",
            "text" => "TEXT NOT NULL default ''",
            "date" => "DATE NOT NULL default '0000-00-00'",
            "datetime" => "DATETIME NOT NULL default '0000-00-00 00:00:00'",
            "raw" => "BLOB NOT NULL default ''",
            _ => "VARCHAR(255) NOT NULL default ''",
        }
    }

    // =========================================================================
    // Result Extraction
    // =========================================================================

    /// Returns the next row of the parked result as a loose structure.
    pub fn get_object(&mut self) -> Option<Row> {
        self.result.as_mut()?.next_row()
    }

    /// Returns all remaining rows of the parked result.
    pub fn get_objects(&mut self) -> Vec<Row> {
        let mut objects = Vec::new();
        while let Some(row) = self.get_object() {
            objects.push(row);
        }
        objects
    }

    /// Returns the first column of the first row of the parked result.
    pub fn get_value(&mut self) -> Option<Value> {
        self.get_object()
            .and_then(|row| row.value_at(0).cloned())
    }

    /// Returns a forward-only iterator over the parked result.
    ///
    /// The result handle moves into the iterator; it cannot be rewound
    /// and closing it early is safe.
    pub fn get_iterator(&mut self) -> RowIterator {
        RowIterator::new(self.result.take())
    }

    /// Returns the next row hydrated into a typed record, resolving the
    /// single-table-inheritance discriminator.
    pub fn get_record(&mut self) -> StrataResult<Option<Record>> {
        match self.get_object() {
            Some(row) => {
                let schema = self.resolve_schema(&row);
                Record::hydrate(schema, &row).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Returns all remaining rows hydrated into typed records.
    pub fn get_records(&mut self) -> StrataResult<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.get_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Resolves the record schema for a result row.
    ///
    /// A non-empty `type` column names the concrete type; otherwise the
    /// singularized, identifier-cased current table is used. Types never
    /// registered get an explicitly tagged dynamic schema synthesized
    /// from the observed columns.
    fn resolve_schema(&self, row: &Row) -> Arc<RecordSchema> {
        let name = match row.get("type") {
            Some(Value::Str(t)) if !t.is_empty() => t.clone(),
            _ => inflect::to_identifier(&inflect::to_singular(&self.current_table)),
        };
        match self.registry.get(&name) {
            Some(schema) => schema,
            None => {
                tracing::debug!(
                    "no registered schema for '{}', synthesizing dynamic definition",
                    name
                );
                self.registry
                    .define_dynamic(&name, &self.current_table, row.column_names())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PropertyType, SchemaDef};
    use crate::store::MemoryAdapter;

    fn test_gateway() -> Gateway {
        let registry = Arc::new(SchemaRegistry::new());
        registry
            .define(
                SchemaDef::new("Dog")
                    .property("age", PropertyType::Integer)
                    .property("name", PropertyType::String),
            )
            .unwrap();
        Gateway::new(Box::new(MemoryAdapter::new()), registry)
    }

    fn dog_columns() -> Vec<(String, String)> {
        vec![
            ("age".to_string(), "integer".to_string()),
            ("name".to_string(), "string".to_string()),
        ]
    }

    #[test]
    fn test_define_type() {
        assert_eq!(Gateway::define_type("integer"), "INT(11)");
        assert_eq!(Gateway::define_type("boolean"), "TINYINT(1)");
        assert_eq!(Gateway::define_type("float"), "DOUBLE(16,8) ZEROFILL");
        assert_eq!(Gateway::define_type("text"), "TEXT NOT NULL default ''");
        assert_eq!(
            Gateway::define_type("anything"),
            "VARCHAR(255) NOT NULL default ''"
        );
    }

    #[test]
    fn test_create_has_drop_table() {
        let mut gateway = test_gateway();
        assert!(!gateway.has_table("dogs").unwrap());
        gateway.create_table("dogs", &dog_columns()).unwrap();
        assert!(gateway.has_table("dogs").unwrap());
        gateway.drop_table("dogs").unwrap();
        assert!(!gateway.has_table("dogs").unwrap());
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut gateway = test_gateway();
        gateway.create_table("dogs", &dog_columns()).unwrap();

        let mut columns = IndexMap::new();
        columns.insert("age".to_string(), Value::Int(2));
        columns.insert("name".to_string(), Value::string("Jack"));
        assert_eq!(gateway.insert("dogs", &columns).unwrap(), 1);
        assert_eq!(gateway.insert("dogs", &columns).unwrap(), 2);
    }

    #[test]
    fn test_select_by_id_and_get_object() {
        let mut gateway = test_gateway();
        gateway.create_table("dogs", &dog_columns()).unwrap();

        let mut columns = IndexMap::new();
        columns.insert("age".to_string(), Value::Int(2));
        columns.insert("name".to_string(), Value::string("Jack"));
        let id = gateway.insert("dogs", &columns).unwrap();

        gateway.select_by_id("dogs", id).unwrap();
        let row = gateway.get_object().unwrap();
        assert_eq!(row.get("name"), Some(&Value::string("Jack")));
        assert!(gateway.get_object().is_none());
    }

    #[test]
    fn test_insert_translates_property_names() {
        let mut gateway = test_gateway();
        gateway
            .create_table("tasks", &[("itemId".to_string(), "integer".to_string())])
            .unwrap();

        let mut columns = IndexMap::new();
        columns.insert("itemId".to_string(), Value::Int(7));
        gateway.insert("tasks", &columns).unwrap();

        gateway.select_all("tasks").unwrap();
        let row = gateway.get_object().unwrap();
        assert_eq!(row.get("item_id"), Some(&Value::string("7")));
    }

    #[test]
    fn test_update_and_delete_by_key() {
        let mut gateway = test_gateway();
        gateway.create_table("dogs", &dog_columns()).unwrap();

        let mut columns = IndexMap::new();
        columns.insert("age".to_string(), Value::Int(2));
        columns.insert("name".to_string(), Value::string("Jack"));
        let id = gateway.insert("dogs", &columns).unwrap();

        let mut key = IndexMap::new();
        key.insert("id".to_string(), Value::Int(id));
        let mut changes = IndexMap::new();
        changes.insert("age".to_string(), Value::Int(3));
        assert_eq!(gateway.update("dogs", &key, &changes).unwrap(), 1);

        gateway.select_by_id("dogs", id).unwrap();
        let row = gateway.get_object().unwrap();
        assert_eq!(row.get("age"), Some(&Value::string("3")));

        assert_eq!(gateway.delete("dogs", &key).unwrap(), 1);
        gateway.select_all("dogs").unwrap();
        assert!(gateway.get_object().is_none());
    }

    #[test]
    fn test_get_value_reads_first_column() {
        let mut gateway = test_gateway();
        gateway.create_table("dogs", &dog_columns()).unwrap();
        let mut columns = IndexMap::new();
        columns.insert("age".to_string(), Value::Int(2));
        gateway.insert("dogs", &columns).unwrap();

        gateway
            .select("dogs", "WHERE age = '2'")
            .unwrap();
        let value = gateway.get_value().unwrap();
        assert_eq!(value, Value::string("1"));
    }

    #[test]
    fn test_get_record_resolves_table_type() {
        let mut gateway = test_gateway();
        gateway.create_table("dogs", &dog_columns()).unwrap();
        let mut columns = IndexMap::new();
        columns.insert("age".to_string(), Value::Int(2));
        columns.insert("name".to_string(), Value::string("Jack"));
        let id = gateway.insert("dogs", &columns).unwrap();

        gateway.select_by_id("dogs", id).unwrap();
        let record = gateway.get_record().unwrap().unwrap();
        assert_eq!(record.record_type(), "Dog");
        assert_eq!(record.get("age").unwrap(), Value::Int(2));
        assert_eq!(record.get("name").unwrap(), Value::string("Jack"));
    }

    #[test]
    fn test_get_record_synthesizes_dynamic_schema() {
        let registry = Arc::new(SchemaRegistry::new());
        let mut gateway = Gateway::new(Box::new(MemoryAdapter::new()), registry.clone());
        gateway
            .create_table("gadgets", &[("name".to_string(), "string".to_string())])
            .unwrap();
        let mut columns = IndexMap::new();
        columns.insert("name".to_string(), Value::string("sprocket"));
        gateway.insert("gadgets", &columns).unwrap();

        gateway.select_all("gadgets").unwrap();
        let record = gateway.get_record().unwrap().unwrap();
        assert_eq!(record.record_type(), "Gadget");
        assert!(record.schema().is_dynamic());
        assert_eq!(record.get("name").unwrap(), Value::string("sprocket"));
        assert!(registry.get("Gadget").is_some());
    }

    #[test]
    fn test_iterator_is_forward_only() {
        let mut gateway = test_gateway();
        gateway.create_table("dogs", &dog_columns()).unwrap();
        let mut columns = IndexMap::new();
        columns.insert("age".to_string(), Value::Int(1));
        for _ in 0..3 {
            gateway.insert("dogs", &columns).unwrap();
        }

        gateway.select_all("dogs").unwrap();
        let mut iterator = gateway.get_iterator();
        assert_eq!(iterator.num_rows(), 3);
        assert!(iterator.next().is_some());
        iterator.close();
        assert!(iterator.next().is_none());
    }

    #[test]
    fn test_change_column_keeps_definition_when_untyped() {
        let mut gateway = test_gateway();
        gateway.create_table("dogs", &dog_columns()).unwrap();
        gateway.change_column("dogs", "name", "callName", None).unwrap();

        let mut columns = IndexMap::new();
        columns.insert("callName".to_string(), Value::string("Jack"));
        gateway.insert("dogs", &columns).unwrap();
        gateway.select_all("dogs").unwrap();
        let row = gateway.get_object().unwrap();
        assert_eq!(row.get("call_name"), Some(&Value::string("Jack")));
    }
}

//! The mapped entity.
//!
//! A `Record` holds one row's worth of typed property values plus its
//! pending and memoized association state. It knows how to persist and
//! hydrate itself; SQL assembly is delegated to the gateway and
//! execution to the adapter, both reached through the [`Session`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;

use strata_common::value::{DATETIME_FORMAT, DATE_FORMAT};
use strata_common::{inflect, Row, StrataError, StrataResult, Value};

use crate::session::Session;

use super::schema::{
    join_table_name, AssociationKind, PropertyType, RecordSchema,
};

/// A mapped entity: one row of a table, typed by its schema.
#[derive(Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    id: Option<i64>,
    values: IndexMap<String, Value>,
    pending: IndexMap<String, Vec<Record>>,
    loaded: HashMap<String, Vec<Record>>,
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("type", &self.schema.name())
            .field("id", &self.id)
            .field("values", &self.values)
            .finish()
    }
}

impl Record {
    /// Creates a new, transient, unsaved record.
    ///
    /// When the flattened schema declares a `type` property it is
    /// initialized to the schema name, so the discriminator is persisted
    /// on first save.
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        let mut values = IndexMap::new();
        if schema.declares("type") {
            values.insert("type".to_string(), Value::Str(schema.name().to_string()));
        }
        Self {
            schema,
            id: None,
            values,
            pending: IndexMap::new(),
            loaded: HashMap::new(),
        }
    }

    /// Hydrates a record from a result row.
    ///
    /// Column names translate to property names and values coerce to the
    /// declared types. Only declared properties populate; dynamic
    /// schemas keep every column as a string.
    pub fn hydrate(schema: Arc<RecordSchema>, row: &Row) -> StrataResult<Self> {
        let mut record = Record::new(schema);
        for (column, value) in row.iter() {
            if column == "id" {
                record.id = value.as_int();
                continue;
            }
            let property = inflect::column_to_property(column);
            let declared = record.schema.property(&property).map(|p| p.property_type.clone());
            match declared {
                Some(property_type) => {
                    let coerced = coerce(&property, &property_type, value.clone())?;
                    record.values.insert(property, coerced);
                }
                None if record.schema.is_dynamic() => {
                    record.values.insert(property, value.clone());
                }
                None => {}
            }
        }
        Ok(record)
    }

    /// Returns the schema this record was built from.
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Returns the record type name.
    pub fn record_type(&self) -> &str {
        self.schema.name()
    }

    /// Returns the backing table name.
    pub fn table(&self) -> &str {
        self.schema.table()
    }

    /// Returns the persistent id, set once the record has been saved or
    /// loaded.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Returns true if the record has never been saved.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Returns the current property snapshot.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    // =========================================================================
    // Property Access
    // =========================================================================

    /// Reads a property, consulting accessor overrides first.
    pub fn get(&self, property: &str) -> StrataResult<Value> {
        if let Some(accessors) = self.schema.accessor_overrides() {
            if let Some(value) = accessors.get(self, property) {
                return Ok(value);
            }
        }
        self.get_property(property)
    }

    /// Writes a property, consulting accessor overrides first. The value
    /// is coerced to the declared type.
    pub fn set(&mut self, property: &str, value: impl Into<Value>) -> StrataResult<()> {
        let value = value.into();
        if let Some(accessors) = self.schema.accessor_overrides().cloned() {
            if let Some(result) = accessors.set(self, property, value.clone()) {
                return result;
            }
        }
        self.set_property(property, value)
    }

    /// Reads a property through the generic path, bypassing overrides.
    pub fn get_property(&self, property: &str) -> StrataResult<Value> {
        if property == "id" {
            return Ok(self.id.map_or(Value::Null, Value::Int));
        }
        if self.schema.declares(property) || self.schema.is_dynamic() {
            return Ok(self.values.get(property).cloned().unwrap_or(Value::Null));
        }
        Err(StrataError::UnknownProperty {
            record: self.schema.name().to_string(),
            property: property.to_string(),
        })
    }

    /// Writes a property through the generic path, bypassing overrides.
    pub fn set_property(&mut self, property: &str, value: impl Into<Value>) -> StrataResult<()> {
        let value = value.into();
        if property == "id" {
            self.id = value.as_int();
            return Ok(());
        }
        match self.schema.property(property).map(|p| p.property_type.clone()) {
            Some(property_type) => {
                let coerced = coerce(property, &property_type, value)?;
                self.values.insert(property.to_string(), coerced);
                Ok(())
            }
            None if self.schema.is_dynamic() => {
                self.values.insert(property.to_string(), value);
                Ok(())
            }
            None => Err(StrataError::UnknownProperty {
                record: self.schema.name().to_string(),
                property: property.to_string(),
            }),
        }
    }

    /// Bulk-assigns properties, applying the same coercion rules as
    /// direct assignment.
    pub fn populate<'a, I>(&mut self, values: I) -> StrataResult<()>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        for (property, value) in values {
            self.set(property, value)?;
        }
        Ok(())
    }

    // =========================================================================
    // Associations
    // =========================================================================

    /// Appends a record to a pending collection association. Assignment
    /// order is preserved and nothing is de-duplicated; the pending list
    /// is flushed on the next [`Record::save`].
    pub fn push_related(&mut self, association: &str, record: Record) -> StrataResult<()> {
        match self.schema.association(association).map(|a| a.kind) {
            Some(AssociationKind::HasMany | AssociationKind::HasManyRelations) => {
                self.pending
                    .entry(association.to_string())
                    .or_default()
                    .push(record);
                Ok(())
            }
            _ => Err(StrataError::UnknownProperty {
                record: self.schema.name().to_string(),
                property: association.to_string(),
            }),
        }
    }

    /// Resolves a `belongs_to` association: one `select_by_id` on the
    /// owner table through the local foreign key, memoized per instance.
    ///
    /// Returns `None` when the foreign key is unset; a set key with no
    /// matching row surfaces `RecordNotFound` with the association name
    /// as the include path.
    pub fn related(&mut self, session: &mut Session, name: &str) -> StrataResult<Option<Record>> {
        match self.schema.association(name).map(|a| a.kind) {
            Some(AssociationKind::BelongsTo) => {}
            _ => {
                return Err(StrataError::UnknownProperty {
                    record: self.schema.name().to_string(),
                    property: name.to_string(),
                })
            }
        }
        if let Some(cached) = self.loaded.get(name) {
            return Ok(cached.first().cloned());
        }

        let fk_property = format!("{name}Id");
        let Some(owner_id) = self.get_property(&fk_property)?.as_int() else {
            return Ok(None);
        };
        let owner_type = inflect::to_identifier(&inflect::property_to_column(name));
        let owner_table = match session.registry().get(&owner_type) {
            Some(schema) => schema.table().to_string(),
            None => inflect::table_name(&owner_type),
        };

        session.gateway_mut().select_by_id(&owner_table, owner_id)?;
        let record = session.gateway_mut().get_record()?.ok_or_else(|| {
            StrataError::not_found_in(format!("{owner_table}/{owner_id}"), name)
        })?;
        self.loaded.insert(name.to_string(), vec![record.clone()]);
        Ok(Some(record))
    }

    /// Resolves a collection association, memoized per instance.
    ///
    /// `has_many` issues a `select_by_key` on the dependent table keyed
    /// by this record's id; `has_many_relations` goes through the join
    /// table. Unsaved records return their pending list.
    pub fn related_many(&mut self, session: &mut Session, name: &str) -> StrataResult<Vec<Record>> {
        let kind = match self.schema.association(name).map(|a| a.kind) {
            Some(kind @ (AssociationKind::HasMany | AssociationKind::HasManyRelations)) => kind,
            _ => {
                return Err(StrataError::UnknownProperty {
                    record: self.schema.name().to_string(),
                    property: name.to_string(),
                })
            }
        };
        if let Some(cached) = self.loaded.get(name) {
            return Ok(cached.clone());
        }
        let Some(id) = self.id else {
            return Ok(self.pending.get(name).cloned().unwrap_or_default());
        };

        let other_type = collection_type(name);
        let other_schema = session
            .registry()
            .get(&other_type)
            .ok_or(StrataError::UnknownRecordType { name: other_type })?;

        let records = match kind {
            AssociationKind::HasMany => {
                let fk = foreign_key_property(&other_schema, &self.schema);
                let mut target = IndexMap::new();
                target.insert(fk, Value::Int(id));
                session.gateway_mut().select_by_key(other_schema.table(), &target)?;
                session.gateway_mut().get_records()?
            }
            AssociationKind::HasManyRelations => {
                let join_table = join_table_name(self.table(), other_schema.table());
                let this_fk = inflect::column_to_property(&inflect::foreign_key(
                    &inflect::to_singular(self.table()),
                ));
                let mut target = IndexMap::new();
                target.insert(this_fk, Value::Int(id));
                session.gateway_mut().select_by_association(
                    other_schema.table(),
                    &join_table,
                    Some(&target),
                )?;
                session.gateway_mut().get_records()?
            }
            AssociationKind::BelongsTo => unreachable!("checked above"),
        };
        self.loaded.insert(name.to_string(), records.clone());
        Ok(records)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Persists the record: inserts when the id is unset, assigning the
    /// generated id, or updates the matching row otherwise. Exactly one
    /// statement is issued for the row itself; pending association
    /// assignments are then flushed in order.
    pub fn save(&mut self, session: &mut Session) -> StrataResult<()> {
        let snapshot = self.values.clone();
        let id = session.persist(self.table(), &snapshot, self.id)?;
        self.id = Some(id);

        let pending = std::mem::take(&mut self.pending);
        for (name, partners) in pending {
            let Some(kind) = self.schema.association(&name).map(|a| a.kind) else {
                continue;
            };
            match kind {
                AssociationKind::HasMany => {
                    for mut child in partners {
                        let fk = foreign_key_property(child.schema(), &self.schema);
                        child.set(&fk, id)?;
                        child.save(session)?;
                    }
                }
                AssociationKind::HasManyRelations => {
                    let other_type = collection_type(&name);
                    let other_table = match session.registry().get(&other_type) {
                        Some(schema) => schema.table().to_string(),
                        None => inflect::table_name(&other_type),
                    };
                    let join_table = join_table_name(self.table(), &other_table);
                    let this_fk = inflect::column_to_property(&inflect::foreign_key(
                        &inflect::to_singular(self.table()),
                    ));
                    let other_fk = inflect::column_to_property(&inflect::foreign_key(
                        &inflect::to_singular(&other_table),
                    ));
                    for mut partner in partners {
                        if partner.id.is_none() {
                            partner.save(session)?;
                        }
                        let mut columns = IndexMap::new();
                        columns.insert(this_fk.clone(), Value::Int(id));
                        columns.insert(
                            other_fk.clone(),
                            partner.id.map_or(Value::Null, Value::Int),
                        );
                        session.gateway_mut().insert(&join_table, &columns)?;
                    }
                }
                AssociationKind::BelongsTo => {}
            }
        }

        self.loaded.clear();
        Ok(())
    }

    /// Deletes the record's row. No cascade: dependent rows are left in
    /// place.
    pub fn delete(self, session: &mut Session) -> StrataResult<()> {
        if let Some(id) = self.id {
            let mut target = IndexMap::new();
            target.insert("id".to_string(), Value::Int(id));
            session.gateway_mut().delete(self.schema.table(), &target)?;
            session.evict(self.schema.table(), id);
        }
        Ok(())
    }
}

/// Resolves the record type backing a collection association name,
/// e.g. `relatedObjs` names the `RelatedObj` type.
fn collection_type(name: &str) -> String {
    inflect::to_identifier(&inflect::to_singular(&inflect::property_to_column(name)))
}

/// Resolves the foreign-key property a dependent record uses to point at
/// an owner.
///
/// The dependent's `belongs_to` declarations are matched against the
/// owner's ancestor chain, so a dependent declared against a subtype
/// writes that subtype's key even though the subtype shares its base
/// table. Falls back to the singularized owner table.
fn foreign_key_property(dependent: &RecordSchema, owner: &RecordSchema) -> String {
    for association in dependent.associations() {
        if association.kind == AssociationKind::BelongsTo {
            let owner_type = inflect::to_identifier(&inflect::property_to_column(&association.name));
            if owner.ancestry().iter().any(|ancestor| *ancestor == owner_type) {
                return format!("{}Id", association.name);
            }
        }
    }
    inflect::column_to_property(&inflect::foreign_key(&inflect::to_singular(owner.table())))
}

/// Coerces a value to a declared property type.
///
/// Booleans are a total mapping over the falsy table; every other type
/// fails loudly when the value cannot be represented. The empty string
/// and zero dates read back from unset non-null columns map to `Null`.
fn coerce(property: &str, property_type: &PropertyType, value: Value) -> StrataResult<Value> {
    if value.is_null() && *property_type != PropertyType::Boolean {
        return Ok(Value::Null);
    }
    match property_type {
        PropertyType::Boolean => Ok(Value::Bool(value.is_truthy())),
        PropertyType::String | PropertyType::Text | PropertyType::Custom(_) => {
            Ok(Value::Str(value.to_sql_literal()))
        }
        PropertyType::Integer => {
            if is_unset_text(&value) {
                return Ok(Value::Null);
            }
            value
                .as_int()
                .map(Value::Int)
                .ok_or_else(|| StrataError::coercion(property, "integer", &value))
        }
        PropertyType::Float => {
            if is_unset_text(&value) {
                return Ok(Value::Null);
            }
            value
                .as_float()
                .map(Value::Float)
                .ok_or_else(|| StrataError::coercion(property, "float", &value))
        }
        PropertyType::Date => match &value {
            Value::Date(_) => Ok(value),
            Value::DateTime(dt) => Ok(Value::Date(dt.date())),
            Value::Str(s) if is_zero_date(s) => Ok(Value::Null),
            Value::Str(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| StrataError::coercion(property, "date", &value)),
            _ => Err(StrataError::coercion(property, "date", &value)),
        },
        PropertyType::DateTime => match &value {
            Value::DateTime(_) => Ok(value),
            Value::Date(d) => Ok(d
                .and_hms_opt(0, 0, 0)
                .map_or(Value::Null, Value::DateTime)),
            Value::Str(s) if is_zero_date(s) => Ok(Value::Null),
            Value::Str(s) => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .map(Value::DateTime)
                .or_else(|_| {
                    NaiveDate::parse_from_str(s, DATE_FORMAT)
                        .map(|d| d.and_hms_opt(0, 0, 0).map_or(Value::Null, Value::DateTime))
                })
                .map_err(|_| StrataError::coercion(property, "datetime", &value)),
            _ => Err(StrataError::coercion(property, "datetime", &value)),
        },
        PropertyType::Raw => match value {
            Value::Bytes(_) => Ok(value),
            Value::Str(s) => Ok(Value::Bytes(s.into_bytes())),
            other => Err(StrataError::coercion(property, "raw", &other)),
        },
    }
}

/// An empty string read back from an unset non-null column.
fn is_unset_text(value: &Value) -> bool {
    matches!(value, Value::Str(s) if s.is_empty())
}

/// The zero date/datetime defaults of unset date columns.
fn is_zero_date(text: &str) -> bool {
    text.is_empty() || text.starts_with("0000-00-00")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::schema::{SchemaDef, SchemaRegistry};

    fn toggle_schema() -> Arc<RecordSchema> {
        let registry = SchemaRegistry::new();
        registry
            .define(
                SchemaDef::new("Toggle")
                    .property("state1", PropertyType::Boolean)
                    .property("state2", PropertyType::Boolean),
            )
            .unwrap()
    }

    #[test]
    fn test_boolean_coercion_falsy_set() {
        let mut toggle = Record::new(toggle_schema());
        toggle.set("state1", false).unwrap();
        toggle.set("state2", 0).unwrap();
        assert_eq!(toggle.get("state1").unwrap(), Value::Bool(false));
        assert_eq!(toggle.get("state2").unwrap(), Value::Bool(false));

        toggle.set("state1", "0").unwrap();
        toggle.set("state2", Value::Null).unwrap();
        assert_eq!(toggle.get("state1").unwrap(), Value::Bool(false));
        assert_eq!(toggle.get("state2").unwrap(), Value::Bool(false));

        toggle.set("state1", "true").unwrap();
        toggle.set("state2", 1).unwrap();
        assert_eq!(toggle.get("state1").unwrap(), Value::Bool(true));
        assert_eq!(toggle.get("state2").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_numeric_string_coercion() {
        let registry = SchemaRegistry::new();
        let schema = registry
            .define(
                SchemaDef::new("Task")
                    .property("name", PropertyType::String)
                    .belongs_to("project"),
            )
            .unwrap();
        let mut task = Record::new(schema);
        task.populate([
            ("name", Value::string("mytask")),
            ("projectId", Value::string("9")),
        ])
        .unwrap();
        assert_eq!(task.get("projectId").unwrap(), Value::Int(9));
    }

    #[test]
    fn test_garbage_coercion_fails_loudly() {
        let registry = SchemaRegistry::new();
        let schema = registry
            .define(SchemaDef::new("Dog").property("age", PropertyType::Integer))
            .unwrap();
        let mut dog = Record::new(schema);
        let result = dog.set("age", "rock");
        assert!(matches!(result, Err(StrataError::TypeCoercion { .. })));
    }

    #[test]
    fn test_unknown_property_is_rejected() {
        let registry = SchemaRegistry::new();
        let schema = registry.define(SchemaDef::new("Dog")).unwrap();
        let mut dog = Record::new(schema);
        assert!(matches!(
            dog.set("breed", "Terrier"),
            Err(StrataError::UnknownProperty { .. })
        ));
        assert!(matches!(
            dog.get("breed"),
            Err(StrataError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_subtype_initializes_discriminator() {
        let registry = SchemaRegistry::new();
        registry
            .define(
                SchemaDef::new("Player")
                    .property("type", PropertyType::String)
                    .property("name", PropertyType::String),
            )
            .unwrap();
        let cricketer = registry
            .define(SchemaDef::new("Cricketer").extends("Player"))
            .unwrap();

        let player = Record::new(registry.get("Player").unwrap());
        assert_eq!(player.get("type").unwrap(), Value::string("Player"));

        let cricketer = Record::new(cricketer);
        assert_eq!(cricketer.get("type").unwrap(), Value::string("Cricketer"));
    }

    #[test]
    fn test_hydrate_ignores_undeclared_columns() {
        let registry = SchemaRegistry::new();
        let schema = registry
            .define(SchemaDef::new("Footballer").property("club", PropertyType::String))
            .unwrap();
        let mut row = Row::new();
        row.insert("id", Value::string("7"));
        row.insert("club", Value::string("LA Galaxy"));
        row.insert("top_score", Value::string("167"));

        let record = Record::hydrate(schema, &row).unwrap();
        assert_eq!(record.id(), Some(7));
        assert_eq!(record.get("club").unwrap(), Value::string("LA Galaxy"));
        assert!(record.get("topScore").is_err());
    }

    #[test]
    fn test_hydrate_treats_empty_numeric_as_null() {
        let registry = SchemaRegistry::new();
        let schema = registry
            .define(SchemaDef::new("Cricketer").property("topScore", PropertyType::Integer))
            .unwrap();
        let mut row = Row::new();
        row.insert("id", Value::string("1"));
        row.insert("top_score", Value::string(""));
        let record = Record::hydrate(schema, &row).unwrap();
        assert_eq!(record.get("topScore").unwrap(), Value::Null);
    }

    #[test]
    fn test_datetime_accepts_date_only_text() {
        let registry = SchemaRegistry::new();
        let schema = registry
            .define(SchemaDef::new("Thing").property("dateField", PropertyType::DateTime))
            .unwrap();
        let mut thing = Record::new(schema);
        thing.set("dateField", "2006-09-09").unwrap();
        match thing.get("dateField").unwrap() {
            Value::DateTime(dt) => assert_eq!(dt.format("%Y-%m-%d").to_string(), "2006-09-09"),
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn test_foreign_key_property_walks_ancestry() {
        let registry = SchemaRegistry::new();
        registry
            .define(
                SchemaDef::new("BaseObj")
                    .property("name", PropertyType::String)
                    .has_many("relatedObjs"),
            )
            .unwrap();
        registry
            .define(
                SchemaDef::new("ChildObj")
                    .extends("BaseObj")
                    .has_many("otherRelatedObjs"),
            )
            .unwrap();
        registry
            .define(SchemaDef::new("RelatedObj").belongs_to("baseObj"))
            .unwrap();
        registry
            .define(SchemaDef::new("OtherRelatedObj").belongs_to("childObj"))
            .unwrap();

        let child = registry.get("ChildObj").unwrap();
        let related = registry.get("RelatedObj").unwrap();
        let other = registry.get("OtherRelatedObj").unwrap();

        assert_eq!(foreign_key_property(&related, &child), "baseObjId");
        assert_eq!(foreign_key_property(&other, &child), "childObjId");
    }

    #[test]
    fn test_collection_type_names() {
        assert_eq!(collection_type("tasks"), "Task");
        assert_eq!(collection_type("otherRelatedObjs"), "OtherRelatedObj");
        assert_eq!(collection_type("topics"), "Topic");
    }
}

//! Record schemas and their registry.
//!
//! A record type is declared once as a [`SchemaDef`] and flattened into a
//! [`RecordSchema`] at registration time: the declared ancestor chain is
//! walked, properties and associations accumulate ancestor-first, and
//! subtypes inherit the root ancestor's table (single-table inheritance).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use strata_common::{inflect, StrataError, StrataResult};

use super::accessors::PropertyAccessors;

/// Semantic type of a declared property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    /// Short string, the default column type.
    String,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean flag.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time of day.
    DateTime,
    /// Long text.
    Text,
    /// Raw binary data.
    Raw,
    /// A caller-defined value type, stored as a string.
    Custom(String),
}

impl PropertyType {
    /// Resolves a DDL type tag to a property type.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "string" | "default" => PropertyType::String,
            "int" | "integer" | "number" => PropertyType::Integer,
            "float" | "decimal" => PropertyType::Float,
            "bool" | "boolean" => PropertyType::Boolean,
            "date" => PropertyType::Date,
            "datetime" => PropertyType::DateTime,
            "text" => PropertyType::Text,
            "raw" => PropertyType::Raw,
            other => PropertyType::Custom(other.to_string()),
        }
    }

    /// Returns the DDL type tag used when creating columns.
    pub fn ddl_tag(&self) -> &str {
        match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Float => "float",
            PropertyType::Boolean => "boolean",
            PropertyType::Date => "date",
            PropertyType::DateTime => "datetime",
            PropertyType::Text => "text",
            PropertyType::Raw => "raw",
            PropertyType::Custom(_) => "default",
        }
    }

    /// Returns the type name used in error messages.
    pub fn name(&self) -> &str {
        match self {
            PropertyType::Custom(name) => name,
            other => other.ddl_tag(),
        }
    }
}

/// One declared property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    /// Property name, in camelCase.
    pub name: String,
    /// Declared semantic type.
    pub property_type: PropertyType,
}

/// Kind of a declared association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// This record carries the foreign key of a single owner.
    BelongsTo,
    /// Dependent records carry this record's foreign key.
    HasMany,
    /// Many-to-many through a join table.
    HasManyRelations,
}

/// One declared association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Association name: the owner name for `BelongsTo`, the collection
    /// name otherwise.
    pub name: String,
    /// Association kind.
    pub kind: AssociationKind,
}

/// Returns the join table name for two tables: alphabetical order,
/// joined with an underscore.
pub fn join_table_name(left: &str, right: &str) -> String {
    if left <= right {
        format!("{left}_{right}")
    } else {
        format!("{right}_{left}")
    }
}

/// Declaration of a record type, consumed by [`SchemaRegistry::define`].
pub struct SchemaDef {
    name: String,
    parent: Option<String>,
    table: Option<String>,
    properties: Vec<PropertyDefinition>,
    associations: Vec<Association>,
    accessors: Option<Arc<dyn PropertyAccessors>>,
}

impl SchemaDef {
    /// Starts a declaration for the named record type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            table: None,
            properties: Vec::new(),
            associations: Vec::new(),
            accessors: None,
        }
    }

    /// Declares the ancestor type; it must already be registered.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Overrides the derived table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declares a property.
    pub fn property(mut self, name: impl Into<String>, property_type: PropertyType) -> Self {
        self.properties.push(PropertyDefinition {
            name: name.into(),
            property_type,
        });
        self
    }

    /// Declares that this record belongs to the named owner. Implies a
    /// `{owner}Id` integer property backing the foreign-key column.
    pub fn belongs_to(mut self, owner: impl Into<String>) -> Self {
        self.associations.push(Association {
            name: owner.into(),
            kind: AssociationKind::BelongsTo,
        });
        self
    }

    /// Declares a one-to-many collection; the dependent records carry
    /// the inverse foreign key.
    pub fn has_many(mut self, collection: impl Into<String>) -> Self {
        self.associations.push(Association {
            name: collection.into(),
            kind: AssociationKind::HasMany,
        });
        self
    }

    /// Declares a many-to-many collection resolved through a join table.
    pub fn has_many_relations(mut self, collection: impl Into<String>) -> Self {
        self.associations.push(Association {
            name: collection.into(),
            kind: AssociationKind::HasManyRelations,
        });
        self
    }

    /// Attaches property accessor overrides.
    pub fn accessors(mut self, accessors: Arc<dyn PropertyAccessors>) -> Self {
        self.accessors = Some(accessors);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaKind {
    Declared,
    Dynamic,
}

/// The flattened schema of one concrete record type.
pub struct RecordSchema {
    name: String,
    table: String,
    parent: Option<String>,
    ancestry: Vec<String>,
    properties: Vec<PropertyDefinition>,
    associations: Vec<Association>,
    accessors: Option<Arc<dyn PropertyAccessors>>,
    kind: SchemaKind,
}

impl std::fmt::Debug for RecordSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSchema")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("parent", &self.parent)
            .field("properties", &self.properties)
            .field("associations", &self.associations)
            .field("kind", &self.kind)
            .finish()
    }
}

impl RecordSchema {
    /// Returns the record type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backing table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the declared ancestor, if any.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Returns the ancestor chain, this type first, root last.
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    /// Returns the root ancestor type name.
    pub fn base_type(&self) -> &str {
        self.ancestry.last().map_or(&self.name, String::as_str)
    }

    /// Returns the flattened properties, ancestor-first.
    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }

    /// Returns the flattened associations, ancestor-first.
    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    /// Looks up a property definition by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Looks up an association by name.
    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Returns true if the schema declares the named property.
    pub fn declares(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Returns the attached accessor overrides, if any.
    pub fn accessor_overrides(&self) -> Option<&Arc<dyn PropertyAccessors>> {
        self.accessors.as_ref()
    }

    /// Returns true for schemas synthesized from observed columns rather
    /// than declared up front.
    pub fn is_dynamic(&self) -> bool {
        self.kind == SchemaKind::Dynamic
    }

    /// Returns the `property => type tag` pairs used to create this
    /// schema's table.
    pub fn ddl_columns(&self) -> Vec<(String, String)> {
        self.properties
            .iter()
            .map(|p| (p.name.clone(), p.property_type.ddl_tag().to_string()))
            .collect()
    }
}

/// Registry of record schemas, shared across a unit of work.
///
/// Read-mostly: built once at startup, then consulted on every
/// hydration. Dynamic fallback definitions are the only post-startup
/// writes.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<RecordSchema>>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record type, flattening its declaration against the
    /// ancestor chain.
    pub fn define(&self, def: SchemaDef) -> StrataResult<Arc<RecordSchema>> {
        let mut schemas = self.schemas.write();

        if schemas.contains_key(&def.name) {
            return Err(StrataError::SchemaConflict { name: def.name });
        }
        let parent = match &def.parent {
            Some(parent) => Some(schemas.get(parent).cloned().ok_or_else(|| {
                StrataError::MissingAncestor {
                    name: def.name.clone(),
                    parent: parent.clone(),
                }
            })?),
            None => None,
        };

        let mut properties: Vec<PropertyDefinition> = parent
            .as_ref()
            .map(|p| p.properties.clone())
            .unwrap_or_default();
        for property in def.properties {
            match properties.iter_mut().find(|p| p.name == property.name) {
                Some(existing) => *existing = property,
                None => properties.push(property),
            }
        }

        let mut associations: Vec<Association> = parent
            .as_ref()
            .map(|p| p.associations.clone())
            .unwrap_or_default();
        for association in def.associations {
            if association.kind == AssociationKind::BelongsTo {
                let fk = format!("{}Id", association.name);
                if !properties.iter().any(|p| p.name == fk) {
                    properties.push(PropertyDefinition {
                        name: fk,
                        property_type: PropertyType::Integer,
                    });
                }
            }
            match associations.iter_mut().find(|a| a.name == association.name) {
                Some(existing) => *existing = association,
                None => associations.push(association),
            }
        }

        // Subtypes always carry the discriminator column.
        if parent.is_some() && !properties.iter().any(|p| p.name == "type") {
            properties.insert(
                0,
                PropertyDefinition {
                    name: "type".to_string(),
                    property_type: PropertyType::String,
                },
            );
        }

        let table = def
            .table
            .or_else(|| parent.as_ref().map(|p| p.table.clone()))
            .unwrap_or_else(|| inflect::table_name(&def.name));
        let mut ancestry = vec![def.name.clone()];
        if let Some(parent) = &parent {
            ancestry.extend(parent.ancestry.iter().cloned());
        }
        let accessors = def
            .accessors
            .or_else(|| parent.as_ref().and_then(|p| p.accessors.clone()));

        let schema = Arc::new(RecordSchema {
            name: def.name.clone(),
            table,
            parent: def.parent,
            ancestry,
            properties,
            associations,
            accessors,
            kind: SchemaKind::Declared,
        });
        schemas.insert(def.name, schema.clone());
        Ok(schema)
    }

    /// Synthesizes and registers a dynamic schema from observed columns.
    ///
    /// The compatibility fallback for rows whose type was never declared:
    /// every column becomes a string property, and the schema is tagged
    /// so callers wanting strict behavior can detect it.
    pub fn define_dynamic<'a>(
        &self,
        name: &str,
        table: &str,
        columns: impl Iterator<Item = &'a str>,
    ) -> Arc<RecordSchema> {
        let mut schemas = self.schemas.write();
        if let Some(existing) = schemas.get(name) {
            return existing.clone();
        }
        let properties = columns
            .filter(|column| *column != "id")
            .map(|column| PropertyDefinition {
                name: inflect::column_to_property(column),
                property_type: PropertyType::String,
            })
            .collect();
        let schema = Arc::new(RecordSchema {
            name: name.to_string(),
            table: table.to_string(),
            parent: None,
            ancestry: vec![name.to_string()],
            properties,
            associations: Vec::new(),
            accessors: None,
            kind: SchemaKind::Dynamic,
        });
        schemas.insert(name.to_string(), schema.clone());
        schema
    }

    /// Looks up a registered schema.
    pub fn get(&self, name: &str) -> Option<Arc<RecordSchema>> {
        self.schemas.read().get(name).cloned()
    }

    /// Returns true if the named type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    /// Returns the registered type names.
    pub fn names(&self) -> Vec<String> {
        self.schemas.read().keys().cloned().collect()
    }
}

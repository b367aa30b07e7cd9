// Entity Descriptors - static schema metadata consulted by every
// filter/order/update path instead of runtime reflection

use crate::domain::value::Record;
use crate::error::{RepoError, Result};

/// Semantic type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Text,
    Boolean,
    Date,
    DateTime,
    Json,
}

/// One named attribute of an entity.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A named relation to another table, joinable by the pageable engine.
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    pub name: &'static str,
    pub target_table: &'static str,
    pub local_column: &'static str,
    pub foreign_column: &'static str,
}

/// Static schema descriptor for an entity type: table, primary key, field
/// kinds, relations. Built once per type, validated at repository
/// construction.
#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    pub table: &'static str,
    pub primary_key: &'static str,
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
}

impl EntityDescriptor {
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(RepoError::Validation(
                "entity descriptor requires a table name".into(),
            ));
        }
        if self.fields.is_empty() {
            return Err(RepoError::Validation(format!(
                "entity descriptor for '{}' declares no fields",
                self.table
            )));
        }
        if !self.has_field(self.primary_key) {
            return Err(RepoError::Validation(format!(
                "primary key '{}' is not a declared field of '{}'",
                self.primary_key, self.table
            )));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(RepoError::Validation(format!(
                    "entity '{}' declares a blank field name",
                    self.table
                )));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(RepoError::Validation(format!(
                    "duplicate field '{}' on entity '{}'",
                    field.name, self.table
                )));
            }
        }
        for (i, relation) in self.relations.iter().enumerate() {
            if self.relations[..i].iter().any(|r| r.name == relation.name) {
                return Err(RepoError::Validation(format!(
                    "duplicate relation '{}' on entity '{}'",
                    relation.name, self.table
                )));
            }
            if !self.has_field(relation.local_column) {
                return Err(RepoError::Validation(format!(
                    "relation '{}' joins on unknown local column '{}'",
                    relation.name, relation.local_column
                )));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Fails with the repository-wide invalid-field message.
    pub fn require_field(&self, name: &str) -> Result<&FieldDef> {
        self.field(name)
            .ok_or_else(|| RepoError::Validation(format!("Invalid field name: {name}")))
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Names of all Text fields, the default search surface.
    pub fn text_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Text)
            .map(|f| f.name)
            .collect()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }
}

/// An application record type bound to a static descriptor.
///
/// `record()` must contain only the fields that were explicitly set on the
/// instance; partial-update semantics in `CrudOperations::update` copy
/// exactly those fields onto the stored row.
pub trait Entity: Clone + Send + Sync {
    fn descriptor() -> &'static EntityDescriptor;

    /// Snapshot of the explicitly-set fields.
    fn record(&self) -> Record;

    /// Rebuilds an instance from a database row.
    fn from_record(record: &Record) -> Result<Self>;

    /// Primary-key value, if assigned.
    fn id(&self) -> Option<i64>;

    /// Called after a flush assigns the database identity.
    fn set_id(&mut self, id: i64);
}

//! Table schema representation.
//!
//! A [`TableSchema`] is a runtime value declared once at startup. The DDL,
//! query and mutation compilers all read it, and the migration engine stores
//! serialized copies of it as the last-applied snapshot.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// MySQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DbType {
    /// 8-bit integer; also the storage type for booleans.
    Tinyint,
    /// 16-bit integer.
    Smallint,
    /// 24-bit integer.
    Mediumint,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Bigint,
    /// Fixed-point number.
    Decimal,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Fixed-length string.
    Char,
    /// Variable-length string.
    Varchar,
    /// Text up to 255 bytes.
    Tinytext,
    /// Text up to 64 KiB.
    Text,
    /// Text up to 16 MiB.
    Mediumtext,
    /// Text up to 4 GiB.
    Longtext,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    Datetime,
    /// UTC timestamp.
    Timestamp,
    /// Year.
    Year,
    /// JSON document.
    Json,
}

impl DbType {
    /// Returns the SQL type name.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Tinyint => "TINYINT",
            Self::Smallint => "SMALLINT",
            Self::Mediumint => "MEDIUMINT",
            Self::Int => "INT",
            Self::Bigint => "BIGINT",
            Self::Decimal => "DECIMAL",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Char => "CHAR",
            Self::Varchar => "VARCHAR",
            Self::Tinytext => "TINYTEXT",
            Self::Text => "TEXT",
            Self::Mediumtext => "MEDIUMTEXT",
            Self::Longtext => "LONGTEXT",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Datetime => "DATETIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Year => "YEAR",
            Self::Json => "JSON",
        }
    }

    /// Whether this is one of the numeric types.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Tinyint
                | Self::Smallint
                | Self::Mediumint
                | Self::Int
                | Self::Bigint
                | Self::Decimal
                | Self::Float
                | Self::Double
        )
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// A foreign key declared on a single field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    /// Referenced (parent) table.
    pub table: String,
    /// Referenced (parent) field.
    pub field: String,
    /// Explicit constraint name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
    /// Action on delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ForeignKeyAction>,
    /// Action on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ForeignKeyAction>,
}

impl ForeignKey {
    /// References `table`.`field`.
    #[must_use]
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            constraint_name: None,
            on_delete: None,
            on_update: None,
        }
    }

    /// Sets an explicit constraint name.
    #[must_use]
    pub fn constraint(mut self, name: impl Into<String>) -> Self {
        self.constraint_name = Some(name.into());
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub const fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub const fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// The constraint name used when this key lives on `table`.
    ///
    /// Defaults to `fk_<parentTable>_<table>_<parentField>`.
    #[must_use]
    pub fn constraint_name_for(&self, table: &str) -> String {
        self.constraint_name
            .clone()
            .unwrap_or_else(|| format!("fk_{}_{}_{}", self.table, table, self.field))
    }
}

/// Membership of a field in a composite index or unique key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    /// The other fields in the group.
    pub with: Vec<String>,
    /// Position of this field inside the key.
    pub order: i32,
}

/// An index or unique marker on a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "KeySpecRepr", into = "KeySpecRepr")]
pub enum KeySpec {
    /// A key on this field alone.
    Single,
    /// Part of a multi-field key.
    Composite(CompositeKey),
}

/// Wire shape of [`KeySpec`]: `true` or `{"with": [...], "order": n}`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum KeySpecRepr {
    Flag(bool),
    Composite(CompositeKey),
}

impl TryFrom<KeySpecRepr> for KeySpec {
    type Error = String;

    fn try_from(repr: KeySpecRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            KeySpecRepr::Flag(true) => Ok(Self::Single),
            KeySpecRepr::Flag(false) => Err("key flag must be `true` when present".to_string()),
            KeySpecRepr::Composite(key) => Ok(Self::Composite(key)),
        }
    }
}

impl From<KeySpec> for KeySpecRepr {
    fn from(spec: KeySpec) -> Self {
        match spec {
            KeySpec::Single => Self::Flag(true),
            KeySpec::Composite(key) => Self::Composite(key),
        }
    }
}

/// Schema definition for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Field name.
    pub name: String,
    /// Column type.
    #[serde(rename = "type")]
    pub db_type: DbType,
    /// Display size / length, e.g. `VARCHAR(500)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// Whether the column is NOT NULL.
    #[serde(default, skip_serializing_if = "is_false")]
    pub not_null: bool,
    /// Unique key marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<KeySpec>,
    /// Whether this field is part of the primary key.
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary_key: bool,
    /// Index marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_key: Option<KeySpec>,
    /// Foreign key on this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<DefaultValue>,
    /// Whether the numeric column is UNSIGNED.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unsigned: bool,
    /// Whether the column auto-increments.
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_increment: bool,
    /// Column comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Whether the field holds a boolean stored as `TINYINT`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub boolean: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(b: &bool) -> bool {
    !*b
}

impl FieldDefinition {
    /// Creates a new nullable field.
    #[must_use]
    pub fn new(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            db_type,
            size: None,
            not_null: false,
            unique: None,
            primary_key: false,
            index_key: None,
            foreign_key: None,
            default_value: None,
            unsigned: false,
            auto_increment: false,
            comment: None,
            boolean: false,
        }
    }

    /// Creates a boolean field (stored as `TINYINT`).
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        let mut field = Self::new(name, DbType::Tinyint);
        field.boolean = true;
        field
    }

    /// Sets the display size / length.
    #[must_use]
    pub const fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Marks the field as part of the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Adds a single-field unique key.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = Some(KeySpec::Single);
        self
    }

    /// Joins a composite unique key with `with`, at position `order`.
    #[must_use]
    pub fn unique_with(mut self, with: &[&str], order: i32) -> Self {
        self.unique = Some(KeySpec::Composite(composite(with, order)));
        self
    }

    /// Adds a single-field index.
    #[must_use]
    pub fn index(mut self) -> Self {
        self.index_key = Some(KeySpec::Single);
        self
    }

    /// Joins a composite index with `with`, at position `order`.
    #[must_use]
    pub fn index_with(mut self, with: &[&str], order: i32) -> Self {
        self.index_key = Some(KeySpec::Composite(composite(with, order)));
        self
    }

    /// Declares a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Sets the numeric column as UNSIGNED.
    #[must_use]
    pub const fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

fn composite(with: &[&str], order: i32) -> CompositeKey {
    CompositeKey {
        with: with.iter().map(|s| (*s).to_string()).collect(),
        order,
    }
}

/// Complete schema definition for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Table name.
    pub table_name: String,
    /// Field definitions in declaration order.
    pub fields: Vec<FieldDefinition>,
}

impl TableSchema {
    /// Creates a new table schema.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field to the table.
    #[must_use]
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.table_name
    }

    /// Gets a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Primary-key field names in declaration order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Whether `name` is a primary-key field.
    #[must_use]
    pub fn is_primary_key(&self, name: &str) -> bool {
        self.get_field(name).is_some_and(|f| f.primary_key)
    }

    /// Fields carrying a foreign key, paired with the key.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&str, &ForeignKey)> {
        self.fields
            .iter()
            .filter_map(|f| f.foreign_key.as_ref().map(|fk| (f.name.as_str(), fk)))
    }

    /// Fails with [`CompileError::SchemaMismatch`] if `name` isn't declared.
    pub fn check_field(&self, name: &str) -> Result<()> {
        if self.get_field(name).is_some() {
            Ok(())
        } else {
            Err(CompileError::SchemaMismatch {
                table: self.table_name.clone(),
                field: name.to_string(),
            })
        }
    }

    /// Validates the schema once, before anything is compiled against it.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| CompileError::InvalidSchema {
            table: self.table_name.clone(),
            reason,
        };

        if self.table_name.is_empty() {
            return Err(invalid("table name is empty".to_string()));
        }
        if self.fields.is_empty() {
            return Err(invalid("table declares no fields".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("field `{}` is declared twice", field.name)));
            }
            if (field.unsigned || field.auto_increment) && !field.db_type.is_numeric() {
                return Err(invalid(format!(
                    "`{}` is {} but UNSIGNED/AUTO_INCREMENT need a numeric type",
                    field.name,
                    field.db_type.as_sql()
                )));
            }
            if field.boolean && field.db_type != DbType::Tinyint {
                return Err(invalid(format!(
                    "boolean field `{}` must be TINYINT, not {}",
                    field.name,
                    field.db_type.as_sql()
                )));
            }
            if let Some(fk) = &field.foreign_key {
                if fk.table.is_empty() || fk.field.is_empty() {
                    return Err(invalid(format!(
                        "foreign key on `{}` has no target",
                        field.name
                    )));
                }
            }
        }

        for field in &self.fields {
            for spec in [&field.unique, &field.index_key].into_iter().flatten() {
                if let KeySpec::Composite(key) = spec {
                    for other in &key.with {
                        if other == &field.name || self.get_field(other).is_none() {
                            return Err(invalid(format!(
                                "`{}` groups with unknown field `{other}`",
                                field.name
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// A batch of tables declared together and migrated as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaGroup {
    /// Tables in declaration order.
    pub tables: Vec<TableSchema>,
}

impl SchemaGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table to the group.
    #[must_use]
    pub fn table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }
}

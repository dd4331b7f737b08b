//! DDL generation for one table.
//!
//! `CREATE TABLE` lists every column in declaration order, then the primary
//! key, then single-field and composite indexes, then single-field and
//! composite unique keys. Foreign keys are emitted separately so that the
//! migration engine can add them once every referenced table exists.

use crate::schema::{FieldDefinition, ForeignKey, KeySpec, TableSchema};
use crate::statement::quote_identifier;

/// Which key marker to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Index,
    Unique,
}

impl KeyKind {
    fn spec(self, field: &FieldDefinition) -> Option<&KeySpec> {
        match self {
            Self::Index => field.index_key.as_ref(),
            Self::Unique => field.unique.as_ref(),
        }
    }

    const fn keyword(self) -> &'static str {
        match self {
            Self::Index => "INDEX",
            Self::Unique => "UNIQUE",
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::Index => "idx",
            Self::Unique => "uq",
        }
    }
}

/// Generates `CREATE TABLE` for `schema`.
#[must_use]
pub fn create_table(schema: &TableSchema) -> String {
    let table = schema.name();
    let mut lines: Vec<String> = schema.fields.iter().map(column_definition).collect();

    let primary_key = schema.primary_key();
    if !primary_key.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", quote_list(&primary_key)));
    }

    for kind in [KeyKind::Index, KeyKind::Unique] {
        for field in &schema.fields {
            if matches!(kind.spec(field), Some(KeySpec::Single)) {
                lines.push(key_clause(kind, table, &[field.name.as_str()]));
            }
        }
        for group in composite_groups(schema, kind) {
            lines.push(key_clause(kind, table, &group));
        }
    }

    format!(
        "CREATE TABLE {} (\n  {}\n)",
        quote_identifier(table),
        lines.join(",\n  ")
    )
}

/// Generates `DROP TABLE` for `schema`.
#[must_use]
pub fn drop_table(schema: &TableSchema) -> String {
    format!("DROP TABLE {}", quote_identifier(schema.name()))
}

/// Generates `DROP TABLE IF EXISTS` for `schema`.
#[must_use]
pub fn drop_table_if_exists(schema: &TableSchema) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_identifier(schema.name()))
}

/// Generates one `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY` per
/// foreign key declared on `schema`.
#[must_use]
pub fn create_foreign_keys(schema: &TableSchema) -> Vec<String> {
    schema
        .foreign_keys()
        .map(|(field, fk)| create_foreign_key(schema.name(), field, fk))
        .collect()
}

/// Generates the `ADD CONSTRAINT` for the foreign key `fk` on `table.field`.
#[must_use]
pub fn create_foreign_key(table: &str, field: &str, fk: &ForeignKey) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_identifier(table),
        quote_identifier(&fk.constraint_name_for(table)),
        quote_identifier(field),
        quote_identifier(&fk.table),
        quote_identifier(&fk.field),
    );
    if let Some(action) = fk.on_delete {
        sql.push_str(" ON DELETE ");
        sql.push_str(action.to_sql());
    }
    if let Some(action) = fk.on_update {
        sql.push_str(" ON UPDATE ");
        sql.push_str(action.to_sql());
    }
    sql
}

/// Generates one `ALTER TABLE ... DROP CONSTRAINT` per foreign key declared
/// on `schema`, using the same constraint names as [`create_foreign_keys`].
#[must_use]
pub fn drop_foreign_keys(schema: &TableSchema) -> Vec<String> {
    schema
        .foreign_keys()
        .map(|(_, fk)| drop_foreign_key(schema.name(), fk))
        .collect()
}

/// Generates the `DROP CONSTRAINT` for the foreign key `fk` on `table`.
#[must_use]
pub fn drop_foreign_key(table: &str, fk: &ForeignKey) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        quote_identifier(table),
        quote_identifier(&fk.constraint_name_for(table))
    )
}

fn column_definition(field: &FieldDefinition) -> String {
    let mut sql = quote_identifier(&field.name);
    sql.push(' ');
    sql.push_str(field.db_type.as_sql());
    if let Some(size) = field.size {
        sql.push_str(&format!("({size})"));
    }
    if field.unsigned {
        sql.push_str(" UNSIGNED");
    }
    if field.not_null {
        sql.push_str(" NOT NULL");
    }
    if field.auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    } else if let Some(default) = &field.default_value {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default.to_sql());
    }

    let comment = match (&field.comment, field.boolean) {
        (Some(comment), true) => Some(format!("boolean value {comment}")),
        (None, true) => Some("boolean value".to_string()),
        (Some(comment), false) => Some(comment.clone()),
        (None, false) => None,
    };
    if let Some(comment) = comment {
        sql.push_str(&format!(" COMMENT '{}'", comment.replace('\'', "''")));
    }
    sql
}

fn key_clause(kind: KeyKind, table: &str, fields: &[&str]) -> String {
    let name = format!("{}_{}_{}", kind.prefix(), table, fields.join("_"));
    format!(
        "{} {} ({})",
        kind.keyword(),
        quote_identifier(&name),
        quote_list(fields)
    )
}

fn quote_list(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| quote_identifier(f))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collects composite key groups for `kind`.
///
/// Two fields share a group when either names the other in `with`, and the
/// relation is transitive. A group's members are the fields that declare the
/// composite key, sorted by `(order, declaration index)`. Groups come out in
/// the order of their first member's declaration.
fn composite_groups(schema: &TableSchema, kind: KeyKind) -> Vec<Vec<&str>> {
    let fields = &schema.fields;
    let mut parent: Vec<usize> = (0..fields.len()).collect();

    for (i, field) in fields.iter().enumerate() {
        if let Some(KeySpec::Composite(key)) = kind.spec(field) {
            for other in &key.with {
                if let Some(j) = fields.iter().position(|f| &f.name == other) {
                    union(&mut parent, i, j);
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<(i32, usize)>)> = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        let Some(KeySpec::Composite(key)) = kind.spec(field) else {
            continue;
        };
        let root = find_root(&mut parent, i);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push((key.order, i)),
            None => groups.push((root, vec![(key.order, i)])),
        }
    }

    groups
        .into_iter()
        .map(|(_, mut members)| {
            members.sort_unstable();
            members
                .into_iter()
                .map(|(_, i)| fields[i].name.as_str())
                .collect()
        })
        .collect()
}

fn find_root(parent: &mut [usize], i: usize) -> usize {
    let mut root = i;
    while parent[root] != root {
        root = parent[root];
    }
    let mut node = i;
    while parent[node] != root {
        let next = parent[node];
        parent[node] = root;
        node = next;
    }
    root
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find_root(parent, a);
    let rb = find_root(parent, b);
    if ra != rb {
        parent[ra.max(rb)] = ra.min(rb);
    }
}

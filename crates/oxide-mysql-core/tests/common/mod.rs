#![allow(dead_code)]

use oxide_mysql_core::schema::{DbType, DefaultValue, FieldDefinition, ForeignKey, ForeignKeyAction};
use oxide_mysql_core::{Bind, CompiledQuery, MutationPlan, SchemaGroup, Statement, TableSchema};

pub fn authors() -> TableSchema {
    TableSchema::new("authors")
        .field(
            FieldDefinition::new("author_id", DbType::Int)
                .unsigned()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .field(FieldDefinition::new("name", DbType::Varchar).size(100).not_null())
        .field(FieldDefinition::new("country", DbType::Char).size(2).index())
        .field(FieldDefinition::new("debut", DbType::Date))
}

pub fn genres() -> TableSchema {
    TableSchema::new("genres")
        .field(
            FieldDefinition::new("genre_id", DbType::Smallint)
                .unsigned()
                .not_null()
                .primary_key(),
        )
        .field(FieldDefinition::new("label", DbType::Varchar).size(40).unique())
}

pub fn songs() -> TableSchema {
    TableSchema::new("songs")
        .field(
            FieldDefinition::new("song_id", DbType::Int)
                .unsigned()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .field(
            FieldDefinition::new("author_id", DbType::Int)
                .unsigned()
                .not_null()
                .unique_with(&["title"], 0)
                .foreign_key(
                    ForeignKey::new("authors", "author_id").on_delete(ForeignKeyAction::Cascade),
                ),
        )
        .field(
            FieldDefinition::new("title", DbType::Varchar)
                .size(200)
                .not_null()
                .unique_with(&["author_id"], 1),
        )
        .field(
            FieldDefinition::new("genre_id", DbType::Smallint)
                .unsigned()
                .foreign_key(ForeignKey::new("genres", "genre_id")),
        )
        .field(
            FieldDefinition::new("plays", DbType::Bigint)
                .unsigned()
                .not_null()
                .default_value(DefaultValue::Integer(0)),
        )
        .field(FieldDefinition::boolean("explicit").not_null().default_value(DefaultValue::Bool(false)))
        .field(FieldDefinition::new("meta", DbType::Json))
        .field(
            FieldDefinition::new("released_at", DbType::Datetime)
                .default_value(DefaultValue::Expression("CURRENT_TIMESTAMP".into())),
        )
}

pub fn music_group() -> SchemaGroup {
    SchemaGroup::new().table(authors()).table(genres()).table(songs())
}

/// Number of `?` placeholders outside quoted literals and identifiers.
pub fn placeholder_count(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '`' || c == '\'' => quote = Some(c),
            None if c == '?' => count += 1,
            None => {}
        }
    }
    count
}

pub fn assert_query_params(query: &CompiledQuery) {
    assert_eq!(
        placeholder_count(&query.sql),
        query.params.len(),
        "placeholder/param mismatch in: {}",
        query.sql
    );
}

pub fn assert_statement_params(statement: &Statement) {
    match &statement.bind {
        Bind::Values(params) => assert_eq!(
            placeholder_count(&statement.sql),
            params.len(),
            "placeholder/param mismatch in: {}",
            statement.sql
        ),
        Bind::Rows(_) => {
            assert_eq!(placeholder_count(&statement.sql), 1);
            assert_query_params(&statement.expand());
        }
    }
}

pub fn assert_plan_params(plan: &MutationPlan) {
    for statement in plan.statements() {
        assert_statement_params(statement);
    }
}

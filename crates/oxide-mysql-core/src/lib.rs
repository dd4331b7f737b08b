//! # oxide-mysql-core
//!
//! Schema-driven SQL generation for MySQL.
//!
//! A [`TableSchema`] is declared once as a runtime value. From it this crate
//! derives:
//! - DDL: `CREATE TABLE`, `DROP TABLE` and foreign-key constraints ([`ddl`])
//! - `SELECT` statements from [`Find`] descriptors, with relation includes
//!   compiled into `LEFT JOIN`s
//! - write statements from [`Mutation`] descriptors, grouped per table
//!
//! Everything here is pure and synchronous. Identifiers are backtick-quoted
//! and every value travels as a `?` parameter.
//!
//! ```rust
//! use oxide_mysql_core::{Filter, Find, Mutation, Row};
//! use oxide_mysql_core::schema::{DbType, FieldDefinition, TableSchema};
//!
//! let users = TableSchema::new("users")
//!     .field(FieldDefinition::new("id", DbType::Int).unsigned().auto_increment().primary_key())
//!     .field(FieldDefinition::new("name", DbType::Varchar).size(50).not_null());
//!
//! let query = Find::new(&users)
//!     .filter(Filter::new().eq("name", "'; DROP TABLE users; --"))
//!     .build()
//!     .unwrap();
//! assert_eq!(
//!     query.sql,
//!     "SELECT `users`.`id`, `users`.`name` FROM `users` WHERE `users`.`name` = ?"
//! );
//!
//! let plan = Mutation::insert(&users, vec![Row::new().set("name", "Ada")])
//!     .compile()
//!     .unwrap();
//! assert_eq!(plan.statement_count(), 1);
//! ```

pub mod condition;
pub mod ddl;
pub mod error;
pub mod find;
pub mod mutation;
pub mod schema;
pub mod statement;
pub mod value;

pub use condition::{compile_where, Condition, Filter, Operator, WhereClause};
pub use error::{CompileError, Result};
pub use find::{Aggregate, AggregateFn, Find, OrderDirection};
pub use mutation::{CompileOptions, Mutation, MutationKind, MutationOp, MutationPlan, TableStatements};
pub use schema::{
    CompositeKey, DbType, DefaultValue, FieldDefinition, ForeignKey, ForeignKeyAction, KeySpec,
    SchemaGroup, TableSchema,
};
pub use statement::{Bind, CompiledQuery, Statement};
pub use value::{normalize, Row, SqlValue, ToSqlValue};

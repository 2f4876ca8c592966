//! GritDB - an embedded relational database engine
//!
//! SQL text goes in, row sets come out. The pipeline is
//! lexer -> parser -> executor over a catalog, per-table row stores, and
//! in-memory B-tree indexes, with bincode persistence per table.
//!
//! ## Architecture
//! - `sql`: lexer, recursive-descent parser, expression evaluator, executor
//! - `types`: value model, date/timestamp types, schemas
//! - `catalog`: table and index registry
//! - `storage`: per-table durable row store (write-then-rename)
//! - `index`: B-tree value -> row-id index
//! - `database`: the state root tying it all together

pub mod catalog;
pub mod database;
pub mod index;
pub mod sql;
pub mod storage;
pub mod types;

mod api;
mod error;

pub use api::Database;
pub use database::GritDB;
pub use error::{DbError, Result};
pub use sql::{execute_sql, QueryResult};
pub use types::Value;

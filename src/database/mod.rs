//! Database core
//!
//! # Module structure
//! - `core`: the GritDB state root (catalog + row stores + indexes) with
//!   open/flush and DDL operations
//! - `crud`: journaled row primitives (insert/update/delete with undo)

pub mod core;
pub mod crud;

pub use core::GritDB;
pub use crud::UndoLog;

//! Persistence layer for GritDB

pub mod engine;

pub use engine::{StorageEngine, TableStore};

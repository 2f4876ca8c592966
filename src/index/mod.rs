//! Index structures for GritDB

pub mod btree;

pub use btree::{BTree, DEFAULT_MIN_DEGREE};

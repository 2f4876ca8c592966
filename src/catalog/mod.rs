//! Catalog: the schema registry
//!
//! Maps table names to schemas and index names to their (table, column)
//! targets. Lookup is case-insensitive; declared case is preserved for
//! output. The catalog serializes as one bincode document through the
//! storage engine.

use crate::error::{DbError, Result};
use crate::types::{IndexDef, TableSchema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Lowercased table name -> schema
    tables: HashMap<String, TableSchema>,
    /// Lowercased index name -> (lowercased table, lowercased column)
    index_map: HashMap<String, (String, String)>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut catalog: Catalog = bincode::deserialize(bytes)
            .map_err(|e| DbError::Serialization(format!("Catalog is corrupt: {}", e)))?;
        for schema in catalog.tables.values_mut() {
            schema.rebuild_column_map();
        }
        Ok(catalog)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Register a new table; all of its index definitions are registered too
    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let key = schema.name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(DbError::Schema(format!(
                "Table '{}' already exists",
                schema.name
            )));
        }

        for index in &schema.indexes {
            let index_key = index.name.to_lowercase();
            if self.index_map.contains_key(&index_key) {
                return Err(DbError::Schema(format!(
                    "Index '{}' already exists",
                    index.name
                )));
            }
        }

        for index in &schema.indexes {
            self.index_map.insert(
                index.name.to_lowercase(),
                (
                    index.table_name.to_lowercase(),
                    index.column_name.to_lowercase(),
                ),
            );
        }

        self.tables.insert(key, schema);
        Ok(())
    }

    /// Remove a table and all indexes registered on it
    pub fn drop_table(&mut self, name: &str) -> Result<TableSchema> {
        let key = name.to_lowercase();
        let schema = self
            .tables
            .remove(&key)
            .ok_or_else(|| DbError::Schema(format!("Table '{}' does not exist", name)))?;

        for index in &schema.indexes {
            self.index_map.remove(&index.name.to_lowercase());
        }

        Ok(schema)
    }

    pub fn get_table(&self, name: &str) -> Result<&TableSchema> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| DbError::Schema(format!("Table '{}' does not exist", name)))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    /// Table names in sorted order (stable output for SHOW TABLES)
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.values().map(|s| s.name.clone()).collect();
        names.sort();
        names
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    /// Attach an index to an existing table
    pub fn add_index(&mut self, index: IndexDef) -> Result<()> {
        let index_key = index.name.to_lowercase();
        if self.index_map.contains_key(&index_key) {
            return Err(DbError::Schema(format!(
                "Index '{}' already exists",
                index.name
            )));
        }

        let table_key = index.table_name.to_lowercase();
        let schema = self
            .tables
            .get_mut(&table_key)
            .ok_or_else(|| DbError::Schema(format!("Table '{}' does not exist", index.table_name)))?;

        if schema.get_column(&index.column_name).is_none() {
            return Err(DbError::Schema(format!(
                "Column '{}' does not exist in table '{}'",
                index.column_name, index.table_name
            )));
        }

        self.index_map.insert(
            index_key,
            (table_key, index.column_name.to_lowercase()),
        );
        schema.add_index(index);
        Ok(())
    }

    /// Resolve an index name to its definition
    pub fn get_index(&self, index_name: &str) -> Result<IndexDef> {
        let (table_key, _) = self
            .index_map
            .get(&index_name.to_lowercase())
            .ok_or_else(|| DbError::Schema(format!("Index '{}' does not exist", index_name)))?;

        let schema = self
            .tables
            .get(table_key)
            .ok_or_else(|| DbError::Schema(format!("Table '{}' does not exist", table_key)))?;

        schema
            .indexes
            .iter()
            .find(|idx| idx.name.eq_ignore_ascii_case(index_name))
            .cloned()
            .ok_or_else(|| DbError::Schema(format!("Index '{}' does not exist", index_name)))
    }

    /// Detach an index from its table
    pub fn remove_index(&mut self, index_name: &str) -> Result<IndexDef> {
        let index_key = index_name.to_lowercase();
        let (table_key, _) = self
            .index_map
            .remove(&index_key)
            .ok_or_else(|| DbError::Schema(format!("Index '{}' does not exist", index_name)))?;

        let schema = self
            .tables
            .get_mut(&table_key)
            .ok_or_else(|| DbError::Schema(format!("Table '{}' does not exist", table_key)))?;

        let pos = schema
            .indexes
            .iter()
            .position(|idx| idx.name.eq_ignore_ascii_case(index_name))
            .ok_or_else(|| DbError::Schema(format!("Index '{}' does not exist", index_name)))?;

        Ok(schema.indexes.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ColumnType};

    fn users_schema() -> TableSchema {
        TableSchema::new(
            "Users",
            vec![
                ColumnDef::new("id", ColumnType::Integer).primary_key(),
                ColumnDef::new("name", ColumnType::Text),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_lookup_case_insensitive() {
        let mut catalog = Catalog::new();
        catalog.create_table(users_schema()).unwrap();

        assert!(catalog.table_exists("USERS"));
        let schema = catalog.get_table("users").unwrap();
        assert_eq!(schema.name, "Users", "declared case preserved");
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut catalog = Catalog::new();
        catalog.create_table(users_schema()).unwrap();
        assert!(matches!(
            catalog.create_table(users_schema()),
            Err(DbError::Schema(_))
        ));
    }

    #[test]
    fn test_drop_table_removes_indexes() {
        let mut catalog = Catalog::new();
        catalog.create_table(users_schema()).unwrap();
        catalog
            .add_index(IndexDef::new("idx_name", "users", "name", false))
            .unwrap();

        catalog.drop_table("users").unwrap();
        assert!(catalog.get_index("idx_name").is_err());

        // Name is free again
        catalog.create_table(users_schema()).unwrap();
        catalog
            .add_index(IndexDef::new("idx_name", "users", "name", false))
            .unwrap();
    }

    #[test]
    fn test_add_index_validates_target() {
        let mut catalog = Catalog::new();
        catalog.create_table(users_schema()).unwrap();

        assert!(matches!(
            catalog.add_index(IndexDef::new("i1", "ghost", "name", false)),
            Err(DbError::Schema(_))
        ));
        assert!(matches!(
            catalog.add_index(IndexDef::new("i1", "users", "ghost", false)),
            Err(DbError::Schema(_))
        ));

        catalog
            .add_index(IndexDef::new("i1", "users", "name", false))
            .unwrap();
        assert!(matches!(
            catalog.add_index(IndexDef::new("I1", "users", "name", false)),
            Err(DbError::Schema(_)),
        ));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut catalog = Catalog::new();
        catalog.create_table(users_schema()).unwrap();
        catalog
            .add_index(IndexDef::new("idx_name", "users", "name", true))
            .unwrap();

        let bytes = catalog.to_bytes().unwrap();
        let restored = Catalog::from_bytes(&bytes).unwrap();

        let schema = restored.get_table("users").unwrap();
        assert_eq!(schema.column_count(), 2);
        assert_eq!(schema.get_column_position("NAME"), Some(1));
        let idx = restored.get_index("idx_name").unwrap();
        assert!(idx.unique);
    }

    #[test]
    fn test_list_tables_sorted() {
        let mut catalog = Catalog::new();
        catalog
            .create_table(TableSchema::new("zeta", vec![]).unwrap())
            .unwrap();
        catalog
            .create_table(TableSchema::new("alpha", vec![]).unwrap())
            .unwrap();
        assert_eq!(catalog.list_tables(), vec!["alpha", "zeta"]);
    }
}

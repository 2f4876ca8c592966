//! GritDB state root
//!
//! Owns the catalog, the in-memory table stores, and the B-tree indexes.
//! Indexes reference rows by id only and are rebuilt from table scans on
//! open. Mutated tables are tracked as dirty and written back (catalog
//! first) by `flush`.

use crate::catalog::Catalog;
use crate::error::{DbError, Result};
use crate::index::BTree;
use crate::storage::{StorageEngine, TableStore};
use crate::types::{IndexDef, TableSchema, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub struct GritDB {
    catalog: Catalog,
    /// Lowercased table name -> row store
    stores: HashMap<String, TableStore>,
    /// Lowercased index name -> B-tree
    indexes: HashMap<String, BTree>,
    engine: StorageEngine,
    dirty_tables: HashSet<String>,
    catalog_dirty: bool,
}

impl GritDB {
    /// Open a database directory, creating it if absent. Loads the catalog
    /// and every table, then rebuilds all indexes.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let engine = StorageEngine::open(data_dir)?;

        let catalog = if engine.catalog_exists() {
            Catalog::from_bytes(&engine.load_catalog_bytes()?)?
        } else {
            Catalog::new()
        };

        let mut stores = HashMap::new();
        for schema in catalog.tables() {
            let store = engine.load_table(&schema.name)?;
            stores.insert(schema.name.to_lowercase(), store);
        }

        let mut db = Self {
            catalog,
            stores,
            indexes: HashMap::new(),
            engine,
            dirty_tables: HashSet::new(),
            catalog_dirty: false,
        };
        db.rebuild_indexes()?;
        Ok(db)
    }

    fn rebuild_indexes(&mut self) -> Result<()> {
        self.indexes.clear();
        let defs: Vec<IndexDef> = self
            .catalog
            .tables()
            .flat_map(|s| s.indexes.iter().cloned())
            .collect();

        for def in defs {
            let tree = self.build_index_tree(&def)?;
            self.indexes.insert(def.name.to_lowercase(), tree);
        }
        Ok(())
    }

    /// Scan a table and build the B-tree for one index definition
    fn build_index_tree(&self, def: &IndexDef) -> Result<BTree> {
        let schema = self.catalog.get_table(&def.table_name)?;
        let position = schema
            .get_column_position(&def.column_name)
            .ok_or_else(|| {
                DbError::Schema(format!(
                    "Column '{}' does not exist in table '{}'",
                    def.column_name, def.table_name
                ))
            })?;
        let store = self.store(&def.table_name)?;

        let mut tree = BTree::new(def.unique);
        for (row_id, row) in store.scan() {
            let key = &row[position];
            if !key.is_null() {
                tree.insert(key.clone(), row_id).map_err(|_| {
                    DbError::Constraint(format!(
                        "Duplicate value '{}' for unique column '{}'",
                        key, def.column_name
                    ))
                })?;
            }
        }
        Ok(tree)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn schema(&self, table: &str) -> Result<&TableSchema> {
        self.catalog.get_table(table)
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.catalog.table_exists(table)
    }

    pub fn store(&self, table: &str) -> Result<&TableStore> {
        self.stores
            .get(&table.to_lowercase())
            .ok_or_else(|| DbError::Schema(format!("Table '{}' does not exist", table)))
    }

    pub(crate) fn store_mut(&mut self, table: &str) -> Result<&mut TableStore> {
        let key = table.to_lowercase();
        self.dirty_tables.insert(key.clone());
        self.stores
            .get_mut(&key)
            .ok_or_else(|| DbError::Schema(format!("Table '{}' does not exist", table)))
    }

    pub(crate) fn index(&self, name: &str) -> Option<&BTree> {
        self.indexes.get(&name.to_lowercase())
    }

    pub(crate) fn index_mut(&mut self, name: &str) -> Option<&mut BTree> {
        self.indexes.get_mut(&name.to_lowercase())
    }

    /// First index on (table, column), if any
    pub fn find_index(&self, table: &str, column: &str) -> Option<&BTree> {
        let schema = self.catalog.get_table(table).ok()?;
        let def = schema
            .indexes
            .iter()
            .find(|d| d.column_name.eq_ignore_ascii_case(column))?;
        self.index(&def.name)
    }

    /// Index definitions for a table (cloned so callers can mutate `self`)
    pub(crate) fn index_defs(&self, table: &str) -> Result<Vec<IndexDef>> {
        Ok(self.catalog.get_table(table)?.indexes.clone())
    }

    /// (definition, column position) pairs for every index of a table
    pub(crate) fn index_targets(&self, table: &str) -> Result<Vec<(IndexDef, usize)>> {
        let schema = self.catalog.get_table(table)?;
        schema
            .indexes
            .iter()
            .map(|def| {
                let position = schema.get_column_position(&def.column_name).ok_or_else(|| {
                    DbError::Schema(format!(
                        "Column '{}' does not exist in table '{}'",
                        def.column_name, schema.name
                    ))
                })?;
                Ok((def.clone(), position))
            })
            .collect()
    }

    /// Mutable index tree by name; absence means the catalog and the loaded
    /// trees disagree
    pub(crate) fn index_tree(&mut self, name: &str) -> Result<&mut BTree> {
        self.indexes
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| DbError::Schema(format!("Index '{}' is not loaded", name)))
    }

    pub fn tables(&self) -> Vec<String> {
        self.catalog.list_tables()
    }

    pub fn count(&self, table: &str) -> Result<usize> {
        // Validate through the catalog first for a proper error
        self.catalog.get_table(table)?;
        Ok(self.store(table)?.len())
    }

    // -----------------------------------------------------------------------
    // DDL
    // -----------------------------------------------------------------------

    /// Create a table; PRIMARY KEY / UNIQUE columns get implicit unique
    /// indexes registered alongside any declared ones.
    pub fn create_table(&mut self, mut schema: TableSchema) -> Result<()> {
        let table_key = schema.name.to_lowercase();

        let implicit: Vec<IndexDef> = schema
            .columns
            .iter()
            .filter(|col| col.primary_key || col.unique)
            .map(|col| {
                let prefix = if col.primary_key { "pk" } else { "unique" };
                let name = format!("{}_{}_{}", prefix, table_key, col.name.to_lowercase());
                IndexDef::new(name, table_key.clone(), col.name.clone(), true)
            })
            .collect();
        schema.indexes.extend(implicit);

        let index_defs = schema.indexes.clone();
        self.catalog.create_table(schema)?;
        self.stores.insert(table_key.clone(), TableStore::new());
        for def in index_defs {
            self.indexes.insert(def.name.to_lowercase(), BTree::new(def.unique));
        }

        self.dirty_tables.insert(table_key);
        self.catalog_dirty = true;
        Ok(())
    }

    /// Drop a table, its rows on disk, and all of its indexes
    pub fn drop_table(&mut self, table: &str) -> Result<()> {
        let schema = self.catalog.drop_table(table)?;
        let table_key = schema.name.to_lowercase();

        self.stores.remove(&table_key);
        self.dirty_tables.remove(&table_key);
        for def in &schema.indexes {
            self.indexes.remove(&def.name.to_lowercase());
        }

        self.engine.remove_table(&table_key)?;
        self.catalog_dirty = true;
        Ok(())
    }

    /// Remove all rows, clear the table's indexes, keep the schema
    pub fn truncate_table(&mut self, table: &str) -> Result<()> {
        let defs = self.index_defs(table)?;
        self.store_mut(table)?.truncate();
        for def in defs {
            if let Some(tree) = self.index_mut(&def.name) {
                tree.clear();
            }
        }
        Ok(())
    }

    /// Create a secondary index and backfill it from existing rows
    pub fn create_index(&mut self, def: IndexDef) -> Result<()> {
        let tree = self.build_index_tree(&def)?;
        self.catalog.add_index(def.clone())?;
        self.indexes.insert(def.name.to_lowercase(), tree);
        self.catalog_dirty = true;
        Ok(())
    }

    /// Drop a secondary index. Indexes backing a PRIMARY KEY or UNIQUE
    /// constraint cannot be dropped.
    pub fn drop_index(&mut self, index_name: &str) -> Result<()> {
        let def = self.catalog.get_index(index_name)?;

        if def.unique {
            let schema = self.catalog.get_table(&def.table_name)?;
            if let Some(col) = schema.get_column(&def.column_name) {
                if col.requires_unique() {
                    return Err(DbError::Schema(format!(
                        "Index '{}' enforces a constraint on '{}.{}' and cannot be dropped",
                        index_name, def.table_name, def.column_name
                    )));
                }
            }
        }

        self.catalog.remove_index(index_name)?;
        self.indexes.remove(&index_name.to_lowercase());
        self.catalog_dirty = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Constraint probes
    // -----------------------------------------------------------------------

    /// Fail if `value` already exists in a unique index on `column`.
    /// `exclude` skips the row being updated.
    pub fn probe_unique(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        exclude: Option<crate::types::RowId>,
    ) -> Result<()> {
        if value.is_null() {
            return Ok(()); // nulls never collide
        }

        let defs = self.catalog.get_table(table)?.indexes.clone();
        for def in defs
            .iter()
            .filter(|d| d.unique && d.column_name.eq_ignore_ascii_case(column))
        {
            if let Some(tree) = self.index(&def.name) {
                let hits = tree.search(value);
                let conflicting = match exclude {
                    Some(id) => hits.iter().any(|&h| h != id),
                    None => !hits.is_empty(),
                };
                if conflicting {
                    return Err(DbError::Constraint(format!(
                        "Duplicate value '{}' for unique column '{}'",
                        value, column
                    )));
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persist the catalog and every dirty table (write-then-rename)
    pub fn flush(&mut self) -> Result<()> {
        if self.catalog_dirty {
            self.engine.save_catalog_bytes(&self.catalog.to_bytes()?)?;
            self.catalog_dirty = false;
        }

        let dirty: Vec<String> = self.dirty_tables.drain().collect();
        for table_key in dirty {
            if let Some(store) = self.stores.get(&table_key) {
                self.engine.save_table(&table_key, store)?;
            }
        }
        Ok(())
    }

    /// Mark everything dirty and flush (close path)
    pub fn flush_all(&mut self) -> Result<()> {
        self.catalog_dirty = true;
        let keys: Vec<String> = self.stores.keys().cloned().collect();
        self.dirty_tables.extend(keys);
        self.flush()
    }
}

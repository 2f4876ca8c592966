//! Durable row store
//!
//! Layout under the data directory:
//!
//! ```text
//! data_dir/
//!   catalog          schema metadata (bincode)
//!   tables/<name>    per-table rows + next_row_id (bincode)
//! ```
//!
//! Every write lands in `<path>.tmp` first and is renamed into place, so a
//! crashed flush leaves the previous consistent file untouched. Indexes are
//! not persisted; they are rebuilt from table scans on open.

use crate::error::{DbError, Result};
use crate::types::{Row, RowId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Row id handed to the first insert of a fresh (or truncated) table
const FIRST_ROW_ID: RowId = 1;

/// In-memory rows of one table plus its id counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStore {
    /// row_id -> row; BTreeMap keeps scans in ascending row-id order
    rows: BTreeMap<RowId, Row>,
    /// Next id to assign; strictly monotonic, never reused after deletes
    next_row_id: RowId,
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore {
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_row_id: FIRST_ROW_ID,
        }
    }

    /// Insert a row, returning its assigned id
    pub fn insert(&mut self, row: Row) -> RowId {
        let row_id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(row_id, row);
        row_id
    }

    /// Re-insert a row under a known id (undo path only)
    pub fn restore(&mut self, row_id: RowId, row: Row) {
        self.rows.insert(row_id, row);
    }

    pub fn get(&self, row_id: RowId) -> Option<&Row> {
        self.rows.get(&row_id)
    }

    /// Overwrite a row in place
    pub fn update(&mut self, row_id: RowId, row: Row) -> Result<()> {
        match self.rows.get_mut(&row_id) {
            Some(slot) => {
                *slot = row;
                Ok(())
            }
            None => Err(DbError::NotFound(format!("Row {} does not exist", row_id))),
        }
    }

    /// Remove a row, returning its prior image
    pub fn delete(&mut self, row_id: RowId) -> Result<Row> {
        self.rows
            .remove(&row_id)
            .ok_or_else(|| DbError::NotFound(format!("Row {} does not exist", row_id)))
    }

    /// Iterate rows in ascending row-id order
    pub fn scan(&self) -> impl Iterator<Item = (RowId, &Row)> {
        self.rows.iter().map(|(&id, row)| (id, row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop all rows and restart the id counter
    pub fn truncate(&mut self) {
        self.rows.clear();
        self.next_row_id = FIRST_ROW_ID;
    }

    pub fn next_row_id(&self) -> RowId {
        self.next_row_id
    }
}

/// File manager for the catalog and per-table documents
pub struct StorageEngine {
    data_dir: PathBuf,
}

impl StorageEngine {
    /// Open (creating directories as needed) the storage layout
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(data_dir.join("tables"))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog")
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.data_dir.join("tables").join(name.to_lowercase())
    }

    /// Write-then-rename so a reader never observes a partial file
    fn atomic_write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn catalog_exists(&self) -> bool {
        self.catalog_path().exists()
    }

    pub fn load_catalog_bytes(&self) -> Result<Vec<u8>> {
        Ok(fs::read(self.catalog_path())?)
    }

    pub fn save_catalog_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.catalog_path(), bytes)
    }

    pub fn load_table(&self, name: &str) -> Result<TableStore> {
        let path = self.table_path(name);
        if !path.exists() {
            return Ok(TableStore::new());
        }
        let bytes = fs::read(&path)?;
        bincode::deserialize(&bytes)
            .map_err(|e| DbError::Serialization(format!("Table '{}' is corrupt: {}", name, e)))
    }

    pub fn save_table(&self, name: &str, store: &TableStore) -> Result<()> {
        let bytes = bincode::serialize(store)?;
        self.atomic_write(&self.table_path(name), &bytes)
    }

    pub fn remove_table(&self, name: &str) -> Result<()> {
        let path = self.table_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

//! Journaled row primitives
//!
//! Every mutation records its inverse in an `UndoLog`. A statement that
//! fails partway is rolled back by replaying the log in reverse, restoring
//! both rows and index entries; nothing is flushed for a failed statement.

use super::core::GritDB;
use crate::error::{DbError, Result};
use crate::types::{Row, RowId, Value};

#[derive(Debug)]
pub enum UndoOp {
    RowInserted {
        table: String,
        row_id: RowId,
    },
    RowUpdated {
        table: String,
        row_id: RowId,
        old_row: Row,
    },
    RowDeleted {
        table: String,
        row_id: RowId,
        old_row: Row,
    },
    IndexInserted {
        index: String,
        key: Value,
        row_id: RowId,
    },
    IndexRemoved {
        index: String,
        key: Value,
        row_id: RowId,
    },
}

/// Per-statement undo journal
#[derive(Debug, Default)]
pub struct UndoLog {
    ops: Vec<UndoOp>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, op: UndoOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl GritDB {
    /// Insert a validated row, probing unique constraints and maintaining
    /// every index of the table.
    pub fn insert_row(&mut self, table: &str, row: Row, log: &mut UndoLog) -> Result<RowId> {
        let schema = self.schema(table)?;
        let table_name = schema.name.clone();

        // Probe unique indexes before touching anything
        let unique_columns: Vec<(String, usize)> = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.requires_unique())
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        for (column, position) in &unique_columns {
            self.probe_unique(&table_name, column, &row[*position], None)?;
        }

        let targets = self.index_targets(&table_name)?;

        let row_for_index = row.clone();
        let row_id = self.store_mut(&table_name)?.insert(row);
        log.record(UndoOp::RowInserted {
            table: table_name.clone(),
            row_id,
        });

        for (def, position) in &targets {
            let key = &row_for_index[*position];
            if key.is_null() {
                continue;
            }
            self.index_tree(&def.name)?.insert(key.clone(), row_id)?;
            log.record(UndoOp::IndexInserted {
                index: def.name.clone(),
                key: key.clone(),
                row_id,
            });
        }

        Ok(row_id)
    }

    /// Overwrite a row, re-probing unique constraints (ignoring the row
    /// itself) and swapping changed index keys.
    pub fn update_row(
        &mut self,
        table: &str,
        row_id: RowId,
        new_row: Row,
        log: &mut UndoLog,
    ) -> Result<()> {
        let schema = self.schema(table)?;
        let table_name = schema.name.clone();

        let old_row = self
            .store(&table_name)?
            .get(row_id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("Row {} does not exist", row_id)))?;

        let schema = self.schema(&table_name)?;
        let unique_columns: Vec<(String, usize)> = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.requires_unique())
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        for (column, position) in &unique_columns {
            if new_row[*position] != old_row[*position] {
                self.probe_unique(&table_name, column, &new_row[*position], Some(row_id))?;
            }
        }

        let targets = self.index_targets(&table_name)?;

        let new_for_index = new_row.clone();
        self.store_mut(&table_name)?.update(row_id, new_row)?;
        log.record(UndoOp::RowUpdated {
            table: table_name.clone(),
            row_id,
            old_row: old_row.clone(),
        });

        for (def, position) in &targets {
            let old_key = &old_row[*position];
            let new_key = &new_for_index[*position];
            if old_key == new_key {
                continue;
            }

            if !old_key.is_null() {
                self.index_tree(&def.name)?.delete(old_key, row_id);
                log.record(UndoOp::IndexRemoved {
                    index: def.name.clone(),
                    key: old_key.clone(),
                    row_id,
                });
            }
            if !new_key.is_null() {
                self.index_tree(&def.name)?.insert(new_key.clone(), row_id)?;
                log.record(UndoOp::IndexInserted {
                    index: def.name.clone(),
                    key: new_key.clone(),
                    row_id,
                });
            }
        }

        Ok(())
    }

    /// Remove a row and all of its index entries
    pub fn delete_row(&mut self, table: &str, row_id: RowId, log: &mut UndoLog) -> Result<()> {
        let table_name = self.schema(table)?.name.clone();
        let targets = self.index_targets(&table_name)?;

        let old_row = self.store_mut(&table_name)?.delete(row_id)?;
        log.record(UndoOp::RowDeleted {
            table: table_name.clone(),
            row_id,
            old_row: old_row.clone(),
        });

        for (def, position) in &targets {
            let key = &old_row[*position];
            if key.is_null() {
                continue;
            }
            self.index_tree(&def.name)?.delete(key, row_id);
            log.record(UndoOp::IndexRemoved {
                index: def.name.clone(),
                key: key.clone(),
                row_id,
            });
        }

        Ok(())
    }

    /// Revert every operation in the log, newest first
    pub fn rollback(&mut self, log: UndoLog) {
        for op in log.ops.into_iter().rev() {
            match op {
                UndoOp::RowInserted { table, row_id } => {
                    if let Ok(store) = self.store_mut(&table) {
                        let _ = store.delete(row_id);
                    }
                }
                UndoOp::RowUpdated {
                    table,
                    row_id,
                    old_row,
                } => {
                    if let Ok(store) = self.store_mut(&table) {
                        let _ = store.update(row_id, old_row);
                    }
                }
                UndoOp::RowDeleted {
                    table,
                    row_id,
                    old_row,
                } => {
                    if let Ok(store) = self.store_mut(&table) {
                        store.restore(row_id, old_row);
                    }
                }
                UndoOp::IndexInserted { index, key, row_id } => {
                    if let Ok(tree) = self.index_tree(&index) {
                        tree.delete(&key, row_id);
                    }
                }
                UndoOp::IndexRemoved { index, key, row_id } => {
                    if let Ok(tree) = self.index_tree(&index) {
                        let _ = tree.insert(key, row_id);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ColumnType, TableSchema};

    fn open_db() -> (tempfile::TempDir, GritDB) {
        let dir = tempfile::tempdir().unwrap();
        let mut db = GritDB::open(dir.path()).unwrap();
        db.create_table(
            TableSchema::new(
                "users",
                vec![
                    ColumnDef::new("id", ColumnType::Integer).primary_key(),
                    ColumnDef::new("email", ColumnType::Text).unique(),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        (dir, db)
    }

    fn user(id: i64, email: &str) -> Row {
        vec![Value::Integer(id), Value::Text(email.into())]
    }

    #[test]
    fn test_insert_maintains_indexes() {
        let (_dir, mut db) = open_db();
        let mut log = UndoLog::new();

        let id = db.insert_row("users", user(1, "a@x"), &mut log).unwrap();
        assert_eq!(
            db.find_index("users", "email")
                .unwrap()
                .search(&Value::Text("a@x".into())),
            vec![id]
        );
    }

    #[test]
    fn test_duplicate_insert_probed_before_mutation() {
        let (_dir, mut db) = open_db();
        let mut log = UndoLog::new();
        db.insert_row("users", user(1, "a@x"), &mut log).unwrap();

        let mut log2 = UndoLog::new();
        let err = db
            .insert_row("users", user(2, "a@x"), &mut log2)
            .unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
        assert!(log2.is_empty(), "failed probe must not journal anything");
        assert_eq!(db.count("users").unwrap(), 1);
    }

    #[test]
    fn test_update_swaps_index_keys() {
        let (_dir, mut db) = open_db();
        let mut log = UndoLog::new();
        let id = db.insert_row("users", user(1, "a@x"), &mut log).unwrap();

        let mut log2 = UndoLog::new();
        db.update_row("users", id, user(1, "b@x"), &mut log2)
            .unwrap();

        let tree = db.find_index("users", "email").unwrap();
        assert!(tree.search(&Value::Text("a@x".into())).is_empty());
        assert_eq!(tree.search(&Value::Text("b@x".into())), vec![id]);
    }

    #[test]
    fn test_update_self_conflict_allowed() {
        let (_dir, mut db) = open_db();
        let mut log = UndoLog::new();
        let id = db.insert_row("users", user(1, "a@x"), &mut log).unwrap();

        // Updating a row to its own value must not trip the unique probe
        let mut log2 = UndoLog::new();
        db.update_row("users", id, user(1, "a@x"), &mut log2)
            .unwrap();
    }

    #[test]
    fn test_delete_removes_index_entries() {
        let (_dir, mut db) = open_db();
        let mut log = UndoLog::new();
        let id = db.insert_row("users", user(1, "a@x"), &mut log).unwrap();

        let mut log2 = UndoLog::new();
        db.delete_row("users", id, &mut log2).unwrap();

        assert_eq!(db.count("users").unwrap(), 0);
        assert!(db
            .find_index("users", "id")
            .unwrap()
            .search(&Value::Integer(1))
            .is_empty());
    }

    #[test]
    fn test_rollback_restores_rows_and_indexes() {
        let (_dir, mut db) = open_db();
        let mut setup = UndoLog::new();
        let id = db.insert_row("users", user(1, "a@x"), &mut setup).unwrap();

        // Statement: update then insert, then roll everything back
        let mut log = UndoLog::new();
        db.update_row("users", id, user(1, "c@x"), &mut log).unwrap();
        db.insert_row("users", user(2, "b@x"), &mut log).unwrap();
        db.rollback(log);

        assert_eq!(db.count("users").unwrap(), 1);
        let stored = db.store("users").unwrap().get(id).cloned().unwrap();
        assert_eq!(stored, user(1, "a@x"));

        let tree = db.find_index("users", "email").unwrap();
        assert_eq!(tree.search(&Value::Text("a@x".into())), vec![id]);
        assert!(tree.search(&Value::Text("b@x".into())).is_empty());
        assert!(tree.search(&Value::Text("c@x".into())).is_empty());
    }

    #[test]
    fn test_rollback_of_delete() {
        let (_dir, mut db) = open_db();
        let mut setup = UndoLog::new();
        let id = db.insert_row("users", user(1, "a@x"), &mut setup).unwrap();

        let mut log = UndoLog::new();
        db.delete_row("users", id, &mut log).unwrap();
        db.rollback(log);

        assert_eq!(db.count("users").unwrap(), 1);
        assert_eq!(
            db.find_index("users", "email")
                .unwrap()
                .search(&Value::Text("a@x".into())),
            vec![id]
        );
    }
}

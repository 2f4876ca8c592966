//! GritDB public API
//!
//! The [`Database`] handle wraps the engine behind a lock so `execute`
//! takes `&self`. The engine itself is single-writer: concurrent callers
//! on one handle are serialized, and two handles over the same data
//! directory are not supported.

use crate::database::GritDB;
use crate::error::Result;
use crate::sql::{execute_sql, QueryResult};
use parking_lot::RwLock;
use std::path::Path;

/// A GritDB database instance
///
/// ```no_run
/// use gritdb::Database;
///
/// # fn main() -> gritdb::Result<()> {
/// let db = Database::open("./data")?;
/// db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(100))")?;
/// db.execute("INSERT INTO users VALUES (1, 'Alice')")?;
/// let result = db.execute("SELECT * FROM users WHERE id = 1")?;
/// for row in result.rows_as_maps() {
///     println!("{:?}", row);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Database {
    inner: RwLock<GritDB>,
}

impl Database {
    /// Open a database directory, creating it if absent
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Ok(Self {
            inner: RwLock::new(GritDB::open(data_dir)?),
        })
    }

    /// Execute one SQL statement
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        execute_sql(&mut self.inner.write(), sql)
    }

    /// Names of all tables, sorted
    pub fn tables(&self) -> Vec<String> {
        self.inner.read().tables()
    }

    /// Row count of one table
    pub fn count(&self, table: &str) -> Result<usize> {
        self.inner.read().count(table)
    }

    /// Force a write-back of all state
    pub fn flush(&self) -> Result<()> {
        self.inner.write().flush_all()
    }

    /// Flush and release (also done automatically on drop)
    pub fn close(&self) -> Result<()> {
        self.flush()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.inner.write().flush_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::types::Value;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        (dir, db)
    }

    fn get<'m>(row: &'m std::collections::HashMap<String, Value>, key: &str) -> &'m Value {
        row.get(key)
            .unwrap_or_else(|| panic!("column '{}' missing from {:?}", key, row))
    }

    #[test]
    fn test_create_insert_select() {
        let (_dir, db) = open_temp();
        db.execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(10) NOT NULL, age INTEGER)",
        )
        .unwrap();
        db.execute("INSERT INTO users VALUES (1, 'Alice', 30)").unwrap();
        db.execute("INSERT INTO users VALUES (2, 'Bob', 25)").unwrap();

        let result = db
            .execute("SELECT name FROM users WHERE age > 26 ORDER BY age DESC")
            .unwrap();
        assert_eq!(result.columns, vec!["name"]);
        assert_eq!(result.rows, vec![vec![Value::Text("Alice".into())]]);
    }

    #[test]
    fn test_unique_violation_keeps_table_intact() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE u (id INTEGER PRIMARY KEY, e VARCHAR(20) UNIQUE)")
            .unwrap();
        db.execute("INSERT INTO u VALUES (1, 'a@x')").unwrap();

        let err = db.execute("INSERT INTO u VALUES (2, 'a@x')").unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));

        let result = db.execute("SELECT COUNT(*) FROM u").unwrap();
        assert_eq!(result.columns, vec!["COUNT(*)"]);
        assert_eq!(result.rows, vec![vec![Value::Integer(1)]]);
    }

    #[test]
    fn test_left_join_with_group_by() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE c (id INTEGER PRIMARY KEY, name VARCHAR(20))")
            .unwrap();
        db.execute("CREATE TABLE e (id INTEGER PRIMARY KEY, cid INTEGER, amount FLOAT)")
            .unwrap();
        db.execute("INSERT INTO c VALUES (1, 'Food')").unwrap();
        db.execute("INSERT INTO c VALUES (2, 'Rent')").unwrap();
        db.execute("INSERT INTO e VALUES (10, 1, 5.0)").unwrap();

        let result = db
            .execute(
                "SELECT c.name, COUNT(e.id) FROM c LEFT JOIN e ON c.id = e.cid \
                 GROUP BY c.name ORDER BY c.name",
            )
            .unwrap();

        assert_eq!(
            result.rows,
            vec![
                vec![Value::Text("Food".into()), Value::Integer(1)],
                vec![Value::Text("Rent".into()), Value::Integer(0)],
            ]
        );
    }

    #[test]
    fn test_aggregates_with_nulls() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE x (v INTEGER)").unwrap();
        db.execute("INSERT INTO x VALUES (1)").unwrap();
        db.execute("INSERT INTO x VALUES (NULL)").unwrap();
        db.execute("INSERT INTO x VALUES (3)").unwrap();

        let result = db
            .execute("SELECT COUNT(*), COUNT(v), SUM(v), AVG(v) FROM x")
            .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![
                Value::Integer(3),
                Value::Integer(2),
                Value::Integer(4),
                Value::Float(2.0),
            ]]
        );
    }

    #[test]
    fn test_range_query_with_index() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE p (id INTEGER PRIMARY KEY, price FLOAT)")
            .unwrap();
        db.execute("CREATE INDEX idx_price ON p (price)").unwrap();
        db.execute("INSERT INTO p VALUES (1, 10.0)").unwrap();
        db.execute("INSERT INTO p VALUES (2, 25.0)").unwrap();
        db.execute("INSERT INTO p VALUES (3, 50.0)").unwrap();

        let result = db
            .execute("SELECT id FROM p WHERE price BETWEEN 20 AND 40 ORDER BY id")
            .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(2)]]);
    }

    #[test]
    fn test_update_constraint_violation_rolls_back() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, e VARCHAR(20) UNIQUE)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, 'a')").unwrap();
        db.execute("INSERT INTO t VALUES (2, 'b')").unwrap();

        let err = db
            .execute("UPDATE t SET e = 'a' WHERE id = 2")
            .unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));

        let result = db.execute("SELECT e FROM t WHERE id = 2").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Text("b".into())]]);
    }

    #[test]
    fn test_multi_row_insert_is_atomic() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, n INTEGER)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, 10)").unwrap();

        // Second row collides with the existing primary key; the whole
        // statement must be rolled back
        let err = db
            .execute("INSERT INTO t VALUES (2, 20), (1, 30), (3, 40)")
            .unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
        assert_eq!(db.count("t").unwrap(), 1);

        let result = db.execute("SELECT id FROM t").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(1)]]);
    }

    #[test]
    fn test_reopen_reproduces_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            db.execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT, at TIMESTAMP)")
                .unwrap();
            db.execute("INSERT INTO notes VALUES (1, 'hello', '2023-06-15 10:30:00')")
                .unwrap();
            db.execute("INSERT INTO notes VALUES (2, NULL, NULL)").unwrap();
            db.close().unwrap();
        }

        let db = Database::open(dir.path()).unwrap();
        assert_eq!(db.tables(), vec!["notes"]);
        assert_eq!(db.count("notes").unwrap(), 2);

        let result = db.execute("SELECT body FROM notes WHERE at IS NOT NULL").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Text("hello".into())]]);

        // Primary key index was rebuilt on open
        let err = db.execute("INSERT INTO notes VALUES (1, 'dup', NULL)").unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));

        // Row ids keep increasing after reopen
        db.execute("INSERT INTO notes VALUES (3, 'more', NULL)").unwrap();
        assert_eq!(db.count("notes").unwrap(), 3);
    }

    #[test]
    fn test_truncate_preserves_schema_and_resets_ids() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, 10)").unwrap();
        db.execute("INSERT INTO t VALUES (2, 20)").unwrap();

        db.execute("TRUNCATE TABLE t").unwrap();
        let result = db.execute("SELECT COUNT(*) FROM t").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(0)]]);

        // Schema survives; previously-used keys are free again
        db.execute("INSERT INTO t VALUES (1, 99)").unwrap();
        assert_eq!(db.count("t").unwrap(), 1);
    }

    #[test]
    fn test_drop_and_recreate_table() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, 'x')").unwrap();
        db.execute("DROP TABLE t").unwrap();
        assert!(db.tables().is_empty());

        // Identical definition succeeds after the drop
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        assert_eq!(db.count("t").unwrap(), 0);
    }

    #[test]
    fn test_where_null_semantics() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, NULL)").unwrap();
        db.execute("INSERT INTO t VALUES (2, 5)").unwrap();

        // Comparing against NULL yields no rows; IS NULL does
        let result = db.execute("SELECT id FROM t WHERE v = NULL").unwrap();
        assert!(result.rows.is_empty());
        let result = db.execute("SELECT id FROM t WHERE v IS NULL").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(1)]]);
    }

    #[test]
    fn test_empty_string_is_not_null() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, s TEXT)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, '')").unwrap();

        let result = db.execute("SELECT id FROM t WHERE s IS NULL").unwrap();
        assert!(result.rows.is_empty());
        let result = db.execute("SELECT id FROM t WHERE s = ''").unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_varchar_boundary() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, s VARCHAR(3))")
            .unwrap();

        db.execute("INSERT INTO t VALUES (1, 'abc')").unwrap();
        let err = db.execute("INSERT INTO t VALUES (2, 'abcd')").unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn test_default_values() {
        let (_dir, db) = open_temp();
        db.execute(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, \
             status TEXT DEFAULT 'new', score INTEGER DEFAULT 0)",
        )
        .unwrap();
        db.execute("INSERT INTO t (id) VALUES (1)").unwrap();

        let result = db.execute("SELECT status, score FROM t").unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Text("new".into()), Value::Integer(0)]]
        );
    }

    #[test]
    fn test_not_null_without_default_fails() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .unwrap();

        let err = db.execute("INSERT INTO t (id) VALUES (1)").unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
        let err = db.execute("INSERT INTO t VALUES (1, NULL)").unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn test_distinct_treats_nulls_equal() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, NULL)").unwrap();
        db.execute("INSERT INTO t VALUES (2, NULL)").unwrap();
        db.execute("INSERT INTO t VALUES (3, 7)").unwrap();

        let result = db.execute("SELECT DISTINCT v FROM t").unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_order_by_null_placement() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, 5)").unwrap();
        db.execute("INSERT INTO t VALUES (2, NULL)").unwrap();
        db.execute("INSERT INTO t VALUES (3, 1)").unwrap();

        // Nulls first under ASC
        let result = db.execute("SELECT id FROM t ORDER BY v").unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(2)],
                vec![Value::Integer(3)],
                vec![Value::Integer(1)],
            ]
        );

        // Nulls last under DESC
        let result = db.execute("SELECT id FROM t ORDER BY v DESC").unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(1)],
                vec![Value::Integer(3)],
                vec![Value::Integer(2)],
            ]
        );
    }

    #[test]
    fn test_limit_offset_after_ordering() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        for i in 1..=10 {
            db.execute(&format!("INSERT INTO t VALUES ({})", i)).unwrap();
        }

        let result = db
            .execute("SELECT id FROM t ORDER BY id DESC LIMIT 3 OFFSET 2")
            .unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(8)],
                vec![Value::Integer(7)],
                vec![Value::Integer(6)],
            ]
        );
    }

    #[test]
    fn test_inner_join() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE a (id INTEGER PRIMARY KEY, bid INTEGER)")
            .unwrap();
        db.execute("CREATE TABLE b (id INTEGER PRIMARY KEY, label TEXT)")
            .unwrap();
        db.execute("INSERT INTO a VALUES (1, 10)").unwrap();
        db.execute("INSERT INTO a VALUES (2, 99)").unwrap();
        db.execute("INSERT INTO b VALUES (10, 'ten')").unwrap();

        let result = db
            .execute("SELECT a.id, b.label FROM a JOIN b ON a.bid = b.id")
            .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Integer(1), Value::Text("ten".into())]]
        );
    }

    #[test]
    fn test_having_filters_groups() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE s (id INTEGER PRIMARY KEY, dept TEXT, pay INTEGER)")
            .unwrap();
        db.execute("INSERT INTO s VALUES (1, 'eng', 100)").unwrap();
        db.execute("INSERT INTO s VALUES (2, 'eng', 200)").unwrap();
        db.execute("INSERT INTO s VALUES (3, 'ops', 50)").unwrap();

        let result = db
            .execute(
                "SELECT dept, SUM(pay) FROM s GROUP BY dept \
                 HAVING COUNT(*) > 1 ORDER BY dept",
            )
            .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Text("eng".into()), Value::Integer(300)]]
        );
    }

    #[test]
    fn test_grouped_projection_must_use_group_keys() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE s (id INTEGER PRIMARY KEY, dept TEXT, pay INTEGER)")
            .unwrap();
        db.execute("INSERT INTO s VALUES (1, 'eng', 100)").unwrap();
        db.execute("INSERT INTO s VALUES (2, 'eng', 200)").unwrap();

        // A non-key column inside a compound projection is rejected
        let err = db
            .execute("SELECT dept, pay + 1 FROM s GROUP BY dept")
            .unwrap_err();
        assert!(matches!(err, DbError::Schema(_)));

        // Same rule applies to HAVING
        let err = db
            .execute("SELECT dept FROM s GROUP BY dept HAVING pay > 100")
            .unwrap_err();
        assert!(matches!(err, DbError::Schema(_)));

        // Group keys and aggregate results compose freely
        let result = db
            .execute("SELECT dept, MAX(pay) + 1 FROM s GROUP BY dept")
            .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Text("eng".into()), Value::Integer(201)]]
        );
    }

    #[test]
    fn test_aggregate_inside_scalar_function() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE s (id INTEGER PRIMARY KEY, pay INTEGER)")
            .unwrap();
        db.execute("INSERT INTO s VALUES (1, -100)").unwrap();
        db.execute("INSERT INTO s VALUES (2, -50)").unwrap();

        let result = db.execute("SELECT ABS(SUM(pay)) FROM s").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(150)]]);
    }

    #[test]
    fn test_show_tables_and_describe() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE zz (id INTEGER PRIMARY KEY)").unwrap();
        db.execute("CREATE TABLE aa (id INTEGER PRIMARY KEY, v VARCHAR(5) NOT NULL)")
            .unwrap();

        let result = db.execute("SHOW TABLES").unwrap();
        assert_eq!(result.columns, vec!["table_name"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Text("aa".into())],
                vec![Value::Text("zz".into())],
            ]
        );

        let result = db.execute("DESCRIBE aa").unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0][0], Value::Text("id".into()));
        assert_eq!(result.rows[0][3], Value::Text("PRI".into()));
        assert_eq!(result.rows[1][1], Value::Text("VARCHAR(5)".into()));
        assert_eq!(result.rows[1][2], Value::Text("NO".into()));
    }

    #[test]
    fn test_delete_then_count_is_zero() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, 5)").unwrap();
        db.execute("INSERT INTO t VALUES (2, 5)").unwrap();
        db.execute("INSERT INTO t VALUES (3, 9)").unwrap();

        let result = db.execute("DELETE FROM t WHERE v = 5").unwrap();
        assert_eq!(result.affected, 2);

        let result = db.execute("SELECT COUNT(*) FROM t WHERE v = 5").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(0)]]);
    }

    #[test]
    fn test_like_and_in_filters() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, 'Alice')").unwrap();
        db.execute("INSERT INTO t VALUES (2, 'Bob')").unwrap();
        db.execute("INSERT INTO t VALUES (3, 'Anna')").unwrap();

        let result = db
            .execute("SELECT id FROM t WHERE name LIKE 'A%' ORDER BY id")
            .unwrap();
        assert_eq!(result.rows.len(), 2);

        let result = db
            .execute("SELECT id FROM t WHERE id IN (2, 3) ORDER BY id")
            .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Integer(2)], vec![Value::Integer(3)]]
        );
    }

    #[test]
    fn test_dates_coerce_on_write_and_order() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE ev (id INTEGER PRIMARY KEY, d DATE)")
            .unwrap();
        db.execute("INSERT INTO ev VALUES (2, '2023-06-20')").unwrap();
        db.execute("INSERT INTO ev VALUES (1, '2023-01-15')").unwrap();

        // Stored values are dates, not text, and order chronologically
        let result = db.execute("SELECT id FROM ev ORDER BY d").unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]
        );

        // A malformed date is rejected on write
        let err = db.execute("INSERT INTO ev VALUES (3, '2023-13-01')").unwrap_err();
        assert!(matches!(err, DbError::Type(_)));

        // Comparing a DATE column against a bare string is a type error
        let err = db
            .execute("SELECT id FROM ev WHERE d > '2023-03-01'")
            .unwrap_err();
        assert!(matches!(err, DbError::Type(_)));
    }

    #[test]
    fn test_rows_as_maps() {
        let (_dir, db) = open_temp();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1, 'x')").unwrap();

        let result = db.execute("SELECT * FROM t").unwrap();
        let maps = result.rows_as_maps();
        assert_eq!(get(&maps[0], "id"), &Value::Integer(1));
        assert_eq!(get(&maps[0], "v"), &Value::Text("x".into()));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let (_dir, db) = open_temp();
        let err = db.execute("SELEC * FROM t").unwrap_err();
        assert!(matches!(err, DbError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_unknown_table_is_schema_error() {
        let (_dir, db) = open_temp();
        let err = db.execute("SELECT * FROM ghost").unwrap_err();
        assert!(matches!(err, DbError::Schema(_)));
        assert!(db.count("ghost").is_err());
    }
}

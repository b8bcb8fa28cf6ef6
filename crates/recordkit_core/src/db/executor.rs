//! Store executor contract and its SQLite implementation.
//!
//! # Responsibility
//! - Run parameterized DML and SELECT statements on behalf of repositories.
//! - Hand back owned rows so callers never hold statement borrows.
//!
//! # Invariants
//! - Placeholders are positional `?`; `params` bind left to right.
//! - Executors never retry; the first failure is returned as-is.

use super::{DbError, DbResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// Outcome of one DML statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Rowid of the most recent successful INSERT on this connection.
    pub last_insert_id: i64,
}

/// One result row, detached from the statement that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRow {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl StoreRow {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the raw value for `column`, if the row has it.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }

    pub fn get_i64(&self, column: &str) -> DbResult<i64> {
        match self.require(column)? {
            Value::Integer(value) => Ok(*value),
            other => Err(type_mismatch(column, "integer", other)),
        }
    }

    pub fn get_text(&self, column: &str) -> DbResult<String> {
        match self.require(column)? {
            Value::Text(value) => Ok(value.clone()),
            other => Err(type_mismatch(column, "text", other)),
        }
    }

    pub fn get_opt_text(&self, column: &str) -> DbResult<Option<String>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value.clone())),
            other => Err(type_mismatch(column, "text or null", other)),
        }
    }

    fn require(&self, column: &str) -> DbResult<&Value> {
        self.value(column).ok_or_else(|| DbError::InvalidRow {
            column: column.to_string(),
            message: "column missing from result set".to_string(),
        })
    }
}

fn type_mismatch(column: &str, expected: &str, actual: &Value) -> DbError {
    DbError::InvalidRow {
        column: column.to_string(),
        message: format!("expected {expected}, got {:?}", actual.data_type()),
    }
}

/// Statement runner consumed by every repository.
pub trait StoreExecutor {
    /// Runs one INSERT/UPDATE/DELETE statement.
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome>;

    /// Runs one SELECT statement and collects every row.
    fn query_many(&self, sql: &str, params: &[Value]) -> DbResult<Vec<StoreRow>>;

    /// Runs one SELECT statement and returns its first row.
    fn query_one(&self, sql: &str, params: &[Value]) -> DbResult<Option<StoreRow>> {
        Ok(self.query_many(sql, params)?.into_iter().next())
    }
}

impl StoreExecutor for Connection {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        let mut stmt = self.prepare(sql)?;
        let changed = stmt.execute(params_from_iter(params))?;
        Ok(ExecOutcome {
            rows_affected: changed as u64,
            last_insert_id: self.last_insert_rowid(),
        })
    }

    fn query_many(&self, sql: &str, params: &[Value]) -> DbResult<Vec<StoreRow>> {
        let mut stmt = self.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.query(params_from_iter(params))?;
        let mut collected = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                values.push(row.get::<_, Value>(index)?);
            }
            collected.push(StoreRow::new(columns.clone(), values));
        }

        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreExecutor, StoreRow};
    use crate::db::DbError;
    use rusqlite::types::Value;
    use rusqlite::Connection;

    #[test]
    fn execute_reports_rows_and_last_insert_id() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();

        let first = StoreExecutor::execute(
            &conn,
            "INSERT INTO t (name) VALUES (?)",
            &[Value::Text("a".to_string())],
        )
        .unwrap();
        let second = StoreExecutor::execute(
            &conn,
            "INSERT INTO t (name) VALUES (?)",
            &[Value::Text("b".to_string())],
        )
        .unwrap();

        assert_eq!(first.rows_affected, 1);
        assert_eq!(first.last_insert_id, 1);
        assert_eq!(second.last_insert_id, 2);
    }

    #[test]
    fn query_one_returns_first_row_or_none() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO t (name) VALUES ('x'), ('y');",
        )
        .unwrap();

        let row = StoreExecutor::query_one(&conn, "SELECT id, name FROM t ORDER BY id DESC", &[])
            .unwrap()
            .unwrap();
        assert_eq!(row.get_i64("id").unwrap(), 2);
        assert_eq!(row.get_text("name").unwrap(), "y");

        let none =
            StoreExecutor::query_one(&conn, "SELECT id FROM t WHERE id > ?", &[Value::Integer(10)])
                .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn row_getters_reject_missing_columns_and_wrong_types() {
        let row = StoreRow::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Integer(3), Value::Null],
        );

        assert!(matches!(
            row.get_i64("missing"),
            Err(DbError::InvalidRow { .. })
        ));
        assert!(matches!(row.get_text("id"), Err(DbError::InvalidRow { .. })));
        assert_eq!(row.get_opt_text("name").unwrap(), None);
    }
}

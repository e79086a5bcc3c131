//! Database Handler — runs workflow `database` inputs/outputs against a
//! Postgres connection named in [`DatabaseSettings`], classifying each
//! statement as a read or a write from its leading keyword.
//!
//! Connections are cached by logical database name and pinged before reuse;
//! a dead connection is dropped and a fresh one opened transparently.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{Column, PgPool, Row};
use tokio::sync::Mutex;

use crate::config::DatabaseSettings;
use crate::error::ComandaError;

#[derive(Clone, Default)]
pub struct DatabaseHandler {
    pools: Arc<Mutex<HashMap<String, PgPool>>>,
}

/// Whether a statement reads or mutates. Decided purely from the leading
/// keyword — no SQL parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

/// Classify `sql` by its first keyword. `SELECT`/`WITH`/`SHOW`/`EXPLAIN` read;
/// everything else (`INSERT`, `UPDATE`, `DELETE`, `CREATE`, ...) writes.
pub fn classify(sql: &str) -> StatementKind {
    let first_word = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_uppercase();
    match first_word.as_str() {
        "SELECT" | "WITH" | "SHOW" | "EXPLAIN" => StatementKind::Read,
        _ => StatementKind::Write,
    }
}

impl DatabaseHandler {
    pub fn new() -> Self {
        Self::default()
    }

    async fn pool_for(
        &self,
        name: &str,
        settings: &DatabaseSettings,
    ) -> Result<PgPool, ComandaError> {
        let mut pools = self.pools.lock().await;

        if let Some(pool) = pools.get(name) {
            if sqlx::query("SELECT 1").execute(pool).await.is_ok() {
                return Ok(pool.clone());
            }
            pools.remove(name);
        }

        let url = format!(
            "postgres://{}:{}@{}:{}/{}",
            settings.user, settings.password, settings.host, settings.port, settings.database
        );
        let pool = PgPool::connect(&url)
            .await
            .map_err(|e| ComandaError::Upstream(format!("connecting to database {name}: {e}")))?;
        pools.insert(name.to_string(), pool.clone());
        Ok(pool)
    }

    /// Run `sql` as a read in a read context (a `{database: {query}}` input).
    /// Fatal error if `sql` does not classify as a read — a read context may
    /// not silently execute a mutating statement.
    pub async fn execute_read(
        &self,
        name: &str,
        settings: &DatabaseSettings,
        sql: &str,
    ) -> Result<String, ComandaError> {
        if classify(sql) != StatementKind::Read {
            return Err(ComandaError::Validation(format!(
                "database input expects a read statement (SELECT/WITH/SHOW/EXPLAIN), got: {sql}"
            )));
        }
        let pool = self.pool_for(name, settings).await?;
        let rows = sqlx::query(sql)
            .fetch_all(&pool)
            .await
            .map_err(|e| ComandaError::Upstream(format!("query failed: {e}")))?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cells = Vec::with_capacity(row.columns().len());
            for col in row.columns() {
                let value = decode_column(row, col.ordinal());
                cells.push(value);
            }
            lines.push(cells.join("\t"));
        }
        Ok(lines.join("\n"))
    }

    /// Run `sql` as a write in a write context (a `{database: {table}}`
    /// output). Fatal error if `sql` classifies as a read — a write context
    /// may not silently execute a `SELECT`.
    pub async fn execute_write(
        &self,
        name: &str,
        settings: &DatabaseSettings,
        sql: &str,
    ) -> Result<String, ComandaError> {
        if classify(sql) != StatementKind::Write {
            return Err(ComandaError::Validation(format!(
                "database output expects a write statement, got a read statement: {sql}"
            )));
        }
        let pool = self.pool_for(name, settings).await?;
        let result = sqlx::query(sql)
            .execute(&pool)
            .await
            .map_err(|e| ComandaError::Upstream(format!("statement failed: {e}")))?;
        Ok(format!("{} row(s) affected", result.rows_affected()))
    }
}

fn decode_column(row: &sqlx::postgres::PgRow, index: usize) -> String {
    row.try_get::<String, _>(index)
        .or_else(|_| row.try_get::<i64, _>(index).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<i32, _>(index).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<f64, _>(index).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<bool, _>(index).map(|v| v.to_string()))
        .or_else(|_| {
            row.try_get::<Vec<u8>, _>(index)
                .map(|v| String::from_utf8_lossy(&v).to_string())
        })
        .unwrap_or_else(|_| "NULL".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_reads() {
        assert_eq!(classify("SELECT * FROM t"), StatementKind::Read);
        assert_eq!(classify("  with x as (select 1) select * from x"), StatementKind::Read);
        assert_eq!(classify("EXPLAIN SELECT 1"), StatementKind::Read);
    }

    #[test]
    fn classify_writes() {
        assert_eq!(classify("INSERT INTO t VALUES (1)"), StatementKind::Write);
        assert_eq!(classify("update t set x = 1"), StatementKind::Write);
        assert_eq!(classify("DELETE FROM t"), StatementKind::Write);
        assert_eq!(classify("CREATE TABLE t (x int)"), StatementKind::Write);
    }

    #[tokio::test]
    async fn execute_read_rejects_a_write_statement() {
        let handler = DatabaseHandler::new();
        let settings = DatabaseSettings {
            kind: "postgres".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "u".to_string(),
            password: "p".to_string(),
            database: "d".to_string(),
        };
        let err = handler.execute_read("d", &settings, "DELETE FROM t").await.unwrap_err();
        assert!(matches!(err, ComandaError::Validation(_)));
    }

    #[tokio::test]
    async fn execute_write_rejects_a_read_statement() {
        let handler = DatabaseHandler::new();
        let settings = DatabaseSettings {
            kind: "postgres".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "u".to_string(),
            password: "p".to_string(),
            database: "d".to_string(),
        };
        let err = handler.execute_write("d", &settings, "SELECT * FROM t").await.unwrap_err();
        assert!(matches!(err, ComandaError::Validation(_)));
    }
}

//! The Schema Resolver (spec §4.3): looks up `(column_name, declared_type)`
//! pairs for a `(database, table)` pair from the server's information
//! catalog, ordered by ordinal position, and memoizes the result.

use async_trait::async_trait;
use cdc_model::{ColumnCatalog, Error, Result, SchemaEntry};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Row as MyRow};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Resolves and caches column metadata over a single `mysql_async`
/// connection. The cache is keyed by `(db, table)`; failures are
/// propagated rather than cached, so a transient catalog error doesn't
/// poison future lookups for the same table.
pub struct SchemaResolver {
    conn: Mutex<Conn>,
    cache: Mutex<HashMap<(String, String), SchemaEntry>>,
}

impl SchemaResolver {
    pub fn new(conn: Conn) -> Self {
        SchemaResolver {
            conn: Mutex::new(conn),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop a cached entry, e.g. after a DDL statement observed in a Query
    /// event invalidates a table's shape (SPEC_FULL §4 addition).
    pub async fn invalidate(&self, database: &str, table: &str) {
        self.cache
            .lock()
            .await
            .remove(&(database.to_string(), table.to_string()));
    }
}

#[async_trait]
impl ColumnCatalog for SchemaResolver {
    /// `columns(db, table) -> (names[], types[])` per spec §4.3, memoized.
    async fn columns(&self, database: &str, table: &str) -> Result<SchemaEntry> {
        let key = (database.to_string(), table.to_string());
        if let Some(entry) = self.cache.lock().await.get(&key) {
            return Ok(entry.clone());
        }

        let rows: Vec<MyRow> = {
            let mut conn = self.conn.lock().await;
            conn.exec(
                "SELECT COLUMN_NAME, COLUMN_TYPE FROM information_schema.columns \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
                (database, table),
            )
            .await
            .map_err(|e| {
                Error::Decode(format!(
                    "schema lookup for {database}.{table} failed: {e}"
                ))
            })?
        };

        if rows.is_empty() {
            return Err(Error::Decode(format!(
                "schema lookup for {database}.{table} returned no columns; table may not exist"
            )));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let (name, type_text): (String, String) = mysql_async::from_row(row);
            columns.push((name, type_text));
        }

        debug!(database, table, columns = columns.len(), "resolved schema");
        let entry = SchemaEntry::new(columns);
        self.cache.lock().await.insert(key, entry.clone());
        Ok(entry)
    }
}

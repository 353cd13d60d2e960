use crate::{Result, SchemaEntry};
use async_trait::async_trait;

/// `columns(db, table) -> (names[], types[])`, memoized (spec §4.3),
/// abstracted so the Decoder can be driven by a fake catalog in tests
/// instead of a live information-schema connection.
#[async_trait]
pub trait ColumnCatalog: Send + Sync {
    async fn columns(&self, database: &str, table: &str) -> Result<SchemaEntry>;
}

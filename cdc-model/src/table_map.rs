/// A short-lived descriptor the Source caches before a run of row events
/// for a given table (spec §3/§4.5).
///
/// `table_id` may be reused across a schema change: any new `TableMap`
/// event simply replaces the prior cache entry for that id, it is never
/// merged with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMap {
    pub table_id: u64,
    pub database: String,
    pub table: String,
    pub column_count: usize,
    /// Column names embedded in the binlog event itself, when the server
    /// has row metadata enabled (MySQL 8.0.1+/MariaDB with the feature on).
    /// Absent on older servers; the Decoder then falls back to the Schema
    /// Resolver for names too.
    pub column_names: Option<Vec<String>>,
}

impl TableMap {
    pub fn new(table_id: u64, database: impl Into<String>, table: impl Into<String>, column_count: usize) -> Self {
        TableMap {
            table_id,
            database: database.into(),
            table: table.into(),
            column_count,
            column_names: None,
        }
    }

    pub fn with_column_names(mut self, names: Vec<String>) -> Self {
        self.column_names = Some(names);
        self
    }
}

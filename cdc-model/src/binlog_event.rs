use crate::raw_row::RawRow;
use crate::table_map::TableMap;

/// Which DML statement produced a rows event, across protocol versions
/// v0/v1/v2 (spec §4.8: "Row event (WRITE/UPDATE/DELETE variants v0/v1/v2)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEventKind {
    Write,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct RowsPayload {
    pub table_id: u64,
    pub kind: RowEventKind,
    /// For Write/Delete, one tuple per affected row. For Update, tuples
    /// alternate pre-image/post-image per spec §4.5 ("the 2i-th tuple is
    /// the pre-image, the (2i+1)-th the post-image").
    pub rows: Vec<RawRow>,
}

/// The low-level event sequence the Binlog Source yields from `next()`
/// (spec §4.4 contract), already stripped of wire framing but not yet
/// resolved against schema or grouped into a ChangeEvent.
#[derive(Debug, Clone)]
pub enum BinlogEvent {
    TableMap(TableMap),
    Rows(RowsPayload),
    Rotate { next_file: String, position: u64 },
    Query { database: String, sql: String },
    Xid,
    Heartbeat,
    /// Anything else the dispatch table logs at debug and ignores (spec
    /// §4.8: "Query event / XID event / others -> logged at debug").
    Other,
}

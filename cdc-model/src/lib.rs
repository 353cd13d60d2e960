//! Canonical in-memory types shared by every stage of the CDC pipeline.
//!
//! Nothing in here talks to MySQL, a file or the bus: this crate only
//! defines what a change looks like once it has been decoded, and the error
//! taxonomy the rest of the workspace classifies failures into.

pub mod binlog_event;
pub mod catalog;
pub mod change_event;
pub mod column_value;
pub mod error;
pub mod position;
pub mod raw_row;
pub mod row;
pub mod schema_entry;
pub mod sink;
pub mod source;
pub mod table_map;
pub mod transform_rule;

pub use binlog_event::{BinlogEvent, RowEventKind, RowsPayload};
pub use catalog::ColumnCatalog;
pub use change_event::{ChangeEvent, ChangeType};
pub use column_value::ColumnValue;
pub use error::{Error, Result};
pub use position::Position;
pub use raw_row::{RawColumn, RawRow};
pub use row::Row;
pub use schema_entry::SchemaEntry;
pub use sink::EventSink;
pub use source::BinlogEventSource;
pub use table_map::TableMap;
pub use transform_rule::TransformRule;

use crate::row::Row;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// The kind of DML that produced a [`ChangeEvent`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Insert => "INSERT",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
        }
    }
}

/// The unit published downstream (spec §3/§4.1).
///
/// `old_rows` only carries data for `Update`; for `Insert`/`Delete` it is
/// always empty and omitted from the canonical serialization. `raw_bytes`
/// is the Transformer's opaque tail (spec §4.6.3): when a script adds
/// fields that do not fit the canonical shape, the Sink publishes this
/// verbatim serialization instead of re-deriving one from the struct.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub change_type: ChangeType,
    pub database: String,
    pub table: String,
    pub timestamp: i64,
    pub rows: Vec<Row>,
    pub old_rows: Vec<Row>,
    pub raw_bytes: Option<Vec<u8>>,
}

impl ChangeEvent {
    pub fn insert(database: impl Into<String>, table: impl Into<String>, timestamp: i64, rows: Vec<Row>) -> Self {
        ChangeEvent {
            change_type: ChangeType::Insert,
            database: database.into(),
            table: table.into(),
            timestamp,
            rows,
            old_rows: Vec::new(),
            raw_bytes: None,
        }
    }

    pub fn delete(database: impl Into<String>, table: impl Into<String>, timestamp: i64, rows: Vec<Row>) -> Self {
        ChangeEvent {
            change_type: ChangeType::Delete,
            database: database.into(),
            table: table.into(),
            timestamp,
            rows,
            old_rows: Vec::new(),
            raw_bytes: None,
        }
    }

    pub fn update(
        database: impl Into<String>,
        table: impl Into<String>,
        timestamp: i64,
        old_rows: Vec<Row>,
        rows: Vec<Row>,
    ) -> Self {
        ChangeEvent {
            change_type: ChangeType::Update,
            database: database.into(),
            table: table.into(),
            timestamp,
            rows,
            old_rows,
            raw_bytes: None,
        }
    }

    /// Canonical JSON serialization, fixed field names per spec §4.1/§6.
    /// Ignores `raw_bytes`; callers that want the opaque tail published
    /// verbatim (the Sink) check `raw_bytes` themselves.
    pub fn to_canonical_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Reconstruct the canonical fields of a `ChangeEvent` from an
    /// arbitrary JSON value, as returned by a Transformer script (spec
    /// §4.6.3: "Canonical fields are extracted into a fresh ChangeEvent").
    /// Fields beyond the canonical shape are ignored here; the caller
    /// attaches the full serialized JSON as `raw_bytes` separately.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, String> {
        let obj = value.as_object().ok_or("expected a JSON object")?;

        let type_str = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or("missing `type`")?;
        let change_type = match type_str {
            "INSERT" => ChangeType::Insert,
            "UPDATE" => ChangeType::Update,
            "DELETE" => ChangeType::Delete,
            other => return Err(format!("unknown `type` value `{other}`")),
        };

        let database = obj
            .get("database")
            .and_then(|v| v.as_str())
            .ok_or("missing `database`")?
            .to_string();
        let table = obj
            .get("table")
            .and_then(|v| v.as_str())
            .ok_or("missing `table`")?
            .to_string();
        let timestamp = obj
            .get("timestamp")
            .and_then(|v| v.as_i64())
            .ok_or("missing `timestamp`")?;

        Ok(ChangeEvent {
            change_type,
            database,
            table,
            timestamp,
            rows: parse_rows(obj.get("rows"))?,
            old_rows: parse_rows(obj.get("old_rows"))?,
            raw_bytes: None,
        })
    }
}

fn parse_rows(value: Option<&serde_json::Value>) -> Result<Vec<Row>, String> {
    match value {
        None => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| serde_json::from_value(item.clone()).map_err(|e| e.to_string()))
            .collect(),
        Some(_) => Err("`rows` must be an array".to_string()),
    }
}

impl Serialize for ChangeEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let include_old_rows = self.change_type == ChangeType::Update && !self.old_rows.is_empty();
        let len = if include_old_rows { 6 } else { 5 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("type", self.change_type.as_str())?;
        map.serialize_entry("database", &self.database)?;
        map.serialize_entry("table", &self.table)?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("rows", &self.rows)?;
        if include_old_rows {
            map.serialize_entry("old_rows", &self.old_rows)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_value::ColumnValue;

    fn sample_row() -> Row {
        let mut row = Row::new();
        row.insert("id", ColumnValue::Int(42));
        row.insert("code", ColumnValue::Text("hi".into()));
        row.insert("blob_col", ColumnValue::Bytes(vec![0x00, 0x01, 0xFF]));
        row
    }

    #[test]
    fn insert_event_serializes_without_old_rows() {
        let event = ChangeEvent::insert("shop", "orders", 1700000000, vec![sample_row()]);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "INSERT");
        assert_eq!(json["database"], "shop");
        assert_eq!(json["table"], "orders");
        assert!(json.get("old_rows").is_none());
        assert_eq!(json["rows"][0]["id"], 42);
        assert_eq!(json["rows"][0]["code"], "hi");
        assert_eq!(json["rows"][0]["blob_col"], "AAH/");
    }

    #[test]
    fn update_event_carries_old_rows() {
        let event = ChangeEvent::update("shop", "users", 1, vec![sample_row()], vec![sample_row()]);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "UPDATE");
        assert!(json.get("old_rows").is_some());
    }

    #[test]
    fn delete_event_has_no_old_rows_field() {
        let event = ChangeEvent::delete("shop", "orders", 1, vec![sample_row()]);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("old_rows").is_none());
    }
}

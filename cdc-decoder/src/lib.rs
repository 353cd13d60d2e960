//! The Row Decoder (spec §4.5): fuses TableMap metadata with Schema
//! Resolver output and a raw row tuple into a typed [`ChangeEvent`].

use cdc_model::{
    ChangeEvent, ColumnCatalog, ColumnValue, Error, RawColumn, RawRow, Result, Row, RowEventKind,
    RowsPayload, SchemaEntry, TableMap,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::warn;

/// Above this size a byte string is never considered for the
/// rune-heuristic fallback (spec §4.5 "safety ceiling").
const HEURISTIC_MAX_LEN: usize = 64 * 1024;

/// Turns [`RowsPayload`]s into [`ChangeEvent`]s. Owns the TableMap cache
/// (spec invariant: "TableMap caching is keyed by table_id; a table_id
/// may be reused after a schema change, so any TableMap event replaces
/// the prior entry"); the Schema cache lives behind the [`ColumnCatalog`]
/// implementation the caller supplies.
pub struct RowDecoder {
    table_maps: HashMap<u64, TableMap>,
    warned_mismatch: Mutex<HashSet<(String, String)>>,
    /// spec §9 open question: the byte-equals-rune heuristic is "best
    /// effort" and should be disabled by default, enabled only when a
    /// deployment has no reliable schema access.
    enable_heuristic_fallback: bool,
}

impl RowDecoder {
    pub fn new() -> Self {
        RowDecoder {
            table_maps: HashMap::new(),
            warned_mismatch: Mutex::new(HashSet::new()),
            enable_heuristic_fallback: false,
        }
    }

    pub fn with_heuristic_fallback(mut self, enabled: bool) -> Self {
        self.enable_heuristic_fallback = enabled;
        self
    }

    /// Record/replace the cache entry for a TableMap event (spec §4.1
    /// invariant: unconditional replace, never merged).
    pub fn observe_table_map(&mut self, table_map: TableMap) {
        self.table_maps.insert(table_map.table_id, table_map);
    }

    /// Decode a rows payload into a [`ChangeEvent`]. `timestamp` is the
    /// wall-clock seconds at decode time (spec §3: "integer seconds from
    /// the wall clock at decode time").
    pub async fn decode(
        &self,
        payload: &RowsPayload,
        schema: &dyn ColumnCatalog,
        timestamp: i64,
    ) -> Result<ChangeEvent> {
        let table_map = self
            .table_maps
            .get(&payload.table_id)
            .ok_or_else(|| Error::Decode(format!("table map not found for id {}", payload.table_id)))?;

        let schema_entry = schema.columns(&table_map.database, &table_map.table).await?;
        let names: Vec<String> = match &table_map.column_names {
            Some(names) => names.clone(),
            None => schema_entry.names().into_iter().map(String::from).collect(),
        };

        self.warn_on_mismatch(table_map, &payload.rows, &names);

        match payload.kind {
            RowEventKind::Write => {
                let rows = payload
                    .rows
                    .iter()
                    .map(|raw| self.decode_row(raw, &names, &schema_entry))
                    .collect();
                Ok(ChangeEvent::insert(
                    table_map.database.clone(),
                    table_map.table.clone(),
                    timestamp,
                    rows,
                ))
            }
            RowEventKind::Delete => {
                let rows = payload
                    .rows
                    .iter()
                    .map(|raw| self.decode_row(raw, &names, &schema_entry))
                    .collect();
                Ok(ChangeEvent::delete(
                    table_map.database.clone(),
                    table_map.table.clone(),
                    timestamp,
                    rows,
                ))
            }
            RowEventKind::Update => {
                let mut old_rows = Vec::with_capacity(payload.rows.len() / 2);
                let mut rows = Vec::with_capacity(payload.rows.len() / 2);
                for pair in payload.rows.chunks(2) {
                    if let [before, after] = pair {
                        old_rows.push(self.decode_row(before, &names, &schema_entry));
                        rows.push(self.decode_row(after, &names, &schema_entry));
                    }
                }
                Ok(ChangeEvent::update(
                    table_map.database.clone(),
                    table_map.table.clone(),
                    timestamp,
                    old_rows,
                    rows,
                ))
            }
        }
    }

    fn warn_on_mismatch(&self, table_map: &TableMap, rows: &[RawRow], names: &[String]) {
        let widest = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        if widest > names.len() {
            let key = (table_map.database.clone(), table_map.table.clone());
            let mut warned = self.warned_mismatch.lock().unwrap();
            if warned.insert(key) {
                warn!(
                    database = table_map.database.as_str(),
                    table = table_map.table.as_str(),
                    columns = names.len(),
                    tuple_width = widest,
                    "row tuple wider than resolved column list; extra columns dropped"
                );
            }
        }
    }

    /// spec §4.5 value coercion, zipped with the column name list up to
    /// the shorter of the two lengths.
    fn decode_row(&self, raw: &RawRow, names: &[String], schema_entry: &SchemaEntry) -> Row {
        let width = raw.len().min(names.len());
        let mut row = Row::with_capacity(width);
        for idx in 0..width {
            let type_text = schema_entry.type_of(idx);
            let value = self.coerce(&raw[idx], type_text);
            row.insert(names[idx].clone(), value);
        }
        row
    }

    fn coerce(&self, raw: &RawColumn, type_text: Option<&str>) -> ColumnValue {
        match raw {
            RawColumn::Null => ColumnValue::Null,
            RawColumn::Int(i) => ColumnValue::Int(*i),
            RawColumn::UInt(u) => ColumnValue::UInt(*u),
            RawColumn::Float(f) => ColumnValue::Float(*f),
            RawColumn::Bytes(bytes) => {
                let is_textual = type_text.map(SchemaEntry::is_textual).unwrap_or(false);
                if is_textual {
                    return ColumnValue::Text(String::from_utf8_lossy(bytes).into_owned());
                }
                if type_text.is_none() && self.enable_heuristic_fallback && self.looks_textual(bytes) {
                    if let Ok(text) = std::str::from_utf8(bytes) {
                        return ColumnValue::Text(text.to_string());
                    }
                }
                ColumnValue::Bytes(bytes.clone())
            }
        }
    }

    /// spec §4.5 heuristic fallback: "byte-count equals its rune-count
    /// under UTF-8 interpretation" (i.e. every byte is a single-byte
    /// UTF-8 scalar) and below the safety ceiling.
    fn looks_textual(&self, bytes: &[u8]) -> bool {
        if bytes.len() > HEURISTIC_MAX_LEN {
            return false;
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => text.chars().count() == bytes.len(),
            Err(_) => false,
        }
    }
}

impl Default for RowDecoder {
    fn default() -> Self {
        Self::new()
    }
}

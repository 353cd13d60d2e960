use crate::column_value::ColumnValue;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One row snapshot: an ordered mapping from column name to typed value.
///
/// Column order is preserved (it is whatever order the Decoder emitted
/// values in) and round-trips through JSON faithfully, but two rows with the
/// same fields in different orders are still considered equal row content —
/// spec §8 only requires byte-identity "modulo map ordering".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<(String, ColumnValue)>);

impl Row {
    pub fn new() -> Self {
        Row(Vec::new())
    }

    pub fn with_capacity(cap: usize) -> Self {
        Row(Vec::with_capacity(cap))
    }

    /// Insert or overwrite a field, preserving first-seen position on
    /// overwrite (matches the teacher's "static fields added before input
    /// fields, so a same-named input field overwrites the static default"
    /// rule from the Transformer spec).
    pub fn insert(&mut self, key: impl Into<String>, value: ColumnValue) {
        let key = key.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&ColumnValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_ci(&self, key: &str) -> Option<&ColumnValue> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn contains_key_ci(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, ColumnValue)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, ColumnValue)>>(iter: T) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct RowVisitor;

impl<'de> Visitor<'de> for RowVisitor {
    type Value = Row;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object mapping column name to value")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut row = Row::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((k, v)) = map.next_entry::<String, ColumnValue>()? {
            row.insert(k, v);
        }
        Ok(row)
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RowVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_overwrites_in_place() {
        let mut row = Row::new();
        row.insert("id", ColumnValue::Int(1));
        row.insert("name", ColumnValue::Text("a".into()));
        row.insert("id", ColumnValue::Int(2));
        let keys: Vec<_> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["id", "name"]);
        assert_eq!(row.get("id"), Some(&ColumnValue::Int(2)));
    }

    #[test]
    fn case_insensitive_lookup() {
        let mut row = Row::new();
        row.insert("Email", ColumnValue::Text("a@b".into()));
        assert!(row.get_ci("email").is_some());
        assert!(row.contains_key_ci("EMAIL"));
    }
}

use base64::Engine;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single column value after the Decoder's type coercion (spec §4.5).
///
/// This is the strongly typed replacement for the dynamic "map of any" a
/// dynamically typed host language would use: the Decoder's coercion rules
/// become constructors here, and the canonical serializer (below) is a
/// match over variants instead of a runtime type switch.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    /// Bytes the Decoder has classified as textual (schema-driven, or the
    /// best-effort heuristic of spec §4.5). Always emitted as a JSON string.
    Text(String),
    /// Raw byte sequence left uncoerced; the serializer base64-encodes it.
    Bytes(Vec<u8>),
    /// A value that was already JSON-shaped (e.g. produced by a script).
    Json(serde_json::Value),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

impl Serialize for ColumnValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ColumnValue::Null => serializer.serialize_none(),
            ColumnValue::Int(v) => serializer.serialize_i64(*v),
            ColumnValue::UInt(v) => serializer.serialize_u64(*v),
            ColumnValue::Float(v) => serializer.serialize_f64(*v),
            ColumnValue::Bool(v) => serializer.serialize_bool(*v),
            ColumnValue::Text(v) => serializer.serialize_str(v),
            ColumnValue::Bytes(v) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(v))
            }
            ColumnValue::Json(v) => v.serialize(serializer),
        }
    }
}

struct ColumnValueVisitor;

impl<'de> Visitor<'de> for ColumnValueVisitor {
    type Value = ColumnValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON scalar, array or object")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(ColumnValue::Null)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(ColumnValue::Null)
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(ColumnValue::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(ColumnValue::Int(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(ColumnValue::UInt(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(ColumnValue::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(ColumnValue::Text(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(ColumnValue::Text(v))
    }

    fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        let value = serde_json::Value::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(ColumnValue::Json(value))
    }

    fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
    where
        A: de::SeqAccess<'de>,
    {
        let value = serde_json::Value::deserialize(de::value::SeqAccessDeserializer::new(seq))?;
        Ok(ColumnValue::Json(value))
    }
}

impl<'de> Deserialize<'de> for ColumnValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ColumnValueVisitor)
    }
}

impl From<serde_json::Value> for ColumnValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ColumnValue::Null,
            serde_json::Value::Bool(b) => ColumnValue::Bool(b),
            serde_json::Value::String(s) => ColumnValue::Text(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ColumnValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    ColumnValue::UInt(u)
                } else {
                    ColumnValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            other => ColumnValue::Json(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_serialize_as_base64() {
        let v = ColumnValue::Bytes(vec![0x00, 0x01, 0xFF]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"AAH/\"");
    }

    #[test]
    fn text_serializes_as_plain_string() {
        let v = ColumnValue::Text("hi".to_string());
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"hi\"");
    }

    #[test]
    fn null_roundtrips() {
        let v = ColumnValue::Null;
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "null");
    }
}

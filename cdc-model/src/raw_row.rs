/// A single binlog-tuple column value, before schema-driven coercion
/// (spec §4.5). This is the boundary type between the Binlog Source
/// (which only knows wire-level kinds) and the Row Decoder (which knows
/// about TEXT/BLOB classification); it deliberately drops straight to
/// the handful of kinds the coercion rules actually distinguish.
#[derive(Debug, Clone, PartialEq)]
pub enum RawColumn {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
}

/// One row tuple as delivered in a binlog rows event, positional with the
/// resolved column list.
pub type RawRow = Vec<RawColumn>;

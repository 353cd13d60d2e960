use cdc_model::{BinlogEvent, Error, RawColumn, RawRow, RowEventKind, RowsPayload, TableMap};
use mysql_async::binlog::events::{Event, EventData, OptionalMetadataField, RowsEventData};
use mysql_async::binlog::value::BinlogValue;
use mysql_async::binlog::row::BinlogRow;

/// Turn one wire-level event into a [`BinlogEvent`] plus the `log_pos`
/// recorded in its header (spec §4.4 step 2: "if the event carries a
/// positive log_pos, set the Position").
pub fn decode(event: &Event) -> cdc_model::Result<(BinlogEvent, Option<u64>)> {
    let log_pos = event.header().log_pos();
    let log_pos = if log_pos > 0 { Some(log_pos as u64) } else { None };

    let data = event
        .read_data()
        .map_err(|e| Error::Decode(format!("malformed binlog event: {e}")))?;

    let decoded = match data {
        None => BinlogEvent::Other,
        Some(EventData::TableMapEvent(tme)) => {
            let mut table_map = TableMap::new(
                tme.table_id(),
                tme.database_name().into_owned(),
                tme.table_name().into_owned(),
                tme.columns_count() as usize,
            );
            if let Some(names) = table_map_column_names(&tme) {
                table_map = table_map.with_column_names(names);
            }
            BinlogEvent::TableMap(table_map)
        }
        Some(EventData::RotateEvent(re)) => BinlogEvent::Rotate {
            next_file: re.name().into_owned(),
            position: re.position(),
        },
        Some(EventData::QueryEvent(qe)) => BinlogEvent::Query {
            database: qe.schema().into_owned(),
            sql: qe.query().into_owned(),
        },
        Some(EventData::XidEvent(_)) => BinlogEvent::Xid,
        Some(EventData::HeartbeatEvent) => BinlogEvent::Heartbeat,
        Some(EventData::RowsEvent(rows_data)) => decode_rows(rows_data)?,
        Some(_) => BinlogEvent::Other,
    };

    Ok((decoded, log_pos))
}

/// Column names from the TABLE_MAP_EVENT's optional metadata block, when the
/// source has `binlog_row_metadata = FULL` (spec §4.5 resolution order:
/// embedded names take priority over the Schema Cache). `None` under
/// `MINIMAL` metadata, where the block carries no `ColumnName` field.
fn table_map_column_names(
    tme: &mysql_async::binlog::events::TableMapEvent<'_>,
) -> Option<Vec<String>> {
    for field in tme.iter_optional_meta() {
        if let Ok(OptionalMetadataField::ColumnName(names)) = field {
            return Some(names.into_iter().map(|n| n.into_owned()).collect());
        }
    }
    None
}

fn decode_rows(rows_data: RowsEventData<'_>) -> cdc_model::Result<BinlogEvent> {
    let (table_id, kind, rows) = match rows_data {
        RowsEventData::WriteRowsEvent(ev) => {
            (ev.table_id(), RowEventKind::Write, collect_rows(ev.rows())?)
        }
        RowsEventData::DeleteRowsEvent(ev) => {
            (ev.table_id(), RowEventKind::Delete, collect_rows(ev.rows())?)
        }
        RowsEventData::UpdateRowsEvent(ev) => {
            let mut rows = Vec::new();
            for pair in ev.rows() {
                let (before, after) = pair
                    .map_err(|e| Error::Decode(format!("malformed update-rows tuple: {e}")))?;
                rows.push(convert_row(before)?);
                rows.push(convert_row(after)?);
            }
            (ev.table_id(), RowEventKind::Update, rows)
        }
        _ => return Ok(BinlogEvent::Other),
    };

    Ok(BinlogEvent::Rows(RowsPayload {
        table_id,
        kind,
        rows,
    }))
}

fn collect_rows<'a, I>(iter: I) -> cdc_model::Result<Vec<RawRow>>
where
    I: Iterator<Item = std::io::Result<BinlogRow>>,
{
    let mut out = Vec::new();
    for row in iter {
        let row = row.map_err(|e| Error::Decode(format!("malformed row tuple: {e}")))?;
        out.push(convert_row(row)?);
    }
    Ok(out)
}

fn convert_row(row: BinlogRow) -> cdc_model::Result<RawRow> {
    let width = row.len();
    let mut out = Vec::with_capacity(width);
    for idx in 0..width {
        let value = row
            .as_ref(idx)
            .map(|v| convert_value(v.clone()))
            .unwrap_or(RawColumn::Null);
        out.push(value);
    }
    Ok(out)
}

fn convert_value(value: BinlogValue<'_>) -> RawColumn {
    match value {
        BinlogValue::Value(mysql_common::Value::NULL) => RawColumn::Null,
        BinlogValue::Value(mysql_common::Value::Bytes(b)) => RawColumn::Bytes(b),
        BinlogValue::Value(mysql_common::Value::Int(i)) => RawColumn::Int(i),
        BinlogValue::Value(mysql_common::Value::UInt(u)) => RawColumn::UInt(u),
        BinlogValue::Value(mysql_common::Value::Float(f)) => RawColumn::Float(f as f64),
        BinlogValue::Value(mysql_common::Value::Double(d)) => RawColumn::Float(d),
        BinlogValue::Value(mysql_common::Value::Date(year, month, day, hour, minute, second, micros)) => {
            RawColumn::Bytes(format_date(year, month, day, hour, minute, second, micros).into_bytes())
        }
        BinlogValue::Value(mysql_common::Value::Time(is_negative, days, hours, minutes, seconds, micros)) => {
            RawColumn::Bytes(
                format_time(is_negative, days, hours, minutes, seconds, micros).into_bytes(),
            )
        }
        BinlogValue::Value(other) => RawColumn::Bytes(format!("{other:?}").into_bytes()),
        BinlogValue::Jsonb(raw) => RawColumn::Bytes(raw.as_ref().to_vec()),
        BinlogValue::JsonDiff(diff) => RawColumn::Bytes(format!("{diff:?}").into_bytes()),
    }
}

/// `YYYY-MM-DD HH:MM:SS[.ffffff]`, the natural text form of a DATE/DATETIME/
/// TIMESTAMP value, in place of `Value`'s derived `Debug` output.
fn format_date(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8, micros: u32) -> String {
    if micros > 0 {
        format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}")
    } else {
        format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")
    }
}

/// `[-]HH:MM:SS[.ffffff]`, the natural text form of a TIME value. MySQL's
/// TIME range spans multiple days, so `days` folds into the hour component.
fn format_time(is_negative: bool, days: u32, hours: u8, minutes: u8, seconds: u8, micros: u32) -> String {
    let sign = if is_negative { "-" } else { "" };
    let total_hours = days as u64 * 24 + hours as u64;
    if micros > 0 {
        format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
    } else {
        format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_without_micros_has_no_fraction() {
        assert_eq!(format_date(2024, 3, 7, 9, 30, 1, 0), "2024-03-07 09:30:01");
    }

    #[test]
    fn date_with_micros_keeps_six_digit_fraction() {
        assert_eq!(
            format_date(2024, 3, 7, 9, 30, 1, 5),
            "2024-03-07 09:30:01.000005"
        );
    }

    #[test]
    fn negative_time_keeps_sign_and_folds_days_into_hours() {
        assert_eq!(format_time(true, 1, 2, 0, 0, 0), "-26:00:00");
    }

    #[test]
    fn positive_time_without_days() {
        assert_eq!(format_time(false, 0, 12, 5, 30, 0), "12:05:30");
    }
}

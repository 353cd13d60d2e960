use cdc_model::{Error, Result};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Row as MyRow};
use tracing::warn;

/// spec §6 "Pre-flight check against the source": run before opening the
/// replication session. Grants and `log_bin` failures are fatal; a
/// non-ROW `binlog_format` only warns.
pub async fn run_preflight(conn: &mut Conn, user: &str) -> Result<()> {
    check_grants(conn, user).await?;
    check_log_bin(conn).await?;
    check_binlog_format(conn).await?;
    Ok(())
}

async fn check_grants(conn: &mut Conn, user: &str) -> Result<()> {
    let rows: Vec<MyRow> = conn
        .query(format!("SHOW GRANTS FOR {user}"))
        .await
        .map_err(|e| Error::Preflight(format!("cannot read grants for {user}: {e}")))?;

    let combined: String = rows
        .into_iter()
        .filter_map(|row| row.get::<String, usize>(0))
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();

    let has_all = combined.contains("ALL PRIVILEGES");
    let required = ["REPLICATION SLAVE", "REPLICATION CLIENT", "SELECT"];
    let missing: Vec<&str> = required
        .iter()
        .filter(|grant| !has_all && !combined.contains(*grant))
        .copied()
        .collect();

    if !missing.is_empty() {
        return Err(Error::Preflight(format!(
            "source user {user} is missing required grants: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

async fn check_log_bin(conn: &mut Conn) -> Result<()> {
    let value = server_variable(conn, "log_bin").await?;
    let enabled = matches!(value.as_deref(), Some("ON") | Some("1"));
    if !enabled {
        return Err(Error::Preflight(
            "binary logging is disabled on the source server (log_bin is off)".into(),
        ));
    }
    Ok(())
}

async fn check_binlog_format(conn: &mut Conn) -> Result<()> {
    let value = server_variable(conn, "binlog_format").await?;
    if !matches!(value.as_deref(), Some("ROW")) {
        warn!(
            binlog_format = value.as_deref().unwrap_or("unknown"),
            "binlog_format is not ROW; row events may be incomplete"
        );
    }
    Ok(())
}

async fn server_variable(conn: &mut Conn, name: &str) -> Result<Option<String>> {
    let row: Option<(String, String)> = conn
        .query_first(format!("SHOW VARIABLES LIKE '{name}'"))
        .await
        .map_err(|e| Error::Preflight(format!("cannot read server variable {name}: {e}")))?;
    Ok(row.map(|(_, value)| value.to_uppercase()))
}

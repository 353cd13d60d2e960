//! The Binlog Source (spec §4.4): owns the replication session against a
//! MySQL/MariaDB server, turns raw wire events into [`BinlogEvent`]s, and
//! drives the [`PositionStore`] so the cursor always reflects the last
//! event handed to the caller.

mod preflight;
mod raw_event;

pub use preflight::run_preflight;

use async_trait::async_trait;
use cdc_model::{BinlogEvent, BinlogEventSource, Error, Position, Result};
use cdc_position::PositionStore;
use mysql_async::{BinlogRequest, BinlogStream, Conn, Opts, OptsBuilder};
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// spec §4.4: "A bounded read timeout (~10s) is applied per next()".
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared by [`BinlogSource`] and the Pipeline (which needs the same
/// answer before a TableMap is even cached) — an empty `include` list
/// means "every table"; an empty `exclude` list means "exclude nothing".
pub fn is_monitored(include: &[String], exclude: &[String], database: &str, table: &str) -> bool {
    let full = format!("{database}.{table}");
    let matches = |pattern: &str| pattern.eq_ignore_ascii_case(&full) || pattern == "*";
    if !include.is_empty() && !include.iter().any(|p| matches(p)) {
        return false;
    }
    if exclude.iter().any(|p| matches(p)) {
        return false;
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Mysql,
    Mariadb,
}

pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub server_id: u32,
    pub flavor: Flavor,
}

impl ConnectionParams {
    pub fn to_opts(&self) -> Opts {
        OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port)
            .user(Some(self.user.clone()))
            .pass(Some(self.password.clone()))
            .into()
    }
}

/// `next()` (spec §4.4 contract). Single-threaded access assumed; callers
/// must not call `next()` concurrently with itself.
pub struct BinlogSource {
    stream: BinlogStream,
    position_store: PositionStore,
    current_file: String,
    include_tables: Vec<String>,
    exclude_tables: Vec<String>,
}

impl BinlogSource {
    /// Opens a replication session starting at `initial_position`. An
    /// empty file name defers to the server's own "start from current"
    /// behavior (spec §4.4).
    pub async fn connect(
        params: &ConnectionParams,
        initial_position: &Position,
        position_store: PositionStore,
        include_tables: Vec<String>,
        exclude_tables: Vec<String>,
    ) -> Result<Self> {
        let conn = Conn::new(params.to_opts())
            .await
            .map_err(|e| Error::Preflight(format!("cannot connect to source: {e}")))?;

        let mut request = BinlogRequest::new(params.server_id);
        if !initial_position.is_empty() {
            request = request
                .with_filename(initial_position.file_name.as_bytes())
                .with_pos(initial_position.byte_offset);
        }

        let stream = conn
            .get_binlog_stream(request)
            .await
            .map_err(|e| Error::Preflight(format!("cannot open replication session: {e}")))?;

        info!(
            file = initial_position.file_name.as_str(),
            offset = initial_position.byte_offset,
            "binlog replication session opened"
        );

        Ok(BinlogSource {
            stream,
            position_store,
            current_file: initial_position.file_name.clone(),
            include_tables,
            exclude_tables,
        })
    }

    /// spec §4.8 table filtering addition: an empty include list means
    /// "every table"; an empty exclude list means "exclude nothing".
    pub fn table_is_monitored(&self, database: &str, table: &str) -> bool {
        is_monitored(&self.include_tables, &self.exclude_tables, database, table)
    }

    fn persist(&self, position: Position) {
        if let Err(e) = self.position_store.save(&position) {
            warn!(error = %e, "failed to persist position, continuing");
        }
    }
}

#[async_trait]
impl BinlogEventSource for BinlogSource {
    /// Pull the next event. Timeouts surface as [`Error::Source`] with
    /// `timeout: true`, which the Pipeline treats as "no event yet; retry"
    /// rather than a fault (spec §4.4).
    async fn next(&mut self) -> Result<BinlogEvent> {
        let next = tokio::time::timeout(READ_TIMEOUT, self.stream.next()).await;
        let item = match next {
            Err(_) => {
                return Err(Error::Source {
                    message: "read timeout waiting for next binlog event".into(),
                    timeout: true,
                })
            }
            Ok(None) => {
                return Err(Error::Source {
                    message: "replication stream closed by server".into(),
                    timeout: false,
                })
            }
            Ok(Some(item)) => item,
        };

        let raw = item.map_err(|e| Error::Source {
            message: format!("replication stream error: {e}"),
            timeout: false,
        })?;

        let (event, log_pos) = raw_event::decode(&raw)?;

        match &event {
            BinlogEvent::Rotate { next_file, position } => {
                self.current_file = next_file.clone();
                self.persist(Position::new(next_file.clone(), *position));
            }
            _ => {
                if let Some(log_pos) = log_pos {
                    if log_pos > 0 {
                        self.persist(Position::new(self.current_file.clone(), log_pos));
                    }
                }
            }
        }

        Ok(event)
    }
}

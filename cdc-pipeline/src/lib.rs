//! The Pipeline (spec §4.8): drives Source -> Decoder -> Transformer ->
//! Sink, classifies errors per spec §7, and owns process-wide
//! cancellation (spec §5).

#[cfg(test)]
mod tests;

use cdc_model::{
    BinlogEvent, BinlogEventSource, ChangeEvent, ColumnCatalog, Error, EventSink, RowsPayload,
};
use cdc_decoder::RowDecoder;
use cdc_transform::Transformer;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// spec §4.8: "the loop sleeps for a short fixed backoff (~1s) to avoid
/// tight spin on persistent fault".
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct Pipeline {
    source: Box<dyn BinlogEventSource>,
    decoder: RowDecoder,
    schema: Arc<dyn ColumnCatalog>,
    transformer: Transformer,
    sink: Arc<dyn EventSink>,
    shutdown: Arc<AtomicBool>,
    include_tables: Vec<String>,
    exclude_tables: Vec<String>,
    skipped_table_ids: HashSet<u64>,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn BinlogEventSource>,
        schema: Arc<dyn ColumnCatalog>,
        transformer: Transformer,
        sink: Arc<dyn EventSink>,
        shutdown: Arc<AtomicBool>,
        include_tables: Vec<String>,
        exclude_tables: Vec<String>,
    ) -> Self {
        Pipeline {
            source,
            decoder: RowDecoder::new(),
            schema,
            transformer,
            sink,
            shutdown,
            include_tables,
            exclude_tables,
            skipped_table_ids: HashSet::new(),
        }
    }

    /// The main loop (spec §4.8/§5). Runs until the shutdown flag is set
    /// or the Source reports a fatal error; everything else is
    /// classified per spec §7 and swallowed.
    pub async fn run(&mut self) {
        info!("pipeline starting");
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.source.next().await {
                Ok(event) => {
                    if let Err(e) = self.dispatch(event).await {
                        self.log_non_fatal(&e);
                    }
                }
                Err(e) if e.is_source_timeout() => {
                    debug!("no event within read timeout, retrying");
                }
                Err(e) => {
                    error!(error = %e, "source error, backing off before retry");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
        info!("pipeline shutting down");
    }

    /// spec §4.8 dispatch table.
    async fn dispatch(&mut self, event: BinlogEvent) -> cdc_model::Result<()> {
        match event {
            BinlogEvent::TableMap(table_map) => {
                if cdc_source::is_monitored(
                    &self.include_tables,
                    &self.exclude_tables,
                    &table_map.database,
                    &table_map.table,
                ) {
                    self.skipped_table_ids.remove(&table_map.table_id);
                    self.decoder.observe_table_map(table_map);
                } else {
                    self.skipped_table_ids.insert(table_map.table_id);
                }
                Ok(())
            }
            BinlogEvent::Rows(payload) => self.handle_rows(payload).await,
            BinlogEvent::Rotate { next_file, position } => {
                info!(next_file, position, "binlog rotated");
                Ok(())
            }
            BinlogEvent::Query { database, sql } => {
                debug!(database, sql, "query event");
                Ok(())
            }
            BinlogEvent::Xid => {
                debug!("xid event");
                Ok(())
            }
            BinlogEvent::Heartbeat => {
                debug!("heartbeat event");
                Ok(())
            }
            BinlogEvent::Other => Ok(()),
        }
    }

    async fn handle_rows(&mut self, payload: RowsPayload) -> cdc_model::Result<()> {
        if self.skipped_table_ids.contains(&payload.table_id) {
            return Ok(());
        }

        let timestamp = chrono::Utc::now().timestamp();
        let event = self
            .decoder
            .decode(&payload, self.schema.as_ref(), timestamp)
            .await?;

        let transformed = self.transformer.transform(event).await?;

        let event = match transformed {
            Some(event) => event,
            None => return Ok(()),
        };

        self.publish(event).await
    }

    async fn publish(&self, event: ChangeEvent) -> cdc_model::Result<()> {
        self.sink.publish_event(&event).await
    }

    /// spec §7: only Configuration/Preflight errors are fatal; everything
    /// dispatched through the loop is logged and the loop continues.
    fn log_non_fatal(&self, error: &Error) {
        match error {
            Error::Decode(_) => warn!(error = %error, "decode error, event dropped"),
            Error::Transform(_) => warn!(error = %error, "transform error, event dropped"),
            Error::Sink(_) => warn!(error = %error, "sink error, event lost"),
            Error::Position(_) => warn!(error = %error, "position persistence error"),
            other => error!(error = %other, "unexpected error in pipeline loop"),
        }
    }
}

//! The Sink (spec §4.7): publishes accepted `ChangeEvent`s on a subject
//! and exposes the `nats.*` publish/KV facility the Transformer's script
//! mode binds into its runtime.

use async_nats::jetstream;
use async_trait::async_trait;
use cdc_model::{ChangeEvent, Error, EventSink, Result};
use tracing::{info, warn};

pub struct NatsSinkConfig {
    pub url: String,
    pub subject: String,
    pub max_reconnect: i32,
    pub reconnect_wait: std::time::Duration,
}

/// A bus-backed [`EventSink`]. Connection options map to spec §6
/// `sink: {url, subject, max_reconnect, reconnect_wait_duration}`; the
/// disconnect/reconnect/closed observers log at warn/info/warn per
/// spec §4.7.
pub struct NatsSink {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    subject: String,
}

impl NatsSink {
    pub async fn connect(config: NatsSinkConfig) -> Result<Self> {
        let client = async_nats::ConnectOptions::new()
            .max_reconnects(Some(config.max_reconnect as usize))
            .reconnect_delay_callback(move |_attempts| config.reconnect_wait)
            .event_callback(|event| async move {
                match event {
                    async_nats::Event::Disconnected => {
                        warn!("nats connection disconnected");
                    }
                    async_nats::Event::Connected => {
                        info!("nats connection (re)established");
                    }
                    async_nats::Event::ClientError(e) => {
                        warn!(error = %e, "nats client error");
                    }
                    async_nats::Event::Closed => {
                        warn!("nats connection permanently closed, reconnect attempts exhausted");
                    }
                    other => {
                        info!(event = ?other, "nats connection event");
                    }
                }
            })
            .connect(&config.url)
            .await
            .map_err(|e| Error::Preflight(format!("cannot connect to sink at {}: {e}", config.url)))?;

        let jetstream = jetstream::new(client.clone());

        Ok(NatsSink {
            client,
            jetstream,
            subject: config.subject,
        })
    }

    async fn kv_store(&self, bucket: &str) -> Result<jetstream::kv::Store> {
        self.jetstream
            .get_key_value(bucket)
            .await
            .map_err(|e| Error::Sink(format!("cannot open kv bucket {bucket}: {e}")))
    }
}

#[async_trait]
impl EventSink for NatsSink {
    async fn publish_event(&self, event: &ChangeEvent) -> Result<()> {
        let payload = match &event.raw_bytes {
            Some(tail) => tail.clone(),
            None => event
                .to_canonical_json()
                .map_err(|e| Error::Sink(format!("cannot serialize event: {e}")))?,
        };
        self.publish_raw(&self.subject.clone(), &payload).await
    }

    async fn publish_raw(&self, subject: &str, data: &[u8]) -> Result<()> {
        self.client
            .publish(subject.to_string(), data.to_vec().into())
            .await
            .map_err(|e| Error::Sink(format!("publish to {subject} failed: {e}")))
    }

    async fn kv_get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let store = self.kv_store(bucket).await?;
        store
            .get(key)
            .await
            .map(|opt| opt.map(|bytes| bytes.to_vec()))
            .map_err(|e| Error::Sink(format!("kv get {bucket}/{key} failed: {e}")))
    }

    async fn kv_put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        let store = self.kv_store(bucket).await?;
        store
            .put(key, value.to_vec().into())
            .await
            .map_err(|e| Error::Sink(format!("kv put {bucket}/{key} failed: {e}")))?;
        Ok(())
    }

    async fn kv_delete(&self, bucket: &str, key: &str) -> Result<()> {
        let store = self.kv_store(bucket).await?;
        store
            .delete(key)
            .await
            .map_err(|e| Error::Sink(format!("kv delete {bucket}/{key} failed: {e}")))
    }
}

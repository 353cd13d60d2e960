use crate::{ChangeEvent, Result};
use async_trait::async_trait;

/// The contract the Pipeline and the Transformer depend on instead of a
/// concrete bus client (spec §9 "Polymorphism over sinks"): the Pipeline
/// only needs `publish_event`/`publish_raw`; the Transformer's script
/// mode additionally needs the `kv_*` trio for its `nats.kv.*` bindings.
/// Other transports (log files, alternative buses) can implement this
/// without touching the core.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish the canonical serialization of an event, or its opaque
    /// tail verbatim when one is present (spec §4.7).
    async fn publish_event(&self, event: &ChangeEvent) -> Result<()>;

    /// Publish arbitrary bytes on an explicit subject, for `nats.publish`
    /// calls from a script (spec §4.6.3).
    async fn publish_raw(&self, subject: &str, data: &[u8]) -> Result<()>;

    async fn kv_get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;
    async fn kv_put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()>;
    async fn kv_delete(&self, bucket: &str, key: &str) -> Result<()>;
}

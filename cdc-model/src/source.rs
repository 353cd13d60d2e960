use crate::{BinlogEvent, Result};
use async_trait::async_trait;

/// `next()` (spec §4.4 contract), abstracted so the Pipeline can be
/// driven by a fake in tests without a live replication session.
/// Single-threaded access assumed: implementations do not need to be
/// `Sync`, only `Send` so the Pipeline can hold one across an await.
#[async_trait]
pub trait BinlogEventSource: Send {
    async fn next(&mut self) -> Result<BinlogEvent>;
}

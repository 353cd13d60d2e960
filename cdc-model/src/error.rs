/// Error taxonomy for the pipeline (spec §7).
///
/// Only [`Error::Config`] and [`Error::Preflight`] are fatal; every other
/// variant is logged by the recovery boundary (the Pipeline's main loop) and
/// processing continues.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or contradictory configuration, detected at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Source unreachable, insufficient grants, binlog disabled.
    #[error("preflight check failed: {0}")]
    Preflight(String),

    /// Replication session error. `timeout` distinguishes a bounded read
    /// timeout (silent retry) from a hard disconnect (log, delay, reopen).
    #[error("binlog source error: {message}")]
    Source { message: String, timeout: bool },

    /// TableMap missing, schema lookup failure, column-count mismatch.
    #[error("decode error: {0}")]
    Decode(String),

    /// Script exception or rule marshalling failure.
    #[error("transform error: {0}")]
    Transform(String),

    /// Publish failure on the bus.
    #[error("sink error: {0}")]
    Sink(String),

    /// Position file read/write failure.
    #[error("position store error: {0}")]
    Position(String),
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Preflight(_))
    }

    pub fn is_source_timeout(&self) -> bool {
        matches!(self, Error::Source { timeout: true, .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Position(e.to_string())
    }
}

/// Convenience alias matching the `ReError`-style result type the teacher
/// codebase uses throughout, generalized to the new error enum.
pub type Result<T> = std::result::Result<T, Error>;

//! The configuration and logging ambient stack (spec §6, SPEC_FULL §3.1-3.2).
//!
//! `spec.md` treats these as delivered by an external loader; this crate is
//! that loader, built the way the teacher's `common::config` +
//! `common::log::tracing_factory` build theirs.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, Flavor, LoggingConfig, PositionConfig, SinkConfig, SourceConfig, TransformerConfig,
};
pub use logging::init_logging;

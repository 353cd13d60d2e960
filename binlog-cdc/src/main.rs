//! Entry point for the `binlog-cdc` pipeline (spec §6): loads
//! configuration, runs pre-flight checks against the source, wires
//! Source -> Decoder -> Transformer -> Sink, and drives the Pipeline
//! until a shutdown signal arrives.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mysql_async::Conn;
use tracing::{error, info};

use cdc_config::{AppConfig, Flavor as ConfigFlavor};
use cdc_model::{ColumnCatalog, Error, EventSink, Position, Result, TransformRule};
use cdc_pipeline::Pipeline;
use cdc_position::PositionStore;
use cdc_schema::SchemaResolver;
use cdc_sink::{NatsSink, NatsSinkConfig};
use cdc_source::{BinlogSource, ConnectionParams, Flavor as SourceFlavor};
use cdc_transform::Transformer;

#[derive(Parser, Debug)]
#[command(name = "binlog-cdc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "rust-us")]
#[command(about = "MySQL binlog CDC pipeline: replicate, decode, transform and publish row changes")]
struct CliArgs {
    /// Path to the pipeline's YAML configuration file.
    #[arg(default_value = "config.yaml", value_name = "FILE")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    cdc_config::init_logging(&config.logging);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pipeline exited with a fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let connection_params = ConnectionParams {
        host: config.source.host.clone(),
        port: config.source.port,
        user: config.source.user.clone(),
        password: config.source.password.clone(),
        server_id: config.source.server_id,
        flavor: match config.source.flavor {
            ConfigFlavor::Mysql => SourceFlavor::Mysql,
            ConfigFlavor::Mariadb => SourceFlavor::Mariadb,
        },
    };

    let mut preflight_conn = Conn::new(connection_params.to_opts())
        .await
        .map_err(|e| Error::Preflight(format!("cannot connect for preflight: {e}")))?;
    cdc_source::run_preflight(&mut preflight_conn, &config.source.user).await?;

    let schema: Arc<dyn ColumnCatalog> = Arc::new(SchemaResolver::new(preflight_conn));

    let position_store = PositionStore::new(config.position.file_path.clone());
    let initial_position = position_store
        .load(config.position.start_offset)?
        .unwrap_or_else(Position::empty);

    let source = BinlogSource::connect(
        &connection_params,
        &initial_position,
        position_store,
        config.source.include_tables.clone(),
        config.source.exclude_tables.clone(),
    )
    .await?;

    let sink: Arc<dyn EventSink> = Arc::new(
        NatsSink::connect(NatsSinkConfig {
            url: config.sink.url.clone(),
            subject: config.sink.subject.clone(),
            max_reconnect: config.sink.max_reconnect,
            reconnect_wait: Duration::from_secs(config.sink.reconnect_wait_secs),
        })
        .await?,
    );

    let transformer = build_transformer(&config, sink.clone()).await?;

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_signal_handler(shutdown.clone());

    let mut pipeline = Pipeline::new(
        Box::new(source),
        schema,
        transformer,
        sink,
        shutdown,
        config.source.include_tables,
        config.source.exclude_tables,
    );

    info!("binlog-cdc pipeline ready");
    pipeline.run().await;
    Ok(())
}

async fn build_transformer(config: &AppConfig, sink: Arc<dyn EventSink>) -> Result<Transformer> {
    if !config.transformer.enabled {
        return Ok(Transformer::disabled());
    }
    if let Some(rules) = &config.transformer.rules {
        let rules: Vec<TransformRule> = rules.clone();
        return Transformer::rule_based(rules);
    }
    if let Some(script_path) = &config.transformer.script {
        let source_text = std::fs::read_to_string(script_path).map_err(|e| {
            Error::Config(format!("cannot read transform script {script_path:?}: {e}"))
        })?;
        return Transformer::scripted(source_text, Some(sink)).await;
    }
    Ok(Transformer::disabled())
}

/// Mirrors the teacher's `ShutdownHandle` (`common::server`): the first
/// SIGINT/SIGTERM sets the shared flag so the pipeline loop exits on its
/// next iteration; a second signal escalates to an immediate process exit.
fn spawn_signal_handler(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received, draining pipeline");
        shutdown.store(true, Ordering::SeqCst);

        wait_for_shutdown_signal().await;
        error!("second shutdown signal received, exiting immediately");
        std::process::exit(1);
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

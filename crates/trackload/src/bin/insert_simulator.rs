use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use trackload::insert::config::{CliArgs, InsertConfig};
use trackload::insert::dispatcher::{self, RunOutcome};
use trackload::insert::store::SqlConnector;
use trackload::signal::{EXIT_INTERRUPTED, shutdown_signal};
use trackload::telemetry::{self, init_telemetry};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = InsertConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let connector = SqlConnector::new(&config.database_url, &config.table, &config.session_table);
    let sink = telemetry::metrics_sink(config.metrics_profile.as_deref());
    let outcome = dispatcher::run(&config, connector, sink, cancel).await;
    providers.shutdown();

    match outcome? {
        RunOutcome::Completed(summary) => {
            let last = summary
                .range
                .last()
                .map_or_else(|| String::from("-"), |id| id.to_string());
            if summary.has_failures() {
                tracing::warn!(
                    "Run finished with failures: ids {}..={last}, {} written, {} failed, \
                     {}/{} workers drained",
                    summary.range.first(),
                    summary.written,
                    summary.failed,
                    summary.workers_exited - summary.worker_failures,
                    summary.workers_exited,
                );
            } else {
                tracing::info!(
                    "Run finished: ids {}..={last}, {} written, {} acknowledged, {} workers",
                    summary.range.first(),
                    summary.written,
                    summary.acknowledged,
                    summary.workers_exited,
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Interrupted => {
            tracing::info!("Run interrupted");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

fn log_startup_info(config: &InsertConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting insert simulator with full config: {config:#?}");
    } else {
        tracing::info!(
            "Starting insert simulator: {} inserts into {} with {} workers",
            config.num_inserts,
            config.table,
            config.num_workers
        );
    }
}

use clap::Parser;
use std::process::ExitCode;
use tokio::task::JoinSet;
use trackload::client::catalog;
use trackload::client::config::{CliArgs, ClientConfig};
use trackload::client::simulator::{ClientContext, HeartbeatClient};
use trackload::signal::{EXIT_INTERRUPTED, shutdown_signal};
use trackload::telemetry::{self, init_telemetry};
use trackload_core::SyntheticData;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::try_from(args)?;

    let providers = init_telemetry()?;
    tracing::info!("Starting client simulator against {}", config.mh_host);

    let result = run(&config).await;
    providers.shutdown();
    result
}

async fn run(config: &ClientConfig) -> anyhow::Result<ExitCode> {
    let search_url = config.search_url()?;
    let http = reqwest::Client::new();
    let catalog = tokio::select! {
        () = shutdown_signal() => return Ok(ExitCode::from(EXIT_INTERRUPTED)),
        catalog = catalog::fetch(
            &http,
            search_url,
            config.credentials.as_ref(),
            config.catalog_size,
        ) => catalog?,
    };

    let ctx = ClientContext {
        endpoint: config.usertracking_url()?,
        throttle: config.throttle,
        reqs_per_session: config.reqs_per_session,
        sink: telemetry::metrics_sink(config.metrics_profile.as_deref()),
    };

    tracing::info!("Starting {} clients", config.num_clients);
    let mut picker = SyntheticData::from_os_rng();
    let mut clients = JoinSet::new();
    for client_id in 0..config.num_clients {
        let episode = catalog.choose(picker.rng());
        let client = HeartbeatClient::new(
            client_id,
            ctx.clone(),
            episode,
            SyntheticData::from_os_rng(),
        )?;
        clients.spawn(client.run());
    }

    let signal = shutdown_signal();
    tokio::pin!(signal);
    loop {
        tokio::select! {
            () = &mut signal => break,
            Some(joined) = clients.join_next() => {
                if let Err(e) = joined {
                    tracing::error!("Heartbeat client ended unexpectedly: {e}");
                }
            }
        }
    }

    tracing::info!("Terminating {} clients", clients.len());
    clients.shutdown().await;
    Ok(ExitCode::from(EXIT_INTERRUPTED))
}

use anyhow::{Context, bail};
use clap::Parser;
use reqwest::Url;
use trackload_core::Throttle;

/// Runtime configuration for the `client-simulator` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "client-simulator",
    version,
    about = "Replay playback heartbeats against a Matterhorn engage node"
)]
pub struct CliArgs {
    /// Base URL of the Matterhorn engage node, e.g. `https://engage.example.edu`.
    ///
    /// Environment variable: `MH_HOST`
    #[arg(long, env = "MH_HOST")]
    pub mh_host: Option<String>,

    /// User for the engage search API.
    ///
    /// Environment variable: `MH_USER`
    #[arg(long, env = "MH_USER")]
    pub mh_user: Option<String>,

    /// Password of `--mh-user`.
    ///
    /// Environment variable: `MH_PASS`
    #[arg(long, env = "MH_PASS", hide_env_values = true)]
    pub mh_pass: Option<String>,

    /// Number of concurrent heartbeat clients.
    ///
    /// Environment variable: `NUM_CLIENTS`
    #[arg(long, env = "NUM_CLIENTS", default_value_t = 10)]
    pub num_clients: usize,

    /// Upper bound, in seconds, of the random pause between two heartbeats.
    ///
    /// Environment variable: `HB_INTERVAL`
    #[arg(long, env = "HB_INTERVAL", default_value_t = 30)]
    pub hb_interval: u32,

    /// Requests sent before a client drops its cookies and starts a new
    /// session.
    ///
    /// Environment variable: `REQS_PER_SESSION`
    #[arg(long, env = "REQS_PER_SESSION", default_value_t = 100)]
    pub reqs_per_session: usize,

    /// Number of most recently published episodes to choose from.
    ///
    /// Environment variable: `CATALOG_SIZE`
    #[arg(long, env = "CATALOG_SIZE", default_value_t = 100)]
    pub catalog_size: usize,

    /// Emit per-request timing samples under this metrics profile.
    ///
    /// Environment variable: `METRICS_PROFILE`
    #[arg(long, env = "METRICS_PROFILE")]
    pub metrics_profile: Option<String>,
}

/// Credentials for the search API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub mh_host: Url,
    pub credentials: Option<Credentials>,
    pub num_clients: usize,
    pub throttle: Throttle,
    pub reqs_per_session: usize,
    pub catalog_size: usize,
    pub metrics_profile: Option<String>,
}

impl ClientConfig {
    /// The heartbeat endpoint, `<mh_host>/usertracking/`.
    pub fn usertracking_url(&self) -> anyhow::Result<Url> {
        join_path(&self.mh_host, "usertracking/")
    }

    /// The episode search endpoint, `<mh_host>/search/episode.json`.
    pub fn search_url(&self) -> anyhow::Result<Url> {
        join_path(&self.mh_host, "search/episode.json")
    }
}

/// Appends `path` below `base`, keeping any path prefix `base` already has.
fn join_path(base: &Url, path: &str) -> anyhow::Result<Url> {
    let joined = format!("{}/{path}", base.as_str().trim_end_matches('/'));
    Url::parse(&joined).with_context(|| format!("invalid endpoint {joined:?}"))
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let Some(host) = args.mh_host else {
            bail!("missing host option");
        };
        let mh_host =
            Url::parse(&host).with_context(|| format!("invalid MH_HOST {host:?}"))?;

        if args.num_clients == 0 {
            bail!("NUM_CLIENTS must be greater than 0");
        }
        if args.reqs_per_session == 0 {
            bail!("REQS_PER_SESSION must be greater than 0");
        }
        if args.catalog_size == 0 {
            bail!("CATALOG_SIZE must be greater than 0");
        }

        let throttle = Throttle::from_secs(args.hb_interval)?;
        let credentials = args.mh_user.map(|user| Credentials {
            user,
            password: args.mh_pass,
        });

        Ok(Self {
            mh_host,
            credentials,
            num_clients: args.num_clients,
            throttle,
            reqs_per_session: args.reqs_per_session,
            catalog_size: args.catalog_size,
            metrics_profile: args.metrics_profile,
        })
    }
}

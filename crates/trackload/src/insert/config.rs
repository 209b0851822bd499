use anyhow::bail;
use clap::Parser;
use sqlx::ConnectOptions;
use sqlx::mysql::MySqlConnectOptions;
use trackload_core::Throttle;

/// Runtime configuration for the `insert-simulator` binary.
///
/// Every flag can also be supplied through the environment (or a `.env`
/// file). Only the target is mandatory: either `--host` or `--database-url`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "insert-simulator",
    version,
    about = "Fill the user action table from a pool of throttled workers"
)]
pub struct CliArgs {
    /// Hostname of the MySQL node to connect to.
    ///
    /// Environment variable: `DB_HOST`
    #[arg(long, env = "DB_HOST")]
    pub host: Option<String>,

    /// Port of the MySQL node. Uses the driver default when unset.
    ///
    /// Environment variable: `DB_PORT`
    #[arg(long, env = "DB_PORT")]
    pub port: Option<u16>,

    /// User to connect as.
    ///
    /// Environment variable: `DB_USER`
    #[arg(long, env = "DB_USER", default_value_t = String::from("root"))]
    pub user: String,

    /// Password of `--user`.
    ///
    /// Environment variable: `DB_PASSWORD`
    #[arg(long, env = "DB_PASSWORD", default_value_t = String::new(), hide_env_values = true)]
    pub password: String,

    /// Database holding the user tracking tables.
    ///
    /// Environment variable: `DB_NAME`
    #[arg(long, env = "DB_NAME", default_value_t = String::from("matterhorn"))]
    pub database: String,

    /// Full connection URL (`mysql://...` or `sqlite://...`).
    ///
    /// Takes precedence over host, port, user, password and database.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// The user action table to insert into.
    ///
    /// Environment variable: `ACTION_TABLE`
    #[arg(long, env = "ACTION_TABLE", default_value_t = String::from("mh_user_action"))]
    pub table: String,

    /// The table each worker registers its session in.
    ///
    /// Environment variable: `SESSION_TABLE`
    #[arg(long, env = "SESSION_TABLE", default_value_t = String::from("mh_user_session"))]
    pub session_table: String,

    /// Number of insert workers.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 10)]
    pub num_workers: usize,

    /// Total number of inserts to execute across all workers.
    ///
    /// Environment variable: `NUM_INSERTS`
    #[arg(long, env = "NUM_INSERTS", default_value_t = 10_000)]
    pub num_inserts: usize,

    /// Upper bound, in seconds, of the random pause after each insert. Each
    /// worker waits between 1 and this many seconds.
    ///
    /// Environment variable: `HB_INTERVAL`
    #[arg(long, visible_alias = "hb-interval", env = "HB_INTERVAL", default_value_t = 30)]
    pub interval: u32,

    /// Shuffle the action ids before handing them to the workers.
    ///
    /// Environment variable: `SHUFFLE`
    #[arg(long, env = "SHUFFLE", default_value_t = false)]
    pub shuffle: bool,

    /// Emit per-insert timing samples under this metrics profile.
    ///
    /// Environment variable: `METRICS_PROFILE`
    #[arg(long, env = "METRICS_PROFILE")]
    pub metrics_profile: Option<String>,
}

#[derive(Clone)]
pub struct InsertConfig {
    pub database_url: String,
    pub table: String,
    pub session_table: String,
    pub num_workers: usize,
    pub num_inserts: usize,
    pub throttle: Throttle,
    pub shuffle: bool,
    pub metrics_profile: Option<String>,
}

impl TryFrom<CliArgs> for InsertConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let database_url = match (args.database_url, args.host) {
            (Some(url), _) => url,
            (None, Some(host)) => {
                let mut options = MySqlConnectOptions::new()
                    .host(&host)
                    .username(&args.user)
                    .database(&args.database);
                if !args.password.is_empty() {
                    options = options.password(&args.password);
                }
                if let Some(port) = args.port {
                    options = options.port(port);
                }
                options.to_url_lossy().to_string()
            }
            (None, None) => bail!("missing host option"),
        };

        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        validate_table_name(&args.table)?;
        validate_table_name(&args.session_table)?;

        let throttle = Throttle::from_secs(args.interval)?;

        Ok(Self {
            database_url,
            table: args.table,
            session_table: args.session_table,
            num_workers: args.num_workers,
            num_inserts: args.num_inserts,
            throttle,
            shuffle: args.shuffle,
            metrics_profile: args.metrics_profile,
        })
    }
}

impl core::fmt::Debug for InsertConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InsertConfig")
            .field("database_url", &redact_url(&self.database_url))
            .field("table", &self.table)
            .field("session_table", &self.session_table)
            .field("num_workers", &self.num_workers)
            .field("num_inserts", &self.num_inserts)
            .field("throttle", &self.throttle)
            .field("shuffle", &self.shuffle)
            .field("metrics_profile", &self.metrics_profile)
            .finish()
    }
}

/// Hides the credentials part of a connection URL.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***{}", &url[..scheme], &url[at..])
        }
        _ => url.to_owned(),
    }
}

/// Table names are interpolated into SQL, so only plain identifiers
/// (optionally `schema.table`) are accepted.
pub fn validate_table_name(name: &str) -> anyhow::Result<()> {
    let valid = !name.is_empty()
        && name.split('.').count() <= 2
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if !valid {
        bail!("invalid table name {name:?}");
    }
    Ok(())
}

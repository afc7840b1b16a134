use anyhow::{Context, Result};
use clap::Parser;
use metabase_bridge::config::{DEFAULT_AUTH_HEADER, DEFAULT_TIMEOUT_SECS};
use metabase_bridge::{start_bridge, BridgeConfig, ConfigError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "metabase-mcp",
    version,
    about = "MCP server exposing native Metabase queries as a tool",
    long_about = "Serves the Model Context Protocol over stdin/stdout. Each call to the \
                  metabase-tool tool runs a native query through Metabase's /api/dataset \
                  endpoint against the configured database."
)]
struct Cli {
    #[arg(long, env = "METABASE_DATABASE_ID", help = "Metabase database ID to query")]
    database_id: Option<String>,

    #[arg(
        long,
        env = "METABASE_HOST",
        help = "Metabase base URL, e.g. https://metabase.example.com"
    )]
    host: Option<String>,

    #[arg(
        long,
        env = "METABASE_COOKIES",
        hide_env_values = true,
        help = "Authentication credential sent with every request"
    )]
    cookies: Option<String>,

    #[arg(
        long,
        env = "METABASE_AUTH_HEADER",
        default_value = DEFAULT_AUTH_HEADER,
        help = "Header carrying the credential"
    )]
    auth_header: String,

    #[arg(
        long,
        env = "METABASE_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Overall request timeout in seconds (1-300)"
    )]
    timeout_secs: u64,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<BridgeConfig, ConfigError> {
        let mut builder = BridgeConfig::builder()
            .auth_header(self.auth_header)
            .timeout_secs(self.timeout_secs);

        if let Some(raw) = self.database_id {
            let id = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidDatabaseId(raw.clone()))?;
            builder = builder.database_id(id);
        }
        if let Some(host) = self.host {
            builder = builder.base_url(host);
        }
        if let Some(cookies) = self.cookies {
            builder = builder.credential(cookies);
        }

        builder.build()
    }
}

fn init_logging(verbose: bool) {
    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("metabase_bridge=debug,metabase_mcp=debug,info")
        } else {
            EnvFilter::new("metabase_bridge=info,metabase_mcp=info,warn")
        }
    });

    // Stdout carries MCP frames
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.into_config().map_err(|e| {
        error!("{}", e);
        e
    })?;

    tokio::select! {
        result = start_bridge(config) => result.context("metabase-mcp stopped with an error")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}

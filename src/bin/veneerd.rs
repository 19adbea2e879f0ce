//! Veneer server daemon
//!
//! Loads `veneer.toml` (writing the default file on first start), installs
//! the log subscriber, opens the in-memory engine and serves the JSON-lines
//! transport until Ctrl-C.
//!
//! ```bash
//! veneerd
//! veneerd --config /etc/veneer/veneer.toml
//! veneerd --listen 0.0.0.0:5656
//! ```

use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgMatches, Command};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use veneer::config::CONFIG_FILE_NAME;
use veneer::{Executor, ServerConfig};

fn build_cli() -> Command {
    Command::new("veneerd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Veneer server: stateful cursors over JSON-lines RPC")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (created with defaults if missing)"),
        )
        .arg(
            Arg::new("listen")
                .short('l')
                .long("listen")
                .value_name("ADDR")
                .help("Listen address, overrides the config file"),
        )
}

fn load_config(matches: &ArgMatches) -> Result<ServerConfig, String> {
    let path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    ServerConfig::write_default_if_missing(&path).map_err(|e| e.to_string())?;
    let mut config = ServerConfig::from_file(&path).map_err(|e| e.to_string())?;
    if let Some(listen) = matches.get_one::<String>("listen") {
        config.listen = listen.clone();
    }
    Ok(config)
}

fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();
    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    init_logging(&config);

    let listener = match TcpListener::bind(&config.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(listen = %config.listen, error = %e, "Failed to bind");
            process::exit(1);
        }
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        time_format = %config.time.format,
        default_timeout_ms = config.default_timeout_ms,
        "Starting veneerd"
    );

    let executor = Executor::in_memory(config);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    };
    if let Err(e) = veneer::wire::serve_with_shutdown(listener, executor, shutdown).await {
        error!(error = %e, "Server stopped");
        process::exit(1);
    }
}

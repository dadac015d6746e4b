//! Resilient REST client CLI.
//!
//! Performs one request through [`ApiClient`] and prints the normalized
//! result as JSON.
//!
//! ```text
//! resilient-client --config client.toml GET users --data '{"page": 2}'
//! ```
//!
//! In cache-then-network mode the first answer may come from the response
//! cache; the CLI then waits for the network refresh, prints it as well and
//! saves the cache file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use resilient_client::client::{ApiClient, Outcome};
use resilient_client::config::{load_config, ClientConfig};
use resilient_client::http::{Method, Payload, ReqwestTransport};
use resilient_client::observability::logging::init_logging;
use resilient_client::MemoryCache;

/// Event name used for the refresh when none is given.
const DEFAULT_EVENT: &str = "refresh";

#[derive(Parser)]
#[command(name = "resilient-client")]
#[command(about = "REST client with circuit breaking and cache-then-network reads", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Request data as a JSON object (query for GET/DELETE, body otherwise)
    #[arg(short, long)]
    data: Option<String>,

    /// Event name the network refresh is published under
    #[arg(short, long)]
    event: Option<String>,

    /// Skip the response cache even if the config enables it
    #[arg(long)]
    no_cache: bool,

    /// GET, POST, PUT, PATCH or DELETE
    method: Method,

    /// Resource path relative to the base URL
    resource: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    if cli.no_cache {
        config.cache_then_network = false;
    }

    init_logging(&config.observability)?;

    let data: Option<Payload> = cli.data.as_deref().map(serde_json::from_str::<Payload>).transpose()?;

    let transport = ReqwestTransport::new(&config.transport)?;
    let cache = MemoryCache::from_config(&config.cache)?;
    let racing = config.cache_then_network;
    let wait = Duration::from_millis(config.transport.timeout_ms);

    tracing::info!(
        base_url = %config.base_url,
        method = %cli.method,
        resource = %cli.resource,
        cache_then_network = racing,
        cached_entries = cache.len(),
        "Configuration loaded"
    );

    let client = ApiClient::builder(config)
        .transport(transport)
        .cache(cache.clone())
        .build()?;

    let event = cli
        .event
        .clone()
        .or_else(|| racing.then(|| DEFAULT_EVENT.to_string()));
    let (tx, mut refreshes) = mpsc::unbounded_channel();
    if let Some(event) = &event {
        client.on(event.clone(), move |outcome: &Outcome| {
            let _ = tx.send(outcome.clone());
        });
    }

    let outcome = client
        .fetch(&cli.resource, cli.method, data.as_ref(), event.as_deref())
        .await;
    let code = print_outcome("response", &outcome)?;

    if racing {
        match tokio::time::timeout(wait, refreshes.recv()).await {
            Ok(Some(refresh)) => {
                print_outcome(event.as_deref().unwrap_or(DEFAULT_EVENT), &refresh)?;
            }
            _ => tracing::warn!(timeout_ms = wait.as_millis() as u64, "No network refresh received"),
        }
        cache.save_to_file()?;
    }

    Ok(code)
}

fn print_outcome(label: &str, outcome: &Outcome) -> Result<ExitCode, serde_json::Error> {
    match outcome {
        Ok(result) => {
            println!("{}: {}", label, serde_json::to_string_pretty(result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(result) = e.response() {
                println!("{}: {}", label, serde_json::to_string_pretty(result)?);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

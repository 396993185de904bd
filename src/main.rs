//! Resilient probe.
//!
//! Sends requests to one downstream through the retry + circuit breaker
//! stack and prints the final breaker snapshot.
//!
//! ```text
//! resilient-probe --config guard.toml -n 20 --interval-ms 250 http://127.0.0.1:3000/health
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method, Uri};
use clap::Parser;

use resilient_client::config::{self, ResilienceConfig};
use resilient_client::observability::logging;
use resilient_client::transport::drain;
use resilient_client::{Request, ResilientClient, Shutdown};

#[derive(Parser)]
#[command(name = "resilient-probe")]
#[command(about = "Send requests through the retry and circuit breaker stack", long_about = None)]
struct Cli {
    /// Target URL.
    url: String,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra header ("name: value"), repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body.
    #[arg(short = 'd', long)]
    data: Option<String>,

    /// Number of requests to send.
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,

    /// Pause between requests in milliseconds.
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Per-request deadline in milliseconds, covering all retries.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ResilienceConfig::default(),
    };
    config::apply_env_overrides(&mut config, std::env::vars());
    let adjustments = config::normalize(&mut config);

    logging::init_logging(&config.observability)?;
    tracing::info!("resilient-probe v{} starting", env!("CARGO_PKG_VERSION"));
    for adjustment in &adjustments {
        tracing::warn!(%adjustment, "Configuration value replaced with default");
    }

    let method = Method::from_bytes(cli.method.to_uppercase().as_bytes())?;
    let uri: Uri = cli.url.parse()?;
    let headers = cli
        .headers
        .iter()
        .map(|raw| parse_header(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let client = ResilientClient::http(&config);
    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c();

    for n in 1..=cli.count {
        if shutdown.is_triggered() {
            break;
        }

        let mut request = Request::new(method.clone(), uri.clone()).with_signal(shutdown.signal());
        for (name, value) in &headers {
            request = request.with_header(name.clone(), value.clone());
        }
        if let Some(data) = &cli.data {
            request = request.with_body(data.clone());
        }
        if let Some(ms) = cli.timeout_ms {
            request = request.with_timeout(Duration::from_millis(ms));
        }

        let request_id = request.id();
        match client.send(request).await {
            Ok(response) => {
                tracing::info!(request = n, request_id = %request_id, status = %response.status(), "Request completed");
                drain(response).await;
            }
            Err(e) => {
                tracing::warn!(request = n, request_id = %request_id, error = %e, "Request failed");
            }
        }

        if cli.interval_ms > 0 && n < cli.count {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(cli.interval_ms)) => {}
                _ = shutdown.wait() => break,
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&client.status())?);
    Ok(())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), Box<dyn std::error::Error>> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header must look like 'name: value', got '{raw}'"))?;
    Ok((
        HeaderName::from_bytes(name.trim().as_bytes())?,
        HeaderValue::from_str(value.trim())?,
    ))
}

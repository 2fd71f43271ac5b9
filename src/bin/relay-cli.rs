use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use route_relay::config::load_config;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Operator CLI for the route relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file and print the effective settings
    Check {
        /// Path to the TOML config file
        config: PathBuf,
    },
    /// Fetch a route through a running relay
    Fetch {
        /// Relay base URL
        #[arg(short, long, default_value = "http://localhost:8080")]
        relay: String,

        /// Upstream path to request
        #[arg(long)]
        route: String,

        /// Name of the route query parameter
        #[arg(long, default_value = "route")]
        param: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => match load_config(&config) {
            Ok(config) => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Fetch { relay, route, param } => {
            let res = fetch_route(&cli_client().build()?, &relay, &route, &param).await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

/// HTTP client that names itself; a strict relay rejects calls without a user agent.
fn cli_client() -> reqwest::ClientBuilder {
    reqwest::Client::builder().user_agent(concat!("relay-cli/", env!("CARGO_PKG_VERSION")))
}

async fn fetch_route(
    client: &reqwest::Client,
    relay: &str,
    route: &str,
    param: &str,
) -> reqwest::Result<reqwest::Response> {
    client.get(relay).query(&[(param, route)]).send().await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let headers: Vec<Value> = res
        .headers()
        .iter()
        .map(|(name, value)| json!([name.as_str(), String::from_utf8_lossy(value.as_bytes())]))
        .collect();
    let body = res.text().await?;

    let report = json!({
        "status": status.as_u16(),
        "headers": headers,
        "body": body,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
    }
    Ok(())
}

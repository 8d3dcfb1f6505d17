use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use psap_locator::config::Config;
use psap_locator::coordinates::{format_coordinates, parse_coordinates};
use psap_locator::models::PsapRecord;
use psap_locator::server::{AppState, router};
use psap_locator::service::PsapLocator;

#[derive(Parser)]
#[command(name = "psap-locator", version, about = "Find the PSAP responsible for a GPS position")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize coordinates without contacting the assistant
    Parse { coordinates: String },
    #[command(flatten)]
    Remote(RemoteCommand),
}

/// Commands that need a configured assistant backend
#[derive(Subcommand)]
enum RemoteCommand {
    /// Look up the PSAP responsible for the coordinates
    Lookup {
        coordinates: String,
        #[arg(long)]
        json: bool,
    },
    /// Look up backup PSAPs around the coordinates
    Nearby {
        coordinates: String,
        #[arg(long)]
        json: bool,
    },
    /// Serve lookups over HTTP
    Serve {
        #[arg(long, env = "PSAP_HTTP_BIND")]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for results
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Parse { coordinates } => {
            match parse_coordinates(&coordinates) {
                Some(c) => println!("{}", format_coordinates(c.latitude, c.longitude)),
                None => println!("cannot display map: unrecognized coordinates"),
            }
            Ok(())
        }
        Command::Remote(remote) => run_remote(remote).await,
    }
}

async fn run_remote(command: RemoteCommand) -> Result<()> {
    let config = Config::load();
    let locator = Arc::new(
        PsapLocator::from_config(&config).context("Failed to initialize assistant backend")?,
    );

    match command {
        RemoteCommand::Lookup { coordinates, json } => {
            let record = locator.lookup_primary(&coordinates).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
        }
        RemoteCommand::Nearby { coordinates, json } => {
            let records = locator.lookup_nearby(&coordinates).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No PSAPs found in the assistant response");
            } else {
                for (i, record) in records.iter().enumerate() {
                    if i > 0 {
                        println!();
                    }
                    print_record(record);
                }
            }
        }
        RemoteCommand::Serve { bind } => {
            let bind: SocketAddr = bind
                .unwrap_or_else(|| config.server.bind.clone())
                .parse()
                .context("Invalid bind address (expected host:port)")?;
            let app = router(AppState { locator }, config.server.bearer_token.clone());

            let listener = tokio::net::TcpListener::bind(bind).await?;
            tracing::info!(
                %bind,
                auth = %config.server.bearer_token.as_deref().map(|_| "bearer").unwrap_or("none"),
                "Starting PSAP lookup HTTP server"
            );
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

fn print_record(record: &PsapRecord) {
    println!("PSAP: {}", record.name);
    if !record.website.is_empty() {
        println!("Website: {}", record.website);
    }
    for phone in &record.phone_numbers {
        println!("Phone ({}): {}", phone.kind, phone.number);
    }
    if !record.jurisdiction.is_empty() {
        println!("Jurisdiction: {}", record.jurisdiction);
    }
    if record.name.is_empty() {
        println!("--- assistant response ---\n{}", record.raw_text);
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faas_kit::config::{self, Config};
use faas_kit::host::{self, AppState};
use faas_kit::template::TemplateEngine;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "faas_kit=debug,tower_http=debug".into()),
    );
    let json_logs = std::env::var("FAAS_LOG_FORMAT").is_ok_and(|v| v == "json");
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let command = args.command.unwrap_or(cli::Commands::Serve { port: None });
    let result = handle_command(command, cfg).await;

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!(secrets_dir = %cfg.secrets_dir.display(), "Initializing clients...");
    let state = Arc::new(AppState::from_config(&cfg)?);
    if cfg.dry_run {
        tracing::warn!("Dry run enabled: service calls will not be sent");
    }

    let app = host::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("faas-kit host listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_command(cmd: cli::Commands, mut cfg: Config) -> anyhow::Result<()> {
    match cmd {
        cli::Commands::Serve { port } => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await?;
        }
        cli::Commands::Secret { name } => {
            let state = AppState::from_config(&cfg)?;
            print!("{}", state.secrets.get(&name).await);
        }
        cli::Commands::Vault { name } => {
            let state = AppState::from_config(&cfg)?;
            print_json(&state.vault.get_secret_value(&name).await)?;
        }
        cli::Commands::Render { template, data } => {
            let data = parse_data(&data)?;
            let rendered = TemplateEngine::new()
                .render(&template, &data)
                .await
                .context("Template render failed")?;
            println!("{}", rendered);
        }
        cli::Commands::Call {
            service,
            data,
            dry_run,
        } => {
            cfg.dry_run |= dry_run;
            let data = parse_data(&data)?;
            let state = AppState::from_config(&cfg)?;
            print_json(&state.dispatcher.call_service(&service, &data).await)?;
        }
        cli::Commands::Event { data } => {
            let data = parse_data(&data)?;
            let state = AppState::from_config(&cfg)?;
            print_json(&state.events.save(&data).await)?;
        }
    }
    Ok(())
}

fn parse_data(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("Invalid JSON data: {}", raw))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! DingDong API client
//!
//! Command-line front end for the authenticated request core:
//! 1. Loads the TOML config and opens the session file
//! 2. Sends calls with the stored credential and the pass-through headers
//! 3. Refreshes an expired token once, shared by every call in flight
//! 4. Tears the session down when the refresh token is rejected

mod app;
mod config;
mod metrics;
mod ui;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::ApiError;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};
use transport::{HeaderName, HeaderValue, Method};

use crate::app::{App, LoginRequest};
use crate::config::Config;
use crate::ui::TerminalNotifier;

#[derive(Parser)]
#[command(
    name = "dingdong-api",
    version,
    about = "Authenticated client for the DingDong check-in API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (falls back to CONFIG_PATH, then ./dingdong-api.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Print Prometheus metrics to stderr when the command finishes.
    #[arg(long, global = true, default_value_t = false)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one API call and print the response data.
    Request {
        #[arg(value_parser = parse_method)]
        method: Method,
        /// Path relative to the base URL, e.g. /task/list
        path: String,
        /// JSON payload (query string for GET, body otherwise)
        #[arg(long, value_parser = parse_json)]
        data: Option<Value>,
        /// Extra header as `Name: value`, repeatable
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(HeaderName, HeaderValue)>,
    },
    /// Exchange a login code for a session.
    Login {
        #[arg(long)]
        code: String,
        #[arg(long)]
        nickname: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Upload an avatar image and print its URL.
    UploadAvatar { file: PathBuf },
    /// Clear the stored session.
    Logout,
    /// Show whether a session is stored.
    Status,
}

fn init_telemetry(json_logs: bool) {
    // LOG_LEVEL takes precedence over RUST_LOG
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(cli.json_logs);

    // Install before any metric is emitted
    let prometheus = if cli.metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(
        base_url = %config.api.base_url,
        session_file = %config.storage.path.display(),
        headers = config.headers.len(),
        "configuration loaded"
    );

    let app = App::build(&config, Arc::new(TerminalNotifier::stderr()))?;
    let outcome = run(&app, cli.command).await;

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }

    // Teardown schedules the login redirect; let it fire before exiting
    if let Err(e) = &outcome
        && matches!(
            e.downcast_ref::<ApiError>(),
            Some(ApiError::Unauthorized | ApiError::RefreshFailed(_))
        )
    {
        warn!("session ended");
        tokio::time::sleep(config.session.navigate_delay()).await;
    }

    outcome
}

async fn run(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Request {
            method,
            path,
            data,
            headers,
        } => {
            let data = app.request(method, &path, data, headers).await?;
            print_json(&data)
        }
        Commands::Login {
            code,
            nickname,
            avatar,
        } => {
            let user = app
                .login(&LoginRequest {
                    code,
                    nickname,
                    avatar,
                })
                .await?;
            print_json(&user)
        }
        Commands::UploadAvatar { file } => {
            let url = app.upload_avatar(&file).await?;
            println!("{url}");
            Ok(())
        }
        Commands::Logout => {
            app.logout()?;
            println!("logged out");
            Ok(())
        }
        Commands::Status => print_json(&app.status()),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{text}");
    Ok(())
}

fn parse_method(s: &str) -> std::result::Result<Method, String> {
    Method::from_str(&s.to_ascii_uppercase()).map_err(|e| format!("invalid method {s:?}: {e}"))
}

fn parse_json(s: &str) -> std::result::Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}

fn parse_header(s: &str) -> std::result::Result<(HeaderName, HeaderValue), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {s:?}"))?;
    let name = HeaderName::from_str(name.trim()).map_err(|e| format!("invalid header name: {e}"))?;
    let value =
        HeaderValue::from_str(value.trim()).map_err(|e| format!("invalid header value: {e}"))?;
    Ok((name, value))
}

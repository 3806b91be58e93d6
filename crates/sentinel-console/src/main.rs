//! Sentinel Console
//!
//! Terminal front end for the monitoring service.
//!
//! - Logs in and keeps the session across runs
//! - Calls protected endpoints with the held credential
//! - Submits simulated sensor readings
//! - Follows the live alert stream, reconnecting on its own

mod projection;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use sentinel_client::{
    ClientConfig, CredentialStore, FileBackend, Method, SessionClient, StreamSubscriber,
    WsConnector,
};
use sentinel_common::models::SensorEvent;
use tracing_subscriber::EnvFilter;

use projection::{Line, Tone};

/// Sentinel monitoring console.
#[derive(Parser, Debug)]
#[command(name = "sentinel-console", about = "Sentinel monitoring console")]
struct Cli {
    /// Client config file (TOML).
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Service base URL. Overrides the config file.
    #[arg(long, env = "SENTINEL_URL")]
    base_url: Option<String>,

    /// Where the session credential is persisted.
    #[arg(long)]
    credential_file: Option<PathBuf>,

    /// Delay between an alert stream close and the next attempt.
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the session.
    Login { username: String, password: String },
    /// Drop the persisted session.
    Logout,
    /// Show the session state and token preview.
    Status,
    /// Call a protected endpoint, e.g. `call GET /system/status`.
    Call { method: String, endpoint: String },
    /// Submit a sensor reading.
    Sensor {
        /// e.g. temperature, motion, access
        sensor_type: String,
        value: String,
        /// Defaults to the type's initial followed by `-007`.
        #[arg(long)]
        sensor_id: Option<String>,
    },
    /// Follow the alert stream until Ctrl-C.
    Watch,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let credential_path = config.credential_path()?;

    tracing::debug!(
        base_url = %config.base_url,
        credentials = %credential_path.display(),
        "sentinel-console starting"
    );

    let store = Arc::new(CredentialStore::open(FileBackend::new(credential_path)));
    let client = SessionClient::new(&config, store.clone())?;

    let ok = match cli.command {
        Command::Login { username, password } => {
            let result = client.login(&username, &password).await;
            emit(&projection::login_line(&result));
            show_session(&client);
            result.is_ok()
        }
        Command::Logout => {
            client.logout();
            show_session(&client);
            true
        }
        Command::Status => {
            show_session(&client);
            true
        }
        Command::Call { method, endpoint } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method {method:?}"))?;
            let result = client.call_protected(&endpoint, method).await;
            emit(&projection::protected_line(&result));
            result.is_ok()
        }
        Command::Sensor {
            sensor_type,
            value,
            sensor_id,
        } => {
            let sensor_id =
                sensor_id.unwrap_or_else(|| projection::default_sensor_id(&sensor_type));
            let event = SensorEvent::now(sensor_type, sensor_id, value);
            let result = client.submit_sensor_event(&event).await;
            emit(&projection::sensor_line(&result));
            result.is_ok()
        }
        Command::Watch => {
            show_session(&client);
            watch(&config).await?;
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
        config.base()?;
    }
    if let Some(path) = &cli.credential_file {
        config.credential_file = Some(path.clone());
    }
    if let Some(ms) = cli.reconnect_delay_ms {
        config.reconnect_delay_ms = ms;
    }
    Ok(config)
}

fn show_session(client: &SessionClient) {
    emit(&projection::auth_badge(&client.auth_state()));
    emit(&projection::token_line(client.store().credential().as_ref()));
}

/// Follow the alert stream until Ctrl-C, then tear the subscription down.
async fn watch(config: &ClientConfig) -> anyhow::Result<()> {
    let url = config.alerts_url()?;
    tracing::info!(url = %url, "following alert stream");

    let mut handle =
        StreamSubscriber::new(WsConnector::new(url.as_str()), config.reconnect_delay()).start();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
            event = handle.next_event() => match event {
                Some(event) => emit(&projection::event_line(&event, &chrono::Local::now())),
                None => break,
            },
        }
    }

    // Drain so the final lines (including `Stopped`) are shown.
    handle.stop();
    while let Some(event) = handle.next_event().await {
        emit(&projection::event_line(&event, &chrono::Local::now()));
    }
    emit(&projection::connection_badge(handle.status()));
    handle.shutdown().await;
    Ok(())
}

fn emit(line: &Line) {
    let text = line.text.as_str();
    match line.tone {
        Tone::Ok => println!("{}", text.green()),
        Tone::Error => println!("{}", text.red()),
        Tone::Warning => println!("{}", text.yellow()),
        Tone::Critical => println!("{}", text.red().bold()),
        Tone::Plain => println!("{text}"),
    }
}

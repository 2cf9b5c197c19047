//! Confirmation daemon lib
//!
//! Hosts a [`RequestOrchestrator`] behind a JSON-lines protocol on stdin and stdout. Logs go to
//! stderr. The queue lives in memory: stopping the daemon rejects every pending request and a
//! restart starts empty.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use confirm_engine::RequestOrchestrator;
use confirm_fake::{FakeKeyring, FakeSigner, StaticSettings};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod config;
pub mod env_vars;
pub mod rpc;
pub mod ui;

use crate::cli::CLIArgs;
use crate::config::Settings;
use crate::rpc::Daemon;
use crate::ui::{NotifyingIcon, NotifyingPopup};

/// Default working directory, under the home directory
pub const DEFAULT_WORK_DIR: &str = ".confirmd";

/// Resolve and create the working directory
pub fn get_work_directory(args: &CLIArgs) -> Result<PathBuf> {
    let work_dir = match &args.work_dir {
        Some(work_dir) => work_dir.clone(),
        None => home::home_dir()
            .ok_or(anyhow!("Unknown home dir"))?
            .join(DEFAULT_WORK_DIR),
    };

    std::fs::create_dir_all(&work_dir)?;
    Ok(work_dir)
}

/// Settings from the config file, then the environment.
///
/// An explicit `config_path` must exist. Without one, `config.toml` of the working directory is
/// read when present.
pub fn load_settings(work_dir: &Path, config_path: Option<PathBuf>) -> Result<Settings> {
    let settings = match config_path {
        Some(config_path) if !config_path.exists() => {
            bail!("Config file {} does not exist", config_path.display())
        }
        Some(config_path) => Settings::new(Some(config_path)),
        None => {
            let config_path = work_dir.join("config.toml");
            if config_path.exists() {
                Settings::new(Some(config_path))
            } else {
                Settings::default()
            }
        }
    };

    settings.from_env()
}

/// Install the stderr subscriber, `RUST_LOG` wins over `level`
pub fn setup_tracing(level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|err| anyhow!(err))
}

/// Build the orchestrator with in-process collaborators
pub fn build_orchestrator(
    settings: &Settings,
    output: mpsc::UnboundedSender<Value>,
) -> Result<RequestOrchestrator> {
    let signer = match &settings.signer.secret_key {
        Some(secret_key) => FakeSigner::from_hex(secret_key)?,
        None => {
            tracing::warn!("No signer key configured, using a random key");
            FakeSigner::random()
        }
    };
    let signer = Arc::new(signer);

    let orchestrator = RequestOrchestrator::builder()
        .keyring(Arc::new(FakeKeyring::unlocked()))
        .settings(Arc::new(StaticSettings::new(
            settings.info.always_require_password,
        )))
        .popup(Arc::new(NotifyingPopup::new(output.clone())))
        .icon(Arc::new(NotifyingIcon::new(output)))
        .signing_signer(signer.clone())
        .transaction_signer(signer)
        .internal_origin(settings.info.internal_origin.clone())
        .signing_fingerprint(settings.signing.fingerprint)
        .build()?;

    Ok(orchestrator)
}

/// Serve stdin until it closes
pub async fn run(settings: &Settings) -> Result<()> {
    let (output, mut lines_out) = mpsc::unbounded_channel::<Value>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = lines_out.recv().await {
            let mut line = line.to_string();
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let daemon = Daemon::new(build_orchestrator(settings, output.clone())?, output.clone());
    tracing::info!("confirmd ready");

    serve(&daemon, BufReader::new(tokio::io::stdin()), &output).await;

    drop(daemon);
    drop(output);
    writer.await??;

    Ok(())
}

/// Answer every request line of `input`, then reject whatever is still pending.
///
/// Lines that are not UTF-8 are skipped. Any other read error ends the input like EOF does.
/// Returns the number of requests rejected at the end.
pub async fn serve<R>(daemon: &Daemon, input: R, output: &mpsc::UnboundedSender<Value>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!("Skipping request line: {}", err);
                continue;
            }
            Err(err) => {
                tracing::error!("Could not read input: {}", err);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        let response = daemon.handle_line(&line).await;
        if output.send(response).is_err() {
            break;
        }
    }

    let rejected = daemon.orchestrator().reset_wallet().await;
    tracing::info!("Input closed, rejected {} pending requests", rejected);
    rejected
}

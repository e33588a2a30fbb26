//! perl6-ls binary: wires stdin/stdout to the language server.
//!
//! Stdout carries the protocol, so logs go to a file (or stderr when no
//! file can be opened).

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use perl6_ls_config::{FileConfig, RawSettings, config_path};
use perl6_ls_lsp::{LanguageServer, ProcessRunner, SessionEnd};

#[derive(Debug, Parser)]
#[command(
    name = "perl6-ls",
    version,
    about = "Language server reporting `perl6 -c` errors as diagnostics"
)]
struct Cli {
    /// Talk LSP over stdin/stdout (the only transport; accepted for clients that pass it)
    #[arg(long)]
    stdio: bool,

    /// Compiler executable, overriding the config file
    #[arg(long, value_name = "PATH")]
    compiler: Option<String>,

    /// Write logs here instead of ~/.perl6-ls/logs/perl6-ls.log
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Process id of the editor, as passed by some clients
    #[arg(long = "clientProcessId", value_name = "PID")]
    client_process_id: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref());

    match run(cli).await {
        Ok(end) => ExitCode::from(end.exit_code()),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("perl6-ls: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<SessionEnd> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        client_pid = ?cli.client_process_id,
        stdio = cli.stdio,
        "Starting perl6-ls"
    );

    let server = LanguageServer::new(Arc::new(ProcessRunner::new()), base_settings(&cli))?;
    server.serve(tokio::io::stdin(), tokio::io::stdout()).await
}

/// Config file layer with the command-line override on top. A broken config
/// file is logged and skipped so the editor still gets a server.
fn base_settings(cli: &Cli) -> RawSettings {
    let file = match FileConfig::load() {
        Ok(Some(config)) => config.into_raw(),
        Ok(None) => RawSettings::default(),
        Err(e) => {
            tracing::warn!("{e}; using built-in defaults");
            RawSettings::default()
        }
    };

    match &cli.compiler {
        Some(compiler) => file.overlay(RawSettings::with_compiler(compiler.clone())),
        None => file,
    }
}

fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_log_file(log_file_candidates(log_file));

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(candidates: Vec<PathBuf>) -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in candidates {
        if let Some(parent) = candidate.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }

    // ~/.perl6-ls/logs/perl6-ls.log, next to the config file
    if let Some(config_path) = config_path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("perl6-ls.log"));
    }

    candidates.push(PathBuf::from(".perl6-ls").join("logs").join("perl6-ls.log"));

    candidates
}

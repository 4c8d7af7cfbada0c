// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Sif shim CLI.
//!
//! Drives the executable resolver, the language-client lifecycle and the
//! `run-current-file` command from the command line.

#![allow(clippy::print_stdout, reason = "CLI tool needs to output to stdout")]
#![allow(clippy::print_stderr, reason = "CLI tool needs to output to stderr")]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use sif_shim::cli::{CliHost, ColorConfig};
use sif_shim::config::Settings;
use sif_shim::host::{Document, EditorHost};
use sif_shim::lifecycle::{ClientLifecycle, LifecycleState};
use sif_shim::resolver::{INTERPRETER, LANGUAGE_SERVER, ResolveContext, Resolver, ToolSpec};

/// How long `doctor` waits for the language server to become ready.
const DOCTOR_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Tools that can be resolved.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Tool {
    /// The Sif language server (`sif_lsp`).
    LanguageServer,
    /// The Sif interpreter (`sif`).
    Interpreter,
}

impl Tool {
    const fn spec(self) -> &'static ToolSpec {
        match self {
            Self::LanguageServer => &LANGUAGE_SERVER,
            Self::Interpreter => &INTERPRETER,
        }
    }
}

/// Command-line arguments for the Sif shim.
#[derive(Parser, Debug)]
#[command(name = "sif-shim")]
#[command(about = "Locate Sif tools, manage the Sif language client and run Sif files")]
#[command(version = env!("SIF_SHIM_VERSION"))]
struct Args {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root directories. The first one is used for tool lookup.
    #[arg(short, long, global = true)]
    root: Vec<PathBuf>,

    /// Extension installation directory (defaults to the directory of this
    /// executable).
    #[arg(long, global = true, env = "SIF_SHIM_EXTENSION_DIR")]
    extension_dir: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    nocolor: bool,
}

/// Subcommands supported by the Sif shim.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved path of a Sif tool.
    Resolve {
        /// Which tool to resolve.
        #[arg(value_enum)]
        tool: Tool,
    },

    /// Run a Sif file with the resolved interpreter.
    Run {
        /// The file to run.
        file: PathBuf,
    },

    /// Check tool resolution and language server startup.
    Doctor,
}

/// Entry point for the `sif-shim` binary.
///
/// # Errors
///
/// Returns an error if the subcommand fails.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sif_shim=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load(args.config.clone())?;
    let colors = ColorConfig::new(args.nocolor);
    let roots = resolve_roots(&args.root)?;
    let resolver = Resolver::new(extension_dir(args.extension_dir.as_deref())?);
    let host = CliHost::new(settings, roots, colors.clone());

    match args.command {
        Command::Resolve { tool } => run_resolve(&host, &resolver, tool),
        Command::Run { file } => run_file(host, &resolver, file),
        Command::Doctor => run_doctor(&host, resolver, &colors).await,
    }
}

/// Canonicalizes the `--root` arguments, defaulting to the current directory.
fn resolve_roots(raw: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let raw_roots = if raw.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        raw.to_vec()
    };
    raw_roots
        .iter()
        .map(|r| {
            r.canonicalize()
                .with_context(|| format!("Invalid workspace root: {}", r.display()))
        })
        .collect()
}

fn extension_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let exe = std::env::current_exe().context("Failed to locate the sif-shim executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("sif-shim executable has no parent directory")
}

fn run_resolve(host: &CliHost, resolver: &Resolver, tool: Tool) -> Result<()> {
    let spec = tool.spec();
    let ctx = ResolveContext::from_host(host, spec);
    let resolved = resolver.resolve(spec, &ctx)?;
    println!("{}", resolved.path.display());
    debug!("{} resolved by {} step", spec.name, resolved.step);
    Ok(())
}

fn run_file(host: CliHost, resolver: &Resolver, file: PathBuf) -> Result<()> {
    let host = host.with_active_document(Document::from_path(file));
    if sif_shim::command::run_current_file(&host, resolver).is_err() {
        // Already reported through the host.
        std::process::exit(1);
    }

    match host.wait_terminals()? {
        Some(status) if !status.success() => {
            std::process::exit(status.code().unwrap_or(1));
        }
        _ => Ok(()),
    }
}

async fn run_doctor(host: &CliHost, resolver: Resolver, colors: &ColorConfig) -> Result<()> {
    println!("Sif shim {}", env!("SIF_SHIM_VERSION"));
    println!();

    let platform = resolver.platform();
    println!(
        "{} {}",
        colors.bold("Platform:  "),
        platform
            .platform_dir()
            .map_or_else(|| format!("{platform} (unsupported)"), str::to_string)
    );
    println!(
        "{} {}",
        colors.bold("Extension: "),
        resolver.install_dir().display()
    );
    println!(
        "{} {}",
        colors.bold("Roots:     "),
        host.workspace_folders()
            .iter()
            .map(|r| r.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    let width = [&LANGUAGE_SERVER, &INTERPRETER]
        .iter()
        .map(|t| t.display_name.len())
        .max()
        .unwrap_or(10);

    for spec in [&LANGUAGE_SERVER, &INTERPRETER] {
        let name = format!("{:<width$}", spec.display_name);
        let ctx = ResolveContext::from_host(host, spec);
        match resolver.resolve(spec, &ctx) {
            Ok(resolved) => println!(
                "{}  {} {}",
                name,
                colors.green(&resolved.path.display().to_string()),
                colors.dim(&format!("({})", resolved.step)),
            ),
            Err(e) => println!("{}  {}", name, colors.red(&format!("✗ {e}"))),
        }
    }
    println!();

    let mut lifecycle = ClientLifecycle::new(resolver);
    let mut state = lifecycle.activate(host);

    let deadline = Instant::now() + DOCTOR_READY_TIMEOUT;
    while state == LifecycleState::Starting && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
        state = lifecycle.state();
    }

    let label = match state {
        LifecycleState::Running => colors.green("✓ running"),
        LifecycleState::Starting => colors.red("✗ timed out while starting"),
        LifecycleState::Uninitialized => colors.dim("- not started"),
        LifecycleState::Stopped => colors.red("✗ failed to start"),
    };
    println!("{} {}", colors.bold("Language client:"), label);

    if let Some(stop) = lifecycle.deactivate()
        && let Err(e) = stop.await
    {
        warn!("Language client shutdown failed: {:#}", e);
    }

    Ok(())
}

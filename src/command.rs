// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The `run-current-file` command.
//!
//! Runs the active Sif document through the interpreter in an editor
//! terminal. The command returns as soon as the line is sent; it never waits
//! for the interpreter.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::CommandError;
use crate::host::EditorHost;
use crate::resolver::{INTERPRETER, Probe, ResolveContext, Resolver};

/// Command identifier exposed to the editor.
pub const RUN_CURRENT_FILE: &str = "run-current-file";

/// Name of the terminal the command opens.
pub const TERMINAL_NAME: &str = "Sif";

/// Runs the active document through the Sif interpreter.
///
/// Every failure is reported to the user through [`EditorHost::show_error`]
/// before being returned.
///
/// # Errors
///
/// Returns a [`CommandError`] when there is no active Sif document or the
/// interpreter cannot be found, and an I/O error if saving or the terminal
/// fails.
pub fn run_current_file<P: Probe>(host: &dyn EditorHost, resolver: &Resolver<P>) -> Result<()> {
    let result = launch(host, resolver);
    if let Err(e) = &result {
        warn!("{}: {:#}", RUN_CURRENT_FILE, e);
        host.show_error(&e.to_string());
    }
    result
}

fn launch<P: Probe>(host: &dyn EditorHost, resolver: &Resolver<P>) -> Result<()> {
    let document = host
        .active_document()
        .ok_or(CommandError::NoActiveDocument)?;

    if !document.is_sif() {
        return Err(CommandError::NotSifDocument {
            language_id: document.language_id,
        }
        .into());
    }

    // The interpreter reads from disk, so unsaved edits must land first.
    if document.is_dirty {
        debug!("Saving {} before running", document.path.display());
        host.save_document(&document)
            .with_context(|| format!("Failed to save {}", document.path.display()))?;
    }

    let ctx = ResolveContext::from_host(host, &INTERPRETER);
    let interpreter = resolver
        .resolve(&INTERPRETER, &ctx)
        .map_err(CommandError::from)?;

    let cwd = document
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let line = command_line(&interpreter.path, &document.path);
    info!("Running {} in {}", line, cwd.display());

    let mut terminal = host
        .create_terminal(TERMINAL_NAME, cwd)
        .context("Failed to create terminal")?;
    terminal.show();
    terminal
        .send_text(&line)
        .context("Failed to send command to terminal")?;

    Ok(())
}

/// Builds the terminal line `"<interpreter>" "<file>"`.
#[must_use]
pub fn command_line(interpreter: &Path, file: &Path) -> String {
    format!(
        "{} {}",
        quote(&interpreter.to_string_lossy()),
        quote(&file.to_string_lossy())
    )
}

/// Wraps `value` in double quotes for the platform shell.
fn quote(value: &str) -> String {
    if cfg!(windows) {
        quote_cmd(value)
    } else {
        quote_posix(value)
    }
}

/// POSIX shells still expand `\`, `$` and `` ` `` inside double quotes.
fn quote_posix(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '$' | '`' | '"') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// `cmd.exe` has no escape character inside quotes; a quote is doubled.
/// Windows file names cannot contain `"`, so this only matters for
/// configured interpreter values.
fn quote_cmd(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

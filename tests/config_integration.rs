// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Integration tests for settings loading and merging.
//!
//! Verifies that the shim reads tool paths from the user config directory,
//! an explicit `--config` file and `SIF_*` environment variables, in that
//! order of increasing priority.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Runs `sif-shim resolve interpreter` isolated from the user's own settings.
fn resolve_interpreter(config_home: &Path, configure: impl FnOnce(&mut Command)) -> Result<Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sif-shim"));
    cmd.arg("resolve")
        .arg("interpreter")
        .arg("--root")
        .arg(config_home)
        .arg("--extension-dir")
        .arg(config_home.join("ext"))
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("SIF_INTERPRETER__PATH")
        .env_remove("SIF_LANGUAGE_SERVER__PATH");
    configure(&mut cmd);
    cmd.output().context("Failed to run sif-shim")
}

fn stdout_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_explicit_config_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("shim.toml");
    std::fs::write(&config, "[interpreter]\npath = \"/from/file/sif\"\n")?;

    let output = resolve_interpreter(dir.path(), |cmd| {
        cmd.arg("--config").arg(&config);
    })?;

    assert!(output.status.success(), "resolve failed: {output:?}");
    assert_eq!(stdout_line(&output), "/from/file/sif");
    Ok(())
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("shim.toml");
    std::fs::write(&config, "[interpreter]\npath = \"/from/file/sif\"\n")?;

    let output = resolve_interpreter(dir.path(), |cmd| {
        cmd.arg("--config")
            .arg(&config)
            .env("SIF_INTERPRETER__PATH", "/from/env/sif");
    })?;

    assert!(output.status.success(), "resolve failed: {output:?}");
    assert_eq!(stdout_line(&output), "/from/env/sif");
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn test_user_settings_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let user_dir = dir.path().join("sif");
    std::fs::create_dir_all(&user_dir)?;
    std::fs::write(
        user_dir.join("settings.toml"),
        "[interpreter]\npath = \"/from/user/sif\"\n",
    )?;

    let output = resolve_interpreter(dir.path(), |_| {})?;
    assert!(output.status.success(), "resolve failed: {output:?}");
    assert_eq!(stdout_line(&output), "/from/user/sif");

    // An explicit file wins over the user settings.
    let config = dir.path().join("shim.toml");
    std::fs::write(&config, "[interpreter]\npath = \"/from/file/sif\"\n")?;
    let output = resolve_interpreter(dir.path(), |cmd| {
        cmd.arg("--config").arg(&config);
    })?;
    assert_eq!(stdout_line(&output), "/from/file/sif");
    Ok(())
}

#[test]
fn test_empty_setting_means_unset() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("shim.toml");
    std::fs::write(&config, "[interpreter]\npath = \"\"\n")?;

    let output = resolve_interpreter(dir.path(), |cmd| {
        cmd.arg("--config").arg(&config);
    })?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Please set \"sif.interpreter.path\" in settings."),
        "unexpected stderr: {stderr}"
    );
    Ok(())
}

#[test]
fn test_invalid_config_file_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("shim.toml");
    std::fs::write(&config, "[interpreter\npath = ")?;

    let output = resolve_interpreter(dir.path(), |cmd| {
        cmd.arg("--config").arg(&config);
    })?;

    assert!(!output.status.success());
    Ok(())
}

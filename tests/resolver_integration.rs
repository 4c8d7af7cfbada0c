// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Executable resolution against a real filesystem.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Tests use expect/unwrap for clear failure messages"
)]

use std::fs;
use std::path::{Path, PathBuf};

use sif_shim::ResolveError;
use sif_shim::resolver::{
    INTERPRETER, LANGUAGE_SERVER, Platform, ResolutionStep, ResolveContext, Resolver,
};

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"#!/bin/sh\n").unwrap();
}

fn linux() -> Platform {
    Platform::new("linux", "x86_64")
}

fn context(configured: Option<&str>, root: Option<&Path>) -> ResolveContext {
    ResolveContext {
        configured: configured.map(str::to_string),
        workspace_root: root.map(Path::to_path_buf),
    }
}

#[test]
fn test_bundled_binary_wins_over_workspace_build() {
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("ext");
    let root = dir.path().join("ws");
    let bundled = install.join("bin").join("linux-x64").join("sif_lsp");
    touch(&bundled);
    touch(&root.join("build").join("debug").join("sif_lsp"));

    let resolver = Resolver::new(&install).with_platform(linux());
    let resolved = resolver
        .resolve(&LANGUAGE_SERVER, &context(None, Some(&root)))
        .unwrap();

    assert_eq!(resolved.path, bundled);
    assert_eq!(resolved.step, ResolutionStep::Bundled);
}

#[test]
fn test_sibling_checkout_release_build() {
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("ext");
    let root = dir.path().join("ws");
    fs::create_dir_all(&root).unwrap();
    let sibling = dir
        .path()
        .join("sif")
        .join("build")
        .join("release")
        .join("sif");
    touch(&sibling);

    let resolver = Resolver::new(&install).with_platform(linux());
    let resolved = resolver
        .resolve(&INTERPRETER, &context(None, Some(&root)))
        .unwrap();

    assert_eq!(resolved.path, sibling);
    assert_eq!(resolved.step, ResolutionStep::Workspace);
}

#[test]
fn test_workspace_debug_before_release() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ws");
    let debug = root.join("build").join("debug").join("sif");
    touch(&debug);
    touch(&root.join("build").join("release").join("sif"));

    let resolver = Resolver::new(dir.path().join("ext")).with_platform(linux());
    let resolved = resolver
        .resolve(&INTERPRETER, &context(None, Some(&root)))
        .unwrap();

    assert_eq!(resolved.path, debug);
}

#[test]
fn test_configured_path_is_not_probed() {
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("ext");
    touch(&install.join("bin").join("linux-x64").join("sif"));

    let resolver = Resolver::new(&install).with_platform(linux());
    let resolved = resolver
        .resolve(&INTERPRETER, &context(Some("/does/not/exist/sif"), None))
        .unwrap();

    assert_eq!(resolved.path, PathBuf::from("/does/not/exist/sif"));
    assert_eq!(resolved.step, ResolutionStep::Configured);
}

#[test]
fn test_directory_is_not_an_executable() {
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("ext");
    fs::create_dir_all(install.join("bin").join("linux-x64").join("sif_lsp")).unwrap();

    let resolver = Resolver::new(&install).with_platform(linux());
    let result = resolver.resolve(&LANGUAGE_SERVER, &context(None, None));

    assert!(matches!(result, Err(ResolveError::NotFound { .. })));
}

#[test]
fn test_unsupported_platform_falls_through_to_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("ext");
    let root = dir.path().join("ws");
    touch(&install.join("bin").join("linux-x64").join("sif_lsp"));
    let debug = root.join("build").join("debug").join("sif_lsp");
    touch(&debug);

    let resolver = Resolver::new(&install).with_platform(Platform::new("linux", "aarch64"));
    let resolved = resolver
        .resolve(&LANGUAGE_SERVER, &context(None, Some(&root)))
        .unwrap();

    assert_eq!(resolved.path, debug);
}

#[test]
fn test_windows_bundled_binary_has_exe_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("ext");
    let bundled = install.join("bin").join("win32-x64").join("sif.exe");
    touch(&bundled);

    let resolver = Resolver::new(&install).with_platform(Platform::new("windows", "x86_64"));
    let resolved = resolver
        .resolve(&INTERPRETER, &context(None, None))
        .unwrap();

    assert_eq!(resolved.path, bundled);
}

#[test]
fn test_not_found_names_configuration_key() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = Resolver::new(dir.path().join("ext")).with_platform(linux());

    let err = resolver
        .resolve(&INTERPRETER, &context(Some(""), Some(dir.path())))
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Sif interpreter not found. Please set \"sif.interpreter.path\" in settings."
    );
}

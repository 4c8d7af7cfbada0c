// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Language client lifecycle against the `mock-sif-lsp` server.
//!
//! The mock is launched through a small shell wrapper so each test can pass
//! its own environment to the server process.

#![cfg(unix)]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Tests use expect/unwrap for clear failure messages"
)]

use anyhow::Result;
use std::cell::RefCell;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use sif_shim::host::{Document, EditorHost, Terminal};
use sif_shim::lifecycle::{ClientLifecycle, LifecycleState, STARTED_MESSAGE};
use sif_shim::lsp::WatchedFileEvent;
use sif_shim::resolver::{Platform, Resolver};

const MOCK: &str = env!("CARGO_BIN_EXE_mock-sif-lsp");
const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Host that records notifications and answers configuration from a map.
#[derive(Default)]
struct RecordingHost {
    server_path: Option<String>,
    roots: Vec<PathBuf>,
    errors: RefCell<Vec<String>>,
    infos: RefCell<Vec<String>>,
}

impl EditorHost for RecordingHost {
    fn configuration(&self, key: &str) -> Option<String> {
        match key {
            "sif.languageServer.path" => self.server_path.clone(),
            _ => None,
        }
    }

    fn workspace_folders(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }

    fn active_document(&self) -> Option<Document> {
        None
    }

    fn save_document(&self, _document: &Document) -> Result<()> {
        Ok(())
    }

    fn create_terminal(&self, name: &str, _cwd: &Path) -> Result<Box<dyn Terminal>> {
        anyhow::bail!("no terminal for {name}")
    }

    fn show_error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }

    fn show_info(&self, message: &str) {
        self.infos.borrow_mut().push(message.to_string());
    }
}

/// A workspace with a wrapper script that runs the mock server.
struct Fixture {
    dir: TempDir,
    host: RecordingHost,
}

impl Fixture {
    fn new(env: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("server.log");
        let script = dir.path().join("sif_lsp");

        let mut body = String::from("#!/bin/sh\n");
        body.push_str(&format!("export MOCK_SIF_LSP_LOG='{}'\n", log.display()));
        for (key, value) in env {
            body.push_str(&format!("export {key}='{value}'\n"));
        }
        body.push_str(&format!("exec '{MOCK}'\n"));
        fs::write(&script, body).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let root = dir.path().join("ws");
        fs::create_dir_all(&root).unwrap();

        let host = RecordingHost {
            server_path: Some(script.display().to_string()),
            roots: vec![root],
            ..RecordingHost::default()
        };
        Self { dir, host }
    }

    fn lifecycle(&self) -> ClientLifecycle {
        ClientLifecycle::new(
            Resolver::new(self.dir.path().join("ext")).with_platform(Platform::new("linux", "x86_64")),
        )
    }

    fn log(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("server.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    async fn wait_for_log(&self, line: &str) {
        let deadline = Instant::now() + READY_TIMEOUT;
        while !self.log().iter().any(|l| l == line) {
            assert!(Instant::now() < deadline, "server never logged {line:?}");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

async fn wait_while_starting(lifecycle: &ClientLifecycle) -> LifecycleState {
    let deadline = Instant::now() + READY_TIMEOUT;
    while lifecycle.state() == LifecycleState::Starting && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    lifecycle.state()
}

#[tokio::test]
async fn test_activate_runs_and_deactivate_stops() {
    let fixture = Fixture::new(&[]);
    let mut lifecycle = fixture.lifecycle();
    assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);

    let state = lifecycle.activate(&fixture.host);
    assert!(matches!(
        state,
        LifecycleState::Starting | LifecycleState::Running
    ));
    assert_eq!(*fixture.host.infos.borrow(), vec![STARTED_MESSAGE]);
    assert!(fixture.host.errors.borrow().is_empty());

    assert_eq!(wait_while_starting(&lifecycle).await, LifecycleState::Running);

    let stop = lifecycle.deactivate().expect("a client to stop");
    stop.await.unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);

    assert_eq!(
        fixture.log(),
        vec!["initialize", "initialized", "shutdown", "exit"]
    );
}

#[tokio::test]
async fn test_missing_server_reports_error_and_deactivate_is_noop() {
    let fixture = Fixture::new(&[]);
    let host = RecordingHost {
        server_path: None,
        roots: vec![fixture.dir.path().join("ws")],
        ..RecordingHost::default()
    };
    let mut lifecycle = fixture.lifecycle();

    let state = lifecycle.activate(&host);

    assert_eq!(state, LifecycleState::Uninitialized);
    assert_eq!(
        *host.errors.borrow(),
        vec!["Sif language server not found. Please set \"sif.languageServer.path\" in settings."]
    );
    assert!(host.infos.borrow().is_empty());
    assert!(lifecycle.client().is_none());
    assert!(lifecycle.deactivate().is_none());
    assert!(lifecycle.deactivate().is_none());
}

#[tokio::test]
async fn test_configured_server_is_started_without_probing() {
    let fixture = Fixture::new(&[]);
    let host = RecordingHost {
        server_path: Some("/custom/path/lsp".to_string()),
        roots: vec![fixture.dir.path().join("ws")],
        ..RecordingHost::default()
    };
    let mut lifecycle = fixture.lifecycle();

    lifecycle.activate(&host);

    let client = lifecycle.client().expect("a client for the configured path");
    assert_eq!(client.server(), Path::new("/custom/path/lsp"));
    assert_eq!(*host.infos.borrow(), vec![STARTED_MESSAGE]);
    assert!(host.errors.borrow().is_empty());

    assert_eq!(wait_while_starting(&lifecycle).await, LifecycleState::Stopped);

    let stop = lifecycle.deactivate().expect("the failed client to be released");
    stop.await.unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_deactivate_twice_stops_once() {
    let fixture = Fixture::new(&[]);
    let mut lifecycle = fixture.lifecycle();
    lifecycle.activate(&fixture.host);

    let first = lifecycle.deactivate();
    let second = lifecycle.deactivate();

    assert!(first.is_some());
    assert!(second.is_none());
    first.unwrap().await.unwrap();

    let shutdowns = fixture.log().iter().filter(|l| *l == "shutdown").count();
    assert_eq!(shutdowns, 1);
}

#[tokio::test]
async fn test_deactivate_while_starting_waits_for_start() {
    let fixture = Fixture::new(&[("MOCK_SIF_LSP_INIT_DELAY_MS", "300")]);
    let mut lifecycle = fixture.lifecycle();

    assert_eq!(lifecycle.activate(&fixture.host), LifecycleState::Starting);

    let stop = lifecycle.deactivate().unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    stop.await.unwrap();

    let log = fixture.log();
    assert_eq!(log.first().map(String::as_str), Some("initialize"));
    assert!(log.iter().any(|l| l == "shutdown"));
}

#[tokio::test]
async fn test_failed_initialize_stops_client() {
    let fixture = Fixture::new(&[("MOCK_SIF_LSP_FAIL_INITIALIZE", "true")]);
    let mut lifecycle = fixture.lifecycle();

    lifecycle.activate(&fixture.host);
    assert_eq!(wait_while_starting(&lifecycle).await, LifecycleState::Stopped);

    lifecycle.deactivate().unwrap().await.unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_activate_after_deactivate_is_ignored() {
    let fixture = Fixture::new(&[]);
    let mut lifecycle = fixture.lifecycle();
    lifecycle.activate(&fixture.host);
    lifecycle.deactivate().unwrap().await.unwrap();

    let state = lifecycle.activate(&fixture.host);

    assert_eq!(state, LifecycleState::Stopped);
    assert_eq!(fixture.host.infos.borrow().len(), 1);
    assert!(lifecycle.deactivate().is_none());
}

#[tokio::test]
async fn test_sif_file_events_are_forwarded() {
    let fixture = Fixture::new(&[]);
    let mut lifecycle = fixture.lifecycle();
    lifecycle.activate(&fixture.host);
    assert_eq!(wait_while_starting(&lifecycle).await, LifecycleState::Running);

    let ws = fixture.dir.path().join("ws");
    lifecycle
        .file_events(&[WatchedFileEvent::changed(ws.join("notes.txt"))])
        .await
        .unwrap();
    lifecycle
        .file_events(&[
            WatchedFileEvent::created(ws.join("src").join("main.sif")),
            WatchedFileEvent::deleted(ws.join("README.md")),
        ])
        .await
        .unwrap();

    lifecycle.deactivate().unwrap().await.unwrap();

    let forwarded = fixture
        .log()
        .iter()
        .filter(|l| *l == "workspace/didChangeWatchedFiles")
        .count();
    assert_eq!(forwarded, 1);
}

#[tokio::test]
async fn test_server_requests_are_rejected() {
    let fixture = Fixture::new(&[("MOCK_SIF_LSP_SERVER_REQUEST", "workspace/configuration")]);
    let mut lifecycle = fixture.lifecycle();
    lifecycle.activate(&fixture.host);

    fixture.wait_for_log("response -32601").await;

    lifecycle.deactivate().unwrap().await.unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_file_events_without_client_are_dropped() {
    let fixture = Fixture::new(&[]);
    let lifecycle = fixture.lifecycle();

    lifecycle
        .file_events(&[WatchedFileEvent::created("/ws/main.sif")])
        .await
        .unwrap();
    assert!(fixture.log().is_empty());
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The editor-facing language client.
//!
//! [`LanguageClient`] binds a server executable to a document selector and
//! a file-event pattern. `start` returns immediately; the process is spawned
//! and initialized on a tokio task, and readiness is observed through
//! [`LanguageClient::state`].

use anyhow::{Context, Result, bail};
use lsp_types::{DidChangeWatchedFilesParams, DocumentFilter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::client::{EXIT_TIMEOUT, LspClient};
use super::state::{ClientState, SharedState};
use super::watch::{FileEventFilter, WatchedFileEvent};
use crate::host::{SIF_EXTENSION, SIF_LANGUAGE_ID};

/// What a [`LanguageClient`] handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Client identifier.
    pub id: String,
    /// Human readable client name.
    pub name: String,
    /// Documents the client handles.
    pub document_selector: Vec<DocumentFilter>,
    /// Glob selecting file-watcher events forwarded to the server.
    pub file_events: String,
}

impl ClientOptions {
    /// Options for the Sif language server.
    #[must_use]
    pub fn sif() -> Self {
        Self {
            id: "sifLanguageServer".to_string(),
            name: "Sif Language Server".to_string(),
            document_selector: vec![DocumentFilter {
                language: Some(SIF_LANGUAGE_ID.to_string()),
                scheme: Some("file".to_string()),
                pattern: None,
            }],
            file_events: format!("**/*.{SIF_EXTENSION}"),
        }
    }
}

/// A language server process bound to editor documents.
pub struct LanguageClient {
    server: PathBuf,
    options: ClientOptions,
    watcher: FileEventFilter,
    state: Arc<SharedState>,
    inner: Arc<Mutex<Option<LspClient>>>,
    start_task: Option<JoinHandle<()>>,
}

impl LanguageClient {
    /// Creates a client for `server`, run with no arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the file-event pattern is not a valid glob.
    pub fn new(server: impl Into<PathBuf>, options: ClientOptions) -> Result<Self> {
        let watcher = FileEventFilter::new(&options.file_events)?;
        Ok(Self {
            server: server.into(),
            options,
            watcher,
            state: Arc::new(SharedState::new(ClientState::Starting)),
            inner: Arc::new(Mutex::new(None)),
            start_task: None,
        })
    }

    /// Path of the server executable.
    pub fn server(&self) -> &Path {
        &self.server
    }

    /// Options the client was created with.
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Current readiness.
    pub fn state(&self) -> ClientState {
        self.state.get()
    }

    /// Spawns and initializes the server in the background.
    ///
    /// Must be called from within a tokio runtime. The client is `Running`
    /// once the initialize handshake completes, or `Stopped` if it failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was already started or no runtime is
    /// available.
    pub fn start(&mut self, root: Option<PathBuf>) -> Result<()> {
        if self.start_task.is_some() {
            bail!("{} already started", self.options.name);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .context("No async runtime available to start the language client")?;

        let server = self.server.clone();
        let name = self.options.name.clone();
        let state = self.state.clone();
        let inner = self.inner.clone();

        info!(
            "Starting {}: {} (watching {})",
            name,
            server.display(),
            self.watcher.pattern()
        );
        self.start_task = Some(runtime.spawn(async move {
            match launch(&server, root.as_deref()).await {
                Ok(client) => {
                    *inner.lock().await = Some(client);
                    if state.transition(ClientState::Starting, ClientState::Running) {
                        info!("{} ready", name);
                    }
                }
                Err(e) => {
                    error!("Failed to start {}: {:#}", name, e);
                    state.set(ClientState::Stopped);
                }
            }
        }));

        Ok(())
    }

    /// Forwards watcher events matching the file-event pattern.
    ///
    /// Events arriving before the server is ready are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be written.
    pub async fn file_events(&self, events: &[WatchedFileEvent]) -> Result<()> {
        let changes = self.watcher.select(events);
        if changes.is_empty() {
            return Ok(());
        }

        let inner = self.inner.lock().await;
        match inner.as_ref() {
            Some(client) if client.is_alive() => {
                debug!("Forwarding {} file events", changes.len());
                client
                    .did_change_watched_files(DidChangeWatchedFilesParams { changes })
                    .await
            }
            _ => {
                debug!("Dropping {} file events, server not ready", changes.len());
                Ok(())
            }
        }
    }

    /// Stops the server, waiting for an in-flight start to settle first.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown handshake fails; the process is
    /// still reaped or killed.
    pub async fn stop(self) -> Result<()> {
        let Self {
            options,
            state,
            inner,
            start_task,
            ..
        } = self;

        if let Some(task) = start_task
            && let Err(e) = task.await
        {
            warn!("{} start task ended abnormally: {}", options.name, e);
        }

        let client = inner.lock().await.take();
        state.set(ClientState::Stopped);

        let Some(mut client) = client else {
            debug!("{} was never running", options.name);
            return Ok(());
        };

        let result = if client.is_alive() {
            client.shutdown().await
        } else {
            Ok(())
        };
        client.wait_for_exit(EXIT_TIMEOUT).await;

        info!("{} stopped", options.name);
        result
    }
}

async fn launch(server: &Path, root: Option<&Path>) -> Result<LspClient> {
    let mut client = LspClient::spawn(server, &[])?;
    client.initialize(root).await?;
    Ok(client)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;

    #[test]
    fn test_sif_options() {
        let options = ClientOptions::sif();
        assert_eq!(options.file_events, "**/*.sif");
        assert_eq!(options.document_selector.len(), 1);
        assert_eq!(options.document_selector[0].language.as_deref(), Some("sif"));

        let client = LanguageClient::new("/bin/sif_lsp", options).unwrap();
        assert_eq!(client.watcher.pattern(), "**/*.sif");
    }

    #[test]
    fn test_new_client_is_starting_without_process() {
        let client = LanguageClient::new("/bin/sif_lsp", ClientOptions::sif()).unwrap();
        assert_eq!(client.state(), ClientState::Starting);
        assert_eq!(client.server(), Path::new("/bin/sif_lsp"));
    }

    #[test]
    fn test_start_requires_runtime() {
        let mut client = LanguageClient::new("/bin/sif_lsp", ClientOptions::sif()).unwrap();
        assert!(client.start(None).is_err());
    }

    #[tokio::test]
    async fn test_missing_server_stops_client() {
        let dir = tempfile::tempdir().unwrap();
        let mut client =
            LanguageClient::new(dir.path().join("no_such_lsp"), ClientOptions::sif()).unwrap();

        client.start(None).unwrap();
        assert!(client.start(None).is_err());

        // stop waits for the failed start to settle
        let state = client.state.clone();
        client.stop().await.unwrap();
        assert_eq!(state.get(), ClientState::Stopped);
    }
}

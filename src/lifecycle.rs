// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Activation and deactivation of the Sif language client.
//!
//! [`ClientLifecycle`] owns the single language client of the process. The
//! client is created on a successful [`activate`](ClientLifecycle::activate)
//! and released exactly once by [`deactivate`](ClientLifecycle::deactivate).
//! Host events arrive one at a time, so the handle needs no locking.
//!
//! ```text
//! Uninitialized ──activate──▶ Starting ──handshake──▶ Running
//!       │                         │                      │
//!       │ (server not found)      └──────deactivate──────┴──▶ Stopped
//!       ▼
//! Uninitialized (deactivate is a no-op)
//! ```

use anyhow::{Result, bail};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, error, info, warn};

use crate::command::{self, RUN_CURRENT_FILE};
use crate::host::EditorHost;
use crate::lsp::{ClientOptions, ClientState, LanguageClient, WatchedFileEvent};
use crate::resolver::{FsProbe, LANGUAGE_SERVER, Probe, ResolveContext, Resolver};

/// Message shown once the language client start has been issued.
pub const STARTED_MESSAGE: &str = "Sif Language Server started!";

/// Commands registered on activation.
pub const COMMANDS: &[&str] = &[RUN_CURRENT_FILE];

/// Completion of a client shutdown, awaited by the host.
pub type StopFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Lifecycle of the language client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// No client exists.
    Uninitialized,
    /// Client start issued, handshake not yet complete.
    Starting,
    /// Server is ready.
    Running,
    /// Deactivated, or the server failed to start. Terminal.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Owner of the process-wide language client.
pub struct ClientLifecycle<P = FsProbe> {
    resolver: Resolver<P>,
    client: Option<LanguageClient>,
    deactivated: bool,
}

impl<P: Probe> ClientLifecycle<P> {
    /// Creates an inactive lifecycle using `resolver` for tool lookups.
    pub const fn new(resolver: Resolver<P>) -> Self {
        Self {
            resolver,
            client: None,
            deactivated: false,
        }
    }

    /// The resolver used for tool lookups.
    pub const fn resolver(&self) -> &Resolver<P> {
        &self.resolver
    }

    /// The live client, if one was created.
    pub const fn client(&self) -> Option<&LanguageClient> {
        self.client.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        if self.deactivated {
            return LifecycleState::Stopped;
        }
        match &self.client {
            None => LifecycleState::Uninitialized,
            Some(client) => match client.state() {
                ClientState::Starting => LifecycleState::Starting,
                ClientState::Running => LifecycleState::Running,
                ClientState::Stopped => LifecycleState::Stopped,
            },
        }
    }

    /// Resolves the language server and starts the client.
    ///
    /// Failures are reported to the host and leave no client behind. The
    /// run command stays available whatever the outcome. Must be called from
    /// within a tokio runtime for the client to start.
    pub fn activate(&mut self, host: &dyn EditorHost) -> LifecycleState {
        if self.deactivated {
            warn!("Ignoring activation after deactivation");
            return self.state();
        }
        if self.client.is_some() {
            debug!("Language client already active");
            return self.state();
        }

        debug!("Registered commands: {}", COMMANDS.join(", "));

        let ctx = ResolveContext::from_host(host, &LANGUAGE_SERVER);
        let server = match self.resolver.resolve(&LANGUAGE_SERVER, &ctx) {
            Ok(server) => server,
            Err(e) => {
                warn!("{}", e);
                host.show_error(&e.to_string());
                return self.state();
            }
        };

        let mut client = match LanguageClient::new(server.path, ClientOptions::sif()) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to create language client: {:#}", e);
                host.show_error(&format!("Failed to create Sif language client: {e}"));
                return self.state();
            }
        };

        if let Err(e) = client.start(ctx.workspace_root) {
            error!("Failed to start language client: {:#}", e);
            host.show_error(&format!("Failed to start Sif language server: {e}"));
            return self.state();
        }

        self.client = Some(client);
        host.show_info(STARTED_MESSAGE);
        self.state()
    }

    /// Stops the client, if one exists.
    ///
    /// Returns `None` when there is nothing to stop; this holds for any
    /// number of calls. Otherwise the returned future completes once the
    /// server has shut down.
    pub fn deactivate(&mut self) -> Option<StopFuture> {
        let client = self.client.take()?;
        self.deactivated = true;
        info!("Deactivating {}", client.options().name);
        Some(Box::pin(client.stop()))
    }

    /// Forwards file-watcher events to the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be delivered.
    pub async fn file_events(&self, events: &[WatchedFileEvent]) -> Result<()> {
        match &self.client {
            Some(client) => client.file_events(events).await,
            None => Ok(()),
        }
    }

    /// Runs the `run-current-file` command.
    ///
    /// # Errors
    ///
    /// See [`command::run_current_file`].
    pub fn run_current_file(&self, host: &dyn EditorHost) -> Result<()> {
        command::run_current_file(host, &self.resolver)
    }

    /// Dispatches a registered command by id.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown commands, or the command's own error.
    pub fn execute_command(&self, command: &str, host: &dyn EditorHost) -> Result<()> {
        match command {
            RUN_CURRENT_FILE => self.run_current_file(host),
            other => bail!("Unknown command: {other}"),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;
    use crate::host::{Document, Terminal};
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    #[derive(Default)]
    struct NoToolsHost {
        errors: RefCell<Vec<String>>,
    }

    impl EditorHost for NoToolsHost {
        fn configuration(&self, _key: &str) -> Option<String> {
            None
        }

        fn workspace_folders(&self) -> Vec<PathBuf> {
            Vec::new()
        }

        fn active_document(&self) -> Option<Document> {
            None
        }

        fn save_document(&self, _document: &Document) -> Result<()> {
            Ok(())
        }

        fn create_terminal(&self, _name: &str, _cwd: &Path) -> Result<Box<dyn Terminal>> {
            bail!("no terminals")
        }

        fn show_error(&self, message: &str) {
            self.errors.borrow_mut().push(message.to_string());
        }

        fn show_info(&self, _message: &str) {}
    }

    fn lifecycle() -> ClientLifecycle {
        let dir = std::env::temp_dir().join("sif-shim-no-such-install");
        ClientLifecycle::new(
            Resolver::new(dir).with_platform(crate::resolver::Platform::new("plan9", "mips")),
        )
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(LifecycleState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(
            serde_json::to_string(&LifecycleState::Running).unwrap(),
            "\"running\""
        );
    }

    #[test]
    fn test_deactivate_without_client_is_noop() {
        let mut lifecycle = lifecycle();
        assert!(lifecycle.deactivate().is_none());
        assert!(lifecycle.deactivate().is_none());
        assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_activate_without_server_reports_once() {
        let host = NoToolsHost::default();
        let mut lifecycle = lifecycle();

        assert_eq!(lifecycle.activate(&host), LifecycleState::Uninitialized);
        assert_eq!(host.errors.borrow().len(), 1);
        assert!(host.errors.borrow()[0].contains("sif.languageServer.path"));
        assert!(lifecycle.client().is_none());
    }

    #[test]
    fn test_run_command_is_registered() {
        assert!(COMMANDS.contains(&RUN_CURRENT_FILE));

        let host = NoToolsHost::default();
        assert!(lifecycle().execute_command("bogus", &host).is_err());
        assert!(lifecycle().execute_command(RUN_CURRENT_FILE, &host).is_err());
        assert_eq!(*host.errors.borrow(), vec!["No active Sif file."]);
    }
}

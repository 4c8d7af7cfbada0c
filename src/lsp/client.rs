/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result, anyhow};
use bytes::BytesMut;
use lsp_types::{
    ClientCapabilities, ClientInfo, DidChangeWatchedFilesClientCapabilities,
    DidChangeWatchedFilesParams, InitializeParams, InitializeResult, InitializedParams,
    WorkspaceClientCapabilities, WorkspaceFolder,
};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, trace, warn};

use super::protocol::{self, NotificationMessage, RequestId, RequestMessage, ResponseMessage};
use super::watch::directory_uri;

/// Default timeout for LSP requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for the server to exit after `exit` before killing it.
pub const EXIT_TIMEOUT: Duration = Duration::from_secs(2);

type PendingRequests = Arc<Mutex<HashMap<RequestId, oneshot::Sender<ResponseMessage>>>>;

/// Manages communication with an LSP server process.
pub struct LspClient {
    next_id: AtomicI64,
    stdin: Arc<Mutex<ChildStdin>>,
    pending: PendingRequests,
    alive: Arc<AtomicBool>,
    _reader_handle: tokio::task::JoinHandle<()>,
    child: Child,
}

impl LspClient {
    /// Spawns the LSP server process and starts the response reader task.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or its standard
    /// streams cannot be captured.
    pub fn spawn(program: &Path, args: &[&str]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn LSP server: {}", program.display()))?;

        let stdin = child.stdin.take().context("LSP server stdin not captured")?;
        let stdout = child
            .stdout
            .take()
            .context("LSP server stdout not captured")?;

        let stdin = Arc::new(Mutex::new(stdin));
        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let reader_handle = tokio::spawn(Self::reader_task(
            stdin.clone(),
            stdout,
            pending.clone(),
            alive.clone(),
        ));

        Ok(Self {
            next_id: AtomicI64::new(1),
            stdin,
            pending,
            alive,
            _reader_handle: reader_handle,
            child,
        })
    }

    /// Background task that reads LSP messages and routes responses to pending requests.
    async fn reader_task(
        stdin: Arc<Mutex<ChildStdin>>,
        stdout: ChildStdout,
        pending: PendingRequests,
        alive: Arc<AtomicBool>,
    ) {
        let mut reader = BufReader::new(stdout);
        let mut buffer = BytesMut::with_capacity(8192);

        loop {
            let mut temp = [0u8; 4096];
            match reader.read(&mut temp).await {
                Ok(0) => {
                    debug!("LSP stdout closed");
                    break;
                }
                Ok(n) => buffer.extend_from_slice(&temp[..n]),
                Err(e) => {
                    error!("Error reading from LSP stdout: {}", e);
                    break;
                }
            }

            loop {
                let message = match protocol::try_parse_message(&mut buffer) {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Dropping malformed LSP frame: {:#}", e);
                        continue;
                    }
                };
                trace!("Received LSP message: {}", message);

                let value: serde_json::Value = match serde_json::from_str(&message) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("Failed to parse JSON: {}", e);
                        continue;
                    }
                };

                if let Some(method) = value.get("method").and_then(|m| m.as_str()) {
                    if let Some(id) = value.get("id") {
                        // The shim registers no server-side capabilities, so
                        // every server request is answered with MethodNotFound.
                        debug!("Received server request: {} (id: {})", method, id);
                        let id = serde_json::from_value(id.clone()).ok();
                        let reply = ResponseMessage::method_not_found(id, method);
                        if let Err(e) = Self::write_message(&stdin, &reply).await {
                            warn!("Failed to reply to server request {}: {}", method, e);
                        }
                    } else if let Ok(notification) =
                        serde_json::from_value::<NotificationMessage>(value)
                    {
                        Self::handle_notification(&notification);
                    }
                } else if value.get("id").is_some() {
                    if let Ok(response) = serde_json::from_value::<ResponseMessage>(value)
                        && let Some(id) = response.id.clone()
                    {
                        let sender = pending.lock().await.remove(&id);
                        match sender {
                            Some(sender) => {
                                let _ = sender.send(response);
                            }
                            None => warn!("Received response for unknown request id: {:?}", id),
                        }
                    }
                } else {
                    warn!("Unknown message format: {}", message);
                }
            }
        }

        alive.store(false, Ordering::SeqCst);
        // Fail outstanding requests instead of leaving them to time out.
        pending.lock().await.clear();
        debug!("LSP reader task exiting");
    }

    /// Handles incoming LSP notifications.
    fn handle_notification(notification: &NotificationMessage) {
        match notification.method.as_str() {
            "window/logMessage" | "window/showMessage" => {
                if let Some(message) = notification.params.get("message").and_then(|m| m.as_str()) {
                    debug!("LSP server message: {}", message);
                }
            }
            _ => {
                trace!(
                    "Ignoring notification: {} params={}",
                    notification.method, notification.params
                );
            }
        }
    }

    /// Sends a request and waits for the response with timeout.
    async fn request<P: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = RequestMessage::new(id.clone(), method, serde_json::to_value(params)?);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        Self::write_message(&self.stdin, &request).await?;

        let response = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(anyhow!("LSP server closed connection")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(anyhow!(
                    "LSP request '{}' timed out after {:?}",
                    method,
                    REQUEST_TIMEOUT
                ));
            }
        };

        if let Some(error) = response.error {
            return Err(anyhow!("LSP error {}: {}", error.code, error.message));
        }

        let result = response.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).context("Failed to parse LSP response")
    }

    /// Sends a notification (no response expected).
    async fn notify<P: serde::Serialize>(&self, method: &str, params: P) -> Result<()> {
        let notification = NotificationMessage::new(method, serde_json::to_value(params)?);
        Self::write_message(&self.stdin, &notification).await
    }

    /// Writes a framed JSON-RPC message to the server.
    async fn write_message<T: serde::Serialize>(
        stdin: &Mutex<ChildStdin>,
        message: &T,
    ) -> Result<()> {
        let body = serde_json::to_string(message)?;
        trace!("Sending LSP message: {}", body);

        let mut stdin = stdin.lock().await;
        stdin.write_all(protocol::frame(&body).as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Performs the LSP initialize handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, or the server
    /// answers with an error.
    pub async fn initialize(&mut self, root: Option<&Path>) -> Result<InitializeResult> {
        let workspace_folders = match root {
            Some(root) => Some(vec![WorkspaceFolder {
                uri: directory_uri(root)?,
                name: root
                    .file_name()
                    .map_or_else(|| "workspace".to_string(), |s| s.to_string_lossy().to_string()),
            }]),
            None => None,
        };

        let params = InitializeParams {
            process_id: Some(std::process::id()),
            client_info: Some(ClientInfo {
                name: "sif-shim".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ClientCapabilities {
                workspace: Some(WorkspaceClientCapabilities {
                    did_change_watched_files: Some(DidChangeWatchedFilesClientCapabilities {
                        dynamic_registration: Some(false),
                        ..Default::default()
                    }),
                    workspace_folders: Some(workspace_folders.is_some()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            workspace_folders,
            ..Default::default()
        };

        let result: InitializeResult = self.request("initialize", params).await?;
        self.notify("initialized", InitializedParams {}).await?;

        Ok(result)
    }

    /// Sends shutdown request and exit notification.
    ///
    /// # Errors
    ///
    /// Returns an error if either message cannot be delivered.
    pub async fn shutdown(&mut self) -> Result<()> {
        // shutdown response varies by server (null, true, etc.) - ignore result
        let _: serde_json::Value = self.request("shutdown", serde_json::Value::Null).await?;
        self.notify("exit", serde_json::Value::Null).await?;
        Ok(())
    }

    /// Forwards file-watcher events to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be written.
    pub async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) -> Result<()> {
        self.notify("workspace/didChangeWatchedFiles", params).await
    }

    /// Waits up to `timeout` for the server process to exit, killing it otherwise.
    pub async fn wait_for_exit(&mut self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => debug!("LSP server exited with {}", status),
            Ok(Err(e)) => warn!("Failed to wait for LSP server: {}", e),
            Err(_) => {
                warn!("LSP server did not exit within {:?}, killing it", timeout);
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to kill LSP server: {}", e);
                }
            }
        }
    }

    /// Returns true if the LSP server connection is still alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

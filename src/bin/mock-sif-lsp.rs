// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! A mock Sif language server for testing.
//!
//! Speaks the LSP protocol over stdin/stdout using Content-Length framed
//! JSON-RPC. Every message it receives is appended to a log file so tests
//! can observe the client's traffic. No tokio.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mock Sif language server for integration testing.
#[derive(Parser, Debug)]
#[command(name = "mock-sif-lsp")]
struct Args {
    /// Append the name of every received message to this file.
    #[arg(long, env = "MOCK_SIF_LSP_LOG")]
    log: Option<PathBuf>,

    /// Sleep before answering `initialize` (milliseconds).
    #[arg(long, env = "MOCK_SIF_LSP_INIT_DELAY_MS", default_value_t = 0)]
    init_delay: u64,

    /// Answer `initialize` with `InternalError`.
    #[arg(long, env = "MOCK_SIF_LSP_FAIL_INITIALIZE")]
    fail_initialize: bool,

    /// Send a request with this method to the client after `initialized`.
    #[arg(long, env = "MOCK_SIF_LSP_SERVER_REQUEST")]
    server_request: Option<String>,
}

/// An incoming JSON-RPC message: request, notification or response.
#[derive(Debug, Deserialize)]
struct Incoming {
    id: Option<Value>,
    method: Option<String>,
    error: Option<RpcError>,
}

/// A JSON-RPC response.
#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Shared state for the mock server.
struct MockServer {
    args: Args,
    log: Option<File>,
    writer: Box<dyn Write>,
    shutdown_requested: bool,
}

/// What the server loop should do after a message.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit(i32),
}

impl MockServer {
    fn new(args: Args, writer: Box<dyn Write>) -> std::io::Result<Self> {
        let log = args
            .log
            .as_ref()
            .map(|path| OpenOptions::new().create(true).append(true).open(path))
            .transpose()?;
        Ok(Self {
            args,
            log,
            writer,
            shutdown_requested: false,
        })
    }

    /// Run the server until `exit` or end of input; returns the exit code.
    fn run(&mut self, reader: &mut dyn Read) -> i32 {
        let mut buffer = Vec::new();
        let mut temp = [0u8; 4096];

        loop {
            match reader.read(&mut temp) {
                Ok(0) | Err(_) => return 1,
                Ok(n) => buffer.extend_from_slice(&temp[..n]),
            }

            while let Some((message, consumed)) = try_parse_message(&buffer) {
                buffer.drain(..consumed);

                let Ok(incoming) = serde_json::from_str::<Incoming>(&message) else {
                    continue;
                };

                if let Flow::Exit(code) = self.handle_message(incoming) {
                    return code;
                }
            }
        }
    }

    fn handle_message(&mut self, incoming: Incoming) -> Flow {
        let Some(method) = incoming.method else {
            // A response to one of our requests.
            let line = incoming
                .error
                .map_or_else(|| "response".to_string(), |e| format!("response {}", e.code));
            self.record(&line);
            return Flow::Continue;
        };

        self.record(&method);

        match incoming.id {
            Some(id) => {
                self.handle_request(&method, id);
                Flow::Continue
            }
            None => self.handle_notification(&method),
        }
    }

    fn handle_request(&mut self, method: &str, id: Value) {
        let (result, error) = match method {
            "initialize" => {
                if self.args.init_delay > 0 {
                    std::thread::sleep(Duration::from_millis(self.args.init_delay));
                }
                if self.args.fail_initialize {
                    (
                        None,
                        Some(RpcError {
                            code: -32603,
                            message: "mock-sif-lsp: configured to fail on initialize".to_string(),
                        }),
                    )
                } else {
                    (Some(initialize_result()), None)
                }
            }
            "shutdown" => {
                self.shutdown_requested = true;
                (Some(Value::Null), None)
            }
            _ => (
                None,
                Some(RpcError {
                    code: -32601,
                    message: format!("mock-sif-lsp: method not found: {method}"),
                }),
            ),
        };

        self.send(&Response {
            jsonrpc: "2.0",
            id,
            result,
            error,
        });
    }

    fn handle_notification(&mut self, method: &str) -> Flow {
        match method {
            "initialized" => {
                if let Some(request) = self.args.server_request.clone() {
                    let message = serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "method": request,
                        "params": {}
                    });
                    self.send(&message);
                }
                Flow::Continue
            }
            "exit" => Flow::Exit(if self.shutdown_requested { 0 } else { 1 }),
            // workspace/didChangeWatchedFiles and all others are only recorded
            _ => Flow::Continue,
        }
    }

    fn record(&mut self, line: &str) {
        if let Some(log) = self.log.as_mut() {
            let _ = writeln!(log, "{line}");
        }
    }

    fn send(&mut self, value: &impl Serialize) {
        let Ok(json) = serde_json::to_string(value) else {
            return;
        };
        let header = format!("Content-Length: {}\r\n\r\n", json.len());
        let _ = self.writer.write_all(header.as_bytes());
        let _ = self.writer.write_all(json.as_bytes());
        let _ = self.writer.flush();
    }
}

fn initialize_result() -> Value {
    serde_json::json!({
        "capabilities": {
            "textDocumentSync": 1
        },
        "serverInfo": {
            "name": "mock-sif-lsp",
            "version": "0.1.0"
        }
    })
}

/// Parse a Content-Length framed message from a buffer.
/// Returns the message string and the number of bytes consumed.
fn try_parse_message(buffer: &[u8]) -> Option<(String, usize)> {
    let header_end = buffer.windows(4).position(|w| w == b"\r\n\r\n")?;
    let headers = std::str::from_utf8(&buffer[..header_end]).ok()?;

    let content_length: usize = headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })?;

    let total = header_end + 4 + content_length;
    if buffer.len() < total {
        return None;
    }

    let body = std::str::from_utf8(&buffer[header_end + 4..total]).ok()?;
    Some((body.to_string(), total))
}

fn main() {
    let args = Args::parse();
    let code = match MockServer::new(args, Box::new(std::io::stdout())) {
        Ok(mut server) => server.run(&mut std::io::stdin().lock()),
        Err(_) => 2,
    };
    std::process::exit(code);
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Tests use expect/unwrap for clear failure messages"
)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    struct SharedVecWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedVecWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .map_err(|e| std::io::Error::other(e.to_string()))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn args(log: Option<PathBuf>) -> Args {
        Args {
            log,
            init_delay: 0,
            fail_initialize: false,
            server_request: None,
        }
    }

    fn frame(value: &Value) -> Vec<u8> {
        let body = value.to_string();
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    fn run_with(args: Args, messages: &[Value]) -> (i32, Vec<Value>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let mut server = MockServer::new(args, Box::new(SharedVecWriter(buf.clone()))).unwrap();
        let input: Vec<u8> = messages.iter().flat_map(frame).collect();
        let code = server.run(&mut Cursor::new(input));

        let mut data = buf.lock().unwrap().clone();
        let mut out = Vec::new();
        while let Some((msg, consumed)) = try_parse_message(&data) {
            out.push(serde_json::from_str(&msg).unwrap());
            data.drain(..consumed);
        }
        (code, out)
    }

    fn request(id: u64, method: &str) -> Value {
        serde_json::json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": {} })
    }

    fn notification(method: &str) -> Value {
        serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": {} })
    }

    #[test]
    fn test_clean_shutdown_exits_zero() {
        let (code, out) = run_with(
            args(None),
            &[
                request(1, "initialize"),
                notification("initialized"),
                request(2, "shutdown"),
                notification("exit"),
            ],
        );

        assert_eq!(code, 0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["result"]["serverInfo"]["name"], "mock-sif-lsp");
        assert_eq!(out[1]["result"], Value::Null);
    }

    #[test]
    fn test_exit_without_shutdown_is_error() {
        let (code, _) = run_with(args(None), &[notification("exit")]);
        assert_eq!(code, 1);
    }

    #[test]
    fn test_unknown_request_is_method_not_found() {
        let (_, out) = run_with(args(None), &[request(7, "textDocument/hover")]);
        assert_eq!(out[0]["id"], 7);
        assert_eq!(out[0]["error"]["code"], -32601);
    }

    #[test]
    fn test_fail_initialize() {
        let mut args = args(None);
        args.fail_initialize = true;
        let (_, out) = run_with(args, &[request(1, "initialize")]);
        assert_eq!(out[0]["error"]["code"], -32603);
    }

    #[test]
    fn test_server_request_after_initialized() {
        let mut args = args(None);
        args.server_request = Some("workspace/configuration".to_string());
        let (_, out) = run_with(args, &[request(1, "initialize"), notification("initialized")]);
        assert_eq!(out[1]["method"], "workspace/configuration");
    }

    #[test]
    fn test_log_records_methods_and_responses() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("mock.log");
        let response = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32601, "message": "nope" }
        });

        run_with(
            args(Some(log.clone())),
            &[
                request(1, "initialize"),
                notification("workspace/didChangeWatchedFiles"),
                response,
            ],
        );

        let lines = std::fs::read_to_string(&log).unwrap();
        assert_eq!(
            lines.lines().collect::<Vec<_>>(),
            vec![
                "initialize",
                "workspace/didChangeWatchedFiles",
                "response -32601"
            ]
        );
    }
}

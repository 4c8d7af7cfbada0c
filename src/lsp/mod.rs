// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Low-level LSP client for communicating with a server process.
pub mod client;
/// Editor-facing client: document selector, file events, background start.
pub mod language_client;
/// LSP message protocol definitions.
pub mod protocol;
/// Client readiness state.
pub mod state;
/// File-watcher event filtering.
pub mod watch;

pub use client::LspClient;
pub use language_client::{ClientOptions, LanguageClient};
pub use state::ClientState;
pub use watch::{FileEventFilter, WatchedFileEvent};

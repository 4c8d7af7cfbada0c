// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Editor integration shim for the Sif language.
//!
//! Locates the Sif language server and interpreter, manages the lifecycle of
//! the language client, and runs the active Sif file in a terminal.

/// Terminal-backed editor host and CLI utilities.
pub mod cli;
/// The `run-current-file` command.
pub mod command;
/// User settings under the `sif` namespace.
pub mod config;
/// Error taxonomy.
pub mod error;
/// The editor surface: configuration, documents, terminals, notifications.
pub mod host;
/// Activation and deactivation of the language client.
pub mod lifecycle;
/// LSP client implementation.
pub mod lsp;
/// Executable resolution.
pub mod resolver;

pub use error::{CommandError, ResolveError};
pub use lifecycle::{ClientLifecycle, LifecycleState};
pub use resolver::{Platform, ResolvedPath, Resolver};

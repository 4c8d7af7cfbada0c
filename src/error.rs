// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Error types surfaced to the editor as notifications.

use thiserror::Error;

/// Failure to locate a tool executable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No candidate path exists for the requested tool.
    #[error("{display_name} not found. Please set \"{configuration_key}\" in settings.")]
    NotFound {
        /// Logical tool name (e.g. `languageServer`).
        tool: &'static str,
        /// Human readable name used in the message.
        display_name: &'static str,
        /// Configuration key the user may set to fix the problem.
        configuration_key: &'static str,
    },
}

/// Preconditions of the `run-current-file` command that were not met.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// No editor is active.
    #[error("No active Sif file.")]
    NoActiveDocument,
    /// The active document is not a Sif document.
    #[error("Not a Sif file.")]
    NotSifDocument {
        /// Language id of the active document.
        language_id: String,
    },
    /// The interpreter could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

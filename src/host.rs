// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The editor surface the shim talks to.
//!
//! Everything the shim needs from the editor (configuration, workspace
//! folders, the active document, terminals and notifications) goes through
//! [`EditorHost`]. The editor integration and the `sif-shim` CLI each
//! provide an implementation.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Language identifier of Sif documents.
pub const SIF_LANGUAGE_ID: &str = "sif";

/// File extension of Sif source files.
pub const SIF_EXTENSION: &str = "sif";

/// A document open in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path of the file backing the document.
    pub path: PathBuf,
    /// Editor language identifier.
    pub language_id: String,
    /// Whether the buffer has unsaved changes.
    pub is_dirty: bool,
}

impl Document {
    /// Creates a clean document, deriving the language id from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let language_id = language_for_path(&path).to_string();
        Self {
            path,
            language_id,
            is_dirty: false,
        }
    }

    /// Whether this is a Sif document.
    #[must_use]
    pub fn is_sif(&self) -> bool {
        self.language_id == SIF_LANGUAGE_ID
    }
}

/// Maps a file path to an editor language identifier.
#[must_use]
pub fn language_for_path(path: &Path) -> &str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(SIF_EXTENSION) => SIF_LANGUAGE_ID,
        Some(ext) => ext,
        None => "plaintext",
    }
}

/// An interactive terminal created by the editor.
pub trait Terminal {
    /// Brings the terminal to the front.
    fn show(&mut self);

    /// Sends one line of input, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot accept input.
    fn send_text(&mut self, line: &str) -> Result<()>;
}

/// Services the editor provides to the shim.
pub trait EditorHost {
    /// Reads a configuration value by fully qualified key
    /// (e.g. `sif.languageServer.path`).
    fn configuration(&self, key: &str) -> Option<String>;

    /// Open workspace folders, in editor order.
    fn workspace_folders(&self) -> Vec<PathBuf>;

    /// The document in the active editor, if any.
    fn active_document(&self) -> Option<Document>;

    /// Persists the document's unsaved changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the save could not be issued.
    fn save_document(&self, document: &Document) -> Result<()>;

    /// Opens a terminal whose shell starts in `cwd`.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal could not be created.
    fn create_terminal(&self, name: &str, cwd: &Path) -> Result<Box<dyn Terminal>>;

    /// Shows an error notification.
    fn show_error(&self, message: &str);

    /// Shows an informational notification.
    fn show_info(&self, message: &str);
}

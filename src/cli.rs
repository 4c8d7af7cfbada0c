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

//! Terminal-backed editor host used by the `sif-shim` binary.

#![allow(clippy::print_stderr, reason = "The CLI host reports notifications on stderr")]

use anyhow::{Context, Result, anyhow};
use crossterm::tty::IsTty;
use std::cell::RefCell;
use std::io::stderr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::rc::Rc;
use tracing::debug;

use crate::config::Settings;
use crate::host::{Document, EditorHost, Terminal};

/// Configuration for color output
#[derive(Debug, Clone)]
pub struct ColorConfig {
    /// Whether ANSI colors are emitted.
    pub enabled: bool,
}

impl ColorConfig {
    /// Create a new `ColorConfig`, auto-detecting TTY unless nocolor is true
    #[must_use]
    pub fn new(nocolor: bool) -> Self {
        Self {
            enabled: !nocolor && stderr().is_tty(),
        }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }

    /// Green (success)
    #[must_use]
    pub fn green(&self, s: &str) -> String {
        self.paint("32", s)
    }

    /// Red (errors)
    #[must_use]
    pub fn red(&self, s: &str) -> String {
        self.paint("31", s)
    }

    /// Dim text
    #[must_use]
    pub fn dim(&self, s: &str) -> String {
        self.paint("2", s)
    }

    /// Bold text
    #[must_use]
    pub fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }
}

type Processes = Rc<RefCell<Vec<Child>>>;

/// An [`EditorHost`] backed by the command line.
///
/// Configuration comes from [`Settings`], workspace folders from `--root`,
/// and terminals run their input through the platform shell.
pub struct CliHost {
    settings: Settings,
    roots: Vec<PathBuf>,
    active: Option<Document>,
    colors: ColorConfig,
    processes: Processes,
}

impl CliHost {
    /// Creates a host with the given settings and workspace folders.
    #[must_use]
    pub fn new(settings: Settings, roots: Vec<PathBuf>, colors: ColorConfig) -> Self {
        Self {
            settings,
            roots,
            active: None,
            colors,
            processes: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Makes `document` the active document.
    #[must_use]
    pub fn with_active_document(mut self, document: Document) -> Self {
        self.active = Some(document);
        self
    }

    /// Waits for every process started through a terminal.
    ///
    /// Returns the status of the last one, if any was started.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on a process fails.
    pub fn wait_terminals(&self) -> Result<Option<ExitStatus>> {
        let mut last = None;
        for mut child in self.processes.borrow_mut().drain(..) {
            last = Some(child.wait().context("Failed to wait for terminal process")?);
        }
        Ok(last)
    }
}

impl EditorHost for CliHost {
    fn configuration(&self, key: &str) -> Option<String> {
        self.settings.get(key)
    }

    fn workspace_folders(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }

    fn active_document(&self) -> Option<Document> {
        self.active.clone()
    }

    fn save_document(&self, document: &Document) -> Result<()> {
        // Files given on the command line have no editor buffer.
        debug!("Nothing to save for {}", document.path.display());
        Ok(())
    }

    fn create_terminal(&self, name: &str, cwd: &Path) -> Result<Box<dyn Terminal>> {
        Ok(Box::new(ShellTerminal {
            name: name.to_string(),
            cwd: cwd.to_path_buf(),
            processes: self.processes.clone(),
        }))
    }

    fn show_error(&self, message: &str) {
        eprintln!("{} {}", self.colors.red("error:"), message);
    }

    fn show_info(&self, message: &str) {
        eprintln!("{}", self.colors.dim(message));
    }
}

/// Runs each line of input as a shell command in the terminal's directory.
struct ShellTerminal {
    name: String,
    cwd: PathBuf,
    processes: Processes,
}

impl ShellTerminal {
    fn shell() -> (&'static str, &'static str) {
        if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        }
    }
}

impl Terminal for ShellTerminal {
    fn show(&mut self) {
        debug!("Terminal '{}' in {}", self.name, self.cwd.display());
    }

    fn send_text(&mut self, line: &str) -> Result<()> {
        let (shell, flag) = Self::shell();
        let child = Command::new(shell)
            .arg(flag)
            .arg(line)
            .current_dir(&self.cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| anyhow!("Failed to start {shell} in {}: {e}", self.cwd.display()))?;
        self.processes.borrow_mut().push(child);
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;
    use crate::config::ToolSettings;

    #[test]
    fn test_color_config_disabled() {
        let config = ColorConfig::new(true);
        assert!(!config.enabled);
        assert_eq!(config.green("ok"), "ok");
        assert_eq!(config.red("error:"), "error:");
        assert_eq!(config.bold("x"), "x");
    }

    #[test]
    fn test_host_reads_settings_and_roots() {
        let settings = Settings {
            language_server: ToolSettings::default(),
            interpreter: ToolSettings {
                path: "/opt/sif/bin/sif".to_string(),
            },
        };
        let host = CliHost::new(settings, vec![PathBuf::from("/ws")], ColorConfig::new(true));

        assert_eq!(
            host.configuration("sif.interpreter.path").as_deref(),
            Some("/opt/sif/bin/sif")
        );
        assert_eq!(host.configuration("sif.languageServer.path"), None);
        assert_eq!(host.workspace_folders(), vec![PathBuf::from("/ws")]);
        assert!(host.active_document().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_terminal_runs_line_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let host = CliHost::new(Settings::default(), vec![], ColorConfig::new(true));

        let mut terminal = host.create_terminal("Sif", dir.path()).unwrap();
        terminal.send_text("touch \"ran here\"").unwrap();

        let status = host.wait_terminals().unwrap().unwrap();
        assert!(status.success());
        assert!(dir.path().join("ran here").exists());
    }
}

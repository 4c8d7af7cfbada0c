// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The `run-current-file` command against a recording editor host.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Tests use expect/unwrap for clear failure messages"
)]

use anyhow::Result;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sif_shim::CommandError;
use sif_shim::command::{RUN_CURRENT_FILE, TERMINAL_NAME};
use sif_shim::host::{Document, EditorHost, Terminal};
use sif_shim::lifecycle::ClientLifecycle;
use sif_shim::resolver::{Platform, Resolver};

/// Everything the host saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Saved(PathBuf),
    Terminal { name: String, cwd: PathBuf },
    Shown,
    Sent(String),
    Error(String),
}

type Events = Rc<RefCell<Vec<Event>>>;

struct RecordingTerminal {
    events: Events,
}

impl Terminal for RecordingTerminal {
    fn show(&mut self) {
        self.events.borrow_mut().push(Event::Shown);
    }

    fn send_text(&mut self, line: &str) -> Result<()> {
        self.events.borrow_mut().push(Event::Sent(line.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHost {
    interpreter: Option<String>,
    active: Option<Document>,
    events: Events,
}

impl RecordingHost {
    fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }
}

impl EditorHost for RecordingHost {
    fn configuration(&self, key: &str) -> Option<String> {
        match key {
            "sif.interpreter.path" => self.interpreter.clone(),
            _ => None,
        }
    }

    fn workspace_folders(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn active_document(&self) -> Option<Document> {
        self.active.clone()
    }

    fn save_document(&self, document: &Document) -> Result<()> {
        self.events
            .borrow_mut()
            .push(Event::Saved(document.path.clone()));
        Ok(())
    }

    fn create_terminal(&self, name: &str, cwd: &Path) -> Result<Box<dyn Terminal>> {
        self.events.borrow_mut().push(Event::Terminal {
            name: name.to_string(),
            cwd: cwd.to_path_buf(),
        });
        Ok(Box::new(RecordingTerminal {
            events: self.events.clone(),
        }))
    }

    fn show_error(&self, message: &str) {
        self.events
            .borrow_mut()
            .push(Event::Error(message.to_string()));
    }

    fn show_info(&self, _message: &str) {}
}

fn lifecycle(install: &Path) -> ClientLifecycle {
    ClientLifecycle::new(Resolver::new(install).with_platform(Platform::new("linux", "x86_64")))
}

#[test]
fn test_dirty_document_is_saved_then_run() {
    let dir = tempfile::tempdir().unwrap();
    let host = RecordingHost {
        interpreter: Some("/opt/sif/sif".to_string()),
        active: Some(Document {
            is_dirty: true,
            ..Document::from_path("/home/u/proj/main.sif")
        }),
        ..RecordingHost::default()
    };

    lifecycle(dir.path())
        .execute_command(RUN_CURRENT_FILE, &host)
        .unwrap();

    assert_eq!(
        host.events(),
        vec![
            Event::Saved(PathBuf::from("/home/u/proj/main.sif")),
            Event::Terminal {
                name: TERMINAL_NAME.to_string(),
                cwd: PathBuf::from("/home/u/proj"),
            },
            Event::Shown,
            Event::Sent(r#""/opt/sif/sif" "/home/u/proj/main.sif""#.to_string()),
        ]
    );
}

#[test]
fn test_clean_document_is_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let host = RecordingHost {
        interpreter: Some("/opt/sif/sif".to_string()),
        active: Some(Document::from_path("/home/u/proj/main.sif")),
        ..RecordingHost::default()
    };

    lifecycle(dir.path()).run_current_file(&host).unwrap();

    assert!(
        !host
            .events()
            .iter()
            .any(|e| matches!(e, Event::Saved(_)))
    );
}

#[test]
fn test_non_sif_document_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let host = RecordingHost {
        interpreter: Some("/opt/sif/sif".to_string()),
        active: Some(Document {
            is_dirty: true,
            ..Document::from_path("/home/u/proj/readme.md")
        }),
        ..RecordingHost::default()
    };

    let err = lifecycle(dir.path()).run_current_file(&host).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CommandError>(),
        Some(CommandError::NotSifDocument { .. })
    ));
    assert_eq!(
        host.events(),
        vec![Event::Error("Not a Sif file.".to_string())]
    );
}

#[test]
fn test_no_active_document() {
    let dir = tempfile::tempdir().unwrap();
    let host = RecordingHost::default();

    let err = lifecycle(dir.path()).run_current_file(&host).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CommandError>(),
        Some(CommandError::NoActiveDocument)
    ));
    assert_eq!(
        host.events(),
        vec![Event::Error("No active Sif file.".to_string())]
    );
}

#[test]
fn test_interpreter_not_found_creates_no_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let host = RecordingHost {
        interpreter: None,
        active: Some(Document::from_path("/home/u/proj/main.sif")),
        ..RecordingHost::default()
    };

    let err = lifecycle(dir.path()).run_current_file(&host).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CommandError>(),
        Some(CommandError::Resolve(_))
    ));
    assert_eq!(
        host.events(),
        vec![Event::Error(
            "Sif interpreter not found. Please set \"sif.interpreter.path\" in settings."
                .to_string()
        )]
    );
}

#[test]
fn test_bundled_interpreter_is_used_without_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let bundled = dir.path().join("bin").join("linux-x64").join("sif");
    fs::create_dir_all(bundled.parent().unwrap()).unwrap();
    fs::write(&bundled, b"").unwrap();

    let host = RecordingHost {
        active: Some(Document::from_path("/home/u/proj/main.sif")),
        ..RecordingHost::default()
    };

    lifecycle(dir.path()).run_current_file(&host).unwrap();

    let expected = format!("\"{}\" \"/home/u/proj/main.sif\"", bundled.display());
    assert_eq!(host.events().last(), Some(&Event::Sent(expected)));
}

#[test]
fn test_unknown_command() {
    let dir = tempfile::tempdir().unwrap();
    let host = RecordingHost::default();

    assert!(
        lifecycle(dir.path())
            .execute_command("sif.unknown", &host)
            .is_err()
    );
    assert!(host.events().is_empty());
}

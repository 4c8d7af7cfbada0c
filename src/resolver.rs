// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Executable resolution for the Sif tools.
//!
//! A tool is looked up in a fixed order, first match wins:
//!
//! 1. the user's explicit configuration value (trusted as-is, never probed),
//! 2. the binary bundled with the extension for the host platform,
//! 3. a development build next to, or inside, the open workspace.
//!
//! Each step contributes an ordered list of [`Candidate`]s. The lists are
//! chained lazily, so nothing after the winning candidate is ever probed.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use crate::error::ResolveError;
use crate::host::EditorHost;

/// Name of the Sif source checkout used by the sibling-directory layout.
pub const PROJECT_NAME: &str = "sif";

/// Static description of a tool the shim knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// Logical tool name, stable across platforms.
    pub name: &'static str,
    /// Name used in user-facing messages.
    pub display_name: &'static str,
    /// Fully qualified configuration key holding an explicit override.
    pub configuration_key: &'static str,
    /// Executable file name without platform suffix.
    pub executable: &'static str,
}

/// The Sif language server.
pub const LANGUAGE_SERVER: ToolSpec = ToolSpec {
    name: "languageServer",
    display_name: "Sif language server",
    configuration_key: "sif.languageServer.path",
    executable: "sif_lsp",
};

/// The Sif file interpreter.
pub const INTERPRETER: ToolSpec = ToolSpec {
    name: "interpreter",
    display_name: "Sif interpreter",
    configuration_key: "sif.interpreter.path",
    executable: "sif",
};

impl ToolSpec {
    /// Returns the executable file name as it appears on `platform`.
    #[must_use]
    pub fn executable_for(&self, platform: &Platform) -> String {
        if platform.is_windows() {
            format!("{}.exe", self.executable)
        } else {
            self.executable.to_string()
        }
    }

    /// The error reported when no candidate matched.
    #[must_use]
    pub const fn not_found(&self) -> ResolveError {
        ResolveError::NotFound {
            tool: self.name,
            display_name: self.display_name,
            configuration_key: self.configuration_key,
        }
    }
}

/// An operating system / CPU architecture pair.
///
/// Values use the spelling of `std::env::consts::{OS, ARCH}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system, e.g. `linux`, `macos`, `windows`.
    pub os: String,
    /// CPU architecture, e.g. `x86_64`, `aarch64`.
    pub arch: String,
}

impl Platform {
    /// Creates a platform from explicit OS and architecture names.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process is running on.
    #[must_use]
    pub fn host() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Directory under `bin/` holding the bundled binaries for this platform.
    ///
    /// Returns `None` for every combination that has no bundled build.
    #[must_use]
    pub fn platform_dir(&self) -> Option<&'static str> {
        match (self.os.as_str(), self.arch.as_str()) {
            ("macos", "aarch64") => Some("darwin-arm64"),
            ("macos", "x86_64") => Some("darwin-x64"),
            ("linux", "x86_64") => Some("linux-x64"),
            ("windows", "x86_64") => Some("win32-x64"),
            _ => None,
        }
    }

    fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// The resolution step a path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStep {
    /// Explicit user configuration.
    Configured,
    /// Binary shipped with the extension.
    Bundled,
    /// Development build found relative to the workspace.
    Workspace,
}

impl ResolutionStep {
    /// Whether candidates from this step must exist on disk to be accepted.
    #[must_use]
    pub const fn requires_probe(self) -> bool {
        !matches!(self, Self::Configured)
    }
}

impl fmt::Display for ResolutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configured => "configuration",
            Self::Bundled => "bundled",
            Self::Workspace => "workspace",
        };
        f.write_str(label)
    }
}

/// A path the resolver may return, tagged with its step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Candidate path.
    pub path: PathBuf,
    /// Step that produced it.
    pub step: ResolutionStep,
}

/// A successfully resolved executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Path to run.
    pub path: PathBuf,
    /// Step that produced it.
    pub step: ResolutionStep,
}

/// Per-lookup inputs supplied by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveContext {
    /// Value of the tool's configuration key, if any.
    pub configured: Option<String>,
    /// First workspace folder, if a workspace is open.
    pub workspace_root: Option<PathBuf>,
}

impl ResolveContext {
    /// Reads the inputs for `tool` from the editor host.
    pub fn from_host(host: &dyn EditorHost, tool: &ToolSpec) -> Self {
        Self {
            configured: host.configuration(tool.configuration_key),
            workspace_root: host.workspace_folders().into_iter().next(),
        }
    }
}

/// Existence check used for every probed candidate.
pub trait Probe {
    /// Returns whether `path` is an existing file.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the answer cannot be determined.
    fn is_file(&self, path: &Path) -> io::Result<bool>;
}

/// Probes the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl Probe for FsProbe {
    fn is_file(&self, path: &Path) -> io::Result<bool> {
        match std::fs::metadata(path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Locates tool executables for one extension installation.
#[derive(Debug, Clone)]
pub struct Resolver<P = FsProbe> {
    install_dir: PathBuf,
    platform: Platform,
    probe: P,
}

impl Resolver<FsProbe> {
    /// Creates a resolver for the host platform probing the real filesystem.
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            platform: Platform::host(),
            probe: FsProbe,
        }
    }
}

impl<P: Probe> Resolver<P> {
    /// Overrides the platform used for the bundled-binary step.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Replaces the existence check.
    pub fn with_probe<Q: Probe>(self, probe: Q) -> Resolver<Q> {
        Resolver {
            install_dir: self.install_dir,
            platform: self.platform,
            probe,
        }
    }

    /// Platform used for the bundled-binary step.
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Extension installation directory.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// All candidates for `tool`, in priority order.
    ///
    /// The iterator is lazy: paths are built only as it is advanced.
    pub fn candidates<'a>(
        &'a self,
        tool: &ToolSpec,
        ctx: &'a ResolveContext,
    ) -> impl Iterator<Item = Candidate> + 'a {
        let executable = tool.executable_for(&self.platform);
        let bundled_exe = executable.clone();

        let configured = ctx
            .configured
            .iter()
            .filter(|value| !value.is_empty())
            .map(|value| Candidate {
                path: PathBuf::from(value),
                step: ResolutionStep::Configured,
            });

        let bundled = self
            .platform
            .platform_dir()
            .into_iter()
            .map(move |dir| Candidate {
                path: self.install_dir.join("bin").join(dir).join(&bundled_exe),
                step: ResolutionStep::Bundled,
            });

        let workspace = ctx
            .workspace_root
            .iter()
            .flat_map(move |root| workspace_candidates(root, &executable))
            .map(|path| Candidate {
                path,
                step: ResolutionStep::Workspace,
            });

        configured.chain(bundled).chain(workspace)
    }

    /// Resolves `tool` to an executable path.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when no candidate matched.
    pub fn resolve(
        &self,
        tool: &ToolSpec,
        ctx: &ResolveContext,
    ) -> Result<ResolvedPath, ResolveError> {
        debug!("Resolving {} for {}", tool.name, self.platform);

        let found = self
            .candidates(tool, ctx)
            .find(|candidate| self.accept(candidate));

        match found {
            Some(Candidate { path, step }) => {
                info!("Using {} at {} ({})", tool.display_name, path.display(), step);
                Ok(ResolvedPath { path, step })
            }
            None => {
                debug!("No candidate found for {}", tool.name);
                Err(tool.not_found())
            }
        }
    }

    fn accept(&self, candidate: &Candidate) -> bool {
        if !candidate.step.requires_probe() {
            return true;
        }

        match self.probe.is_file(&candidate.path) {
            Ok(found) => {
                trace!("Probed {}: {}", candidate.path.display(), found);
                found
            }
            Err(e) => {
                debug!("Probe failed for {}: {}", candidate.path.display(), e);
                false
            }
        }
    }
}

/// Development build locations relative to a workspace root.
fn workspace_candidates(root: &Path, executable: &str) -> [PathBuf; 4] {
    // Lexical parent, so `/ws/../sif` is reported as `/sif`.
    let sibling = if root.file_name().is_some() {
        root.parent().unwrap_or(root).join(PROJECT_NAME)
    } else {
        root.join("..").join(PROJECT_NAME)
    };

    [
        root.join("build").join("debug").join(executable),
        root.join("build").join("release").join(executable),
        sibling.join("build").join("debug").join(executable),
        sibling.join("build").join("release").join(executable),
    ]
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Tests use expect/unwrap for clear failure messages"
)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Probe backed by an in-memory set of files that records every call.
    #[derive(Default)]
    struct FakeProbe {
        files: HashSet<PathBuf>,
        broken: HashSet<PathBuf>,
        calls: RefCell<Vec<PathBuf>>,
    }

    impl FakeProbe {
        fn with_files(files: &[&str]) -> Self {
            Self {
                files: files.iter().map(PathBuf::from).collect(),
                ..Self::default()
            }
        }

        fn broken(mut self, path: &str) -> Self {
            self.broken.insert(PathBuf::from(path));
            self
        }
    }

    impl Probe for &FakeProbe {
        fn is_file(&self, path: &Path) -> io::Result<bool> {
            self.calls.borrow_mut().push(path.to_path_buf());
            if self.broken.contains(path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            Ok(self.files.contains(path))
        }
    }

    fn linux() -> Platform {
        Platform::new("linux", "x86_64")
    }

    fn ctx(configured: Option<&str>, root: Option<&str>) -> ResolveContext {
        ResolveContext {
            configured: configured.map(String::from),
            workspace_root: root.map(PathBuf::from),
        }
    }

    #[test]
    fn test_platform_dir_mapping() {
        assert_eq!(
            Platform::new("macos", "aarch64").platform_dir(),
            Some("darwin-arm64")
        );
        assert_eq!(
            Platform::new("macos", "x86_64").platform_dir(),
            Some("darwin-x64")
        );
        assert_eq!(
            Platform::new("linux", "x86_64").platform_dir(),
            Some("linux-x64")
        );
        assert_eq!(
            Platform::new("windows", "x86_64").platform_dir(),
            Some("win32-x64")
        );
    }

    #[test]
    fn test_platform_dir_unsupported() {
        for (os, arch) in [
            ("linux", "aarch64"),
            ("windows", "aarch64"),
            ("freebsd", "x86_64"),
            ("macos", "x86"),
            ("linux", "riscv64"),
        ] {
            assert_eq!(Platform::new(os, arch).platform_dir(), None, "{os}/{arch}");
        }
    }

    #[test]
    fn test_windows_executable_suffix() {
        let windows = Platform::new("windows", "x86_64");
        assert_eq!(LANGUAGE_SERVER.executable_for(&windows), "sif_lsp.exe");
        assert_eq!(INTERPRETER.executable_for(&linux()), "sif");
    }

    #[test]
    fn test_candidate_order() {
        let resolver = Resolver::new("/ext").with_platform(linux());
        let ctx = ctx(Some("/custom/lsp"), Some("/home/dev/ws"));

        let candidates: Vec<_> = resolver.candidates(&LANGUAGE_SERVER, &ctx).collect();
        let paths: Vec<_> = candidates.iter().map(|c| c.path.clone()).collect();

        assert_eq!(
            paths,
            vec![
                PathBuf::from("/custom/lsp"),
                PathBuf::from("/ext/bin/linux-x64/sif_lsp"),
                PathBuf::from("/home/dev/ws/build/debug/sif_lsp"),
                PathBuf::from("/home/dev/ws/build/release/sif_lsp"),
                PathBuf::from("/home/dev/sif/build/debug/sif_lsp"),
                PathBuf::from("/home/dev/sif/build/release/sif_lsp"),
            ]
        );
        assert_eq!(candidates[0].step, ResolutionStep::Configured);
        assert_eq!(candidates[1].step, ResolutionStep::Bundled);
        assert!(
            candidates[2..]
                .iter()
                .all(|c| c.step == ResolutionStep::Workspace)
        );
    }

    #[test]
    fn test_sibling_layout_for_relative_root() {
        let paths = workspace_candidates(Path::new("."), "sif");
        assert_eq!(paths[2], PathBuf::from("./../sif/build/debug/sif"));
    }

    #[test]
    fn test_configured_value_is_returned_verbatim_without_probing() {
        let probe = FakeProbe::default();
        let resolver = Resolver::new("/ext")
            .with_platform(linux())
            .with_probe(&probe);

        let resolved = resolver
            .resolve(&LANGUAGE_SERVER, &ctx(Some(" /custom/path/lsp "), Some("/ws")))
            .unwrap();

        assert_eq!(resolved.path, PathBuf::from(" /custom/path/lsp "));
        assert_eq!(resolved.step, ResolutionStep::Configured);
        assert!(probe.calls.borrow().is_empty());
    }

    #[test]
    fn test_empty_configuration_is_ignored() {
        let probe = FakeProbe::with_files(&["/ext/bin/linux-x64/sif"]);
        let resolver = Resolver::new("/ext")
            .with_platform(linux())
            .with_probe(&probe);

        let resolved = resolver
            .resolve(&INTERPRETER, &ctx(Some(""), None))
            .unwrap();

        assert_eq!(resolved.step, ResolutionStep::Bundled);
    }

    #[test]
    fn test_bundled_binary_short_circuits_workspace_search() {
        let probe = FakeProbe::with_files(&[
            "/ext/bin/linux-x64/sif_lsp",
            "/ws/build/debug/sif_lsp",
        ]);
        let resolver = Resolver::new("/ext")
            .with_platform(linux())
            .with_probe(&probe);

        let resolved = resolver
            .resolve(&LANGUAGE_SERVER, &ctx(None, Some("/ws")))
            .unwrap();

        assert_eq!(resolved.path, PathBuf::from("/ext/bin/linux-x64/sif_lsp"));
        assert_eq!(
            *probe.calls.borrow(),
            vec![PathBuf::from("/ext/bin/linux-x64/sif_lsp")]
        );
    }

    #[test]
    fn test_debug_build_wins_over_release() {
        let probe = FakeProbe::with_files(&["/ws/build/debug/sif", "/ws/build/release/sif"]);
        let resolver = Resolver::new("/ext")
            .with_platform(linux())
            .with_probe(&probe);

        let resolved = resolver.resolve(&INTERPRETER, &ctx(None, Some("/ws"))).unwrap();

        assert_eq!(resolved.path, PathBuf::from("/ws/build/debug/sif"));
        assert_eq!(resolved.step, ResolutionStep::Workspace);
    }

    #[test]
    fn test_unsupported_platform_falls_through_to_workspace() {
        let probe = FakeProbe::with_files(&["/sif/build/release/sif_lsp"]);
        let resolver = Resolver::new("/ext")
            .with_platform(Platform::new("linux", "aarch64"))
            .with_probe(&probe);

        let resolved = resolver
            .resolve(&LANGUAGE_SERVER, &ctx(None, Some("/ws")))
            .unwrap();

        assert_eq!(resolved.path, PathBuf::from("/sif/build/release/sif_lsp"));
        assert!(
            probe
                .calls
                .borrow()
                .iter()
                .all(|p| !p.starts_with("/ext/bin"))
        );
    }

    #[test]
    fn test_unsupported_platform_without_workspace_is_not_found() {
        let probe = FakeProbe::default();
        let resolver = Resolver::new("/ext")
            .with_platform(Platform::new("freebsd", "x86_64"))
            .with_probe(&probe);

        let err = resolver
            .resolve(&LANGUAGE_SERVER, &ResolveContext::default())
            .unwrap_err();

        assert_eq!(err, LANGUAGE_SERVER.not_found());
        assert!(probe.calls.borrow().is_empty());
    }

    #[test]
    fn test_probe_error_skips_only_that_candidate() {
        let probe = FakeProbe::with_files(&["/ws/build/release/sif_lsp"])
            .broken("/ext/bin/linux-x64/sif_lsp")
            .broken("/ws/build/debug/sif_lsp");
        let resolver = Resolver::new("/ext")
            .with_platform(linux())
            .with_probe(&probe);

        let resolved = resolver
            .resolve(&LANGUAGE_SERVER, &ctx(None, Some("/ws")))
            .unwrap();

        assert_eq!(resolved.path, PathBuf::from("/ws/build/release/sif_lsp"));
        assert_eq!(probe.calls.borrow().len(), 3);
    }

    #[test]
    fn test_fs_probe_rejects_directories_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sif");
        std::fs::write(&file, b"").unwrap();

        assert!(FsProbe.is_file(&file).unwrap());
        assert!(!FsProbe.is_file(dir.path()).unwrap());
        assert!(!FsProbe.is_file(&dir.path().join("missing")).unwrap());
    }
}

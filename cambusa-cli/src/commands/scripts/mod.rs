//! Maintenance scripts under `scripts/`.
//!
//! A script is identified by its path relative to the scripts root, without
//! the `.sh` extension (`reports/monthly` → `scripts/reports/monthly.sh`).
//! Identifiers are resolved and checked for containment *before* anything
//! is read from disk; the loader only ever sees validated paths.

mod shell;

use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};

use cambusa_core::datasource::BoxFuture;
use cambusa_core::Application;
use colored::Colorize;

use crate::error::CommandError;

pub use shell::{ScriptExitError, ShellScript, ShellScriptLoader};

/// Scripts directory, relative to the project root.
pub const SCRIPTS_DIR: &str = "scripts";

/// Extension every script file carries.
pub const SCRIPT_EXTENSION: &str = "sh";

/// Error a script entry point may fail with.
pub type ScriptFailure = Box<dyn std::error::Error + Send + Sync>;

/// Identifier of a discoverable script: slash-delimited, relative, no extension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptIdentifier(String);

impl ScriptIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScriptIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A loaded script, ready to be invoked.
pub trait ScriptEntry: Send + Sync {
    /// Run the script's entry point once with the application and arguments.
    fn invoke<'a>(
        &'a self,
        app: &'a Application,
        args: &'a [String],
    ) -> BoxFuture<'a, Result<(), ScriptFailure>>;
}

/// Turns a validated script path into a runnable [`ScriptEntry`].
pub trait ScriptLoader: Send + Sync {
    /// Load the script at `path`.
    ///
    /// Returns the reason the file is not a valid script on failure.
    fn load(&self, path: &Path) -> Result<Box<dyn ScriptEntry>, String>;
}

/// Scripts root for a project.
pub fn scripts_root(project_root: &Path) -> PathBuf {
    project_root.join(SCRIPTS_DIR)
}

// ── Discovery ───────────────────────────────────────────────────────

/// Enumerates scripts below a root directory.
///
/// Traversal is depth-first; entries of each directory are visited in
/// file-name order, so the sequence is deterministic. Directories are read
/// only as the walk reaches them, and [`ScriptDiscovery::iter`] can be
/// called again to restart from the top.
pub struct ScriptDiscovery {
    root: PathBuf,
}

impl ScriptDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk. Fails with `NotFound` when the root is missing.
    pub fn iter(&self) -> Result<ScriptIter, CommandError> {
        if !self.root.is_dir() {
            return Err(CommandError::NotFound(
                "Scripts directory does not exist.".to_string(),
            ));
        }
        Ok(ScriptIter {
            root: self.root.clone(),
            pending_dirs: vec![self.root.clone()],
            ready: VecDeque::new(),
        })
    }
}

/// Lazy walk produced by [`ScriptDiscovery::iter`].
pub struct ScriptIter {
    root: PathBuf,
    pending_dirs: Vec<PathBuf>,
    ready: VecDeque<Result<ScriptIdentifier, CommandError>>,
}

impl ScriptIter {
    /// Read one directory, queueing its scripts and scheduling its subdirectories.
    fn expand(&mut self, dir: &Path) -> Result<(), CommandError> {
        let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                subdirs.push(path);
            } else if file_type.is_file()
                && path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION)
            {
                if let Some(id) = identifier_for(&self.root, &path) {
                    self.ready.push_back(Ok(id));
                }
            }
        }
        // Depth-first: subdirectories are visited right after this
        // directory's own scripts, in name order.
        self.pending_dirs.extend(subdirs.into_iter().rev());
        Ok(())
    }
}

impl Iterator for ScriptIter {
    type Item = Result<ScriptIdentifier, CommandError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            let dir = self.pending_dirs.pop()?;
            if let Err(err) = self.expand(&dir) {
                return Some(Err(err));
            }
        }
    }
}

fn identifier_for(root: &Path, path: &Path) -> Option<ScriptIdentifier> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(ScriptIdentifier(parts.join("/")))
}

// ── Runner ──────────────────────────────────────────────────────────

/// Resolves script identifiers inside a sandbox root and runs them.
pub struct ScriptRunner<L = ShellScriptLoader> {
    root: PathBuf,
    loader: L,
}

impl ScriptRunner<ShellScriptLoader> {
    /// Runner for `root` using the shell-script loader.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_loader(root, ShellScriptLoader)
    }
}

impl<L: ScriptLoader> ScriptRunner<L> {
    pub fn with_loader(root: impl Into<PathBuf>, loader: L) -> Self {
        Self {
            root: normalize(&root.into()),
            loader,
        }
    }

    /// Resolve `identifier` to the script file it names.
    ///
    /// Rejects with `PathEscape` when the joined path leaves the root,
    /// either lexically (`../`, absolute identifiers) or through a symlink,
    /// and with `NotFound` when the file does not exist.
    pub fn resolve(&self, identifier: &str) -> Result<PathBuf, CommandError> {
        let escape = || CommandError::PathEscape {
            identifier: identifier.to_string(),
            root: self.root.clone(),
        };

        let candidate = normalize(&self.root.join(format!("{identifier}.{SCRIPT_EXTENSION}")));
        if candidate == self.root || !candidate.starts_with(&self.root) {
            tracing::warn!(identifier, "rejected script path outside the scripts root");
            return Err(escape());
        }

        if !candidate.is_file() {
            return Err(CommandError::NotFound(format!(
                "Script '{identifier}' not found in scripts directory."
            )));
        }

        let real_root = self.root.canonicalize()?;
        let real_candidate = candidate.canonicalize()?;
        if !real_candidate.starts_with(&real_root) {
            tracing::warn!(identifier, "rejected script linking outside the scripts root");
            return Err(escape());
        }

        Ok(candidate)
    }

    /// Resolve, load and invoke a script once with `args`, in order.
    ///
    /// Errors raised by the script itself come back as
    /// [`CommandError::Script`] with the original error as its source.
    pub async fn run(
        &self,
        app: &Application,
        identifier: &str,
        args: &[String],
    ) -> Result<(), CommandError> {
        let path = self.resolve(identifier)?;
        let entry = self
            .loader
            .load(&path)
            .map_err(|reason| CommandError::InvalidScript {
                identifier: identifier.to_string(),
                reason,
            })?;

        tracing::debug!(identifier, path = %path.display(), args = args.len(), "invoking script");
        entry
            .invoke(app, args)
            .await
            .map_err(|source| CommandError::Script {
                identifier: identifier.to_string(),
                source,
            })
    }
}

/// Lexically normalize a path: drop `.` and fold `..` into its parent.
///
/// Works on paths that do not exist; `..` above the filesystem root is
/// discarded, which still leaves the result outside any scripts root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

// ── Commands ────────────────────────────────────────────────────────

/// `cambusa run <script> [args...]`
pub async fn run(app: &Application, identifier: &str, args: &[String]) -> Result<(), CommandError> {
    let runner = ScriptRunner::new(scripts_root(app.root()));
    runner.run(app, identifier, args).await?;
    println!(
        "{} Script '{}' executed successfully.",
        "✓".green(),
        identifier.cyan()
    );
    Ok(())
}

/// `cambusa scripts:list`
pub fn list(project_root: &Path) -> Result<(), CommandError> {
    let discovery = ScriptDiscovery::new(scripts_root(project_root));
    let scripts = discovery.iter()?.collect::<Result<Vec<_>, _>>()?;

    if scripts.is_empty() {
        println!("{}", "No scripts found in the scripts directory.".dimmed());
        return Ok(());
    }

    println!("{}", "Available Scripts:".bold());
    for script in &scripts {
        println!("- {script}");
    }
    Ok(())
}

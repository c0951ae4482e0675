//! Shell-script loader.
//!
//! A script file must start with an interpreter line (`#!/bin/sh`,
//! `#!/usr/bin/env bash`, ...). The interpreter is spawned with the script
//! path and the user's arguments; the application snapshot is written to its
//! stdin as JSON and stdout/stderr go straight to the terminal.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use cambusa_core::datasource::BoxFuture;
use cambusa_core::Application;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ScriptEntry, ScriptFailure, ScriptLoader};

/// Loads `*.sh` files by reading their interpreter line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellScriptLoader;

impl ScriptLoader for ShellScriptLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn ScriptEntry>, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("could not be read: {e}"))?;
        let script = ShellScript::parse(path, &content)?;
        Ok(Box::new(script))
    }
}

/// A script with a parsed interpreter line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellScript {
    path: PathBuf,
    interpreter: String,
    interpreter_args: Vec<String>,
}

impl ShellScript {
    /// Parse the `#!` line of `content`.
    pub fn parse(path: &Path, content: &str) -> Result<Self, String> {
        let first = content.lines().next().unwrap_or_default();
        let Some(line) = first.strip_prefix("#!") else {
            return Err("does not export a default function (missing #! interpreter line)".into());
        };
        let mut parts = line.split_whitespace().map(str::to_string);
        let Some(interpreter) = parts.next() else {
            return Err("has an empty #! interpreter line".into());
        };
        Ok(Self {
            path: path.to_path_buf(),
            interpreter,
            interpreter_args: parts.collect(),
        })
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn interpreter_args(&self) -> &[String] {
        &self.interpreter_args
    }

    fn command(&self, app: &Application, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.interpreter_args)
            .arg(&self.path)
            .args(args)
            .current_dir(app.root())
            .env("CAMBUSA_ROOT", app.root())
            .env("CAMBUSA_APP_NAME", app.name())
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(db) = app.db() {
            cmd.env("CAMBUSA_DATABASE_URL", &db.options().url);
        }
        cmd
    }
}

impl ScriptEntry for ShellScript {
    fn invoke<'a>(
        &'a self,
        app: &'a Application,
        args: &'a [String],
    ) -> BoxFuture<'a, Result<(), ScriptFailure>> {
        Box::pin(self.execute(app, args))
    }
}

impl ShellScript {
    async fn execute(&self, app: &Application, args: &[String]) -> Result<(), ScriptFailure> {
        let mut child = self.command(app, args).spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&app.snapshot())?;
            // Scripts that ignore stdin may close it before we finish.
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&payload).await {
                    tracing::debug!(
                        error = %err,
                        bytes = payload.len(),
                        "script did not read the full application snapshot"
                    );
                }
            });
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(Box::new(ScriptExitError {
                code: status.code(),
            }))
        }
    }
}

/// A script process ended with a non-zero status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptExitError {
    pub code: Option<i32>,
}

impl std::fmt::Display for ScriptExitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "script exited with status {code}"),
            None => write!(f, "script was terminated by a signal"),
        }
    }
}

impl std::error::Error for ScriptExitError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_env_interpreter_line() {
        let script = ShellScript::parse(Path::new("x.sh"), "#!/usr/bin/env bash\necho hi\n").unwrap();
        assert_eq!(script.interpreter(), "/usr/bin/env");
        assert_eq!(script.interpreter_args(), ["bash"]);
    }

    #[test]
    fn parses_plain_interpreter_line() {
        let script = ShellScript::parse(Path::new("x.sh"), "#!/bin/sh\n").unwrap();
        assert_eq!(script.interpreter(), "/bin/sh");
        assert!(script.interpreter_args().is_empty());
    }

    #[test]
    fn rejects_missing_interpreter_line() {
        let err = ShellScript::parse(Path::new("x.sh"), "echo hi\n").unwrap_err();
        assert!(err.contains("does not export a default function"));
        assert!(ShellScript::parse(Path::new("x.sh"), "").is_err());
        assert!(ShellScript::parse(Path::new("x.sh"), "#!   \n").is_err());
    }

    #[test]
    fn exit_error_mentions_status() {
        assert_eq!(
            ScriptExitError { code: Some(3) }.to_string(),
            "script exited with status 3"
        );
    }
}

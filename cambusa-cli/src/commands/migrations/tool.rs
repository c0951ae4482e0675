use std::path::{Path, PathBuf};

use cambusa_core::config::FromConfigValue;
use cambusa_core::{CambusaConfig, ConfigError, ConfigValue};
use tokio::process::Command;

use crate::error::CommandError;

/// Substring the migration tool prints when the schema diff is empty.
pub const NO_CHANGES_MARKER: &str = "No changes in database schema were found";

/// Tool command line used when `database.tool` is not configured.
pub const DEFAULT_TOOL: &str = "cambusa-migrate";

/// The external schema-migration tool, as a program plus leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTool {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
}

/// Everything the tool printed, captured in full.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// How a `migration:generate` run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// A migration file was written.
    Success,
    /// The tool found nothing to diff. Not a failure.
    NoChanges,
    /// Non-zero exit without the marker.
    Failed,
}

impl ToolOutput {
    /// Classify a generate run. The marker wins over the exit status, since
    /// the tool exits non-zero when it has nothing to write.
    pub fn classify(&self) -> ToolOutcome {
        if self.stdout.contains(NO_CHANGES_MARKER) || self.stderr.contains(NO_CHANGES_MARKER) {
            ToolOutcome::NoChanges
        } else if !self.success {
            ToolOutcome::Failed
        } else {
            ToolOutcome::Success
        }
    }
}

/// `database.tool` as written in the manifest.
///
/// A string is split on whitespace. A list is taken verbatim, first element
/// the program, so paths containing spaces need the list form:
///
/// ```yaml
/// database:
///   tool: ["/opt/Migrate Tool/bin/migrate", "--verbose"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommandLine(Vec<String>);

impl FromConfigValue for ToolCommandLine {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::String(line) => Ok(Self(
                line.split_whitespace().map(str::to_string).collect(),
            )),
            ConfigValue::List(_) => Vec::<String>::from_config_value(value, key).map(Self),
            _ => Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "string or list of strings",
            }),
        }
    }
}

impl MigrationTool {
    /// Split a command line on whitespace. Fails on an empty line.
    pub fn parse(command_line: &str, workdir: impl Into<PathBuf>) -> Result<Self, CommandError> {
        Self::from_argv(
            command_line.split_whitespace().map(str::to_string).collect(),
            workdir,
        )
    }

    /// Program followed by its leading arguments. Fails when empty.
    pub fn from_argv(argv: Vec<String>, workdir: impl Into<PathBuf>) -> Result<Self, CommandError> {
        let mut parts = argv.into_iter();
        let program = parts
            .next()
            .filter(|program| !program.trim().is_empty())
            .ok_or_else(|| {
                CommandError::InvalidArgument("database.tool must not be empty".to_string())
            })?;
        Ok(Self {
            program,
            args: parts.collect(),
            workdir: workdir.into(),
        })
    }

    /// The tool configured under `database.tool`, run from `root`.
    pub fn from_config(config: &CambusaConfig, root: &Path) -> Result<Self, CommandError> {
        let default = ToolCommandLine(vec![DEFAULT_TOOL.to_string()]);
        let ToolCommandLine(argv) = config.get_or("database.tool", default)?;
        Self::from_argv(argv, root)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// `<tool> migration:generate -d <artifact> <target>`
    pub async fn generate(&self, artifact: &Path, target: &Path) -> Result<ToolOutput, CommandError> {
        let mut cmd = self.command();
        cmd.arg("migration:generate").arg("-d").arg(artifact).arg(target);
        self.output(cmd).await
    }

    /// `<tool> migration:create <target>`
    pub async fn create(&self, target: &Path) -> Result<ToolOutput, CommandError> {
        let mut cmd = self.command();
        cmd.arg("migration:create").arg(target);
        self.output(cmd).await
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.workdir).kill_on_drop(true);
        cmd
    }

    async fn output(&self, mut cmd: Command) -> Result<ToolOutput, CommandError> {
        tracing::debug!(tool = %self.program, "invoking migration tool");
        let output = cmd.output().await.map_err(|err| CommandError::Tool {
            command: self.program.clone(),
            status: None,
            detail: err.to_string(),
        })?;
        let captured = ToolOutput {
            status: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(status = ?captured.status, "migration tool finished");
        Ok(captured)
    }

    /// Error for a failed run, carrying the tool's stderr (or stdout).
    pub fn failure(&self, output: &ToolOutput) -> CommandError {
        let detail = if output.stderr.trim().is_empty() {
            output.stdout.trim()
        } else {
            output.stderr.trim()
        };
        CommandError::Tool {
            command: self.program.clone(),
            status: output.status,
            detail: detail.to_string(),
        }
    }
}

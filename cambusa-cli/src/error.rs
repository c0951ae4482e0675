use std::path::PathBuf;

use cambusa_core::{ConfigError, DataSourceError, LoadError};

/// Failure of a CLI command. Every variant is fatal for the command that
/// raised it; `main` prints it and exits with status 1.
#[derive(Debug)]
pub enum CommandError {
    /// The application manifest is missing or unusable.
    Load(LoadError),
    /// A script, directory or file the command needs does not exist.
    NotFound(String),
    /// A script identifier resolved outside the scripts root.
    PathEscape { identifier: String, root: PathBuf },
    /// A script exists but has no runnable entry point.
    InvalidScript { identifier: String, reason: String },
    /// A script ran and reported failure.
    Script {
        identifier: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The command needs a database but the application has none.
    NoDatabase,
    /// The database connection could not be initialized.
    Connection(DataSourceError),
    /// A database operation failed after connecting.
    Database(DataSourceError),
    /// The external migration tool failed.
    Tool {
        command: String,
        status: Option<i32>,
        detail: String,
    },
    /// A file the command would create is already there.
    AlreadyExists(PathBuf),
    /// A user-supplied argument is unusable.
    InvalidArgument(String),
    Config(ConfigError),
    Io(std::io::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Load(err) => write!(f, "{err}"),
            CommandError::NotFound(msg) => write!(f, "{msg}"),
            CommandError::PathEscape { identifier, root } => write!(
                f,
                "Invalid script path '{identifier}'. Scripts must be within {}",
                root.display()
            ),
            CommandError::InvalidScript { identifier, reason } => {
                write!(f, "Script '{identifier}' {reason}")
            }
            CommandError::Script { identifier, source } => {
                write!(f, "Failed to run script '{identifier}': {source}")
            }
            CommandError::NoDatabase => write!(
                f,
                "No database connection configured. Set database.url in application.yaml."
            ),
            CommandError::Connection(err) => write!(f, "{err}"),
            CommandError::Database(err) => write!(f, "{err}"),
            CommandError::Tool {
                command,
                status,
                detail,
            } => {
                match status {
                    Some(code) => write!(f, "'{command}' exited with status {code}")?,
                    None => write!(f, "'{command}' failed")?,
                }
                if !detail.is_empty() {
                    write!(f, ": {detail}")?;
                }
                Ok(())
            }
            CommandError::AlreadyExists(path) => write!(f, "'{}' already exists", path.display()),
            CommandError::InvalidArgument(msg) => write!(f, "{msg}"),
            CommandError::Config(err) => write!(f, "{err}"),
            CommandError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Load(err) => Some(err),
            CommandError::Script { source, .. } => Some(source.as_ref()),
            CommandError::Connection(err) | CommandError::Database(err) => Some(err),
            CommandError::Config(err) => Some(err),
            CommandError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LoadError> for CommandError {
    fn from(err: LoadError) -> Self {
        CommandError::Load(err)
    }
}

impl From<ConfigError> for CommandError {
    fn from(err: ConfigError) -> Self {
        CommandError::Config(err)
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        CommandError::Io(err)
    }
}

impl From<dialoguer::Error> for CommandError {
    fn from(err: dialoguer::Error) -> Self {
        CommandError::Io(std::io::Error::other(err.to_string()))
    }
}

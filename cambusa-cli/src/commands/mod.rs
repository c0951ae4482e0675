//! Command implementations for the `cambusa` CLI.
//!
//! Commands that need the target application receive it by reference from
//! [`load_app`]; nothing is stored globally.

use std::path::Path;

use cambusa_core::{AppLoader, Application};

use crate::error::CommandError;

/// Project scaffolding: `cambusa init [name]`.
pub mod init;

/// Migration pipeline: `migrations:generate`, `migrations:create`, `migrations:run`.
///
/// Generation hands a transient connection artifact to the external
/// migration tool and classifies its output; running applies pending
/// `*.sql` files through the application's data source.
pub mod migrations;

/// Model definitions: `models:list`, `models:generate`.
pub mod models;

/// Interactive session: `cambusa repl`.
pub mod repl;

/// Route listing: `routes:list`.
pub mod routes;

/// Script discovery and sandboxed execution: `run`, `scripts:list`.
pub mod scripts;

/// Template helpers for `init`.
pub mod templates;

/// Load the application rooted at `root` for the given profile.
pub fn load_app(root: &Path, profile: &str) -> Result<Application, CommandError> {
    let app = AppLoader::new(root).profile(profile).load()?;
    tracing::debug!(app = app.name(), root = %root.display(), "application ready");
    Ok(app)
}

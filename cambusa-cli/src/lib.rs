//! # cambusa-cli
//!
//! Command-line control plane for Cambusa projects.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cambusa init [name]` | Scaffold a new project |
//! | `cambusa migrations:generate <name>` | Generate a migration from the schema diff |
//! | `cambusa migrations:create <name>` | Create an empty migration |
//! | `cambusa migrations:run` | Apply pending migrations |
//! | `cambusa run <script> [args...]` | Run a script from `scripts/` |
//! | `cambusa scripts:list` | List available scripts |
//! | `cambusa repl` | Interactive session with the application bound as `cambusa` |
//! | `cambusa routes:list` | List declared routes |
//! | `cambusa models:list` | List model definitions |
//! | `cambusa models:generate <name>` | Create an empty model definition |
//!
//! Every command that needs the application loads it from `application.yaml`
//! in the current directory through [`cambusa_core::AppLoader`].

pub mod commands;
pub mod error;
pub mod logging;

pub use error::CommandError;

//! # cambusa-core
//!
//! The application contract the `cambusa` CLI drives.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`AppLoader`] | Loads an [`Application`] from `application.yaml` in a project root |
//! | [`Application`] | The loaded handle: database, routes, models, configuration |
//! | [`CambusaConfig`] | Layered YAML + `.env` + environment configuration |
//! | [`DataSource`] | Object-safe database connection with a migration runner |
//! | [`SqlxDataSource`] | `DataSource` over `sqlx::AnyPool` (SQLite, PostgreSQL, MySQL) |
//!
//! Nothing here is global: every command receives the `Application` it
//! works on as a parameter.

pub mod app;
pub mod config;
pub mod datasource;

pub use app::{AppLoader, Application, LoadError, Route};
pub use config::{CambusaConfig, ConfigError, ConfigValue};
pub use datasource::{
    AppliedMigration, DataSource, DataSourceError, DataSourceOptions, DatabaseKind,
    SqlxDataSource,
};

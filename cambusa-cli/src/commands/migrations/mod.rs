//! Migration commands: `migrations:generate`, `migrations:create`, `migrations:run`.
//!
//! Generation drives the external migration tool against a transient
//! artifact describing the database connection; the artifact never outlives
//! the command. Running uses the application's own [`DataSource`].

mod artifact;
mod tool;

use std::path::PathBuf;

use cambusa_core::{AppliedMigration, Application, DataSource, DataSourceOptions};
use colored::Colorize;

use crate::error::CommandError;

pub use artifact::{ArtifactContents, MigrationArtifact};
pub use tool::{
    MigrationTool, ToolCommandLine, ToolOutcome, ToolOutput, DEFAULT_TOOL, NO_CHANGES_MARKER,
};

/// `<unix-millis>-<name>`. The prefix keeps lexical order chronological.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MigrationName(String);

impl MigrationName {
    /// Stamp `name` with the current time.
    pub fn new(name: &str) -> Result<Self, CommandError> {
        Self::with_timestamp(chrono::Utc::now().timestamp_millis(), name)
    }

    pub fn with_timestamp(millis: i64, name: &str) -> Result<Self, CommandError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CommandError::InvalidArgument(format!(
                "Invalid migration name '{name}': use letters, digits, '-' and '_' only"
            )));
        }
        Ok(Self(format!("{millis}-{name}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MigrationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful `migrations:generate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// The tool wrote `<migrations>/<name>`.
    Generated { name: MigrationName, output: String },
    /// The schema already matches; nothing was written.
    NoChanges,
}

fn migrations_dir(app: &Application) -> PathBuf {
    match app.db() {
        Some(db) => db.options().migrations_dir(app.root()),
        None => app.root().join(DataSourceOptions::DEFAULT_MIGRATIONS_DIR),
    }
}

/// Initialize `db` unless it already is. Returns whether this call opened it.
async fn connect(db: &dyn DataSource) -> Result<bool, CommandError> {
    if db.is_initialized() {
        return Ok(false);
    }
    db.initialize().await.map_err(CommandError::Connection)?;
    Ok(true)
}

/// Close `db`, logging instead of failing: used on paths whose own result matters more.
async fn release(db: &dyn DataSource) {
    if let Err(err) = db.destroy().await {
        tracing::warn!(error = %err, "failed to close database connection");
    }
}

/// Generate a migration from the schema diff.
///
/// Connects, writes the artifact, runs the tool and classifies its output.
/// The artifact is removed before this returns on every path, and a
/// connection opened here is closed again.
pub async fn generate_with(
    app: &Application,
    tool: &MigrationTool,
    name: MigrationName,
) -> Result<GenerateOutcome, CommandError> {
    let db = app.db().ok_or(CommandError::NoDatabase)?;
    let opened = connect(db).await?;
    let result = diff(app, db, tool, name).await;
    if opened {
        release(db).await;
    }
    result
}

async fn diff(
    app: &Application,
    db: &dyn DataSource,
    tool: &MigrationTool,
    name: MigrationName,
) -> Result<GenerateOutcome, CommandError> {
    let dir = db.options().migrations_dir(app.root());
    tokio::fs::create_dir_all(&dir).await?;
    let target = dir.join(name.as_str());

    let output = {
        let contents = ArtifactContents {
            options: db.options(),
            entities: app.models(),
        };
        let artifact = MigrationArtifact::write(app.root(), &name, &contents)?;
        tool.generate(artifact.path(), &target).await?
    };

    match output.classify() {
        ToolOutcome::NoChanges => Ok(GenerateOutcome::NoChanges),
        ToolOutcome::Failed => Err(tool.failure(&output)),
        ToolOutcome::Success => Ok(GenerateOutcome::Generated {
            name,
            output: output.stdout,
        }),
    }
}

/// Ask the tool for an empty migration. No database connection, no artifact.
pub async fn create_with(
    app: &Application,
    tool: &MigrationTool,
    name: &MigrationName,
) -> Result<ToolOutput, CommandError> {
    let dir = migrations_dir(app);
    tokio::fs::create_dir_all(&dir).await?;
    let output = tool.create(&dir.join(name.as_str())).await?;
    if !output.success {
        return Err(tool.failure(&output));
    }
    Ok(output)
}

/// Apply pending migrations. The connection is closed afterwards, also on failure.
pub async fn run_with(app: &Application) -> Result<Vec<AppliedMigration>, CommandError> {
    let db = app.db().ok_or(CommandError::NoDatabase)?;
    connect(db).await?;
    let result = db.run_migrations().await.map_err(CommandError::Database);
    match result {
        Ok(applied) => {
            db.destroy().await.map_err(CommandError::Database)?;
            Ok(applied)
        }
        Err(err) => {
            release(db).await;
            Err(err)
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// `cambusa migrations:generate <name>`
pub async fn generate(app: &Application, name: &str) -> Result<(), CommandError> {
    let tool = MigrationTool::from_config(app.config(), app.root())?;
    let name = MigrationName::new(name)?;
    match generate_with(app, &tool, name).await? {
        GenerateOutcome::NoChanges => {
            println!(
                "{} No changes in database schema were detected. No new migration was generated.",
                "!".yellow()
            );
            println!(
                "If you want to create an empty migration, use the '{}' command instead.",
                "migrations:create".cyan()
            );
        }
        GenerateOutcome::Generated { name, output } => {
            print_tool_output("Migration generation output:", &output);
            println!("{} Migration {} has been generated.", "✓".green(), name.to_string().cyan());
        }
    }
    Ok(())
}

/// `cambusa migrations:create <name>`
pub async fn create(app: &Application, name: &str) -> Result<(), CommandError> {
    let tool = MigrationTool::from_config(app.config(), app.root())?;
    let name = MigrationName::new(name)?;
    let output = create_with(app, &tool, &name).await?;
    print_tool_output("Migration creation output:", &output.stdout);
    println!(
        "{} Empty migration {} has been created.",
        "✓".green(),
        name.to_string().cyan()
    );
    Ok(())
}

/// `cambusa migrations:run`
pub async fn run(app: &Application) -> Result<(), CommandError> {
    println!("{} Running pending migrations...", "->".blue());
    let applied = run_with(app).await?;
    if applied.is_empty() {
        println!("No pending migrations to run.");
        return Ok(());
    }
    println!(
        "{} Successfully ran {} migration(s):",
        "✓".green(),
        applied.len()
    );
    for migration in &applied {
        println!("- {}", migration.name);
    }
    Ok(())
}

fn print_tool_output(label: &str, output: &str) {
    let output = output.trim();
    if !output.is_empty() {
        println!("{} {output}", label.dimmed());
    }
}

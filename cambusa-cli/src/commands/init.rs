use std::fs;
use std::path::Path;

use cambusa_core::DatabaseKind;
use colored::Colorize;
use dialoguer::Select;

use super::templates;
use crate::error::CommandError;

/// Raw CLI flags for `cambusa init`.
#[derive(Debug, Default)]
pub struct InitOpts {
    pub db: Option<String>,
    pub no_interactive: bool,
}

/// Resolved scaffolding options.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub name: String,
    pub db: Option<DatabaseKind>,
}

/// Create a new Cambusa project in `./<name>`.
///
/// `--db` or `--no-interactive` skip the database prompt.
pub fn run(name: &str, cli_opts: InitOpts) -> Result<(), CommandError> {
    let db = match (&cli_opts.db, cli_opts.no_interactive) {
        (Some(db), _) => parse_db(db)?,
        (None, true) => None,
        (None, false) => prompt_db(name)?,
    };
    let opts = ProjectOptions {
        name: name.to_string(),
        db,
    };
    generate_project(Path::new(&opts.name), &opts)
}

fn parse_db(value: &str) -> Result<Option<DatabaseKind>, CommandError> {
    match value {
        "none" => Ok(None),
        "sqlite" => Ok(Some(DatabaseKind::Sqlite)),
        "postgres" | "pg" => Ok(Some(DatabaseKind::Postgres)),
        "mysql" => Ok(Some(DatabaseKind::Mysql)),
        other => Err(CommandError::InvalidArgument(format!(
            "Unknown database '{other}'. Available: none, sqlite, postgres, mysql"
        ))),
    }
}

fn prompt_db(name: &str) -> Result<Option<DatabaseKind>, CommandError> {
    println!(
        "{} Creating a new Cambusa project: {}",
        "->".blue(),
        name.green()
    );
    println!();

    let choices = &["None", "SQLite", "PostgreSQL", "MySQL"];
    let idx = Select::new()
        .with_prompt("Database")
        .items(choices)
        .default(1)
        .interact()?;
    Ok(match idx {
        1 => Some(DatabaseKind::Sqlite),
        2 => Some(DatabaseKind::Postgres),
        3 => Some(DatabaseKind::Mysql),
        _ => None,
    })
}

/// Write the project skeleton into `project_dir`, which must not exist yet.
pub fn generate_project(project_dir: &Path, opts: &ProjectOptions) -> Result<(), CommandError> {
    if project_dir.exists() {
        return Err(CommandError::AlreadyExists(project_dir.to_path_buf()));
    }

    fs::create_dir_all(project_dir.join("api/models"))?;
    fs::create_dir_all(project_dir.join("scripts"))?;
    fs::create_dir_all(project_dir.join("migrations"))?;

    fs::write(
        project_dir.join("application.yaml"),
        templates::application_yaml(&opts.name, opts.db),
    )?;
    fs::write(project_dir.join("scripts/hello.sh"), templates::hello_script())?;
    fs::write(project_dir.join(".gitignore"), templates::gitignore())?;
    tracing::debug!(dir = %project_dir.display(), "project scaffolded");

    println!(
        "{} Project '{}' created successfully!",
        "✓".green(),
        opts.name.green()
    );
    println!();
    println!("  cd {}", opts.name);
    if opts.db.is_some() {
        println!("  cambusa migrations:run");
    }
    println!("  cambusa run hello");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_database_flags() {
        assert_eq!(parse_db("pg").unwrap(), Some(DatabaseKind::Postgres));
        assert_eq!(parse_db("none").unwrap(), None);
        assert!(parse_db("oracle").is_err());
    }
}

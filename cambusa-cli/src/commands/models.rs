use std::io::Write;
use std::path::{Path, PathBuf};

use cambusa_core::app::MODELS_DIR;
use colored::Colorize;

use crate::error::CommandError;

const MODEL_TEMPLATE: &str = "\
# Define your columns here
columns: {}
# Define your relations here
relations: {}
";

/// Model names defined under `<root>/api/models`, sorted.
pub fn list_models(root: &Path) -> Result<Vec<String>, CommandError> {
    let dir = root.join(MODELS_DIR);
    if !dir.is_dir() {
        return Err(CommandError::NotFound(
            "Models directory does not exist.".to_string(),
        ));
    }
    let mut models = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        let is_model = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if let (true, Some(stem)) = (is_model, path.file_stem()) {
            models.push(stem.to_string_lossy().into_owned());
        }
    }
    models.sort();
    Ok(models)
}

/// `cambusa models:list`
pub fn list(root: &Path) -> Result<(), CommandError> {
    let models = list_models(root)?;
    if models.is_empty() {
        println!("{}", "No models found.".dimmed());
        return Ok(());
    }
    let mut stdout = std::io::stdout();
    write_models(&mut stdout, models.iter())?;
    Ok(())
}

/// `Available models:` followed by one `- name` line per model.
pub fn write_models<W, I, S>(out: &mut W, names: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    writeln!(out, "Available models:")?;
    for name in names {
        writeln!(out, "- {name}")?;
    }
    Ok(())
}

/// Write an empty model definition. Never overwrites.
pub fn generate_model(root: &Path, name: &str) -> Result<PathBuf, CommandError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(CommandError::InvalidArgument(format!(
            "Invalid model name '{name}'"
        )));
    }

    let dir = root.join(MODELS_DIR);
    let path = dir.join(format!("{name}.yaml"));
    if path.exists() {
        return Err(CommandError::AlreadyExists(path));
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, MODEL_TEMPLATE)?;
    Ok(path)
}

/// `cambusa models:generate <name>`
pub fn generate(root: &Path, name: &str) -> Result<(), CommandError> {
    let path = generate_model(root, name)?;
    println!(
        "{} Model {} created at {}",
        "✓".green(),
        name.cyan(),
        path.display()
    );
    Ok(())
}

//! The loaded application handle and its loader.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{CambusaConfig, ConfigError, ConfigValue, FromConfigValue, MANIFEST_FILE};
use crate::datasource::{DataSource, DataSourceOptions, SqlxDataSource};

/// Directory holding model definitions, relative to the project root.
pub const MODELS_DIR: &str = "api/models";

/// A declared route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub method: String,
    pub path: String,
}

impl Route {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
        }
    }
}

impl FromConfigValue for Route {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let ConfigValue::Map(map) = value else {
            return Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "{ method, path }",
            });
        };
        let field = |name: &str| -> Result<String, ConfigError> {
            let value = map
                .get(name)
                .ok_or_else(|| ConfigError::NotFound(format!("{key}.{name}")))?;
            String::from_config_value(value, &format!("{key}.{name}"))
        };
        Ok(Route::new(field("method")?, field("path")?))
    }
}

/// Errors raised while loading the application.
#[derive(Debug)]
pub enum LoadError {
    /// No manifest in the project root.
    Missing(PathBuf),
    /// The manifest or a model file exists but cannot be used.
    Invalid { path: PathBuf, reason: String },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Missing(path) => write!(
                f,
                "{} not found in {}. Please ensure you are in the root directory of your Cambusa project.",
                MANIFEST_FILE,
                path.display()
            ),
            LoadError::Invalid { path, reason } => {
                write!(f, "Failed to load {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// The loaded target application.
///
/// Owned by the command for one CLI invocation and passed by reference to
/// every component that needs it.
pub struct Application {
    root: PathBuf,
    name: String,
    config: CambusaConfig,
    db: Option<Box<dyn DataSource>>,
    routes: Vec<Route>,
    models: BTreeMap<String, serde_json::Value>,
}

impl Application {
    /// Assemble an application by hand. [`AppLoader`] is the usual entry point.
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>, config: CambusaConfig) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
            config,
            db: None,
            routes: Vec::new(),
            models: BTreeMap::new(),
        }
    }

    pub fn with_db(mut self, db: Box<dyn DataSource>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_routes(mut self, routes: Vec<Route>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_models(mut self, models: BTreeMap<String, serde_json::Value>) -> Self {
        self.models = models;
        self
    }

    /// Project root the application was loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CambusaConfig {
        &self.config
    }

    /// The database connection, when the manifest configures one.
    pub fn db(&self) -> Option<&dyn DataSource> {
        self.db.as_deref()
    }

    /// Routes in declaration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Model definitions keyed by model name.
    pub fn models(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.models
    }

    /// JSON view of the application handed to scripts.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "root": self.root.display().to_string(),
            "profile": self.config.profile(),
            "routes": self.routes,
            "models": self.models,
            "database": self.db.as_ref().map(|db| db.options()),
        })
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("root", &self.root)
            .field("name", &self.name)
            .field("db", &self.db.as_ref().map(|db| db.options()))
            .field("routes", &self.routes)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Loads an [`Application`] from a project directory.
///
/// ```ignore
/// let app = AppLoader::new(std::env::current_dir()?)
///     .profile("dev")
///     .load()?;
/// ```
pub struct AppLoader {
    root: PathBuf,
    profile: String,
}

impl AppLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            profile: "dev".to_string(),
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Read the manifest, routes, models and database settings.
    pub fn load(self) -> Result<Application, LoadError> {
        let manifest = self.root.join(MANIFEST_FILE);
        if !manifest.is_file() {
            return Err(LoadError::Missing(self.root));
        }
        let invalid = |reason: String| LoadError::Invalid {
            path: manifest.clone(),
            reason,
        };

        let config =
            CambusaConfig::load(&self.root, &self.profile).map_err(|e| invalid(e.to_string()))?;

        let default_name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cambusa-app".to_string());
        let name: String = config
            .get_or("app.name", default_name)
            .map_err(|e| invalid(e.to_string()))?;
        let routes: Vec<Route> = config
            .get_or("routes", Vec::new())
            .map_err(|e| invalid(e.to_string()))?;
        let options =
            DataSourceOptions::from_config(&config).map_err(|e| invalid(e.to_string()))?;
        let models = load_models(&self.root.join(MODELS_DIR))?;

        tracing::debug!(
            app = %name,
            routes = routes.len(),
            models = models.len(),
            database = options.is_some(),
            "application loaded"
        );

        let mut app = Application::new(self.root.clone(), name, config)
            .with_routes(routes)
            .with_models(models);
        if let Some(options) = options {
            app = app.with_db(Box::new(SqlxDataSource::new(options, &self.root)));
        }
        Ok(app)
    }
}

/// Parse every `*.yaml` / `*.yml` file in `dir` into a model definition.
///
/// A missing directory yields no models; an unparsable file is a load error.
pub fn load_models(dir: &Path) -> Result<BTreeMap<String, serde_json::Value>, LoadError> {
    let mut models = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(models);
    }
    let entries = std::fs::read_dir(dir).map_err(|e| LoadError::Invalid {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    for entry in entries {
        let path = entry
            .map_err(|e| LoadError::Invalid {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?
            .path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !path.is_file() || !is_yaml {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let content = std::fs::read_to_string(&path).map_err(|e| LoadError::Invalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let definition: serde_json::Value =
            serde_yaml::from_str(&content).map_err(|e| LoadError::Invalid {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let definition = if definition.is_null() {
            serde_json::json!({})
        } else {
            definition
        };
        models.insert(name, definition);
    }
    Ok(models)
}

use cambusa_core::{AppLoader, LoadError, Route};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

const MANIFEST: &str = r#"
app:
  name: "shop"
database:
  url: "sqlite::memory:"
routes:
  - method: get
    path: /products
  - method: POST
    path: /orders
"#;

fn project(manifest: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("application.yaml"), manifest).unwrap();
    tmp
}

#[test]
#[serial]
fn load_reads_name_routes_and_database() {
    let tmp = project(MANIFEST);
    let app = AppLoader::new(tmp.path()).load().unwrap();

    assert_eq!(app.name(), "shop");
    assert_eq!(
        app.routes(),
        [Route::new("GET", "/products"), Route::new("POST", "/orders")]
    );
    let db = app.db().expect("database configured");
    assert_eq!(db.options().url, "sqlite::memory:");
    assert_eq!(db.options().migrations, "migrations");
    assert!(!db.is_initialized());
}

#[test]
#[serial]
fn load_without_manifest_is_missing() {
    let tmp = TempDir::new().unwrap();
    let err = AppLoader::new(tmp.path()).load().unwrap_err();
    assert!(matches!(err, LoadError::Missing(_)));
    assert!(err.to_string().contains("application.yaml not found"));
}

#[test]
#[serial]
fn load_without_database_has_no_db() {
    let tmp = project("app:\n  name: bare\n");
    let app = AppLoader::new(tmp.path()).load().unwrap();
    assert!(app.db().is_none());
    assert!(app.routes().is_empty());
}

#[test]
#[serial]
fn name_defaults_to_directory_name() {
    let tmp = project("routes: []\n");
    let app = AppLoader::new(tmp.path()).load().unwrap();
    let dir_name = tmp.path().file_name().unwrap().to_string_lossy();
    assert_eq!(app.name(), dir_name);
}

#[test]
#[serial]
fn unsupported_database_url_is_invalid() {
    let tmp = project("database:\n  url: \"oracle://db\"\n");
    let err = AppLoader::new(tmp.path()).load().unwrap_err();
    assert!(matches!(err, LoadError::Invalid { .. }));
}

#[test]
#[serial]
fn malformed_route_is_invalid() {
    let tmp = project("routes:\n  - path: /missing-method\n");
    let err = AppLoader::new(tmp.path()).load().unwrap_err();
    assert!(matches!(err, LoadError::Invalid { .. }));
}

// ── Models ──────────────────────────────────────────────────────────

#[test]
#[serial]
fn models_are_loaded_by_file_stem() {
    let tmp = project(MANIFEST);
    let models = tmp.path().join("api/models");
    fs::create_dir_all(&models).unwrap();
    fs::write(
        models.join("user.yaml"),
        "columns:\n  email:\n    type: string\nrelations: {}\n",
    )
    .unwrap();
    fs::write(models.join("empty.yml"), "null\n").unwrap();
    fs::write(models.join("notes.txt"), "ignored").unwrap();

    let app = AppLoader::new(tmp.path()).load().unwrap();
    let names: Vec<_> = app.models().keys().cloned().collect();
    assert_eq!(names, ["empty", "user"]);
    assert_eq!(app.models()["user"]["columns"]["email"]["type"], "string");
    assert_eq!(app.models()["empty"], serde_json::json!({}));
}

#[test]
#[serial]
fn invalid_model_file_fails_the_load() {
    let tmp = project(MANIFEST);
    let models = tmp.path().join("api/models");
    fs::create_dir_all(&models).unwrap();
    fs::write(models.join("broken.yaml"), "columns: [unclosed\n").unwrap();

    let err = AppLoader::new(tmp.path()).load().unwrap_err();
    assert!(matches!(err, LoadError::Invalid { ref path, .. } if path.ends_with("broken.yaml")));
}

#[test]
#[serial]
fn snapshot_exposes_application_view() {
    let tmp = project(MANIFEST);
    let app = AppLoader::new(tmp.path()).load().unwrap();
    let snapshot = app.snapshot();

    assert_eq!(snapshot["name"], "shop");
    assert_eq!(snapshot["routes"][1]["method"], "POST");
    assert_eq!(snapshot["database"]["type"], "sqlite");
    assert_eq!(snapshot["database"]["migrationsTable"], "cambusa_migrations");
}

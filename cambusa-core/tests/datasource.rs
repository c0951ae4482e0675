use cambusa_core::{AppLoader, Application, DataSourceError};
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn sqlite_project(tmp: &Path) -> Application {
    let db_path = tmp.join("app.db");
    fs::write(
        tmp.join("application.yaml"),
        format!(
            "app:\n  name: shop\ndatabase:\n  url: \"sqlite://{}?mode=rwc\"\n",
            db_path.display()
        ),
    )
    .unwrap();
    fs::create_dir_all(tmp.join("migrations")).unwrap();
    AppLoader::new(tmp).load().unwrap()
}

fn write_migration(tmp: &Path, name: &str, sql: &str) {
    fs::write(tmp.join("migrations").join(format!("{name}.sql")), sql).unwrap();
}

#[tokio::test]
#[serial]
async fn initialize_and_destroy_toggle_state() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_project(tmp.path());
    let db = app.db().unwrap();

    assert!(!db.is_initialized());
    db.initialize().await.unwrap();
    assert!(db.is_initialized());
    db.initialize().await.unwrap();
    db.destroy().await.unwrap();
    assert!(!db.is_initialized());
    db.destroy().await.unwrap();
}

#[tokio::test]
#[serial]
async fn run_migrations_applies_in_name_order_once() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_project(tmp.path());
    write_migration(
        tmp.path(),
        "1700000000002-add-email",
        "ALTER TABLE users ADD COLUMN email TEXT;",
    );
    write_migration(
        tmp.path(),
        "1700000000001-create-users",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    );

    let db = app.db().unwrap();
    db.initialize().await.unwrap();

    let first = db.run_migrations().await.unwrap();
    let names: Vec<_> = first.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["1700000000001-create-users", "1700000000002-add-email"]);
    assert_eq!(first[0].timestamp, 1_700_000_000_001);

    let second = db.run_migrations().await.unwrap();
    assert!(second.is_empty());

    let applied = db.applied_migrations().await.unwrap();
    assert_eq!(applied.len(), 2);
    db.destroy().await.unwrap();
}

#[tokio::test]
#[serial]
async fn failing_migration_is_not_recorded() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_project(tmp.path());
    write_migration(tmp.path(), "1700000000001-broken", "CREATE TABLE (;");

    let db = app.db().unwrap();
    db.initialize().await.unwrap();

    let err = db.run_migrations().await.unwrap_err();
    assert!(matches!(err, DataSourceError::Migration { ref name, .. } if name == "1700000000001-broken"));
    assert!(db.applied_migrations().await.unwrap().is_empty());
    db.destroy().await.unwrap();
}

#[tokio::test]
#[serial]
async fn run_before_initialize_fails() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_project(tmp.path());
    let err = app.db().unwrap().run_migrations().await.unwrap_err();
    assert!(matches!(err, DataSourceError::NotInitialized));
}

#[tokio::test]
#[serial]
async fn unreachable_database_fails_to_connect() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("application.yaml"),
        "database:\n  url: \"sqlite:///nonexistent-dir/nested/app.db\"\n",
    )
    .unwrap();
    let app = AppLoader::new(tmp.path()).load().unwrap();

    let err = app.db().unwrap().initialize().await.unwrap_err();
    assert!(matches!(err, DataSourceError::Connect(_)));
    assert!(!app.db().unwrap().is_initialized());
}

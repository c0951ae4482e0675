use cambusa_cli::commands::migrations::{
    self, GenerateOutcome, MigrationArtifact, MigrationName, MigrationTool,
};
use cambusa_cli::error::CommandError;
use cambusa_core::datasource::BoxFuture;
use cambusa_core::{
    AppLoader, AppliedMigration, Application, CambusaConfig, DataSource, DataSourceError,
    DataSourceOptions, DatabaseKind,
};
use serial_test::serial;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const GENERATES: &str = r#"cp "$3" "$(dirname "$0")/seen.json"
echo "$4" > "$(dirname "$0")/target.txt"
echo "-- generated" > "$4"
echo "Migration $4 has been generated successfully."
"#;

const NO_CHANGES: &str = r#"cp "$3" "$(dirname "$0")/seen.json"
echo "No changes in database schema were found - cannot generate a migration."
exit 1
"#;

const FAILS: &str = r#"echo "Error: connect ECONNREFUSED" >&2
exit 2
"#;

const CREATES: &str = r#"echo "$2" > "$(dirname "$0")/target.txt"
echo "Migration $2 has been created."
"#;

/// Project with a sqlite database, one model and a mock tool in `<tmp>/tool/tool.sh`.
fn project(tmp: &Path, tool_body: &str) -> (Application, MigrationTool) {
    fs::write(
        tmp.join("application.yaml"),
        format!(
            "app:\n  name: shop\ndatabase:\n  url: \"sqlite://{}?mode=rwc\"\n",
            tmp.join("app.db").display()
        ),
    )
    .unwrap();
    fs::create_dir_all(tmp.join("api/models")).unwrap();
    fs::write(
        tmp.join("api/models/user.yaml"),
        "columns:\n  email:\n    type: string\n",
    )
    .unwrap();
    let tool = write_tool(tmp, tool_body);
    (AppLoader::new(tmp).load().unwrap(), tool)
}

fn write_tool(tmp: &Path, body: &str) -> MigrationTool {
    let dir = tmp.join("tool");
    fs::create_dir_all(&dir).unwrap();
    let script = dir.join("tool.sh");
    fs::write(&script, body).unwrap();
    MigrationTool::parse(&format!("sh {}", script.display()), tmp).unwrap()
}

fn leftover_artifacts(root: &Path) -> Vec<String> {
    fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".cambusa-migration-"))
        .collect()
}

fn name() -> MigrationName {
    MigrationName::with_timestamp(1_700_000_000_000, "add-users").unwrap()
}

// ── Fake data source ────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Probe {
    initialized: Arc<AtomicBool>,
    destroyed: Arc<AtomicUsize>,
    ran: Arc<AtomicUsize>,
}

struct FakeDb {
    options: DataSourceOptions,
    probe: Probe,
    fail_init: bool,
    fail_run: bool,
}

impl FakeDb {
    fn new(probe: &Probe) -> Self {
        Self {
            options: DataSourceOptions {
                kind: DatabaseKind::Sqlite,
                url: "sqlite::memory:".into(),
                pool_size: 1,
                migrations: "migrations".into(),
                migrations_table: "cambusa_migrations".into(),
            },
            probe: probe.clone(),
            fail_init: false,
            fail_run: false,
        }
    }
}

impl DataSource for FakeDb {
    fn options(&self) -> &DataSourceOptions {
        &self.options
    }

    fn is_initialized(&self) -> bool {
        self.probe.initialized.load(Ordering::SeqCst)
    }

    fn initialize(&self) -> BoxFuture<'_, Result<(), DataSourceError>> {
        Box::pin(async move {
            if self.fail_init {
                return Err(DataSourceError::connect(std::io::Error::other(
                    "connection refused",
                )));
            }
            self.probe.initialized.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn run_migrations(&self) -> BoxFuture<'_, Result<Vec<AppliedMigration>, DataSourceError>> {
        Box::pin(async move {
            self.probe.ran.fetch_add(1, Ordering::SeqCst);
            if self.fail_run {
                return Err(DataSourceError::NotInitialized);
            }
            Ok(vec![AppliedMigration {
                name: "1700000000000-init".into(),
                timestamp: 1_700_000_000_000,
            }])
        })
    }

    fn applied_migrations(
        &self,
    ) -> BoxFuture<'_, Result<Vec<AppliedMigration>, DataSourceError>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn destroy(&self) -> BoxFuture<'_, Result<(), DataSourceError>> {
        Box::pin(async move {
            self.probe.initialized.store(false, Ordering::SeqCst);
            self.probe.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

fn fake_app(root: &Path, db: FakeDb) -> Application {
    Application::new(root, "shop", CambusaConfig::empty()).with_db(Box::new(db))
}

// ── migrations:generate ─────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn generate_success_reports_name_and_removes_artifact() {
    let tmp = TempDir::new().unwrap();
    let (app, tool) = project(tmp.path(), GENERATES);

    let outcome = migrations::generate_with(&app, &tool, name()).await.unwrap();

    let GenerateOutcome::Generated { name: generated, output } = outcome else {
        panic!("expected a generated migration");
    };
    assert_eq!(generated.as_str(), "1700000000000-add-users");
    assert!(output.contains("has been generated successfully"));
    assert!(leftover_artifacts(tmp.path()).is_empty());

    let target = tmp.path().join("migrations/1700000000000-add-users");
    assert!(target.is_file());
    let seen_target = fs::read_to_string(tmp.path().join("tool/target.txt")).unwrap();
    assert_eq!(Path::new(seen_target.trim()), target);
    assert!(!app.db().unwrap().is_initialized());
}

#[tokio::test]
#[serial]
async fn generate_hands_connection_and_models_to_tool() {
    let tmp = TempDir::new().unwrap();
    let (app, tool) = project(tmp.path(), GENERATES);

    migrations::generate_with(&app, &tool, name()).await.unwrap();

    let seen: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("tool/seen.json")).unwrap())
            .unwrap();
    assert_eq!(seen["type"], "sqlite");
    assert!(seen["url"].as_str().unwrap().starts_with("sqlite://"));
    assert_eq!(seen["migrations"], "migrations");
    assert_eq!(seen["migrationsTable"], "cambusa_migrations");
    assert_eq!(seen["entities"]["user"]["columns"]["email"]["type"], "string");
}

#[tokio::test]
#[serial]
async fn generate_no_changes_is_distinct_success() {
    let tmp = TempDir::new().unwrap();
    let (app, tool) = project(tmp.path(), NO_CHANGES);

    let outcome = migrations::generate_with(&app, &tool, name()).await.unwrap();

    assert_eq!(outcome, GenerateOutcome::NoChanges);
    assert!(tmp.path().join("tool/seen.json").is_file());
    assert!(leftover_artifacts(tmp.path()).is_empty());
    assert!(!tmp.path().join("migrations/1700000000000-add-users").exists());
}

#[tokio::test]
#[serial]
async fn generate_tool_failure_propagates_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let (app, tool) = project(tmp.path(), FAILS);

    let err = migrations::generate_with(&app, &tool, name()).await.unwrap_err();

    let CommandError::Tool { status, detail, .. } = &err else {
        panic!("expected a tool error, got {err}");
    };
    assert_eq!(*status, Some(2));
    assert!(detail.contains("ECONNREFUSED"));
    assert!(leftover_artifacts(tmp.path()).is_empty());
}

#[tokio::test]
#[serial]
async fn generate_missing_tool_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = project(tmp.path(), GENERATES);
    let tool = MigrationTool::parse("cambusa-no-such-tool-binary", tmp.path()).unwrap();

    let err = migrations::generate_with(&app, &tool, name()).await.unwrap_err();

    assert!(matches!(err, CommandError::Tool { status: None, .. }));
    assert!(leftover_artifacts(tmp.path()).is_empty());
}

#[tokio::test]
#[serial]
async fn generate_without_database_fails_before_tool() {
    let tmp = TempDir::new().unwrap();
    let tool = write_tool(tmp.path(), GENERATES);
    let app = Application::new(tmp.path(), "shop", CambusaConfig::empty());

    let err = migrations::generate_with(&app, &tool, name()).await.unwrap_err();

    assert!(matches!(err, CommandError::NoDatabase));
    assert!(!tmp.path().join("tool/seen.json").exists());
}

#[tokio::test]
#[serial]
async fn generate_connection_failure_skips_tool() {
    let tmp = TempDir::new().unwrap();
    let tool = write_tool(tmp.path(), GENERATES);
    let probe = Probe::default();
    let app = fake_app(
        tmp.path(),
        FakeDb {
            fail_init: true,
            ..FakeDb::new(&probe)
        },
    );

    let err = migrations::generate_with(&app, &tool, name()).await.unwrap_err();

    assert!(matches!(err, CommandError::Connection(_)));
    assert!(!tmp.path().join("tool/seen.json").exists());
    assert!(leftover_artifacts(tmp.path()).is_empty());
}

#[tokio::test]
#[serial]
async fn generate_keeps_an_already_open_connection() {
    let tmp = TempDir::new().unwrap();
    let tool = write_tool(tmp.path(), NO_CHANGES);
    let probe = Probe::default();
    probe.initialized.store(true, Ordering::SeqCst);
    let app = fake_app(tmp.path(), FakeDb::new(&probe));

    migrations::generate_with(&app, &tool, name()).await.unwrap();

    assert_eq!(probe.destroyed.load(Ordering::SeqCst), 0);
    assert!(probe.initialized.load(Ordering::SeqCst));
}

#[test]
fn artifact_guard_removes_file_on_drop() {
    let tmp = TempDir::new().unwrap();
    let path = MigrationArtifact::path_for(tmp.path(), &name());
    fs::write(&path, "{}").unwrap();
    {
        let options = FakeDb::new(&Probe::default()).options;
        let entities = Default::default();
        let guard = MigrationArtifact::write(
            tmp.path(),
            &name(),
            &migrations::ArtifactContents {
                options: &options,
                entities: &entities,
            },
        )
        .unwrap();
        assert_eq!(guard.path(), path);
        assert!(path.is_file());
    }
    assert!(!path.exists());
}

// ── migrations:create ───────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn create_invokes_tool_without_artifact_or_connection() {
    let tmp = TempDir::new().unwrap();
    let tool = write_tool(tmp.path(), CREATES);
    let probe = Probe::default();
    let app = fake_app(tmp.path(), FakeDb::new(&probe));

    let output = migrations::create_with(&app, &tool, &name()).await.unwrap();

    assert!(output.stdout.contains("has been created"));
    let target = fs::read_to_string(tmp.path().join("tool/target.txt")).unwrap();
    assert_eq!(
        Path::new(target.trim()),
        tmp.path().join("migrations/1700000000000-add-users")
    );
    assert!(tmp.path().join("migrations").is_dir());
    assert!(!probe.initialized.load(Ordering::SeqCst));
    assert!(leftover_artifacts(tmp.path()).is_empty());
}

#[tokio::test]
#[serial]
async fn create_tool_failure_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let tool = write_tool(tmp.path(), FAILS);
    let app = Application::new(tmp.path(), "shop", CambusaConfig::empty());

    let err = migrations::create_with(&app, &tool, &name()).await.unwrap_err();
    assert!(matches!(err, CommandError::Tool { status: Some(2), .. }));
}

// ── migrations:run ──────────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn run_applies_pending_then_nothing() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = project(tmp.path(), GENERATES);
    fs::create_dir_all(tmp.path().join("migrations")).unwrap();
    fs::write(
        tmp.path().join("migrations/1700000000001-create-users.sql"),
        "CREATE TABLE users (id INTEGER PRIMARY KEY);",
    )
    .unwrap();

    let first = migrations::run_with(&app).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].name, "1700000000001-create-users");
    assert!(!app.db().unwrap().is_initialized());

    let second = migrations::run_with(&app).await.unwrap();
    assert!(second.is_empty());
    assert!(!app.db().unwrap().is_initialized());
}

#[tokio::test]
#[serial]
async fn run_closes_connection_on_failure() {
    let tmp = TempDir::new().unwrap();
    let probe = Probe::default();
    let app = fake_app(
        tmp.path(),
        FakeDb {
            fail_run: true,
            ..FakeDb::new(&probe)
        },
    );

    let err = migrations::run_with(&app).await.unwrap_err();

    assert!(matches!(err, CommandError::Database(_)));
    assert_eq!(probe.ran.load(Ordering::SeqCst), 1);
    assert_eq!(probe.destroyed.load(Ordering::SeqCst), 1);
    assert!(!probe.initialized.load(Ordering::SeqCst));
}

#[tokio::test]
#[serial]
async fn run_without_database_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let app = Application::new(tmp.path(), "shop", CambusaConfig::empty());
    let err = migrations::run_with(&app).await.unwrap_err();
    assert!(matches!(err, CommandError::NoDatabase));
}

#[tokio::test]
#[serial]
async fn run_connection_failure_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let probe = Probe::default();
    let app = fake_app(
        tmp.path(),
        FakeDb {
            fail_init: true,
            ..FakeDb::new(&probe)
        },
    );

    let err = migrations::run_with(&app).await.unwrap_err();
    assert!(matches!(err, CommandError::Connection(_)));
    assert_eq!(probe.ran.load(Ordering::SeqCst), 0);
}

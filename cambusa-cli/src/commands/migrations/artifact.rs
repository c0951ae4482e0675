use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cambusa_core::DataSourceOptions;
use serde::Serialize;

use super::MigrationName;

/// Connection description handed to the migration tool.
#[derive(Debug, Serialize)]
pub struct ArtifactContents<'a> {
    #[serde(flatten)]
    pub options: &'a DataSourceOptions,
    pub entities: &'a BTreeMap<String, serde_json::Value>,
}

/// A transient artifact file, removed when the guard is dropped.
///
/// The guard exists before the file is written, so a failed or partial
/// write is cleaned up too.
#[derive(Debug)]
pub struct MigrationArtifact {
    path: PathBuf,
}

impl MigrationArtifact {
    /// `<root>/.cambusa-migration-<name>.json`
    pub fn path_for(root: &Path, name: &MigrationName) -> PathBuf {
        root.join(format!(".cambusa-migration-{name}.json"))
    }

    /// Serialize `contents` to the artifact path for `name`.
    pub fn write(
        root: &Path,
        name: &MigrationName,
        contents: &ArtifactContents<'_>,
    ) -> std::io::Result<Self> {
        let guard = Self {
            path: Self::path_for(root, name),
        };
        let json = serde_json::to_vec_pretty(contents)?;
        std::fs::write(&guard.path, json)?;
        tracing::debug!(path = %guard.path.display(), "migration artifact written");
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MigrationArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "migration artifact removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove migration artifact"
            ),
        }
    }
}

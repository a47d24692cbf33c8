use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use steward_core::artifact::{parse_artifact_file_name, ArtifactFile};
use steward_core::capability::Capability;

/// Discovers artifact files for each capability in the output directory.
/// The directory is written once by the execution stage and read once here.
pub struct ArtifactCollector {
    dir: PathBuf,
}

impl ArtifactCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable candidate order: the implicit instance first, then ascending
    /// ordinal. A missing directory yields an empty batch.
    pub fn collect(&self, capability: Capability) -> Result<Vec<ArtifactFile>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read artifact directory {}", self.dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.context("failed to read artifact directory entry")?;
            if !entry.file_type().map(|kind| kind.is_file()).unwrap_or(false) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(artifact) = parse_artifact_file_name(capability, &file_name) {
                files.push(artifact);
            }
        }
        files.sort_by(|left, right| match (left.ordinal, right.ordinal) {
            (None, None) => left.file_name.cmp(&right.file_name),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| left.file_name.cmp(&right.file_name)),
        });
        Ok(files)
    }

    pub fn read_payload(&self, file_name: &str) -> Result<String> {
        let path = self.dir.join(file_name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read artifact {}", path.display()))
    }
}

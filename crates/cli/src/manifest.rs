use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST_NAME: &str = "patchwork.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeManifest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeManifest {
    /// Base patch files, applied before any files given on the command line.
    ///
    /// Relative paths resolve against the manifest's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patches: Option<Vec<PathBuf>>,

    /// Print the merged record on one line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compact: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub base_dir: PathBuf,
    pub manifest: Manifest,
}

impl LoadedManifest {
    pub fn patch_paths(&self) -> Vec<PathBuf> {
        self.manifest
            .merge
            .as_ref()
            .and_then(|m| m.patches.as_ref())
            .map(|paths| {
                paths
                    .iter()
                    .map(|p| self.base_dir.join(p))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn compact(&self) -> bool {
        self.manifest
            .merge
            .as_ref()
            .and_then(|m| m.compact)
            .unwrap_or(false)
    }
}

/// Where `merge` looks for its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// Named with `--manifest`; it must exist.
    Explicit(PathBuf),
    /// `patchwork.json` in the working directory; skipped when absent.
    Discovered(PathBuf),
}

impl ManifestSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::Discovered(path) => path,
        }
    }

    pub fn load(&self) -> Result<Option<LoadedManifest>> {
        let path = self.path();
        if !path.exists() {
            if let Self::Explicit(_) = self {
                bail!("manifest not found: {}", path.display());
            }
            tracing::debug!(path = %path.display(), "no manifest discovered");
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse manifest JSON: {}", path.display()))?;

        // Patch paths in the manifest are relative to the manifest itself.
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        tracing::debug!(path = %path.display(), "loaded manifest");

        Ok(Some(LoadedManifest { base_dir, manifest }))
    }
}

pub fn write_default_manifest(project_dir: &Path) -> Result<PathBuf> {
    let dest = project_dir.join(DEFAULT_MANIFEST_NAME);

    let manifest = Manifest {
        schema_version: Some(1),
        merge: Some(MergeManifest {
            patches: Some(Vec::new()),
            compact: Some(false),
        }),
    };

    let bytes = serde_json::to_vec_pretty(&manifest).context("failed to serialize manifest")?;
    let mut out = String::from_utf8(bytes).context("manifest is not valid UTF-8")?;
    out.push('\n');

    let tmp = dest.with_extension("tmp");
    fs::write(&tmp, out.as_bytes())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, &dest)
        .with_context(|| format!("failed to move {} into place", dest.display()))?;
    Ok(dest)
}

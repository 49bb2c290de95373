// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ephemeral document store.
//
// Each job's document is written to `<staging_dir>/<job-id>.job`, opened with
// create-new semantics, so concurrent jobs can never share or overwrite a
// file.  The returned `StagedDocument` owns the file: it is removed by an
// explicit `release`, or by `Drop` if the owning scope exits any other way.
//
// Capacity is tracked in-process (bytes and file count) so that a saturated
// staging area refuses new documents instead of filling the disk.

use std::io::{ErrorKind, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::{debug, info, warn};

use spoolgate_core::error::StorageError;
use spoolgate_core::types::JobId;

/// File extension used for staged documents.
const STAGED_EXTENSION: &str = "job";

/// Size limits enforced by the staging area.
#[derive(Debug, Clone, Copy)]
pub struct StagingLimits {
    /// Largest single document.
    pub max_payload_bytes: u64,
    /// Total bytes staged at once across all jobs.
    pub capacity_bytes: u64,
}

#[derive(Debug)]
struct Inner {
    dir: PathBuf,
    limits: StagingLimits,
    bytes_in_use: AtomicU64,
    files_in_use: AtomicUsize,
}

impl Inner {
    /// Reserve `size` bytes of capacity, or report saturation.
    fn reserve(&self, size: u64) -> Result<(), StorageError> {
        let capacity = self.limits.capacity_bytes;
        self.bytes_in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |in_use| {
                in_use.checked_add(size).filter(|total| *total <= capacity)
            })
            .map(|_| ())
            .map_err(|in_use| StorageError::Saturated { in_use, capacity })
    }

    fn unreserve(&self, size: u64) {
        self.bytes_in_use.fetch_sub(size, Ordering::AcqRel);
    }
}

/// The staging directory shared by all in-flight jobs.
///
/// Cheap to clone; clones share capacity accounting.
#[derive(Debug, Clone)]
pub struct StagingArea {
    inner: Arc<Inner>,
}

impl StagingArea {
    /// Open the staging area at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>, limits: StagingLimits) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!(path = %dir.display(), "staging area ready");
        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                limits,
                bytes_in_use: AtomicU64::new(0),
                files_in_use: AtomicUsize::new(0),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn limits(&self) -> StagingLimits {
        self.inner.limits
    }

    /// Path a given job's document is staged at.
    pub fn path_for(&self, job_id: JobId) -> PathBuf {
        self.inner.dir.join(format!("{job_id}.{STAGED_EXTENSION}"))
    }

    /// Number of documents currently staged by this process.
    pub fn staged_count(&self) -> usize {
        self.inner.files_in_use.load(Ordering::Acquire)
    }

    /// Bytes currently staged by this process.
    pub fn staged_bytes(&self) -> u64 {
        self.inner.bytes_in_use.load(Ordering::Acquire)
    }

    /// Write `payload` to a new file owned by `job_id`.
    ///
    /// The write runs on the blocking pool and finishes even if the caller
    /// stops waiting; a document nobody collects is dropped, which removes
    /// its file and returns its capacity.
    ///
    /// # Errors
    ///
    /// `Empty` / `TooLarge` for unusable payloads, `Saturated` when the
    /// capacity budget is spent, `Io` if the file cannot be written.  Any
    /// partially written file is removed before the error is returned.
    pub async fn stage(
        &self,
        job_id: JobId,
        payload: &[u8],
    ) -> Result<StagedDocument, StorageError> {
        let size = payload.len() as u64;
        if size == 0 {
            return Err(StorageError::Empty);
        }
        let limit = self.inner.limits.max_payload_bytes;
        if size > limit {
            return Err(StorageError::TooLarge { size, limit });
        }

        let reservation = Reservation::take(Arc::clone(&self.inner), size)?;
        let path = self.path_for(job_id);
        let payload = payload.to_vec();

        let task = tokio::task::spawn_blocking(move || {
            write_staged(reservation, job_id, path, &payload)
        });
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(StorageError::Io(std::io::Error::other(e))),
        }
    }

    /// Remove staged files left behind by an earlier process.
    ///
    /// Must run before this process stages anything: it deletes every
    /// `*.job` file in the directory.
    pub async fn sweep_stale(&self) -> Result<usize, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.inner.dir).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_staged = path
                .extension()
                .is_some_and(|ext| ext == STAGED_EXTENSION);
            if !is_staged || !entry.file_type().await?.is_file() {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not remove stale staged file");
                }
            }
        }

        if removed > 0 {
            info!(removed, dir = %self.inner.dir.display(), "removed stale staged documents");
        }
        Ok(removed)
    }
}

/// A document on disk, owned by exactly one job.
///
/// The file is removed by [`release`](Self::release) or, failing that, when
/// the handle is dropped.
#[derive(Debug)]
pub struct StagedDocument {
    job_id: JobId,
    path: PathBuf,
    size: u64,
    area: Arc<Inner>,
    released: bool,
}

impl StagedDocument {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove the staged file.
    ///
    /// Idempotent: releasing twice, or releasing a file that has already
    /// disappeared, is not an error.
    pub async fn release(&mut self) -> Result<(), StorageError> {
        if self.released {
            return Ok(());
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(job_id = %self.job_id, "staged file already gone");
            }
            Err(e) => return Err(StorageError::Io(e)),
        }
        self.mark_released();
        debug!(job_id = %self.job_id, "staged document released");
        Ok(())
    }

    fn mark_released(&mut self) {
        self.released = true;
        self.area.unreserve(self.size);
        self.area.files_in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Drop for StagedDocument {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(job_id = %self.job_id, "staged document released on drop");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                // Still on disk, so it keeps counting against capacity.
                warn!(
                    job_id = %self.job_id,
                    path = %self.path.display(),
                    error = %e,
                    "could not remove staged document on drop"
                );
                return;
            }
        }
        self.mark_released();
    }
}

/// Capacity held for a document that is not yet on disk.
struct Reservation {
    area: Arc<Inner>,
    size: u64,
    committed: bool,
}

impl Reservation {
    fn take(area: Arc<Inner>, size: u64) -> Result<Self, StorageError> {
        area.reserve(size)?;
        Ok(Self {
            area,
            size,
            committed: false,
        })
    }

    /// Hand the reservation over to a staged file.
    fn into_document(mut self, job_id: JobId, path: PathBuf) -> StagedDocument {
        self.committed = true;
        self.area.files_in_use.fetch_add(1, Ordering::AcqRel);
        StagedDocument {
            job_id,
            path,
            size: self.size,
            area: Arc::clone(&self.area),
            released: false,
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.committed {
            self.area.unreserve(self.size);
        }
    }
}

/// Create the file and fill it.  From the moment the file exists it is owned
/// by a `StagedDocument`, so every exit below removes it unless it is
/// returned.
fn write_staged(
    reservation: Reservation,
    job_id: JobId,
    path: PathBuf,
    payload: &[u8],
) -> Result<StagedDocument, StorageError> {
    let mut file = create_new(&path)?;
    let document = reservation.into_document(job_id, path);

    let written = file
        .write_all(payload)
        .and_then(|()| file.flush())
        .and_then(|()| file.sync_data());
    drop(file);

    if let Err(e) = written {
        warn!(job_id = %job_id, error = %e, "staging write failed, removing partial file");
        drop(document);
        return Err(StorageError::Io(e));
    }

    debug!(
        job_id = %job_id,
        bytes = document.size,
        path = %document.path.display(),
        "document staged"
    );
    Ok(document)
}

fn create_new(path: &Path) -> std::io::Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path)
}

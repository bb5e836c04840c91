//! Upload orchestration.
//!
//! One [`UploadOrchestrator`] exists per authenticated session. It owns the
//! [`UploadQueue`] and drives each pending item through the pipeline:
//!
//! ```text
//! begin ─▶ duplicate check ─▶ audit metadata ─▶ multipart | resumable ─▶ ownership ─▶ success
//!              │ match                                  │ error               │ error (Required)
//!              ▼                                        ▼                     ▼
//!           skipped                                   error                 error
//! ```
//!
//! Batches are processed strictly sequentially: one file's whole pipeline
//! completes before the next file begins.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audit::build_upload_metadata;
use crate::drive::{DriveApi, DriveError, DriveResult, WindowOutcome};
use crate::models::{AuthSession, LocalFile, UploadItem, UploadMetadata, UploadStatus};
use crate::query::{duplicate_query, find_duplicate, DUPLICATE_PAGE_SIZE};
use crate::queue::{TransitionError, UploadQueue};

/// Files up to this size go through a single multipart request.
pub const SIMPLE_UPLOAD_LIMIT: u64 = 5 * 1024 * 1024;

/// Resumable uploads send the payload in windows of this size.
pub const WINDOW_SIZE: u64 = 256 * 1024;

/// Consecutive windows without server-acknowledged progress before giving up.
const MAX_STALLED_WINDOWS: u32 = 3;

/// What to do after a successful upload about reassigning ownership to the
/// destination folder's owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OwnershipPolicy {
    /// Never transfer ownership.
    Disabled,
    /// Try to transfer; a failure is logged and the upload still succeeds.
    #[default]
    BestEffort,
    /// Try to transfer; a failure marks the upload as failed.
    Required,
}

impl FromStr for OwnershipPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(OwnershipPolicy::Disabled),
            "best-effort" => Ok(OwnershipPolicy::BestEffort),
            "required" => Ok(OwnershipPolicy::Required),
            other => Err(format!(
                "unknown ownership policy '{}': expected disabled, best-effort, or required",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder_id: Option<String>,
    pub simple_upload_limit: u64,
    pub window_size: u64,
    pub ownership: OwnershipPolicy,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            folder_id: None,
            simple_upload_limit: SIMPLE_UPLOAD_LIMIT,
            window_size: WINDOW_SIZE,
            ownership: OwnershipPolicy::default(),
        }
    }
}

/// Per-batch counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Observable steps of the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Started { index: usize, name: String },
    Progress { index: usize, name: String, percent: u8 },
    Skipped { index: usize, name: String, existing_id: String },
    Succeeded { index: usize, name: String, remote_id: String },
    Failed { index: usize, name: String, message: String, hint: String },
    BatchFinished(BatchSummary),
}

/// Receives [`UploadEvent`]s as the pipeline advances.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &UploadEvent);
}

/// Discards every event.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_event(&self, _event: &UploadEvent) {}
}

type Clock = Box<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

pub struct UploadOrchestrator<D: DriveApi> {
    drive: D,
    session: AuthSession,
    options: UploadOptions,
    queue: UploadQueue,
    clock: Clock,
}

impl<D: DriveApi> UploadOrchestrator<D> {
    pub fn new(drive: D, session: AuthSession, options: UploadOptions) -> Self {
        Self {
            drive,
            session,
            options,
            queue: UploadQueue::new(),
            clock: Box::new(|| chrono::Local::now().fixed_offset()),
        }
    }

    /// Replace the clock used for audit timestamps.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<FixedOffset> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn drive(&self) -> &D {
        &self.drive
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    pub fn set_folder(&mut self, folder_id: Option<String>) {
        self.options.folder_id = folder_id.filter(|f| !f.is_empty());
    }

    pub fn items(&self) -> &[UploadItem] {
        self.queue.items()
    }

    pub fn has_pending(&self) -> bool {
        self.queue.has_pending()
    }

    pub fn enqueue<I>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = LocalFile>,
    {
        self.queue.enqueue(files)
    }

    pub fn remove(&mut self, index: usize) -> Result<UploadItem, TransitionError> {
        self.queue.remove(index)
    }

    /// Drop every queued item (used on logout).
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Upload every pending item, one at a time, in submission order.
    pub async fn dispatch_batch(&mut self, sink: &dyn ProgressSink) -> BatchSummary {
        let pending = self.queue.pending_indices();
        info!(count = pending.len(), "starting upload batch");

        let mut summary = BatchSummary::default();
        for index in pending {
            self.upload_one(index, sink).await;
            summary.attempted += 1;
            match self.queue.get(index).map(|item| item.status) {
                Some(UploadStatus::Success) => summary.uploaded += 1,
                Some(UploadStatus::Skipped) => summary.skipped += 1,
                _ => summary.failed += 1,
            }
        }

        info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "upload batch finished"
        );
        sink.on_event(&UploadEvent::BatchFinished(summary));
        summary
    }

    /// Put a failed item back to pending and, if nothing is in flight,
    /// dispatch a new batch.
    pub async fn retry(
        &mut self,
        index: usize,
        sink: &dyn ProgressSink,
    ) -> Result<Option<BatchSummary>, TransitionError> {
        self.queue.retry(index)?;
        if self.queue.is_uploading() {
            return Ok(None);
        }
        Ok(Some(self.dispatch_batch(sink).await))
    }

    /// Run the full pipeline for one pending item. Failures are recorded on
    /// the item, never returned.
    pub async fn upload_one(&mut self, index: usize, sink: &dyn ProgressSink) {
        if let Err(err) = self.queue.begin(index) {
            warn!(error = %err, "item not eligible for upload");
            return;
        }
        let Some(file) = self.queue.get(index).map(|item| item.file.clone()) else {
            return;
        };
        sink.on_event(&UploadEvent::Started {
            index,
            name: file.name.clone(),
        });
        debug!(name = %file.name, size = file.size, "uploading");

        if let Some(existing_id) = self.check_duplicate(&file).await {
            info!(name = %file.name, existing_id = %existing_id, "skipping duplicate");
            self.mark(index, |q| q.skip(index, "File already exists"));
            sink.on_event(&UploadEvent::Skipped {
                index,
                name: file.name.clone(),
                existing_id,
            });
            return;
        }

        let metadata = build_upload_metadata(
            &file,
            &self.session,
            self.options.folder_id.as_deref(),
            (self.clock)(),
        );

        let uploaded = if file.size <= self.options.simple_upload_limit {
            self.simple_upload(&file, &metadata).await
        } else {
            self.resumable_upload(index, &file, &metadata, sink).await
        };

        let result = match uploaded {
            Ok(remote_id) => self.finish_ownership(&remote_id).await.map(|()| remote_id),
            Err(err) => Err(err),
        };

        match result {
            Ok(remote_id) => {
                info!(name = %file.name, remote_id = %remote_id, "upload succeeded");
                self.mark(index, |q| q.succeed(index, remote_id.clone()));
                sink.on_event(&UploadEvent::Succeeded {
                    index,
                    name: file.name.clone(),
                    remote_id,
                });
            }
            Err(err) => {
                warn!(name = %file.name, error = %err, "upload failed");
                let hint = err.remediation_hint();
                self.mark(index, |q| q.fail(index, hint.clone()));
                sink.on_event(&UploadEvent::Failed {
                    index,
                    name: file.name.clone(),
                    message: err.to_string(),
                    hint,
                });
            }
        }
    }

    fn mark<F>(&mut self, index: usize, change: F)
    where
        F: FnOnce(&mut UploadQueue) -> Result<(), TransitionError>,
    {
        if let Err(err) = change(&mut self.queue) {
            warn!(index, error = %err, "queue transition rejected");
        }
    }

    /// Id of an existing remote copy, if any. A failed lookup counts as no
    /// duplicate.
    async fn check_duplicate(&self, file: &LocalFile) -> Option<String> {
        let query = duplicate_query(&file.name, self.options.folder_id.as_deref());
        match self.drive.list_files(&query, DUPLICATE_PAGE_SIZE).await {
            Ok(remotes) => find_duplicate(&remotes, file.size, &self.session.email).map(|r| r.id.clone()),
            Err(err) => {
                warn!(name = %file.name, error = %err, "duplicate check failed, uploading anyway");
                None
            }
        }
    }

    async fn simple_upload(&self, file: &LocalFile, metadata: &UploadMetadata) -> DriveResult<String> {
        let bytes = file.read_all()?;
        self.drive
            .create_multipart(metadata, bytes, &file.mime_type)
            .await
    }

    async fn resumable_upload(
        &mut self,
        index: usize,
        file: &LocalFile,
        metadata: &UploadMetadata,
        sink: &dyn ProgressSink,
    ) -> DriveResult<String> {
        let session_url = self
            .drive
            .start_resumable(metadata, file.size, &file.mime_type)
            .await?;
        debug!(name = %file.name, "resumable session opened");

        let window = self.options.window_size.max(1);
        let mut offset = 0u64;
        let mut stalled = 0u32;

        while offset < file.size {
            let len = window.min(file.size - offset);
            let bytes = file.read_range(offset, len)?;
            let sent = bytes.len() as u64;
            if sent == 0 {
                return Err(DriveError::Io(format!(
                    "{} ended at byte {} of {}",
                    file.name, offset, file.size
                )));
            }

            let outcome = self
                .drive
                .put_window(&session_url, offset, bytes, file.size, &file.mime_type)
                .await?;

            let next = match outcome {
                WindowOutcome::Complete { id } => return Ok(id),
                // Trust the server's acknowledged range over the bytes sent.
                WindowOutcome::Incomplete {
                    acknowledged: Some(end),
                } => end + 1,
                WindowOutcome::Incomplete { acknowledged: None } => offset + sent,
            };

            if next <= offset {
                stalled += 1;
                if stalled >= MAX_STALLED_WINDOWS {
                    return Err(DriveError::Protocol(format!(
                        "server stopped acknowledging data at byte {}",
                        offset
                    )));
                }
            } else {
                stalled = 0;
            }
            offset = next.max(offset).min(file.size);

            let percent = percent_of(offset, file.size);
            if let Ok(percent) = self.queue.advance(index, percent) {
                sink.on_event(&UploadEvent::Progress {
                    index,
                    name: file.name.clone(),
                    percent,
                });
            }
        }

        Err(DriveError::Protocol(
            "upload ended without a completion response".to_string(),
        ))
    }

    async fn finish_ownership(&self, file_id: &str) -> DriveResult<()> {
        if self.options.ownership == OwnershipPolicy::Disabled {
            return Ok(());
        }
        match self.transfer_ownership(file_id).await {
            Ok(()) => Ok(()),
            Err(err) if self.options.ownership == OwnershipPolicy::Required => Err(err),
            Err(err) => {
                warn!(file_id, error = %err, "ownership transfer failed; file stays owned by uploader");
                Ok(())
            }
        }
    }

    /// Hand ownership of `file_id` to the destination folder's owner.
    async fn transfer_ownership(&self, file_id: &str) -> DriveResult<()> {
        let Some(folder_id) = self.options.folder_id.as_deref() else {
            debug!("no folder set, ownership stays with uploader");
            return Ok(());
        };
        let owners = self.drive.folder_owners(folder_id).await?;
        let Some(owner) = owners.into_iter().next() else {
            warn!(folder_id, "folder has no owner email, skipping ownership transfer");
            return Ok(());
        };
        if owner == self.session.email {
            debug!("uploader already owns the folder");
            return Ok(());
        }

        let permissions = self.drive.list_permissions(file_id).await?;
        let existing = permissions.into_iter().find(|p| {
            p.email_address.as_deref() == Some(owner.as_str())
                && (p.role == "writer" || p.role == "owner")
        });
        let permission_id = match existing {
            Some(p) => p.id,
            None => {
                self.drive
                    .create_permission(file_id, "writer", "user", &owner)
                    .await?
            }
        };
        self.drive.transfer_ownership(file_id, &permission_id).await?;
        info!(file_id, owner = %owner, "ownership transferred");
        Ok(())
    }
}

fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

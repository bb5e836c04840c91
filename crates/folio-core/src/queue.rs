//! In-memory upload queue and its per-item state machine.
//!
//! ```text
//! Pending ──begin──▶ Uploading ──succeed──▶ Success
//!    ▲                   │  └────skip─────▶ Skipped
//!    │                   └──────fail─────▶ Error
//!    └──────────────retry────────────────────┘
//! ```
//!
//! Every transition is checked; an illegal one returns [`TransitionError`]
//! and leaves the item untouched.

use thiserror::Error;

use crate::models::{LocalFile, UploadItem, UploadStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("no queued item at index {0}")]
    NoSuchItem(usize),
    #[error("cannot {action} item '{name}' while it is {status}")]
    Illegal {
        action: &'static str,
        name: String,
        status: UploadStatus,
    },
}

/// Ordered queue of files for one upload session.
#[derive(Debug, Default)]
pub struct UploadQueue {
    items: Vec<UploadItem>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append files, skipping any whose `(name, size)` is already queued.
    ///
    /// Returns the number of files actually added.
    pub fn enqueue<I>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = LocalFile>,
    {
        let mut added = 0;
        for file in files {
            if self.items.iter().any(|item| item.same_identity(&file)) {
                tracing::debug!(name = %file.name, size = file.size, "already queued, ignoring");
                continue;
            }
            self.items.push(UploadItem::new(file));
            added += 1;
        }
        added
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&UploadItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.items.iter().any(|i| i.status == UploadStatus::Pending)
    }

    pub fn is_uploading(&self) -> bool {
        self.items.iter().any(|i| i.status == UploadStatus::Uploading)
    }

    /// Indices of pending items, in submission order.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == UploadStatus::Pending)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn remove(&mut self, index: usize) -> Result<UploadItem, TransitionError> {
        let item = self.item(index)?;
        if item.status == UploadStatus::Uploading {
            return Err(illegal("remove", item));
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// `Error → Pending`, resetting progress and the stored error.
    pub fn retry(&mut self, index: usize) -> Result<(), TransitionError> {
        let item = self.item_mut(index)?;
        if item.status != UploadStatus::Error {
            return Err(illegal("retry", item));
        }
        item.status = UploadStatus::Pending;
        item.progress = 0;
        item.error = None;
        Ok(())
    }

    pub fn begin(&mut self, index: usize) -> Result<(), TransitionError> {
        let item = self.item_mut(index)?;
        if item.status != UploadStatus::Pending {
            return Err(illegal("start", item));
        }
        item.status = UploadStatus::Uploading;
        item.progress = 0;
        Ok(())
    }

    /// Raise progress to `percent` (clamped to 100). Lower values are ignored.
    pub fn advance(&mut self, index: usize, percent: u8) -> Result<u8, TransitionError> {
        let item = self.uploading_mut(index, "advance")?;
        item.progress = item.progress.max(percent.min(100));
        Ok(item.progress)
    }

    pub fn succeed(&mut self, index: usize, remote_id: String) -> Result<(), TransitionError> {
        let item = self.uploading_mut(index, "complete")?;
        item.status = UploadStatus::Success;
        item.progress = 100;
        item.remote_id = Some(remote_id);
        item.error = None;
        Ok(())
    }

    pub fn skip(&mut self, index: usize, reason: &str) -> Result<(), TransitionError> {
        let item = self.uploading_mut(index, "skip")?;
        item.status = UploadStatus::Skipped;
        item.progress = 100;
        item.error = Some(reason.to_string());
        Ok(())
    }

    pub fn fail(&mut self, index: usize, message: String) -> Result<(), TransitionError> {
        let item = self.uploading_mut(index, "fail")?;
        item.status = UploadStatus::Error;
        item.error = Some(message);
        Ok(())
    }

    fn item(&self, index: usize) -> Result<&UploadItem, TransitionError> {
        self.items.get(index).ok_or(TransitionError::NoSuchItem(index))
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut UploadItem, TransitionError> {
        self.items
            .get_mut(index)
            .ok_or(TransitionError::NoSuchItem(index))
    }

    fn uploading_mut(
        &mut self,
        index: usize,
        action: &'static str,
    ) -> Result<&mut UploadItem, TransitionError> {
        let item = self.item_mut(index)?;
        if item.status != UploadStatus::Uploading {
            return Err(illegal(action, item));
        }
        Ok(item)
    }
}

fn illegal(action: &'static str, item: &UploadItem) -> TransitionError {
    TransitionError::Illegal {
        action,
        name: item.file.name.clone(),
        status: item.status,
    }
}

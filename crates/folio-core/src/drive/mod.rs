//! Remote storage abstraction.
//!
//! The [`DriveApi`] trait covers every Google Drive operation the upload
//! pipeline needs, so the orchestrator can run against the real REST API
//! or the in-memory implementation in [`memory`].
//!
//! # Operations
//!
//! | Method | Drive endpoint |
//! |--------|----------------|
//! | [`list_files`](DriveApi::list_files) | `GET files?q=…` |
//! | [`create_multipart`](DriveApi::create_multipart) | `POST upload/files?uploadType=multipart` |
//! | [`start_resumable`](DriveApi::start_resumable) | `POST upload/files?uploadType=resumable` |
//! | [`put_window`](DriveApi::put_window) | `PUT <session url>` with `Content-Range` |
//! | [`folder_owners`](DriveApi::folder_owners) | `GET files/{id}?fields=owners(emailAddress)` |
//! | [`list_permissions`](DriveApi::list_permissions) | `GET files/{id}/permissions` |
//! | [`create_permission`](DriveApi::create_permission) | `POST files/{id}/permissions` |
//! | [`transfer_ownership`](DriveApi::transfer_ownership) | `PATCH files/{id}/permissions/{pid}?transferOwnership=true` |

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Permission, RemoteFile, UploadMetadata};

/// Errors surfaced by a [`DriveApi`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriveError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("quota exceeded: {0}")]
    Quota(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("Drive API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl DriveError {
    /// Human-readable remediation for display next to a failed file.
    pub fn remediation_hint(&self) -> String {
        match self {
            DriveError::NotFound(msg) if msg.contains("File not found") => {
                "Folder access denied. The folder may not be shared with your Google account. \
                 Please contact the folder owner."
                    .to_string()
            }
            DriveError::NotFound(_) => {
                "Folder not found. The target folder may not exist or may not be accessible."
                    .to_string()
            }
            DriveError::PermissionDenied(_) => {
                "Permission denied. You may not have access to upload to this folder.".to_string()
            }
            DriveError::Quota(_) => {
                "Storage quota exceeded. Free up space or contact the folder owner.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for DriveError {
    fn from(err: std::io::Error) -> Self {
        DriveError::Io(err.to_string())
    }
}

pub type DriveResult<T> = Result<T, DriveError>;

/// Result of sending one window of a resumable upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    /// HTTP 308. `acknowledged` is the last byte offset the server reports
    /// having stored (the `N` of `Range: bytes=0-N`), when it says so.
    Incomplete { acknowledged: Option<u64> },
    /// Final response, carrying the new file's id.
    Complete { id: String },
}

/// Google Drive operations used by the upload pipeline.
#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn list_files(&self, query: &str, page_size: u32) -> DriveResult<Vec<RemoteFile>>;

    /// Upload metadata and bytes in a single request. Returns the new file id.
    async fn create_multipart(
        &self,
        metadata: &UploadMetadata,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> DriveResult<String>;

    /// Open a resumable session. Returns the session URL.
    async fn start_resumable(
        &self,
        metadata: &UploadMetadata,
        size: u64,
        mime_type: &str,
    ) -> DriveResult<String>;

    /// Send bytes `start..start + bytes.len()` of a `total`-byte upload.
    async fn put_window(
        &self,
        session_url: &str,
        start: u64,
        bytes: Vec<u8>,
        total: u64,
        mime_type: &str,
    ) -> DriveResult<WindowOutcome>;

    /// Owner email addresses of a folder.
    async fn folder_owners(&self, folder_id: &str) -> DriveResult<Vec<String>>;

    async fn list_permissions(&self, file_id: &str) -> DriveResult<Vec<Permission>>;

    /// Grant `role` to `email`. Returns the new permission id.
    async fn create_permission(
        &self,
        file_id: &str,
        role: &str,
        kind: &str,
        email: &str,
    ) -> DriveResult<String>;

    /// Upgrade `permission_id` to `owner` with ownership transfer.
    async fn transfer_ownership(&self, file_id: &str, permission_id: &str) -> DriveResult<()>;
}

/// Render a `Content-Range` header for a window of `len` bytes.
pub fn content_range(start: u64, len: u64, total: u64) -> String {
    if len == 0 {
        return format!("bytes */{}", total);
    }
    format!("bytes {}-{}/{}", start, start + len - 1, total)
}

/// Parse the `Range: bytes=0-N` header of a 308 response into `N`.
pub fn parse_range_ack(header: &str) -> Option<u64> {
    let range = header.trim().strip_prefix("bytes=")?;
    let (_, end) = range.split_once('-')?;
    end.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_is_inclusive() {
        assert_eq!(content_range(0, 262_144, 600_000), "bytes 0-262143/600000");
        assert_eq!(content_range(524_288, 75_712, 600_000), "bytes 524288-599999/600000");
        assert_eq!(content_range(0, 0, 0), "bytes */0");
    }

    #[test]
    fn range_ack_parses_end_offset() {
        assert_eq!(parse_range_ack("bytes=0-262143"), Some(262_143));
        assert_eq!(parse_range_ack(" bytes=0-9 "), Some(9));
        assert_eq!(parse_range_ack("0-9"), None);
        assert_eq!(parse_range_ack("bytes=0-"), None);
    }

    #[test]
    fn hints_follow_error_kind() {
        assert!(DriveError::NotFound("File not found: F1".into())
            .remediation_hint()
            .starts_with("Folder access denied"));
        assert!(DriveError::NotFound("gone".into())
            .remediation_hint()
            .starts_with("Folder not found"));
        assert!(DriveError::PermissionDenied("no".into())
            .remediation_hint()
            .starts_with("Permission denied"));
        assert_eq!(
            DriveError::Transport("reset".into()).remediation_hint(),
            "transport error: reset"
        );
    }
}

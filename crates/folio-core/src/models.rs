//! Core data models shared by the upload and rendering flows.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Placeholder used for any piece of session or device information that
/// could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// Lifecycle of a queued file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
    Skipped,
}

impl UploadStatus {
    /// `Success` and `Skipped` never leave their state.
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Success | UploadStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Success => "success",
            UploadStatus::Error => "error",
            UploadStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Random-access source of a local file's bytes.
pub trait FileContent: Send + Sync {
    /// Read up to `len` bytes starting at `offset`.
    fn read_range(&self, offset: u64, len: u64) -> std::io::Result<Vec<u8>>;
}

/// File bytes held entirely in memory.
pub struct InMemoryContent(pub Vec<u8>);

impl FileContent for InMemoryContent {
    fn read_range(&self, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
        let start = (offset as usize).min(self.0.len());
        let end = start.saturating_add(len as usize).min(self.0.len());
        Ok(self.0[start..end].to_vec())
    }
}

/// A file selected for upload.
#[derive(Clone)]
pub struct LocalFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    content: Arc<dyn FileContent>,
}

impl LocalFile {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        content: Arc<dyn FileContent>,
    ) -> Self {
        let mime_type = mime_type.into();
        Self {
            name: name.into(),
            size,
            mime_type: if mime_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                mime_type
            },
            content,
        }
    }

    /// Build a file whose bytes live in memory. The size is taken from the data.
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self::new(name, size, mime_type, Arc::new(InMemoryContent(data)))
    }

    pub fn read_range(&self, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
        self.content.read_range(offset, len)
    }

    pub fn read_all(&self) -> std::io::Result<Vec<u8>> {
        self.content.read_range(0, self.size)
    }
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// One entry of the upload queue.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub file: LocalFile,
    pub status: UploadStatus,
    /// Percentage in `0..=100`.
    pub progress: u8,
    pub remote_id: Option<String>,
    pub error: Option<String>,
}

impl UploadItem {
    pub fn new(file: LocalFile) -> Self {
        Self {
            file,
            status: UploadStatus::Pending,
            progress: 0,
            remote_id: None,
            error: None,
        }
    }

    /// Queue identity: two files with the same name and size are one entry.
    pub fn same_identity(&self, file: &LocalFile) -> bool {
        self.file.name == file.name && self.file.size == file.size
    }
}

/// Browser/OS/network fingerprint attached to uploads for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub device_type: String,
    pub user_agent: String,
    pub screen: String,
    pub timezone: String,
    pub language: String,
    pub ip_address: String,
    pub location: String,
    pub platform: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            browser: UNKNOWN.to_string(),
            browser_version: UNKNOWN.to_string(),
            os: UNKNOWN.to_string(),
            device_type: UNKNOWN.to_string(),
            user_agent: UNKNOWN.to_string(),
            screen: UNKNOWN.to_string(),
            timezone: UNKNOWN.to_string(),
            language: UNKNOWN.to_string(),
            ip_address: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
            platform: UNKNOWN.to_string(),
        }
    }
}

/// An authenticated uploader. Held in memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub email: String,
    pub display_name: String,
    pub device: Option<DeviceInfo>,
}

impl AuthSession {
    pub fn new(access_token: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            email: email.into(),
            display_name: name.into(),
            device: None,
        }
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = Some(device);
        self
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("device", &self.device)
            .finish()
    }
}

/// A file entry returned by the Drive list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Drive reports `size` as a decimal string.
    #[serde(default, deserialize_with = "de_opt_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn de_opt_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        _ => None,
    })
}

/// A sharing permission on a Drive file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// Metadata sent with every upload (name, folder, audit trail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parents: Vec<String>,
    pub description: String,
    pub properties: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_size_accepts_string_or_number() {
        let a: RemoteFile = serde_json::from_str(r#"{"id":"a","size":"42"}"#).unwrap();
        let b: RemoteFile = serde_json::from_str(r#"{"id":"b","size":7}"#).unwrap();
        let c: RemoteFile = serde_json::from_str(r#"{"id":"c"}"#).unwrap();
        assert_eq!(a.size, Some(42));
        assert_eq!(b.size, Some(7));
        assert_eq!(c.size, None);
    }

    #[test]
    fn in_memory_content_clamps_ranges() {
        let content = InMemoryContent(b"abcdef".to_vec());
        assert_eq!(content.read_range(2, 3).unwrap(), b"cde");
        assert_eq!(content.read_range(4, 10).unwrap(), b"ef");
        assert!(content.read_range(10, 2).unwrap().is_empty());
    }

    #[test]
    fn empty_mime_type_falls_back_to_octet_stream() {
        let file = LocalFile::from_bytes("a.bin", "", vec![1, 2]);
        assert_eq!(file.mime_type, "application/octet-stream");
        assert_eq!(file.size, 2);
    }

    #[test]
    fn session_debug_redacts_token() {
        let session = AuthSession::new("secret-token", "a@b.c", "A");
        assert!(!format!("{:?}", session).contains("secret-token"));
    }
}

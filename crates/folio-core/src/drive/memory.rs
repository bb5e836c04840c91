//! In-memory [`DriveApi`] implementation for tests and dry runs.
//!
//! Files, folders, permissions and resumable sessions live behind
//! `std::sync::Mutex`. Queries are matched against the exact shape built by
//! [`duplicate_query`](crate::query::duplicate_query). Every call is
//! appended to a log so tests can assert ordering, and faults can be
//! injected per operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{Permission, RemoteFile, UploadMetadata};
use crate::query::duplicate_query;

use super::{DriveApi, DriveError, DriveResult, WindowOutcome};

/// A file stored by [`InMemoryDrive`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub parents: Vec<String>,
    pub description: String,
    pub properties: BTreeMap<String, String>,
    pub bytes: Vec<u8>,
    pub owner: String,
    pub permissions: Vec<Permission>,
}

struct Session {
    metadata: UploadMetadata,
    total: u64,
    received: Vec<u8>,
}

/// One recorded call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveCall {
    List { query: String },
    CreateMultipart { name: String },
    StartResumable { name: String, size: u64 },
    PutWindow { start: u64, len: u64, total: u64 },
    FolderOwners { folder_id: String },
    ListPermissions { file_id: String },
    CreatePermission { file_id: String, role: String, email: String },
    TransferOwnership { file_id: String, permission_id: String },
}

#[derive(Default)]
struct Faults {
    list: Option<DriveError>,
    create: Option<DriveError>,
    /// Fail the `n`th window PUT (0-based, counted across sessions), once.
    window: Option<(usize, DriveError)>,
    permissions: Option<DriveError>,
    /// Store at most this many bytes of each window, as a server that only
    /// persisted part of the request would.
    partial_window: Option<u64>,
}

#[derive(Default)]
struct State {
    files: Vec<StoredFile>,
    folders: HashMap<String, Vec<String>>,
    sessions: HashMap<String, Session>,
    calls: Vec<DriveCall>,
    next_id: u64,
    windows_sent: usize,
    open_uploads: usize,
    max_open_uploads: usize,
    faults: Faults,
}

/// In-memory Drive for testing and `--dry-run`.
pub struct InMemoryDrive {
    user_email: String,
    state: Mutex<State>,
}

impl InMemoryDrive {
    /// Create a drive whose uploads are owned by `user_email`.
    pub fn new(user_email: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Register a folder and its owner.
    pub fn with_folder(self, folder_id: &str, owner: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .folders
            .insert(folder_id.to_string(), vec![owner.to_string()]);
        self
    }

    /// Seed an existing file (e.g. one uploaded in an earlier session).
    pub fn insert_file(&self, file: RemoteFile, parent: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.files.push(StoredFile {
            id: file.id,
            name: file.name,
            parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
            description: String::new(),
            properties: file.properties,
            bytes: vec![0; file.size.unwrap_or(0) as usize],
            owner: self.user_email.clone(),
            permissions: Vec::new(),
        });
    }

    pub fn fail_list(&self, err: DriveError) {
        self.state.lock().unwrap().faults.list = Some(err);
    }

    pub fn fail_create(&self, err: DriveError) {
        self.state.lock().unwrap().faults.create = Some(err);
    }

    pub fn fail_window(&self, index: usize, err: DriveError) {
        self.state.lock().unwrap().faults.window = Some((index, err));
    }

    pub fn fail_permissions(&self, err: DriveError) {
        self.state.lock().unwrap().faults.permissions = Some(err);
    }

    pub fn accept_partial_windows(&self, max_bytes: u64) {
        self.state.lock().unwrap().faults.partial_window = Some(max_bytes);
    }

    pub fn clear_faults(&self) {
        self.state.lock().unwrap().faults = Faults::default();
    }

    pub fn calls(&self) -> Vec<DriveCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn files(&self) -> Vec<StoredFile> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn file(&self, id: &str) -> Option<StoredFile> {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned()
    }

    /// Highest number of uploads that were open at the same time.
    pub fn max_concurrent_uploads(&self) -> usize {
        self.state.lock().unwrap().max_open_uploads
    }
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn open_upload(&mut self) {
        self.open_uploads += 1;
        self.max_open_uploads = self.max_open_uploads.max(self.open_uploads);
    }

    fn close_upload(&mut self) {
        self.open_uploads = self.open_uploads.saturating_sub(1);
    }

    fn store(&mut self, metadata: &UploadMetadata, bytes: Vec<u8>, owner: &str) -> String {
        let id = self.next_id("file-");
        let perm_id = self.next_id("perm-");
        self.files.push(StoredFile {
            id: id.clone(),
            name: metadata.name.clone(),
            parents: metadata.parents.clone(),
            description: metadata.description.clone(),
            properties: metadata.properties.clone(),
            bytes,
            owner: owner.to_string(),
            permissions: vec![Permission {
                id: perm_id,
                role: "owner".to_string(),
                kind: "user".to_string(),
                email_address: Some(owner.to_string()),
            }],
        });
        id
    }

    fn accept_window(
        &mut self,
        session_url: &str,
        start: u64,
        bytes: Vec<u8>,
        total: u64,
        owner: &str,
    ) -> DriveResult<WindowOutcome> {
        let window_index = self.windows_sent;
        self.windows_sent += 1;
        let fail_now = matches!(&self.faults.window, Some((n, _)) if *n == window_index);
        if fail_now {
            if let Some((_, err)) = self.faults.window.take() {
                return Err(err);
            }
        }
        let partial = self.faults.partial_window;

        let session = self
            .sessions
            .get_mut(session_url)
            .ok_or_else(|| DriveError::NotFound(format!("no upload session {}", session_url)))?;
        if session.total != total {
            return Err(DriveError::Protocol(format!(
                "total size changed from {} to {}",
                session.total, total
            )));
        }
        if start != session.received.len() as u64 {
            return Err(DriveError::Protocol(format!(
                "window starts at {} but {} bytes are stored",
                start,
                session.received.len()
            )));
        }
        let keep = partial
            .map(|max| (max as usize).min(bytes.len()))
            .unwrap_or(bytes.len());
        session.received.extend_from_slice(&bytes[..keep]);

        if (session.received.len() as u64) < session.total {
            let acknowledged = (session.received.len() as u64).checked_sub(1);
            return Ok(WindowOutcome::Incomplete { acknowledged });
        }

        let Some(session) = self.sessions.remove(session_url) else {
            return Err(DriveError::Protocol("session vanished".to_string()));
        };
        let id = self.store(&session.metadata, session.received, owner);
        self.close_upload();
        Ok(WindowOutcome::Complete { id })
    }

    fn file_mut(&mut self, file_id: &str) -> DriveResult<&mut StoredFile> {
        self.files
            .iter_mut()
            .find(|f| f.id == file_id)
            .ok_or_else(|| DriveError::NotFound(format!("File not found: {}", file_id)))
    }
}

fn matches_query(file: &StoredFile, query: &str) -> bool {
    if query == duplicate_query(&file.name, None) {
        return true;
    }
    file.parents
        .iter()
        .any(|p| query == duplicate_query(&file.name, Some(p)))
}

fn ensure_parents(state: &State, metadata: &UploadMetadata) -> DriveResult<()> {
    for parent in &metadata.parents {
        if !state.folders.contains_key(parent) {
            return Err(DriveError::NotFound(format!("File not found: {}", parent)));
        }
    }
    Ok(())
}

#[async_trait]
impl DriveApi for InMemoryDrive {
    async fn list_files(&self, query: &str, page_size: u32) -> DriveResult<Vec<RemoteFile>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriveCall::List {
            query: query.to_string(),
        });
        if let Some(err) = state.faults.list.clone() {
            return Err(err);
        }
        Ok(state
            .files
            .iter()
            .filter(|f| matches_query(f, query))
            .take(page_size as usize)
            .map(|f| RemoteFile {
                id: f.id.clone(),
                name: f.name.clone(),
                size: Some(f.bytes.len() as u64),
                properties: f.properties.clone(),
            })
            .collect())
    }

    async fn create_multipart(
        &self,
        metadata: &UploadMetadata,
        bytes: Vec<u8>,
        _mime_type: &str,
    ) -> DriveResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriveCall::CreateMultipart {
            name: metadata.name.clone(),
        });
        if let Some(err) = state.faults.create.clone() {
            return Err(err);
        }
        ensure_parents(&state, metadata)?;
        state.open_upload();
        let id = state.store(metadata, bytes, &self.user_email);
        state.close_upload();
        Ok(id)
    }

    async fn start_resumable(
        &self,
        metadata: &UploadMetadata,
        size: u64,
        _mime_type: &str,
    ) -> DriveResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriveCall::StartResumable {
            name: metadata.name.clone(),
            size,
        });
        if let Some(err) = state.faults.create.clone() {
            return Err(err);
        }
        ensure_parents(&state, metadata)?;
        let url = format!("memory://upload/{}", state.next_id("session-"));
        state.sessions.insert(
            url.clone(),
            Session {
                metadata: metadata.clone(),
                total: size,
                received: Vec::new(),
            },
        );
        state.open_upload();
        Ok(url)
    }

    async fn put_window(
        &self,
        session_url: &str,
        start: u64,
        bytes: Vec<u8>,
        total: u64,
        _mime_type: &str,
    ) -> DriveResult<WindowOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriveCall::PutWindow {
            start,
            len: bytes.len() as u64,
            total,
        });
        let result = state.accept_window(session_url, start, bytes, total, &self.user_email);
        // A failed window ends the session.
        if result.is_err() && state.sessions.remove(session_url).is_some() {
            state.close_upload();
        }
        result
    }

    async fn folder_owners(&self, folder_id: &str) -> DriveResult<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriveCall::FolderOwners {
            folder_id: folder_id.to_string(),
        });
        state
            .folders
            .get(folder_id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(format!("File not found: {}", folder_id)))
    }

    async fn list_permissions(&self, file_id: &str) -> DriveResult<Vec<Permission>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriveCall::ListPermissions {
            file_id: file_id.to_string(),
        });
        if let Some(err) = state.faults.permissions.clone() {
            return Err(err);
        }
        Ok(state.file_mut(file_id)?.permissions.clone())
    }

    async fn create_permission(
        &self,
        file_id: &str,
        role: &str,
        kind: &str,
        email: &str,
    ) -> DriveResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriveCall::CreatePermission {
            file_id: file_id.to_string(),
            role: role.to_string(),
            email: email.to_string(),
        });
        if let Some(err) = state.faults.permissions.clone() {
            return Err(err);
        }
        let id = state.next_id("perm-");
        state.file_mut(file_id)?.permissions.push(Permission {
            id: id.clone(),
            role: role.to_string(),
            kind: kind.to_string(),
            email_address: Some(email.to_string()),
        });
        Ok(id)
    }

    async fn transfer_ownership(&self, file_id: &str, permission_id: &str) -> DriveResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriveCall::TransferOwnership {
            file_id: file_id.to_string(),
            permission_id: permission_id.to_string(),
        });
        if let Some(err) = state.faults.permissions.clone() {
            return Err(err);
        }
        let file = state.file_mut(file_id)?;
        let new_owner = file
            .permissions
            .iter()
            .find(|p| p.id == permission_id)
            .and_then(|p| p.email_address.clone())
            .ok_or_else(|| DriveError::NotFound(format!("permission {}", permission_id)))?;
        for perm in file.permissions.iter_mut() {
            if perm.id == permission_id {
                perm.role = "owner".to_string();
            } else if perm.role == "owner" {
                perm.role = "writer".to_string();
            }
        }
        file.owner = new_owner;
        Ok(())
    }
}

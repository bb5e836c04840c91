//! `folio upload`: sign in, queue local files, and push them to Drive.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use folio_core::drive::memory::InMemoryDrive;
use folio_core::drive::DriveApi;
use folio_core::models::{AuthSession, FileContent, LocalFile};
use folio_core::orchestrator::{BatchSummary, OwnershipPolicy, UploadOptions, UploadOrchestrator};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::auth::{AuthGate, EnvToken, LoopbackConsent, TokenSource, UserInfoClient, ACCESS_TOKEN_ENV};
use crate::config::Config;
use crate::device::{cli_user_agent, collect_device_info, local_device_info, NetworkLookup};
use crate::drive_http::HttpDrive;
use crate::http::HttpPolicy;
use crate::list_view::render_list;
use crate::progress::ProgressMode;

const DRY_RUN_EMAIL: &str = "dry-run@localhost";
const DRY_RUN_FOLDER: &str = "dry-run-folder";

/// Command-line choices for one upload run.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub paths: Vec<PathBuf>,
    pub include: Vec<String>,
    pub folder: Option<String>,
    pub ownership: Option<OwnershipPolicy>,
    pub dry_run: bool,
    pub progress: ProgressMode,
}

/// File bytes read from disk on demand.
pub struct DiskContent {
    path: PathBuf,
}

impl FileContent for DiskContent {
    fn read_range(&self, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(len.min(16 * 1024 * 1024) as usize);
        file.take(len).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "txt" | "md" => "text/plain",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "yaml" | "yml" => "application/x-yaml",
        _ => "application/octet-stream",
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn local_file(path: &Path) -> Result<LocalFile> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(LocalFile::new(
        name,
        metadata.len(),
        mime_for_path(path),
        Arc::new(DiskContent {
            path: path.to_path_buf(),
        }),
    ))
}

/// Expand files and directories into upload candidates.
///
/// Directories are walked recursively and filtered by `include` (matched
/// against the path relative to the directory). Named files are always
/// taken.
pub fn collect_files(paths: &[PathBuf], include: &[String]) -> Result<Vec<LocalFile>> {
    let include_set = if include.is_empty() {
        None
    } else {
        Some(build_globset(include)?)
    };

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(local_file(root)?);
            continue;
        }
        if !root.is_dir() {
            bail!("No such file or directory: {}", root.display());
        }

        let walker = WalkDir::new(root).sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if let Some(set) = &include_set {
                if !set.is_match(relative) {
                    continue;
                }
            }
            files.push(local_file(path)?);
        }
    }
    Ok(files)
}

fn upload_options(config: &Config, request: &UploadRequest) -> UploadOptions {
    UploadOptions {
        folder_id: request
            .folder
            .clone()
            .filter(|f| !f.is_empty())
            .or_else(|| config.drive.folder_id()),
        simple_upload_limit: config.drive.simple_upload_limit,
        window_size: config.drive.window_size,
        ownership: request.ownership.unwrap_or(config.drive.ownership),
    }
}

pub async fn run_upload(config: &Config, request: UploadRequest) -> Result<()> {
    let files = collect_files(&request.paths, &request.include)?;
    if files.is_empty() {
        bail!("No files matched the given paths");
    }
    let mut options = upload_options(config, &request);

    let summary = if request.dry_run {
        let folder = options
            .folder_id
            .get_or_insert_with(|| DRY_RUN_FOLDER.to_string())
            .clone();
        let drive = InMemoryDrive::new(DRY_RUN_EMAIL).with_folder(&folder, DRY_RUN_EMAIL);
        let session = AuthSession::new("dry-run", DRY_RUN_EMAIL, "Dry Run")
            .with_device(local_device_info(&cli_user_agent()));
        println!("Dry run: uploading to an in-memory Drive, nothing leaves this machine.");
        run_batch(UploadOrchestrator::new(drive, session, options), files, request.progress).await
    } else {
        let credentials = config.drive.credentials()?;
        let http = HttpPolicy::new(&config.http)?;
        let session = sign_in(config, &http, credentials.clone()).await?;
        let drive = HttpDrive::new(http, session.access_token.clone())
            .with_api_key(Some(credentials.api_key));
        run_batch(UploadOrchestrator::new(drive, session, options), files, request.progress).await
    };

    println!(
        "\n{} uploaded, {} already existed, {} failed ({} attempted)",
        summary.uploaded, summary.skipped, summary.failed, summary.attempted
    );
    if summary.failed > 0 {
        bail!("{} of {} uploads failed", summary.failed, summary.attempted);
    }
    Ok(())
}

/// Authenticate through the environment token or browser consent, then
/// attach device details to the session.
pub async fn sign_in(
    config: &Config,
    http: &HttpPolicy,
    credentials: crate::config::Credentials,
) -> Result<AuthSession> {
    let userinfo = UserInfoClient::new(http.clone());
    let source: Box<dyn TokenSource> = if std::env::var(ACCESS_TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty()) {
        info!("using access token from {}", ACCESS_TOKEN_ENV);
        Box::new(EnvToken)
    } else {
        Box::new(LoopbackConsent::new(
            http.clone(),
            credentials,
            config.drive.redirect_port,
        ))
    };

    let mut gate = AuthGate::new();
    if gate.authenticate(source.as_ref(), &userinfo).await?.is_none() {
        bail!("Sign-in was cancelled");
    }
    let device = collect_device_info(http, &NetworkLookup::default(), &cli_user_agent()).await;
    gate.attach_device(device);
    let session = gate
        .session()
        .cloned()
        .context("authentication finished without a session")?;
    println!("Signed in as {} <{}>", session.display_name, session.email);
    Ok(session)
}

async fn run_batch<D: DriveApi>(
    mut orchestrator: UploadOrchestrator<D>,
    files: Vec<LocalFile>,
    progress: ProgressMode,
) -> BatchSummary {
    let offered = files.len();
    let added = orchestrator.enqueue(files);
    if added < offered {
        warn!(dropped = offered - added, "duplicate files dropped from the queue");
    }
    if let Some(folder) = &orchestrator.options().folder_id {
        println!("Target folder: {}", folder);
    }
    print!("{}", render_list(orchestrator.items()));

    let reporter = progress.reporter();
    let summary = orchestrator.dispatch_batch(reporter.as_ref()).await;

    println!();
    print!("{}", render_list(orchestrator.items()));
    summary
}

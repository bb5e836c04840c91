//! [`DriveApi`] over the Google Drive v3 REST API.
//!
//! Every request carries the session's bearer token and, when configured,
//! the API key as the `key` query parameter. Error payloads of the form
//! `{"error": {"code", "message", "errors": [{"reason"}]}}` are mapped onto
//! [`DriveError`] by [`map_api_error`].

use async_trait::async_trait;
use folio_core::drive::{content_range, parse_range_ack, DriveApi, DriveError, DriveResult, WindowOutcome};
use folio_core::models::{Permission, RemoteFile, UploadMetadata};
use folio_core::query::DUPLICATE_FIELDS;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::http::{HttpPolicy, Replay};

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Error reasons reported as [`DriveError::Quota`].
const QUOTA_REASONS: &[&str] = &["storageQuotaExceeded", "quotaExceeded"];

pub struct HttpDrive {
    http: HttpPolicy,
    access_token: String,
    api_key: Option<String>,
    api_base: String,
    upload_base: String,
}

impl HttpDrive {
    pub fn new(http: HttpPolicy, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            api_key: None,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Point the client at another server (tests).
    pub fn with_base_urls(mut self, api_base: &str, upload_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.upload_base = upload_base.trim_end_matches('/').to_string();
        self
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.bearer_auth(&self.access_token);
        match &self.api_key {
            Some(key) => builder.query(&[("key", key.as_str())]),
            None => builder,
        }
    }

    async fn send<F>(&self, build: F) -> DriveResult<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        self.send_with(Replay::Always, build).await
    }

    async fn send_with<F>(&self, replay: Replay, build: F) -> DriveResult<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let response = self
            .http
            .send_with_replay(replay, |client| self.authorize(build(client)))
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn json<T: for<'de> Deserialize<'de>>(response: Response) -> DriveResult<T> {
        response
            .json()
            .await
            .map_err(|e| DriveError::Protocol(format!("unexpected Drive response: {}", e)))
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorReason>,
}

#[derive(Deserialize)]
struct ApiErrorReason {
    #[serde(default)]
    reason: String,
}

/// Map an HTTP status and Drive error body onto a [`DriveError`].
pub fn map_api_error(status: u16, body: &str) -> DriveError {
    let (message, reasons) = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => (
            parsed.error.message,
            parsed
                .error
                .errors
                .into_iter()
                .map(|e| e.reason)
                .collect::<Vec<_>>(),
        ),
        Err(_) => (body.trim().to_string(), Vec::new()),
    };
    let message = if message.is_empty() {
        format!("HTTP {}", status)
    } else {
        message
    };

    match status {
        403 if reasons.iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) => {
            DriveError::Quota(message)
        }
        401 | 403 => DriveError::PermissionDenied(message),
        404 => DriveError::NotFound(message),
        _ => DriveError::Api { status, message },
    }
}

async fn error_from_response(response: Response) -> DriveError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    map_api_error(status, &body)
}

fn content_type(mime_type: &str) -> HeaderValue {
    HeaderValue::from_str(mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

fn part_with_type(part: Part, mime: HeaderValue) -> Part {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, mime);
    part.headers(headers)
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct Owners {
    #[serde(default)]
    owners: Vec<Owner>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Owner {
    #[serde(default)]
    email_address: Option<String>,
}

#[derive(Deserialize)]
struct PermissionList {
    #[serde(default)]
    permissions: Vec<Permission>,
}

#[async_trait]
impl DriveApi for HttpDrive {
    async fn list_files(&self, query: &str, page_size: u32) -> DriveResult<Vec<RemoteFile>> {
        let url = format!("{}/files", self.api_base);
        let page_size = page_size.to_string();
        let response = self
            .send(|c| {
                c.get(&url).query(&[
                    ("q", query),
                    ("fields", DUPLICATE_FIELDS),
                    ("pageSize", page_size.as_str()),
                ])
            })
            .await?;
        Ok(Self::json::<FileList>(response).await?.files)
    }

    async fn create_multipart(
        &self,
        metadata: &UploadMetadata,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> DriveResult<String> {
        let url = format!("{}/files", self.upload_base);
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| DriveError::Protocol(format!("metadata encoding failed: {}", e)))?;
        let file_type = content_type(mime_type);
        // A failed create may still have stored the file.
        let response = self
            .send_with(Replay::BeforeDelivery, |c| {
                let form = Form::new()
                    .part(
                        "metadata",
                        part_with_type(
                            Part::text(metadata_json.clone()),
                            HeaderValue::from_static("application/json; charset=UTF-8"),
                        ),
                    )
                    .part(
                        "file",
                        part_with_type(
                            Part::bytes(bytes.clone()).file_name(metadata.name.clone()),
                            file_type.clone(),
                        ),
                    );
                c.post(&url)
                    .query(&[("uploadType", "multipart"), ("fields", "id")])
                    .multipart(form)
            })
            .await?;
        Ok(Self::json::<Created>(response).await?.id)
    }

    async fn start_resumable(
        &self,
        metadata: &UploadMetadata,
        size: u64,
        mime_type: &str,
    ) -> DriveResult<String> {
        let url = format!("{}/files", self.upload_base);
        let file_type = content_type(mime_type);
        let response = self
            .send(|c| {
                c.post(&url)
                    .query(&[("uploadType", "resumable"), ("fields", "id")])
                    .header("X-Upload-Content-Type", file_type.clone())
                    .header("X-Upload-Content-Length", size.to_string())
                    .json(metadata)
            })
            .await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::Protocol("No upload URL received".to_string()))?;
        debug!(name = %metadata.name, "resumable session created");
        Ok(location)
    }

    async fn put_window(
        &self,
        session_url: &str,
        start: u64,
        bytes: Vec<u8>,
        total: u64,
        mime_type: &str,
    ) -> DriveResult<WindowOutcome> {
        let range = content_range(start, bytes.len() as u64, total);
        let file_type = content_type(mime_type);
        // The session URL is itself the credential; no bearer token needed.
        let response = self
            .http
            .send_with_retry(|c| {
                c.put(session_url)
                    .header("Content-Range", range.as_str())
                    .header(CONTENT_TYPE, file_type.clone())
                    .body(bytes.clone())
            })
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::PERMANENT_REDIRECT {
            let acknowledged = response
                .headers()
                .get(RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_range_ack);
            return Ok(WindowOutcome::Incomplete { acknowledged });
        }
        if status.is_success() {
            let created = Self::json::<Created>(response).await?;
            return Ok(WindowOutcome::Complete { id: created.id });
        }
        Err(error_from_response(response).await)
    }

    async fn folder_owners(&self, folder_id: &str) -> DriveResult<Vec<String>> {
        let url = format!("{}/files/{}", self.api_base, folder_id);
        let response = self
            .send(|c| {
                c.get(&url).query(&[
                    ("fields", "owners(emailAddress)"),
                    ("supportsAllDrives", "true"),
                ])
            })
            .await?;
        Ok(Self::json::<Owners>(response)
            .await?
            .owners
            .into_iter()
            .filter_map(|o| o.email_address)
            .collect())
    }

    async fn list_permissions(&self, file_id: &str) -> DriveResult<Vec<Permission>> {
        let url = format!("{}/files/{}/permissions", self.api_base, file_id);
        let response = self
            .send(|c| c.get(&url).query(&[("fields", "permissions(id,role,type,emailAddress)")]))
            .await?;
        Ok(Self::json::<PermissionList>(response).await?.permissions)
    }

    async fn create_permission(
        &self,
        file_id: &str,
        role: &str,
        kind: &str,
        email: &str,
    ) -> DriveResult<String> {
        let url = format!("{}/files/{}/permissions", self.api_base, file_id);
        let body = json!({ "role": role, "type": kind, "emailAddress": email });
        let response = self
            .send(|c| {
                c.post(&url)
                    .query(&[("fields", "id"), ("sendNotificationEmail", "false")])
                    .json(&body)
            })
            .await?;
        Ok(Self::json::<Created>(response).await?.id)
    }

    async fn transfer_ownership(&self, file_id: &str, permission_id: &str) -> DriveResult<()> {
        let url = format!(
            "{}/files/{}/permissions/{}",
            self.api_base, file_id, permission_id
        );
        let body = json!({ "role": "owner" });
        self.send(|c| {
            c.patch(&url)
                .query(&[("transferOwnership", "true")])
                .json(&body)
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_reason_wins_over_403() {
        let body = r#"{"error":{"code":403,"message":"The user's Drive storage quota has been exceeded.",
            "errors":[{"reason":"storageQuotaExceeded"}]}}"#;
        assert!(matches!(map_api_error(403, body), DriveError::Quota(_)));
    }

    #[test]
    fn status_mapping() {
        let body = r#"{"error":{"code":404,"message":"File not found: F1."}}"#;
        let err = map_api_error(404, body);
        assert_eq!(err, DriveError::NotFound("File not found: F1.".into()));
        assert!(err.remediation_hint().starts_with("Folder access denied"));

        assert!(matches!(
            map_api_error(403, r#"{"error":{"message":"Insufficient Permission"}}"#),
            DriveError::PermissionDenied(_)
        ));
        assert_eq!(
            map_api_error(500, "upstream exploded"),
            DriveError::Api {
                status: 500,
                message: "upstream exploded".into()
            }
        );
        assert_eq!(
            map_api_error(502, ""),
            DriveError::Api {
                status: 502,
                message: "HTTP 502".into()
            }
        );
    }
}

use folio::config::HttpConfig;
use folio::drive_http::HttpDrive;
use folio::http::HttpPolicy;
use folio_core::drive::{DriveApi, DriveError};
use folio_core::models::{AuthSession, LocalFile, UploadStatus};
use folio_core::orchestrator::{NoopSink, OwnershipPolicy, UploadOptions, UploadOrchestrator};
use folio_core::query::duplicate_query;
use mockito::{Matcher, Server};
use serde_json::json;

fn drive(server: &Server) -> HttpDrive {
    let http = HttpPolicy::new(&HttpConfig {
        timeout_secs: 5,
        max_retries: 0,
    })
    .unwrap();
    HttpDrive::new(http, "tok")
        .with_base_urls(&server.url(), &format!("{}/upload", server.url()))
}

fn orchestrator(server: &Server, options: UploadOptions) -> UploadOrchestrator<HttpDrive> {
    let session = AuthSession::new("tok", "me@example.com", "Me");
    UploadOrchestrator::new(drive(server), session, options)
}

async fn empty_listing(server: &mut Server) -> mockito::Mock {
    server
        .mock("GET", "/files")
        .match_query(Matcher::Any)
        .with_body(r#"{"files":[]}"#)
        .create_async()
        .await
}

#[tokio::test]
async fn test_list_files_sends_query_and_bearer() {
    let mut server = Server::new_async().await;
    let q = duplicate_query("cv.pdf", Some("F1"));
    let mock = server
        .mock("GET", "/files")
        .match_header("authorization", "Bearer tok")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), q.clone()),
            Matcher::UrlEncoded("pageSize".into(), "100".into()),
        ]))
        .with_body(r#"{"files":[{"id":"A","name":"cv.pdf","size":"12","properties":{"uploader_email":"me@example.com"}}]}"#)
        .create_async()
        .await;

    let files = drive(&server).list_files(&q, 100).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].size, Some(12));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_api_key_is_sent_as_query_param() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/files")
        .match_query(Matcher::UrlEncoded("key".into(), "k-123".into()))
        .with_body(r#"{"files":[]}"#)
        .create_async()
        .await;

    let drive = drive(&server).with_api_key(Some("k-123".into()));
    drive.list_files("name = 'x'", 10).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_quota_error_is_mapped() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/files")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error":{"code":403,"message":"quota","errors":[{"reason":"storageQuotaExceeded"}]}}"#)
        .create_async()
        .await;

    let err = drive(&server).list_files("q", 1).await.unwrap_err();
    assert_eq!(err, DriveError::Quota("quota".into()));
}

#[tokio::test]
async fn test_small_file_goes_through_multipart() {
    let mut server = Server::new_async().await;
    empty_listing(&mut server).await;
    let upload = server
        .mock("POST", "/upload/files")
        .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
        .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("uploader_email".into()),
            Matcher::Regex("hello drive".into()),
        ]))
        .with_body(r#"{"id":"F-1"}"#)
        .create_async()
        .await;

    let mut orch = orchestrator(
        &server,
        UploadOptions {
            ownership: OwnershipPolicy::Disabled,
            ..UploadOptions::default()
        },
    );
    orch.enqueue([LocalFile::from_bytes("note.txt", "text/plain", b"hello drive".to_vec())]);
    let summary = orch.dispatch_batch(&NoopSink).await;

    assert_eq!(summary.uploaded, 1);
    assert_eq!(orch.items()[0].remote_id.as_deref(), Some("F-1"));
    upload.assert_async().await;
}

#[tokio::test]
async fn test_large_file_uses_resumable_windows() {
    let mut server = Server::new_async().await;
    empty_listing(&mut server).await;
    let session_url = format!("{}/session/abc", server.url());
    server
        .mock("POST", "/upload/files")
        .match_query(Matcher::UrlEncoded("uploadType".into(), "resumable".into()))
        .match_header("x-upload-content-length", "300000")
        .with_header("location", &session_url)
        .create_async()
        .await;
    let first = server
        .mock("PUT", "/session/abc")
        .match_header("content-range", "bytes 0-262143/300000")
        .with_status(308)
        .with_header("range", "bytes=0-262143")
        .create_async()
        .await;
    let last = server
        .mock("PUT", "/session/abc")
        .match_header("content-range", "bytes 262144-299999/300000")
        .with_body(r#"{"id":"R-1"}"#)
        .create_async()
        .await;

    let mut orch = orchestrator(
        &server,
        UploadOptions {
            simple_upload_limit: 1024,
            ownership: OwnershipPolicy::Disabled,
            ..UploadOptions::default()
        },
    );
    orch.enqueue([LocalFile::from_bytes("big.bin", "application/octet-stream", vec![7; 300_000])]);
    orch.dispatch_batch(&NoopSink).await;

    assert_eq!(orch.items()[0].status, UploadStatus::Success);
    assert_eq!(orch.items()[0].remote_id.as_deref(), Some("R-1"));
    first.assert_async().await;
    last.assert_async().await;
}

#[tokio::test]
async fn test_missing_session_url_fails_the_item() {
    let mut server = Server::new_async().await;
    empty_listing(&mut server).await;
    server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .create_async()
        .await;

    let mut orch = orchestrator(
        &server,
        UploadOptions {
            simple_upload_limit: 10,
            ownership: OwnershipPolicy::Disabled,
            ..UploadOptions::default()
        },
    );
    orch.enqueue([LocalFile::from_bytes("big.bin", "", vec![1; 100])]);
    let summary = orch.dispatch_batch(&NoopSink).await;

    assert_eq!(summary.failed, 1);
    assert!(orch.items()[0]
        .error
        .as_deref()
        .unwrap()
        .contains("No upload URL received"));
}

#[tokio::test]
async fn test_folder_not_shared_gives_hint() {
    let mut server = Server::new_async().await;
    empty_listing(&mut server).await;
    server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":{"code":404,"message":"File not found: F1."}}"#)
        .create_async()
        .await;

    let mut orch = orchestrator(
        &server,
        UploadOptions {
            folder_id: Some("F1".into()),
            ownership: OwnershipPolicy::Disabled,
            ..UploadOptions::default()
        },
    );
    orch.enqueue([LocalFile::from_bytes("a.txt", "text/plain", b"a".to_vec())]);
    orch.dispatch_batch(&NoopSink).await;

    assert_eq!(orch.items()[0].status, UploadStatus::Error);
    assert!(orch.items()[0]
        .error
        .as_deref()
        .unwrap()
        .starts_with("Folder access denied"));
}

#[tokio::test]
async fn test_ownership_moves_to_folder_owner() {
    let mut server = Server::new_async().await;
    empty_listing(&mut server).await;
    server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .with_body(r#"{"id":"NEW"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/files/F1")
        .match_query(Matcher::Any)
        .with_body(r#"{"owners":[{"emailAddress":"owner@example.com"}]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/files/NEW/permissions")
        .match_query(Matcher::Any)
        .with_body(r#"{"permissions":[{"id":"me","role":"owner","type":"user","emailAddress":"me@example.com"}]}"#)
        .create_async()
        .await;
    let grant = server
        .mock("POST", "/files/NEW/permissions")
        .match_query(Matcher::UrlEncoded("sendNotificationEmail".into(), "false".into()))
        .match_body(Matcher::Json(json!({
            "role": "writer",
            "type": "user",
            "emailAddress": "owner@example.com"
        })))
        .with_body(r#"{"id":"P1"}"#)
        .create_async()
        .await;
    let transfer = server
        .mock("PATCH", "/files/NEW/permissions/P1")
        .match_query(Matcher::UrlEncoded("transferOwnership".into(), "true".into()))
        .match_body(Matcher::Json(json!({ "role": "owner" })))
        .with_body("{}")
        .create_async()
        .await;

    let mut orch = orchestrator(
        &server,
        UploadOptions {
            folder_id: Some("F1".into()),
            ownership: OwnershipPolicy::Required,
            ..UploadOptions::default()
        },
    );
    orch.enqueue([LocalFile::from_bytes("a.txt", "text/plain", b"a".to_vec())]);
    let summary = orch.dispatch_batch(&NoopSink).await;

    assert_eq!(summary.uploaded, 1);
    grant.assert_async().await;
    transfer.assert_async().await;
}

#[tokio::test]
async fn test_best_effort_ownership_failure_keeps_upload() {
    let mut server = Server::new_async().await;
    empty_listing(&mut server).await;
    server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .with_body(r#"{"id":"NEW"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/files/F1")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error":{"message":"Insufficient Permission"}}"#)
        .create_async()
        .await;

    let mut orch = orchestrator(
        &server,
        UploadOptions {
            folder_id: Some("F1".into()),
            ownership: OwnershipPolicy::BestEffort,
            ..UploadOptions::default()
        },
    );
    orch.enqueue([LocalFile::from_bytes("a.txt", "text/plain", b"a".to_vec())]);
    orch.dispatch_batch(&NoopSink).await;

    assert_eq!(orch.items()[0].status, UploadStatus::Success);
}

#[tokio::test]
async fn test_existing_writer_is_upgraded_without_new_grant() {
    let mut server = Server::new_async().await;
    empty_listing(&mut server).await;
    server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .with_body(r#"{"id":"NEW"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/files/F1")
        .match_query(Matcher::Any)
        .with_body(r#"{"owners":[{"emailAddress":"owner@example.com"}]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/files/NEW/permissions")
        .match_query(Matcher::Any)
        .with_body(
            r#"{"permissions":[
                {"id":"me","role":"owner","type":"user","emailAddress":"me@example.com"},
                {"id":"W9","role":"writer","type":"user","emailAddress":"owner@example.com"}
            ]}"#,
        )
        .create_async()
        .await;
    let grant = server
        .mock("POST", "/files/NEW/permissions")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let transfer = server
        .mock("PATCH", "/files/NEW/permissions/W9")
        .match_query(Matcher::UrlEncoded("transferOwnership".into(), "true".into()))
        .with_body("{}")
        .create_async()
        .await;

    let mut orch = orchestrator(
        &server,
        UploadOptions {
            folder_id: Some("F1".into()),
            ownership: OwnershipPolicy::Required,
            ..UploadOptions::default()
        },
    );
    orch.enqueue([LocalFile::from_bytes("a.txt", "text/plain", b"a".to_vec())]);
    let summary = orch.dispatch_batch(&NoopSink).await;

    assert_eq!(summary.uploaded, 1);
    grant.assert_async().await;
    transfer.assert_async().await;
}

#[tokio::test]
async fn test_failed_multipart_create_is_not_resent() {
    let mut server = Server::new_async().await;
    empty_listing(&mut server).await;
    let create = server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .with_status(502)
        .expect(1)
        .create_async()
        .await;

    let http = HttpPolicy::new(&HttpConfig {
        timeout_secs: 5,
        max_retries: 3,
    })
    .unwrap()
    .with_backoff_base(std::time::Duration::from_millis(1));
    let drive = HttpDrive::new(http, "tok")
        .with_base_urls(&server.url(), &format!("{}/upload", server.url()));
    let session = AuthSession::new("tok", "me@example.com", "Me");
    let mut orch = UploadOrchestrator::new(
        drive,
        session,
        UploadOptions {
            ownership: OwnershipPolicy::Disabled,
            ..UploadOptions::default()
        },
    );
    orch.enqueue([LocalFile::from_bytes("a.txt", "text/plain", b"a".to_vec())]);
    let summary = orch.dispatch_batch(&NoopSink).await;

    assert_eq!(summary.failed, 1);
    create.assert_async().await;
}

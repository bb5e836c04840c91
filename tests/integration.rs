use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const TEMPLATE: &str = r#"<!doctype html>
<html>
<head><title><!-- folio:title -->Portfolio<!-- /folio:title --></title></head>
<body>
<h1><!-- folio:hero -->Hi<!-- /folio:hero --></h1>
<p><!-- folio:description -->About me<!-- /folio:description --></p>
<section><!-- folio:projects --><!-- /folio:projects --></section>
<div><!-- folio:rank-chart --><!-- /folio:rank-chart --></div>
<span><!-- folio:best-rank -->-<!-- /folio:best-rank --></span>
<footer><!-- folio:footer-name -->Me<!-- /folio:footer-name --></footer>
</body>
</html>
"#;

const DOCUMENT: &str = r#"
personal:
  name: Ada Lovelace
  title: Ada | Portfolio
  description: Building with Rust and Google Cloud.
projects:
  - title: Engine
    description: An analytical engine.
    tags: [rust, math]
    link: https://example.com/engine
auto_links:
  Rust: https://www.rust-lang.org
footer:
  name: Ada
"#;

fn folio_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("folio");
    path
}

fn setup_site(document: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("site")).unwrap();
    fs::write(root.join("site/index.template.html"), TEMPLATE).unwrap();
    fs::write(root.join("data.yaml"), document).unwrap();
    fs::write(
        root.join("rank.json"),
        r#"{"data":[
            {"date":"2024-05-01","rank":150000,"timestamp":"2024-05-01T08:00:00"},
            {"date":"2024-05-01","rank":149000,"timestamp":"2024-05-01T20:00:00"},
            {"date":"2024-05-02","rank":151000}
        ]}"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[site]
document = "{root}/data.yaml"
template = "{root}/site/index.template.html"
output = "{root}/dist/index.html"
rank_feed = "{root}/rank.json"

[rank]
data_file = "{root}/rank.json"
"#,
        root = root.display()
    );
    let config_path = root.join("config/folio.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_folio(config_path: &Path, args: &[&str]) -> (String, String, i32) {
    let binary = folio_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("FOLIO_CLIENT_ID")
        .env_remove("FOLIO_API_KEY")
        .env_remove("FOLIO_ACCESS_TOKEN")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run folio binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

#[test]
fn test_render_binds_sections() {
    let (tmp, config) = setup_site(DOCUMENT);
    let (stdout, stderr, code) = run_folio(&config, &["render"]);
    assert_eq!(code, 0, "render failed: {}", stderr);
    assert!(stdout.contains("bound    projects"));

    let html = fs::read_to_string(tmp.path().join("dist/index.html")).unwrap();
    assert!(html.contains("Ada | Portfolio"));
    assert!(html.contains("Ada Lovelace"));
    assert!(html.contains(r#"<a href="https://www.rust-lang.org" target="_blank">Rust</a>"#));
    assert!(html.contains("<h3>Engine</h3>"));
    assert!(html.contains("leetcodeChart"));
    // Best of the best-per-day values.
    assert!(html.contains("<!-- folio:best-rank -->149,000<!-- /folio:best-rank -->"));
}

#[test]
fn test_render_output_override() {
    let (tmp, config) = setup_site(DOCUMENT);
    let out = tmp.path().join("elsewhere/page.html");
    let (_, stderr, code) = run_folio(&config, &["render", "--output", out.to_str().unwrap()]);
    assert_eq!(code, 0, "render failed: {}", stderr);
    assert!(out.exists());
    assert!(!tmp.path().join("dist/index.html").exists());
}

#[test]
fn test_render_broken_document_writes_error_page() {
    let (tmp, config) = setup_site("personal: [unclosed");
    let (_, _, code) = run_folio(&config, &["render"]);
    assert_ne!(code, 0);

    let html = fs::read_to_string(tmp.path().join("dist/index.html")).unwrap();
    assert!(html.contains("Error loading portfolio data"));
    assert!(html.contains(">Error</span>."));
}

#[test]
fn test_upload_dry_run() {
    let (tmp, config) = setup_site(DOCUMENT);
    let files = tmp.path().join("uploads");
    fs::create_dir_all(&files).unwrap();
    fs::write(files.join("cv.pdf"), b"%PDF-1.4 fake").unwrap();
    fs::write(files.join("notes.txt"), b"hello").unwrap();

    let (stdout, stderr, code) = run_folio(
        &config,
        &["upload", files.to_str().unwrap(), "--dry-run", "--progress", "json"],
    );
    assert_eq!(code, 0, "dry run failed: {}", stderr);
    assert!(stdout.contains("Dry run"));
    assert!(stdout.contains("cv.pdf"));
    assert!(stdout.contains("✓ Uploaded  https://drive.google.com/file/d/"));
    assert!(stdout.contains("2 uploaded, 0 already existed, 0 failed"));
    assert!(stderr.contains(r#""event":"batch_finished""#));
}

#[test]
fn test_upload_dry_run_include_filter() {
    let (tmp, config) = setup_site(DOCUMENT);
    let files = tmp.path().join("uploads");
    fs::create_dir_all(&files).unwrap();
    fs::write(files.join("cv.pdf"), b"pdf").unwrap();
    fs::write(files.join("notes.txt"), b"txt").unwrap();

    let (stdout, stderr, code) = run_folio(
        &config,
        &[
            "upload",
            files.to_str().unwrap(),
            "--dry-run",
            "--include",
            "*.pdf",
            "--progress",
            "off",
        ],
    );
    assert_eq!(code, 0, "dry run failed: {}", stderr);
    assert!(stdout.contains("cv.pdf"));
    assert!(!stdout.contains("notes.txt"));
    assert!(stdout.contains("1 uploaded"));
}

#[test]
fn test_upload_without_credentials_shows_banner() {
    let (tmp, config) = setup_site(DOCUMENT);
    let file = tmp.path().join("cv.pdf");
    fs::write(&file, b"pdf").unwrap();

    let (_, stderr, code) = run_folio(&config, &["upload", file.to_str().unwrap()]);
    assert_eq!(code, 2);
    assert!(stderr.contains("Configuration Required"));
    assert!(stderr.contains("drive.client_id"));
    assert!(stderr.contains("drive.api_key"));
}

#[test]
fn test_rank_stats() {
    let (_tmp, config) = setup_site(DOCUMENT);
    let (stdout, stderr, code) = run_folio(&config, &["rank", "stats"]);
    assert_eq!(code, 0, "rank stats failed: {}", stderr);
    assert!(stdout.contains("Current rank:  151,000"));
    assert!(stdout.contains("Best rank:     149,000"));
    assert!(stdout.contains("Days tracked:  2"));
}

#[test]
fn test_missing_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, code) = run_folio(&tmp.path().join("nope.toml"), &["render"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Failed to read config file"));
}

//! # folio
//!
//! Tooling behind a personal portfolio site: a renderer that binds a YAML
//! document onto a static HTML template, and an uploader that pushes local
//! files into a Google Drive folder with duplicate checks, audit metadata
//! and optional ownership transfer.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ data.yaml  │──▶│  render_cmd  │──▶│ index.html   │
//! │ rank feed  │   │ (core render)│   └──────────────┘
//! └────────────┘   └──────────────┘
//!
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ local files│──▶│  upload_cmd  │──▶│ Google Drive │
//! └────────────┘   │ AuthGate +   │   │  (HttpDrive) │
//!                  │ orchestrator │   └──────────────┘
//!                  └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! folio render                          # data.yaml -> dist/index.html
//! folio upload ./reports --dry-run      # try the upload pipeline offline
//! folio upload report.pdf --folder <ID> # real upload
//! folio rank fetch                      # append today's LeetCode rank
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`http`] | Shared client with retry and backoff |
//! | [`drive_http`] | Drive v3 REST implementation of `DriveApi` |
//! | [`auth`] | Auth gate, token sources, loopback consent |
//! | [`device`] | Device fingerprint for the audit trail |
//! | [`fetch`] | Document loading and YAML parsing |
//! | [`render_cmd`] | `folio render` |
//! | [`upload_cmd`] | `folio upload` |
//! | [`auth_cmd`] | `folio auth login` / `logout` |
//! | [`rank_fetch`] | `folio rank fetch` / `stats` |
//! | [`list_view`] | Text rendering of the upload queue |
//! | [`progress`] | Upload progress on stderr |

pub mod auth;
pub mod auth_cmd;
pub mod config;
pub mod device;
pub mod drive_http;
pub mod fetch;
pub mod http;
pub mod list_view;
pub mod progress;
pub mod rank_fetch;
pub mod render_cmd;
pub mod upload_cmd;

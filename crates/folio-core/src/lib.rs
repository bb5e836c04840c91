//! # folio core
//!
//! Shared logic for folio: the upload queue state machine, the Drive API
//! trait and its in-memory implementation, duplicate-check query
//! construction, audit metadata, user-agent parsing, rank statistics, and
//! portfolio page rendering.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! runtime-specific dependencies. File bytes are reached through the
//! [`models::FileContent`] trait and remote calls through
//! [`drive::DriveApi`].

pub mod audit;
pub mod drive;
pub mod format;
pub mod links;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod queue;
pub mod rank;
pub mod render;
pub mod useragent;

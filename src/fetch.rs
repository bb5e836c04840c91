//! Loading the portfolio document.

use anyhow::{Context, Result};
use folio_core::render::PortfolioDocument;
use thiserror::Error;
use tracing::{debug, info};

use crate::http::{is_url, HttpPolicy};

/// The document text was fetched but is not a valid YAML mapping.
#[derive(Debug, Error)]
#[error("failed to parse portfolio document: {reason}")]
pub struct ParseFailure {
    pub reason: String,
}

/// Read `source` as a URL (through the retrying client) or a local path.
pub async fn fetch_text(http: &HttpPolicy, source: &str) -> Result<String> {
    if is_url(source) {
        info!(url = source, "fetching document");
        let response = http
            .send_with_retry(|c| c.get(source))
            .await
            .with_context(|| format!("Failed to fetch {}", source))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Failed to fetch {}: HTTP {}", source, status.as_u16());
        }
        return response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", source));
    }

    debug!(path = source, "reading document");
    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("Failed to read {}", source))
}

pub fn parse_document(text: &str) -> std::result::Result<PortfolioDocument, ParseFailure> {
    let root: serde_json::Value = serde_yaml::from_str(text).map_err(|e| ParseFailure {
        reason: e.to_string(),
    })?;
    if !root.is_object() {
        return Err(ParseFailure {
            reason: "top level must be a mapping".to_string(),
        });
    }
    Ok(PortfolioDocument::new(root))
}

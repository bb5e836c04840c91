//! `folio render`: bind the portfolio document onto the site template.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use folio_core::rank::RankFeed;
use folio_core::render::{render_error_page, render_page, RankChart, RenderedPage};
use tracing::{info, warn};

use crate::config::Config;
use crate::fetch::{fetch_text, parse_document};
use crate::http::HttpPolicy;

pub async fn run_render(config: &Config, output: Option<PathBuf>) -> Result<()> {
    let http = HttpPolicy::new(&config.http)?;
    let output = output.unwrap_or_else(|| config.site.output.clone());
    let page = render_site(config, &http, &output).await?;

    println!("Rendered {}", output.display());
    for anchor in &page.bound {
        println!("  bound    {}", anchor.name());
    }
    for anchor in &page.missing_anchors {
        println!("  missing  {}", anchor.name());
    }
    Ok(())
}

/// Render and write the page. A document that cannot be loaded still
/// produces the error page before the error is returned.
pub async fn render_site(config: &Config, http: &HttpPolicy, output: &Path) -> Result<RenderedPage> {
    let template = std::fs::read_to_string(&config.site.template).with_context(|| {
        format!(
            "Failed to read template: {}",
            config.site.template.display()
        )
    })?;

    let doc = match fetch_text(http, &config.site.document).await {
        Ok(text) => parse_document(&text).map_err(anyhow::Error::from),
        Err(err) => Err(err),
    };
    let doc = match doc {
        Ok(doc) => doc,
        Err(err) => {
            let page = render_error_page(&template, &format!("{:#}", err));
            write_atomic(output, &page.html)?;
            return Err(err.context(format!(
                "Could not load portfolio document {}",
                config.site.document
            )));
        }
    };

    let chart = match &config.site.rank_feed {
        Some(source) => load_rank_chart(http, source, config).await,
        None => None,
    };

    let page = render_page(&template, &doc, chart.as_ref(), &config.site.defaults);
    write_atomic(output, &page.html)?;
    info!(
        output = %output.display(),
        bound = page.bound.len(),
        missing = page.missing_anchors.len(),
        "page rendered"
    );
    Ok(page)
}

async fn load_rank_chart(http: &HttpPolicy, source: &str, config: &Config) -> Option<RankChart> {
    let text = match fetch_text(http, source).await {
        Ok(text) => text,
        Err(err) => {
            warn!(source, error = %format!("{:#}", err), "rank feed unavailable, skipping chart");
            return None;
        }
    };
    let feed = match RankFeed::from_json(&text) {
        Ok(feed) => feed,
        Err(err) => {
            warn!(source, error = %err, "rank feed is not valid JSON, skipping chart");
            return None;
        }
    };
    let chart = RankChart::from_feed(&feed, config.site.rank_axis);
    if chart.is_none() {
        warn!(source, "rank feed has no usable samples, skipping chart");
    }
    chart
}

/// Write `content` through a sibling temp file and rename it into place.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, content)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move output into place: {}", path.display()))?;
    Ok(())
}

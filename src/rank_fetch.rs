//! `folio rank`: keep the LeetCode rank feed up to date.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use folio_core::format::format_number;
use folio_core::rank::{RankFeed, RankSample, RankSummary};
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::http::HttpPolicy;
use crate::render_cmd::write_atomic;

pub const LEETCODE_BASE: &str = "https://leetcode.com";

const PROFILE_QUERY: &str = "query getUserProfile($username: String!) {\n  \
    matchedUser(username: $username) {\n    username\n    profile {\n      ranking\n    }\n  }\n}";

/// Current rank of `username`, from the GraphQL API or the profile page.
pub async fn fetch_rank(http: &HttpPolicy, base: &str, username: &str) -> Result<Option<u64>> {
    let base = base.trim_end_matches('/');
    let graphql = format!("{}/graphql/", base);
    let payload = json!({ "query": PROFILE_QUERY, "variables": { "username": username } });

    match http.send_with_retry(|c| c.post(&graphql).json(&payload)).await {
        Ok(resp) if resp.status().is_success() => {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            let ranking = body
                .pointer("/data/matchedUser/profile/ranking")
                .and_then(serde_json::Value::as_u64)
                .filter(|r| *r > 0);
            if ranking.is_some() {
                return Ok(ranking);
            }
        }
        Ok(resp) => warn!(status = %resp.status(), "GraphQL rank query refused"),
        Err(err) => warn!(error = %err, "GraphQL rank query failed"),
    }

    info!("GraphQL API gave no ranking, trying the profile page");
    let profile = format!("{}/u/{}/", base, username);
    let resp = http
        .send_with_retry(|c| c.get(&profile))
        .await
        .with_context(|| format!("Failed to fetch {}", profile))?;
    if !resp.status().is_success() {
        anyhow::bail!("Failed to fetch {}: HTTP {}", profile, resp.status().as_u16());
    }
    let page = resp.text().await?;
    Ok(scan_ranking(&page))
}

/// Patterns tried in order against the profile page: the embedded JSON key,
/// a loose `ranking:` key, then a visible `Ranking 1234` label.
static RANKING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""ranking":\s*(\d+)"#,
        r#"ranking["']?\s*:\s*(\d+)"#,
        r"(?i)Ranking[:\s]+(\d+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// First ranking found on a profile page, e.g. `"ranking": 1234` or
/// `Ranking: 1234`.
pub fn scan_ranking(page: &str) -> Option<u64> {
    RANKING_PATTERNS.iter().find_map(|re| {
        re.captures(page)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Load the feed at `path`. Missing or corrupted files start a fresh feed.
pub fn load_feed(path: &Path) -> RankFeed {
    let Ok(text) = std::fs::read_to_string(path) else {
        return RankFeed::default();
    };
    match RankFeed::from_json(&text) {
        Ok(feed) => feed,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "rank feed is corrupted, starting fresh");
            RankFeed::default()
        }
    }
}

/// Append a sample stamped with the local date and time, then save.
pub fn save_sample(path: &Path, rank: u64, now: chrono::DateTime<chrono::Local>) -> Result<RankFeed> {
    let mut feed = load_feed(path);
    feed.record(RankSample {
        date: now.format("%Y-%m-%d").to_string(),
        rank,
        timestamp: Some(now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
    });
    let text = feed.to_json_pretty()?;
    write_atomic(path, &text)?;
    Ok(feed)
}

pub async fn run_rank_fetch(config: &Config, username: Option<String>) -> Result<()> {
    let username = username
        .or_else(|| config.rank.username.clone())
        .filter(|u| !u.trim().is_empty())
        .context("No LeetCode username: set rank.username or pass --user")?;
    let http = HttpPolicy::new(&config.http)?;

    println!("Fetching LeetCode rank for {}...", username);
    let Some(rank) = fetch_rank(&http, LEETCODE_BASE, &username).await? else {
        anyhow::bail!(
            "Could not find a ranking for {}. The profile may be private or the page layout changed.",
            username
        );
    };

    let feed = save_sample(&config.rank.data_file, rank, chrono::Local::now())?;
    println!("Current rank: {}", format_number(rank));
    println!("Data saved to {}", config.rank.data_file.display());
    println!("Total data points: {}", feed.data.len());
    Ok(())
}

pub fn run_rank_stats(config: &Config) -> Result<()> {
    let path = &config.rank.data_file;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rank feed: {}", path.display()))?;
    let feed = RankFeed::from_json(&text)
        .with_context(|| format!("Invalid rank feed: {}", path.display()))?;
    match RankSummary::from_daily(&feed.daily_best()) {
        Some(summary) => {
            println!("Current rank:  {}", summary.current_display());
            println!("Best rank:     {}", summary.best_display());
            println!("Days tracked:  {}", summary.days_tracked);
        }
        None => println!("No rank samples recorded yet."),
    }
    Ok(())
}

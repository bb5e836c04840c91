//! Rank history reduction and chart configuration.
//!
//! The feed is a list of dated rank samples, possibly several per day. The
//! chart and the summary both work from the best (lowest) rank of each
//! calendar day.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::format::format_number;

/// Above this first rank the y axis is drawn inverted under [`AxisMode::Auto`].
pub const INVERT_THRESHOLD: u64 = 1000;

/// Id of the canvas element the chart draws into.
pub const CHART_CANVAS_ID: &str = "leetcodeChart";

const LINE_COLOR: &str = "rgb(14, 165, 233)";
const FILL_COLOR: &str = "rgba(14, 165, 233, 0.1)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankSample {
    pub date: String,
    pub rank: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankFeed {
    #[serde(default)]
    pub data: Vec<RankSample>,
}

impl RankFeed {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Append a sample and keep the feed ordered by `(date, timestamp)`.
    pub fn record(&mut self, sample: RankSample) {
        self.data.push(sample);
        self.data
            .sort_by(|a, b| (&a.date, &a.timestamp).cmp(&(&b.date, &b.timestamp)));
    }

    pub fn daily_best(&self) -> Vec<(NaiveDate, u64)> {
        best_per_day(&self.data)
    }
}

/// Lowest rank per calendar day, ascending by date. Samples with a date
/// that is not `YYYY-MM-DD` are dropped.
pub fn best_per_day(samples: &[RankSample]) -> Vec<(NaiveDate, u64)> {
    let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for sample in samples {
        let Ok(day) = NaiveDate::parse_from_str(sample.date.trim(), "%Y-%m-%d") else {
            warn!(date = %sample.date, "dropping rank sample with invalid date");
            continue;
        };
        by_day
            .entry(day)
            .and_modify(|best| *best = (*best).min(sample.rank))
            .or_insert(sample.rank);
    }
    by_day.into_iter().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankSummary {
    /// Best rank of the latest tracked day.
    pub current: u64,
    pub best: u64,
    pub days_tracked: usize,
}

impl RankSummary {
    pub fn from_daily(daily: &[(NaiveDate, u64)]) -> Option<Self> {
        let (_, current) = daily.last()?;
        let best = daily.iter().map(|(_, rank)| *rank).min()?;
        Some(Self {
            current: *current,
            best,
            days_tracked: daily.len(),
        })
    }

    pub fn current_display(&self) -> String {
        format_number(self.current)
    }

    pub fn best_display(&self) -> String {
        format_number(self.best)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrientation {
    Normal,
    Inverted,
}

/// How the y axis orientation is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisMode {
    /// Inverted when the first day's rank exceeds [`INVERT_THRESHOLD`].
    #[default]
    Auto,
    Normal,
    Inverted,
}

impl AxisMode {
    pub fn resolve(self, daily: &[(NaiveDate, u64)]) -> AxisOrientation {
        match self {
            AxisMode::Normal => AxisOrientation::Normal,
            AxisMode::Inverted => AxisOrientation::Inverted,
            AxisMode::Auto => match daily.first() {
                Some((_, rank)) if *rank > INVERT_THRESHOLD => AxisOrientation::Inverted,
                _ => AxisOrientation::Normal,
            },
        }
    }
}

impl FromStr for AxisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(AxisMode::Auto),
            "normal" => Ok(AxisMode::Normal),
            "inverted" => Ok(AxisMode::Inverted),
            other => Err(format!(
                "unknown rank axis '{}': expected auto, normal, or inverted",
                other
            )),
        }
    }
}

/// Data and orientation of the rank line chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSpec {
    pub labels: Vec<String>,
    pub ranks: Vec<u64>,
    pub orientation: AxisOrientation,
}

impl ChartSpec {
    pub fn new(daily: &[(NaiveDate, u64)], mode: AxisMode) -> Self {
        Self {
            labels: daily
                .iter()
                .map(|(day, _)| day.format("%Y-%m-%d").to_string())
                .collect(),
            ranks: daily.iter().map(|(_, rank)| *rank).collect(),
            orientation: mode.resolve(daily),
        }
    }

    /// Chart.js `line` configuration. Function-valued options (tooltip and
    /// tick formatting) are attached by [`chart_markup`].
    pub fn to_chart_js(&self) -> serde_json::Value {
        json!({
            "type": "line",
            "data": {
                "labels": self.labels,
                "datasets": [{
                    "label": "LeetCode Rank",
                    "data": self.ranks,
                    "borderColor": LINE_COLOR,
                    "backgroundColor": FILL_COLOR,
                    "borderWidth": 2,
                    "fill": true,
                    "tension": 0.4,
                    "pointRadius": 4,
                    "pointHoverRadius": 6,
                    "pointBackgroundColor": LINE_COLOR,
                    "pointBorderColor": "#fff",
                    "pointBorderWidth": 2
                }]
            },
            "options": {
                "responsive": true,
                "maintainAspectRatio": false,
                "plugins": {
                    "legend": {
                        "display": true,
                        "position": "top",
                        "labels": { "color": "var(--text)", "font": { "size": 14 } }
                    },
                    "tooltip": {
                        "mode": "index",
                        "intersect": false,
                        "backgroundColor": "var(--card)",
                        "titleColor": "var(--text)",
                        "bodyColor": "var(--text)",
                        "borderColor": "var(--border)",
                        "borderWidth": 1,
                        "padding": 12
                    }
                },
                "scales": {
                    "x": {
                        "ticks": { "color": "var(--muted)", "maxRotation": 45, "minRotation": 45 },
                        "grid": { "color": "var(--border)" }
                    },
                    "y": {
                        "reverse": self.orientation == AxisOrientation::Inverted,
                        "ticks": { "color": "var(--muted)" },
                        "grid": { "color": "var(--border)" }
                    }
                },
                "interaction": { "mode": "nearest", "axis": "x", "intersect": false }
            }
        })
    }
}

/// Canvas plus an inline script that draws the chart with Chart.js.
pub fn chart_markup(spec: &ChartSpec) -> String {
    // Serialized JSON cannot contain a raw `</script>`; labels are dates and
    // data are integers, so escaping `<` is enough.
    let config = spec.to_chart_js().to_string().replace('<', "\\u003c");
    format!(
        r#"<canvas id="{id}"></canvas>
<script>
(function () {{
  var config = {config};
  config.options.plugins.tooltip.callbacks = {{
    label: function (context) {{ return 'Rank: ' + context.parsed.y.toLocaleString(); }}
  }};
  config.options.scales.y.ticks.callback = function (value) {{ return value.toLocaleString(); }};
  new Chart(document.getElementById('{id}'), config);
}})();
</script>"#,
        id = CHART_CANVAS_ID,
        config = config
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(date: &str, rank: u64) -> RankSample {
        RankSample {
            date: date.to_string(),
            rank,
            timestamp: None,
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn keeps_lowest_rank_per_day_in_date_order() {
        let daily = best_per_day(&[
            sample("2025-01-02", 900),
            sample("2025-01-01", 1200),
            sample("2025-01-02", 850),
            sample("2025-01-01", 1100),
        ]);
        assert_eq!(daily, vec![(day("2025-01-01"), 1100), (day("2025-01-02"), 850)]);

        let summary = RankSummary::from_daily(&daily).unwrap();
        assert_eq!(summary.current, 850);
        assert_eq!(summary.best, 850);
        assert_eq!(summary.days_tracked, 2);
    }

    #[test]
    fn invalid_dates_are_dropped() {
        let daily = best_per_day(&[sample("yesterday", 5), sample("2025-02-30", 6), sample("2025-02-01", 7)]);
        assert_eq!(daily, vec![(day("2025-02-01"), 7)]);
    }

    #[test]
    fn empty_feed_has_no_summary() {
        assert_eq!(RankSummary::from_daily(&[]), None);
    }

    #[test]
    fn current_can_be_worse_than_best() {
        let daily = best_per_day(&[sample("2025-01-01", 500), sample("2025-01-03", 700)]);
        let summary = RankSummary::from_daily(&daily).unwrap();
        assert_eq!(summary.current, 700);
        assert_eq!(summary.best, 500);
    }

    #[test]
    fn auto_axis_uses_first_day() {
        let high = [(day("2025-01-01"), 250_000), (day("2025-01-02"), 10)];
        let low = [(day("2025-01-01"), 1000), (day("2025-01-02"), 250_000)];
        assert_eq!(AxisMode::Auto.resolve(&high), AxisOrientation::Inverted);
        assert_eq!(AxisMode::Auto.resolve(&low), AxisOrientation::Normal);
        assert_eq!(AxisMode::Inverted.resolve(&low), AxisOrientation::Inverted);
        assert_eq!(AxisMode::Normal.resolve(&high), AxisOrientation::Normal);
    }

    #[test]
    fn chart_config_carries_labels_and_reverse() {
        let daily = [(day("2025-01-01"), 123_456)];
        let spec = ChartSpec::new(&daily, AxisMode::Auto);
        let config = spec.to_chart_js();
        assert_eq!(config["type"], "line");
        assert_eq!(config["data"]["labels"][0], "2025-01-01");
        assert_eq!(config["data"]["datasets"][0]["data"][0], 123_456);
        assert_eq!(config["data"]["datasets"][0]["label"], "LeetCode Rank");
        assert_eq!(config["options"]["scales"]["y"]["reverse"], true);

        let markup = chart_markup(&spec);
        assert!(markup.starts_with("<canvas id=\"leetcodeChart\"></canvas>"));
        assert!(markup.contains("new Chart("));
    }

    #[test]
    fn record_keeps_feed_sorted() {
        let mut feed = RankFeed::default();
        feed.record(RankSample {
            date: "2025-01-02".into(),
            rank: 3,
            timestamp: Some("2025-01-02T08:00:00".into()),
        });
        feed.record(RankSample {
            date: "2025-01-01".into(),
            rank: 4,
            timestamp: Some("2025-01-01T08:00:00".into()),
        });
        assert_eq!(feed.data[0].date, "2025-01-01");
        let round = RankFeed::from_json(&feed.to_json_pretty().unwrap()).unwrap();
        assert_eq!(round, feed);
    }

    #[test]
    fn feed_without_data_key_is_empty() {
        assert!(RankFeed::from_json("{}").unwrap().data.is_empty());
    }
}

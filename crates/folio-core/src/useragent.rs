//! User-agent classification.
//!
//! Each table is scanned top to bottom and the first matching rule wins.
//! A rule matches when any of its patterns occurs in the user agent and
//! none of its exclusions do.

use crate::models::UNKNOWN;

struct Rule {
    any_of: &'static [&'static str],
    none_of: &'static [&'static str],
    value: &'static str,
    /// Marker whose trailing digits are the version.
    version_marker: Option<&'static str>,
}

impl Rule {
    fn matches(&self, ua: &str) -> bool {
        self.any_of.iter().any(|p| ua.contains(p)) && !self.none_of.iter().any(|p| ua.contains(p))
    }
}

const BROWSERS: &[Rule] = &[
    Rule {
        any_of: &["Firefox/"],
        none_of: &[],
        value: "Firefox",
        version_marker: Some("Firefox/"),
    },
    Rule {
        any_of: &["Chrome/"],
        none_of: &["Edg/"],
        value: "Chrome",
        version_marker: Some("Chrome/"),
    },
    Rule {
        any_of: &["Safari/"],
        none_of: &["Chrome/"],
        value: "Safari",
        version_marker: Some("Version/"),
    },
    Rule {
        any_of: &["Edg/"],
        none_of: &[],
        value: "Edge",
        version_marker: Some("Edg/"),
    },
];

// Order matters: Android agents also carry "Linux" and report Linux.
const OPERATING_SYSTEMS: &[Rule] = &[
    Rule {
        any_of: &["Windows"],
        none_of: &[],
        value: "Windows",
        version_marker: None,
    },
    Rule {
        any_of: &["Mac OS X", "Macintosh"],
        none_of: &[],
        value: "macOS",
        version_marker: None,
    },
    Rule {
        any_of: &["Linux"],
        none_of: &[],
        value: "Linux",
        version_marker: None,
    },
    Rule {
        any_of: &["Android"],
        none_of: &[],
        value: "Android",
        version_marker: None,
    },
    Rule {
        any_of: &["iOS", "iPhone", "iPad"],
        none_of: &[],
        value: "iOS",
        version_marker: None,
    },
];

const DEVICE_CLASSES: &[Rule] = &[
    Rule {
        any_of: &["Mobile", "Android", "iPhone"],
        none_of: &[],
        value: "Mobile",
        version_marker: None,
    },
    Rule {
        any_of: &["Tablet", "iPad"],
        none_of: &[],
        value: "Tablet",
        version_marker: None,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser: String,
    pub version: String,
    pub os: String,
    pub device_type: String,
}

pub fn parse_user_agent(ua: &str) -> UserAgentInfo {
    let browser = BROWSERS.iter().find(|r| r.matches(ua));
    let version = browser
        .and_then(|r| r.version_marker)
        .and_then(|marker| leading_digits_after(ua, marker))
        .unwrap_or_else(|| UNKNOWN.to_string());

    UserAgentInfo {
        browser: browser.map(|r| r.value).unwrap_or(UNKNOWN).to_string(),
        version,
        os: first_match(OPERATING_SYSTEMS, ua).unwrap_or(UNKNOWN).to_string(),
        device_type: first_match(DEVICE_CLASSES, ua)
            .unwrap_or("Desktop")
            .to_string(),
    }
}

fn first_match(table: &[Rule], ua: &str) -> Option<&'static str> {
    table.iter().find(|r| r.matches(ua)).map(|r| r.value)
}

fn leading_digits_after(ua: &str, marker: &str) -> Option<String> {
    let start = ua.find(marker)? + marker.len();
    let digits: String = ua[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

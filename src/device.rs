//! Device fingerprint for the upload audit trail.

use std::time::Duration;

use folio_core::models::{DeviceInfo, UNKNOWN};
use folio_core::useragent::parse_user_agent;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::http::HttpPolicy;

pub const IP_ENDPOINT: &str = "https://api.ipify.org?format=json";
pub const LOCATION_ENDPOINT: &str = "https://ipapi.co";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Public IP and geolocation lookup endpoints.
#[derive(Debug, Clone)]
pub struct NetworkLookup {
    pub ip_url: String,
    pub location_base: String,
}

impl Default for NetworkLookup {
    fn default() -> Self {
        Self {
            ip_url: IP_ENDPOINT.to_string(),
            location_base: LOCATION_ENDPOINT.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct IpReply {
    #[serde(default)]
    ip: Option<String>,
}

#[derive(Deserialize)]
struct LocationReply {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
}

/// `"City, Region, Country"` with empty parts dropped, or `None`.
fn location_line(reply: &LocationReply) -> Option<String> {
    let parts: Vec<&str> = [&reply.city, &reply.region, &reply.country_name]
        .into_iter()
        .filter_map(|p| p.as_deref().map(str::trim))
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Best-effort `(ip, location)`. Every failure degrades to `"Unknown"`.
async fn network_identity(http: &HttpPolicy, lookup: &NetworkLookup) -> (String, String) {
    let ip = match http
        .client()
        .get(&lookup.ip_url)
        .timeout(LOOKUP_TIMEOUT)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => resp
            .json::<IpReply>()
            .await
            .ok()
            .and_then(|r| r.ip)
            .filter(|ip| !ip.is_empty()),
        Ok(resp) => {
            debug!(status = %resp.status(), "ip lookup refused");
            None
        }
        Err(err) => {
            warn!(error = %err, "could not fetch public IP");
            None
        }
    };
    let Some(ip) = ip else {
        return (UNKNOWN.to_string(), UNKNOWN.to_string());
    };

    let url = format!("{}/{}/json/", lookup.location_base.trim_end_matches('/'), ip);
    let location = match http.client().get(&url).timeout(LOOKUP_TIMEOUT).send().await {
        Ok(resp) if resp.status().is_success() => resp
            .json::<LocationReply>()
            .await
            .ok()
            .as_ref()
            .and_then(location_line),
        Ok(_) => None,
        Err(err) => {
            warn!(error = %err, "could not fetch IP-based location");
            None
        }
    };
    (ip, location.unwrap_or_else(|| UNKNOWN.to_string()))
}

fn language() -> String {
    ["LC_ALL", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|v| v.split('.').next().unwrap_or_default().replace('_', "-"))
        .find(|v| !v.is_empty() && v != "C" && v != "POSIX")
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn utc_offset() -> String {
    chrono::Local::now().format("UTC%:z").to_string()
}

/// Everything that can be read without the network. IP and location stay
/// `"Unknown"`.
pub fn local_device_info(user_agent: &str) -> DeviceInfo {
    let agent = parse_user_agent(user_agent);
    DeviceInfo {
        browser: agent.browser,
        browser_version: agent.version,
        os: agent.os,
        device_type: agent.device_type,
        user_agent: user_agent.to_string(),
        screen: UNKNOWN.to_string(),
        timezone: utc_offset(),
        language: language(),
        ip_address: UNKNOWN.to_string(),
        location: UNKNOWN.to_string(),
        platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
    }
}

pub async fn collect_device_info(
    http: &HttpPolicy,
    lookup: &NetworkLookup,
    user_agent: &str,
) -> DeviceInfo {
    let mut device = local_device_info(user_agent);
    let (ip_address, location) = network_identity(http, lookup).await;
    device.ip_address = ip_address;
    device.location = location;
    debug!(?device, "device info collected");
    device
}

/// A user agent describing this CLI, with the OS spelled the way browsers
/// report it so the parser recognizes it.
pub fn cli_user_agent() -> String {
    let os = match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Macintosh; Mac OS X",
        "windows" => "Windows NT",
        "android" => "Android",
        "ios" => "iOS",
        other => other,
    };
    format!(
        "folio/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        os,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;

    #[test]
    fn location_skips_empty_parts() {
        let reply = LocationReply {
            city: Some("".into()),
            region: Some("Bavaria".into()),
            country_name: Some("Germany".into()),
        };
        assert_eq!(location_line(&reply).as_deref(), Some("Bavaria, Germany"));
        let empty = LocationReply {
            city: None,
            region: None,
            country_name: Some(" ".into()),
        };
        assert_eq!(location_line(&empty), None);
    }

    #[tokio::test]
    async fn lookups_fill_ip_and_location() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ip")
            .with_body(r#"{"ip":"203.0.113.7"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/203.0.113.7/json/")
            .with_body(r#"{"city":"Lyon","region":"","country_name":"France"}"#)
            .create_async()
            .await;
        let lookup = NetworkLookup {
            ip_url: format!("{}/ip", server.url()),
            location_base: server.url(),
        };
        let http = HttpPolicy::new(&HttpConfig::default()).unwrap();
        let device = collect_device_info(&http, &lookup, &cli_user_agent()).await;
        assert_eq!(device.ip_address, "203.0.113.7");
        assert_eq!(device.location, "Lyon, France");
        assert_eq!(device.screen, "Unknown");
        assert_eq!(device.browser, "Unknown");
    }

    #[tokio::test]
    async fn failed_lookup_is_unknown() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/ip").with_status(500).create_async().await;
        let lookup = NetworkLookup {
            ip_url: format!("{}/ip", server.url()),
            location_base: server.url(),
        };
        let http = HttpPolicy::new(&HttpConfig {
            timeout_secs: 5,
            max_retries: 0,
        })
        .unwrap();
        let device = collect_device_info(&http, &lookup, "").await;
        assert_eq!(device.ip_address, "Unknown");
        assert_eq!(device.location, "Unknown");
    }
}

//! Audit-trail metadata attached to every upload.
//!
//! Each uploaded file carries a human-readable description
//! ("Uploaded by: … on …" plus device details) and a flat set of custom
//! properties. `uploader_email` and `file_size` double as the keys of the
//! duplicate check.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

use crate::models::{AuthSession, DeviceInfo, LocalFile, UploadMetadata, UNKNOWN};
use crate::query::{FILE_SIZE_PROPERTY, UPLOADER_EMAIL_PROPERTY};

fn known(value: &str) -> Option<&str> {
    if value.is_empty() || value == UNKNOWN {
        None
    } else {
        Some(value)
    }
}

fn or_unknown(value: &str) -> String {
    known(value).unwrap_or(UNKNOWN).to_string()
}

/// `"Jan 5, 2025, 3:04 PM"`.
pub fn format_upload_date(at: &DateTime<FixedOffset>) -> String {
    at.format("%b %-d, %Y, %-I:%M %p").to_string()
}

/// First line of the description.
pub fn uploader_line(session: &AuthSession, at: &DateTime<FixedOffset>) -> String {
    let email = or_unknown(&session.email);
    let date = format_upload_date(at);
    match known(&session.display_name) {
        Some(name) if name != session.email => {
            format!("Uploaded by: {} ({}) on {}", name, email, date)
        }
        _ => format!("Uploaded by: {} on {}", email, date),
    }
}

/// `Browser: Chrome 120 | OS: Windows | …`, or `None` when nothing is known.
pub fn device_line(device: &DeviceInfo) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(browser) = known(&device.browser) {
        match known(&device.browser_version) {
            Some(version) => parts.push(format!("Browser: {} {}", browser, version)),
            None => parts.push(format!("Browser: {}", browser)),
        }
    }
    let labelled = [
        ("OS", &device.os),
        ("Device", &device.device_type),
        ("Platform", &device.platform),
        ("IP", &device.ip_address),
        ("Location", &device.location),
    ];
    for (label, value) in labelled {
        if let Some(v) = known(value) {
            parts.push(format!("{}: {}", label, v));
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

pub fn build_upload_metadata(
    file: &LocalFile,
    session: &AuthSession,
    folder_id: Option<&str>,
    at: DateTime<FixedOffset>,
) -> UploadMetadata {
    let fallback = DeviceInfo::default();
    let device = session.device.as_ref().unwrap_or(&fallback);

    let mut description = uploader_line(session, &at);
    if let Some(details) = device_line(device) {
        description.push_str("\n\n");
        description.push_str(&details);
    }

    let timestamp = at
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut properties = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        properties.insert(key.to_string(), value);
    };
    put(UPLOADER_EMAIL_PROPERTY, or_unknown(&session.email));
    put("uploader_name", or_unknown(&session.display_name));
    put("upload_timestamp", timestamp);
    put(FILE_SIZE_PROPERTY, file.size.to_string());
    put("upload_ip", or_unknown(&device.ip_address));
    put("upload_location", or_unknown(&device.location));
    put("upload_browser", or_unknown(&device.browser));
    put("upload_browser_version", or_unknown(&device.browser_version));
    put("upload_os", or_unknown(&device.os));
    put("upload_device_type", or_unknown(&device.device_type));
    put("upload_screen", or_unknown(&device.screen));
    put("upload_timezone", or_unknown(&device.timezone));
    put("upload_language", or_unknown(&device.language));
    put("upload_platform", or_unknown(&device.platform));

    UploadMetadata {
        name: file.name.clone(),
        parents: folder_id
            .filter(|f| !f.is_empty())
            .map(|f| vec![f.to_string()])
            .unwrap_or_default(),
        description,
        properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2025, 1, 5, 15, 4, 0)
            .unwrap()
    }

    #[test]
    fn uploader_line_with_distinct_name() {
        let s = AuthSession::new("t", "ada@x.io", "Ada");
        assert_eq!(
            uploader_line(&s, &at()),
            "Uploaded by: Ada (ada@x.io) on Jan 5, 2025, 3:04 PM"
        );
    }

    #[test]
    fn uploader_line_when_name_is_email() {
        let s = AuthSession::new("t", "ada@x.io", "ada@x.io");
        assert_eq!(
            uploader_line(&s, &at()),
            "Uploaded by: ada@x.io on Jan 5, 2025, 3:04 PM"
        );
    }

    #[test]
    fn device_line_skips_unknown_parts() {
        let device = DeviceInfo {
            browser: "Firefox".into(),
            os: "Linux".into(),
            ip_address: "203.0.113.9".into(),
            ..DeviceInfo::default()
        };
        assert_eq!(
            device_line(&device).unwrap(),
            "Browser: Firefox | OS: Linux | IP: 203.0.113.9"
        );
        assert_eq!(device_line(&DeviceInfo::default()), None);
    }

    #[test]
    fn metadata_carries_duplicate_keys_and_folder() {
        let file = LocalFile::from_bytes("cv.pdf", "application/pdf", vec![0; 12]);
        let session = AuthSession::new("t", "ada@x.io", "Ada");
        let meta = build_upload_metadata(&file, &session, Some("F1"), at());
        assert_eq!(meta.parents, vec!["F1".to_string()]);
        assert_eq!(meta.properties["uploader_email"], "ada@x.io");
        assert_eq!(meta.properties["file_size"], "12");
        assert_eq!(meta.properties["upload_timestamp"], "2025-01-05T14:04:00.000Z");
        assert_eq!(meta.properties["upload_os"], "Unknown");
        assert_eq!(meta.properties.len(), 14);
        assert!(!meta.description.contains("\n\n"));
    }
}

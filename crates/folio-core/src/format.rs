//! Display helpers shared by the list renderer and the rank summary.

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Humanize a byte count in base-1024 units, two decimals at most.
///
/// Anything past the last unit stays in GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    let mut number = format!("{:.2}", rounded);
    while number.ends_with('0') {
        number.pop();
    }
    if number.ends_with('.') {
        number.pop();
    }
    format!("{} {}", number, SIZE_UNITS[unit])
}

/// Icon for a MIME type. Checks run in order; the first hit wins.
pub fn file_icon(mime_type: &str) -> &'static str {
    let has = |needle: &str| mime_type.contains(needle);
    if mime_type.starts_with("image/") {
        "🖼️"
    } else if mime_type.starts_with("video/") {
        "🎥"
    } else if mime_type.starts_with("audio/") {
        "🎵"
    } else if has("pdf") {
        "📄"
    } else if has("word") || has("document") {
        "📝"
    } else if has("excel") || has("spreadsheet") {
        "📊"
    } else if has("zip") || has("archive") {
        "📦"
    } else if has("code") || has("text") {
        "📃"
    } else {
        "📎"
    }
}

/// `1234567` → `"1,234,567"`.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 * 1024), "3072 GB");
    }

    #[test]
    fn icons_by_mime() {
        assert_eq!(file_icon("image/png"), "🖼️");
        assert_eq!(file_icon("application/pdf"), "📄");
        assert_eq!(
            file_icon("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            "📝"
        );
        assert_eq!(file_icon("application/vnd.ms-excel"), "📊");
        assert_eq!(file_icon("application/zip"), "📦");
        assert_eq!(file_icon("text/plain"), "📃");
        assert_eq!(file_icon("application/octet-stream"), "📎");
    }

    #[test]
    fn number_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_number(123_456), "123,456");
    }
}

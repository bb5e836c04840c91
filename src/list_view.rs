//! Plain-text rendering of the upload queue.

use folio_core::format::{file_icon, format_file_size};
use folio_core::models::{UploadItem, UploadStatus};

pub fn drive_view_url(id: &str) -> String {
    format!("https://drive.google.com/file/d/{}/view", id)
}

pub fn status_text(item: &UploadItem) -> String {
    match item.status {
        UploadStatus::Pending => "pending".to_string(),
        UploadStatus::Uploading => format!("{}%", item.progress),
        UploadStatus::Success => match &item.remote_id {
            Some(id) => format!("✓ Uploaded  {}", drive_view_url(id)),
            None => "✓ Uploaded".to_string(),
        },
        UploadStatus::Error => format!(
            "✗ Failed: {}",
            item.error.as_deref().unwrap_or("Upload failed")
        ),
        UploadStatus::Skipped => "⊘ Already exists".to_string(),
    }
}

/// One line per item: icon, name, size, status. Empty queue renders nothing.
pub fn render_list(items: &[UploadItem]) -> String {
    let name_width = items
        .iter()
        .map(|i| i.file.name.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for item in items {
        let size = format_file_size(item.file.size);
        out.push_str(&format!(
            "{} {:<name_width$}  {:>10}  {}\n",
            file_icon(&item.file.mime_type),
            item.file.name,
            size,
            status_text(item),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::models::LocalFile;

    fn item(name: &str, status: UploadStatus) -> UploadItem {
        let mut item = UploadItem::new(LocalFile::from_bytes(name, "application/pdf", vec![0; 2048]));
        item.status = status;
        item
    }

    #[test]
    fn statuses_render_per_state() {
        let mut uploading = item("a.pdf", UploadStatus::Uploading);
        uploading.progress = 37;
        assert_eq!(status_text(&uploading), "37%");

        let mut done = item("a.pdf", UploadStatus::Success);
        done.remote_id = Some("F1".into());
        assert_eq!(
            status_text(&done),
            "✓ Uploaded  https://drive.google.com/file/d/F1/view"
        );

        let mut failed = item("a.pdf", UploadStatus::Error);
        failed.error = Some("Permission denied.".into());
        assert_eq!(status_text(&failed), "✗ Failed: Permission denied.");

        assert_eq!(status_text(&item("a.pdf", UploadStatus::Skipped)), "⊘ Already exists");
        assert_eq!(status_text(&item("a.pdf", UploadStatus::Pending)), "pending");
    }

    #[test]
    fn rows_align_names() {
        let items = vec![item("a.pdf", UploadStatus::Pending), item("longer.pdf", UploadStatus::Pending)];
        let out = render_list(&items);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("a.pdf     "));
        assert!(lines[1].contains("2 KB"));
        assert!(render_list(&[]).is_empty());
    }
}

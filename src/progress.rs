//! Upload progress reporting.
//!
//! Reports each step of an upload batch so users see which file is moving,
//! how far along it is, and how it ended. Progress is emitted on **stderr**
//! so stdout stays parseable for scripts.

use std::io::Write;

use folio_core::format::format_number;
use folio_core::orchestrator::{NoopSink, ProgressSink, UploadEvent};

/// Human-friendly progress on stderr: "upload report.pdf  42%".
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn on_event(&self, event: &UploadEvent) {
        let line = match event {
            UploadEvent::Started { name, .. } => format!("upload {}  starting\n", name),
            UploadEvent::Progress { name, percent, .. } => {
                format!("upload {}  {}%\n", name, percent)
            }
            UploadEvent::Skipped { name, .. } => format!("upload {}  already exists\n", name),
            UploadEvent::Succeeded { name, remote_id, .. } => {
                format!("upload {}  done ({})\n", name, remote_id)
            }
            UploadEvent::Failed { name, hint, .. } => format!("upload {}  failed: {}\n", name, hint),
            UploadEvent::BatchFinished(summary) => format!(
                "batch  {} uploaded, {} skipped, {} failed of {} files\n",
                format_number(summary.uploaded as u64),
                format_number(summary.skipped as u64),
                format_number(summary.failed as u64),
                format_number(summary.attempted as u64)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

pub fn event_json(event: &UploadEvent) -> serde_json::Value {
    match event {
        UploadEvent::Started { index, name } => serde_json::json!({
            "event": "started", "index": index, "name": name
        }),
        UploadEvent::Progress {
            index,
            name,
            percent,
        } => serde_json::json!({
            "event": "progress", "index": index, "name": name, "percent": percent
        }),
        UploadEvent::Skipped {
            index,
            name,
            existing_id,
        } => serde_json::json!({
            "event": "skipped", "index": index, "name": name, "existing_id": existing_id
        }),
        UploadEvent::Succeeded {
            index,
            name,
            remote_id,
        } => serde_json::json!({
            "event": "succeeded", "index": index, "name": name, "remote_id": remote_id
        }),
        UploadEvent::Failed {
            index,
            name,
            message,
            hint,
        } => serde_json::json!({
            "event": "failed", "index": index, "name": name, "message": message, "hint": hint
        }),
        UploadEvent::BatchFinished(summary) => serde_json::json!({
            "event": "batch_finished",
            "attempted": summary.attempted,
            "uploaded": summary.uploaded,
            "skipped": summary.skipped,
            "failed": summary.failed
        }),
    }
}

impl ProgressSink for JsonProgress {
    fn on_event(&self, event: &UploadEvent) {
        if let Ok(line) = serde_json::to_string(&event_json(event)) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressSink> {
        match self {
            ProgressMode::Off => Box::new(NoopSink),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::orchestrator::BatchSummary;

    #[test]
    fn json_events_carry_kind_and_fields() {
        let v = event_json(&UploadEvent::Progress {
            index: 2,
            name: "a.pdf".into(),
            percent: 40,
        });
        assert_eq!(v["event"], "progress");
        assert_eq!(v["percent"], 40);

        let v = event_json(&UploadEvent::BatchFinished(BatchSummary {
            attempted: 3,
            uploaded: 1,
            skipped: 1,
            failed: 1,
        }));
        assert_eq!(v["event"], "batch_finished");
        assert_eq!(v["failed"], 1);
    }

    #[test]
    fn every_mode_builds_a_reporter() {
        let event = UploadEvent::BatchFinished(BatchSummary::default());
        for mode in [ProgressMode::Off, ProgressMode::Human, ProgressMode::Json] {
            mode.reporter().on_event(&event);
        }
    }
}

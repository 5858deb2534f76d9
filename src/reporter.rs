use crate::types::{Announcement, SweepReport};

/// Emit an announcement as a single JSON line to stdout.
pub fn report_announcement(announcement: &Announcement) {
    if let Ok(json) = serde_json::to_string(announcement) {
        println!("{json}");
    }
}

/// Emit a sweep summary as a single JSON line to stdout.
pub fn report_sweep(report: &SweepReport) {
    if let Ok(json) = serde_json::to_string(&serde_json::json!({ "sweep": report })) {
        println!("{json}");
    }
}

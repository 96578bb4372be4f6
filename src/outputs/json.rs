//! JSON output for dedupe reports.
//!
//! Reports are grouped into one directory per day and named after the local
//! time the run finished:
//! `{json_output_dir}/{YYYY-MM-DD}/dedupe_{HH-MM-SS}.json`.

use crate::error::Result;
use crate::models::DedupeReport;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Path a report generated at `at` is written to.
pub fn report_path(json_output_dir: &str, at: DateTime<Local>) -> PathBuf {
    PathBuf::from(json_output_dir)
        .join(at.format("%Y-%m-%d").to_string())
        .join(format!("dedupe_{}.json", at.format("%H-%M-%S")))
}

/// Serialize `report` under `json_output_dir`, creating the date directory.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_report(report: &DedupeReport, json_output_dir: &str) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(json_output_dir, report.generated_at.with_timezone(&Local));

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), entries = report.entries.len(), "Wrote dedupe report");
    Ok(path)
}

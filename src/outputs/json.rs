//! JSON serialization of [`IngestReport`]s.
//!
//! Reports are grouped by the UTC date the run finished on, one file per run
//! named after its finishing time, so repeated runs on the same day never
//! overwrite each other (short of finishing within the same second).

use crate::error::Result;
use crate::models::IngestReport;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the report file for `report` under `report_dir`.
pub fn report_path(report: &IngestReport, report_dir: impl AsRef<Path>) -> PathBuf {
    let finished = report.finished_at;
    report_dir
        .as_ref()
        .join(finished.format("%Y-%m-%d").to_string())
        .join(format!("ingest-{}.json", finished.format("%H%M%S")))
}

/// Write `report` as pretty-printed JSON to
/// `{report_dir}/{YYYY-MM-DD}/ingest-{HHMMSS}.json`, creating directories as
/// needed. Returns the written path.
#[instrument(level = "info", skip_all, fields(report_dir = %report_dir.as_ref().display()))]
pub async fn write_report(report: &IngestReport, report_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(report, &report_dir);

    if let Some(parent) = path.parent() {
        info!(dir = %parent.display(), "Ensuring report directory exists");
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create report dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote ingest report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemFailure, SourceOutcome};
    use chrono::{TimeZone, Utc};

    fn report() -> IngestReport {
        IngestReport {
            started_at: Utc.with_ymd_and_hms(2025, 5, 6, 7, 14, 0).unwrap(),
            finished_at: Utc.with_ymd_and_hms(2025, 5, 6, 7, 15, 2).unwrap(),
            sources: vec![
                SourceOutcome::Completed {
                    source: "bbc-news".to_string(),
                    articles_added: 3,
                    skipped: 1,
                    failures: vec![ItemFailure {
                        title: "Broken story".to_string(),
                        error: "storage error: disk full".to_string(),
                    }],
                },
                SourceOutcome::Failed {
                    source: "gone".to_string(),
                    error: "news API error: sourceDoesNotExist: gone".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_report_path_layout() {
        assert_eq!(
            report_path(&report(), "/tmp/reports"),
            PathBuf::from("/tmp/reports/2025-05-06/ingest-071502.json")
        );
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report(&report(), dir.path()).await.unwrap();
        assert!(path.starts_with(dir.path().join("2025-05-06")));

        let raw = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["sources"][0]["articlesAdded"], 3);
        assert_eq!(doc["sources"][0]["failures"][0]["title"], "Broken story");
        assert_eq!(doc["sources"][1]["error"], "news API error: sourceDoesNotExist: gone");
        assert!(doc["startedAt"].as_str().unwrap().starts_with("2025-05-06T07:14:00"));

        let back: IngestReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, report());
    }
}

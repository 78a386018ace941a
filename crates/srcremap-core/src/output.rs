//! JSON run summary.
//!
//! Every CLI run ends by printing one [`RunSummary`] to stdout, success or
//! failure. `status` comes first; sections that do not apply to a command
//! are absent rather than null.

use std::io::{self, Write};

use serde::Serialize;

use crate::apply::ApplyReport;
use crate::error::{OutputErrorCode, RemapError};
use crate::extract::{ExtractFailure, ExtractStats, Extraction};
use crate::table::LoadReport;

/// Current schema version of the summary.
pub const SCHEMA_VERSION: &str = "1";

/// Error block of a failed run.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
}

impl ErrorInfo {
    pub fn from_error(err: &RemapError) -> Self {
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
        }
    }
}

/// Extraction section.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub worked: bool,
    #[serde(flatten)]
    pub stats: ExtractStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExtractFailure>,
}

impl From<&Extraction> for ExtractionSummary {
    fn from(extraction: &Extraction) -> Self {
        ExtractionSummary {
            worked: extraction.worked,
            stats: extraction.stats.clone(),
            failure: extraction.failure.clone(),
        }
    }
}

/// Mapping load section.
#[derive(Debug, Clone, Serialize)]
pub struct MappingSummary {
    pub entries: usize,
    pub skipped_lines: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl MappingSummary {
    pub fn new(entries: usize, report: &LoadReport) -> Self {
        MappingSummary {
            entries,
            skipped_lines: report.skipped(),
            errors: report.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Apply section.
#[derive(Debug, Clone, Serialize)]
pub struct ApplySummary {
    pub units_written: usize,
    pub units_unchanged: usize,
    pub units_copied: usize,
    pub units_failed: usize,
    pub substitutions: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl From<&ApplyReport> for ApplySummary {
    fn from(report: &ApplyReport) -> Self {
        ApplySummary {
            units_written: report.units_written(),
            units_unchanged: report.unchanged,
            units_copied: report.copied,
            units_failed: report.units_failed(),
            substitutions: report.log.len(),
            errors: report.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// The one JSON document a run prints.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// "ok" or "error".
    pub status: String,
    pub schema_version: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<MappingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply: Option<ApplySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_map: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl RunSummary {
    pub fn new(command: impl Into<String>) -> Self {
        RunSummary {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            command: command.into(),
            extraction: None,
            mapping: None,
            apply: None,
            range_map: None,
            rename_log: None,
            error: None,
        }
    }

    /// Mark the run failed with `err`. Sections gathered so far stay.
    pub fn fail(&mut self, err: &RemapError) {
        self.status = "error".to_string();
        self.error = Some(ErrorInfo::from_error(err));
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_first_and_absent_sections() {
        let summary = RunSummary::new("remap");
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.starts_with(r#"{"status":"ok""#));
        assert!(!json.contains("extraction"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn failed_summary_carries_code() {
        let mut summary = RunSummary::new("extract");
        summary.extraction = Some(ExtractionSummary {
            worked: false,
            stats: ExtractStats {
                units: 3,
                parse_failures: 2,
                ..ExtractStats::default()
            },
            failure: Some(ExtractFailure::ParseFailures {
                failed: 2,
                units: 3,
                max_ratio: 0.5,
            }),
        });
        summary.fail(&RemapError::invalid_args("x"));

        let value: serde_json::Value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], 2);
        assert_eq!(value["extraction"]["parse_failures"], 2);
        assert_eq!(value["extraction"]["failure"]["reason"], "parse_failures");
    }

    #[test]
    fn emit_is_pretty_json() {
        let mut buf = Vec::new();
        emit_response(&RunSummary::new("apply"), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\n  \"command\": \"apply\""));
    }
}

use std::io::Write;

use itertools::Itertools;
use serde::Serialize;

use crate::effort::ratio;
use crate::error::Result;
use crate::metrics::EditMetrics;
use crate::store::UserProgress;

/// Download formats offered at the end of a job.
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "post_editing_metrics.csv",
            ExportFormat::Json => "post_edited_segments.json",
        }
    }

    pub fn project_file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "project_metrics.csv",
            ExportFormat::Json => "project_metrics.json",
        }
    }
}

/// One entry of the JSON download.
#[derive(Debug, Serialize)]
struct SegmentExport<'a> {
    segment_id: usize,
    source: &'a str,
    original_translation: &'a str,
    post_edited: &'a str,
    edit_time_seconds: f64,
    insertions: usize,
    deletions: usize,
}

impl<'a> From<&'a EditMetrics> for SegmentExport<'a> {
    fn from(m: &'a EditMetrics) -> Self {
        Self {
            segment_id: m.segment_id,
            source: &m.source,
            original_translation: &m.original,
            post_edited: &m.edited,
            edit_time_seconds: (m.edit_time * 100.0).round() / 100.0,
            insertions: m.insertions,
            deletions: m.deletions,
        }
    }
}

/// Metrics table with a header row, one line per saved segment.
pub fn write_csv<W: Write>(writer: W, metrics: &[EditMetrics]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if metrics.is_empty() {
        wtr.write_record([
            "segment_id",
            "source",
            "original",
            "edited",
            "edit_time",
            "insertions",
            "deletions",
        ])?;
    }
    for m in metrics {
        wtr.serialize(m)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv(metrics: &[EditMetrics]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, metrics)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Pretty-printed segments; non-ASCII text is kept as is.
pub fn to_json(metrics: &[EditMetrics]) -> Result<String> {
    let records: Vec<SegmentExport<'_>> = metrics.iter().map(SegmentExport::from).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

pub fn export(format: ExportFormat, metrics: &[EditMetrics]) -> Result<String> {
    match format {
        ExportFormat::Csv => to_csv(metrics),
        ExportFormat::Json => to_json(metrics),
    }
}

/// One line of the project-wide table, derived rates included.
#[derive(Debug, Serialize)]
struct ProjectRow {
    user: String,
    segment_id: usize,
    edit_time: f64,
    insertions: usize,
    deletions: usize,
    total_edits: usize,
    /// Characters of machine output per second
    processing_speed: f64,
    /// Edits per character of machine output
    edit_rate: f64,
    hter: f64,
}

impl ProjectRow {
    fn new(user: &str, m: &EditMetrics) -> Self {
        let edits = m.total_edits() as f64;
        Self {
            user: user.to_string(),
            segment_id: m.segment_id,
            edit_time: m.edit_time,
            insertions: m.insertions,
            deletions: m.deletions,
            total_edits: m.total_edits(),
            processing_speed: ratio(m.original_char_count() as f64, m.edit_time),
            edit_rate: ratio(edits, m.original_char_count() as f64),
            hter: ratio(edits, m.original_word_count() as f64),
        }
    }
}

const PROJECT_HEADER: [&str; 9] = [
    "user",
    "segment_id",
    "edit_time",
    "insertions",
    "deletions",
    "total_edits",
    "processing_speed",
    "edit_rate",
    "hter",
];

fn project_rows(users: &[UserProgress]) -> Vec<ProjectRow> {
    users
        .iter()
        .flat_map(|user| {
            let name = user.display_name();
            user.metrics.iter().map(move |m| ProjectRow::new(&name, m))
        })
        .sorted_by(|a, b| a.user.cmp(&b.user).then(a.segment_id.cmp(&b.segment_id)))
        .collect()
}

/// Every user's saved segments in one table, ordered by user then segment.
pub fn export_project(format: ExportFormat, users: &[UserProgress]) -> Result<String> {
    let rows = project_rows(users);
    match format {
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(Vec::new());
            if rows.is_empty() {
                wtr.write_record(PROJECT_HEADER)?;
            }
            for row in &rows {
                wtr.serialize(row)?;
            }
            let buf = wtr.into_inner().map_err(|e| e.into_error())?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&rows)?),
    }
}

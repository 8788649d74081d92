use serde::{Deserialize, Serialize};

use crate::util::mean;

/// What was recorded when a translator saved a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditMetrics {
    pub segment_id: usize,
    pub source: String,
    pub original: String,
    pub edited: String,
    /// Active editing seconds at the moment of saving
    pub edit_time: f64,
    pub insertions: usize,
    pub deletions: usize,
}

impl EditMetrics {
    pub fn total_edits(&self) -> usize {
        self.insertions + self.deletions
    }

    pub fn original_word_count(&self) -> usize {
        self.original.split_whitespace().count()
    }

    pub fn original_char_count(&self) -> usize {
        self.original.chars().count()
    }
}

/// End-of-job figures shown to the translator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResultsSummary {
    pub total_segments: usize,
    pub total_time: f64,
    pub avg_time_per_segment: f64,
    pub total_insertions: usize,
    pub total_deletions: usize,
}

impl ResultsSummary {
    pub fn from_metrics(metrics: &[EditMetrics]) -> Self {
        let times: Vec<f64> = metrics.iter().map(|m| m.edit_time).collect();
        Self {
            total_segments: metrics.len(),
            total_time: times.iter().sum(),
            avg_time_per_segment: mean(&times).unwrap_or(0.0),
            total_insertions: metrics.iter().map(|m| m.insertions).sum(),
            total_deletions: metrics.iter().map(|m| m.deletions).sum(),
        }
    }

    pub fn total_edits(&self) -> usize {
        self.total_insertions + self.total_deletions
    }
}

#[cfg(test)]
pub(crate) fn sample(
    segment_id: usize,
    original: &str,
    edit_time: f64,
    ins: usize,
    del: usize,
) -> EditMetrics {
    EditMetrics {
        segment_id,
        source: format!("source {segment_id}"),
        original: original.to_string(),
        edited: format!("{original} (edited)"),
        edit_time,
        insertions: ins,
        deletions: del,
    }
}

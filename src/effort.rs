//! Post-editing effort figures for the manager's reports.

use itertools::Itertools;

use crate::metrics::EditMetrics;
use crate::store::UserProgress;
use crate::util::{mean, std_dev};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PostEditEffort {
    /// Word edits per word of machine output (HTER-like; lower is better)
    pub hter: f64,
    pub avg_edit_distance: f64,
    /// Seconds per word of machine output
    pub avg_time_per_word: f64,
    /// Words per hour
    pub throughput: f64,
}

impl PostEditEffort {
    pub fn from_metrics(metrics: &[EditMetrics]) -> Self {
        if metrics.is_empty() {
            return Self::default();
        }

        let total_edits: usize = metrics.iter().map(EditMetrics::total_edits).sum();
        let total_words: usize = metrics.iter().map(EditMetrics::original_word_count).sum();
        let total_time: f64 = metrics.iter().map(|m| m.edit_time).sum();
        let hours = total_time / 3600.0;

        Self {
            hter: ratio(total_edits as f64, total_words as f64),
            avg_edit_distance: total_edits as f64 / metrics.len() as f64,
            avg_time_per_word: ratio(total_time, total_words as f64),
            throughput: ratio(total_words as f64, hours),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemporalEffort {
    pub avg_time_per_segment: f64,
    /// Characters of machine output processed per second
    pub processing_speed: f64,
}

impl TemporalEffort {
    pub fn from_metrics(metrics: &[EditMetrics]) -> Self {
        if metrics.is_empty() {
            return Self::default();
        }

        let total_time: f64 = metrics.iter().map(|m| m.edit_time).sum();
        let total_chars: usize = metrics.iter().map(EditMetrics::original_char_count).sum();

        Self {
            avg_time_per_segment: total_time / metrics.len() as f64,
            processing_speed: ratio(total_chars as f64, total_time),
        }
    }
}

pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Per-translator row of the project overview.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub name: String,
    pub segments: usize,
    pub total_time: f64,
    pub avg_time: f64,
    pub total_edits: usize,
}

impl UserStats {
    /// `None` for users who have not saved any segment yet.
    pub fn from_progress(progress: &UserProgress) -> Option<Self> {
        let metrics = &progress.metrics;
        if metrics.is_empty() {
            return None;
        }
        let total_time: f64 = metrics.iter().map(|m| m.edit_time).sum();

        Some(Self {
            name: progress.display_name(),
            segments: metrics.len(),
            total_time,
            avg_time: total_time / metrics.len() as f64,
            total_edits: metrics.iter().map(EditMetrics::total_edits).sum(),
        })
    }
}

/// Rows for every user with saved work, ordered by name.
pub fn user_stats(users: &[UserProgress]) -> Vec<UserStats> {
    users
        .iter()
        .filter_map(UserStats::from_progress)
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect()
}

/// Every saved segment across all users.
pub fn all_metrics(users: &[UserProgress]) -> Vec<EditMetrics> {
    users
        .iter()
        .flat_map(|user| user.metrics.iter().cloned())
        .collect()
}

pub fn edit_distances(metrics: &[EditMetrics]) -> Vec<f64> {
    metrics.iter().map(|m| m.total_edits() as f64).collect()
}

/// Seconds per word for each segment; segments with empty output are skipped.
pub fn times_per_word(metrics: &[EditMetrics]) -> Vec<f64> {
    metrics
        .iter()
        .filter_map(|m| match m.original_word_count() {
            0 => None,
            words => Some(m.edit_time / words as f64),
        })
        .collect()
}

/// Shape of a distribution shown next to the histograms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Distribution {
    pub fn of(values: &[f64]) -> Option<Self> {
        let (min, max) = match values.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
            itertools::MinMaxResult::NoElements => return None,
            itertools::MinMaxResult::OneElement(v) => (v, v),
            itertools::MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        Some(Self {
            count: values.len(),
            mean: mean(values)?,
            std_dev: std_dev(values)?,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::epoch;
    use crate::metrics::sample;

    fn user(name: &str, metrics: Vec<EditMetrics>) -> UserProgress {
        UserProgress {
            user_name: name.to_string(),
            user_surname: "Test".to_string(),
            last_updated: epoch(),
            metrics,
            full_text: Vec::new(),
            time_tracker: None,
        }
    }

    #[test]
    fn test_post_edit_effort_empty() {
        assert_eq!(PostEditEffort::from_metrics(&[]), PostEditEffort::default());
        assert_eq!(TemporalEffort::from_metrics(&[]), TemporalEffort::default());
    }

    #[test]
    fn test_post_edit_effort_formulas() {
        // 4 + 6 = 10 words, 5 edits, 3600 s total
        let metrics = vec![
            sample(0, "one two three four", 1200.0, 1, 1),
            sample(1, "a b c d e f", 2400.0, 2, 1),
        ];
        let effort = PostEditEffort::from_metrics(&metrics);

        assert_eq!(effort.hter, 0.5);
        assert_eq!(effort.avg_edit_distance, 2.5);
        assert_eq!(effort.avg_time_per_word, 360.0);
        assert_eq!(effort.throughput, 10.0);
    }

    #[test]
    fn test_zero_time_and_words_do_not_divide() {
        let metrics = vec![sample(0, "", 0.0, 3, 0)];
        let effort = PostEditEffort::from_metrics(&metrics);
        assert_eq!(effort.hter, 0.0);
        assert_eq!(effort.avg_time_per_word, 0.0);
        assert_eq!(effort.throughput, 0.0);
        assert_eq!(effort.avg_edit_distance, 3.0);

        let temporal = TemporalEffort::from_metrics(&metrics);
        assert_eq!(temporal.processing_speed, 0.0);
    }

    #[test]
    fn test_temporal_effort() {
        let metrics = vec![sample(0, "abcde", 5.0, 0, 0), sample(1, "abcdefghij", 10.0, 0, 0)];
        let temporal = TemporalEffort::from_metrics(&metrics);
        assert_eq!(temporal.avg_time_per_segment, 7.5);
        assert_eq!(temporal.processing_speed, 1.0);
    }

    #[test]
    fn test_user_stats_skip_users_without_metrics() {
        let users = vec![
            user("Zoe", vec![sample(0, "x y", 10.0, 1, 0), sample(1, "z", 20.0, 0, 2)]),
            user("Idle", Vec::new()),
            user("Ann", vec![sample(0, "x", 4.0, 0, 0)]),
        ];
        let stats = user_stats(&users);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "Ann Test");
        assert_eq!(stats[1].segments, 2);
        assert_eq!(stats[1].total_time, 30.0);
        assert_eq!(stats[1].avg_time, 15.0);
        assert_eq!(stats[1].total_edits, 3);
        assert_eq!(all_metrics(&users).len(), 3);
    }

    #[test]
    fn test_distributions() {
        let metrics = vec![
            sample(0, "one two", 10.0, 1, 1),
            sample(1, "", 3.0, 4, 0),
            sample(2, "one two three four", 2.0, 0, 0),
        ];
        assert_eq!(edit_distances(&metrics), vec![2.0, 4.0, 0.0]);
        assert_eq!(times_per_word(&metrics), vec![5.0, 0.5]);

        let dist = Distribution::of(&edit_distances(&metrics)).unwrap();
        assert_eq!(dist.count, 3);
        assert_eq!(dist.mean, 2.0);
        assert_eq!(dist.min, 0.0);
        assert_eq!(dist.max, 4.0);
        assert!(Distribution::of(&[]).is_none());
    }
}

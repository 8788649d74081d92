use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::diff::count_edits;
use crate::metrics::{EditMetrics, ResultsSummary};
use crate::segments::{self, Segment, SegmentLoadError};
use crate::snapshot::SnapshotError;
use crate::store::UserProgress;
use crate::tracker::{IdleNotice, SegmentTimeTracker};

/// One translator's editing state: the loaded text, saved metrics and the
/// per-segment time tracker.
#[derive(Debug, Clone)]
pub struct EditorSession<C: Clock + Clone = SystemClock> {
    pub user_name: String,
    pub user_surname: String,
    pub segments: Vec<Segment>,
    pub current_segment: usize,
    pub active_segment: Option<usize>,
    pub edit_metrics: Vec<EditMetrics>,
    pub auto_save: bool,
    pub last_saved: Option<DateTime<Utc>>,
    // Text each segment showed when first opened in this session
    original_texts: HashMap<usize, String>,
    tracker: SegmentTimeTracker<C>,
}

impl<C: Clock + Clone> EditorSession<C> {
    pub fn new(clock: C) -> Self {
        Self {
            user_name: String::new(),
            user_surname: String::new(),
            segments: Vec::new(),
            current_segment: 0,
            active_segment: None,
            edit_metrics: Vec::new(),
            auto_save: true,
            last_saved: None,
            original_texts: HashMap::new(),
            tracker: SegmentTimeTracker::with_clock(clock),
        }
    }

    pub fn with_user(mut self, name: impl Into<String>, surname: impl Into<String>) -> Self {
        self.user_name = name.into();
        self.user_surname = surname.into();
        self
    }

    pub fn has_user(&self) -> bool {
        !self.user_name.is_empty() && !self.user_surname.is_empty()
    }

    pub fn tracker(&self) -> &SegmentTimeTracker<C> {
        &self.tracker
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.tracker.clock().now()
    }

    /// Load a job from two texts. Ignored once a job is loaded.
    pub fn load_segments(
        &mut self,
        source: &str,
        translation: &str,
    ) -> Result<bool, SegmentLoadError> {
        if !self.segments.is_empty() {
            return Ok(false);
        }
        self.segments = segments::load_segments(source, translation)?;
        debug!("loaded {} segment(s)", self.segments.len());
        Ok(true)
    }

    pub fn current(&self) -> Option<&Segment> {
        self.segments.get(self.current_segment)
    }

    /// Latest saved edit for `idx`, falling back to the machine translation.
    pub fn initial_text(&self, idx: usize) -> Option<String> {
        self.edit_metrics
            .iter()
            .rev()
            .find(|m| m.segment_id == idx)
            .map(|m| m.edited.clone())
            .or_else(|| self.segments.get(idx).map(|s| s.translation.clone()))
    }

    /// Make `idx` the segment being edited, moving the timer over to it.
    pub fn select_segment(&mut self, idx: usize) {
        if self.segments.is_empty() {
            return;
        }
        let idx = idx.min(self.segments.len() - 1);
        self.current_segment = idx;

        if !self.original_texts.contains_key(&idx) {
            if let Some(text) = self.initial_text(idx) {
                self.original_texts.insert(idx, text);
            }
        }

        if self.active_segment != Some(idx) {
            if let Some(previous) = self.active_segment {
                self.tracker.pause(previous);
            }
            self.tracker.start(idx);
            self.tracker.resume(idx);
            self.active_segment = Some(idx);
        }
    }

    /// Signal typing on the current segment.
    pub fn record_edit(&mut self) {
        if self.current().is_none() {
            return;
        }
        self.tracker.start(self.current_segment);
        self.tracker.record_activity(self.current_segment);
    }

    /// Run idle detection for the segment currently holding the timer.
    pub fn poll_idle(&mut self) -> Option<IdleNotice> {
        let active = self.active_segment?;
        self.tracker.check_idle(active)
    }

    pub fn editing_time(&self, idx: usize) -> f64 {
        self.tracker.get_editing_time(idx)
    }

    /// Store metrics for the current segment if `edited` differs from the
    /// text it was opened with. Re-saving a segment replaces its record.
    pub fn save_metrics(&mut self, edited: &str) -> Option<EditMetrics> {
        let idx = self.current_segment;
        let segment = self.segments.get(idx)?;
        let baseline = self
            .original_texts
            .get(&idx)
            .map(String::as_str)
            .unwrap_or(segment.translation.as_str());
        if edited == baseline {
            return None;
        }

        let (insertions, deletions) = count_edits(&segment.translation, edited);
        let metrics = EditMetrics {
            segment_id: idx,
            source: segment.source.clone(),
            original: segment.translation.clone(),
            edited: edited.to_string(),
            edit_time: self.tracker.get_editing_time(idx),
            insertions,
            deletions,
        };

        self.edit_metrics.retain(|m| m.segment_id != idx);
        self.edit_metrics.push(metrics.clone());
        debug!(
            "saved segment {idx}: {:.1}s, +{insertions}/-{deletions}",
            metrics.edit_time
        );
        Some(metrics)
    }

    fn leave_current(&mut self, edited: &str) -> Option<EditMetrics> {
        let saved = self.save_metrics(edited);
        self.tracker.pause(self.current_segment);
        saved
    }

    pub fn previous(&mut self, edited: &str) -> Option<EditMetrics> {
        if self.current_segment == 0 || self.current().is_none() {
            return None;
        }
        let saved = self.leave_current(edited);
        self.select_segment(self.current_segment - 1);
        saved
    }

    /// Save and move on; past the last segment the job is complete.
    pub fn next(&mut self, edited: &str) -> Option<EditMetrics> {
        self.current()?;
        let saved = self.leave_current(edited);
        self.current_segment += 1;
        if self.current_segment < self.segments.len() {
            self.select_segment(self.current_segment);
        }
        saved
    }

    pub fn finish(&mut self, edited: &str) -> Option<EditMetrics> {
        self.current()?;
        let saved = self.leave_current(edited);
        self.current_segment = self.segments.len();
        info!("editing job finished with {} saved segment(s)", self.edit_metrics.len());
        saved
    }

    pub fn is_complete(&self) -> bool {
        !self.segments.is_empty() && self.current_segment >= self.segments.len()
    }

    /// Fraction of segments passed, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }
        (self.current_segment as f64 / self.segments.len() as f64).min(1.0)
    }

    pub fn results(&self) -> ResultsSummary {
        ResultsSummary::from_metrics(&self.edit_metrics)
    }

    pub fn to_progress(&self) -> UserProgress {
        UserProgress {
            user_name: self.user_name.clone(),
            user_surname: self.user_surname.clone(),
            last_updated: self.now(),
            metrics: self.edit_metrics.clone(),
            full_text: self.segments.clone(),
            time_tracker: Some(self.tracker.to_snapshot()),
        }
    }

    /// Resume stored work. Returns `false` when there was nothing to resume.
    pub fn restore(&mut self, progress: UserProgress) -> Result<bool, SnapshotError> {
        if progress.metrics.is_empty() || progress.full_text.is_empty() {
            return Ok(false);
        }

        let clock = self.tracker.clock().clone();
        self.tracker = SegmentTimeTracker::from_snapshot(progress.time_tracker, clock)?;
        self.current_segment = progress
            .metrics
            .iter()
            .map(|m| m.segment_id)
            .max()
            .unwrap_or(0);
        self.edit_metrics = progress.metrics;
        self.segments = progress.full_text;
        self.original_texts.clear();
        self.active_segment = None;
        self.select_segment(self.current_segment);
        info!(
            "restored {} metric(s) for {} {}",
            self.edit_metrics.len(),
            self.user_name,
            self.user_surname
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const SOURCE: &str = "The cat sleeps.\nThe dog barks.\nBirds sing.";
    const MT: &str = "Il gatto dorme.\nIl cane abbaia.\nGli uccelli cantare.";

    fn session() -> (EditorSession<ManualClock>, ManualClock) {
        let clock = ManualClock::at_epoch();
        let mut session = EditorSession::new(clock.clone()).with_user("Ada", "Lovelace");
        session.load_segments(SOURCE, MT).unwrap();
        (session, clock)
    }

    #[test]
    fn test_load_segments_only_once() {
        let (mut session, _clock) = session();
        assert_eq!(session.segments.len(), 3);
        assert!(!session.load_segments("x", "y").unwrap());
        assert_eq!(session.segments.len(), 3);
    }

    #[test]
    fn test_select_moves_timer() {
        let (mut session, clock) = session();
        session.select_segment(0);
        clock.advance_secs(5.0);
        session.select_segment(1);

        assert!(session.tracker().is_paused(0));
        assert!(!session.tracker().is_paused(1));
        assert_eq!(session.active_segment, Some(1));
        assert_eq!(session.editing_time(0), 5.0);
    }

    #[test]
    fn test_select_clamps_index() {
        let (mut session, _clock) = session();
        session.select_segment(99);
        assert_eq!(session.current_segment, 2);
    }

    #[test]
    fn test_unchanged_text_is_not_saved() {
        let (mut session, _clock) = session();
        session.select_segment(0);
        assert_eq!(session.save_metrics("Il gatto dorme."), None);
        assert!(session.edit_metrics.is_empty());
    }

    #[test]
    fn test_next_saves_metrics_and_pauses() {
        let (mut session, clock) = session();
        session.select_segment(0);
        clock.advance_secs(8.0);
        session.record_edit();
        clock.advance_secs(2.0);

        let saved = session.next("Il gatto sta dormendo.").unwrap();
        assert_eq!(saved.segment_id, 0);
        assert_eq!(saved.edit_time, 10.0);
        assert_eq!((saved.insertions, saved.deletions), (2, 1));
        assert_eq!(saved.source, "The cat sleeps.");
        assert_eq!(saved.original, "Il gatto dorme.");

        assert_eq!(session.current_segment, 1);
        assert!(session.tracker().is_paused(0));
        assert_eq!(session.active_segment, Some(1));
    }

    #[test]
    fn test_resaving_replaces_metrics() {
        let (mut session, clock) = session();
        session.select_segment(0);
        clock.advance_secs(3.0);
        session.next("Il gatto dorme bene.");
        clock.advance_secs(3.0);
        session.previous("Il cane abbaia.");
        assert_eq!(session.current_segment, 0);
        assert_eq!(session.initial_text(0).as_deref(), Some("Il gatto dorme bene."));

        clock.advance_secs(4.0);
        session.next("Il gatto dorme molto bene.");

        assert_eq!(session.edit_metrics.len(), 1);
        assert_eq!(session.edit_metrics[0].edited, "Il gatto dorme molto bene.");
        assert_eq!(session.edit_metrics[0].edit_time, 7.0);
    }

    #[test]
    fn test_previous_on_first_segment_is_noop() {
        let (mut session, _clock) = session();
        session.select_segment(0);
        assert_eq!(session.previous("changed"), None);
        assert_eq!(session.current_segment, 0);
        assert!(!session.tracker().is_paused(0));
    }

    #[test]
    fn test_finish_completes_job() {
        let (mut session, clock) = session();
        session.select_segment(2);
        clock.advance_secs(12.0);
        session.finish("Gli uccelli cantano.");

        assert!(session.is_complete());
        assert_eq!(session.progress(), 1.0);
        let results = session.results();
        assert_eq!(results.total_segments, 1);
        assert_eq!(results.total_time, 12.0);
        assert_eq!(results.total_edits(), 2);
        assert_eq!(session.next("anything"), None);
    }

    #[test]
    fn test_poll_idle_uses_active_segment() {
        let (mut session, clock) = session();
        assert_eq!(session.poll_idle(), None);

        session.select_segment(1);
        clock.advance_secs(95.0);
        let notice = session.poll_idle().unwrap();
        assert_eq!(notice.segment_id, 1);
        assert_eq!(notice.additional_secs, 65.0);
    }

    #[test]
    fn test_restore_jumps_to_last_edited_segment() {
        let (mut session, clock) = session();
        session.select_segment(0);
        clock.advance_secs(6.0);
        session.next("Il gatto riposa.");
        clock.advance_secs(4.0);
        session.next("Il cane latra.");
        let progress = session.to_progress();

        let mut reloaded = EditorSession::new(clock.clone()).with_user("Ada", "Lovelace");
        assert!(reloaded.restore(progress).unwrap());

        assert_eq!(reloaded.current_segment, 1);
        assert_eq!(reloaded.active_segment, Some(1));
        assert_eq!(reloaded.edit_metrics.len(), 2);
        assert_eq!(reloaded.segments.len(), 3);
        assert_eq!(reloaded.editing_time(0), 6.0);
        assert_eq!(reloaded.initial_text(1).as_deref(), Some("Il cane latra."));
    }

    #[test]
    fn test_restore_without_metrics_changes_nothing() {
        let (mut session, clock) = session();
        let empty = EditorSession::new(clock).with_user("Ada", "Lovelace").to_progress();
        assert!(!session.restore(empty).unwrap());
        assert_eq!(session.segments.len(), 3);
    }
}

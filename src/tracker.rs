//! Per-segment editing time accounting.
//!
//! The tracker is driven entirely by caller events: it never decides on its
//! own when a segment becomes active or inactive. Idle gaps are only folded
//! into the accumulators when `record_activity`, `pause` or `check_idle` run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, info, trace};

use crate::clock::{secs_between, Clock, SystemClock};

/// Gaps between activity longer than this are idle rather than active.
pub const IDLE_THRESHOLD_SECS: f64 = 30.0;

/// `check_idle` only surfaces newly discovered idle of at least this size.
pub const IDLE_NOTICE_MIN_SECS: f64 = 60.0;

/// Timing record for a single segment.
#[derive(Debug, Clone, PartialEq)]
pub struct EditingSession {
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) pause_time: Option<DateTime<Utc>>,
    pub(crate) total_paused_time: f64,
    pub(crate) is_paused: bool,
    pub(crate) last_activity: DateTime<Utc>,
    pub(crate) active_time: f64,
    pub(crate) idle_time: f64,
}

impl EditingSession {
    fn started_at(now: DateTime<Utc>) -> Self {
        Self {
            start_time: now,
            pause_time: None,
            total_paused_time: 0.0,
            is_paused: false,
            last_activity: now,
            active_time: 0.0,
            idle_time: 0.0,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn pause_time(&self) -> Option<DateTime<Utc>> {
        self.pause_time
    }

    /// Seconds spent paused across all pause/resume cycles.
    pub fn total_paused_time(&self) -> f64 {
        self.total_paused_time
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Seconds credited as genuine work so far.
    pub fn active_time(&self) -> f64 {
        self.active_time
    }

    /// Seconds of idle beyond the threshold recorded so far.
    pub fn idle_time(&self) -> f64 {
        self.idle_time
    }
}

/// Informational event raised by `check_idle` for a sizeable idle stretch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleNotice {
    pub segment_id: usize,
    pub additional_secs: f64,
}

/// Owns one `EditingSession` per segment that has ever been started.
#[derive(Debug, Clone)]
pub struct SegmentTimeTracker<C: Clock = SystemClock> {
    pub(crate) sessions: BTreeMap<usize, EditingSession>,
    pub(crate) clock: C,
}

impl SegmentTimeTracker<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for SegmentTimeTracker<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SegmentTimeTracker<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            sessions: BTreeMap::new(),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Begin tracking `segment_id`. Existing sessions are left untouched.
    pub fn start(&mut self, segment_id: usize) {
        if self.sessions.contains_key(&segment_id) {
            trace!("segment {segment_id} already tracked, start ignored");
            return;
        }
        let now = self.clock.now();
        self.sessions
            .insert(segment_id, EditingSession::started_at(now));
        debug!("started tracking segment {segment_id}");
    }

    pub fn pause(&mut self, segment_id: usize) {
        let now = self.clock.now();
        let Some(session) = self.sessions.get_mut(&segment_id) else {
            trace!("pause on untracked segment {segment_id} ignored");
            return;
        };
        if session.is_paused {
            trace!("segment {segment_id} already paused");
            return;
        }

        let elapsed = secs_between(session.last_activity, now);
        if elapsed <= IDLE_THRESHOLD_SECS {
            session.active_time += elapsed;
        }
        session.pause_time = Some(now);
        session.is_paused = true;
        session.last_activity = now;
        debug!(
            "paused segment {segment_id} with {:.1}s active",
            session.active_time
        );
    }

    pub fn resume(&mut self, segment_id: usize) {
        let now = self.clock.now();
        let Some(session) = self.sessions.get_mut(&segment_id) else {
            trace!("resume on untracked segment {segment_id} ignored");
            return;
        };
        if !session.is_paused {
            trace!("segment {segment_id} is not paused");
            return;
        }
        let Some(paused_at) = session.pause_time else {
            trace!("segment {segment_id} paused without a pause time, resume ignored");
            return;
        };

        let paused_for = secs_between(paused_at, now);
        session.total_paused_time += paused_for;
        session.is_paused = false;
        session.pause_time = None;
        session.last_activity = now;
        debug!("resumed segment {segment_id} after {paused_for:.1}s paused");
    }

    /// Signal that the user is working on `segment_id` right now.
    pub fn record_activity(&mut self, segment_id: usize) {
        let now = self.clock.now();
        let Some(session) = self.sessions.get_mut(&segment_id) else {
            trace!("activity on untracked segment {segment_id} ignored");
            return;
        };
        if session.is_paused {
            trace!("activity on paused segment {segment_id} ignored");
            return;
        }

        let elapsed = secs_between(session.last_activity, now);
        if elapsed > IDLE_THRESHOLD_SECS {
            session.idle_time += elapsed - IDLE_THRESHOLD_SECS;
        } else {
            session.active_time += elapsed;
        }
        session.last_activity = now;
    }

    /// Active editing seconds for `segment_id`, including a still-open
    /// interval that has not yet crossed the idle threshold.
    pub fn get_editing_time(&self, segment_id: usize) -> f64 {
        let Some(session) = self.sessions.get(&segment_id) else {
            return 0.0;
        };
        if session.is_paused {
            return session.active_time;
        }

        let elapsed = secs_between(session.last_activity, self.clock.now());
        if elapsed <= IDLE_THRESHOLD_SECS {
            session.active_time + elapsed
        } else {
            session.active_time
        }
    }

    /// Advance idle accounting without touching `last_activity`.
    ///
    /// Returns a notice when at least a minute of new idle was discovered.
    pub fn check_idle(&mut self, segment_id: usize) -> Option<IdleNotice> {
        let now = self.clock.now();
        let session = self.sessions.get_mut(&segment_id)?;
        if session.is_paused {
            return None;
        }

        let elapsed = secs_between(session.last_activity, now);
        if elapsed <= IDLE_THRESHOLD_SECS {
            return None;
        }

        let new_idle = elapsed - IDLE_THRESHOLD_SECS;
        if new_idle <= session.idle_time {
            return None;
        }
        let additional = new_idle - session.idle_time;
        session.idle_time = new_idle;

        if additional >= IDLE_NOTICE_MIN_SECS {
            info!("segment {segment_id} idle for {additional:.0} more seconds");
            Some(IdleNotice {
                segment_id,
                additional_secs: additional,
            })
        } else {
            None
        }
    }

    pub fn session(&self, segment_id: usize) -> Option<&EditingSession> {
        self.sessions.get(&segment_id)
    }

    pub fn contains(&self, segment_id: usize) -> bool {
        self.sessions.contains_key(&segment_id)
    }

    pub fn is_paused(&self, segment_id: usize) -> bool {
        self.sessions
            .get(&segment_id)
            .is_some_and(|session| session.is_paused)
    }

    /// Tracked segment ids in ascending order.
    pub fn segment_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.sessions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

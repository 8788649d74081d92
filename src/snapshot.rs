//! Persistence boundary of the time tracker.
//!
//! On disk a tracker is a single object with one key, `sessions`, mapping the
//! segment id (as a string) to the seven session fields. Records written before
//! `last_activity`, `active_time` and `idle_time` existed are still accepted.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::clock::Clock;
use crate::tracker::{EditingSession, SegmentTimeTracker};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed tracker snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("segment key {0:?} is not a non-negative integer")]
    InvalidSegmentId(String),

    #[error("segment {segment_id}: {field} must be finite and non-negative, got {value}")]
    InvalidDuration {
        segment_id: usize,
        field: &'static str,
        value: f64,
    },

    #[error("segment {0}: marked paused but has no pause_time")]
    MissingPauseTime(usize),

    #[error("segment {0}: has a pause_time but is not paused")]
    UnexpectedPauseTime(usize),
}

/// Serializable image of a whole tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionRecord>,
}

impl TrackerSnapshot {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// One stored `EditingSession`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(deserialize_with = "instant")]
    pub start_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "optional_instant")]
    pub pause_time: Option<DateTime<Utc>>,
    pub total_paused_time: f64,
    pub is_paused: bool,
    // Second schema revision; absent from older records.
    #[serde(default, deserialize_with = "optional_instant")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active_time: Option<f64>,
    #[serde(default)]
    pub idle_time: Option<f64>,
}

impl From<&EditingSession> for SessionRecord {
    fn from(session: &EditingSession) -> Self {
        Self {
            start_time: session.start_time,
            pause_time: session.pause_time,
            total_paused_time: session.total_paused_time,
            is_paused: session.is_paused,
            last_activity: Some(session.last_activity),
            active_time: Some(session.active_time),
            idle_time: Some(session.idle_time),
        }
    }
}

impl SessionRecord {
    fn into_session(
        self,
        segment_id: usize,
        now: DateTime<Utc>,
    ) -> Result<EditingSession, SnapshotError> {
        let total_paused_time =
            checked_duration(segment_id, "total_paused_time", self.total_paused_time)?;
        let active_time =
            checked_duration(segment_id, "active_time", self.active_time.unwrap_or(0.0))?;
        let idle_time = checked_duration(segment_id, "idle_time", self.idle_time.unwrap_or(0.0))?;

        match (self.is_paused, self.pause_time) {
            (true, None) => return Err(SnapshotError::MissingPauseTime(segment_id)),
            (false, Some(_)) => return Err(SnapshotError::UnexpectedPauseTime(segment_id)),
            _ => {}
        }

        Ok(EditingSession {
            start_time: self.start_time,
            pause_time: self.pause_time,
            total_paused_time,
            is_paused: self.is_paused,
            last_activity: self.last_activity.unwrap_or(now),
            active_time,
            idle_time,
        })
    }
}

fn checked_duration(
    segment_id: usize,
    field: &'static str,
    value: f64,
) -> Result<f64, SnapshotError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SnapshotError::InvalidDuration {
            segment_id,
            field,
            value,
        })
    }
}

/// RFC 3339 timestamps, plus offset-less ones from early records taken as UTC.
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
}

fn optional_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_instant(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}"))),
        None => Ok(None),
    }
}

impl<C: Clock> SegmentTimeTracker<C> {
    pub fn to_snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            sessions: self
                .sessions
                .iter()
                .map(|(id, session)| (id.to_string(), SessionRecord::from(session)))
                .collect(),
        }
    }

    /// Rebuild a tracker from stored state; `None` yields an empty tracker.
    pub fn from_snapshot(
        snapshot: Option<TrackerSnapshot>,
        clock: C,
    ) -> Result<Self, SnapshotError> {
        let mut tracker = Self::with_clock(clock);
        let Some(snapshot) = snapshot else {
            return Ok(tracker);
        };

        let now = tracker.clock.now();
        for (key, record) in snapshot.sessions {
            // Only the canonical decimal form, so "01" and "1" cannot collide.
            let segment_id = key
                .parse::<usize>()
                .ok()
                .filter(|id| id.to_string() == key)
                .ok_or_else(|| SnapshotError::InvalidSegmentId(key.clone()))?;
            let session = record.into_session(segment_id, now)?;
            tracker.sessions.insert(segment_id, session);
        }
        debug!("restored tracker with {} segment(s)", tracker.sessions.len());
        Ok(tracker)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(&self.to_snapshot())?)
    }

    /// Accepts the JSON form of a snapshot, including `null`.
    pub fn from_json(raw: &str, clock: C) -> Result<Self, SnapshotError> {
        let snapshot: Option<TrackerSnapshot> = serde_json::from_str(raw)?;
        Self::from_snapshot(snapshot, clock)
    }

    pub fn from_value(value: serde_json::Value, clock: C) -> Result<Self, SnapshotError> {
        let snapshot: Option<TrackerSnapshot> = serde_json::from_value(value)?;
        Self::from_snapshot(snapshot, clock)
    }
}

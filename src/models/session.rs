use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geometry::ScrollDirection;
use crate::stop::StopReason;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TerminationReason {
    MaxIterations,
    StopCondition(StopReason),
    Timeout,
    ScrollFailure,
    ContentStalled,
    InitialPositionFailed,
    Cancelled,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::MaxIterations => "max_iterations",
            TerminationReason::StopCondition(reason) => reason.as_str(),
            TerminationReason::Timeout => "timeout",
            TerminationReason::ScrollFailure => "scroll_failure",
            TerminationReason::ContentStalled => "content_stalled",
            TerminationReason::InitialPositionFailed => "initial_position_failed",
            TerminationReason::Cancelled => "cancelled",
        }
    }
}

/// Run-scoped aggregate, owned and mutated by the loop's task only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollSession {
    pub id: String,
    pub direction: ScrollDirection,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub termination: Option<TerminationReason>,
    pub total_iterations: u64,
    pub total_messages: u64,
    /// Length of the current run of iterations whose capture matched the
    /// previous one.
    pub consecutive_no_change: u32,
}

impl ScrollSession {
    pub fn begin(direction: ScrollDirection, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            direction,
            status: SessionStatus::Running,
            started_at,
            ended_at: None,
            termination: None,
            total_iterations: 0,
            total_messages: 0,
            consecutive_no_change: 0,
        }
    }

    pub fn record_iteration(&mut self, message_count: usize) {
        self.total_iterations += 1;
        self.total_messages += message_count as u64;
    }

    /// Close the session. The first reason recorded wins.
    pub fn finish(&mut self, reason: TerminationReason, ended_at: DateTime<Utc>) {
        if self.ended_at.is_some() {
            return;
        }
        self.status = match reason {
            TerminationReason::InitialPositionFailed => SessionStatus::Failed,
            _ => SessionStatus::Completed,
        };
        self.termination = Some(reason);
        self.ended_at = Some(ended_at);
    }

    pub fn statistics(&self) -> ScrollStatistics {
        ScrollStatistics::from_session(self, Utc::now())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrollStatistics {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub iterations: u64,
    pub total_messages: u64,
    pub avg_messages_per_iteration: f64,
    pub iterations_per_minute: f64,
}

impl ScrollStatistics {
    /// `now` stands in for the end time of a session that is still running.
    pub fn from_session(session: &ScrollSession, now: DateTime<Utc>) -> Self {
        let ended_at = session.ended_at.unwrap_or(now);
        let duration_secs = ((ended_at - session.started_at).num_milliseconds() as f64 / 1000.0)
            .max(0.0);
        let iterations = session.total_iterations;

        let avg_messages_per_iteration = if iterations > 0 {
            session.total_messages as f64 / iterations as f64
        } else {
            0.0
        };
        let iterations_per_minute = if duration_secs > 0.0 {
            iterations as f64 / (duration_secs / 60.0)
        } else {
            0.0
        };

        Self {
            started_at: session.started_at,
            ended_at,
            duration_secs,
            iterations,
            total_messages: session.total_messages,
            avg_messages_per_iteration,
            iterations_per_minute,
        }
    }
}

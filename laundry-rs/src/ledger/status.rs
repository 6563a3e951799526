//! Laundry request status lifecycle
//!
//! Requests move through a closed set of states:
//!
//! ```text
//! submitted ──> processing ──> completed
//!     │             │
//!     └──────┬──────┘
//!            v
//!        cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. There is no path from
//! `submitted` straight to `completed` and no way out of a terminal
//! state. Cancelling a request refunds its clothes to the student's
//! quota; completing one consumes them for good.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a laundry request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Parse a status from its wire representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Get the wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// All statuses, in lifecycle order
    pub fn all() -> [Self; 4] {
        [
            Self::Submitted,
            Self::Processing,
            Self::Completed,
            Self::Cancelled,
        ]
    }

    /// Whether no further transitions are allowed out of this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The transition table
    ///
    /// Every pair not listed here is rejected, including self
    /// transitions and anything out of a terminal state.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Submitted, Self::Processing)
                | (Self::Submitted, Self::Cancelled)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing priority of a laundry request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Parse a priority from its wire representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    /// Get the wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use JobStatus::*;

        assert!(Submitted.can_transition_to(Processing));
        assert!(Submitted.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Cancelled));
    }

    #[test]
    fn test_submitted_cannot_skip_to_completed() {
        assert!(!JobStatus::Submitted.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_no_self_transitions() {
        for status in JobStatus::all() {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [JobStatus::Completed, JobStatus::Cancelled] {
            assert!(from.is_terminal());
            for to in JobStatus::all() {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_exactly_four_legal_transitions() {
        let mut legal = 0;
        for from in JobStatus::all() {
            for to in JobStatus::all() {
                if from.can_transition_to(to) {
                    legal += 1;
                }
            }
        }
        assert_eq!(legal, 4);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(JobStatus::from_str("submitted"), Some(JobStatus::Submitted));
        assert_eq!(JobStatus::from_str("PROCESSING"), Some(JobStatus::Processing));
        assert_eq!(JobStatus::from_str("completed"), Some(JobStatus::Completed));
        assert_eq!(JobStatus::from_str("cancelled"), Some(JobStatus::Cancelled));
        assert_eq!(JobStatus::from_str("pending"), None);
        assert_eq!(JobStatus::from_str(""), None);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in JobStatus::all() {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!(Priority::from_str("low"), Some(Priority::Low));
        assert_eq!(Priority::from_str("urgent"), Some(Priority::Urgent));
        assert_eq!(Priority::from_str("asap"), None);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}

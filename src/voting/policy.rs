use chrono::{DateTime, Utc};

use crate::config::Coverage;
use crate::model::day_off_request::{DayOffRequest, Tally, VoteResult};

/// Decides when voting ends and what the outcome is.
///
/// Pure: depends only on the record, the supplied `now` and the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosurePolicy {
    threshold: u32,
}

impl ClosurePolicy {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn threshold_met(&self, record: &DayOffRequest) -> bool {
        record.tally().yes >= self.threshold
    }

    pub fn deadline_passed(&self, record: &DayOffRequest, now: DateTime<Utc>) -> bool {
        now >= record.deadline
    }

    pub fn should_close(&self, record: &DayOffRequest, now: DateTime<Utc>) -> bool {
        self.deadline_passed(record, now) || self.threshold_met(record)
    }

    /// The threshold is the only approval criterion; a request that runs out
    /// of time short of it is rejected.
    pub fn decide(&self, tally: Tally) -> VoteResult {
        if tally.yes >= self.threshold {
            VoteResult::Approved
        } else {
            VoteResult::Rejected
        }
    }
}

impl Coverage {
    /// Whether an approved `record` exempts `participant_id`.
    pub fn covers(&self, record: &DayOffRequest, participant_id: &str) -> bool {
        match self {
            Coverage::Everyone => true,
            Coverage::Requester => record.requested_by == participant_id,
            Coverage::YesVoters => {
                record.requested_by == participant_id || record.voted_yes(participant_id)
            }
        }
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

use crate::error::DayOffError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum VoteChoice {
    #[strum(serialize = "yes", serialize = "y")]
    Yes,
    #[strum(serialize = "no", serialize = "n")]
    No,
}

impl VoteChoice {
    /// Parses user input (`yes`/`no`, `y`/`n`, any case).
    pub fn parse(raw: &str) -> Result<Self, DayOffError> {
        raw.trim()
            .parse()
            .map_err(|_| DayOffError::InvalidInput("vote must be yes/no".to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::Yes => "yes",
            VoteChoice::No => "no",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VoteResult {
    #[default]
    Unresolved,
    Approved,
    Rejected,
}

/// Outcome of an upsert into the vote map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    /// First vote from this participant.
    Recorded,
    /// The participant already had a vote; it was overwritten.
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RetractOutcome {
    Retracted,
    NotVoted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Tally {
    #[schema(example = 3)]
    pub yes: u32,
    #[schema(example = 1)]
    pub no: u32,
}

/// Fields supplied when a request is created; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewDayOffRequest {
    pub requested_by: String,
    pub target_date: NaiveDate,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Votes recorded together with the request.
    pub votes: BTreeMap<String, VoteChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "requested_by": "1458306967016701974",
    "target_date": "2026-01-01",
    "reason": "Family trip",
    "votes": { "1458306967016701975": "yes" },
    "created_at": "2026-01-01T00:00:00Z",
    "deadline": "2026-01-01T12:00:00Z",
    "closed": false,
    "result": "unresolved",
    "announced": false,
    "message_id": null,
    "version": 2
}))]
pub struct DayOffRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "1458306967016701974")]
    pub requested_by: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub target_date: NaiveDate,
    #[schema(nullable = true)]
    pub reason: Option<String>,
    /// participant id -> choice, one entry per voter
    pub votes: BTreeMap<String, VoteChoice>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2026-01-01T12:00:00Z", format = "date-time", value_type = String)]
    pub deadline: DateTime<Utc>,
    pub closed: bool,
    pub result: VoteResult,
    pub announced: bool,
    #[schema(nullable = true)]
    pub message_id: Option<String>,
    #[schema(example = 2)]
    pub version: u32,
}

impl DayOffRequest {
    pub fn from_new(id: u64, new: NewDayOffRequest) -> Self {
        Self {
            id,
            requested_by: new.requested_by,
            target_date: new.target_date,
            reason: new.reason,
            votes: new.votes,
            created_at: new.created_at,
            deadline: new.deadline,
            closed: false,
            result: VoteResult::Unresolved,
            announced: false,
            message_id: None,
            version: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    pub fn tally(&self) -> Tally {
        self.votes.values().fold(Tally::default(), |mut t, v| {
            match v {
                VoteChoice::Yes => t.yes += 1,
                VoteChoice::No => t.no += 1,
            }
            t
        })
    }

    /// Last vote wins; a participant never appears twice.
    pub fn upsert_vote(&mut self, voter_id: &str, choice: VoteChoice) -> VoteOutcome {
        match self.votes.insert(voter_id.to_string(), choice) {
            Some(_) => VoteOutcome::Changed,
            None => VoteOutcome::Recorded,
        }
    }

    pub fn remove_vote(&mut self, voter_id: &str) -> RetractOutcome {
        match self.votes.remove(voter_id) {
            Some(_) => RetractOutcome::Retracted,
            None => RetractOutcome::NotVoted,
        }
    }

    pub fn voted_yes(&self, participant_id: &str) -> bool {
        self.votes.get(participant_id) == Some(&VoteChoice::Yes)
    }

    /// Human-facing lifecycle label: `open`, `approved` or `rejected`.
    pub fn state_label(&self) -> &'static str {
        match (self.closed, self.result) {
            (false, _) | (true, VoteResult::Unresolved) => "open",
            (true, VoteResult::Approved) => "approved",
            (true, VoteResult::Rejected) => "rejected",
        }
    }

    /// Normalizes a row whose columns were only partially written.
    ///
    /// `closed` and `result` are written first and `announced` last, so a
    /// resolved result always means the request is closed, and an
    /// `announced` flag without closure is dropped so the record is
    /// re-evaluated instead of being skipped.
    pub fn repair(mut self) -> Self {
        if self.result != VoteResult::Unresolved {
            self.closed = true;
        }
        if self.announced && !self.closed {
            self.announced = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> DayOffRequest {
        let now = Utc::now();
        DayOffRequest::from_new(
            1,
            NewDayOffRequest {
                requested_by: "alice".into(),
                target_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                reason: None,
                created_at: now,
                deadline: now + Duration::hours(12),
                votes: Default::default(),
            },
        )
    }

    #[test]
    fn distinct_voters_each_get_one_entry() {
        let mut req = sample();
        for voter in ["bob", "carol", "dave", "erin"] {
            assert_eq!(req.upsert_vote(voter, VoteChoice::Yes), VoteOutcome::Recorded);
        }
        assert_eq!(req.votes.len(), 4);
    }

    #[test]
    fn revote_overwrites_without_growing() {
        let mut req = sample();
        req.upsert_vote("bob", VoteChoice::Yes);
        assert_eq!(req.upsert_vote("bob", VoteChoice::No), VoteOutcome::Changed);
        assert_eq!(req.votes.len(), 1);
        assert_eq!(req.tally(), Tally { yes: 0, no: 1 });
    }

    #[test]
    fn remove_vote_reports_missing_voter() {
        let mut req = sample();
        req.upsert_vote("bob", VoteChoice::Yes);
        assert_eq!(req.remove_vote("carol"), RetractOutcome::NotVoted);
        assert_eq!(req.remove_vote("bob"), RetractOutcome::Retracted);
        assert!(req.votes.is_empty());
    }

    #[test]
    fn parse_vote_choice_accepts_short_forms() {
        assert_eq!(VoteChoice::parse(" YES ").unwrap(), VoteChoice::Yes);
        assert_eq!(VoteChoice::parse("n").unwrap(), VoteChoice::No);
        assert!(matches!(
            VoteChoice::parse("maybe"),
            Err(DayOffError::InvalidInput(_))
        ));
    }

    #[test]
    fn result_column_round_trips_through_strum() {
        assert_eq!(VoteResult::Approved.as_ref(), "approved");
        assert_eq!("rejected".parse::<VoteResult>().unwrap(), VoteResult::Rejected);
    }

    #[test]
    fn repair_closes_rows_with_a_result() {
        let mut req = sample();
        req.result = VoteResult::Approved;
        let req = req.repair();
        assert!(req.closed);
        assert_eq!(req.state_label(), "approved");
    }

    #[test]
    fn repair_drops_announced_without_closure() {
        let mut req = sample();
        req.announced = true;
        let req = req.repair();
        assert!(!req.announced);
        assert!(req.is_open());
    }
}

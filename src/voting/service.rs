use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::announce::{Announcer, render};
use super::policy::ClosurePolicy;
use crate::config::{Config, Coverage, MAX_DEADLINE_HOURS};
use crate::error::DayOffError;
use crate::model::daily_log::DailyLogEntry;
use crate::model::day_off_request::{
    DayOffRequest, NewDayOffRequest, RetractOutcome, Tally, VoteChoice, VoteOutcome, VoteResult,
};
use crate::store::{LogBook, VoteStore};
use crate::utils::approved_cache::ApprovedDayOffCache;

const MAX_REASON_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VoteReceipt {
    #[schema(example = 1)]
    pub request_id: u64,
    pub outcome: VoteOutcome,
    pub tally: Tally,
    /// true when this vote tipped the request over the threshold
    pub closed: bool,
    pub result: VoteResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    StillOpen,
    Announced(VoteResult),
    /// Closed and persisted, delivery failed; the sweeper retries it.
    AnnouncementPending(VoteResult),
    AlreadyAnnounced(VoteResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VoteStatus {
    pub request: DayOffRequest,
    pub tally: Tally,
    #[schema(example = 3)]
    pub threshold: u32,
    #[schema(example = "open")]
    pub state: String,
    /// Deadline passed or threshold met, waiting for the sweeper.
    pub closing_due: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReactionOutcome {
    Ignored,
    Voted { receipt: VoteReceipt },
    Retracted { outcome: RetractOutcome },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LogOutcome {
    /// An approved day-off covers the date; nothing was written.
    Exempt,
    Logged { entry: DailyLogEntry },
}

/// Maps a chat reaction onto a vote.
pub fn reaction_choice(emoji: &str) -> Option<VoteChoice> {
    match emoji.trim() {
        "✅" | "☑️" | "👍" => Some(VoteChoice::Yes),
        "❌" | "✖️" | "👎" => Some(VoteChoice::No),
        _ => None,
    }
}

/// Owns the day-off vote lifecycle: open → closed → announced.
///
/// Every mutation runs under one write gate and re-reads the record inside
/// it, so vote registration and the sweeper never interleave on a record.
pub struct DayOffService {
    store: Arc<dyn VoteStore>,
    log_book: Arc<dyn LogBook>,
    announcer: Arc<dyn Announcer>,
    policy: ClosurePolicy,
    deadline_span: Duration,
    coverage: Coverage,
    requester_votes_yes: bool,
    broadcast_mention: String,
    approved: ApprovedDayOffCache,
    write_gate: Mutex<()>,
}

impl DayOffService {
    pub fn new(
        store: Arc<dyn VoteStore>,
        log_book: Arc<dyn LogBook>,
        announcer: Arc<dyn Announcer>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            log_book,
            announcer,
            policy: ClosurePolicy::new(config.yes_threshold),
            deadline_span: Duration::hours(config.deadline_hours.clamp(1, MAX_DEADLINE_HOURS)),
            coverage: config.coverage,
            requester_votes_yes: config.requester_votes_yes,
            broadcast_mention: config.broadcast_mention.clone(),
            approved: ApprovedDayOffCache::default(),
            write_gate: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> ClosurePolicy {
        self.policy
    }

    #[instrument(skip(self, reason, now))]
    pub async fn create_request(
        &self,
        requested_by: &str,
        target_date: NaiveDate,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DayOffRequest, DayOffError> {
        if requested_by.trim().is_empty() {
            return Err(DayOffError::InvalidInput("requester is required".to_string()));
        }
        if target_date < now.date_naive() {
            return Err(DayOffError::InvalidInput(format!(
                "target date {} is in the past",
                target_date
            )));
        }
        let reason = reason
            .map(|r| r.trim().chars().take(MAX_REASON_LEN).collect::<String>())
            .filter(|r| !r.is_empty());
        let deadline = now
            .checked_add_signed(self.deadline_span)
            .ok_or_else(|| DayOffError::InvalidInput("deadline out of range".to_string()))?;

        let requested_by = requested_by.trim().to_string();
        let mut votes = BTreeMap::new();
        if self.requester_votes_yes {
            votes.insert(requested_by.clone(), VoteChoice::Yes);
        }

        let record = self
            .store
            .insert(NewDayOffRequest {
                requested_by,
                target_date,
                reason,
                created_at: now,
                deadline,
                votes,
            })
            .await?;

        info!(request_id = record.id, %target_date, deadline = %record.deadline, "Day-off request created");
        Ok(record)
    }

    #[instrument(skip(self, now))]
    pub async fn register_vote(
        &self,
        request_id: u64,
        voter_id: &str,
        choice: VoteChoice,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt, DayOffError> {
        let _gate = self.write_gate.lock().await;
        self.close_if_expired(request_id, now).await?;

        let (saved, outcome) = self
            .mutate(request_id, |record| {
                if record.closed {
                    return Err(DayOffError::VotingClosed(record.id));
                }
                Ok(record.upsert_vote(voter_id, choice))
            })
            .await?;

        info!(request_id, voter_id, choice = choice.as_str(), ?outcome, "Vote registered");

        let tally = saved.tally();
        let mut receipt = VoteReceipt {
            request_id,
            outcome,
            tally,
            closed: false,
            result: VoteResult::Unresolved,
        };

        if self.policy.threshold_met(&saved) {
            // the vote is already saved; a failed close is left to the sweeper
            let result = match self.close_locked(saved, now).await {
                Ok(
                    CloseOutcome::Announced(r)
                    | CloseOutcome::AnnouncementPending(r)
                    | CloseOutcome::AlreadyAnnounced(r),
                ) => r,
                Ok(CloseOutcome::StillOpen) => VoteResult::Unresolved,
                Err(e) => {
                    warn!(error = %e, request_id, "Inline close failed, sweeper will close it");
                    VoteResult::Unresolved
                }
            };
            receipt.closed = result != VoteResult::Unresolved;
            receipt.result = result;
        }

        Ok(receipt)
    }

    pub async fn retract_vote(
        &self,
        request_id: u64,
        voter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RetractOutcome, DayOffError> {
        self.retract_matching(request_id, voter_id, None, now).await
    }

    /// Removes the vote, optionally only if it still equals `only_if`.
    async fn retract_matching(
        &self,
        request_id: u64,
        voter_id: &str,
        only_if: Option<VoteChoice>,
        now: DateTime<Utc>,
    ) -> Result<RetractOutcome, DayOffError> {
        let _gate = self.write_gate.lock().await;
        self.close_if_expired(request_id, now).await?;

        let current = self.load(request_id).await?;
        if current.closed {
            return Err(DayOffError::VotingClosed(request_id));
        }
        let matches = match (only_if, current.votes.get(voter_id)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(wanted), Some(cast)) => wanted == *cast,
        };
        if !matches {
            return Ok(RetractOutcome::NotVoted);
        }

        let (_, outcome) = self
            .mutate(request_id, |record| {
                if record.closed {
                    return Err(DayOffError::VotingClosed(record.id));
                }
                Ok(record.remove_vote(voter_id))
            })
            .await?;

        info!(request_id, voter_id, ?outcome, "Vote retracted");
        Ok(outcome)
    }

    /// Translates a reaction on a vote prompt into a vote or a retraction.
    pub async fn react(
        &self,
        message_id: &str,
        voter_id: &str,
        emoji: &str,
        added: bool,
        now: DateTime<Utc>,
    ) -> Result<ReactionOutcome, DayOffError> {
        let Some(choice) = reaction_choice(emoji) else {
            return Ok(ReactionOutcome::Ignored);
        };
        let Some(record) = self.store.find_by_message(message_id).await? else {
            return Ok(ReactionOutcome::Ignored);
        };

        if added {
            let receipt = self.register_vote(record.id, voter_id, choice, now).await?;
            Ok(ReactionOutcome::Voted { receipt })
        } else {
            let outcome = self
                .retract_matching(record.id, voter_id, Some(choice), now)
                .await?;
            Ok(ReactionOutcome::Retracted { outcome })
        }
    }

    pub async fn attach_message(
        &self,
        request_id: u64,
        message_id: &str,
    ) -> Result<DayOffRequest, DayOffError> {
        let message_id = message_id.trim();
        if message_id.is_empty() {
            return Err(DayOffError::InvalidInput("message_id is required".to_string()));
        }

        let _gate = self.write_gate.lock().await;
        let (saved, _) = self
            .mutate(request_id, |record| {
                record.message_id = Some(message_id.to_string());
                Ok(())
            })
            .await?;
        Ok(saved)
    }

    pub async fn status(&self, request_id: u64, now: DateTime<Utc>) -> Result<VoteStatus, DayOffError> {
        let request = self.load(request_id).await?;
        Ok(VoteStatus {
            tally: request.tally(),
            threshold: self.policy.threshold(),
            state: request.state_label().to_string(),
            closing_due: request.is_open() && self.policy.should_close(&request, now),
            request,
        })
    }

    pub async fn list(&self) -> Result<Vec<DayOffRequest>, DayOffError> {
        self.store.list_all().await
    }

    pub async fn open_requests(&self) -> Result<Vec<DayOffRequest>, DayOffError> {
        self.store.list_open().await
    }

    /// Closed requests whose result has not been delivered yet.
    pub async fn pending_announcements(&self) -> Result<Vec<DayOffRequest>, DayOffError> {
        Ok(self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.closed && !r.announced)
            .collect())
    }

    /// Closes the request if it is due and delivers its result once.
    ///
    /// Safe to call repeatedly: an announced request is left untouched and a
    /// closed-but-unannounced one only retries delivery.
    pub async fn close_and_announce(
        &self,
        request_id: u64,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, DayOffError> {
        let _gate = self.write_gate.lock().await;
        let record = self.load(request_id).await?;
        self.close_locked(record, now).await
    }

    /// Never fails: a store outage reads as "no exemption".
    pub async fn has_approved_dayoff(&self, participant_id: &str, date: NaiveDate) -> bool {
        match self.approved_on(date).await {
            Ok(approved) => approved
                .iter()
                .any(|record| self.coverage.covers(record, participant_id)),
            Err(e) => {
                warn!(error = %e, participant_id, %date, "Day-off lookup failed, assuming no exemption");
                false
            }
        }
    }

    #[instrument(skip(self, notes, now))]
    pub async fn log_activity(
        &self,
        participant_id: &str,
        log_date: NaiveDate,
        amount: i64,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<LogOutcome, DayOffError> {
        if amount < 0 {
            return Err(DayOffError::InvalidInput("amount cannot be negative".to_string()));
        }

        if self.has_approved_dayoff(participant_id, log_date).await {
            info!(participant_id, %log_date, "Approved day-off, log skipped");
            return Ok(LogOutcome::Exempt);
        }

        let entry = DailyLogEntry {
            participant_id: participant_id.to_string(),
            log_date,
            amount,
            notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            logged_at: now,
        };
        self.log_book.record(&entry).await?;
        Ok(LogOutcome::Logged { entry })
    }

    /// Misses are filled under the write gate so an approval cannot land
    /// between the read and the cache insert.
    async fn approved_on(&self, date: NaiveDate) -> Result<Arc<Vec<DayOffRequest>>, DayOffError> {
        if let Some(hit) = self.approved.get(date).await {
            return Ok(hit);
        }
        let _gate = self.write_gate.lock().await;
        if let Some(hit) = self.approved.get(date).await {
            return Ok(hit);
        }
        let approved = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.closed && r.result == VoteResult::Approved && r.target_date == date)
            .collect();
        Ok(self.approved.insert(date, approved).await)
    }

    async fn load(&self, request_id: u64) -> Result<DayOffRequest, DayOffError> {
        self.store
            .get(request_id)
            .await?
            .ok_or(DayOffError::RequestNotFound(request_id))
    }

    /// Read-modify-write with one retry on a stale version. Caller holds the gate.
    async fn mutate<T, F>(&self, request_id: u64, mut apply: F) -> Result<(DayOffRequest, T), DayOffError>
    where
        F: FnMut(&mut DayOffRequest) -> Result<T, DayOffError>,
    {
        let mut retried = false;
        loop {
            let mut record = self.load(request_id).await?;
            let value = apply(&mut record)?;
            match self.store.put(&record).await {
                Ok(saved) => return Ok((saved, value)),
                Err(DayOffError::StaleWrite(_)) if !retried => {
                    warn!(request_id, "Stale write, retrying once");
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// A request past its deadline takes no more votes; close it first.
    async fn close_if_expired(&self, request_id: u64, now: DateTime<Utc>) -> Result<(), DayOffError> {
        let record = self.load(request_id).await?;
        if record.is_open() && self.policy.deadline_passed(&record, now) {
            self.close_locked(record, now).await?;
        }
        Ok(())
    }

    /// Caller holds the gate. Writes closed+result, announces, then writes
    /// announced; the result is computed only once.
    async fn close_locked(
        &self,
        mut record: DayOffRequest,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, DayOffError> {
        if record.announced {
            return Ok(CloseOutcome::AlreadyAnnounced(record.result));
        }

        if record.result == VoteResult::Unresolved {
            if !record.closed && !self.policy.should_close(&record, now) {
                return Ok(CloseOutcome::StillOpen);
            }
            let tally = record.tally();
            record.closed = true;
            record.result = self.policy.decide(tally);
            record = self.store.put(&record).await?;

            info!(
                request_id = record.id,
                result = record.result.as_ref(),
                yes = tally.yes,
                no = tally.no,
                "Day-off vote closed"
            );
            if record.result == VoteResult::Approved {
                self.approved.invalidate(record.target_date).await;
            }
        }

        let announcement = render(&record, self.coverage, &self.broadcast_mention);
        if let Err(e) = self.announcer.announce(&announcement).await {
            warn!(error = %e, request_id = record.id, "Announcement failed, retrying on next sweep");
            return Ok(CloseOutcome::AnnouncementPending(record.result));
        }

        record.announced = true;
        let record = self.store.put(&record).await?;
        Ok(CloseOutcome::Announced(record.result))
    }
}

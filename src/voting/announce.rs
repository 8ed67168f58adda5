use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::{Config, Coverage};
use crate::error::DayOffError;
use crate::model::day_off_request::{DayOffRequest, VoteResult};

/// A rendered result message, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub request_id: u64,
    pub content: String,
    /// Pings every member; only set for approvals.
    pub broadcast: bool,
}

/// Delivers result messages to the announcement channel.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, announcement: &Announcement) -> Result<(), DayOffError>;
}

/// Renders the outcome of a closed request.
pub fn render(record: &DayOffRequest, coverage: Coverage, broadcast_mention: &str) -> Announcement {
    let tally = record.tally();
    let date = record.target_date.format("%Y-%m-%d");
    let approved = record.result == VoteResult::Approved;

    let ping = if approved && !broadcast_mention.is_empty() {
        format!("{} ", broadcast_mention)
    } else {
        String::new()
    };

    let verdict = if approved {
        format!("🎉 **APPROVED** - No logging required on {}!", date)
    } else {
        format!(
            "❌ **REJECTED** - Regular challenge requirements apply on {}.",
            date
        )
    };

    let mut content = format!(
        "{ping}🗳️ **Day-Off Vote Results**\n\n\
         📅 **Date Requested:** {date}\n\
         🙋 **Requested by:** <@{requester}>\n\n\
         ✅ **Yes:** {yes} votes\n\
         ❌ **No:** {no} votes\n\n\
         {verdict}",
        requester = record.requested_by,
        yes = tally.yes,
        no = tally.no,
    );

    if approved {
        let who = match coverage {
            Coverage::Everyone => "All participants get".to_string(),
            Coverage::Requester => format!("<@{}> gets", record.requested_by),
            Coverage::YesVoters => "Everyone who voted yes gets".to_string(),
        };
        content.push_str(&format!("\n\n{} a free day. Enjoy your rest!", who));
    }

    Announcement {
        request_id: record.id,
        content,
        broadcast: approved,
    }
}

/// Posts to a channel through the Discord REST API.
pub struct DiscordAnnouncer {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl DiscordAnnouncer {
    pub fn new(
        api_base: &str,
        channel_id: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, DayOffError> {
        if channel_id.is_empty() {
            return Err(DayOffError::InvalidInput(
                "DAYOFF_RESULTS_CHANNEL_ID must be set when DISCORD_TOKEN is".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DayOffError::AnnouncementFailed(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/channels/{}/messages", api_base, channel_id),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl Announcer for DiscordAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> Result<(), DayOffError> {
        let parse = if announcement.broadcast {
            json!(["everyone", "roles", "users"])
        } else {
            json!(["users"])
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({
                "content": announcement.content,
                "allowed_mentions": { "parse": parse },
            }))
            .send()
            .await
            .map_err(|e| DayOffError::AnnouncementFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DayOffError::AnnouncementFailed(format!(
                "discord returned {}: {}",
                status, body
            )));
        }

        tracing::info!(request_id = announcement.request_id, "Posted day-off results");
        Ok(())
    }
}

/// Writes announcements to the log; used when no bot token is configured.
pub struct TracingAnnouncer;

#[async_trait]
impl Announcer for TracingAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> Result<(), DayOffError> {
        tracing::info!(
            request_id = announcement.request_id,
            broadcast = announcement.broadcast,
            content = %announcement.content,
            "Day-off results (no Discord token configured)"
        );
        Ok(())
    }
}

pub fn from_config(config: &Config) -> Result<Box<dyn Announcer>, DayOffError> {
    match config.discord_token.as_deref() {
        Some(token) => Ok(Box::new(DiscordAnnouncer::new(
            &config.discord_api_base,
            &config.results_channel_id,
            token,
            config.announce_timeout,
        )?)),
        None => {
            tracing::warn!("DISCORD_TOKEN not set, announcements go to the log only");
            Ok(Box::new(TracingAnnouncer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::day_off_request::{NewDayOffRequest, VoteChoice};
    use chrono::{Duration, NaiveDate, Utc};

    fn closed(result: VoteResult) -> DayOffRequest {
        let now = Utc::now();
        let mut req = DayOffRequest::from_new(
            9,
            NewDayOffRequest {
                requested_by: "111".into(),
                target_date: NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
                reason: None,
                created_at: now,
                deadline: now + Duration::hours(12),
                votes: Default::default(),
            },
        );
        req.upsert_vote("222", VoteChoice::Yes);
        req.upsert_vote("333", VoteChoice::Yes);
        req.upsert_vote("444", VoteChoice::No);
        req.closed = true;
        req.result = result;
        req
    }

    #[test]
    fn approved_message_pings_and_grants_exemption() {
        let a = render(&closed(VoteResult::Approved), Coverage::Everyone, "@everyone");
        assert!(a.broadcast);
        assert!(a.content.starts_with("@everyone "));
        assert!(a.content.contains("<@111>"));
        assert!(a.content.contains("2026-02-03"));
        assert!(a.content.contains("**Yes:** 2 votes"));
        assert!(a.content.contains("**No:** 1 votes"));
        assert!(a.content.contains("APPROVED"));
        assert!(a.content.contains("All participants get a free day"));
    }

    #[test]
    fn rejected_message_has_no_ping() {
        let a = render(&closed(VoteResult::Rejected), Coverage::Everyone, "@everyone");
        assert!(!a.broadcast);
        assert!(!a.content.contains("@everyone"));
        assert!(a.content.contains("Regular challenge requirements apply on 2026-02-03"));
        assert!(!a.content.contains("free day"));
    }

    #[test]
    fn coverage_sentence_follows_configuration() {
        let a = render(&closed(VoteResult::Approved), Coverage::Requester, "<@&42>");
        assert!(a.content.starts_with("<@&42> "));
        assert!(a.content.contains("<@111> gets a free day"));
    }

    #[test]
    fn discord_announcer_requires_channel() {
        let err = DiscordAnnouncer::new(
            "https://discord.com/api/v10",
            "",
            "token",
            std::time::Duration::from_secs(1),
        );
        assert!(matches!(err, Err(DayOffError::InvalidInput(_))));
    }
}

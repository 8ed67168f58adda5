use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use strum_macros::{AsRefStr, EnumString};

/// Longest voting window a request may get.
pub const MAX_DEADLINE_HOURS: i64 = 24 * 30;
pub const MAX_SWEEP_MINUTES: u64 = 24 * 60;

/// Who an approved day-off exempts from logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Coverage {
    /// Every participant gets the day off.
    Everyone,
    /// Only the member who asked for it.
    Requester,
    /// The requester plus everyone who voted yes.
    YesVoters,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    /// `None` keeps requests in process memory.
    pub database_url: Option<String>,
    pub store_timeout: Duration,

    // Announcements
    pub discord_token: Option<String>,
    pub discord_api_base: String,
    pub results_channel_id: String,
    pub broadcast_mention: String,
    pub announce_timeout: Duration,

    // Voting rules
    pub yes_threshold: u32,
    pub deadline_hours: i64,
    pub sweep_interval: Duration,
    pub coverage: Coverage,
    /// The requester's own yes vote is recorded at creation.
    pub requester_votes_yes: bool,

    // Rate limiting
    pub rate_vote_per_min: u32,
    pub rate_api_per_min: u32,

    pub api_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            store_timeout: Duration::from_secs(10),
            discord_token: None,
            discord_api_base: "https://discord.com/api/v10".to_string(),
            results_channel_id: String::new(),
            broadcast_mention: "@everyone".to_string(),
            announce_timeout: Duration::from_secs(10),
            yes_threshold: 3,
            deadline_hours: 12,
            sweep_interval: Duration::from_secs(60 * 60),
            coverage: Coverage::Everyone,
            requester_votes_yes: true,
            rate_vote_per_min: 120,
            rate_api_per_min: 1000,
            api_prefix: "/api".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; malformed values fall back to
    /// the defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Config::default();
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let yes_threshold = parse_or(&text, "DAYOFF_YES_THRESHOLD", d.yes_threshold);
        let yes_threshold = if yes_threshold == 0 {
            tracing::warn!("DAYOFF_YES_THRESHOLD must be at least 1, using 1");
            1
        } else {
            yes_threshold
        };

        let sweep_minutes = clamped(
            "DAYOFF_SWEEP_INTERVAL_MINUTES",
            parse_or(&text, "DAYOFF_SWEEP_INTERVAL_MINUTES", 60u64),
            1,
            MAX_SWEEP_MINUTES,
        );
        let deadline_hours = clamped(
            "DAYOFF_DEADLINE_HOURS",
            parse_or(&text, "DAYOFF_DEADLINE_HOURS", d.deadline_hours),
            1,
            MAX_DEADLINE_HOURS,
        );

        Self {
            server_addr: text("SERVER_ADDR").unwrap_or(d.server_addr),
            database_url: text("DATABASE_URL"),
            store_timeout: Duration::from_secs(parse_or(&text, "STORE_TIMEOUT_SECS", 10)),

            discord_token: text("DISCORD_TOKEN"),
            discord_api_base: text("DISCORD_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(d.discord_api_base),
            results_channel_id: text("DAYOFF_RESULTS_CHANNEL_ID").unwrap_or_default(),
            broadcast_mention: text("DAYOFF_BROADCAST_MENTION").unwrap_or(d.broadcast_mention),
            announce_timeout: Duration::from_secs(parse_or(&text, "ANNOUNCE_TIMEOUT_SECS", 10)),

            yes_threshold,
            deadline_hours,
            sweep_interval: Duration::from_secs(sweep_minutes * 60),
            coverage: parse_or(&text, "DAYOFF_COVERAGE", d.coverage),
            requester_votes_yes: parse_or(&text, "DAYOFF_REQUESTER_VOTES_YES", d.requester_votes_yes),

            rate_vote_per_min: parse_or(&text, "RATE_VOTE_PER_MIN", d.rate_vote_per_min),
            rate_api_per_min: parse_or(&text, "RATE_API_PER_MIN", d.rate_api_per_min),

            api_prefix: text("API_PREFIX").unwrap_or(d.api_prefix),
        }
    }
}

fn clamped<T>(key: &str, value: T, min: T, max: T) -> T
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    if value < min || value > max {
        let bounded = if value < min { min } else { max };
        tracing::warn!(key, %value, %bounded, "Config value out of range, clamping");
        bounded
    } else {
        value
    }
}

fn parse_or<T, F>(text: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match text(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid config value, using default");
            default
        }),
    }
}

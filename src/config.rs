use std::env;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

use crate::api::market::SourceConfig;
use crate::models::Term;
use crate::services::fetch_service::FetchSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("unknown timezone '{0}'")]
    Timezone(String),
    #[error("invalid fire time '{0}', expected HH:MM")]
    FireTime(String),
    #[error("YIELD_FIRE_TIMES has no fire times")]
    NoFireTimes,
    #[error("invalid channel id '{1}' in {0}")]
    ChannelId(String, String),
}

/// Bot configuration derived from environment variables (and `.env`)
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub timezone: Tz,
    /// Local fire times, sorted and deduplicated
    pub fire_times: Vec<NaiveTime>,
    pub window_size: usize,
    pub politeness_delay: Duration,
    pub sources: SourceConfig,
    pub chart_width: u32,
    pub chart_height: u32,
    /// Startup destinations, from `YIELD_CHANNEL_<TERM>` (e.g. `YIELD_CHANNEL_10Y`)
    pub channels: Vec<(Term, u64)>,
}

/// Smallest window that still leaves two bars to draw
const MIN_WINDOW_SIZE: usize = 3;

fn clamp_window_size(requested: usize) -> usize {
    if requested < MIN_WINDOW_SIZE {
        warn!("YIELD_WINDOW_SIZE={} is too small to chart, using {}", requested, MIN_WINDOW_SIZE);
    }
    requested.max(MIN_WINDOW_SIZE)
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_num<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
        .unwrap_or(default)
}

/// Parse `HH:MM[,HH:MM...]` into sorted, unique local times
pub fn parse_fire_times(raw: &str) -> Result<Vec<NaiveTime>, ConfigError> {
    let mut times = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| ConfigError::FireTime(s.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    times.sort();
    times.dedup();
    Ok(times)
}

pub fn parse_timezone(raw: &str) -> Result<Tz, ConfigError> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::Timezone(raw.to_string()))
}

fn channel_env_key(term: Term) -> String {
    format!("YIELD_CHANNEL_{}", term.code().to_uppercase())
}

impl BotConfig {
    pub const DEFAULT_TIMEZONE: &'static str = "America/New_York";
    pub const DEFAULT_FIRE_TIMES: &'static str = "09:30,16:30";

    pub fn from_env() -> Result<Self, ConfigError> {
        let discord_token = env::var("DISCORD_TOKEN").map_err(|_| ConfigError::Missing("DISCORD_TOKEN"))?;

        let timezone = parse_timezone(&env_str("YIELD_TIMEZONE", Self::DEFAULT_TIMEZONE))?;
        let fire_times = parse_fire_times(&env_str("YIELD_FIRE_TIMES", Self::DEFAULT_FIRE_TIMES))?;
        if fire_times.is_empty() {
            return Err(ConfigError::NoFireTimes);
        }

        let mut channels = Vec::new();
        for term in Term::ALL {
            let key = channel_env_key(term);
            if let Ok(raw) = env::var(&key) {
                let id = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|id| *id != 0)
                    .ok_or_else(|| ConfigError::ChannelId(key.clone(), raw.clone()))?;
                channels.push((term, id));
            }
        }

        let defaults = SourceConfig::default();
        let sources = SourceConfig {
            quote_url_template: env_str("YIELD_QUOTE_URL", &defaults.quote_url_template),
            series_url_template: env_str("YIELD_SERIES_URL", &defaults.series_url_template),
            timeout: Duration::from_secs(env_num("YIELD_HTTP_TIMEOUT_SECS", 15u64)),
            insecure_transport: env_bool("YIELD_INSECURE_TRANSPORT", false),
            user_agent: defaults.user_agent,
        };

        Ok(Self {
            discord_token,
            timezone,
            fire_times,
            window_size: clamp_window_size(env_num("YIELD_WINDOW_SIZE", 60usize)),
            politeness_delay: Duration::from_millis(env_num("YIELD_POLITENESS_DELAY_MS", 1000u64)),
            sources,
            chart_width: env_num("YIELD_CHART_WIDTH", 1024u32),
            chart_height: env_num("YIELD_CHART_HEIGHT", 768u32),
            channels,
        })
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            window_size: self.window_size,
            politeness_delay: self.politeness_delay,
            timezone: self.timezone,
        }
    }
}

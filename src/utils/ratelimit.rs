use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use lazy_static::lazy_static;
use serenity::model::id::UserId;
use tokio::sync::Mutex;

lazy_static! {
    static ref COMMAND_COOLDOWNS: Mutex<HashMap<(UserId, String), u64>> =
        Mutex::new(HashMap::new());

    // Last cooldown warning per (user, command), so retries don't spam the channel
    static ref COOLDOWN_WARNINGS: Mutex<HashMap<(UserId, String), u64>> =
        Mutex::new(HashMap::new());
}

/// An on-demand digest hits two upstream sources, so the window is wider than a plain command
const COOLDOWN_SECONDS: u64 = 15;

/// Remaining cooldown for a key last used at `last_time`, or `None` when it may run again
fn remaining_cooldown(last_time: Option<u64>, now: u64) -> Option<u64> {
    let last_time = last_time?;
    let elapsed = now.saturating_sub(last_time);
    if elapsed < COOLDOWN_SECONDS {
        Some(COOLDOWN_SECONDS - elapsed)
    } else {
        None
    }
}

/// Check if a user can execute a command (cooldown not active)
/// Returns Ok(()) if cooldown has passed
/// Returns Err((remaining_seconds, should_send_warning_message)) if still on cooldown
pub async fn check_cooldown(user_id: UserId, command: &str) -> Result<(), (u64, bool)> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let key = (user_id, command.to_string());

    let mut cooldowns = COMMAND_COOLDOWNS.lock().await;
    let last_time = cooldowns.get(&key).copied();

    match remaining_cooldown(last_time, now) {
        Some(remaining) => {
            let mut warnings = COOLDOWN_WARNINGS.lock().await;
            // Only warn once per cooldown period
            let should_warn = match (warnings.get(&key), last_time) {
                (Some(&last_warning), Some(last_time)) => last_warning < last_time,
                _ => true,
            };
            if should_warn {
                warnings.insert(key, now);
            }
            Err((remaining, should_warn))
        }
        None => {
            cooldowns.insert(key, now);
            Ok(())
        }
    }
}

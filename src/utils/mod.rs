pub mod errors;
pub mod ratelimit;

pub use errors::{clean_notice, DeliverError, FetchError, ParseError, RenderError};
pub use ratelimit::check_cooldown;

use serenity::model::prelude::{GuildId, UserId};
use serenity::prelude::Context;
use tracing::debug;

/// Role name that may change where digests are delivered (case-insensitive)
pub const ADMIN_ROLE: &str = "admin";

/// Check that a user may reconfigure digest destinations in a guild.
/// The guild owner always passes.
pub async fn require_admin(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<(), String> {
    let guild = guild_id
        .to_partial_guild(&ctx.http)
        .await
        .map_err(|e| format!("Failed to get guild: {}", e))?;

    if guild.owner_id == user_id {
        debug!("User {} owns guild {}, granting admin", user_id, guild_id);
        return Ok(());
    }

    let member = guild_id
        .member(&ctx.http, user_id)
        .await
        .map_err(|_| "User is not a member of this guild".to_string())?;

    let is_admin = member
        .roles
        .iter()
        .filter_map(|rid| guild.roles.get(rid))
        .any(|role| role.name.eq_ignore_ascii_case(ADMIN_ROLE));

    debug!("User {} admin in guild {}: {}", user_id, guild_id, is_admin);

    if is_admin {
        Ok(())
    } else {
        Err("❌ You need the Admin role to change yield digest channels".to_string())
    }
}

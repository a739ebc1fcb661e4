use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage};
use serenity::model::channel::Message;
use serenity::prelude::Context;

use crate::models::Term;
use crate::services::dispatch_service::{deliver_to, format_pct, format_yield, ChannelDestination, ReplyDestination};
use crate::services::series_service;
use crate::DigestState;

async fn digest_state(ctx: &Context) -> Result<Arc<DigestState>, String> {
    let data = ctx.data.read().await;
    data.get::<crate::DigestContext>()
        .cloned()
        .ok_or("Digest pipeline not initialized".to_string())
}

async fn reply_embed(ctx: &Context, msg: &Message, embed: CreateEmbed) -> Result<(), String> {
    msg.channel_id
        .send_message(ctx, CreateMessage::default().embed(embed))
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn term_list() -> String {
    Term::ALL.iter().map(|t| t.code()).collect::<Vec<_>>().join(", ")
}

pub async fn execute(ctx: &Context, msg: &Message, args: &[&str]) -> Result<(), String> {
    match args {
        [] | ["help"] => {
            let help_embed = CreateEmbed::default()
                .title("📈 Yield Command")
                .description("US Treasury yield digests: live quote, daily series and a synthetic candlestick chart")
                .field("Usage",
                    "`$yield <term>` - Post a digest for one term now\n\
                     `$yield <term> <YYYY-MM-DD>` - Look up the closing yield on a past date\n\
                     `$yield channel <term>` - Deliver scheduled digests for a term here (admin)\n\
                     `$yield unset <term>` - Stop scheduled digests for a term (admin)\n\
                     `$yield channels` - Show where each term is delivered",
                    false)
                .field("Terms", term_list(), false)
                .color(0x1a73e8);
            reply_embed(ctx, msg, help_embed).await
        }
        ["channels"] => execute_list(ctx, msg).await,
        ["channel", term] => execute_set(ctx, msg, term).await,
        ["unset", term] => execute_unset(ctx, msg, term).await,
        [term] => execute_digest(ctx, msg, term).await,
        [term, date] => execute_history(ctx, msg, term, date).await,
        _ => Err(format!("❌ Usage: `$yield <term> [YYYY-MM-DD]` or `$yield channel <term>`. Terms: {}", term_list())),
    }
}

/// Build a digest for one term and reply with it
async fn execute_digest(ctx: &Context, msg: &Message, term_arg: &str) -> Result<(), String> {
    let term: Term = term_arg.parse()?;
    let state = digest_state(ctx).await?;

    if let Err(e) = msg.channel_id.broadcast_typing(ctx.http.as_ref()).await {
        tracing::warn!("Failed to broadcast typing: {}", e);
    }

    let payload = state.fetcher.run(term).await.map_err(|e| {
        tracing::warn!("On-demand {} digest failed: {}", term, e);
        e.notice_text()
    })?;

    let destination = ReplyDestination::new(ctx.http.clone(), msg.channel_id, msg.id);
    // A failed reply has already left a notice in the channel when it could
    deliver_to(&destination, &payload).await.map_err(|e| e.to_string())
}

/// Reply with one term's close on a past date, or the closest session before it
async fn execute_history(ctx: &Context, msg: &Message, term_arg: &str, date_arg: &str) -> Result<(), String> {
    let term: Term = term_arg.parse()?;
    let date = NaiveDate::parse_from_str(date_arg, "%Y-%m-%d")
        .map_err(|_| "❌ Invalid date format. Please use YYYY-MM-DD.".to_string())?;
    let state = digest_state(ctx).await?;

    let series = state.fetcher.series_for_year(term, date.year()).await.map_err(|e| {
        tracing::warn!("{} lookup for {} failed: {}", term, date, e);
        e.notice_text()
    })?;

    let column = term.series_column();
    let summary = series_service::summarize_at(&series, column, date);
    let found = summary
        .latest_date
        .filter(|_| series.has_column(column))
        .ok_or(format!("No {} yield data available for {}.", term.display_name(), date.year()))?;

    let mut embed = CreateEmbed::default()
        .title(format!("📈 US {} Treasury Yield on {}", term.display_name(), found.format("%Y-%m-%d")))
        .field("Yield", format_yield(summary.latest_yield), true)
        .field("Change from prior", format_pct(summary.change_pct), true)
        .color(0x1a73e8);
    if found < date {
        embed = embed.footer(CreateEmbedFooter::new(format!("Closest session on or before {}", date)));
    } else if found > date {
        embed = embed.footer(CreateEmbedFooter::new(format!("No session on or before {}, showing the earliest in {}", date, date.year())));
    }

    reply_embed(ctx, msg, embed).await
}

async fn execute_set(ctx: &Context, msg: &Message, term_arg: &str) -> Result<(), String> {
    let term: Term = term_arg.parse()?;
    let guild_id = msg
        .guild_id
        .ok_or("Digest channels can only be set in a guild.".to_string())?;
    crate::utils::require_admin(ctx, guild_id, msg.author.id).await?;

    let state = digest_state(ctx).await?;
    let destination = Arc::new(ChannelDestination::new(ctx.http.clone(), msg.channel_id));
    let previous = state.dispatcher.registry().set(term, destination);

    tracing::info!("{} digests now go to channel {} (set by {})", term, msg.channel_id, msg.author.id);

    let mut embed = CreateEmbed::default()
        .title("✅ Digest Channel Set")
        .description(format!("Scheduled {} yield digests will be posted in <#{}>.", term.display_name(), msg.channel_id))
        .color(0x00ff00);
    if let Some(previous) = previous {
        embed = embed.field("Replaced", previous.describe(), false);
    }
    reply_embed(ctx, msg, embed).await
}

async fn execute_unset(ctx: &Context, msg: &Message, term_arg: &str) -> Result<(), String> {
    let term: Term = term_arg.parse()?;
    let guild_id = msg
        .guild_id
        .ok_or("Digest channels can only be changed in a guild.".to_string())?;
    crate::utils::require_admin(ctx, guild_id, msg.author.id).await?;

    let state = digest_state(ctx).await?;
    let description = match state.dispatcher.registry().remove(term) {
        Some(previous) => format!("{} digests will no longer be posted to {}.", term.display_name(), previous.describe()),
        None => format!("{} had no digest channel.", term.display_name()),
    };

    reply_embed(
        ctx,
        msg,
        CreateEmbed::default()
            .title("Digest Channel Removed")
            .description(description)
            .color(0xffa500),
    )
    .await
}

async fn execute_list(ctx: &Context, msg: &Message) -> Result<(), String> {
    let state = digest_state(ctx).await?;
    let mapped = state.dispatcher.registry().describe_all();

    let lines: Vec<String> = Term::ALL
        .iter()
        .map(|term| {
            let target = mapped
                .iter()
                .find(|(t, _)| t == term)
                .map(|(_, d)| d.clone())
                .unwrap_or_else(|| "not set".to_string());
            format!("**{}** → {}", term.display_name(), target)
        })
        .collect();

    reply_embed(
        ctx,
        msg,
        CreateEmbed::default()
            .title("📈 Yield Digest Channels")
            .description(lines.join("\n"))
            .color(0x1a73e8),
    )
    .await
}

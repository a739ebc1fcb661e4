use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serenity::all::{
    ChannelId, CreateAttachment, CreateEmbed, CreateEmbedFooter, CreateMessage, Http, MessageId,
};
use serenity::async_trait;
use tracing::{debug, info, warn};

use crate::models::{ChangeDirection, DeliveryPayload, SeriesSummary, Term, NOT_AVAILABLE};
use crate::utils::{clean_notice, DeliverError, FetchError};

/// Embed fields left for quote stats after the fixed fields
const MAX_STAT_FIELDS: usize = 18;

/// Discord limits on embed field names and values, in characters
const FIELD_NAME_LIMIT: usize = 256;
const FIELD_VALUE_LIMIT: usize = 1024;
const FOOTER_TEXT_LIMIT: usize = 2048;

/// Somewhere a digest can be sent
#[async_trait]
pub trait Destination: Send + Sync {
    /// Send the structured digest with its chart attached
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), DeliverError>;

    /// Send a plain-text notice, used to report failures
    async fn notify(&self, text: &str) -> Result<(), DeliverError>;

    /// Human-readable target for logs and listings
    fn describe(&self) -> String;
}

/// Term → destination mapping shared between the scheduler and admin commands.
/// Lookups clone the `Arc`, so a dispatch keeps the destination it resolved
/// even if the mapping is replaced mid-cycle.
#[derive(Default)]
pub struct DestinationRegistry {
    destinations: RwLock<HashMap<Term, Arc<dyn Destination>>>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: Term) -> Option<Arc<dyn Destination>> {
        let map = self.destinations.read().unwrap_or_else(|e| e.into_inner());
        map.get(&term).cloned()
    }

    /// Set or replace the destination for a term, returning the previous one
    pub fn set(&self, term: Term, destination: Arc<dyn Destination>) -> Option<Arc<dyn Destination>> {
        let mut map = self.destinations.write().unwrap_or_else(|e| e.into_inner());
        map.insert(term, destination)
    }

    pub fn remove(&self, term: Term) -> Option<Arc<dyn Destination>> {
        let mut map = self.destinations.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&term)
    }

    /// Current mapping as `(term, description)` pairs in term order
    pub fn describe_all(&self) -> Vec<(Term, String)> {
        let map = self.destinations.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<(Term, String)> = map.iter().map(|(t, d)| (*t, d.describe())).collect();
        entries.sort_by_key(|(t, _)| *t);
        entries
    }
}

/// Resolves destinations and sends digests, one term at a time
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<DestinationRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<DestinationRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<DestinationRegistry> {
        &self.registry
    }

    pub fn destination_for(&self, term: Term) -> Result<Arc<dyn Destination>, DeliverError> {
        self.registry
            .get(term)
            .ok_or(DeliverError::DestinationUnset(term))
    }

    /// Send a digest to the term's destination. An unmapped term is a no-op.
    pub async fn deliver(&self, term: Term, payload: &DeliveryPayload) -> Result<(), DeliverError> {
        let destination = match self.destination_for(term) {
            Ok(d) => d,
            Err(DeliverError::DestinationUnset(_)) => {
                debug!("No destination for {}, skipping delivery", term);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        deliver_to(destination.as_ref(), payload).await
    }
}

/// Tell a destination that this cycle produced nothing for its term.
/// A notice that cannot be sent is only logged.
pub async fn notify_failure(destination: &dyn Destination, term: Term, error: &FetchError) {
    if let Err(e) = destination.notify(&clean_notice(&error.notice_text())).await {
        warn!("Could not send failure notice for {} to {}: {}", term, destination.describe(), e);
    }
}

/// Deliver to a resolved destination; on failure, try to leave a plain-text
/// notice in the same place before returning the original error
pub async fn deliver_to(destination: &dyn Destination, payload: &DeliveryPayload) -> Result<(), DeliverError> {
    match destination.deliver(payload).await {
        Ok(()) => {
            info!("✓ Delivered {} digest to {}", payload.term, destination.describe());
            Ok(())
        }
        Err(e) => {
            warn!("Delivering {} digest to {} failed: {}", payload.term, destination.describe(), e);
            let notice = clean_notice(&format!(
                "⚠️ Could not post the {} yield digest: {}",
                payload.term.display_name(),
                e
            ));
            if let Err(notice_err) = destination.notify(&notice).await {
                debug!("Failure notice also failed: {}", notice_err);
            }
            Err(e)
        }
    }
}

/// Text Discord accepts in an embed slot: never empty, at most `limit` chars
fn embed_text(text: &str, limit: usize) -> String {
    let text = text.trim();
    if text.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit - 1).collect();
    cut.push('…');
    cut
}

pub fn format_pct(value: Option<f64>) -> String {
    value.map(|v| format!("{:+.2}%", v)).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn format_yield(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}%", v)).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn summary_text(summary: &SeriesSummary) -> String {
    let date = summary
        .latest_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    format!(
        "Close ({}): {}\nChange from prior: {}\nExpected next: {}",
        date,
        format_yield(summary.latest_yield),
        format_pct(summary.change_pct),
        format_yield(summary.expected_next)
    )
}

/// Build the digest embed for a payload
pub fn build_embed(payload: &DeliveryPayload) -> CreateEmbed {
    let snapshot = &payload.snapshot;
    let color = match snapshot.change_direction {
        ChangeDirection::Up => 0x34a853,
        ChangeDirection::Down => 0xea4335,
        ChangeDirection::Unknown => 0x1a73e8,
    };

    let mut embed = CreateEmbed::default()
        .title(payload.title())
        .field("Yield", embed_text(&snapshot.last_price, FIELD_VALUE_LIMIT), true)
        .field(
            "Change",
            embed_text(
                &format!("{} {}", snapshot.change_direction.arrow(), snapshot.change_text),
                FIELD_VALUE_LIMIT,
            ),
            true,
        );

    for (label, value) in snapshot.stats.iter().take(MAX_STAT_FIELDS) {
        embed = embed.field(
            embed_text(label, FIELD_NAME_LIMIT),
            embed_text(value, FIELD_VALUE_LIMIT),
            true,
        );
    }

    embed
        .field("Daily Series", summary_text(&payload.summary), false)
        .image(format!("attachment://{}", payload.chart_filename()))
        .footer(CreateEmbedFooter::new(embed_text(&payload.last_trade_time, FOOTER_TEXT_LIMIT)))
        .color(color)
}

fn build_message(payload: &DeliveryPayload) -> CreateMessage {
    let attachment = CreateAttachment::bytes(payload.chart_png.clone(), payload.chart_filename());
    CreateMessage::default()
        .embed(build_embed(payload))
        .add_file(attachment)
}

/// A guild channel that receives every scheduled digest for its term
pub struct ChannelDestination {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelDestination {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Destination for ChannelDestination {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), DeliverError> {
        self.channel_id
            .send_message(self.http.as_ref(), build_message(payload))
            .await
            .map(|_| ())
            .map_err(|e| DeliverError::SendFailed(e.to_string()))
    }

    async fn notify(&self, text: &str) -> Result<(), DeliverError> {
        self.channel_id
            .say(self.http.as_ref(), text)
            .await
            .map(|_| ())
            .map_err(|e| DeliverError::SendFailed(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("<#{}>", self.channel_id)
    }
}

/// A one-off reply to the message that asked for a digest
pub struct ReplyDestination {
    http: Arc<Http>,
    channel_id: ChannelId,
    message_id: MessageId,
}

impl ReplyDestination {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            http,
            channel_id,
            message_id,
        }
    }
}

#[async_trait]
impl Destination for ReplyDestination {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), DeliverError> {
        let message = build_message(payload).reference_message((self.channel_id, self.message_id));
        self.channel_id
            .send_message(self.http.as_ref(), message)
            .await
            .map(|_| ())
            .map_err(|e| DeliverError::SendFailed(e.to_string()))
    }

    async fn notify(&self, text: &str) -> Result<(), DeliverError> {
        let message = CreateMessage::default()
            .content(text)
            .reference_message((self.channel_id, self.message_id));
        self.channel_id
            .send_message(self.http.as_ref(), message)
            .await
            .map(|_| ())
            .map_err(|e| DeliverError::SendFailed(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("reply to {} in <#{}>", self.message_id, self.channel_id)
    }
}

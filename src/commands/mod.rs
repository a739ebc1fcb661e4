pub mod yields;

use serenity::builder::{CreateEmbed, CreateMessage};
use serenity::model::channel::Message;
use serenity::prelude::Context;
use tracing::{error, info};

use crate::utils::{check_cooldown, clean_notice};

pub async fn handle_message(ctx: &Context, msg: &Message) {
    if msg.author.bot {
        return;
    }

    // Parse command and arguments
    let parts: Vec<&str> = msg.content.split_whitespace().collect();
    let Some((&command, args)) = parts.split_first() else {
        return;
    };

    if !matches!(command, "$yield" | "$yields") {
        return;
    }

    if let Err((remaining, should_warn)) = check_cooldown(msg.author.id, "$yield").await {
        if should_warn {
            let _ = msg
                .channel_id
                .send_message(
                    ctx,
                    CreateMessage::default().embed(
                        CreateEmbed::default()
                            .title("Command Cooldown")
                            .description(format!(
                                "⏳ Please wait {} seconds before using this command again.",
                                remaining
                            ))
                            .color(0xffa500),
                    ),
                )
                .await;
        }
        return;
    }

    info!("📨 {} from {} with args {:?}", command, msg.author.id, args);
    let result = yields::execute(ctx, msg, args).await;

    if let Err(e) = result {
        error!("❌ Error executing command {}: {}", command, e);

        let user_message = if e.contains("429") || e.contains("rate limit") {
            "⚠️ **Rate Limited**: Discord is rate limiting us. Please try again in a moment.".to_string()
        } else if e.is_empty() {
            "❌ An error occurred while executing the command.".to_string()
        } else {
            clean_notice(&e)
        };

        let embed = CreateEmbed::default()
            .title("Command Error")
            .description(user_message)
            .color(0xff0000);

        let _ = msg
            .channel_id
            .send_message(ctx, CreateMessage::default().embed(embed))
            .await;
    }
}

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ChatMemberStatus, ChatMemberUpdated};
use tracing::{error, info, warn};

use crate::backend::{BackendClient, BackendError, ChannelOutcome};

/// What to do in the channel after an add-channel attempt: one reply,
/// plus optionally leaving the chat.
struct BroadcastPlan {
    reply: String,
    leave: bool,
}

/// Handle updates to the bot's own membership in a chat.
///
/// Registers the chat as a broadcast channel when the bot is promoted to
/// administrator of a channel or supergroup. Every send/leave here is
/// best-effort: a failed chat action must not fail the handler.
pub async fn handle_membership_update(
    bot: Bot,
    update: ChatMemberUpdated,
    backend: Arc<BackendClient>,
) -> ResponseResult<()> {
    // Capture the chat identity up front so every failure path below has it.
    let chat_id = update.chat.id;

    if !(update.chat.is_channel() || update.chat.is_supergroup()) {
        return Ok(());
    }

    let old = update.old_chat_member.kind.status();
    let new = update.new_chat_member.kind.status();
    if !authorizes_broadcast(old, new) {
        return Ok(());
    }

    let actor = &update.from;
    let title = update.chat.title().unwrap_or_default();

    info!(
        "Added as admin to {} ({}) by user {}",
        title, chat_id, actor.id
    );

    let outcome = backend
        .add_channel(actor.id.0, chat_id.0, title, update.chat.username())
        .await;
    if let Err(e) = &outcome {
        error!("Channel registration failed: {}", e);
    }

    let actor_name = actor
        .username
        .clone()
        .unwrap_or_else(|| actor.first_name.clone());
    let plan = broadcast_plan(outcome, &actor_name);

    if let Err(e) = bot.send_message(chat_id, plan.reply).await {
        warn!("Could not post into chat {}: {}", chat_id, e);
    }
    if plan.leave {
        if let Err(e) = bot.leave_chat(chat_id).await {
            warn!("Could not leave chat {}: {}", chat_id, e);
        }
    }

    Ok(())
}

/// The bot was promoted to administrator from outside the admin set.
fn authorizes_broadcast(old: ChatMemberStatus, new: ChatMemberStatus) -> bool {
    matches!(new, ChatMemberStatus::Administrator)
        && matches!(old, ChatMemberStatus::Left | ChatMemberStatus::Member)
}

fn broadcast_plan(outcome: Result<ChannelOutcome, BackendError>, actor: &str) -> BroadcastPlan {
    match outcome {
        Ok(ChannelOutcome::Enabled { alias }) => BroadcastPlan {
            reply: format!(
                "✅ BroadCall broadcasting enabled!\n\n\
                 This channel is now connected to {} profile.\n\n\
                 Token calls will be automatically posted here when created. \
                 Manage broadcasting settings in your BroadCall dashboard.",
                alias.as_deref().unwrap_or("a BroadCall")
            ),
            leave: false,
        },
        Ok(ChannelOutcome::NoProfile) => BroadcastPlan {
            reply: format!(
                "❌ Could not connect this channel.\n\n\
                 The user who added me (@{actor}) doesn't have a connected BroadCall account.\n\n\
                 Please:\n\
                 1. Go to BroadCall Settings\n\
                 2. Connect your Telegram account first\n\
                 3. Then add me to your channel again"
            ),
            leave: true,
        },
        Ok(ChannelOutcome::AlreadyLinked) => BroadcastPlan {
            reply: "ℹ️ This channel is already connected to BroadCall.\n\n\
                    Broadcasting is active! Manage settings in your BroadCall dashboard."
                .to_string(),
            leave: false,
        },
        Err(_) => BroadcastPlan {
            reply: "❌ Error connecting channel. Please try again later or contact support."
                .to_string(),
            leave: true,
        },
    }
}

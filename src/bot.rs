use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

use crate::backend::{
    BackendClient, BackendError, ConnectionStatus, DisconnectOutcome, VerifyOutcome,
    WaitlistOutcome,
};
use crate::channel;
use crate::config::Config;

/// Uniform reply for transport-level failures, shared by every command.
const CONNECTION_ERROR_TEXT: &str =
    "❌ Could not connect to BroadCall servers. Please try again later.";

const HELP_TEXT: &str = "🤖 BroadCall Telegram Bot\n\n\
     Available commands:\n\
     /start - Connect your Telegram to BroadCall\n\
     /status - Check your connection status\n\
     /disconnect - Unlink your Telegram account\n\
     /waitlist - Join the waitlist with your wallet address\n\
     /help - Show this help message\n\n\
     📢 Channel Broadcasting:\n\
     Add me as an admin to your channel to broadcast your token calls automatically!\n\n\
     Visit BroadCall Settings to get your connection link!";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "BroadCall bot commands")]
pub enum Command {
    #[command(description = "Connect your Telegram to BroadCall")]
    Start(String),
    #[command(description = "Check your connection status")]
    Status,
    #[command(description = "Unlink your Telegram account")]
    Disconnect,
    #[command(description = "Join the waitlist with your wallet address")]
    Waitlist(String),
    #[command(description = "Show this help message")]
    Help,
}

/// Start the Telegram bot
pub async fn run(config: Config) -> Result<()> {
    let bot = Bot::new(&config.bot_token);
    let backend = Arc::new(BackendClient::new(&config.backend_url)?);

    info!("Starting Telegram bot...");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_my_chat_member().endpoint(channel::handle_membership_update));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![backend])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    backend: Arc<BackendClient>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start(token) => handle_start(bot, msg, backend, token).await,
        Command::Status => handle_status(bot, msg, backend).await,
        Command::Disconnect => handle_disconnect(bot, msg, backend).await,
        Command::Waitlist(wallet) => handle_waitlist(bot, msg, backend, wallet).await,
        Command::Help => handle_help(bot, msg).await,
    }
}

/// Handle /start, with an optional connection token as deep-link payload.
async fn handle_start(
    bot: Bot,
    msg: Message,
    backend: Arc<BackendClient>,
    token: String,
) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    let token = token.trim();
    if token.is_empty() {
        bot.send_message(msg.chat.id, onboarding_text(&user.first_name))
            .await?;
        return Ok(());
    }

    let username = user
        .username
        .clone()
        .unwrap_or_else(|| user.first_name.clone());

    info!("Verifying connection token for user {}", user.id);

    let outcome = backend.verify(token, user.id.0, &username).await;
    if let Err(e) = &outcome {
        error!("Token verification failed: {}", e);
    }

    bot.send_message(msg.chat.id, verify_text(outcome, &username))
        .await?;
    Ok(())
}

async fn handle_status(bot: Bot, msg: Message, backend: Arc<BackendClient>) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    info!("Status check for user {}", user.id);

    let result = backend.status(user.id.0).await;
    if let Err(e) = &result {
        error!("Status check failed: {}", e);
    }

    bot.send_message(msg.chat.id, status_text(result)).await?;
    Ok(())
}

async fn handle_disconnect(
    bot: Bot,
    msg: Message,
    backend: Arc<BackendClient>,
) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    info!("Disconnect request from user {}", user.id);

    let result = backend.disconnect(user.id.0).await;
    if let Err(e) = &result {
        error!("Disconnect failed: {}", e);
    }

    bot.send_message(msg.chat.id, disconnect_text(result))
        .await?;
    Ok(())
}

async fn handle_waitlist(
    bot: Bot,
    msg: Message,
    backend: Arc<BackendClient>,
    wallet: String,
) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    let wallet = wallet.trim();
    if wallet.is_empty() {
        bot.send_message(
            msg.chat.id,
            "⚠️ Please provide your wallet address.\n\n\
             Usage: /waitlist YOUR_WALLET_ADDRESS\n\n\
             Example:\n\
             /waitlist 5SYktAH1t3ygsxKMQg3rN7T8p8UhXQP88fNKQue7mSBT",
        )
        .await?;
        return Ok(());
    }

    let username = user
        .username
        .clone()
        .unwrap_or_else(|| user.first_name.clone());

    info!("Waitlist signup from user {}", user.id);

    let outcome = backend.join_waitlist(wallet, user.id.0, &username).await;
    if let Err(e) = &outcome {
        error!("Waitlist signup failed: {}", e);
    }

    bot.send_message(msg.chat.id, waitlist_text(outcome, &username))
        .await?;
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, HELP_TEXT).await?;
    Ok(())
}

fn onboarding_text(first_name: &str) -> String {
    format!(
        "👋 Welcome to BroadCall, {first_name}!\n\n\
         To connect your Telegram account to BroadCall:\n\
         1. Go to your BroadCall Settings page\n\
         2. Click 'Connect Telegram'\n\
         3. Follow the link to start the connection\n\n\
         Once connected, you'll be able to push your token calls directly to Telegram!"
    )
}

fn verify_text(outcome: Result<VerifyOutcome, BackendError>, username: &str) -> String {
    match outcome {
        Ok(VerifyOutcome::Linked { alias }) => format!(
            "✅ Success! Your Telegram account is now connected to BroadCall.\n\n\
             👤 Connected as: @{username}\n\
             💼 BroadCall Profile: {}\n\n\
             You can now:\n\
             • Use /status to check your connection\n\
             • Use /disconnect to unlink your account\n\
             • Push token calls to Telegram (coming soon!)",
            alias.as_deref().unwrap_or("Anonymous")
        ),
        Ok(VerifyOutcome::Rejected { reason }) => format!(
            "❌ Connection failed: {}\n\n\
             Please generate a new connection link from BroadCall Settings.",
            reason.as_deref().unwrap_or("Invalid or expired token")
        ),
        Err(BackendError::UnexpectedStatus { .. }) => {
            "❌ Something went wrong. Please try again later or contact support.".to_string()
        }
        Err(BackendError::Http(_)) => CONNECTION_ERROR_TEXT.to_string(),
    }
}

fn status_text(result: Result<ConnectionStatus, BackendError>) -> String {
    match result {
        Ok(status) if status.connected => format!(
            "✅ Your Telegram is connected to BroadCall!\n\n\
             👤 Telegram: @{}\n\
             💼 BroadCall: {}\n\
             🔗 Wallet: {}...\n\n\
             Use /disconnect to unlink your account.",
            status.telegram_username.as_deref().unwrap_or("Unknown"),
            status.alias.as_deref().unwrap_or("Anonymous"),
            short_wallet(status.wallet_address.as_deref().unwrap_or("N/A"))
        ),
        Ok(_) => "❌ Your Telegram is not connected to any BroadCall account.\n\n\
                  Go to BroadCall Settings to connect your account!"
            .to_string(),
        Err(BackendError::UnexpectedStatus { .. }) => {
            "❌ Could not check connection status. Please try again later.".to_string()
        }
        Err(BackendError::Http(_)) => CONNECTION_ERROR_TEXT.to_string(),
    }
}

fn disconnect_text(result: Result<DisconnectOutcome, BackendError>) -> String {
    match result {
        Ok(DisconnectOutcome::Disconnected) => {
            "✅ Your Telegram account has been disconnected from BroadCall.\n\n\
             You can reconnect anytime from your BroadCall Settings page."
                .to_string()
        }
        Ok(DisconnectOutcome::NotLinked) => {
            "❌ No BroadCall account is connected to this Telegram.\n\n\
             Nothing to disconnect!"
                .to_string()
        }
        Err(BackendError::UnexpectedStatus { .. }) => {
            "❌ Something went wrong. Please try again later.".to_string()
        }
        Err(BackendError::Http(_)) => CONNECTION_ERROR_TEXT.to_string(),
    }
}

fn waitlist_text(outcome: Result<WaitlistOutcome, BackendError>, username: &str) -> String {
    match outcome {
        Ok(WaitlistOutcome::Joined) => format!(
            "🎉 Congratulations, @{username}!\n\n\
             ✅ You're now on the BroadCall waitlist!\n\n\
             We'll notify you right here on Telegram as soon as BroadCall launches.\n\n\
             Get ready to turn your token calls into income! 🚀"
        ),
        Ok(WaitlistOutcome::Rejected { reason }) => format!(
            "❌ {}\n\n\
             Please make sure you're using the correct Solana wallet address from the BroadCall website.",
            reason.as_deref().unwrap_or("Invalid wallet address")
        ),
        Ok(WaitlistOutcome::UnknownWallet) => {
            "❌ This wallet address is not recognized.\n\n\
             Please:\n\
             1. Go to BroadCall website\n\
             2. Connect your wallet\n\
             3. Click 'Join Waitlist'\n\
             4. Follow the instructions to link your Telegram"
                .to_string()
        }
        Err(BackendError::UnexpectedStatus { .. }) => {
            "❌ Something went wrong. Please try again later or contact support.".to_string()
        }
        Err(BackendError::Http(_)) => CONNECTION_ERROR_TEXT.to_string(),
    }
}

/// First 8 characters of a wallet address, for display.
fn short_wallet(addr: &str) -> String {
    addr.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn unexpected(status: u16) -> BackendError {
        BackendError::UnexpectedStatus {
            status: StatusCode::from_u16(status).unwrap(),
            body: String::new(),
        }
    }

    #[test]
    fn parse_start_with_token() {
        let cmd = Command::parse("/start tok-123", "broadcall_bot").unwrap();
        match cmd {
            Command::Start(token) => assert_eq!(token, "tok-123"),
            _ => panic!("expected Start"),
        }
    }

    #[test]
    fn parse_start_without_token() {
        let cmd = Command::parse("/start", "broadcall_bot").unwrap();
        match cmd {
            Command::Start(token) => assert!(token.trim().is_empty()),
            _ => panic!("expected Start"),
        }
    }

    #[test]
    fn parse_plain_commands() {
        assert!(matches!(
            Command::parse("/status", "broadcall_bot").unwrap(),
            Command::Status
        ));
        assert!(matches!(
            Command::parse("/disconnect", "broadcall_bot").unwrap(),
            Command::Disconnect
        ));
        assert!(matches!(
            Command::parse("/help", "broadcall_bot").unwrap(),
            Command::Help
        ));
    }

    #[test]
    fn onboarding_greets_by_first_name() {
        let text = onboarding_text("Alice");
        assert!(text.contains("Welcome to BroadCall, Alice!"));
        assert!(text.contains("Connect Telegram"));
    }

    #[test]
    fn verify_success_names_the_alias() {
        let text = verify_text(
            Ok(VerifyOutcome::Linked {
                alias: Some("Alpha".to_string()),
            }),
            "alice",
        );
        assert!(text.contains("Alpha"));
        assert!(text.contains("@alice"));
    }

    #[test]
    fn verify_success_falls_back_to_anonymous() {
        let text = verify_text(Ok(VerifyOutcome::Linked { alias: None }), "alice");
        assert!(text.contains("Anonymous"));
    }

    #[test]
    fn verify_rejection_surfaces_backend_reason() {
        let text = verify_text(
            Ok(VerifyOutcome::Rejected {
                reason: Some("Token already used".to_string()),
            }),
            "alice",
        );
        assert!(text.contains("Connection failed: Token already used"));
    }

    #[test]
    fn verify_rejection_without_reason_uses_fallback() {
        let text = verify_text(Ok(VerifyOutcome::Rejected { reason: None }), "alice");
        assert!(text.contains("Invalid or expired token"));
    }

    #[test]
    fn verify_unexpected_status_is_generic() {
        let text = verify_text(Err(unexpected(500)), "alice");
        assert!(text.contains("Something went wrong"));
    }

    #[test]
    fn status_connected_shows_profile_and_truncated_wallet() {
        let text = status_text(Ok(ConnectionStatus {
            connected: true,
            telegram_username: Some("alice".to_string()),
            alias: Some("Alpha".to_string()),
            wallet_address: Some("5SYktAH1t3ygsxKMQg3rN7T8p8UhXQP88fNKQue7mSBT".to_string()),
        }));
        assert!(text.contains("@alice"));
        assert!(text.contains("Alpha"));
        assert!(text.contains("5SYktAH1..."));
        assert!(!text.contains("not connected"));
    }

    #[test]
    fn status_disconnected_says_not_connected() {
        let text = status_text(Ok(ConnectionStatus {
            connected: false,
            telegram_username: None,
            alias: None,
            wallet_address: None,
        }));
        assert!(text.contains("not connected"));
    }

    #[test]
    fn status_missing_wallet_renders_placeholder() {
        let text = status_text(Ok(ConnectionStatus {
            connected: true,
            telegram_username: None,
            alias: None,
            wallet_address: None,
        }));
        assert!(text.contains("N/A..."));
    }

    #[test]
    fn status_backend_error_is_generic() {
        let text = status_text(Err(unexpected(502)));
        assert!(text.contains("Could not check connection status"));
    }

    #[test]
    fn disconnect_not_linked_is_not_the_generic_error() {
        let text = disconnect_text(Ok(DisconnectOutcome::NotLinked));
        assert!(text.contains("Nothing to disconnect!"));
        assert!(!text.contains("Something went wrong"));
    }

    #[test]
    fn disconnect_success_confirms() {
        let text = disconnect_text(Ok(DisconnectOutcome::Disconnected));
        assert!(text.contains("disconnected from BroadCall"));
    }

    #[test]
    fn waitlist_outcomes_render() {
        let text = waitlist_text(Ok(WaitlistOutcome::Joined), "alice");
        assert!(text.contains("@alice"));
        assert!(text.contains("waitlist"));

        let text = waitlist_text(Ok(WaitlistOutcome::Rejected { reason: None }), "alice");
        assert!(text.contains("Invalid wallet address"));

        let text = waitlist_text(Ok(WaitlistOutcome::UnknownWallet), "alice");
        assert!(text.contains("not recognized"));
    }

    #[tokio::test]
    async fn transport_failure_maps_to_connection_error_text() {
        let client = BackendClient::new("http://127.0.0.1:9").unwrap();
        let err = client.status(1).await.unwrap_err();
        assert_eq!(status_text(Err(err)), CONNECTION_ERROR_TEXT);
    }

    #[test]
    fn short_wallet_truncates_to_eight_chars() {
        assert_eq!(short_wallet("5SYktAH1t3ygsxKMQg3r"), "5SYktAH1");
        assert_eq!(short_wallet("abc"), "abc");
        assert_eq!(short_wallet("N/A"), "N/A");
    }

    #[test]
    fn help_lists_every_command() {
        for cmd in ["/start", "/status", "/disconnect", "/waitlist", "/help"] {
            assert!(HELP_TEXT.contains(cmd), "help is missing {cmd}");
        }
    }
}

//! Command handlers module
//!
//! This module contains handlers for all bot commands like /start, /status, etc.

pub mod start;
pub mod help;
pub mod account;
pub mod registration;
pub mod admin;

use teloxide::{Bot, types::{ChatId, Message}, prelude::*, utils::command::BotCommands};
use tracing::{debug, error};
use crate::config::Settings;
use crate::services::ServiceFactory;
use crate::utils::errors::{ErrorSeverity, SeatKeeperError, Result};

/// All available bot commands
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "SeatKeeper commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Link this chat to your parent account: /link CODE")]
    Link(String),
    #[command(description = "List your upcoming registrations")]
    My,
    #[command(description = "Show a registration: /status CODE")]
    Status(String),
    #[command(description = "Cancel a registration: /cancel CODE")]
    Cancel(String),
    #[command(description = "Check a child in (admin only): /checkin CODE")]
    Checkin(String),
    #[command(description = "Change class capacity (admin only): /capacity CLASS_ID N")]
    Capacity(String),
    #[command(description = "Show class seats (admin only): /roster CLASS_ID")]
    Roster(String),
    #[command(description = "Issue a chat link code (admin only): /linkcode PARENT_ID")]
    Linkcode(String),
}

/// Main command dispatcher
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    let chat_id = msg.chat.id;

    let result = match cmd {
        Command::Start => start::handle_start(bot.clone(), msg).await,
        Command::Help => help::handle_help(bot.clone(), msg, &settings).await,
        Command::Link(code) => account::handle_link(bot.clone(), msg, code, &services).await,
        Command::My => account::handle_my(bot.clone(), msg, &services, &settings).await,
        Command::Status(code) => registration::handle_status(bot.clone(), msg, code, &services, &settings).await,
        Command::Cancel(code) => registration::handle_cancel(bot.clone(), msg, code, &services, &settings).await,
        Command::Checkin(code) => admin::handle_checkin(bot.clone(), msg, code, &services, &settings).await,
        Command::Capacity(args) => admin::handle_capacity(bot.clone(), msg, args, &services, &settings).await,
        Command::Roster(args) => admin::handle_roster(bot.clone(), msg, args, &services, &settings).await,
        Command::Linkcode(args) => admin::handle_linkcode(bot.clone(), msg, args, &services, &settings).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => report_failure(&bot, chat_id, e).await,
    }
}

/// Tell the user what went wrong. Business outcomes end here; anything
/// more serious is passed on to the dispatcher.
async fn report_failure(bot: &Bot, chat_id: ChatId, error: SeatKeeperError) -> Result<()> {
    bot.send_message(chat_id, error.user_message()).await?;

    match error.severity() {
        ErrorSeverity::Info | ErrorSeverity::Warning => {
            debug!(chat_id = ?chat_id, error = %error, "Command rejected");
            Ok(())
        }
        severity => {
            error!(chat_id = ?chat_id, severity = %severity, error = %error, "Command failed");
            Err(error)
        }
    }
}

/// Telegram id of the sender
pub(crate) fn sender_id(msg: &Message) -> Result<i64> {
    let user = msg.from.as_ref().ok_or_else(|| {
        SeatKeeperError::InvalidInput("No user in message".to_string())
    })?;
    Ok(user.id.0 as i64)
}

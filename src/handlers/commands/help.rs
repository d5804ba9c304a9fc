//! Help command handler

use teloxide::{Bot, types::Message, prelude::*};
use crate::config::Settings;
use crate::utils::errors::Result;

/// Handle /help command
pub async fn handle_help(bot: Bot, msg: Message, settings: &Settings) -> Result<()> {
    let is_admin = super::sender_id(&msg).map_or(false, |id| settings.is_admin(id));
    bot.send_message(msg.chat.id, help_text(is_admin)).await?;
    Ok(())
}

pub fn help_text(is_admin: bool) -> String {
    let mut text = String::from(
        "🤖 SeatKeeper Help\n\n\
        /start - Start the bot\n\
        /help - Show this help message\n\
        /link CODE - Link this chat to your parent account\n\
        /my - List your upcoming registrations\n\
        /status CODE - Show a registration and its waitlist position\n\
        /cancel CODE - Cancel a registration",
    );

    if is_admin {
        text.push_str(
            "\n\nAdmin:\n\
            /checkin CODE - Check a child in\n\
            /capacity CLASS_ID N - Change class capacity\n\
            /roster CLASS_ID - Show seat usage of a class\n\
            /linkcode PARENT_ID - Issue a chat link code for a parent",
        );
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_commands_only_for_admins() {
        assert!(!help_text(false).contains("/checkin"));
        assert!(help_text(true).contains("/checkin"));
        assert!(help_text(true).contains("/status CODE"));
        assert!(help_text(false).contains("/link CODE"));
        assert!(!help_text(false).contains("/linkcode"));
    }
}

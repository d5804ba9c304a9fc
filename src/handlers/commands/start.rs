//! Start command handler

use teloxide::{Bot, types::Message, prelude::*};
use tracing::info;
use crate::utils::errors::Result;

/// Handle /start command
pub async fn handle_start(bot: Bot, msg: Message) -> Result<()> {
    let chat_id = msg.chat.id;
    let user_id = super::sender_id(&msg).ok();

    let text = "👋 Welcome to SeatKeeper!\n\n\
        You will get a message here when your child is promoted from a class waitlist.\n\
        Ask the class organizer for a link code and send /link CODE to link this chat.\n\n\
        Send /help to see what I can do.";
    bot.send_message(chat_id, text).await?;

    info!(user_id = ?user_id, chat_id = chat_id.0, "User started bot");
    Ok(())
}

//! Telegram delivery of promotion notices
//!
//! Looks up the chat linked to the registration's parent and sends a short
//! HTML message, followed by the QR image of the code when a QR base URL is
//! configured. Parents without a linked chat are skipped.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::FixedOffset;
use teloxide::{Bot, prelude::*, types::{ChatId, InputFile, ParseMode}};
use tracing::{debug, info};
use url::Url;

use crate::database::{EnrollmentStore, PromotionRecipient};
use crate::models::Registration;
use crate::services::notifier::PromotionListener;
use crate::utils::errors::Result;
use crate::utils::helpers::{escape_html, format_local_date};

pub struct TelegramPromotionListener {
    bot: Bot,
    store: Arc<dyn EnrollmentStore>,
    tz: FixedOffset,
    qr_base_url: Option<String>,
}

impl TelegramPromotionListener {
    pub fn new(bot: Bot, store: Arc<dyn EnrollmentStore>, tz: FixedOffset, qr_base_url: Option<String>) -> Self {
        Self {
            bot,
            store,
            tz,
            qr_base_url,
        }
    }

    pub fn promotion_text(&self, registration: &Registration, recipient: &PromotionRecipient) -> String {
        format!(
            "🎉 <b>Promoted from Waitlist</b>\n{} — {} — {}\nCode: <code>{}</code>",
            escape_html(&recipient.child_name),
            escape_html(&recipient.class_name),
            format_local_date(recipient.class_date, &self.tz),
            escape_html(&registration.code)
        )
    }

    /// `{base}/{code}.png`, or `None` when no QR base URL is configured
    pub fn qr_url(&self, code: &str) -> Result<Option<Url>> {
        let Some(base) = self.qr_base_url.as_deref() else {
            return Ok(None);
        };
        let url = Url::parse(&format!(
            "{}/{}.png",
            base.trim_end_matches('/'),
            urlencoding::encode(code)
        ))?;
        Ok(Some(url))
    }
}

#[async_trait]
impl PromotionListener for TelegramPromotionListener {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn on_promoted(&self, registration: &Registration) -> Result<()> {
        let Some(recipient) = self.store.promotion_recipient(registration.id).await? else {
            debug!(registration_id = registration.id, "No linked chat for promoted registration");
            return Ok(());
        };

        let chat_id = ChatId(recipient.chat_id);
        self.bot
            .send_message(chat_id, self.promotion_text(registration, &recipient))
            .parse_mode(ParseMode::Html)
            .await?;

        if let Some(url) = self.qr_url(&registration.code)? {
            self.bot.send_photo(chat_id, InputFile::url(url)).await?;
        }

        info!(
            registration_id = registration.id,
            chat_id = recipient.chat_id,
            "Promotion notice sent"
        );
        Ok(())
    }
}

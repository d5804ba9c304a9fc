//! Parent-facing registration commands

use teloxide::{Bot, types::{Message, ParseMode}, prelude::*};
use tracing::info;
use crate::config::Settings;
use crate::models::RegistrationStatus;
use crate::services::{CancelOutcome, RegistrationOutcome, ServiceFactory};
use crate::utils::errors::{SeatKeeperError, Result};
use crate::utils::helpers::{escape_html, format_local_datetime, normalize_registration_code};
use chrono::FixedOffset;

/// Canonical code from the command argument
pub(crate) fn parse_code(arg: &str, settings: &Settings, usage: &str) -> Result<String> {
    normalize_registration_code(arg, &settings.enrollment.code_prefix).ok_or_else(|| {
        SeatKeeperError::InvalidInput(format!(
            "Please send a valid code, e.g. {} {}-123456",
            usage, settings.enrollment.code_prefix
        ))
    })
}

/// Handle /status CODE
pub async fn handle_status(
    bot: Bot,
    msg: Message,
    arg: String,
    services: &ServiceFactory,
    settings: &Settings,
) -> Result<()> {
    let code = parse_code(&arg, settings, "/status")?;
    let outcome = services.enrollment_service.status_by_code(&code).await?;

    bot.send_message(msg.chat.id, format_status(&outcome, &settings.enrollment.timezone()))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle /cancel CODE
pub async fn handle_cancel(
    bot: Bot,
    msg: Message,
    arg: String,
    services: &ServiceFactory,
    settings: &Settings,
) -> Result<()> {
    let code = parse_code(&arg, settings, "/cancel")?;
    let outcome = services.enrollment_service.cancel_by_code(&code).await?;

    info!(
        user_id = ?super::sender_id(&msg).ok(),
        code = %code,
        already_canceled = outcome.already_canceled,
        "Cancel requested from chat"
    );

    bot.send_message(msg.chat.id, format_cancel(&outcome))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub fn format_status(outcome: &RegistrationOutcome, tz: &FixedOffset) -> String {
    let registration = &outcome.registration;
    let status = match (registration.status, outcome.waitlist_position) {
        (RegistrationStatus::Waitlisted, Some(position)) => format!("WAITLISTED (#{})", position),
        (status, _) => status.as_str().to_ascii_uppercase(),
    };

    let mut text = format!(
        "🎫 Registration <code>{}</code>\nStatus: <b>{}</b>",
        escape_html(&registration.code),
        status
    );
    if let Some(checked_in) = registration.check_in_at {
        text.push_str(&format!("\nChecked in: {}", format_local_datetime(checked_in, tz)));
    }
    text
}

pub fn format_cancel(outcome: &CancelOutcome) -> String {
    let code = escape_html(&outcome.registration.code);
    if outcome.already_canceled {
        format!("Registration <code>{}</code> was already canceled.", code)
    } else {
        format!("❌ Registration <code>{}</code> canceled.", code)
    }
}

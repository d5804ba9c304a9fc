//! Admin command handlers

use teloxide::{Bot, types::{Message, ParseMode}, prelude::*};
use tracing::debug;
use crate::config::Settings;
use crate::models::ClassOccupancy;
use crate::services::ServiceFactory;
use crate::utils::errors::{SeatKeeperError, Result};
use crate::models::LinkCode;
use crate::utils::helpers::{escape_html, format_local_datetime};
use crate::utils::logging::log_admin_action;
use super::registration::parse_code;

/// Sender id if the sender is a configured admin
fn require_admin(msg: &Message, settings: &Settings) -> Result<i64> {
    let user_id = super::sender_id(msg)?;
    if !settings.is_admin(user_id) {
        return Err(SeatKeeperError::PermissionDenied(format!(
            "User {} is not an admin",
            user_id
        )));
    }
    Ok(user_id)
}

/// Handle /checkin CODE
pub async fn handle_checkin(
    bot: Bot,
    msg: Message,
    arg: String,
    services: &ServiceFactory,
    settings: &Settings,
) -> Result<()> {
    let admin_id = require_admin(&msg, settings)?;
    let code = parse_code(&arg, settings, "/checkin")?;

    let registration = services.enrollment_service.check_in(&code).await?;
    log_admin_action(admin_id, "check_in", Some(&code), None);

    bot.send_message(msg.chat.id, format!("✅ Checked in <code>{}</code>", escape_html(&registration.code)))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle /capacity CLASS_ID N
pub async fn handle_capacity(
    bot: Bot,
    msg: Message,
    args: String,
    services: &ServiceFactory,
    settings: &Settings,
) -> Result<()> {
    let admin_id = require_admin(&msg, settings)?;
    let (class_id, capacity) = parse_capacity_args(&args)?;

    let promoted = services.enrollment_service.update_capacity(class_id, capacity).await?;
    log_admin_action(
        admin_id,
        "update_capacity",
        Some(&class_id.to_string()),
        Some(&format!("capacity={} promoted={}", capacity, promoted.len())),
    );

    let text = format!(
        "Capacity of class {} set to {}.\nPromoted from waitlist: {}",
        class_id,
        capacity,
        promoted.len()
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Handle /roster CLASS_ID
pub async fn handle_roster(
    bot: Bot,
    msg: Message,
    args: String,
    services: &ServiceFactory,
    settings: &Settings,
) -> Result<()> {
    require_admin(&msg, settings)?;
    let class_id = parse_class_id(&args)?;

    let occupancy = services.enrollment_service.occupancy(class_id).await?;
    debug!(class_id = class_id, "Roster requested");

    bot.send_message(msg.chat.id, format_roster(&occupancy))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle /linkcode PARENT_ID
pub async fn handle_linkcode(
    bot: Bot,
    msg: Message,
    args: String,
    services: &ServiceFactory,
    settings: &Settings,
) -> Result<()> {
    let admin_id = require_admin(&msg, settings)?;
    let parent_id: i64 = args
        .trim()
        .parse()
        .map_err(|_| SeatKeeperError::InvalidInput("Usage: /linkcode PARENT_ID".to_string()))?;

    let issued = services.account_service.issue_link_code(parent_id).await?;
    log_admin_action(admin_id, "issue_link_code", Some(&parent_id.to_string()), None);

    bot.send_message(msg.chat.id, format_link_code(&issued, settings))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub fn format_link_code(issued: &LinkCode, settings: &Settings) -> String {
    format!(
        "🔗 Link code for parent {}: <code>{}</code>
        Valid until {}. The parent sends /link {} to this bot.",
        issued.parent_id,
        issued.code,
        format_local_datetime(issued.expires_at, &settings.enrollment.timezone()),
        issued.code
    )
}

pub fn parse_class_id(args: &str) -> Result<i64> {
    args.trim()
        .parse()
        .map_err(|_| SeatKeeperError::InvalidInput("Usage: /roster CLASS_ID".to_string()))
}

pub fn parse_capacity_args(args: &str) -> Result<(i64, i32)> {
    let usage = || SeatKeeperError::InvalidInput("Usage: /capacity CLASS_ID CAPACITY".to_string());

    let mut parts = args.split_whitespace();
    let (Some(class_id), Some(capacity), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(usage());
    };

    let class_id = class_id.parse().map_err(|_| usage())?;
    let capacity = capacity.parse().map_err(|_| usage())?;
    Ok((class_id, capacity))
}

pub fn format_roster(occupancy: &ClassOccupancy) -> String {
    format!(
        "📋 <b>{}</b>\n\
        Capacity: {}\n\
        Confirmed: {}\n\
        Checked in: {}\n\
        Waitlisted: {}\n\
        Available: {} ({}% full)",
        escape_html(&occupancy.class_name),
        occupancy.capacity,
        occupancy.confirmed,
        occupancy.checked_in,
        occupancy.waitlisted,
        occupancy.available(),
        occupancy.fill_percent()
    )
}

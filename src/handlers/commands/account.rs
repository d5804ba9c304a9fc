//! Chat linking and the parent's own registration list

use teloxide::{Bot, types::{Message, ParseMode}, prelude::*};
use chrono::FixedOffset;
use crate::config::Settings;
use crate::models::{Parent, ParentRegistration, RegistrationStatus};
use crate::services::ServiceFactory;
use crate::utils::errors::Result;
use crate::utils::helpers::{escape_html, format_local_date};

/// Handle /link CODE
pub async fn handle_link(bot: Bot, msg: Message, arg: String, services: &ServiceFactory) -> Result<()> {
    let parent = services.account_service.link_chat(&arg, msg.chat.id.0).await?;

    bot.send_message(msg.chat.id, format_linked(&parent))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle /my
pub async fn handle_my(bot: Bot, msg: Message, services: &ServiceFactory, settings: &Settings) -> Result<()> {
    let registrations = services.account_service.my_registrations(msg.chat.id.0).await?;

    bot.send_message(msg.chat.id, format_my(&registrations, &settings.enrollment.timezone()))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub fn format_linked(parent: &Parent) -> String {
    format!(
        "✅ Linked to <b>{}</b> ({})\nPromotion notices for your children will arrive here.",
        escape_html(&parent.name),
        escape_html(&parent.phone)
    )
}

pub fn format_my(registrations: &[ParentRegistration], tz: &FixedOffset) -> String {
    if registrations.is_empty() {
        return "No upcoming registrations.".to_string();
    }

    let mut text = String::from("<b>Your upcoming registrations</b>\n");
    for registration in registrations {
        let date = format_local_date(registration.class_date, tz);
        let class = escape_html(&registration.class_name);
        let child = escape_html(&registration.child_name);
        let line = match registration.status {
            RegistrationStatus::Waitlisted => format!("• {} — {} — {} — Waitlist\n", date, class, child),
            _ => format!(
                "• {} — {} — {} — <code>{}</code>\n",
                date,
                class,
                child,
                escape_html(&registration.code)
            ),
        };
        text.push_str(&line);
    }
    text.push_str("\nSend /status CODE to check a registration or /cancel CODE to cancel it.");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn listed(code: &str, status: RegistrationStatus) -> ParentRegistration {
        ParentRegistration {
            registration_id: 1,
            code: code.to_string(),
            status,
            child_name: "Raka".to_string(),
            class_name: "Junior Robotics".to_string(),
            class_date: Utc.with_ymd_and_hms(2030, 8, 3, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_format_my_hides_waitlisted_codes() {
        let tz = FixedOffset::east_opt(7 * 3600).unwrap();
        let text = format_my(
            &[
                listed("REG-000001", RegistrationStatus::Confirmed),
                listed("REG-000002", RegistrationStatus::Waitlisted),
            ],
            &tz,
        );

        assert!(text.contains("Sat, 03 Aug 2030 — Junior Robotics — Raka — <code>REG-000001</code>"));
        assert!(text.contains("Raka — Waitlist"));
        assert!(!text.contains("REG-000002"));
    }

    #[test]
    fn test_format_my_empty() {
        let tz = FixedOffset::east_opt(7 * 3600).unwrap();
        assert_eq!(format_my(&[], &tz), "No upcoming registrations.");
    }

    #[test]
    fn test_format_linked_escapes_name() {
        let now = Utc::now();
        let parent = Parent {
            id: 1,
            name: "Dewi & Budi".to_string(),
            phone: "+628110000001".to_string(),
            email: None,
            created_at: now,
            updated_at: now,
        };
        assert!(format_linked(&parent).contains("<b>Dewi &amp; Budi</b> (+628110000001)"));
    }
}

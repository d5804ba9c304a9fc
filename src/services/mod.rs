//! Services module
//!
//! This module contains business logic services

pub mod account;
pub mod conflict;
pub mod rebalance;
pub mod notifier;
pub mod enrollment;
pub mod telegram;

// Re-export commonly used services
pub use account::AccountService;
pub use conflict::{check_conflicts_in, detect_conflict};
pub use rebalance::{plan_rebalance, rebalance_in, RebalancePlan, StatusChange};
pub use notifier::{NotificationReport, PromotionListener, PromotionNotifier};
pub use enrollment::{CancelOutcome, EnrollmentService, RegistrationOutcome};
pub use telegram::TelegramPromotionListener;

use std::sync::Arc;

use teloxide::Bot;

use crate::config::settings::Settings;
use crate::database::EnrollmentStore;

/// Service factory for creating and wiring all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub enrollment_service: EnrollmentService,
    pub account_service: AccountService,
}

impl ServiceFactory {
    /// Wire the enrollment service with Telegram promotion delivery
    pub fn new(bot: Bot, settings: &Settings, store: Arc<dyn EnrollmentStore>) -> Self {
        let telegram = TelegramPromotionListener::new(
            bot,
            store.clone(),
            settings.enrollment.timezone(),
            settings.bot.qr_base_url.clone(),
        );
        let notifier = PromotionNotifier::new().with_listener(Arc::new(telegram));

        Self::with_notifier(settings, store, notifier)
    }

    /// Wire the enrollment service with an explicit notifier
    pub fn with_notifier(settings: &Settings, store: Arc<dyn EnrollmentStore>, notifier: PromotionNotifier) -> Self {
        let account_service = AccountService::new(store.clone(), settings.enrollment.clone());
        let enrollment_service = EnrollmentService::new(store, notifier, settings.enrollment.clone());
        Self {
            enrollment_service,
            account_service,
        }
    }
}

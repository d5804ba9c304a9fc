//! Promotion notifier
//!
//! Fans promoted registrations out to the registered listeners once the
//! rebalancing transaction has committed. Listener failures are logged and
//! dropped; they never reach the caller of the enrollment operation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::models::Registration;
use crate::utils::errors::Result;
use crate::utils::logging::log_notification_failure;

/// Receives one call per promoted registration
#[async_trait]
pub trait PromotionListener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn on_promoted(&self, registration: &Registration) -> Result<()>;
}

/// Outcome of one notification batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationReport {
    pub delivered: usize,
    pub failed: usize,
}

impl NotificationReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

#[derive(Clone, Default)]
pub struct PromotionNotifier {
    listeners: Vec<Arc<dyn PromotionListener>>,
}

impl PromotionNotifier {
    /// Notifier with no listeners; every batch is a silent no-op
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn PromotionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Invoke every listener once for every promoted registration.
    ///
    /// Must only be called after the transaction that produced `promoted`
    /// has committed.
    pub async fn notify(&self, promoted: &[Registration]) -> NotificationReport {
        let mut report = NotificationReport::default();
        if promoted.is_empty() || self.listeners.is_empty() {
            return report;
        }

        debug!(
            promotions = promoted.len(),
            listeners = self.listeners.len(),
            "Dispatching promotion notifications"
        );

        for registration in promoted {
            for listener in &self.listeners {
                match listener.on_promoted(registration).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        report.failed += 1;
                        log_notification_failure(listener.name(), registration.id, &e.to_string());
                    }
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            "Promotion notifications dispatched"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::Mutex;

    use crate::models::RegistrationStatus;
    use crate::utils::errors::SeatKeeperError;

    #[derive(Default)]
    struct RecordingListener {
        seen: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl PromotionListener for RecordingListener {
        fn name(&self) -> &str {
            "recording"
        }

        async fn on_promoted(&self, registration: &Registration) -> Result<()> {
            self.seen.lock().await.push(registration.id);
            Ok(())
        }
    }

    struct FailingListener;

    #[async_trait]
    impl PromotionListener for FailingListener {
        fn name(&self) -> &str {
            "failing"
        }

        async fn on_promoted(&self, _registration: &Registration) -> Result<()> {
            Err(SeatKeeperError::Storage("chat unreachable".to_string()))
        }
    }

    fn promoted(id: i64) -> Registration {
        let now = Utc::now();
        Registration {
            id,
            parent_id: 1,
            child_id: id,
            class_id: 1,
            status: RegistrationStatus::Confirmed,
            code: format!("REG-{:06}", id),
            check_in_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_no_listeners_is_silent() {
        let report = PromotionNotifier::new().notify(&[promoted(1)]).await;
        assert_eq!(report, NotificationReport::default());
    }

    #[tokio::test]
    async fn test_each_promotion_delivered_once() {
        let recorder = Arc::new(RecordingListener::default());
        let notifier = PromotionNotifier::new().with_listener(recorder.clone());

        let report = notifier.notify(&[promoted(3), promoted(4)]).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(*recorder.seen.lock().await, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_listeners() {
        let recorder = Arc::new(RecordingListener::default());
        let notifier = PromotionNotifier::new()
            .with_listener(Arc::new(FailingListener))
            .with_listener(recorder.clone());

        let report = notifier.notify(&[promoted(5)]).await;

        assert_eq!(report, NotificationReport { delivered: 1, failed: 1 });
        assert_eq!(report.attempted(), 2);
        assert_eq!(*recorder.seen.lock().await, vec![5]);
    }
}

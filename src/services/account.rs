//! Parent accounts and Telegram chat linking
//!
//! An admin issues a short-lived six-digit code for a parent; the parent
//! sends `/link CODE` from the chat that should receive promotion notices.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, instrument};

use crate::config::EnrollmentConfig;
use crate::database::EnrollmentStore;
use crate::models::{LinkCode, Parent, ParentRegistration};
use crate::utils::errors::{SeatKeeperError, Result};
use crate::utils::helpers::{generate_link_code, normalize_link_code};
use crate::utils::logging::log_chat_linked;

/// Classes that started this long ago still show up in `/my`
pub const RECENT_CLASS_GRACE_HOURS: i64 = 2;

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn EnrollmentStore>,
    config: EnrollmentConfig,
}

impl AccountService {
    pub fn new(store: Arc<dyn EnrollmentStore>, config: EnrollmentConfig) -> Self {
        Self { store, config }
    }

    /// Issue a fresh link code for the parent
    #[instrument(skip(self))]
    pub async fn issue_link_code(&self, parent_id: i64) -> Result<LinkCode> {
        if self.store.find_parent(parent_id).await?.is_none() {
            return Err(SeatKeeperError::ParentNotFound { parent_id });
        }

        let expires_at = Utc::now() + Duration::minutes(self.config.link_code_ttl_minutes);
        let attempts = self.config.code_attempts.max(1);
        for attempt in 1..=attempts {
            let code = generate_link_code();
            if let Some(created) = self.store.create_link_code(parent_id, &code, expires_at).await? {
                debug!(parent_id = parent_id, expires_at = %expires_at, "Link code issued");
                return Ok(created);
            }
            debug!(attempt = attempt, "Link code already taken");
        }
        Err(SeatKeeperError::CodeGenerationExhausted { attempts })
    }

    /// Link the chat to the parent owning the typed code
    #[instrument(skip(self, input))]
    pub async fn link_chat(&self, input: &str, chat_id: i64) -> Result<Parent> {
        let code = normalize_link_code(input).ok_or_else(|| {
            SeatKeeperError::InvalidInput("Use: /link 123456 with the code from the class organizer.".to_string())
        })?;

        let parent = self
            .store
            .redeem_link_code(&code, chat_id, Utc::now())
            .await?
            .ok_or(SeatKeeperError::LinkCodeInvalid)?;

        log_chat_linked(parent.id, chat_id);
        Ok(parent)
    }

    /// Upcoming registrations of the parent linked to the chat
    pub async fn my_registrations(&self, chat_id: i64) -> Result<Vec<ParentRegistration>> {
        let parent_id = self
            .store
            .linked_parent(chat_id)
            .await?
            .ok_or(SeatKeeperError::ChatNotLinked { chat_id })?;

        let since = Utc::now() - Duration::hours(RECENT_CLASS_GRACE_HOURS);
        self.store.parent_registrations(parent_id, since).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use crate::database::MemoryEnrollmentStore;

    async fn service_with_parent() -> (MemoryEnrollmentStore, AccountService) {
        let store = MemoryEnrollmentStore::new();
        let now = Utc::now();
        store
            .add_parent(Parent {
                id: 7,
                name: "Dewi".to_string(),
                phone: "+628110000007".to_string(),
                email: None,
                created_at: now,
                updated_at: now,
            })
            .await;
        let service = AccountService::new(Arc::new(store.clone()), EnrollmentConfig::default());
        (store, service)
    }

    #[tokio::test]
    async fn test_issue_then_link() {
        let (store, service) = service_with_parent().await;

        let issued = service.issue_link_code(7).await.unwrap();
        assert_eq!(issued.code.len(), 6);
        assert!(issued.expires_at > Utc::now() + Duration::minutes(9));

        let spaced = format!("{} {}", &issued.code[..3], &issued.code[3..]);
        let parent = service.link_chat(&spaced, 555).await.unwrap();

        assert_eq!(parent.id, 7);
        assert_eq!(store.linked_parent(555).await.unwrap(), Some(7));
        assert!(store.link_code(&issued.code).await.unwrap().used_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_parent_gets_no_code() {
        let (_, service) = service_with_parent().await;
        assert_matches!(
            service.issue_link_code(8).await,
            Err(SeatKeeperError::ParentNotFound { parent_id: 8 })
        );
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_codes() {
        let (_, service) = service_with_parent().await;
        assert_matches!(service.link_chat("abc", 555).await, Err(SeatKeeperError::InvalidInput(_)));
        assert_matches!(service.link_chat("000000", 555).await, Err(SeatKeeperError::LinkCodeInvalid));
    }

    #[tokio::test]
    async fn test_unlinked_chat_has_no_registrations() {
        let (_, service) = service_with_parent().await;
        assert_matches!(
            service.my_registrations(999).await,
            Err(SeatKeeperError::ChatNotLinked { chat_id: 999 })
        );
    }
}

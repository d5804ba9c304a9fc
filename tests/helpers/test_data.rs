//! Test data builders
//!
//! Builders for classes, children and registrations plus a ready-to-use
//! in-memory enrollment fixture with a recording promotion listener.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use tokio::sync::Mutex;

use SeatKeeper::config::EnrollmentConfig;
use SeatKeeper::database::MemoryEnrollmentStore;
use SeatKeeper::models::{Child, Class, CreateRegistrationRequest, Parent, Registration, RegistrationStatus};
use SeatKeeper::services::{AccountService, EnrollmentService, PromotionListener, PromotionNotifier};
use SeatKeeper::utils::errors::{SeatKeeperError, Result};

pub fn jakarta() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap()
}

/// Instant of a local Jakarta wall-clock time
pub fn local_time(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    jakarta()
        .with_ymd_and_hms(year, month, day, hour, 0, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn test_class(id: i64, capacity: i32, class_date: DateTime<Utc>) -> Class {
    let now = Utc::now();
    Class {
        id,
        name: format!("Class {}", id),
        class_date,
        capacity,
        signup_opens_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_parent(id: i64) -> Parent {
    let now = Utc::now();
    Parent {
        id,
        name: format!("Parent {}", id),
        phone: format!("+62811{:07}", id),
        email: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_child(id: i64, parent_id: i64) -> Child {
    Child {
        id,
        parent_id,
        name: format!("Child {}", id),
        created_at: Utc::now(),
    }
}

/// Registration stored as-is, bypassing the enrollment rules
pub fn seeded_registration(
    id: i64,
    class_id: i64,
    status: RegistrationStatus,
    created_minutes_ago: i64,
    checked_in: bool,
) -> Registration {
    let created_at = Utc::now() - Duration::minutes(created_minutes_ago);
    Registration {
        id,
        parent_id: id,
        child_id: id,
        class_id,
        status,
        code: format!("REG-{:06}", 900_000 + id),
        check_in_at: checked_in.then(Utc::now),
        created_at,
        updated_at: created_at,
    }
}

/// Listener that remembers every promotion it sees
#[derive(Default)]
pub struct RecordingListener {
    promoted: Mutex<Vec<Registration>>,
}

impl RecordingListener {
    pub async fn promoted_ids(&self) -> Vec<i64> {
        self.promoted.lock().await.iter().map(|r| r.id).collect()
    }

    pub async fn count(&self) -> usize {
        self.promoted.lock().await.len()
    }
}

#[async_trait]
impl PromotionListener for RecordingListener {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_promoted(&self, registration: &Registration) -> Result<()> {
        self.promoted.lock().await.push(registration.clone());
        Ok(())
    }
}

/// Listener whose delivery always fails
pub struct FailingListener;

#[async_trait]
impl PromotionListener for FailingListener {
    fn name(&self) -> &str {
        "failing"
    }

    async fn on_promoted(&self, _registration: &Registration) -> Result<()> {
        Err(SeatKeeperError::Storage("messaging channel unreachable".to_string()))
    }
}

/// In-memory store with one class and a pool of families.
/// Child `n` belongs to parent `100 + n`.
pub struct EnrollmentFixture {
    pub store: MemoryEnrollmentStore,
    pub service: EnrollmentService,
    pub accounts: AccountService,
    pub recorder: Arc<RecordingListener>,
    pub class_id: i64,
}

impl EnrollmentFixture {
    pub async fn new(capacity: i32) -> Self {
        Self::with_notifier(capacity, |notifier| notifier).await
    }

    /// Fixture whose notifier gets extra listeners on top of the recorder
    pub async fn with_notifier<F>(capacity: i32, extend: F) -> Self
    where
        F: FnOnce(PromotionNotifier) -> PromotionNotifier,
    {
        let store = MemoryEnrollmentStore::new();
        store
            .add_class(test_class(1, capacity, local_time(2030, 7, 6, 9)))
            .await;
        for id in 1..=30 {
            store.add_parent(test_parent(100 + id)).await;
            store.add_child(test_child(id, 100 + id)).await;
        }

        let recorder = Arc::new(RecordingListener::default());
        let notifier = extend(PromotionNotifier::new().with_listener(recorder.clone()));
        let service = EnrollmentService::new(Arc::new(store.clone()), notifier, EnrollmentConfig::default());
        let accounts = AccountService::new(Arc::new(store.clone()), EnrollmentConfig::default());

        Self {
            store,
            service,
            accounts,
            recorder,
            class_id: 1,
        }
    }

    pub async fn register(&self, child_id: i64) -> Registration {
        self.service
            .create_registration(CreateRegistrationRequest {
                child_id,
                class_id: self.class_id,
            })
            .await
            .expect("registration succeeds")
            .registration
    }

    /// Issue a link code for the parent and redeem it from `chat_id`
    pub async fn link(&self, parent_id: i64, chat_id: i64) -> Parent {
        let issued = self
            .accounts
            .issue_link_code(parent_id)
            .await
            .expect("link code issued");
        self.accounts
            .link_chat(&issued.code, chat_id)
            .await
            .expect("chat linked")
    }

    pub async fn status_of(&self, registration_id: i64) -> RegistrationStatus {
        self.store
            .registration(registration_id)
            .await
            .expect("registration exists")
            .status
    }

    pub async fn confirmed_count(&self) -> usize {
        self.store
            .class_registrations(self.class_id)
            .await
            .iter()
            .filter(|r| r.status == RegistrationStatus::Confirmed)
            .count()
    }
}

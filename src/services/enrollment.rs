//! Enrollment service
//!
//! Entry points that mutate registrations. Each one runs in a single store
//! transaction that takes the class lock before touching registrations,
//! rebalances the class before committing and hands the promotions to the
//! notifier only after the commit succeeded.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::config::EnrollmentConfig;
use crate::database::{EnrollmentStore, EnrollmentTx};
use crate::models::{
    ClassOccupancy, CreateRegistrationRequest, NewRegistration, Registration, RegistrationStatus,
};
use crate::services::conflict::check_conflicts_in;
use crate::services::notifier::PromotionNotifier;
use crate::services::rebalance::rebalance_in;
use crate::utils::errors::{SeatKeeperError, Result};
use crate::utils::helpers::generate_registration_code;
use crate::utils::logging::log_enrollment_action;

/// A registration together with its place in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub registration: Registration,
    /// 1-based rank among the waitlisted registrations of the class;
    /// `None` unless the registration is waitlisted
    pub waitlist_position: Option<usize>,
}

impl RegistrationOutcome {
    pub fn is_confirmed(&self) -> bool {
        self.registration.status == RegistrationStatus::Confirmed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    /// The registration as stored after the call
    pub registration: Registration,
    /// The registration was canceled before this call; nothing was written
    pub already_canceled: bool,
    /// Registrations promoted by the rebalance that followed the cancel
    pub promoted: Vec<Registration>,
}

#[derive(Clone)]
pub struct EnrollmentService {
    store: Arc<dyn EnrollmentStore>,
    notifier: PromotionNotifier,
    config: EnrollmentConfig,
}

impl EnrollmentService {
    pub fn new(store: Arc<dyn EnrollmentStore>, notifier: PromotionNotifier, config: EnrollmentConfig) -> Self {
        Self { store, notifier, config }
    }

    pub fn store(&self) -> &Arc<dyn EnrollmentStore> {
        &self.store
    }

    pub fn config(&self) -> &EnrollmentConfig {
        &self.config
    }

    /// Reject a prospective registration that would duplicate or collide
    /// with the child's existing bookings. Read-only.
    pub async fn check_conflicts(&self, child_id: i64, class_id: i64) -> Result<()> {
        let mut tx = self.store.begin().await?;
        check_conflicts_in(tx.as_mut(), child_id, class_id, &self.config.timezone()).await
    }

    /// Recompute the seat assignment of a class in its own transaction
    #[instrument(skip(self))]
    pub async fn rebalance(&self, class_id: i64) -> Result<Vec<Registration>> {
        let mut tx = self.store.begin().await?;
        let promoted = rebalance_in(tx.as_mut(), class_id).await?;
        tx.commit().await?;

        self.notifier.notify(&promoted).await;
        Ok(promoted)
    }

    /// Register a child for a class.
    ///
    /// The new row starts confirmed when a seat is free at insert time and
    /// waitlisted otherwise; the rebalance that follows settles races.
    #[instrument(skip(self), fields(child_id = request.child_id, class_id = request.class_id))]
    pub async fn create_registration(&self, request: CreateRegistrationRequest) -> Result<RegistrationOutcome> {
        let CreateRegistrationRequest { child_id, class_id } = request;
        let mut tx = self.store.begin().await?;

        let class = tx
            .lock_class(class_id)
            .await?
            .ok_or(SeatKeeperError::ClassNotFound { class_id })?;
        let child = tx
            .find_child(child_id)
            .await?
            .ok_or(SeatKeeperError::ChildNotFound { child_id })?;

        if !class.is_signup_open(Utc::now()) {
            if let Some(opens_at) = class.signup_opens_at {
                return Err(SeatKeeperError::SignupNotOpen { class_id, opens_at });
            }
        }

        check_conflicts_in(tx.as_mut(), child_id, class_id, &self.config.timezone()).await?;

        let confirmed = tx.count_confirmed(class_id).await?;
        let status = if confirmed < i64::from(class.capacity) {
            RegistrationStatus::Confirmed
        } else {
            RegistrationStatus::Waitlisted
        };

        let code = self.unique_code(tx.as_mut()).await?;
        let inserted = tx
            .insert_registration(NewRegistration {
                parent_id: child.parent_id,
                child_id,
                class_id,
                status,
                code,
            })
            .await?;

        let promoted = rebalance_in(tx.as_mut(), class_id).await?;

        let registration = tx
            .find_registration(inserted.id)
            .await?
            .ok_or(SeatKeeperError::RegistrationIdNotFound { registration_id: inserted.id })?;
        let waitlist_position = waitlist_position_in(tx.as_mut(), &registration).await?;

        tx.commit().await?;

        log_enrollment_action("create", registration.id, class_id, Some(registration.status.as_str()));
        self.notifier.notify(&promoted).await;

        Ok(RegistrationOutcome {
            registration,
            waitlist_position,
        })
    }

    /// Cancel the registration with `code` and hand its seat on.
    ///
    /// Canceling an already canceled registration writes nothing and
    /// promotes no one.
    #[instrument(skip(self))]
    pub async fn cancel_by_code(&self, code: &str) -> Result<CancelOutcome> {
        let code = code.trim();
        let mut tx = self.store.begin().await?;

        let found = tx
            .find_registration_by_code(code)
            .await?
            .ok_or_else(|| SeatKeeperError::RegistrationNotFound { code: code.to_string() })?;

        self.cancel_located(tx, found).await
    }

    /// Admin variant of [`Self::cancel_by_code`] keyed by registration id
    #[instrument(skip(self))]
    pub async fn cancel_registration(&self, registration_id: i64) -> Result<CancelOutcome> {
        let mut tx = self.store.begin().await?;

        let found = tx
            .find_registration(registration_id)
            .await?
            .ok_or(SeatKeeperError::RegistrationIdNotFound { registration_id })?;

        self.cancel_located(tx, found).await
    }

    async fn cancel_located(&self, mut tx: Box<dyn EnrollmentTx>, found: Registration) -> Result<CancelOutcome> {
        if found.status == RegistrationStatus::Canceled {
            debug!(registration_id = found.id, "Registration already canceled");
            return Ok(CancelOutcome {
                registration: found,
                already_canceled: true,
                promoted: Vec::new(),
            });
        }

        tx.lock_class(found.class_id)
            .await?
            .ok_or(SeatKeeperError::ClassNotFound { class_id: found.class_id })?;

        // Another writer may have canceled it before the lock was granted
        let current = tx
            .find_registration(found.id)
            .await?
            .ok_or(SeatKeeperError::RegistrationIdNotFound { registration_id: found.id })?;
        if current.status == RegistrationStatus::Canceled {
            return Ok(CancelOutcome {
                registration: current,
                already_canceled: true,
                promoted: Vec::new(),
            });
        }

        tx.mark_canceled(current.id).await?;
        let promoted = rebalance_in(tx.as_mut(), current.class_id).await?;
        let registration = tx
            .find_registration(current.id)
            .await?
            .ok_or(SeatKeeperError::RegistrationIdNotFound { registration_id: current.id })?;

        tx.commit().await?;

        log_enrollment_action(
            "cancel",
            registration.id,
            registration.class_id,
            Some(&format!("promoted={}", promoted.len())),
        );
        self.notifier.notify(&promoted).await;

        Ok(CancelOutcome {
            registration,
            already_canceled: false,
            promoted,
        })
    }

    /// Change a class's capacity and rebalance it in the same transaction
    #[instrument(skip(self))]
    pub async fn update_capacity(&self, class_id: i64, capacity: i32) -> Result<Vec<Registration>> {
        if capacity < 0 {
            return Err(SeatKeeperError::InvalidInput(format!(
                "Capacity must not be negative, got {}",
                capacity
            )));
        }

        let mut tx = self.store.begin().await?;
        tx.lock_class(class_id)
            .await?
            .ok_or(SeatKeeperError::ClassNotFound { class_id })?;

        tx.update_capacity(class_id, capacity).await?;
        let promoted = rebalance_in(tx.as_mut(), class_id).await?;
        tx.commit().await?;

        info!(class_id = class_id, capacity = capacity, promoted = promoted.len(), "Class capacity updated");
        self.notifier.notify(&promoted).await;
        Ok(promoted)
    }

    /// Record the physical arrival of a confirmed registrant
    #[instrument(skip(self))]
    pub async fn check_in(&self, code: &str) -> Result<Registration> {
        let code = code.trim();
        let mut tx = self.store.begin().await?;

        let found = tx
            .find_registration_by_code(code)
            .await?
            .ok_or_else(|| SeatKeeperError::RegistrationNotFound { code: code.to_string() })?;

        tx.lock_class(found.class_id)
            .await?
            .ok_or(SeatKeeperError::ClassNotFound { class_id: found.class_id })?;
        let current = tx
            .find_registration(found.id)
            .await?
            .ok_or(SeatKeeperError::RegistrationIdNotFound { registration_id: found.id })?;

        if current.status != RegistrationStatus::Confirmed {
            return Err(SeatKeeperError::InvalidStateTransition {
                from: current.status,
                to: "checked_in".to_string(),
            });
        }
        if current.is_anchored() {
            return Err(SeatKeeperError::AlreadyCheckedIn { code: current.code });
        }

        let now = Utc::now();
        tx.set_check_in(current.id, now).await?;
        tx.commit().await?;

        log_enrollment_action("check_in", current.id, current.class_id, None);
        Ok(Registration {
            check_in_at: Some(now),
            updated_at: now,
            ..current
        })
    }

    /// Remove a registration row entirely and rebalance its class
    #[instrument(skip(self))]
    pub async fn delete_registration(&self, registration_id: i64) -> Result<Vec<Registration>> {
        let mut tx = self.store.begin().await?;

        let found = tx
            .find_registration(registration_id)
            .await?
            .ok_or(SeatKeeperError::RegistrationIdNotFound { registration_id })?;
        tx.lock_class(found.class_id)
            .await?
            .ok_or(SeatKeeperError::ClassNotFound { class_id: found.class_id })?;

        tx.delete_registration(registration_id).await?;
        let promoted = rebalance_in(tx.as_mut(), found.class_id).await?;
        tx.commit().await?;

        log_enrollment_action("delete", registration_id, found.class_id, None);
        self.notifier.notify(&promoted).await;
        Ok(promoted)
    }

    pub async fn occupancy(&self, class_id: i64) -> Result<ClassOccupancy> {
        let mut tx = self.store.begin().await?;
        tx.occupancy(class_id)
            .await?
            .ok_or(SeatKeeperError::ClassNotFound { class_id })
    }

    /// Registration with its current waitlist rank
    pub async fn status_by_code(&self, code: &str) -> Result<RegistrationOutcome> {
        let code = code.trim();
        let mut tx = self.store.begin().await?;
        let registration = tx
            .find_registration_by_code(code)
            .await?
            .ok_or_else(|| SeatKeeperError::RegistrationNotFound { code: code.to_string() })?;
        let waitlist_position = waitlist_position_in(tx.as_mut(), &registration).await?;

        Ok(RegistrationOutcome {
            registration,
            waitlist_position,
        })
    }

    async fn unique_code(&self, tx: &mut dyn EnrollmentTx) -> Result<String> {
        let attempts = self.config.code_attempts.max(1);
        for attempt in 1..=attempts {
            let code = generate_registration_code(&self.config.code_prefix);
            if !tx.code_exists(&code).await? {
                return Ok(code);
            }
            debug!(attempt = attempt, code = %code, "Registration code already taken");
        }
        Err(SeatKeeperError::CodeGenerationExhausted { attempts })
    }
}

async fn waitlist_position_in(tx: &mut dyn EnrollmentTx, registration: &Registration) -> Result<Option<usize>> {
    if registration.status != RegistrationStatus::Waitlisted {
        return Ok(None);
    }

    let active = tx.active_registrations(registration.class_id).await?;
    Ok(active
        .iter()
        .filter(|r| r.status == RegistrationStatus::Waitlisted)
        .position(|r| r.id == registration.id)
        .map(|index| index + 1))
}

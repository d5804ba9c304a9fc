//! Capacity rebalancer
//!
//! Recomputes which active registrations of a class hold confirmed seats.
//! Checked-in registrations are anchored: they are always confirmed and
//! consume seats first, even beyond capacity. Everyone else is seated in
//! FIFO order (creation time, then id) until the seats run out and is
//! waitlisted after that.
//!
//! [`plan_rebalance`] is the pure decision step; [`rebalance_in`] applies it
//! inside an open transaction and reports the promotions. Notifying about
//! those promotions is the caller's job and must wait for the commit.

use tracing::debug;

use crate::database::EnrollmentTx;
use crate::models::{Registration, RegistrationStatus};
use crate::utils::errors::{SeatKeeperError, Result};
use crate::utils::logging::log_rebalance;

/// One status write the rebalancer wants to make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub registration_id: i64,
    pub from: RegistrationStatus,
    pub to: RegistrationStatus,
}

impl StatusChange {
    pub fn is_promotion(&self) -> bool {
        self.from == RegistrationStatus::Waitlisted && self.to == RegistrationStatus::Confirmed
    }

    pub fn is_demotion(&self) -> bool {
        self.from == RegistrationStatus::Confirmed && self.to == RegistrationStatus::Waitlisted
    }
}

/// Target seat assignment of one class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalancePlan {
    /// Every active registration with its target status, anchored first,
    /// then in FIFO order
    pub assignments: Vec<(i64, RegistrationStatus)>,
    /// Only the assignments that differ from what is stored
    pub changes: Vec<StatusChange>,
    pub anchored: usize,
}

impl RebalancePlan {
    pub fn confirmed_count(&self) -> usize {
        self.assignments
            .iter()
            .filter(|(_, status)| *status == RegistrationStatus::Confirmed)
            .count()
    }

    pub fn waitlisted_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.assignments
            .iter()
            .filter(|(_, status)| *status == RegistrationStatus::Waitlisted)
            .map(|(id, _)| *id)
    }

    pub fn promotions(&self) -> impl Iterator<Item = &StatusChange> {
        self.changes.iter().filter(|c| c.is_promotion())
    }

    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Decide the seat assignment for a class.
///
/// Canceled entries in `registrations` are ignored. The result does not
/// depend on the input order.
pub fn plan_rebalance(capacity: i32, registrations: &[Registration]) -> RebalancePlan {
    let seats = capacity.max(0) as usize;

    let mut ordered: Vec<&Registration> = registrations
        .iter()
        .filter(|r| r.status.is_active())
        .collect();
    // Anchored first; FIFO inside both groups keeps the output deterministic
    ordered.sort_by_key(|r| (!r.is_anchored(), r.fifo_key()));

    let mut plan = RebalancePlan::default();
    let mut confirmed = 0usize;

    for registration in ordered {
        let target = if registration.is_anchored() {
            plan.anchored += 1;
            RegistrationStatus::Confirmed
        } else if confirmed < seats {
            RegistrationStatus::Confirmed
        } else {
            RegistrationStatus::Waitlisted
        };

        if target == RegistrationStatus::Confirmed {
            confirmed += 1;
        }

        plan.assignments.push((registration.id, target));
        if registration.status != target {
            plan.changes.push(StatusChange {
                registration_id: registration.id,
                from: registration.status,
                to: target,
            });
        }
    }

    plan
}

/// Rebalance a class inside `tx` and return the promoted registrations with
/// their new status.
///
/// Takes the class lock first. Any storage error aborts; the caller drops
/// the transaction so nothing partial is committed.
pub async fn rebalance_in(tx: &mut dyn EnrollmentTx, class_id: i64) -> Result<Vec<Registration>> {
    let class = tx
        .lock_class(class_id)
        .await?
        .ok_or(SeatKeeperError::ClassNotFound { class_id })?;

    let active = tx.active_registrations(class_id).await?;
    let plan = plan_rebalance(class.capacity, &active);

    if plan.anchored > class.seat_budget() {
        debug!(
            class_id = class_id,
            capacity = class.capacity,
            anchored = plan.anchored,
            "Checked-in registrations exceed capacity"
        );
    }

    let mut promoted = Vec::new();
    for change in &plan.changes {
        tx.set_status(change.registration_id, change.to).await?;

        if change.is_promotion() {
            if let Some(registration) = active.iter().find(|r| r.id == change.registration_id) {
                promoted.push(Registration {
                    status: change.to,
                    ..registration.clone()
                });
            }
        }
    }

    let demoted = plan.changes.iter().filter(|c| c.is_demotion()).count();
    log_rebalance(class_id, plan.changes.len(), promoted.len(), demoted);

    Ok(promoted)
}

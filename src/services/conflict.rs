//! Registration conflict checks
//!
//! A child may hold at most one active registration per class and at most
//! one active class per local calendar day.

use chrono::FixedOffset;

use crate::database::{ChildBooking, EnrollmentTx};
use crate::models::Class;
use crate::utils::errors::{SeatKeeperError, Result};
use crate::utils::helpers::{local_day_bounds, same_local_day};

/// Find the first booking that clashes with `target` for `child_id`.
///
/// `bookings` are the child's active registrations; the duplicate rule wins
/// over the same-day rule.
pub fn detect_conflict(
    child_id: i64,
    target: &Class,
    bookings: &[ChildBooking],
    tz: &FixedOffset,
) -> Option<SeatKeeperError> {
    if bookings.iter().any(|b| b.class_id == target.id && b.status.is_active()) {
        return Some(SeatKeeperError::DuplicateRegistration {
            child_id,
            class_id: target.id,
        });
    }

    bookings
        .iter()
        .filter(|b| b.status.is_active() && b.class_id != target.id)
        .find(|b| same_local_day(b.class_date, target.class_date, tz))
        .map(|b| SeatKeeperError::SameDayConflict {
            child_id,
            class_id: target.id,
            conflicting_class_id: b.class_id,
        })
}

/// Check a prospective registration against the child's current bookings
/// inside an open transaction. Has no side effects.
pub async fn check_conflicts_in(
    tx: &mut dyn EnrollmentTx,
    child_id: i64,
    class_id: i64,
    tz: &FixedOffset,
) -> Result<()> {
    let class = tx
        .find_class(class_id)
        .await?
        .ok_or(SeatKeeperError::ClassNotFound { class_id })?;

    if tx.has_active_registration(child_id, class_id).await? {
        return Err(SeatKeeperError::DuplicateRegistration { child_id, class_id });
    }

    let (from, to) = local_day_bounds(class.class_date, tz);
    let bookings = tx.child_bookings_between(child_id, from, to).await?;

    match detect_conflict(child_id, &class, &bookings, tz) {
        Some(conflict) => Err(conflict),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::database::{EnrollmentStore, MemoryEnrollmentStore};
    use crate::models::{Child, Registration, RegistrationStatus};

    fn jakarta() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn local(day: u32, hour: u32) -> DateTime<Utc> {
        jakarta()
            .with_ymd_and_hms(2025, 3, day, hour, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn class(id: i64, class_date: DateTime<Utc>) -> Class {
        Class {
            id,
            name: format!("Class {}", id),
            class_date,
            capacity: 5,
            signup_opens_at: None,
            created_at: class_date,
            updated_at: class_date,
        }
    }

    fn booking(class_id: i64, class_date: DateTime<Utc>, status: RegistrationStatus) -> ChildBooking {
        ChildBooking {
            registration_id: class_id * 10,
            class_id,
            class_date,
            status,
        }
    }

    async fn store_with(classes: &[Class], held: &[(i64, RegistrationStatus)]) -> MemoryEnrollmentStore {
        let store = MemoryEnrollmentStore::new();
        for class in classes {
            store.add_class(class.clone()).await;
        }
        store
            .add_child(Child { id: 1, parent_id: 1, name: "Ayu".to_string(), created_at: Utc::now() })
            .await;
        for (i, (class_id, status)) in held.iter().enumerate() {
            let now = Utc::now();
            store
                .seed_registration(Registration {
                    id: i as i64 + 1,
                    parent_id: 1,
                    child_id: 1,
                    class_id: *class_id,
                    status: *status,
                    code: format!("REG-{:06}", i + 1),
                    check_in_at: None,
                    created_at: now,
                    updated_at: now,
                })
                .await;
        }
        store
    }

    #[test]
    fn test_no_bookings_no_conflict() {
        assert!(detect_conflict(1, &class(1, local(10, 9)), &[], &jakarta()).is_none());
    }

    #[test]
    fn test_duplicate_wins_over_same_day() {
        let target = class(1, local(10, 9));
        let bookings = vec![
            booking(2, local(10, 15), RegistrationStatus::Confirmed),
            booking(1, local(10, 9), RegistrationStatus::Waitlisted),
        ];
        assert_matches!(
            detect_conflict(7, &target, &bookings, &jakarta()),
            Some(SeatKeeperError::DuplicateRegistration { child_id: 7, class_id: 1 })
        );
    }

    #[test]
    fn test_canceled_bookings_do_not_conflict() {
        let target = class(1, local(10, 9));
        let bookings = vec![
            booking(1, local(10, 9), RegistrationStatus::Canceled),
            booking(2, local(10, 15), RegistrationStatus::Canceled),
        ];
        assert!(detect_conflict(7, &target, &bookings, &jakarta()).is_none());
    }

    #[test]
    fn test_same_local_day_across_utc_dates() {
        // 01:00 local is still the previous day in UTC
        let target = class(1, local(10, 1));
        let bookings = vec![booking(2, local(10, 23), RegistrationStatus::Confirmed)];
        assert_matches!(
            detect_conflict(7, &target, &bookings, &jakarta()),
            Some(SeatKeeperError::SameDayConflict { conflicting_class_id: 2, .. })
        );
    }

    #[test]
    fn test_late_evening_and_early_morning_are_different_days() {
        let target = class(1, local(11, 1));
        let bookings = vec![booking(2, local(10, 23), RegistrationStatus::Confirmed)];
        assert!(detect_conflict(7, &target, &bookings, &jakarta()).is_none());
    }

    #[tokio::test]
    async fn test_missing_class_is_not_found() {
        let store = store_with(&[], &[]).await;
        let mut tx = store.begin().await.unwrap();
        let err = check_conflicts_in(tx.as_mut(), 1, 42, &jakarta()).await.unwrap_err();
        assert_matches!(err, SeatKeeperError::ClassNotFound { class_id: 42 });
    }

    #[tokio::test]
    async fn test_duplicate_active_registration_rejected() {
        let store = store_with(&[class(1, local(10, 9))], &[(1, RegistrationStatus::Waitlisted)]).await;
        let mut tx = store.begin().await.unwrap();
        let err = check_conflicts_in(tx.as_mut(), 1, 1, &jakarta()).await.unwrap_err();
        assert_matches!(err, SeatKeeperError::DuplicateRegistration { child_id: 1, class_id: 1 });
    }

    #[tokio::test]
    async fn test_canceled_registration_allows_rebooking() {
        let store = store_with(&[class(1, local(10, 9))], &[(1, RegistrationStatus::Canceled)]).await;
        let mut tx = store.begin().await.unwrap();
        check_conflicts_in(tx.as_mut(), 1, 1, &jakarta()).await.unwrap();
    }

    #[tokio::test]
    async fn test_same_day_rejected_through_store() {
        let store = store_with(
            &[class(1, local(10, 9)), class(2, local(10, 16))],
            &[(2, RegistrationStatus::Confirmed)],
        )
        .await;
        let mut tx = store.begin().await.unwrap();
        let err = check_conflicts_in(tx.as_mut(), 1, 1, &jakarta()).await.unwrap_err();
        assert_matches!(err, SeatKeeperError::SameDayConflict { conflicting_class_id: 2, .. });
    }

    #[tokio::test]
    async fn test_day_boundary_through_store() {
        let store = store_with(
            &[class(1, local(11, 1)), class(2, local(10, 23))],
            &[(2, RegistrationStatus::Confirmed)],
        )
        .await;
        let mut tx = store.begin().await.unwrap();
        check_conflicts_in(tx.as_mut(), 1, 1, &jakarta()).await.unwrap();
    }
}

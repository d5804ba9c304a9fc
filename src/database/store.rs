//! Storage abstraction for the enrollment engine
//!
//! Every enrollment operation runs inside one [`EnrollmentTx`]. Dropping a
//! transaction without calling [`EnrollmentTx::commit`] discards all of its
//! writes. Implementations must serialize writers of the same class once
//! [`EnrollmentTx::lock_class`] has returned.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    Child, Class, ClassOccupancy, LinkCode, NewRegistration, Parent, ParentRegistration, Registration,
    RegistrationStatus,
};
use crate::utils::errors::Result;

/// An active registration of a child together with its class date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildBooking {
    pub registration_id: i64,
    pub class_id: i64,
    pub class_date: DateTime<Utc>,
    pub status: RegistrationStatus,
}

/// Everything needed to tell a parent about a promotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRecipient {
    pub chat_id: i64,
    pub child_name: String,
    pub class_name: String,
    pub class_date: DateTime<Utc>,
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Open a new transaction
    async fn begin(&self) -> Result<Box<dyn EnrollmentTx>>;

    /// Resolve the deliverable chat linked to the registration's parent.
    /// Returns `None` when the parent has no linked chat.
    async fn promotion_recipient(&self, registration_id: i64) -> Result<Option<PromotionRecipient>>;

    async fn find_parent(&self, parent_id: i64) -> Result<Option<Parent>>;

    /// Store a link code for the parent. Returns `None` when the code is taken.
    async fn create_link_code(
        &self,
        parent_id: i64,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<LinkCode>>;

    /// Consume a redeemable link code and link `chat_id` to its parent in one
    /// step. The chat stops being deliverable for any other parent.
    /// Returns `None` when the code is unknown, used or expired at `now`.
    async fn redeem_link_code(&self, code: &str, chat_id: i64, now: DateTime<Utc>) -> Result<Option<Parent>>;

    /// Parent the chat is currently linked to
    async fn linked_parent(&self, chat_id: i64) -> Result<Option<i64>>;

    /// Confirmed and waitlisted registrations of the parent for classes at or
    /// after `since`, earliest class first
    async fn parent_registrations(&self, parent_id: i64, since: DateTime<Utc>) -> Result<Vec<ParentRegistration>>;
}

#[async_trait]
pub trait EnrollmentTx: Send {
    /// Read a class without locking it
    async fn find_class(&mut self, class_id: i64) -> Result<Option<Class>>;

    /// Read a class and hold its row lock until the transaction ends.
    /// Callers take this lock before touching the class's registrations.
    async fn lock_class(&mut self, class_id: i64) -> Result<Option<Class>>;

    async fn update_capacity(&mut self, class_id: i64, capacity: i32) -> Result<()>;

    async fn find_child(&mut self, child_id: i64) -> Result<Option<Child>>;

    async fn find_registration(&mut self, registration_id: i64) -> Result<Option<Registration>>;

    async fn find_registration_by_code(&mut self, code: &str) -> Result<Option<Registration>>;

    async fn code_exists(&mut self, code: &str) -> Result<bool>;

    /// Confirmed and waitlisted registrations of a class
    async fn active_registrations(&mut self, class_id: i64) -> Result<Vec<Registration>>;

    /// Whether the child already holds an active registration for the class
    async fn has_active_registration(&mut self, child_id: i64, class_id: i64) -> Result<bool>;

    /// Active registrations of the child whose class date lies in `[from, to)`
    async fn child_bookings_between(
        &mut self,
        child_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ChildBooking>>;

    async fn count_confirmed(&mut self, class_id: i64) -> Result<i64>;

    async fn insert_registration(&mut self, registration: NewRegistration) -> Result<Registration>;

    async fn set_status(&mut self, registration_id: i64, status: RegistrationStatus) -> Result<()>;

    /// Mark canceled and clear any check-in timestamp
    async fn mark_canceled(&mut self, registration_id: i64) -> Result<()>;

    async fn set_check_in(&mut self, registration_id: i64, at: DateTime<Utc>) -> Result<()>;

    async fn delete_registration(&mut self, registration_id: i64) -> Result<()>;

    async fn occupancy(&mut self, class_id: i64) -> Result<Option<ClassOccupancy>>;

    /// Make every write of this transaction visible atomically
    async fn commit(self: Box<Self>) -> Result<()>;
}

//! In-memory implementation of the enrollment store
//!
//! Used by tests and local experiments. A transaction holds the store-wide
//! mutex for its whole lifetime and works on a private copy of the state;
//! `commit` swaps the copy in, dropping the transaction throws it away.
//! That makes every transaction serializable and gives the same
//! all-or-nothing semantics as the PostgreSQL store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::database::store::{ChildBooking, EnrollmentStore, EnrollmentTx, PromotionRecipient};
use crate::models::{
    Child, Class, ClassOccupancy, LinkCode, NewRegistration, Parent, ParentRegistration, Registration,
    RegistrationStatus,
};
use crate::utils::errors::{SeatKeeperError, Result};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    classes: BTreeMap<i64, Class>,
    children: BTreeMap<i64, Child>,
    registrations: BTreeMap<i64, Registration>,
    parents: BTreeMap<i64, Parent>,
    link_codes: BTreeMap<i64, LinkCode>,
    /// (parent id, chat id), oldest link first
    chat_links: Vec<(i64, i64)>,
    next_registration_id: i64,
    next_link_code_id: i64,
    /// Registration writes allowed before every further write fails
    write_budget: Option<usize>,
    commits: usize,
}

impl MemoryState {
    fn charge_write(&mut self) -> Result<()> {
        match self.write_budget {
            Some(0) => Err(SeatKeeperError::Storage("injected write failure".to_string())),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// A chat belongs to one parent at a time; relinking moves it
    fn link(&mut self, parent_id: i64, chat_id: i64) {
        self.chat_links.retain(|&(_, linked_chat)| linked_chat != chat_id);
        self.chat_links.push((parent_id, chat_id));
    }

    fn registration_mut(&mut self, registration_id: i64) -> Result<&mut Registration> {
        self.registrations
            .get_mut(&registration_id)
            .ok_or(SeatKeeperError::RegistrationIdNotFound { registration_id })
    }
}

#[derive(Clone, Default)]
pub struct MemoryEnrollmentStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_class(&self, class: Class) {
        self.state.lock().await.classes.insert(class.id, class);
    }

    pub async fn add_child(&self, child: Child) {
        self.state.lock().await.children.insert(child.id, child);
    }

    pub async fn add_parent(&self, parent: Parent) {
        self.state.lock().await.parents.insert(parent.id, parent);
    }

    pub async fn link_chat(&self, parent_id: i64, chat_id: i64) {
        self.state.lock().await.link(parent_id, chat_id);
    }

    /// Insert a fully specified link code, e.g. one that already expired
    pub async fn seed_link_code(&self, link_code: LinkCode) {
        let mut state = self.state.lock().await;
        state.next_link_code_id = state.next_link_code_id.max(link_code.id);
        state.link_codes.insert(link_code.id, link_code);
    }

    pub async fn link_code(&self, code: &str) -> Option<LinkCode> {
        self.state
            .lock()
            .await
            .link_codes
            .values()
            .find(|c| c.code == code)
            .cloned()
    }

    /// Insert a fully specified registration, bypassing the enrollment rules
    pub async fn seed_registration(&self, registration: Registration) {
        let mut state = self.state.lock().await;
        state.next_registration_id = state.next_registration_id.max(registration.id);
        state.registrations.insert(registration.id, registration);
    }

    /// Let `writes` more registration writes succeed, then fail every later one
    pub async fn fail_after_writes(&self, writes: usize) {
        self.state.lock().await.write_budget = Some(writes);
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.write_budget = None;
    }

    pub async fn registration(&self, registration_id: i64) -> Option<Registration> {
        self.state.lock().await.registrations.get(&registration_id).cloned()
    }

    pub async fn registration_by_code(&self, code: &str) -> Option<Registration> {
        self.state
            .lock()
            .await
            .registrations
            .values()
            .find(|r| r.code == code)
            .cloned()
    }

    pub async fn class(&self, class_id: i64) -> Option<Class> {
        self.state.lock().await.classes.get(&class_id).cloned()
    }

    /// All registrations of a class in insertion order
    pub async fn class_registrations(&self, class_id: i64) -> Vec<Registration> {
        self.state
            .lock()
            .await
            .registrations
            .values()
            .filter(|r| r.class_id == class_id)
            .cloned()
            .collect()
    }

    /// Number of committed transactions so far
    pub async fn commit_count(&self) -> usize {
        self.state.lock().await.commits
    }
}

#[async_trait]
impl EnrollmentStore for MemoryEnrollmentStore {
    async fn begin(&self) -> Result<Box<dyn EnrollmentTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryEnrollmentTx { guard, working }))
    }

    async fn promotion_recipient(&self, registration_id: i64) -> Result<Option<PromotionRecipient>> {
        let state = self.state.lock().await;
        let Some(registration) = state.registrations.get(&registration_id) else {
            return Ok(None);
        };
        let Some(chat_id) = state
            .chat_links
            .iter()
            .rev()
            .find(|&&(parent_id, _)| parent_id == registration.parent_id)
            .map(|&(_, chat_id)| chat_id)
        else {
            return Ok(None);
        };
        let class = state.classes.get(&registration.class_id);
        let child = state.children.get(&registration.child_id);

        Ok(class.map(|class| PromotionRecipient {
            chat_id,
            child_name: child.map(|c| c.name.clone()).unwrap_or_default(),
            class_name: class.name.clone(),
            class_date: class.class_date,
        }))
    }

    async fn find_parent(&self, parent_id: i64) -> Result<Option<Parent>> {
        Ok(self.state.lock().await.parents.get(&parent_id).cloned())
    }

    async fn create_link_code(
        &self,
        parent_id: i64,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<LinkCode>> {
        let mut state = self.state.lock().await;
        if !state.parents.contains_key(&parent_id) {
            return Err(SeatKeeperError::Storage(format!(
                "foreign key violation: parent {} does not exist",
                parent_id
            )));
        }
        if state.link_codes.values().any(|c| c.code == code) {
            return Ok(None);
        }

        state.next_link_code_id += 1;
        let created = LinkCode {
            id: state.next_link_code_id,
            code: code.to_string(),
            parent_id,
            expires_at,
            used_at: None,
            created_at: Utc::now(),
        };
        state.link_codes.insert(created.id, created.clone());
        Ok(Some(created))
    }

    async fn redeem_link_code(&self, code: &str, chat_id: i64, now: DateTime<Utc>) -> Result<Option<Parent>> {
        let mut state = self.state.lock().await;
        let Some(link_code) = state
            .link_codes
            .values_mut()
            .find(|c| c.code == code && c.is_redeemable(now))
        else {
            return Ok(None);
        };
        link_code.used_at = Some(now);
        let parent_id = link_code.parent_id;

        state.link(parent_id, chat_id);
        Ok(state.parents.get(&parent_id).cloned())
    }

    async fn linked_parent(&self, chat_id: i64) -> Result<Option<i64>> {
        Ok(self
            .state
            .lock()
            .await
            .chat_links
            .iter()
            .rev()
            .find(|&&(_, linked_chat)| linked_chat == chat_id)
            .map(|&(parent_id, _)| parent_id))
    }

    async fn parent_registrations(&self, parent_id: i64, since: DateTime<Utc>) -> Result<Vec<ParentRegistration>> {
        let state = self.state.lock().await;
        let mut listed: Vec<(Registration, ParentRegistration)> = state
            .registrations
            .values()
            .filter(|r| r.parent_id == parent_id && r.status.is_active())
            .filter_map(|r| {
                let class = state.classes.get(&r.class_id)?;
                if class.class_date < since {
                    return None;
                }
                let child_name = state
                    .children
                    .get(&r.child_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                Some((
                    r.clone(),
                    ParentRegistration {
                        registration_id: r.id,
                        code: r.code.clone(),
                        status: r.status,
                        child_name,
                        class_name: class.name.clone(),
                        class_date: class.class_date,
                    },
                ))
            })
            .collect();
        listed.sort_by_key(|(r, listed)| (listed.class_date, r.created_at, r.id));
        Ok(listed.into_iter().map(|(_, listed)| listed).collect())
    }
}

pub struct MemoryEnrollmentTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl EnrollmentTx for MemoryEnrollmentTx {
    async fn find_class(&mut self, class_id: i64) -> Result<Option<Class>> {
        Ok(self.working.classes.get(&class_id).cloned())
    }

    async fn lock_class(&mut self, class_id: i64) -> Result<Option<Class>> {
        // The store-wide guard is already held
        Ok(self.working.classes.get(&class_id).cloned())
    }

    async fn update_capacity(&mut self, class_id: i64, capacity: i32) -> Result<()> {
        let class = self
            .working
            .classes
            .get_mut(&class_id)
            .ok_or(SeatKeeperError::ClassNotFound { class_id })?;
        class.capacity = capacity;
        class.updated_at = Utc::now();
        Ok(())
    }

    async fn find_child(&mut self, child_id: i64) -> Result<Option<Child>> {
        Ok(self.working.children.get(&child_id).cloned())
    }

    async fn find_registration(&mut self, registration_id: i64) -> Result<Option<Registration>> {
        Ok(self.working.registrations.get(&registration_id).cloned())
    }

    async fn find_registration_by_code(&mut self, code: &str) -> Result<Option<Registration>> {
        Ok(self
            .working
            .registrations
            .values()
            .find(|r| r.code == code)
            .cloned())
    }

    async fn code_exists(&mut self, code: &str) -> Result<bool> {
        Ok(self.working.registrations.values().any(|r| r.code == code))
    }

    async fn active_registrations(&mut self, class_id: i64) -> Result<Vec<Registration>> {
        let mut active: Vec<Registration> = self
            .working
            .registrations
            .values()
            .filter(|r| r.class_id == class_id && r.status.is_active())
            .cloned()
            .collect();
        active.sort_by_key(Registration::fifo_key);
        Ok(active)
    }

    async fn has_active_registration(&mut self, child_id: i64, class_id: i64) -> Result<bool> {
        Ok(self
            .working
            .registrations
            .values()
            .any(|r| r.child_id == child_id && r.class_id == class_id && r.status.is_active()))
    }

    async fn child_bookings_between(
        &mut self,
        child_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ChildBooking>> {
        let mut bookings: Vec<ChildBooking> = self
            .working
            .registrations
            .values()
            .filter(|r| r.child_id == child_id && r.status.is_active())
            .filter_map(|r| {
                let class = self.working.classes.get(&r.class_id)?;
                (class.class_date >= from && class.class_date < to).then(|| ChildBooking {
                    registration_id: r.id,
                    class_id: r.class_id,
                    class_date: class.class_date,
                    status: r.status,
                })
            })
            .collect();
        bookings.sort_by_key(|b| (b.class_date, b.registration_id));
        Ok(bookings)
    }

    async fn count_confirmed(&mut self, class_id: i64) -> Result<i64> {
        Ok(self
            .working
            .registrations
            .values()
            .filter(|r| r.class_id == class_id && r.status == RegistrationStatus::Confirmed)
            .count() as i64)
    }

    async fn insert_registration(&mut self, registration: NewRegistration) -> Result<Registration> {
        self.working.charge_write()?;
        if !self.working.classes.contains_key(&registration.class_id) {
            return Err(SeatKeeperError::Storage(format!(
                "foreign key violation: class {} does not exist",
                registration.class_id
            )));
        }
        if self.working.registrations.values().any(|r| r.code == registration.code) {
            return Err(SeatKeeperError::Storage(format!(
                "unique violation: code {} already exists",
                registration.code
            )));
        }

        self.working.next_registration_id += 1;
        let now = Utc::now();
        let inserted = Registration {
            id: self.working.next_registration_id,
            parent_id: registration.parent_id,
            child_id: registration.child_id,
            class_id: registration.class_id,
            status: registration.status,
            code: registration.code,
            check_in_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.registrations.insert(inserted.id, inserted.clone());
        Ok(inserted)
    }

    async fn set_status(&mut self, registration_id: i64, status: RegistrationStatus) -> Result<()> {
        self.working.charge_write()?;
        let registration = self.working.registration_mut(registration_id)?;
        registration.status = status;
        registration.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_canceled(&mut self, registration_id: i64) -> Result<()> {
        self.working.charge_write()?;
        let registration = self.working.registration_mut(registration_id)?;
        registration.status = RegistrationStatus::Canceled;
        registration.check_in_at = None;
        registration.updated_at = Utc::now();
        Ok(())
    }

    async fn set_check_in(&mut self, registration_id: i64, at: DateTime<Utc>) -> Result<()> {
        self.working.charge_write()?;
        let registration = self.working.registration_mut(registration_id)?;
        registration.check_in_at = Some(at);
        registration.updated_at = at;
        Ok(())
    }

    async fn delete_registration(&mut self, registration_id: i64) -> Result<()> {
        self.working.charge_write()?;
        self.working.registrations.remove(&registration_id);
        Ok(())
    }

    async fn occupancy(&mut self, class_id: i64) -> Result<Option<ClassOccupancy>> {
        let Some(class) = self.working.classes.get(&class_id) else {
            return Ok(None);
        };

        let mut occupancy = ClassOccupancy {
            class_id,
            class_name: class.name.clone(),
            capacity: class.capacity,
            confirmed: 0,
            waitlisted: 0,
            checked_in: 0,
        };
        for registration in self.working.registrations.values().filter(|r| r.class_id == class_id) {
            match (registration.status, registration.is_anchored()) {
                (RegistrationStatus::Confirmed, true) => occupancy.checked_in += 1,
                (RegistrationStatus::Confirmed, false) => occupancy.confirmed += 1,
                (RegistrationStatus::Waitlisted, _) => occupancy.waitlisted += 1,
                (RegistrationStatus::Canceled, _) => {}
            }
        }
        Ok(Some(occupancy))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryEnrollmentTx { mut guard, mut working } = *self;
        working.commits += 1;
        *guard = working;
        Ok(())
    }
}

//! PostgreSQL implementation of the enrollment store
//!
//! Per-class mutual exclusion comes from `SELECT ... FOR UPDATE` on the class
//! row. Every mutating flow locks the class before reading or writing its
//! registrations, so lock order is always class row first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::database::store::{ChildBooking, EnrollmentStore, EnrollmentTx, PromotionRecipient};
use crate::models::{
    Child, Class, ClassOccupancy, LinkCode, NewRegistration, Parent, ParentRegistration, Registration,
    RegistrationStatus,
};
use crate::utils::errors::Result;

const CLASS_COLUMNS: &str =
    "id, name, class_date, capacity, signup_opens_at, created_at, updated_at";

const PARENT_COLUMNS: &str = "id, name, phone, email, created_at, updated_at";

const LINK_CODE_COLUMNS: &str = "id, code, parent_id, expires_at, used_at, created_at";

const REGISTRATION_COLUMNS: &str =
    "id, parent_id, child_id, class_id, status, code, check_in_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgEnrollmentStore {
    pool: PgPool,
}

impl PgEnrollmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EnrollmentStore for PgEnrollmentStore {
    async fn begin(&self) -> Result<Box<dyn EnrollmentTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgEnrollmentTx { tx }))
    }

    async fn promotion_recipient(&self, registration_id: i64) -> Result<Option<PromotionRecipient>> {
        let row: Option<(i64, String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT tl.chat_id, ch.name, c.name, c.class_date
            FROM registrations r
            JOIN children ch ON ch.id = r.child_id
            JOIN classes c ON c.id = r.class_id
            JOIN telegram_links tl ON tl.parent_id = r.parent_id AND tl.deliverable = TRUE
            WHERE r.id = $1
            ORDER BY tl.linked_at DESC
            LIMIT 1
            "#
        )
        .bind(registration_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(chat_id, child_name, class_name, class_date)| PromotionRecipient {
            chat_id,
            child_name,
            class_name,
            class_date,
        }))
    }

    async fn find_parent(&self, parent_id: i64) -> Result<Option<Parent>> {
        let parent = sqlx::query_as::<_, Parent>(&format!(
            "SELECT {} FROM parents WHERE id = $1",
            PARENT_COLUMNS
        ))
        .bind(parent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(parent)
    }

    async fn create_link_code(
        &self,
        parent_id: i64,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<LinkCode>> {
        // Drop this parent's stale codes so the unique index stays small
        sqlx::query(
            r#"
            DELETE FROM link_codes
            WHERE parent_id = $1 AND (used_at IS NOT NULL OR expires_at < NOW() - INTERVAL '1 day')
            "#
        )
        .bind(parent_id)
        .execute(&self.pool)
        .await?;

        let created = sqlx::query_as::<_, LinkCode>(&format!(
            r#"
            INSERT INTO link_codes (code, parent_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO NOTHING
            RETURNING {}
            "#,
            LINK_CODE_COLUMNS
        ))
        .bind(code)
        .bind(parent_id)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(created)
    }

    async fn redeem_link_code(&self, code: &str, chat_id: i64, now: DateTime<Utc>) -> Result<Option<Parent>> {
        let mut tx = self.pool.begin().await?;

        let consumed: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE link_codes SET used_at = $2
            WHERE code = $1 AND used_at IS NULL AND expires_at > $2
            RETURNING parent_id
            "#
        )
        .bind(code)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((parent_id,)) = consumed else {
            return Ok(None);
        };

        sqlx::query("UPDATE telegram_links SET deliverable = FALSE WHERE chat_id = $1 AND parent_id <> $2")
            .bind(chat_id)
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO telegram_links (parent_id, chat_id, deliverable, linked_at)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (parent_id, chat_id)
            DO UPDATE SET deliverable = TRUE, linked_at = EXCLUDED.linked_at
            "#
        )
        .bind(parent_id)
        .bind(chat_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let parent = sqlx::query_as::<_, Parent>(&format!(
            "SELECT {} FROM parents WHERE id = $1",
            PARENT_COLUMNS
        ))
        .bind(parent_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(parent_id = parent_id, chat_id = chat_id, "Chat linked");
        Ok(Some(parent))
    }

    async fn linked_parent(&self, chat_id: i64) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT parent_id FROM telegram_links
            WHERE chat_id = $1 AND deliverable = TRUE
            ORDER BY linked_at DESC
            LIMIT 1
            "#
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(parent_id,)| parent_id))
    }

    async fn parent_registrations(&self, parent_id: i64, since: DateTime<Utc>) -> Result<Vec<ParentRegistration>> {
        let registrations = sqlx::query_as::<_, ParentRegistration>(
            r#"
            SELECT r.id AS registration_id, r.code, r.status,
                ch.name AS child_name, c.name AS class_name, c.class_date
            FROM registrations r
            JOIN children ch ON ch.id = r.child_id
            JOIN classes c ON c.id = r.class_id
            WHERE r.parent_id = $1
              AND r.status IN ('confirmed', 'waitlisted')
              AND c.class_date >= $2
            ORDER BY c.class_date ASC, r.created_at ASC, r.id ASC
            "#
        )
        .bind(parent_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(registrations)
    }
}

/// One open PostgreSQL transaction; rolls back on drop
pub struct PgEnrollmentTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl EnrollmentTx for PgEnrollmentTx {
    async fn find_class(&mut self, class_id: i64) -> Result<Option<Class>> {
        let class = sqlx::query_as::<_, Class>(&format!(
            "SELECT {} FROM classes WHERE id = $1",
            CLASS_COLUMNS
        ))
        .bind(class_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(class)
    }

    async fn lock_class(&mut self, class_id: i64) -> Result<Option<Class>> {
        debug!(class_id = class_id, "Locking class row");
        let class = sqlx::query_as::<_, Class>(&format!(
            "SELECT {} FROM classes WHERE id = $1 FOR UPDATE",
            CLASS_COLUMNS
        ))
        .bind(class_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(class)
    }

    async fn update_capacity(&mut self, class_id: i64, capacity: i32) -> Result<()> {
        sqlx::query("UPDATE classes SET capacity = $2, updated_at = $3 WHERE id = $1")
            .bind(class_id)
            .bind(capacity)
            .bind(Utc::now())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn find_child(&mut self, child_id: i64) -> Result<Option<Child>> {
        let child = sqlx::query_as::<_, Child>(
            "SELECT id, parent_id, name, created_at FROM children WHERE id = $1"
        )
        .bind(child_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(child)
    }

    async fn find_registration(&mut self, registration_id: i64) -> Result<Option<Registration>> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {} FROM registrations WHERE id = $1",
            REGISTRATION_COLUMNS
        ))
        .bind(registration_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(registration)
    }

    async fn find_registration_by_code(&mut self, code: &str) -> Result<Option<Registration>> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {} FROM registrations WHERE code = $1",
            REGISTRATION_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(registration)
    }

    async fn code_exists(&mut self, code: &str) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM registrations WHERE code = $1)"
        )
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists.0)
    }

    async fn active_registrations(&mut self, class_id: i64) -> Result<Vec<Registration>> {
        let registrations = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {} FROM registrations \
             WHERE class_id = $1 AND status IN ('confirmed', 'waitlisted') \
             ORDER BY created_at ASC, id ASC",
            REGISTRATION_COLUMNS
        ))
        .bind(class_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(registrations)
    }

    async fn has_active_registration(&mut self, child_id: i64, class_id: i64) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM registrations
            WHERE child_id = $1 AND class_id = $2 AND status IN ('confirmed', 'waitlisted')
            "#
        )
        .bind(child_id)
        .bind(class_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count.0 > 0)
    }

    async fn child_bookings_between(
        &mut self,
        child_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ChildBooking>> {
        let rows: Vec<(i64, i64, DateTime<Utc>, RegistrationStatus)> = sqlx::query_as(
            r#"
            SELECT r.id, r.class_id, c.class_date, r.status
            FROM registrations r
            JOIN classes c ON c.id = r.class_id
            WHERE r.child_id = $1
              AND r.status IN ('confirmed', 'waitlisted')
              AND c.class_date >= $2 AND c.class_date < $3
            ORDER BY c.class_date ASC, r.id ASC
            "#
        )
        .bind(child_id)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(registration_id, class_id, class_date, status)| ChildBooking {
                registration_id,
                class_id,
                class_date,
                status,
            })
            .collect())
    }

    async fn count_confirmed(&mut self, class_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations WHERE class_id = $1 AND status = 'confirmed'"
        )
        .bind(class_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count.0)
    }

    async fn insert_registration(&mut self, registration: NewRegistration) -> Result<Registration> {
        let now = Utc::now();
        let inserted = sqlx::query_as::<_, Registration>(&format!(
            r#"
            INSERT INTO registrations (parent_id, child_id, class_id, status, code, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(registration.parent_id)
        .bind(registration.child_id)
        .bind(registration.class_id)
        .bind(registration.status)
        .bind(registration.code)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(inserted)
    }

    async fn set_status(&mut self, registration_id: i64, status: RegistrationStatus) -> Result<()> {
        sqlx::query("UPDATE registrations SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(registration_id)
            .bind(status)
            .bind(Utc::now())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn mark_canceled(&mut self, registration_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE registrations SET status = 'canceled', check_in_at = NULL, updated_at = $2 WHERE id = $1"
        )
        .bind(registration_id)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_check_in(&mut self, registration_id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE registrations SET check_in_at = $2, updated_at = $2 WHERE id = $1")
            .bind(registration_id)
            .bind(at)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_registration(&mut self, registration_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(registration_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn occupancy(&mut self, class_id: i64) -> Result<Option<ClassOccupancy>> {
        let row: Option<(i64, String, i32, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.capacity,
                COALESCE(SUM(CASE WHEN r.status = 'confirmed' AND r.check_in_at IS NULL THEN 1 ELSE 0 END), 0)::BIGINT,
                COALESCE(SUM(CASE WHEN r.status = 'waitlisted' THEN 1 ELSE 0 END), 0)::BIGINT,
                COALESCE(SUM(CASE WHEN r.status = 'confirmed' AND r.check_in_at IS NOT NULL THEN 1 ELSE 0 END), 0)::BIGINT
            FROM classes c
            LEFT JOIN registrations r ON r.class_id = c.id
            WHERE c.id = $1
            GROUP BY c.id
            "#
        )
        .bind(class_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|(class_id, class_name, capacity, confirmed, waitlisted, checked_in)| ClassOccupancy {
            class_id,
            class_name,
            capacity,
            confirmed,
            waitlisted,
            checked_in,
        }))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

//! Test database helper utilities
//!
//! PostgreSQL tests only run when `TEST_DATABASE_URL` points at a scratch
//! database; every helper here wipes the enrollment tables.

use std::sync::Once;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

static INIT: Once = Once::new();

/// Test database helper that manages PostgreSQL test database setup
pub struct TestDatabase {
    pub pool: PgPool,
    pub database_url: String,
}

impl TestDatabase {
    /// Connect and migrate, or `None` when `TEST_DATABASE_URL` is unset
    pub async fn from_env() -> Option<Self> {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt::try_init();
        });

        let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to TEST_DATABASE_URL");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let db = Self { pool, database_url };
        db.cleanup().await.expect("Failed to clean test database");
        Some(db)
    }

    /// Clean all test data from the database
    pub async fn cleanup(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "TRUNCATE registrations, link_codes, telegram_links, children, classes, parents RESTART IDENTITY CASCADE",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_parent(&self, name: &str, phone: &str) -> Result<i64, sqlx::Error> {
        let id: (i64,) = sqlx::query_as("INSERT INTO parents (name, phone) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(phone)
            .fetch_one(&self.pool)
            .await?;
        Ok(id.0)
    }

    pub async fn insert_child(&self, parent_id: i64, name: &str) -> Result<i64, sqlx::Error> {
        let id: (i64,) = sqlx::query_as("INSERT INTO children (parent_id, name) VALUES ($1, $2) RETURNING id")
            .bind(parent_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id.0)
    }

    pub async fn insert_class(&self, name: &str, class_date: DateTime<Utc>, capacity: i32) -> Result<i64, sqlx::Error> {
        let id: (i64,) = sqlx::query_as(
            "INSERT INTO classes (name, class_date, capacity) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(name)
        .bind(class_date)
        .bind(capacity)
        .fetch_one(&self.pool)
        .await?;
        Ok(id.0)
    }

    pub async fn link_chat(&self, parent_id: i64, chat_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO telegram_links (parent_id, chat_id) VALUES ($1, $2)")
            .bind(parent_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Family of one parent and one child
    pub async fn insert_family(&self, index: usize) -> Result<i64, sqlx::Error> {
        let parent_id = self
            .insert_parent(&format!("Parent {}", index), &format!("+62811000{:04}", index))
            .await?;
        self.insert_child(parent_id, &format!("Child {}", index)).await
    }

    /// Number of registrations of a class with the given status
    pub async fn count_status(&self, class_id: i64, status: &str) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations WHERE class_id = $1 AND status::text = $2",
        )
        .bind(class_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }
}

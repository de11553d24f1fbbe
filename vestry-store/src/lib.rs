//! SQLite persistence for the review subsystem, plus the narrow SQLite
//! implementations of the collaborator interfaces (member directory,
//! reminder sink) against the wider application's tables.

mod approvals;
mod assessments;
mod collaborators;

pub use collaborators::StoredReminder;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use vestry_core::category::{CategoryId, RiskAssessmentCategory};
use vestry_core::error::VestryError;
use vestry_core::store::CategoryStore;

/// SQLite-backed store implementing all the core storage traits.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, VestryError> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), VestryError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS risk_assessment_categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS risk_assessments (
                id TEXT PRIMARY KEY,
                category_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                scope TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT '',
                review_interval_years INTEGER NOT NULL,
                status TEXT NOT NULL,
                current_cycle INTEGER NOT NULL DEFAULT 0,
                last_review_date TEXT,
                next_review_date TEXT,
                minimum_approvals INTEGER NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                modified_by TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_assessments_category
                ON risk_assessments(category_id)",
            "CREATE INDEX IF NOT EXISTS idx_assessments_due
                ON risk_assessments(status, next_review_date)",
            r#"
            CREATE TABLE IF NOT EXISTS approval_records (
                id TEXT PRIMARY KEY,
                assessment_id TEXT NOT NULL,
                cycle INTEGER NOT NULL,
                approver TEXT NOT NULL,
                approved_on TEXT NOT NULL,
                notes TEXT NOT NULL DEFAULT '',
                UNIQUE(assessment_id, cycle, approver)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_approvals_assessment
                ON approval_records(assessment_id, cycle)",
            r#"
            CREATE TABLE IF NOT EXISTS members (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS reminder_categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS reminders (
                id TEXT PRIMARY KEY,
                idempotency_key TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                due_date TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                category_id TEXT NOT NULL,
                assignee TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        ];

        for sql in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    /// Administration-side write; category CRUD proper lives elsewhere in
    /// the application.
    pub async fn insert_category(
        &self,
        category: &RiskAssessmentCategory,
    ) -> Result<(), VestryError> {
        sqlx::query(
            "INSERT INTO risk_assessment_categories (id, name, description) VALUES (?, ?, ?)",
        )
        .bind(category.id.to_string())
        .bind(&category.name)
        .bind(&category.description)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for SqliteStore {
    async fn get(&self, id: CategoryId) -> Result<Option<RiskAssessmentCategory>, VestryError> {
        let row = sqlx::query(
            "SELECT id, name, description FROM risk_assessment_categories WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|row| {
            Ok(RiskAssessmentCategory {
                id: parse_uuid(row.try_get::<String, _>("id").map_err(db_err)?)?,
                name: row.try_get("name").map_err(db_err)?,
                description: row.try_get("description").map_err(db_err)?,
            })
        })
        .transpose()
    }
}

pub(crate) fn db_err(e: impl std::fmt::Display) -> VestryError {
    VestryError::Database(e.to_string())
}

pub(crate) fn parse_uuid(s: String) -> Result<uuid::Uuid, VestryError> {
    uuid::Uuid::parse_str(&s).map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqliteStore {
        // In-memory sqlite is per-connection; keep the pool at one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        SqliteStore::new(pool).await.expect("migrated store")
    }

    #[tokio::test]
    async fn migrate_is_repeatable() {
        let store = test_store().await;
        store.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn category_round_trip() {
        let store = test_store().await;
        let category = RiskAssessmentCategory {
            id: CategoryId::new_v4(),
            name: "Safeguarding".into(),
            description: "Children and vulnerable adults".into(),
        };
        store.insert_category(&category).await.unwrap();

        let loaded = CategoryStore::get(&store, category.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Safeguarding");

        assert!(CategoryStore::get(&store, CategoryId::new_v4())
            .await
            .unwrap()
            .is_none());
    }
}

//! SQLite implementations of the narrow collaborator interfaces the review
//! subsystem consumes: the member roll and the reminder module.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::Row;
use tracing::instrument;

use vestry_core::category::CategoryId;
use vestry_core::directory::{MemberDirectory, MemberId};
use vestry_core::error::VestryError;
use vestry_core::reminder::{ReminderSink, ReminderUpsert};

use crate::assessments::parse_date;
use crate::{db_err, parse_uuid, SqliteStore};

#[async_trait]
impl MemberDirectory for SqliteStore {
    async fn is_active_deacon(&self, member: MemberId) -> Result<bool, VestryError> {
        let row = sqlx::query("SELECT active FROM members WHERE id = ? AND role = 'deacon'")
            .bind(member.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(match row {
            Some(row) => row.try_get::<i64, _>("active").map_err(db_err)? != 0,
            None => false,
        })
    }
}

#[async_trait]
impl ReminderSink for SqliteStore {
    async fn category_id_by_name(&self, name: &str) -> Result<Option<CategoryId>, VestryError> {
        let row = sqlx::query("SELECT id FROM reminder_categories WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|row| parse_uuid(row.try_get::<String, _>("id").map_err(db_err)?))
            .transpose()
    }

    /// Keyed upsert: an existing reminder under the same idempotency key has
    /// its due date, priority and description rewritten in place.
    #[instrument(skip(self, reminder), fields(key = %reminder.key))]
    async fn upsert(&self, reminder: ReminderUpsert) -> Result<(), VestryError> {
        sqlx::query(
            r#"
            INSERT INTO reminders
                (id, idempotency_key, description, due_date, priority, category_id, assignee, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(idempotency_key) DO UPDATE SET
                description = excluded.description,
                due_date = excluded.due_date,
                priority = excluded.priority,
                assignee = excluded.assignee,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&reminder.key)
        .bind(&reminder.description)
        .bind(reminder.due_date.to_string())
        .bind(i64::from(reminder.priority))
        .bind(reminder.category_id.to_string())
        .bind(&reminder.assignee)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

/// A reminder row as the reminder module displays it.
#[derive(Debug, Clone)]
pub struct StoredReminder {
    pub key: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub priority: bool,
    pub category_id: CategoryId,
    pub assignee: Option<String>,
}

impl SqliteStore {
    /// Administration-side write; used when provisioning the reminder
    /// module's categories.
    pub async fn insert_reminder_category(
        &self,
        id: CategoryId,
        name: &str,
    ) -> Result<(), VestryError> {
        sqlx::query("INSERT INTO reminder_categories (id, name) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Administration-side write against the member roll.
    pub async fn insert_member(
        &self,
        id: MemberId,
        name: &str,
        role: &str,
        active: bool,
    ) -> Result<(), VestryError> {
        sqlx::query("INSERT INTO members (id, name, role, active) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(name)
            .bind(role)
            .bind(i64::from(active))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn reminder_by_key(&self, key: &str) -> Result<Option<StoredReminder>, VestryError> {
        let row = sqlx::query(
            "SELECT idempotency_key, description, due_date, priority, category_id, assignee
             FROM reminders WHERE idempotency_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|row| {
            Ok(StoredReminder {
                key: row.try_get("idempotency_key").map_err(db_err)?,
                description: row.try_get("description").map_err(db_err)?,
                due_date: parse_date(row.try_get("due_date").map_err(db_err)?)?,
                priority: row.try_get::<i64, _>("priority").map_err(db_err)? != 0,
                category_id: parse_uuid(row.try_get("category_id").map_err(db_err)?)?,
                assignee: row.try_get("assignee").map_err(db_err)?,
            })
        })
        .transpose()
    }

    pub async fn reminder_count(&self) -> Result<u64, VestryError> {
        let row = sqlx::query("SELECT COUNT(*) AS reminders FROM reminders")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.try_get::<i64, _>("reminders").map_err(db_err)? as u64)
    }
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn deacon_lookup_checks_role_and_active_flag() {
        let store = test_store().await;

        let deacon = MemberId::new_v4();
        let lapsed = MemberId::new_v4();
        let warden = MemberId::new_v4();
        store.insert_member(deacon, "A", "deacon", true).await.unwrap();
        store.insert_member(lapsed, "B", "deacon", false).await.unwrap();
        store.insert_member(warden, "C", "warden", true).await.unwrap();

        assert!(store.is_active_deacon(deacon).await.unwrap());
        assert!(!store.is_active_deacon(lapsed).await.unwrap());
        assert!(!store.is_active_deacon(warden).await.unwrap());
        assert!(!store.is_active_deacon(MemberId::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn upsert_updates_in_place_under_same_key() {
        let store = test_store().await;
        let category = CategoryId::new_v4();
        store
            .insert_reminder_category(category, "Risk Assessments")
            .await
            .unwrap();

        assert_eq!(
            store.category_id_by_name("Risk Assessments").await.unwrap(),
            Some(category)
        );
        assert_eq!(store.category_id_by_name("Rotas").await.unwrap(), None);

        let upsert = ReminderUpsert {
            key: "risk-assessment:abc:1".into(),
            description: "Review: Ladder use".into(),
            due_date: date(2026, 10, 1),
            priority: false,
            category_id: category,
            assignee: None,
        };
        store.upsert(upsert.clone()).await.unwrap();
        store
            .upsert(ReminderUpsert {
                due_date: date(2026, 9, 1),
                priority: true,
                ..upsert
            })
            .await
            .unwrap();

        assert_eq!(store.reminder_count().await.unwrap(), 1);
        let stored = store
            .reminder_by_key("risk-assessment:abc:1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.due_date, date(2026, 9, 1));
        assert!(stored.priority);
    }
}

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::instrument;

use vestry_core::assessment::{AssessmentId, ReviewStatus, RiskAssessment};
use vestry_core::error::VestryError;
use vestry_core::store::{AssessmentFilter, AssessmentStore};

use crate::{db_err, parse_uuid, SqliteStore};

const SELECT_COLUMNS: &str = "id, category_id, title, description, scope, notes, \
     review_interval_years, status, current_cycle, last_review_date, next_review_date, \
     minimum_approvals, version, created_by, created_at, modified_by, modified_at";

#[async_trait]
impl AssessmentStore for SqliteStore {
    #[instrument(skip(self, assessment), fields(assessment_id = %assessment.id))]
    async fn insert(&self, assessment: &RiskAssessment) -> Result<(), VestryError> {
        sqlx::query(
            r#"
            INSERT INTO risk_assessments
                (id, category_id, title, description, scope, notes,
                 review_interval_years, status, current_cycle,
                 last_review_date, next_review_date, minimum_approvals,
                 version, created_by, created_at, modified_by, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assessment.id.to_string())
        .bind(assessment.category_id.to_string())
        .bind(&assessment.title)
        .bind(&assessment.description)
        .bind(&assessment.scope)
        .bind(&assessment.notes)
        .bind(i64::from(assessment.review_interval_years))
        .bind(assessment.status.as_str())
        .bind(i64::from(assessment.current_cycle))
        .bind(assessment.last_review_date.map(|d| d.to_string()))
        .bind(assessment.next_review_date.map(|d| d.to_string()))
        .bind(i64::from(assessment.minimum_approvals))
        .bind(assessment.version)
        .bind(&assessment.created_by)
        .bind(assessment.created_at.to_rfc3339())
        .bind(&assessment.modified_by)
        .bind(assessment.modified_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: AssessmentId) -> Result<Option<RiskAssessment>, VestryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM risk_assessments WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(row_to_assessment).transpose()
    }

    #[instrument(skip(self, assessment), fields(assessment_id = %assessment.id, expected_version))]
    async fn update_versioned(
        &self,
        assessment: &RiskAssessment,
        expected_version: i64,
    ) -> Result<bool, VestryError> {
        let result = sqlx::query(
            r#"
            UPDATE risk_assessments SET
                category_id = ?, title = ?, description = ?, scope = ?, notes = ?,
                review_interval_years = ?, status = ?, current_cycle = ?,
                last_review_date = ?, next_review_date = ?, minimum_approvals = ?,
                version = ?, modified_by = ?, modified_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(assessment.category_id.to_string())
        .bind(&assessment.title)
        .bind(&assessment.description)
        .bind(&assessment.scope)
        .bind(&assessment.notes)
        .bind(i64::from(assessment.review_interval_years))
        .bind(assessment.status.as_str())
        .bind(i64::from(assessment.current_cycle))
        .bind(assessment.last_review_date.map(|d| d.to_string()))
        .bind(assessment.next_review_date.map(|d| d.to_string()))
        .bind(i64::from(assessment.minimum_approvals))
        .bind(assessment.version)
        .bind(&assessment.modified_by)
        .bind(assessment.modified_at.to_rfc3339())
        .bind(assessment.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self, filter: &AssessmentFilter) -> Result<Vec<RiskAssessment>, VestryError> {
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM risk_assessments WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(category_id) = filter.category_id {
            sql.push_str(" AND category_id = ?");
            binds.push(category_id.to_string());
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(status.as_str().to_string());
        }
        if let Some(ref title) = filter.title_contains {
            sql.push_str(" AND lower(title) LIKE ?");
            binds.push(format!("%{}%", title.to_lowercase()));
        }
        sql.push_str(" ORDER BY title");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter().map(row_to_assessment).collect()
    }

    async fn list_due(&self, cutoff: NaiveDate) -> Result<Vec<RiskAssessment>, VestryError> {
        // ISO dates compare correctly as text.
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM risk_assessments
             WHERE status = ? AND next_review_date IS NOT NULL AND next_review_date <= ?
             ORDER BY next_review_date"
        ))
        .bind(ReviewStatus::Approved.as_str())
        .bind(cutoff.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(row_to_assessment).collect()
    }
}

fn row_to_assessment(row: SqliteRow) -> Result<RiskAssessment, VestryError> {
    let status: String = row.try_get("status").map_err(db_err)?;
    let status = ReviewStatus::parse(&status)
        .ok_or_else(|| VestryError::Database(format!("unknown review status: {status}")))?;

    Ok(RiskAssessment {
        id: parse_uuid(row.try_get("id").map_err(db_err)?)?,
        category_id: parse_uuid(row.try_get("category_id").map_err(db_err)?)?,
        title: row.try_get("title").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        scope: row.try_get("scope").map_err(db_err)?,
        notes: row.try_get("notes").map_err(db_err)?,
        review_interval_years: int_column(&row, "review_interval_years")?,
        status,
        current_cycle: int_column(&row, "current_cycle")?,
        last_review_date: parse_opt_date(row.try_get("last_review_date").map_err(db_err)?)?,
        next_review_date: parse_opt_date(row.try_get("next_review_date").map_err(db_err)?)?,
        minimum_approvals: int_column(&row, "minimum_approvals")?,
        version: row.try_get("version").map_err(db_err)?,
        created_by: row.try_get("created_by").map_err(db_err)?,
        created_at: parse_timestamp(row.try_get("created_at").map_err(db_err)?)?,
        modified_by: row.try_get("modified_by").map_err(db_err)?,
        modified_at: parse_timestamp(row.try_get("modified_at").map_err(db_err)?)?,
    })
}

/// Read an integer column with a range check; a row holding a value the
/// domain type cannot represent is reported, not truncated.
pub(crate) fn int_column<T: TryFrom<i64>>(row: &SqliteRow, column: &str) -> Result<T, VestryError> {
    let value = row.try_get::<i64, _>(column).map_err(db_err)?;
    T::try_from(value)
        .map_err(|_| VestryError::Database(format!("column {column} out of range: {value}")))
}

pub(crate) fn parse_date(s: String) -> Result<NaiveDate, VestryError> {
    s.parse::<NaiveDate>().map_err(db_err)
}

fn parse_opt_date(s: Option<String>) -> Result<Option<NaiveDate>, VestryError> {
    s.map(parse_date).transpose()
}

fn parse_timestamp(s: String) -> Result<DateTime<Utc>, VestryError> {
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use vestry_core::assessment::NewAssessment;
    use vestry_core::category::CategoryId;

    async fn test_store() -> SqliteStore {
        // In-memory sqlite is per-connection; keep the pool at one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        SqliteStore::new(pool).await.expect("migrated store")
    }

    fn assessment(title: &str) -> RiskAssessment {
        RiskAssessment::new(
            CategoryId::new_v4(),
            NewAssessment {
                category_id: CategoryId::new_v4(),
                title: title.into(),
                description: "desc".into(),
                scope: "scope".into(),
                notes: String::new(),
                review_interval_years: 2,
            },
            3,
            "admin",
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = test_store().await;
        let a = assessment("Minibus driving");
        store.insert(&a).await.unwrap();

        let loaded = store.get(a.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Minibus driving");
        assert_eq!(loaded.status, ReviewStatus::Draft);
        assert_eq!(loaded.version, 0);
        assert_eq!(loaded.created_at, a.created_at);
        assert!(store.get(AssessmentId::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn versioned_update_rejects_stale_writer() {
        let store = test_store().await;
        let mut a = assessment("Kitchen hygiene");
        store.insert(&a).await.unwrap();

        a.title = "Kitchen hygiene (rev A)".into();
        a.version = 1;
        assert!(store.update_versioned(&a, 0).await.unwrap());

        // A writer still holding version 0 loses.
        let mut stale = a.clone();
        stale.title = "Kitchen hygiene (rev B)".into();
        stale.version = 1;
        assert!(!store.update_versioned(&stale, 0).await.unwrap());

        let loaded = store.get(a.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Kitchen hygiene (rev A)");
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn out_of_range_integer_column_surfaces_a_database_error() {
        let store = test_store().await;
        let a = assessment("Corrupted row");
        store.insert(&a).await.unwrap();

        // A u8 column holding a value no interval can take.
        sqlx::query("UPDATE risk_assessments SET review_interval_years = 900 WHERE id = ?")
            .bind(a.id.to_string())
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.get(a.id).await.unwrap_err();
        assert!(matches!(err, VestryError::Database(_)));
        assert!(err.to_string().contains("review_interval_years"));
    }

    #[tokio::test]
    async fn list_due_returns_approved_within_cutoff_only() {
        let store = test_store().await;

        let mut due = assessment("Due soon");
        due.status = ReviewStatus::Approved;
        due.current_cycle = 1;
        due.last_review_date = Some(date(2024, 7, 1));
        due.next_review_date = Some(date(2026, 7, 1));
        store.insert(&due).await.unwrap();

        let mut far = assessment("Far future");
        far.status = ReviewStatus::Approved;
        far.current_cycle = 1;
        far.last_review_date = Some(date(2025, 1, 1));
        far.next_review_date = Some(date(2030, 1, 1));
        store.insert(&far).await.unwrap();

        let mut open = assessment("Under review");
        open.status = ReviewStatus::UnderReview;
        open.current_cycle = 2;
        open.next_review_date = Some(date(2026, 1, 1));
        store.insert(&open).await.unwrap();

        let listed = store.list_due(date(2026, 8, 1)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due.id);
    }
}

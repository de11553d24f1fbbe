use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::instrument;

use vestry_core::approval::ApprovalRecord;
use vestry_core::assessment::AssessmentId;
use vestry_core::directory::MemberId;
use vestry_core::error::VestryError;
use vestry_core::store::ApprovalStore;

use crate::assessments::{int_column, parse_date};
use crate::{db_err, parse_uuid, SqliteStore};

#[async_trait]
impl ApprovalStore for SqliteStore {
    #[instrument(
        skip(self, record),
        fields(assessment_id = %record.assessment_id, cycle = record.cycle, approver = %record.approver)
    )]
    async fn append(&self, record: &ApprovalRecord) -> Result<(), VestryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO approval_records (id, assessment_id, cycle, approver, approved_on, notes)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.assessment_id.to_string())
        .bind(i64::from(record.cycle))
        .bind(record.approver.to_string())
        .bind(record.approved_on.to_string())
        .bind(&record.notes)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // The (assessment, cycle, approver) unique index is the
            // authoritative duplicate check.
            Err(sqlx::Error::Database(db)) if db.message().contains("UNIQUE") => {
                Err(VestryError::Validation(format!(
                    "approver {} already recorded for cycle {}",
                    record.approver, record.cycle
                )))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn for_cycle(
        &self,
        assessment_id: AssessmentId,
        cycle: u32,
    ) -> Result<Vec<ApprovalRecord>, VestryError> {
        let rows = sqlx::query(
            "SELECT id, assessment_id, cycle, approver, approved_on, notes
             FROM approval_records WHERE assessment_id = ? AND cycle = ?
             ORDER BY approved_on, approver",
        )
        .bind(assessment_id.to_string())
        .bind(i64::from(cycle))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn for_assessment(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<ApprovalRecord>, VestryError> {
        let rows = sqlx::query(
            "SELECT id, assessment_id, cycle, approver, approved_on, notes
             FROM approval_records WHERE assessment_id = ?
             ORDER BY cycle, approved_on, approver",
        )
        .bind(assessment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn count_distinct_approvers(
        &self,
        assessment_id: AssessmentId,
        cycle: u32,
    ) -> Result<u32, VestryError> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT approver) AS approvers
             FROM approval_records WHERE assessment_id = ? AND cycle = ?",
        )
        .bind(assessment_id.to_string())
        .bind(i64::from(cycle))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        int_column(&row, "approvers")
    }

    async fn approvers_for_cycle(
        &self,
        assessment_id: AssessmentId,
        cycle: u32,
    ) -> Result<Vec<MemberId>, VestryError> {
        let rows = sqlx::query(
            "SELECT DISTINCT approver FROM approval_records
             WHERE assessment_id = ? AND cycle = ?",
        )
        .bind(assessment_id.to_string())
        .bind(i64::from(cycle))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| parse_uuid(row.try_get::<String, _>("approver").map_err(db_err)?))
            .collect()
    }
}

fn row_to_record(row: SqliteRow) -> Result<ApprovalRecord, VestryError> {
    Ok(ApprovalRecord {
        id: parse_uuid(row.try_get("id").map_err(db_err)?)?,
        assessment_id: parse_uuid(row.try_get("assessment_id").map_err(db_err)?)?,
        cycle: int_column(&row, "cycle")?,
        approver: parse_uuid(row.try_get("approver").map_err(db_err)?)?,
        approved_on: parse_date(row.try_get("approved_on").map_err(db_err)?)?,
        notes: row.try_get("notes").map_err(db_err)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
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
    async fn append_enforces_cycle_uniqueness() {
        let store = test_store().await;
        let assessment_id = AssessmentId::new_v4();
        let approver = MemberId::new_v4();

        let record = ApprovalRecord::new(assessment_id, 1, approver, date(2026, 1, 10), "ok".into());
        store.append(&record).await.unwrap();

        // Same approver, same cycle: rejected by the unique index.
        let dup = ApprovalRecord::new(assessment_id, 1, approver, date(2026, 1, 11), String::new());
        let err = store.append(&dup).await.unwrap_err();
        assert!(matches!(err, VestryError::Validation(_)));

        // Same approver, next cycle: fine.
        let next_cycle =
            ApprovalRecord::new(assessment_id, 2, approver, date(2027, 1, 10), String::new());
        store.append(&next_cycle).await.unwrap();

        assert_eq!(
            store
                .count_distinct_approvers(assessment_id, 1)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn negative_cycle_column_surfaces_a_database_error() {
        let store = test_store().await;
        let assessment_id = AssessmentId::new_v4();
        let record = ApprovalRecord::new(
            assessment_id,
            1,
            MemberId::new_v4(),
            date(2026, 1, 10),
            String::new(),
        );
        store.append(&record).await.unwrap();

        sqlx::query("UPDATE approval_records SET cycle = -1 WHERE assessment_id = ?")
            .bind(assessment_id.to_string())
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.for_assessment(assessment_id).await.unwrap_err();
        assert!(matches!(err, VestryError::Database(_)));
        assert!(err.to_string().contains("cycle"));
    }

    #[tokio::test]
    async fn queries_scope_to_assessment_and_cycle() {
        let store = test_store().await;
        let a = AssessmentId::new_v4();
        let b = AssessmentId::new_v4();

        for (assessment, cycle) in [(a, 1), (a, 1), (a, 2), (b, 1)] {
            let record = ApprovalRecord::new(
                assessment,
                cycle,
                MemberId::new_v4(),
                date(2026, 3, 1),
                String::new(),
            );
            store.append(&record).await.unwrap();
        }

        assert_eq!(store.for_cycle(a, 1).await.unwrap().len(), 2);
        assert_eq!(store.for_cycle(a, 2).await.unwrap().len(), 1);
        assert_eq!(store.for_assessment(a).await.unwrap().len(), 3);
        assert_eq!(store.count_distinct_approvers(a, 1).await.unwrap(), 2);
        assert_eq!(store.count_distinct_approvers(b, 2).await.unwrap(), 0);
        assert_eq!(store.approvers_for_cycle(a, 1).await.unwrap().len(), 2);
    }
}

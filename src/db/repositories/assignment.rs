//! Assignment request repository
//!
//! Status changes go through [`AssignmentRepository::transition`], a
//! compare-and-set on the `status` and `proposed_price_cents` columns that
//! records an `assignment_events` row in the same transaction. Money
//! columns hold integer cents.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{AssignmentEvent, AssignmentPatch, AssignmentRequest, AssignmentStatus, Money};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// A compare-and-set status change
#[derive(Debug, Clone)]
pub struct StatusChange<'a> {
    pub id: i64,
    pub from: AssignmentStatus,
    /// Proposed price the caller read; the row must still carry it
    pub proposed_price: Option<Money>,
    pub to: AssignmentStatus,
    pub patch: &'a AssignmentPatch,
    pub actor_id: i64,
    pub note: Option<&'a str>,
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn create(&self, assignment: &AssignmentRequest) -> Result<AssignmentRequest>;

    async fn get_by_id(&self, id: i64) -> Result<Option<AssignmentRequest>>;

    /// Every request, newest first
    async fn list(&self) -> Result<Vec<AssignmentRequest>>;

    /// One client's requests, newest first
    async fn list_by_client(&self, client_id: i64) -> Result<Vec<AssignmentRequest>>;

    /// Apply `change` only if the row is still in `change.from` with the
    /// same proposed price.
    ///
    /// Returns `false` when the row was missing or had already moved.
    async fn transition(&self, change: &StatusChange<'_>) -> Result<bool>;

    /// Audit trail of one request, oldest first
    async fn list_events(&self, assignment_id: i64) -> Result<Vec<AssignmentEvent>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count_by_status(&self) -> Result<Vec<(AssignmentStatus, i64)>>;
}

pub struct SqlxAssignmentRepository {
    pool: DynDatabasePool,
}

impl SqlxAssignmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AssignmentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AssignmentRepository for SqlxAssignmentRepository {
    async fn create(&self, assignment: &AssignmentRequest) -> Result<AssignmentRequest> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_assignment_sqlite(pool, assignment).await?,
            Backend::Mysql(pool) => create_assignment_mysql(pool, assignment).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Assignment not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<AssignmentRequest>> {
        let sql = format!("{} WHERE a.id = ?", SELECT_ASSIGNMENT);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get assignment by ID")?;
                row.map(|row| row_to_assignment_sqlite(&row)).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get assignment by ID")?;
                row.map(|row| row_to_assignment_mysql(&row)).transpose()
            }
        }
    }

    async fn list(&self) -> Result<Vec<AssignmentRequest>> {
        let sql = format!("{} ORDER BY a.created_at DESC, a.id DESC", SELECT_ASSIGNMENT);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list assignments")?;
                rows.iter().map(row_to_assignment_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list assignments")?;
                rows.iter().map(row_to_assignment_mysql).collect()
            }
        }
    }

    async fn list_by_client(&self, client_id: i64) -> Result<Vec<AssignmentRequest>> {
        let sql = format!(
            "{} WHERE a.client_id = ? ORDER BY a.created_at DESC, a.id DESC",
            SELECT_ASSIGNMENT
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(client_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list client assignments")?;
                rows.iter().map(row_to_assignment_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(client_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list client assignments")?;
                rows.iter().map(row_to_assignment_mysql).collect()
            }
        }
    }

    async fn transition(&self, change: &StatusChange<'_>) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => transition_sqlite(pool, change).await,
            Backend::Mysql(pool) => transition_mysql(pool, change).await,
        }
    }

    async fn list_events(&self, assignment_id: i64) -> Result<Vec<AssignmentEvent>> {
        let sql = r#"
            SELECT id, assignment_id, actor_id, from_status, to_status, note, created_at
            FROM assignment_events
            WHERE assignment_id = ?
            ORDER BY id ASC
        "#;
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(sql)
                    .bind(assignment_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list assignment events")?;
                rows.iter()
                    .map(|row| {
                        event_from_parts(
                            row.get("id"),
                            row.get("assignment_id"),
                            row.get("actor_id"),
                            row.get("from_status"),
                            row.get("to_status"),
                            row.get("note"),
                            row.get("created_at"),
                        )
                    })
                    .collect()
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(sql)
                    .bind(assignment_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list assignment events")?;
                rows.iter()
                    .map(|row| {
                        event_from_parts(
                            row.get("id"),
                            row.get("assignment_id"),
                            row.get("actor_id"),
                            row.get("from_status"),
                            row.get("to_status"),
                            row.get("note"),
                            row.get("created_at"),
                        )
                    })
                    .collect()
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM assignment_requests WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_by_status(&self) -> Result<Vec<(AssignmentStatus, i64)>> {
        let sql = "SELECT status, COUNT(*) as count FROM assignment_requests GROUP BY status";
        let rows: Vec<(String, i64)> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to count assignments")?
                .iter()
                .map(|row| (row.get("status"), row.get("count")))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to count assignments")?
                .iter()
                .map(|row| (row.get("status"), row.get("count")))
                .collect(),
        };
        rows.into_iter()
            .map(|(status, count)| Ok((AssignmentStatus::from_str(&status)?, count)))
            .collect()
    }
}

const SELECT_ASSIGNMENT: &str = r#"
    SELECT a.id, a.client_id, u.full_name AS client_name, a.title, a.subject, a.description,
           a.status, a.deadline, a.proposed_price_cents, a.final_price_cents, a.currency,
           a.doctor_name,
           a.doctor_notes, a.client_notes, a.rejection_reason, a.has_attachment,
           a.attachment_url, a.payment_proof_url, a.created_at, a.updated_at
    FROM assignment_requests a
    LEFT JOIN users u ON u.id = a.client_id
"#;

const INSERT_ASSIGNMENT: &str = r#"
    INSERT INTO assignment_requests
        (client_id, title, subject, description, status, deadline, proposed_price_cents,
         final_price_cents,
         currency, doctor_name, doctor_notes, client_notes, rejection_reason, has_attachment,
         attachment_url, payment_proof_url, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_STATUS: &str = r#"
    UPDATE assignment_requests
    SET status = ?,
        proposed_price_cents = COALESCE(?, proposed_price_cents),
        final_price_cents = COALESCE(?, final_price_cents),
        currency = COALESCE(?, currency),
        doctor_name = COALESCE(?, doctor_name),
        doctor_notes = COALESCE(?, doctor_notes),
        client_notes = COALESCE(?, client_notes),
        rejection_reason = COALESCE(?, rejection_reason),
        payment_proof_url = COALESCE(?, payment_proof_url),
        updated_at = ?
    WHERE id = ? AND status = ?
      AND ((? IS NULL AND proposed_price_cents IS NULL) OR proposed_price_cents = ?)
"#;

const INSERT_EVENT: &str = r#"
    INSERT INTO assignment_events (assignment_id, actor_id, from_status, to_status, note, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

fn event_from_parts(
    id: i64,
    assignment_id: i64,
    actor_id: Option<i64>,
    from_status: String,
    to_status: String,
    note: Option<String>,
    created_at: chrono::DateTime<Utc>,
) -> Result<AssignmentEvent> {
    Ok(AssignmentEvent {
        id,
        assignment_id,
        actor_id,
        from_status: AssignmentStatus::from_str(&from_status)?,
        to_status: AssignmentStatus::from_str(&to_status)?,
        note,
        created_at,
    })
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_assignment_sqlite(pool: &SqlitePool, a: &AssignmentRequest) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_ASSIGNMENT)
        .bind(a.client_id)
        .bind(&a.title)
        .bind(&a.subject)
        .bind(&a.description)
        .bind(a.status.as_str())
        .bind(a.deadline)
        .bind(a.proposed_price.map(Money::cents))
        .bind(a.final_price.map(Money::cents))
        .bind(&a.currency)
        .bind(&a.doctor_name)
        .bind(&a.doctor_notes)
        .bind(&a.client_notes)
        .bind(&a.rejection_reason)
        .bind(a.has_attachment)
        .bind(&a.attachment_url)
        .bind(&a.payment_proof_url)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create assignment")?;

    Ok(result.last_insert_rowid())
}

async fn transition_sqlite(pool: &SqlitePool, change: &StatusChange<'_>) -> Result<bool> {
    let now = Utc::now();
    let patch = change.patch;
    let guard = change.proposed_price.map(Money::cents);
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(UPDATE_STATUS)
        .bind(change.to.as_str())
        .bind(patch.proposed_price.map(Money::cents))
        .bind(patch.final_price.map(Money::cents))
        .bind(&patch.currency)
        .bind(&patch.doctor_name)
        .bind(&patch.doctor_notes)
        .bind(&patch.client_notes)
        .bind(&patch.rejection_reason)
        .bind(&patch.payment_proof_url)
        .bind(now)
        .bind(change.id)
        .bind(change.from.as_str())
        .bind(guard)
        .bind(guard)
        .execute(&mut *tx)
        .await
        .context("Failed to update assignment status")?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(INSERT_EVENT)
        .bind(change.id)
        .bind(change.actor_id)
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(change.note)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to record assignment event")?;

    tx.commit().await.context("Failed to commit transition")?;
    Ok(true)
}

fn row_to_assignment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<AssignmentRequest> {
    let status: String = row.get("status");
    Ok(AssignmentRequest {
        id: row.get("id"),
        client_id: row.get("client_id"),
        client_name: row.get("client_name"),
        title: row.get("title"),
        subject: row.get("subject"),
        description: row.get("description"),
        status: AssignmentStatus::from_str(&status)?,
        deadline: row.get("deadline"),
        proposed_price: row
            .get::<Option<i64>, _>("proposed_price_cents")
            .map(Money::from_cents),
        final_price: row
            .get::<Option<i64>, _>("final_price_cents")
            .map(Money::from_cents),
        currency: row.get("currency"),
        doctor_name: row.get("doctor_name"),
        doctor_notes: row.get("doctor_notes"),
        client_notes: row.get("client_notes"),
        rejection_reason: row.get("rejection_reason"),
        has_attachment: row.get("has_attachment"),
        attachment_url: row.get("attachment_url"),
        payment_proof_url: row.get("payment_proof_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_assignment_mysql(pool: &MySqlPool, a: &AssignmentRequest) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_ASSIGNMENT)
        .bind(a.client_id)
        .bind(&a.title)
        .bind(&a.subject)
        .bind(&a.description)
        .bind(a.status.as_str())
        .bind(a.deadline)
        .bind(a.proposed_price.map(Money::cents))
        .bind(a.final_price.map(Money::cents))
        .bind(&a.currency)
        .bind(&a.doctor_name)
        .bind(&a.doctor_notes)
        .bind(&a.client_notes)
        .bind(&a.rejection_reason)
        .bind(a.has_attachment)
        .bind(&a.attachment_url)
        .bind(&a.payment_proof_url)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create assignment")?;

    Ok(result.last_insert_id() as i64)
}

async fn transition_mysql(pool: &MySqlPool, change: &StatusChange<'_>) -> Result<bool> {
    let now = Utc::now();
    let patch = change.patch;
    let guard = change.proposed_price.map(Money::cents);
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(UPDATE_STATUS)
        .bind(change.to.as_str())
        .bind(patch.proposed_price.map(Money::cents))
        .bind(patch.final_price.map(Money::cents))
        .bind(&patch.currency)
        .bind(&patch.doctor_name)
        .bind(&patch.doctor_notes)
        .bind(&patch.client_notes)
        .bind(&patch.rejection_reason)
        .bind(&patch.payment_proof_url)
        .bind(now)
        .bind(change.id)
        .bind(change.from.as_str())
        .bind(guard)
        .bind(guard)
        .execute(&mut *tx)
        .await
        .context("Failed to update assignment status")?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(INSERT_EVENT)
        .bind(change.id)
        .bind(change.actor_id)
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(change.note)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to record assignment event")?;

    tx.commit().await.context("Failed to commit transition")?;
    Ok(true)
}

fn row_to_assignment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<AssignmentRequest> {
    let status: String = row.get("status");
    Ok(AssignmentRequest {
        id: row.get("id"),
        client_id: row.get("client_id"),
        client_name: row.get("client_name"),
        title: row.get("title"),
        subject: row.get("subject"),
        description: row.get("description"),
        status: AssignmentStatus::from_str(&status)?,
        deadline: row.get("deadline"),
        proposed_price: row
            .get::<Option<i64>, _>("proposed_price_cents")
            .map(Money::from_cents),
        final_price: row
            .get::<Option<i64>, _>("final_price_cents")
            .map(Money::from_cents),
        currency: row.get("currency"),
        doctor_name: row.get("doctor_name"),
        doctor_notes: row.get("doctor_notes"),
        client_notes: row.get("client_notes"),
        rejection_reason: row.get("rejection_reason"),
        has_attachment: row.get("has_attachment"),
        attachment_url: row.get("attachment_url"),
        payment_proof_url: row.get("payment_proof_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

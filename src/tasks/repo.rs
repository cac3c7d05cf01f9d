use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Task record in the database. `status` is one of the four column labels;
/// the column carries a CHECK constraint mirroring `TaskStatus`.
#[derive(Debug, Clone, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub status: String,
    pub created_at: OffsetDateTime,
}

impl Task {
    pub async fn list_by_owner(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, content, status, created_at
            FROM tasks
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, content, status, created_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(task)
    }

    pub async fn insert(
        db: &PgPool,
        user_id: Uuid,
        content: &str,
        status: &str,
    ) -> anyhow::Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (user_id, content, status)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, content, status, created_at
            "#,
        )
        .bind(user_id)
        .bind(content)
        .bind(status)
        .fetch_one(db)
        .await?;
        Ok(task)
    }

    /// Set the status column only; all other fields are immutable.
    pub async fn update_status(db: &PgPool, id: Uuid, status: &str) -> anyhow::Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET status = $2
            WHERE id = $1
            RETURNING id, user_id, content, status, created_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(db)
        .await?;
        Ok(task)
    }

    /// Hard delete. Returns whether a row was removed.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

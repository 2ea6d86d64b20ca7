//! Repositories for database operations
//!
//! Every query is scoped to the session's user. Moves between `tasks` and
//! `unscheduled_tasks` run in a single transaction.

use anyhow::Result;
use planner::{
    NewScheduledTask, NewUnscheduledTask, ScheduledTask, Slot, TaskEdit, UnscheduledTask,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

pub mod goals;

const SCHEDULED_COLUMNS: &str = "id, name, description, category, color, duration, day, hour, \
     completed, project_id, created_at, updated_at";

const UNSCHEDULED_COLUMNS: &str = "id, name, description, category, color, duration, project_id";

pub(crate) fn scheduled_from_row(row: &PgRow) -> Result<ScheduledTask> {
    Ok(ScheduledTask {
        id: row.get::<Uuid, _>("id").to_string(),
        name: row.get("name"),
        description: row.get("description"),
        category: row.get("category"),
        color: row.get("color"),
        duration: row.get("duration"),
        day: u8::try_from(row.get::<i32, _>("day"))?,
        hour: u8::try_from(row.get::<i32, _>("hour"))?,
        completed: row.get("completed"),
        project_id: row
            .get::<Option<Uuid>, _>("project_id")
            .map(|id| id.to_string()),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn unscheduled_from_row(row: &PgRow) -> UnscheduledTask {
    UnscheduledTask {
        id: row.get::<Uuid, _>("id").to_string(),
        name: row.get("name"),
        description: row.get("description"),
        category: row.get("category"),
        color: row.get("color"),
        duration: row.get("duration"),
        project_id: row
            .get::<Option<Uuid>, _>("project_id")
            .map(|id| id.to_string()),
        step_id: None,
        task_type: None,
    }
}

fn parse_project_id(project_id: Option<&str>) -> Result<Option<Uuid>> {
    Ok(project_id.map(Uuid::parse_str).transpose()?)
}

/// Insert a scheduled task on an open connection or transaction
pub(crate) async fn insert_scheduled(
    conn: &mut PgConnection,
    user_id: Uuid,
    task: &NewScheduledTask,
) -> Result<ScheduledTask> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO tasks (user_id, name, description, category, color, duration, day, hour, project_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        SCHEDULED_COLUMNS
    ))
    .bind(user_id)
    .bind(&task.name)
    .bind(&task.description)
    .bind(&task.category)
    .bind(&task.color)
    .bind(&task.duration)
    .bind(i32::from(task.day))
    .bind(i32::from(task.hour))
    .bind(parse_project_id(task.project_id.as_deref())?)
    .fetch_one(conn)
    .await?;

    scheduled_from_row(&row)
}

/// Task repository for the scheduled and unscheduled collections
#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    /// Create a new task repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Scheduled tasks ordered by day, then hour
    pub async fn list_scheduled(&self, user_id: Uuid) -> Result<Vec<ScheduledTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tasks WHERE user_id = $1 ORDER BY day ASC, hour ASC",
            SCHEDULED_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(scheduled_from_row).collect()
    }

    pub async fn create_scheduled(
        &self,
        user_id: Uuid,
        task: &NewScheduledTask,
    ) -> Result<ScheduledTask> {
        let mut conn = self.pool.acquire().await?;
        insert_scheduled(&mut conn, user_id, task).await
    }

    pub async fn update_scheduled(
        &self,
        user_id: Uuid,
        id: Uuid,
        edit: &TaskEdit,
    ) -> Result<Option<ScheduledTask>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE tasks
            SET name = $3, description = $4, category = $5, color = $6, duration = $7,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            SCHEDULED_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(&edit.name)
        .bind(&edit.description)
        .bind(&edit.category)
        .bind(&edit.color)
        .bind(&edit.duration)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(scheduled_from_row).transpose()
    }

    pub async fn move_scheduled(
        &self,
        user_id: Uuid,
        id: Uuid,
        slot: Slot,
    ) -> Result<Option<ScheduledTask>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE tasks
            SET day = $3, hour = $4, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            SCHEDULED_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(i32::from(slot.day))
        .bind(i32::from(slot.hour))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(scheduled_from_row).transpose()
    }

    pub async fn set_completed(
        &self,
        user_id: Uuid,
        id: Uuid,
        completed: bool,
    ) -> Result<Option<ScheduledTask>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE tasks
            SET completed = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            SCHEDULED_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(completed)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(scheduled_from_row).transpose()
    }

    pub async fn delete_scheduled(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Unscheduled tasks, newest first
    pub async fn list_unscheduled(&self, user_id: Uuid) -> Result<Vec<UnscheduledTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM unscheduled_tasks WHERE user_id = $1 ORDER BY created_at DESC",
            UNSCHEDULED_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(unscheduled_from_row).collect())
    }

    pub async fn create_unscheduled(
        &self,
        user_id: Uuid,
        task: &NewUnscheduledTask,
    ) -> Result<UnscheduledTask> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO unscheduled_tasks (user_id, name, description, category, color, duration, project_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            UNSCHEDULED_COLUMNS
        ))
        .bind(user_id)
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.category)
        .bind(&task.color)
        .bind(&task.duration)
        .bind(parse_project_id(task.project_id.as_deref())?)
        .fetch_one(&self.pool)
        .await?;

        Ok(unscheduled_from_row(&row))
    }

    pub async fn delete_unscheduled(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM unscheduled_tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Move an unscheduled task onto the calendar
    pub async fn schedule_unscheduled(
        &self,
        user_id: Uuid,
        id: Uuid,
        slot: Slot,
    ) -> Result<Option<ScheduledTask>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "DELETE FROM unscheduled_tasks WHERE id = $1 AND user_id = $2 RETURNING {}",
            UNSCHEDULED_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let task = unscheduled_from_row(&row).scheduled_at(slot);
        let created = insert_scheduled(&mut tx, user_id, &task).await?;
        tx.commit().await?;

        Ok(Some(created))
    }

    /// Move a scheduled task back to the unscheduled pool
    pub async fn unschedule(&self, user_id: Uuid, id: Uuid) -> Result<Option<UnscheduledTask>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "DELETE FROM tasks WHERE id = $1 AND user_id = $2 RETURNING {}",
            SCHEDULED_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let task = scheduled_from_row(&row)?.to_unscheduled();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO unscheduled_tasks (user_id, name, description, category, color, duration, project_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            UNSCHEDULED_COLUMNS
        ))
        .bind(user_id)
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.category)
        .bind(&task.color)
        .bind(&task.duration)
        .bind(parse_project_id(task.project_id.as_deref())?)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(unscheduled_from_row(&row)))
    }
}

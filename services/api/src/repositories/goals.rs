//! Goal (project) repository

use std::collections::HashMap;

use anyhow::Result;
use planner::{Goal, GoalStep, ProjectStepPlacement, ScheduledTask};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::insert_scheduled;

/// Goal repository for project-derived tasks
#[derive(Clone)]
pub struct GoalRepository {
    pool: PgPool,
}

impl GoalRepository {
    /// Create a new goal repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Goals of a user, oldest first, each with its steps in order
    pub async fn list_with_steps(&self, user_id: Uuid) -> Result<Vec<Goal>> {
        let goal_rows = sqlx::query(
            r#"
            SELECT id, title, category
            FROM goals
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let step_rows = sqlx::query(
            r#"
            SELECT s.id, s.goal_id, s.text, s.completed, s.order_index
            FROM goal_steps s
            JOIN goals g ON g.id = s.goal_id
            WHERE g.user_id = $1
            ORDER BY s.order_index ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut steps: HashMap<Uuid, Vec<GoalStep>> = HashMap::new();
        for row in &step_rows {
            let goal_id: Uuid = row.get("goal_id");
            steps.entry(goal_id).or_default().push(GoalStep {
                id: row.get::<Uuid, _>("id").to_string(),
                goal_id: goal_id.to_string(),
                text: row.get("text"),
                completed: row.get("completed"),
                order_index: row.get("order_index"),
            });
        }

        Ok(goal_rows
            .iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                Goal {
                    id: id.to_string(),
                    title: row.get("title"),
                    category: row.get("category"),
                    steps: steps.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }

    /// Complete a step and put its task on the calendar in one transaction
    ///
    /// Returns `None` when the step does not exist or belongs to another user.
    pub async fn schedule_step(
        &self,
        user_id: Uuid,
        placement: &ProjectStepPlacement,
    ) -> Result<Option<ScheduledTask>> {
        let goal_id = Uuid::parse_str(&placement.goal_id)?;
        let step_id = Uuid::parse_str(&placement.step_id)?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE goal_steps
            SET completed = TRUE
            WHERE id = $1
              AND goal_id = $2
              AND goal_id IN (SELECT id FROM goals WHERE user_id = $3)
            "#,
        )
        .bind(step_id)
        .bind(goal_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let created = insert_scheduled(&mut tx, user_id, &placement.task).await?;
        tx.commit().await?;

        Ok(Some(created))
    }
}

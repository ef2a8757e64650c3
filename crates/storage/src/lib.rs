use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{Exploration, ExplorationId, UserId, UserSummary},
    protocol::StateHitSummary,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredExploration {
    pub exploration: Exploration,
    pub owner_user_id: Option<UserId>,
    pub is_public: bool,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredAnswer {
    pub handler: String,
    pub rule: String,
    pub answer_html: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredReaderFeedback {
    pub state_name: String,
    pub feedback: String,
    pub state_history: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of claiming a username.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameClaim {
    Claimed,
    Taken,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    // Users

    pub async fn create_user(&self, email: &str) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (email) VALUES (?)
             ON CONFLICT(email) DO UPDATE SET email=excluded.email
             RETURNING id",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<Option<UserSummary>> {
        let row = sqlx::query(
            "SELECT id, email, username, agreed_to_terms, is_admin FROM users WHERE id = ?",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserSummary {
            user_id: UserId(r.get::<i64, _>(0)),
            email: r.get::<String, _>(1),
            username: r.get::<Option<String>, _>(2),
            agreed_to_terms: r.get::<bool, _>(3),
            is_admin: r.get::<bool, _>(4),
        }))
    }

    pub async fn user_id_for_email(&self, email: &str) -> Result<Option<UserId>> {
        let row = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| UserId(r.get::<i64, _>(0))))
    }

    pub async fn set_admin(&self, user_id: UserId, is_admin: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_admin = ? WHERE id = ?")
            .bind(is_admin)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Accepts the terms and, when given, claims `username` in one statement
    /// so neither is stored without the other. Usernames are unique ignoring
    /// case; a clash leaves the user untouched.
    pub async fn complete_onboarding(
        &self,
        user_id: UserId,
        username: Option<&str>,
    ) -> Result<UsernameClaim> {
        let result = sqlx::query(
            "UPDATE users SET agreed_to_terms = 1, username = COALESCE(?, username) WHERE id = ?",
        )
        .bind(username)
        .bind(user_id.0)
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(UsernameClaim::Claimed),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(UsernameClaim::Taken),
            Err(e) => Err(e).context("failed to complete onboarding"),
        }
    }

    // Explorations

    /// Inserts or replaces an exploration, bumping its version. Rights columns
    /// are only written on insert.
    pub async fn save_exploration(
        &self,
        exploration: &Exploration,
        owner_user_id: Option<UserId>,
        is_public: bool,
    ) -> Result<i64> {
        let body = serde_json::to_string(exploration).context("failed to encode exploration")?;
        let rec = sqlx::query(
            "INSERT INTO explorations (id, title, category, owner_user_id, is_public, body)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title=excluded.title,
                category=excluded.category,
                body=excluded.body,
                version=explorations.version + 1,
                updated_at=CURRENT_TIMESTAMP
             RETURNING version",
        )
        .bind(exploration.id.as_str())
        .bind(&exploration.title)
        .bind(&exploration.category)
        .bind(owner_user_id.map(|id| id.0))
        .bind(is_public)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.get::<i64, _>(0))
    }

    pub async fn get_exploration(
        &self,
        exploration_id: &ExplorationId,
    ) -> Result<Option<StoredExploration>> {
        let row = sqlx::query(
            "SELECT body, owner_user_id, is_public, version, updated_at
             FROM explorations WHERE id = ?",
        )
        .bind(exploration_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        let Some(r) = row else {
            return Ok(None);
        };
        let exploration: Exploration = serde_json::from_str(&r.get::<String, _>(0))
            .with_context(|| format!("exploration '{exploration_id}' has a corrupt body"))?;
        Ok(Some(StoredExploration {
            exploration,
            owner_user_id: r.get::<Option<i64>, _>(1).map(UserId),
            is_public: r.get::<bool, _>(2),
            version: r.get::<i64, _>(3),
            updated_at: r.get::<DateTime<Utc>, _>(4),
        }))
    }

    pub async fn delete_exploration(&self, exploration_id: &ExplorationId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM explorations WHERE id = ?")
            .bind(exploration_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Public explorations ordered by id.
    pub async fn list_public_explorations(&self) -> Result<Vec<(ExplorationId, String)>> {
        let rows = sqlx::query("SELECT id, title FROM explorations WHERE is_public = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (ExplorationId(r.get::<String, _>(0)), r.get::<String, _>(1)))
            .collect())
    }

    pub async fn publish_exploration(&self, exploration_id: &ExplorationId) -> Result<bool> {
        let result = sqlx::query("UPDATE explorations SET is_public = 1 WHERE id = ?")
            .bind(exploration_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn add_editor(&self, exploration_id: &ExplorationId, user_id: UserId) -> Result<()> {
        sqlx::query(
            "INSERT INTO exploration_editors (exploration_id, user_id) VALUES (?, ?)
             ON CONFLICT(exploration_id, user_id) DO NOTHING",
        )
        .bind(exploration_id.as_str())
        .bind(user_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_editor(&self, exploration_id: &ExplorationId, user_id: UserId) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM exploration_editors WHERE exploration_id = ? AND user_id = ?",
        )
        .bind(exploration_id.as_str())
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    // Stats

    pub async fn record_state_hit(
        &self,
        exploration_id: &ExplorationId,
        state_name: &str,
        first_time: bool,
    ) -> Result<()> {
        sqlx::query("INSERT INTO state_hits (exploration_id, state_name, first_time) VALUES (?, ?, ?)")
            .bind(exploration_id.as_str())
            .bind(state_name)
            .bind(first_time)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_answer_submitted(
        &self,
        exploration_id: &ExplorationId,
        state_name: &str,
        handler: &str,
        rule: &str,
        answer_html: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO answer_submissions (exploration_id, state_name, handler, rule, answer_html)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(exploration_id.as_str())
        .bind(state_name)
        .bind(handler)
        .bind(rule)
        .bind(answer_html)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_reader_feedback(
        &self,
        exploration_id: &ExplorationId,
        state_name: &str,
        feedback: &str,
        state_history: &[String],
    ) -> Result<()> {
        let history = serde_json::to_string(state_history)?;
        sqlx::query(
            "INSERT INTO reader_feedback (exploration_id, state_name, feedback, state_history)
             VALUES (?, ?, ?, ?)",
        )
        .bind(exploration_id.as_str())
        .bind(state_name)
        .bind(feedback)
        .bind(history)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn state_hit_counts(
        &self,
        exploration_id: &ExplorationId,
    ) -> Result<Vec<StateHitSummary>> {
        let rows = sqlx::query(
            "SELECT state_name, SUM(first_time), COUNT(*)
             FROM state_hits
             WHERE exploration_id = ?
             GROUP BY state_name
             ORDER BY state_name",
        )
        .bind(exploration_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StateHitSummary {
                state_name: r.get::<String, _>(0),
                first_hits: u64::try_from(r.get::<i64, _>(1)).unwrap_or_default(),
                total_hits: u64::try_from(r.get::<i64, _>(2)).unwrap_or_default(),
            })
            .collect())
    }

    pub async fn list_answers(
        &self,
        exploration_id: &ExplorationId,
        state_name: &str,
    ) -> Result<Vec<StoredAnswer>> {
        let rows = sqlx::query(
            "SELECT handler, rule, answer_html, created_at
             FROM answer_submissions
             WHERE exploration_id = ? AND state_name = ?
             ORDER BY id",
        )
        .bind(exploration_id.as_str())
        .bind(state_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredAnswer {
                handler: r.get::<String, _>(0),
                rule: r.get::<String, _>(1),
                answer_html: r.get::<String, _>(2),
                created_at: r.get::<DateTime<Utc>, _>(3),
            })
            .collect())
    }

    pub async fn list_reader_feedback(
        &self,
        exploration_id: &ExplorationId,
    ) -> Result<Vec<StoredReaderFeedback>> {
        let rows = sqlx::query(
            "SELECT state_name, feedback, state_history, created_at
             FROM reader_feedback
             WHERE exploration_id = ?
             ORDER BY id",
        )
        .bind(exploration_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                Ok(StoredReaderFeedback {
                    state_name: r.get::<String, _>(0),
                    feedback: r.get::<String, _>(1),
                    state_history: serde_json::from_str(&r.get::<String, _>(2))
                        .context("corrupt reader feedback history")?,
                    created_at: r.get::<DateTime<Utc>, _>(3),
                })
            })
            .collect()
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

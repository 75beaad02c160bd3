use crate::db::models::{
    DbDailyFact, DbDelivery, DbInterestAnalysis, DbInterestCategory, DbOnboardingResponse,
    DbProfile, DeliveryStats, HistoryEntry, NewDailyFact,
};
use crate::db::schema::{DEFAULT_CATEGORIES, SQLITE_INIT};
use crate::error::ChronikosError;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

const PROFILE_COLUMNS: &str = "user_id, experience_level, preferred_fact_length, language, \
     daily_notification_enabled, notification_time, timezone, push_subscription, \
     created_at, updated_at";

const FACT_COLUMNS: &str = "id, user_id, fact_date, fact_heading, fact_content, source_prompt, \
     llm_model, is_verified, created_at";

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, ChronikosError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives and dies with its connection.
        let pool = if database_url.contains(":memory:") || database_url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(connect_opts)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(connect_opts).await?
        };

        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute the bundled DDL and seed the default interest categories.
    pub async fn init_schema(&self) -> Result<(), ChronikosError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        for &(name, description) in DEFAULT_CATEGORIES {
            sqlx::query("INSERT OR IGNORE INTO interest_categories (name, description) VALUES (?, ?)")
                .bind(name)
                .bind(description)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    // ---- profiles ----

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<DbProfile>, ChronikosError> {
        let row = sqlx::query_as::<_, DbProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Upsert the questionnaire-owned profile fields, leaving notification settings alone.
    pub async fn upsert_questionnaire_profile(
        &self,
        user_id: &str,
        experience_level: &str,
        preferred_fact_length: &str,
        language: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ChronikosError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                user_id, experience_level, preferred_fact_length, language, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                experience_level=excluded.experience_level,
                preferred_fact_length=excluded.preferred_fact_length,
                language=excluded.language,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(experience_level)
        .bind(preferred_fact_length)
        .bind(language)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_notification_settings(
        &self,
        user_id: &str,
        enabled: bool,
        notification_time: &str,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ChronikosError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                user_id, daily_notification_enabled, notification_time, timezone, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                daily_notification_enabled=excluded.daily_notification_enabled,
                notification_time=excluded.notification_time,
                timezone=excluded.timezone,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(enabled)
        .bind(notification_time)
        .bind(timezone)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Store (or clear, with `None`) the push subscription and set the daily flag with it.
    pub async fn set_push_subscription(
        &self,
        user_id: &str,
        subscription_json: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ChronikosError> {
        let enabled = subscription_json.is_some();
        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                user_id, push_subscription, daily_notification_enabled, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                push_subscription=excluded.push_subscription,
                daily_notification_enabled=excluded.daily_notification_enabled,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(subscription_json)
        .bind(enabled)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop a subscription the push service no longer accepts.
    pub async fn prune_push_subscription(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ChronikosError> {
        sqlx::query(
            "UPDATE user_profiles SET push_subscription = NULL, updated_at = ? WHERE user_id = ?",
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Profiles with daily notifications on and a push subscription stored.
    pub async fn list_notifiable(&self) -> Result<Vec<DbProfile>, ChronikosError> {
        let rows = sqlx::query_as::<_, DbProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles \
             WHERE daily_notification_enabled = 1 AND push_subscription IS NOT NULL \
             ORDER BY user_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- questionnaire ----

    pub async fn list_categories(&self) -> Result<Vec<DbInterestCategory>, ChronikosError> {
        let rows = sqlx::query_as::<_, DbInterestCategory>(
            "SELECT id, name, description FROM interest_categories ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Upsert by unique (user_id, version). Returns the row id.
    pub async fn upsert_onboarding_response(
        &self,
        user_id: &str,
        response_json: &str,
        version: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, ChronikosError> {
        sqlx::query(
            r#"
            INSERT INTO user_onboarding_responses (user_id, response_data, completed_at, version)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, version) DO UPDATE SET
                response_data=excluded.response_data,
                completed_at=excluded.completed_at
            "#,
        )
        .bind(user_id)
        .bind(response_json)
        .bind(now)
        .bind(version)
        .execute(&self.pool)
        .await?;

        let rec: (i64,) = sqlx::query_as(
            "SELECT id FROM user_onboarding_responses WHERE user_id = ? AND version = ?",
        )
        .bind(user_id)
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.0)
    }

    pub async fn get_onboarding_response(
        &self,
        id: i64,
    ) -> Result<Option<DbOnboardingResponse>, ChronikosError> {
        let row = sqlx::query_as::<_, DbOnboardingResponse>(
            "SELECT id, user_id, response_data, completed_at, version \
             FROM user_onboarding_responses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Replace all interest levels of a user in one transaction.
    pub async fn replace_interests(
        &self,
        user_id: &str,
        levels: &[(i64, i64)],
    ) -> Result<(), ChronikosError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_interests WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for &(category_id, level) in levels {
            sqlx::query(
                "INSERT INTO user_interests (user_id, category_id, interest_level) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(category_id)
            .bind(level)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_interests(&self, user_id: &str) -> Result<Vec<(String, i64)>, ChronikosError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT c.name, i.interest_level FROM user_interests i \
             JOIN interest_categories c ON c.id = i.category_id \
             WHERE i.user_id = ? ORDER BY i.interest_level DESC, c.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- analysis ----

    /// Replace the user's analysis with a new one. Returns the new row id.
    pub async fn replace_analysis(
        &self,
        user_id: &str,
        onboarding_response_id: i64,
        analysis_prompt: &str,
        ai_response: &str,
        ai_model: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, ChronikosError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_interest_analysis WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let rec: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO user_interest_analysis (
                user_id, onboarding_response_id, analysis_prompt, ai_response, ai_model, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(onboarding_response_id)
        .bind(analysis_prompt)
        .bind(ai_response)
        .bind(ai_model)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rec.0)
    }

    pub async fn get_analysis(
        &self,
        user_id: &str,
    ) -> Result<Option<DbInterestAnalysis>, ChronikosError> {
        let row = sqlx::query_as::<_, DbInterestAnalysis>(
            "SELECT id, user_id, onboarding_response_id, analysis_prompt, ai_response, ai_model, created_at \
             FROM user_interest_analysis WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // ---- facts ----

    pub async fn get_fact_for_date(
        &self,
        user_id: &str,
        fact_date: NaiveDate,
    ) -> Result<Option<DbDailyFact>, ChronikosError> {
        let row = sqlx::query_as::<_, DbDailyFact>(&format!(
            "SELECT {FACT_COLUMNS} FROM daily_facts WHERE user_id = ? AND fact_date = ?"
        ))
        .bind(user_id)
        .bind(fact_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a fact unless one already exists for (user, date); returns the stored row either way.
    pub async fn insert_fact(
        &self,
        fact: NewDailyFact,
        now: DateTime<Utc>,
    ) -> Result<DbDailyFact, ChronikosError> {
        sqlx::query(
            r#"
            INSERT INTO daily_facts (
                user_id, fact_date, fact_heading, fact_content, source_prompt, llm_model,
                is_verified, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            ON CONFLICT(user_id, fact_date) DO NOTHING
            "#,
        )
        .bind(&fact.user_id)
        .bind(fact.fact_date)
        .bind(&fact.fact_heading)
        .bind(&fact.fact_content)
        .bind(&fact.source_prompt)
        .bind(&fact.llm_model)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_fact_for_date(&fact.user_id, fact.fact_date)
            .await?
            .ok_or_else(|| ChronikosError::NotFound("daily fact".to_string()))
    }

    /// Headings of the user's most recent facts, newest first.
    pub async fn recent_headings(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<String>, ChronikosError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT fact_heading FROM daily_facts WHERE user_id = ? \
             ORDER BY fact_date DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    // ---- deliveries ----

    /// Record that a fact reached the user. Returns false if it was already recorded.
    pub async fn record_delivery(
        &self,
        user_id: &str,
        daily_fact_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, ChronikosError> {
        let res = sqlx::query(
            r#"
            INSERT INTO user_daily_facts (user_id, daily_fact_id, delivered_at, is_read)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(user_id, daily_fact_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(daily_fact_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn has_delivery(
        &self,
        user_id: &str,
        daily_fact_id: i64,
    ) -> Result<bool, ChronikosError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_daily_facts WHERE user_id = ? AND daily_fact_id = ?",
        )
        .bind(user_id)
        .bind(daily_fact_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn last_delivery(&self, user_id: &str) -> Result<Option<DbDelivery>, ChronikosError> {
        let row = sqlx::query_as::<_, DbDelivery>(
            "SELECT id, user_id, daily_fact_id, delivered_at, is_read, read_at \
             FROM user_daily_facts WHERE user_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Mark a delivered fact as read. Returns false when no delivery matched.
    pub async fn mark_read(
        &self,
        user_id: &str,
        daily_fact_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, ChronikosError> {
        let res = sqlx::query(
            "UPDATE user_daily_facts SET is_read = 1, read_at = ? \
             WHERE user_id = ? AND daily_fact_id = ?",
        )
        .bind(now)
        .bind(user_id)
        .bind(daily_fact_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn history(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<HistoryEntry>, ChronikosError> {
        let rows = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT d.daily_fact_id, f.fact_date, f.fact_heading, f.fact_content,
                   d.delivered_at, d.is_read, d.read_at
            FROM user_daily_facts d
            JOIN daily_facts f ON f.id = d.daily_fact_id
            WHERE d.user_id = ?
            ORDER BY d.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All-time (delivered, read) counts for a user, independent of any page limit.
    pub async fn history_totals(&self, user_id: &str) -> Result<(i64, i64), ChronikosError> {
        let totals: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(is_read), 0) FROM user_daily_facts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    /// Subscription and delivery counters for one UTC day `[day_start, day_end)`.
    pub async fn delivery_stats(
        &self,
        today: NaiveDate,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<DeliveryStats, ChronikosError> {
        let active_subscriptions: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_profiles \
             WHERE daily_notification_enabled = 1 AND push_subscription IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        let facts_generated_today: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM daily_facts WHERE fact_date = ?")
                .bind(today)
                .fetch_one(&self.pool)
                .await?;
        let (todays_deliveries, read_count): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(is_read), 0) FROM user_daily_facts \
             WHERE delivered_at >= ? AND delivered_at < ?",
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(DeliveryStats {
            active_subscriptions,
            facts_generated_today,
            todays_deliveries,
            read_count,
        })
    }
}

use crate::types::locale::Locale;
use crate::types::push::PushSubscription;
use crate::types::questionnaire::FactLength;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbProfile {
    pub user_id: String,
    pub experience_level: String,
    pub preferred_fact_length: String,
    pub language: String,
    pub daily_notification_enabled: bool,
    pub notification_time: Option<String>,
    pub timezone: String,
    pub push_subscription: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbProfile {
    /// Profile values used before a user has saved anything.
    pub fn empty(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            experience_level: "beginner".to_string(),
            preferred_fact_length: "medium".to_string(),
            language: "English".to_string(),
            daily_notification_enabled: false,
            notification_time: None,
            timezone: "UTC".to_string(),
            push_subscription: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn locale(&self) -> Locale {
        Locale::from_language(&self.language)
    }

    pub fn fact_length(&self) -> FactLength {
        FactLength::parse(&self.preferred_fact_length).unwrap_or_default()
    }

    /// Decoded push subscription; a row that no longer parses is treated as absent.
    pub fn subscription(&self) -> Option<PushSubscription> {
        self.push_subscription
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DbInterestCategory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbOnboardingResponse {
    pub id: i64,
    pub user_id: String,
    pub response_data: String,
    pub completed_at: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbInterestAnalysis {
    pub id: i64,
    pub user_id: String,
    pub onboarding_response_id: i64,
    pub analysis_prompt: String,
    pub ai_response: String,
    pub ai_model: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbDailyFact {
    pub id: i64,
    pub user_id: String,
    pub fact_date: NaiveDate,
    pub fact_heading: String,
    pub fact_content: String,
    pub source_prompt: String,
    pub llm_model: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Row inserted for a freshly generated fact.
#[derive(Debug, Clone)]
pub struct NewDailyFact {
    pub user_id: String,
    pub fact_date: NaiveDate,
    pub fact_heading: String,
    pub fact_content: String,
    pub source_prompt: String,
    pub llm_model: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbDelivery {
    pub id: i64,
    pub user_id: String,
    pub daily_fact_id: i64,
    pub delivered_at: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

/// Delivery joined with its fact, for the reading history.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct HistoryEntry {
    pub daily_fact_id: i64,
    pub fact_date: NaiveDate,
    pub fact_heading: String,
    pub fact_content: String,
    pub delivered_at: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

/// Aggregates reported by the notification status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub active_subscriptions: i64,
    pub facts_generated_today: i64,
    pub todays_deliveries: i64,
    pub read_count: i64,
}

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::db::Storage;
use crate::db::models::{DbDailyFact, DbProfile, NewDailyFact};
use crate::error::ChronikosError;
use crate::service::llm::TextGenerator;
use crate::service::prompt::{PREVIOUS_HEADINGS_LIMIT, build_fact_prompt, extract_heading};
use crate::service::schedule::{local_date, parse_timezone};

/// Result of asking for today's fact in-app.
#[derive(Debug, Clone, PartialEq)]
pub enum FactOutcome {
    Delivered(DbDailyFact),
    /// A new fact was requested before the cooldown since the last delivery ran out.
    Cooldown,
    /// No interest analysis yet, so nothing can be personalized.
    AnalysisMissing,
}

/// Generates, stores and hands out daily facts.
#[derive(Clone)]
pub struct FactService {
    storage: Storage,
    generator: Arc<dyn TextGenerator>,
    cooldown: Duration,
}

impl FactService {
    pub fn new(storage: Storage, generator: Arc<dyn TextGenerator>, cooldown_hours: i64) -> Self {
        Self {
            storage,
            generator,
            cooldown: Duration::hours(cooldown_hours),
        }
    }

    /// Today's fact for the in-app reader, generating it when due.
    pub async fn deliver(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FactOutcome, ChronikosError> {
        let profile = self
            .storage
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| DbProfile::empty(user_id, now));
        let fact_date = local_date(profile_timezone(&profile), now);

        if let Some(fact) = self.storage.get_fact_for_date(user_id, fact_date).await? {
            self.storage.record_delivery(user_id, fact.id, now).await?;
            return Ok(FactOutcome::Delivered(fact));
        }

        if let Some(last) = self.storage.last_delivery(user_id).await?
            && now - last.delivered_at < self.cooldown
        {
            return Ok(FactOutcome::Cooldown);
        }

        match self.generate(&profile, fact_date, now).await? {
            Some(fact) => {
                self.storage.record_delivery(user_id, fact.id, now).await?;
                Ok(FactOutcome::Delivered(fact))
            }
            None => Ok(FactOutcome::AnalysisMissing),
        }
    }

    /// The stored fact for `fact_date`, or a newly generated one. `None` without an analysis.
    pub async fn get_or_generate(
        &self,
        profile: &DbProfile,
        fact_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<DbDailyFact>, ChronikosError> {
        if let Some(fact) = self
            .storage
            .get_fact_for_date(&profile.user_id, fact_date)
            .await?
        {
            return Ok(Some(fact));
        }
        self.generate(profile, fact_date, now).await
    }

    async fn generate(
        &self,
        profile: &DbProfile,
        fact_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<DbDailyFact>, ChronikosError> {
        let user_id = profile.user_id.as_str();
        let Some(analysis) = self.storage.get_analysis(user_id).await? else {
            return Ok(None);
        };
        let headings = self
            .storage
            .recent_headings(user_id, PREVIOUS_HEADINGS_LIMIT)
            .await?;
        let prompt = build_fact_prompt(
            &analysis.ai_response,
            &headings,
            profile.fact_length(),
            profile.locale(),
        );

        let generated = self.generator.generate(&prompt).await?;
        let heading = extract_heading(&generated.text);
        let fact = self
            .storage
            .insert_fact(
                NewDailyFact {
                    user_id: user_id.to_string(),
                    fact_date,
                    fact_heading: heading,
                    fact_content: generated.text,
                    source_prompt: prompt,
                    llm_model: generated.model,
                },
                now,
            )
            .await?;
        info!(user_id, fact_id = fact.id, %fact_date, "daily fact generated");
        Ok(Some(fact))
    }
}

/// The profile's timezone; unparseable names fall back to UTC.
pub fn profile_timezone(profile: &DbProfile) -> Tz {
    parse_timezone(&profile.timezone).unwrap_or_else(|_| {
        warn!(user_id = %profile.user_id, timezone = %profile.timezone, "invalid stored timezone, using UTC");
        Tz::UTC
    })
}

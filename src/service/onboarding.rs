use chrono::{DateTime, Utc};
use tracing::info;

use crate::db::Storage;
use crate::error::ChronikosError;
use crate::service::llm::TextGenerator;
use crate::service::prompt::{build_analysis_prompt, interest_level};
use crate::types::questionnaire::{QUESTIONNAIRE_VERSION, QuestionnaireData};

/// Store the questionnaire and derive per-category interest levels.
/// Returns the onboarding response id.
pub async fn submit_questionnaire(
    storage: &Storage,
    user_id: &str,
    data: &QuestionnaireData,
    now: DateTime<Utc>,
) -> Result<i64, ChronikosError> {
    storage
        .upsert_questionnaire_profile(
            user_id,
            data.experience_level.as_str(),
            data.preferred_fact_length.as_str(),
            &data.language,
            now,
        )
        .await?;

    let response_json = serde_json::to_string(data)?;
    let response_id = storage
        .upsert_onboarding_response(user_id, &response_json, QUESTIONNAIRE_VERSION, now)
        .await?;

    let levels: Vec<(i64, i64)> = storage
        .list_categories()
        .await?
        .iter()
        .map(|c| (c.id, interest_level(&c.name, c.description.as_deref(), data)))
        .collect();
    storage.replace_interests(user_id, &levels).await?;

    info!(user_id, response_id, categories = levels.len(), "questionnaire stored");
    Ok(response_id)
}

/// Run the interest analysis for a stored onboarding response and keep it as the user's only one.
pub async fn analyze(
    storage: &Storage,
    generator: &dyn TextGenerator,
    user_id: &str,
    answers: &QuestionnaireData,
    onboarding_response_id: i64,
    now: DateTime<Utc>,
) -> Result<String, ChronikosError> {
    let response = storage
        .get_onboarding_response(onboarding_response_id)
        .await?
        .filter(|r| r.user_id == user_id)
        .ok_or_else(|| ChronikosError::NotFound("onboarding response".to_string()))?;

    let prompt = build_analysis_prompt(answers);
    let generated = generator.generate(&prompt).await?;

    storage
        .replace_analysis(
            user_id,
            response.id,
            &prompt,
            &generated.text,
            &generated.model,
            now,
        )
        .await?;
    info!(user_id, onboarding_response_id, "interest analysis stored");
    Ok(generated.text)
}

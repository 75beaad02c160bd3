use serde::{Deserialize, Serialize};
use std::fmt;

/// Onboarding response version written by the current questionnaire.
pub const QUESTIONNAIRE_VERSION: &str = "1.0";

/// Questions in the order the answers are rendered for analysis.
pub const QUESTIONS: [&str; 9] = [
    "What's your experience level with history?",
    "What length of facts do you prefer?",
    "Which historical periods interest you most? (Select all that apply)",
    "What types of historical topics fascinate you? (Select all that apply)",
    "Why are you interested in learning about history? (Select all that apply)",
    "Which regions of the world interest you most? (Select all that apply)",
    "Are there any specific historical figures you'd like to learn more about?",
    "What language do you prefer to read in?",
    "Is there anything else you'd like us to know about your historical interests?",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl FactLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "short" => Some(Self::Short),
            "medium" => Some(Self::Medium),
            "long" => Some(Self::Long),
            _ => None,
        }
    }

    /// Approximate target word count of a generated fact.
    pub fn target_words(&self) -> u32 {
        match self {
            Self::Short => 100,
            Self::Medium => 200,
            Self::Long => 300,
        }
    }
}

impl fmt::Display for FactLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionnaireData {
    pub experience_level: ExperienceLevel,
    pub preferred_fact_length: FactLength,
    pub time_periods: Vec<String>,
    pub topics: Vec<String>,
    pub learning_motivations: Vec<String>,
    pub historical_figures: String,
    pub regional_interests: Vec<String>,
    pub open_ended_response: String,
    pub language: String,
}

impl QuestionnaireData {
    /// Answers paired with [`QUESTIONS`], lists joined with `", "`.
    pub fn answers(&self) -> [String; 9] {
        [
            self.experience_level.as_str().to_string(),
            self.preferred_fact_length.as_str().to_string(),
            self.time_periods.join(", "),
            self.topics.join(", "),
            self.learning_motivations.join(", "),
            self.regional_interests.join(", "),
            self.historical_figures.clone(),
            self.language.clone(),
            self.open_ended_response.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_frontend_payload() {
        let raw = r#"{
            "experience_level": "advanced",
            "preferred_fact_length": "short",
            "time_periods": ["Medieval Period (500-1500)"],
            "topics": ["Wars & Conflicts", "Art & Culture"],
            "learning_motivations": [],
            "historical_figures": "Theodora",
            "regional_interests": ["Europe"],
            "open_ended_response": "",
            "language": "Greek"
        }"#;
        let data: QuestionnaireData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.experience_level, ExperienceLevel::Advanced);
        assert_eq!(data.preferred_fact_length, FactLength::Short);

        let answers = data.answers();
        assert_eq!(answers[3], "Wars & Conflicts, Art & Culture");
        assert_eq!(answers[4], "");
        assert_eq!(answers[7], "Greek");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let data: QuestionnaireData = serde_json::from_str(r#"{"topics": ["Daily Life"]}"#).unwrap();
        assert_eq!(data.experience_level, ExperienceLevel::Beginner);
        assert_eq!(data.preferred_fact_length, FactLength::Medium);
        assert!(data.time_periods.is_empty());
    }
}

use serde::{Deserialize, Serialize};

/// UI locales served by the front-end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    El,
}

impl Locale {
    /// Map the free-form questionnaire language answer to a locale.
    pub fn from_language(language: &str) -> Self {
        let lang = language.trim().to_lowercase();
        if lang == "el" || lang.starts_with("greek") || lang.starts_with("ελληνικ") {
            Locale::El
        } else {
            Locale::En
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::El => "el",
        }
    }

    pub fn default_notification_title(&self) -> &'static str {
        match self {
            Locale::En => "Today's Historical Fact",
            Locale::El => "Το σημερινό ιστορικό γεγονός",
        }
    }

    pub fn fact_opening(&self) -> &'static str {
        match self {
            Locale::En => "Did you know that...",
            Locale::El => "Ήξερες ότι...",
        }
    }

    pub fn language_name(&self) -> &'static str {
        match self {
            Locale::En => "English",
            Locale::El => "Greek",
        }
    }
}

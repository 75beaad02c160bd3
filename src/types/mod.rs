pub mod locale;
pub mod openai;
pub mod push;
pub mod questionnaire;

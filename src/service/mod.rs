pub mod dispatch;
pub mod dispatcher_actor;
pub mod facts;
pub mod llm;
pub mod onboarding;
pub mod prompt;
pub mod push;
pub mod schedule;

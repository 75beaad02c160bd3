use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::config::Config;
use crate::db::Storage;
use crate::error::ChronikosError;
use crate::handlers::{facts, notifications, onboarding, profile};
use crate::middleware::auth::TokenVerifier;
use crate::service::dispatch::Dispatcher;
use crate::service::dispatcher_actor::{self, DispatcherArgs, DispatcherHandle};
use crate::service::facts::FactService;
use crate::service::llm::TextGenerator;
use crate::service::push::PushSender;

const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Storage,
    pub generator: Arc<dyn TextGenerator>,
    pub facts: FactService,
    pub dispatcher: Dispatcher,
    pub dispatch_handle: DispatcherHandle,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Wire the services together and start the dispatcher actor.
    pub async fn new(
        config: Config,
        storage: Storage,
        generator: Arc<dyn TextGenerator>,
        push: Arc<dyn PushSender>,
    ) -> Result<Self, ChronikosError> {
        let config = Arc::new(config);
        let verifier = Arc::new(TokenVerifier::new(
            &config.auth.jwt_secret,
            &config.auth.audience,
        ));
        let facts = FactService::new(
            storage.clone(),
            generator.clone(),
            config.schedule.fact_cooldown_hours,
        );
        let dispatcher = Dispatcher::new(storage.clone(), facts.clone(), push, config.clone());

        let tick_interval = match config.schedule.tick_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let dispatch_handle = dispatcher_actor::spawn(DispatcherArgs {
            dispatcher: dispatcher.clone(),
            tick_interval,
        })
        .await?;

        Ok(Self {
            config,
            storage,
            generator,
            facts,
            dispatcher,
            dispatch_handle,
            verifier,
        })
    }
}

pub fn chronikos_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/interest-categories",
            get(onboarding::interest_categories_handler),
        )
        .route("/api/questionnaire", post(onboarding::questionnaire_handler))
        .route("/api/analysis", post(onboarding::analysis_handler))
        .route("/api/fact", post(facts::fact_handler))
        .route("/api/read", post(facts::read_handler))
        .route("/api/history", get(facts::history_handler))
        .route("/api/profile", get(profile::get_profile_handler))
        .route(
            "/api/profile/notifications",
            put(profile::update_notifications_handler),
        )
        .route("/api/push/subscribe", post(profile::subscribe_handler))
        .route("/api/push/unsubscribe", post(profile::unsubscribe_handler))
        .route(
            "/api/cron/notifications",
            get(notifications::cron_notifications_handler)
                .post(notifications::cron_notifications_handler),
        )
        .route(
            "/api/test-notification",
            post(notifications::test_notification_handler),
        )
        .route(
            "/api/notification-status",
            get(notifications::notification_status_handler),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

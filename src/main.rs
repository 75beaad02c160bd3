use std::sync::Arc;

use chronikos::config::Config;
use chronikos::db::Storage;
use chronikos::service::llm::{OpenAiGenerator, TextGenerator};
use chronikos::service::push::{DisabledPushSender, PushSender, WebPushSender};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        proxy = %cfg.basic.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.basic.loglevel,
        model = %cfg.llm.model,
        cron_secret = cfg.auth.cron_secret.is_some(),
    );
    if cfg.auth.jwt_secret.is_empty() {
        warn!("auth.jwt_secret is empty; every user request will be rejected");
    }

    let storage = Storage::connect(&cfg.basic.database_url).await?;

    let generator: Arc<dyn TextGenerator> =
        Arc::new(OpenAiGenerator::new(cfg.llm.clone(), &cfg.basic)?);

    let push: Arc<dyn PushSender> = match cfg.push.vapid_private_key_pem.as_deref() {
        Some(pem) => Arc::new(WebPushSender::new(pem.as_bytes(), &cfg.push)?),
        None => {
            warn!("push.vapid_private_key_pem not set; push notifications disabled");
            Arc::new(DisabledPushSender)
        }
    };

    let addr = cfg.basic.listen_addr.clone();
    let state = chronikos::router::AppState::new(cfg, storage, generator, push).await?;
    let app = chronikos::router::chronikos_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use chronikos::{
    ChronikosError,
    config::Config,
    db::Storage,
    router::{AppState, chronikos_router},
    service::{
        facts::FactOutcome,
        llm::{Generated, TextGenerator},
        push::PushSender,
    },
    types::push::{PushPayload, PushSubscription},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use serde_json::{Value, json};
use tower::ServiceExt;

const JWT_SECRET: &str = "test-jwt-secret";
const FACT_TEXT: &str = "The Night the Walls Fell\n\nDid you know that in 1453 ...";

struct FakeGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generated, ChronikosError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = if prompt.starts_with("You are an expert behavioral analyst") {
            "Drawn to Byzantine politics and siege warfare."
        } else {
            FACT_TEXT
        };
        Ok(Generated {
            text: text.to_string(),
            model: "fake-model".to_string(),
        })
    }
}

#[derive(Default)]
struct FakePush {
    gone: bool,
    sent: Mutex<Vec<(String, PushPayload)>>,
}

#[async_trait]
impl PushSender for FakePush {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), ChronikosError> {
        if self.gone {
            return Err(ChronikosError::PushSubscriptionGone);
        }
        self.sent
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.clone()));
        Ok(())
    }
}

struct Harness {
    app: Router,
    state: AppState,
    generator: Arc<FakeGenerator>,
    push: Arc<FakePush>,
}

async fn harness(cron_secret: Option<&str>, push: FakePush) -> Harness {
    let mut cfg = Config::default();
    cfg.auth.jwt_secret = JWT_SECRET.to_string();
    cfg.auth.cron_secret = cron_secret.map(str::to_string);
    harness_with(cfg, push).await
}

async fn harness_with(cfg: Config, push: FakePush) -> Harness {
    let storage = Storage::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    let generator = Arc::new(FakeGenerator {
        calls: AtomicUsize::new(0),
    });
    let push = Arc::new(push);
    let state = AppState::new(cfg, storage, generator.clone(), push.clone())
        .await
        .expect("app state");
    Harness {
        app: chronikos_router(state.clone()),
        state,
        generator,
        push,
    }
}

fn token(user_id: &str) -> String {
    token_signed_with(user_id, JWT_SECRET)
}

fn token_signed_with(user_id: &str, secret: &str) -> String {
    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        aud: &'a str,
        exp: i64,
    }
    encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sub: user_id,
            aud: "authenticated",
            exp: Utc::now().timestamp() + 3600,
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode token")
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        req = req.header("authorization", format!("Bearer {bearer}"));
    }
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    respond(app, req.body(body).expect("failed to build request")).await
}

/// Like [`call`] but with a body sent verbatim as JSON.
async fn call_raw(app: &Router, uri: &str, bearer: &str, raw: &'static str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {bearer}"))
        .header("content-type", "application/json")
        .body(Body::from(raw))
        .expect("failed to build request");
    respond(app, req).await
}

async fn respond(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request failed");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn questionnaire() -> Value {
    json!({
        "experience_level": "intermediate",
        "preferred_fact_length": "short",
        "time_periods": ["Medieval Period (500-1500)"],
        "topics": ["Wars & Conflicts"],
        "learning_motivations": ["Personal curiosity"],
        "historical_figures": "Constantine XI",
        "regional_interests": ["Europe"],
        "open_ended_response": "",
        "language": "English"
    })
}

fn subscription() -> Value {
    json!({
        "endpoint": "https://push.example.com/send/abc",
        "expirationTime": null,
        "keys": {
            "p256dh": URL_SAFE_NO_PAD.encode([4u8; 65]),
            "auth": URL_SAFE_NO_PAD.encode([7u8; 16]),
        }
    })
}

/// Questionnaire then analysis, leaving the user ready for facts.
async fn onboard(app: &Router, bearer: &str) {
    let (status, body) = call(app, "POST", "/api/questionnaire", Some(bearer), Some(questionnaire())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response_id = body["onboarding_response_id"].as_i64().expect("response id");

    let (status, body) = call(
        app,
        "POST",
        "/api/analysis",
        Some(bearer),
        Some(json!({ "answers": questionnaire(), "onboarding_response_id": response_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["record"], "Drawn to Byzantine politics and siege warfare.");
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

#[tokio::test]
async fn categories_are_public_and_seeded() {
    let h = harness(None, FakePush::default()).await;
    let (status, body) = call(&h.app, "GET", "/api/interest-categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["categories"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn user_routes_require_a_valid_token() {
    let h = harness(None, FakePush::default()).await;

    let (status, body) = call(&h.app, "POST", "/api/fact", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = call(&h.app, "GET", "/api/history", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_jwt_secret_rejects_tokens_signed_with_empty_key() {
    let h = harness_with(Config::default(), FakePush::default()).await;
    let forged = token_signed_with("victim", "");

    let (status, body) = call(&h.app, "GET", "/api/profile", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn malformed_bodies_get_the_json_error_shape() {
    let h = harness(None, FakePush::default()).await;
    let bearer = token("user-j");

    let (status, body) = call_raw(&h.app, "/api/read", &bearer, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let (status, body) = call_raw(
        &h.app,
        "/api/read",
        &bearer,
        r#"{"daily_fact_id": "seven"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = call_raw(&h.app, "/api/questionnaire", &bearer, r#""just a string""#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn fact_before_analysis_is_refused() {
    let h = harness(None, FakePush::default()).await;
    let bearer = token("user-a");

    let (status, body) = call(&h.app, "POST", "/api/fact", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "analysis_missing");
}

#[tokio::test]
async fn analysis_for_someone_elses_response_is_not_found() {
    let h = harness(None, FakePush::default()).await;
    let owner = token("owner");
    let (_, body) = call(&h.app, "POST", "/api/questionnaire", Some(&owner), Some(questionnaire())).await;
    let response_id = body["onboarding_response_id"].as_i64().unwrap();

    let (status, body) = call(
        &h.app,
        "POST",
        "/api/analysis",
        Some(&token("intruder")),
        Some(json!({ "answers": questionnaire(), "onboarding_response_id": response_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "onboarding_response_not_found");
}

#[tokio::test]
async fn onboarding_fact_read_and_history() {
    let h = harness(None, FakePush::default()).await;
    let bearer = token("user-b");
    onboard(&h.app, &bearer).await;

    let (status, fact) = call(&h.app, "POST", "/api/fact", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK, "{fact}");
    assert_eq!(fact["success"], true);
    assert_eq!(fact["heading"], "The Night the Walls Fell");
    let fact_id = fact["daily_fact_id"].as_i64().unwrap();

    // same day: the stored fact comes back without another completion
    let (_, again) = call(&h.app, "POST", "/api/fact", Some(&bearer), None).await;
    assert_eq!(again["daily_fact_id"].as_i64(), Some(fact_id));
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);

    let (status, body) = call(&h.app, "POST", "/api/read", Some(&bearer), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "missing_parameters");

    let (status, body) = call(
        &h.app,
        "POST",
        "/api/read",
        Some(&bearer),
        Some(json!({ "daily_fact_id": fact_id + 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "delivery_not_found");

    let (status, _) = call(
        &h.app,
        "POST",
        "/api/read",
        Some(&bearer),
        Some(json!({ "daily_fact_id": fact_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, history) = call(&h.app, "GET", "/api/history", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 1);
    assert_eq!(history["read"], 1);
    assert_eq!(history["entries"][0]["fact_heading"], "The Night the Walls Fell");
}

#[tokio::test]
async fn new_fact_waits_for_the_cooldown() {
    let h = harness(None, FakePush::default()).await;
    let bearer = token("user-c");
    onboard(&h.app, &bearer).await;

    let first = h.state.facts.deliver("user-c", at(2026, 3, 1, 23, 0)).await.unwrap();
    let FactOutcome::Delivered(first) = first else {
        panic!("expected a fact, got {first:?}");
    };

    // next UTC day but only two hours later
    let early = h.state.facts.deliver("user-c", at(2026, 3, 2, 1, 0)).await.unwrap();
    assert_eq!(early, FactOutcome::Cooldown);

    let later = h.state.facts.deliver("user-c", at(2026, 3, 3, 0, 0)).await.unwrap();
    match later {
        FactOutcome::Delivered(fact) => assert_ne!(fact.id, first.id),
        other => panic!("expected a new fact, got {other:?}"),
    }
}

#[tokio::test]
async fn profile_settings_and_subscription() {
    let h = harness(None, FakePush::default()).await;
    let bearer = token("user-d");

    let (status, body) = call(&h.app, "GET", "/api/profile", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["timezone"], "UTC");
    assert_eq!(body["profile"]["has_push_subscription"], false);

    let (status, _) = call(
        &h.app,
        "PUT",
        "/api/profile/notifications",
        Some(&bearer),
        Some(json!({
            "daily_notification_enabled": true,
            "notification_time": "25:00",
            "timezone": "Europe/Athens"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &h.app,
        "PUT",
        "/api/profile/notifications",
        Some(&bearer),
        Some(json!({
            "daily_notification_enabled": true,
            "notification_time": "09:30",
            "timezone": "Europe/Athens"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["profile"]["notification_time"], "09:30");

    let (status, _) = call(
        &h.app,
        "POST",
        "/api/push/subscribe",
        Some(&bearer),
        Some(json!({ "subscription": { "endpoint": "http://insecure.example.com", "keys": { "p256dh": "x", "auth": "y" } } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &h.app,
        "POST",
        "/api/push/subscribe",
        Some(&bearer),
        Some(json!({ "subscription": subscription() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&h.app, "GET", "/api/profile", Some(&bearer), None).await;
    assert_eq!(body["profile"]["has_push_subscription"], true);

    let (status, body) = call(&h.app, "POST", "/api/push/unsubscribe", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["daily_notification_enabled"], false);
    let (_, body) = call(&h.app, "GET", "/api/profile", Some(&bearer), None).await;
    assert_eq!(body["profile"]["has_push_subscription"], false);
    assert_eq!(body["profile"]["daily_notification_enabled"], false);
}

#[tokio::test]
async fn cron_routes_check_the_secret() {
    let h = harness(Some("cron-s3cret"), FakePush::default()).await;

    let (status, _) = call(&h.app, "GET", "/api/cron/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&h.app, "GET", "/api/notification-status", Some("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&h.app, "POST", "/api/cron/notifications", Some("cron-s3cret"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["due"], 0);

    let (status, body) = call(
        &h.app,
        "POST",
        "/api/test-notification",
        Some("cron-s3cret"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

async fn subscribe(h: &Harness, bearer: &str) {
    let (status, _) = call(
        &h.app,
        "POST",
        "/api/push/subscribe",
        Some(bearer),
        Some(json!({ "subscription": subscription() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

/// Onboarded, subscribed user notified at `time` in `timezone`.
async fn scheduled_user_at(h: &Harness, user_id: &str, time: &str, timezone: &str) {
    let bearer = token(user_id);
    onboard(&h.app, &bearer).await;
    subscribe(h, &bearer).await;
    let (status, _) = call(
        &h.app,
        "PUT",
        "/api/profile/notifications",
        Some(&bearer),
        Some(json!({
            "daily_notification_enabled": true,
            "notification_time": time,
            "timezone": timezone
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

/// Onboarded user in Athens, 09:30 local, subscribed.
async fn scheduled_user(h: &Harness, user_id: &str) {
    scheduled_user_at(h, user_id, "09:30", "Europe/Athens").await;
}

#[tokio::test]
async fn dispatch_notifies_due_users_once_per_day() {
    let h = harness(None, FakePush::default()).await;
    scheduled_user(&h, "user-e").await;

    // 07:32 UTC is 09:32 in Athens in March
    let early = h.state.dispatch_handle.run(at(2026, 3, 1, 7, 0)).await.unwrap();
    assert_eq!(early.considered, 1);
    assert_eq!(early.due, 0);

    let report = h.state.dispatch_handle.run(at(2026, 3, 1, 7, 32)).await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.sent, 1);
    {
        let sent = h.push.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://push.example.com/send/abc");
        assert_eq!(sent[0].1.title, "The Night the Walls Fell");
        assert!(sent[0].1.data.url.starts_with("/en?factId="));
    }

    let again = h.state.dispatch_handle.run(at(2026, 3, 1, 7, 34)).await.unwrap();
    assert_eq!(again.sent, 0);
    assert_eq!(again.already_notified, 1);
    assert_eq!(h.push.sent.lock().unwrap().len(), 1);

    let history = h.state.storage.history("user-e", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_read);
}

#[tokio::test]
async fn rejected_subscriptions_are_pruned() {
    let h = harness(
        None,
        FakePush {
            gone: true,
            ..Default::default()
        },
    )
    .await;
    scheduled_user(&h, "user-f").await;

    let report = h.state.dispatch_handle.run(at(2026, 3, 1, 7, 30)).await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.pruned, 1);

    let profile = h.state.storage.get_profile("user-f").await.unwrap().unwrap();
    assert!(profile.push_subscription.is_none());
}

#[tokio::test]
async fn late_evening_window_sends_one_push_per_day_across_midnight() {
    let h = harness(None, FakePush::default()).await;
    scheduled_user_at(&h, "user-g", "23:58", "UTC").await;

    let evening = h.state.dispatch_handle.run(at(2026, 3, 1, 23, 58)).await.unwrap();
    assert_eq!(evening.sent, 1);

    // same window, now past midnight: still the 1st's notification
    let past_midnight = h.state.dispatch_handle.run(at(2026, 3, 2, 0, 1)).await.unwrap();
    assert_eq!(past_midnight.due, 1);
    assert_eq!(past_midnight.sent, 0);
    assert_eq!(past_midnight.already_notified, 1);

    let next_evening = h.state.dispatch_handle.run(at(2026, 3, 2, 23, 58)).await.unwrap();
    assert_eq!(next_evening.sent, 1);
    assert_eq!(h.push.sent.lock().unwrap().len(), 2);

    let dates: Vec<_> = h
        .state
        .storage
        .history("user-g", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.fact_date.to_string())
        .collect();
    assert_eq!(dates, vec!["2026-03-02", "2026-03-01"]);
}

#[tokio::test]
async fn test_notification_broadcasts_to_every_subscriber() {
    let h = harness(Some("cron-s3cret"), FakePush::default()).await;
    subscribe(&h, &token("user-h")).await;
    subscribe(&h, &token("user-i")).await;

    let (status, body) = call(
        &h.app,
        "POST",
        "/api/test-notification",
        Some("cron-s3cret"),
        Some(json!({ "message": "Hello from the archive" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["report"]["recipients"], 2);
    assert_eq!(body["report"]["sent"], 2);
    {
        let sent = h.push.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        for (_, payload) in sent.iter() {
            assert_eq!(payload.title, "Test Notification from Chronikos");
            assert_eq!(payload.body, "Hello from the archive");
            assert_eq!(payload.data.url, "/");
            assert_eq!(payload.data.fact_id, None);
        }
    }

    let (status, _) = call(
        &h.app,
        "POST",
        "/api/test-notification",
        Some("cron-s3cret"),
        Some(json!({ "message": "Custom", "title": "Heads up" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.push.sent.lock().unwrap()[2].1.title, "Heads up");
}

#[tokio::test]
async fn notification_status_reports_todays_figures() {
    let h = harness(None, FakePush::default()).await;
    let bearer = token("user-k");
    onboard(&h.app, &bearer).await;
    subscribe(&h, &bearer).await;

    let (_, fact) = call(&h.app, "POST", "/api/fact", Some(&bearer), None).await;
    let fact_id = fact["daily_fact_id"].as_i64().expect("fact id");
    let (status, _) = call(
        &h.app,
        "POST",
        "/api/read",
        Some(&bearer),
        Some(json!({ "daily_fact_id": fact_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&h.app, "GET", "/api/notification-status", None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert!(body["date"].as_str().is_some_and(|d| d.len() == 10));
    let stats = &body["statistics"];
    assert_eq!(stats["activeSubscriptions"], 1);
    assert_eq!(stats["factsGeneratedToday"], 1);
    assert_eq!(stats["todaysDeliveries"], 1);
    assert_eq!(stats["readCount"], 1);
}

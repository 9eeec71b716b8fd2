/// HTTP surface tests: routes, status codes and admin token handling
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use moka::future::Cache;
use parkline_leads::bitrix_client::BitrixClient;
use parkline_leads::config::Config;
use parkline_leads::errors::StoreError;
use parkline_leads::handlers::{router, AppState};
use parkline_leads::i18n::{t, Language, MessageKey};
use parkline_leads::lead_store::{AuditLog, LeadStore};
use parkline_leads::models::{NewLead, StoredLead, SyncLogEntry};
use parkline_leads::pipeline::LeadPipeline;
use parkline_leads::settings::{SettingsStore, BITRIX_WEBHOOK_KEY};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct MemoryStore {
    ready: bool,
    delay: Duration,
    entered: Notify,
}

impl MemoryStore {
    fn new(ready: bool) -> Self {
        Self {
            ready,
            delay: Duration::ZERO,
            entered: Notify::new(),
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(true)
        }
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn create_lead(&self, lead: &NewLead) -> Result<StoredLead, StoreError> {
        if !self.ready {
            return Err(StoreError::NotInitialized);
        }
        self.entered.notify_one();
        tokio::time::sleep(self.delay).await;
        Ok(StoredLead {
            id: "lead-1".to_string(),
            created_at: Utc::now(),
            lead: lead.clone(),
        })
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn log_sync(&self, _entry: &SyncLogEntry) -> Result<(), StoreError> {
        Ok(())
    }
}

fn test_config(admin_token: Option<&str>) -> Config {
    Config {
        port: 0,
        database_url: None,
        bitrix_webhook_url: None,
        settings_path: "unused.json".into(),
        store_timeout: Duration::from_secs(10),
        form_close_delay: Duration::from_secs(3),
        default_language: Language::Mk,
        admin_token: admin_token.map(str::to_string),
    }
}

struct TestApp {
    app: Router,
    state: Arc<AppState>,
    _dir: tempfile::TempDir,
}

fn test_app(store_ready: bool, admin_token: Option<&str>) -> TestApp {
    test_app_with(Arc::new(MemoryStore::new(store_ready)), admin_token, None)
}

fn test_app_with(
    store: Arc<MemoryStore>,
    admin_token: Option<&str>,
    settings_path: Option<PathBuf>,
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = settings_path.unwrap_or_else(|| dir.path().join("settings.json"));
    let settings = Arc::new(SettingsStore::load(settings_path).unwrap());
    let bitrix = Arc::new(BitrixClient::new(None).unwrap());
    let pipeline = Arc::new(LeadPipeline::new(
        bitrix.clone(),
        store.clone(),
        store.clone(),
    ));

    let state = Arc::new(AppState {
        config: test_config(admin_token),
        pipeline,
        bitrix,
        store,
        settings,
        forms: Cache::builder().max_capacity(100).build(),
    });

    TestApp {
        app: router(state.clone()),
        state,
        _dir: dir,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("X-Admin-Token", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn lead_body(email: &str) -> Value {
    json!({
        "form_id": "form-1",
        "language": "en",
        "page_path": "/",
        "apartment": { "id": "A-12", "data": { "Floor": "12th floor" } },
        "contact": { "name": "Jane Doe", "email": email, "phone": "070123456" }
    })
}

#[tokio::test]
async fn test_health_reports_integrations() {
    let test = test_app(true, None);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store_configured"], true);
    assert_eq!(body["crm_configured"], false);
}

#[tokio::test]
async fn test_submit_lead_created() {
    let test = test_app(true, None);

    let (status, body) = send(
        &test.app,
        json_request("POST", "/api/v1/leads", lead_body("jane@x.com"), None),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["lead_id"], "lead-1");
    assert_eq!(body["form_id"], "form-1");
    assert_eq!(body["close_after_ms"], 3000);
    assert_eq!(body["message"], t(Language::En, MessageKey::Success));
}

#[tokio::test]
async fn test_submit_lead_validation_errors() {
    let test = test_app(true, None);

    let (status, body) = send(
        &test.app,
        json_request("POST", "/api/v1/leads", lead_body("jane@"), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["field_errors"],
        json!([{ "field": "email", "message": t(Language::En, MessageKey::ErrorEmail) }])
    );
}

#[tokio::test]
async fn test_submit_lead_store_not_configured() {
    let test = test_app(false, None);
    let mut body = lead_body("jane@x.com");
    body.as_object_mut().unwrap().remove("language");

    let (status, body) = send(
        &test.app,
        json_request("POST", "/api/v1/leads", body, None),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], t(Language::Mk, MessageKey::ErrorConfig));
}

#[tokio::test]
async fn test_admin_disabled_without_token() {
    let test = test_app(true, None);

    let request = Request::builder()
        .uri("/api/v1/admin/bitrix")
        .header("X-Admin-Token", "anything")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_rejects_wrong_token() {
    let test = test_app(true, Some("s3cret"));

    let (status, body) = send(
        &test.app,
        json_request(
            "PUT",
            "/api/v1/admin/bitrix",
            json!({ "webhook_url": "https://acme.bitrix24.com/rest/1/abc" }),
            Some("wrong"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
    assert!(test.state.bitrix.webhook_url().is_none());
}

#[tokio::test]
async fn test_admin_saves_and_verifies_webhook() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/1/abc/crm.lead.list.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
        .mount(&mock_server)
        .await;

    let test = test_app(true, Some("s3cret"));
    let webhook_url = format!("{}/rest/1/abc", mock_server.uri());

    let (status, body) = send(
        &test.app,
        json_request(
            "PUT",
            "/api/v1/admin/bitrix",
            json!({ "webhook_url": format!("{}/", webhook_url) }),
            Some("s3cret"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["message"],
        "Configuration saved and connection verified successfully!"
    );
    assert_eq!(test.state.bitrix.webhook_url(), Some(webhook_url.clone()));
    assert_eq!(
        test.state.settings.get(BITRIX_WEBHOOK_KEY).await,
        Some(webhook_url)
    );
}

#[tokio::test]
async fn test_admin_rejects_invalid_webhook() {
    let test = test_app(true, Some("s3cret"));

    let (status, _) = send(
        &test.app,
        json_request(
            "PUT",
            "/api/v1/admin/bitrix",
            json!({ "webhook_url": "ftp://acme/rest/1/abc" }),
            Some("s3cret"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(test.state.settings.get(BITRIX_WEBHOOK_KEY).await, None);
}

#[tokio::test]
async fn test_second_submit_of_same_form_conflicts() {
    let store = Arc::new(MemoryStore::slow(Duration::from_millis(300)));
    let test = test_app_with(store.clone(), None, None);

    let app = test.app.clone();
    let first = tokio::spawn(async move {
        send(
            &app,
            json_request("POST", "/api/v1/leads", lead_body("jane@x.com"), None),
        )
        .await
    });

    // First submission is now parked inside the store write
    store.entered.notified().await;

    let (status, body) = send(
        &test.app,
        json_request("POST", "/api/v1/leads", lead_body("jane@x.com"), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], t(Language::En, MessageKey::ErrorInFlight));

    let (status, body) = first.await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["lead_id"], "lead-1");
}

#[tokio::test]
async fn test_failed_webhook_save_leaves_client_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let test = test_app_with(
        Arc::new(MemoryStore::new(true)),
        Some("s3cret"),
        Some(blocker.join("settings.json")),
    );

    let (status, _) = send(
        &test.app,
        json_request(
            "PUT",
            "/api/v1/admin/bitrix",
            json!({ "webhook_url": "https://acme.bitrix24.com/rest/1/abc" }),
            Some("s3cret"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(test.state.bitrix.webhook_url(), None);
    assert_eq!(test.state.settings.get(BITRIX_WEBHOOK_KEY).await, None);
}

//! Integration test harness for the shop Mailchimp addon.
//!
//! # Running Tests
//!
//! ```bash
//! # Everything except the PostgreSQL tests
//! cargo test -p shop-mailchimp-integration-tests
//!
//! # Include the PostgreSQL tests
//! ADDON_DATABASE_URL=postgres://localhost/addon_test \
//!     cargo test -p shop-mailchimp-integration-tests -- --include-ignored
//! ```
//!
//! Mailchimp is replaced by [`FakeMailchimp`], a local axum server speaking
//! the list-member endpoints, so the real HTTP client code runs end to end.
//! [`TestAddon`] wires the addon on in-memory stores against it.
//!
//! Webhook requests must be signed with [`TEST_WEBHOOK_SECRET`] (see
//! [`sign_body`]) and admin requests carry [`TEST_ADMIN_TOKEN`].

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use shop_mailchimp_addon::{
    config::{AuthConfig, MailchimpClientConfig},
    dispatcher::Dispatcher,
    events::EventQueue,
    mailchimp::MailchimpClient,
    middleware::auth,
    settings::ShopSettings,
    state::AppState,
    store::{MemorySyncRecordStore, SettingsStore, SyncRecordStore},
    sync::MailchimpSync,
};
use shop_mailchimp_core::{
    Contact, ContactId, ContactKind, Email, Order, OrderId, SettingsForm, ShopId, SyncRecord,
};
use tokio::task::JoinHandle;
use url::Url;

/// API key used for every configured test shop.
pub const TEST_API_KEY: &str = "0123456789abcdef-us6";
/// List ID used for every configured test shop.
pub const TEST_LIST_ID: &str = "a1b2c3d4e5";
/// Bearer token accepted by the admin routes.
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";
/// Key the test platform signs webhooks with.
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

// =============================================================================
// Fake Mailchimp
// =============================================================================

/// One request received by the fake server.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug)]
struct Responses {
    get: StatusCode,
    put: StatusCode,
    post: StatusCode,
}

#[derive(Debug)]
struct FakeState {
    responses: Mutex<Responses>,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// A local stand-in for the Mailchimp list-member API.
///
/// By default every address is unknown (`GET` answers 404) and writes
/// succeed. Use [`FakeMailchimp::respond`] to change a verb's status.
#[derive(Debug, Clone)]
pub struct FakeMailchimp {
    base_url: Url,
    state: Arc<FakeState>,
}

impl FakeMailchimp {
    /// Start the server on an ephemeral port.
    pub async fn start() -> Self {
        let state = Arc::new(FakeState {
            responses: Mutex::new(Responses {
                get: StatusCode::NOT_FOUND,
                put: StatusCode::OK,
                post: StatusCode::OK,
            }),
            delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .fallback(handle_fake_request)
            .with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind fake Mailchimp");
        let addr = listener.local_addr().expect("Failed to read local address");
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake Mailchimp server error");
        });

        let base_url =
            Url::parse(&format!("http://{addr}/3.0")).expect("Failed to build fake base URL");
        Self { base_url, state }
    }

    /// Base URL to hand to the client instead of the data-center URL.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Client configuration pointing at this server.
    pub fn client_config(&self) -> MailchimpClientConfig {
        self.client_config_with_timeout(Duration::from_secs(5))
    }

    /// Client configuration pointing at this server with a custom timeout.
    pub fn client_config_with_timeout(&self, timeout: Duration) -> MailchimpClientConfig {
        MailchimpClientConfig {
            timeout,
            base_url: Some(self.base_url.clone()),
        }
    }

    /// Hold every following response for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().expect("delay lock") = delay;
    }

    /// Answer every following request with `method` using `status`.
    pub fn respond(&self, method: &Method, status: StatusCode) {
        let mut responses = self.state.responses.lock().expect("responses lock");
        if *method == Method::GET {
            responses.get = status;
        } else if *method == Method::PUT {
            responses.put = status;
        } else if *method == Method::POST {
            responses.post = status;
        } else {
            panic!("fake Mailchimp does not serve {method}");
        }
    }

    /// Answer every method with `status`.
    pub fn fail_all(&self, status: StatusCode) {
        for method in [Method::GET, Method::PUT, Method::POST] {
            self.respond(&method, status);
        }
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().expect("calls lock").clone()
    }

    /// Methods of every request received so far, in order.
    pub fn methods(&self) -> Vec<Method> {
        self.calls().into_iter().map(|c| c.method).collect()
    }

    /// The last write (`PUT` or `POST`) received.
    pub fn last_write(&self) -> Option<RecordedCall> {
        self.calls()
            .into_iter()
            .rev()
            .find(|c| c.method == Method::PUT || c.method == Method::POST)
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.calls.lock().expect("calls lock").clear();
    }
}

async fn handle_fake_request(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let status = {
        let responses = state.responses.lock().expect("responses lock");
        match method {
            Method::GET => responses.get,
            Method::PUT => responses.put,
            Method::POST => responses.post,
            _ => StatusCode::METHOD_NOT_ALLOWED,
        }
    };
    let delay = *state.delay.lock().expect("delay lock");

    let body: Option<Value> = serde_json::from_slice(&body).ok();
    let email = body
        .as_ref()
        .and_then(|b| b.get("email_address"))
        .cloned()
        .unwrap_or(Value::Null);
    state.calls.lock().expect("calls lock").push(RecordedCall {
        method,
        path: uri.path().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
        body,
    });

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if status.is_success() {
        let id = uri.path().rsplit('/').next().unwrap_or_default().to_string();
        (
            status,
            Json(json!({ "id": id, "email_address": email, "status": "subscribed" })),
        )
            .into_response()
    } else {
        let reason = status.canonical_reason().unwrap_or("Error");
        (
            status,
            Json(json!({ "title": reason, "detail": format!("fake Mailchimp answered {status}") })),
        )
            .into_response()
    }
}

// =============================================================================
// Addon harness
// =============================================================================

/// The addon on in-memory stores, talking to a [`FakeMailchimp`].
#[derive(Debug, Clone)]
pub struct TestAddon {
    pub mailchimp: FakeMailchimp,
    pub dispatcher: Dispatcher,
    settings_store: SettingsStore,
    records: MemorySyncRecordStore,
}

impl TestAddon {
    /// Start a fake Mailchimp and build the addon against it.
    pub async fn start() -> Self {
        Self::start_with_timeout(Duration::from_secs(5)).await
    }

    /// Like [`TestAddon::start`], with a custom Mailchimp request timeout.
    pub async fn start_with_timeout(timeout: Duration) -> Self {
        let mailchimp = FakeMailchimp::start().await;
        let client = MailchimpClient::new(&mailchimp.client_config_with_timeout(timeout))
            .expect("Failed to build client");
        let settings_store = SettingsStore::memory();
        let settings = ShopSettings::new(settings_store.clone(), Duration::from_secs(60));
        let records = MemorySyncRecordStore::default();
        let sync = MailchimpSync::new(client, settings, SyncRecordStore::Memory(records.clone()));

        Self {
            mailchimp,
            dispatcher: Dispatcher::new(sync),
            settings_store,
            records,
        }
    }

    /// The sync service.
    pub const fn sync(&self) -> &MailchimpSync {
        self.dispatcher.sync()
    }

    /// Save complete credentials for `shop`, enabled or not.
    pub async fn configure_shop(&self, shop: ShopId, enabled: bool) {
        let form = SettingsForm {
            api_key: Some(TEST_API_KEY.to_string()),
            list_id: Some(TEST_LIST_ID.to_string()),
            is_enabled: enabled,
            username: None,
        };
        self.sync()
            .settings()
            .save(shop, &form)
            .await
            .expect("Failed to save settings");
    }

    /// Flip only the enabled flag.
    pub async fn set_enabled(&self, shop: ShopId, enabled: bool) {
        self.sync()
            .settings()
            .set_enabled(shop, enabled)
            .await
            .expect("Failed to set enabled flag");
    }

    /// A second settings service over the same store, with its own cache.
    ///
    /// Writes through it are invisible to the addon's cache, like writes
    /// from the CLI or another replica.
    pub fn detached_settings(&self) -> ShopSettings {
        ShopSettings::new(self.settings_store.clone(), Duration::from_secs(60))
    }

    /// Store a record directly, bypassing Mailchimp.
    pub async fn seed_record(&self, record: SyncRecord) {
        self.records.insert(record).await;
    }

    /// The sync record for `(shop, email)`, if any.
    pub async fn record(&self, shop: ShopId, email: &str) -> Option<SyncRecord> {
        self.records.find(shop, &email_of(email)).await
    }

    /// Number of sync records across all shops.
    pub async fn record_count(&self) -> i64 {
        self.records.count().await
    }

    /// Application state with a running event worker.
    pub fn state(&self, queue_capacity: usize) -> AppState {
        self.state_with_worker(queue_capacity).0
    }

    /// Application state and the handle of its event worker.
    pub fn state_with_worker(&self, queue_capacity: usize) -> (AppState, JoinHandle<()>) {
        let (queue, worker) = EventQueue::spawn(self.dispatcher.clone(), queue_capacity);
        let state = AppState::new(self.dispatcher.clone(), queue, None, auth_config());
        (state, worker)
    }

    /// The full HTTP application.
    pub fn app(&self) -> Router {
        shop_mailchimp_addon::app(self.state(16))
    }

    /// Wait until `(shop, email)` has been sent, or give up after a few seconds.
    pub async fn wait_for_record(&self, shop: ShopId, email: &str) -> Option<SyncRecord> {
        for _ in 0..100 {
            if let Some(record) = self.record(shop, email).await {
                if record.is_sent() {
                    return Some(record);
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Shared secrets matching [`TEST_ADMIN_TOKEN`] and [`TEST_WEBHOOK_SECRET`].
pub fn auth_config() -> AuthConfig {
    AuthConfig {
        admin_token: SecretString::from(TEST_ADMIN_TOKEN),
        webhook_secret: SecretString::from(TEST_WEBHOOK_SECRET),
    }
}

/// Signature header value for a webhook body.
pub fn sign_body(body: &[u8]) -> String {
    auth::sign(&SecretString::from(TEST_WEBHOOK_SECRET), body).expect("Failed to sign body")
}

/// Parse a test email.
pub fn email_of(raw: &str) -> Email {
    Email::parse(raw).expect("test email must be valid")
}

/// A person contact belonging to `shops`.
pub fn person(id: i64, email: &str, marketing_permission: bool, shops: &[i64]) -> Contact {
    Contact {
        id: ContactId::new(id),
        kind: ContactKind::Person {
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
        },
        email: Some(email.to_string()),
        marketing_permission,
        shops: shops.iter().copied().map(ShopId::new).collect(),
    }
}

/// A company contact belonging to `shops`.
pub fn company(id: i64, name: &str, email: &str, shops: &[i64]) -> Contact {
    Contact {
        id: ContactId::new(id),
        kind: ContactKind::Company {
            name: name.to_string(),
        },
        email: Some(email.to_string()),
        marketing_permission: true,
        shops: shops.iter().copied().map(ShopId::new).collect(),
    }
}

/// A finalized order placed in `shop`.
pub fn order(
    id: i64,
    shop: i64,
    email: &str,
    marketing_permission: bool,
    customer: Option<Contact>,
) -> Order {
    Order {
        id: OrderId::new(id),
        shop: ShopId::new(shop),
        email: Some(email.to_string()),
        marketing_permission,
        customer,
    }
}

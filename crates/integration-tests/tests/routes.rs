//! HTTP surface of the addon.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`;
//! Mailchimp is the local fake. Webhooks are signed and admin requests carry
//! the bearer token unless a test checks the rejection.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use shop_mailchimp_addon::middleware::auth::SIGNATURE_HEADER;
use shop_mailchimp_core::ShopId;
use shop_mailchimp_integration_tests::{TEST_ADMIN_TOKEN, TestAddon, email_of, sign_body};
use tower::ServiceExt;

const SHOP: i64 = 3;

fn admin_request(method: &str, uri: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TEST_ADMIN_TOKEN}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap()
}

fn webhook_request(uri: &str, body: &Value) -> Request<Body> {
    let body = body.to_string();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, sign_body(body.as_bytes()))
        .body(Body::from(body))
        .unwrap()
}

fn entity_saved(id: i64, email: &str) -> Value {
    json!({
        "contact": {
            "id": id,
            "type": "person",
            "first_name": "Jane",
            "email": email,
            "marketing_permission": true,
            "shops": [SHOP]
        }
    })
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let addon = TestAddon::start().await;

    for uri in ["/health", "/health/ready"] {
        let response = addon
            .app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

// =============================================================================
// Settings
// =============================================================================

#[tokio::test]
async fn test_settings_round_trip_masks_api_key() {
    let addon = TestAddon::start().await;
    let uri = format!("/shops/{SHOP}/settings");

    let response = addon
        .app()
        .oneshot(admin_request("GET", &uri, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = body_json(response).await;
    assert_eq!(view["is_enabled"], false);
    assert_eq!(view["needs_setup"], true);

    let response = addon
        .app()
        .oneshot(admin_request(
            "PUT",
            &uri,
            Some(&json!({
                "api_key": "secretkey-us6",
                "list_id": "list1",
                "is_enabled": true
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["changed"].as_array().unwrap().len(), 3);
    assert_eq!(updated["settings"]["is_enabled"], true);
    assert_eq!(updated["settings"]["needs_setup"], true);
    let masked = updated["settings"]["api_key"].as_str().unwrap();
    assert!(masked.ends_with("-us6"));
    assert!(!masked.contains("secretkey"));

    // Resubmitting without the key keeps it and changes nothing
    let response = addon
        .app()
        .oneshot(admin_request(
            "PUT",
            &uri,
            Some(&json!({ "list_id": "list1", "is_enabled": true })),
        ))
        .await
        .unwrap();
    let unchanged = body_json(response).await;
    assert!(unchanged["changed"].as_array().unwrap().is_empty());
    assert_eq!(unchanged["settings"]["api_key"], updated["settings"]["api_key"]);
}

#[tokio::test]
async fn test_settings_rejects_overlong_list_id() {
    let addon = TestAddon::start().await;

    let response = addon
        .app()
        .oneshot(admin_request(
            "PUT",
            &format!("/shops/{SHOP}/settings"),
            Some(&json!({ "list_id": "x".repeat(25), "is_enabled": true })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_settings_require_admin_token() {
    let addon = TestAddon::start().await;
    let uri = format!("/shops/{SHOP}/settings");

    let response = addon
        .app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(&uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "api_key": "attacker-us1", "list_id": "evil" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = addon
        .app()
        .oneshot(
            Request::get(&uri)
                .header(header::AUTHORIZATION, "Bearer not-the-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let settings = addon.sync().settings().load(ShopId::new(SHOP)).await.unwrap();
    assert!(settings.api_key.is_none());
    assert!(settings.list_id.is_none());
}

// =============================================================================
// Newsletter
// =============================================================================

#[tokio::test]
async fn test_newsletter_unavailable_when_disabled() {
    let addon = TestAddon::start().await;
    addon.configure_shop(ShopId::new(SHOP), false).await;

    let response = addon
        .app()
        .oneshot(form_request(
            &format!("/shops/{SHOP}/newsletter"),
            "email=jane%40example.com",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(addon.mailchimp.calls().is_empty());
}

#[tokio::test]
async fn test_newsletter_rejects_invalid_email() {
    let addon = TestAddon::start().await;
    addon.configure_shop(ShopId::new(SHOP), true).await;

    let response = addon
        .app()
        .oneshot(form_request(
            &format!("/shops/{SHOP}/newsletter"),
            "email=not-an-email",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(addon.record_count().await, 0);
}

#[tokio::test]
async fn test_newsletter_subscribes() {
    let addon = TestAddon::start().await;
    let shop = ShopId::new(SHOP);
    addon.configure_shop(shop, true).await;

    let response = addon
        .app()
        .oneshot(form_request(
            &format!("/shops/{SHOP}/newsletter"),
            "email=Reader%40Example.com",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], "reader@example.com");
    assert_eq!(body["subscribed"], true);

    let record = addon.record(shop, "reader@example.com").await.unwrap();
    assert!(record.is_sent());
    assert_eq!(record.contact_id, None);
}

#[tokio::test]
async fn test_newsletter_remote_failure_is_bad_gateway() {
    let addon = TestAddon::start().await;
    addon.configure_shop(ShopId::new(SHOP), true).await;
    addon
        .mailchimp
        .fail_all(StatusCode::INTERNAL_SERVER_ERROR);

    let response = addon
        .app()
        .oneshot(form_request(
            &format!("/shops/{SHOP}/newsletter"),
            "email=jane%40example.com",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_entity_saved_webhook_syncs_in_background() {
    let addon = TestAddon::start().await;
    let shop = ShopId::new(SHOP);
    addon.configure_shop(shop, true).await;

    let response = addon
        .app()
        .oneshot(webhook_request(
            "/events/entity-saved",
            &entity_saved(11, "jane@example.com"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let ack = body_json(response).await;
    assert_eq!(ack["event"], "entity_saved");

    let record = addon.wait_for_record(shop, "jane@example.com").await;
    assert!(record.is_some());
}

#[tokio::test]
async fn test_tagged_event_endpoint_accepts_orders() {
    let addon = TestAddon::start().await;
    let shop = ShopId::new(SHOP);
    addon.configure_shop(shop, true).await;

    let response = addon
        .app()
        .oneshot(webhook_request(
            "/events",
            &json!({
                "event": "order_finalized",
                "order": {
                    "id": 500,
                    "shop": SHOP,
                    "email": "buyer@example.com",
                    "marketing_permission": true
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(
        addon
            .wait_for_record(shop, "buyer@example.com")
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_malformed_event_is_rejected() {
    let addon = TestAddon::start().await;

    let response = addon
        .app()
        .oneshot(webhook_request(
            "/events/order-finalized",
            &json!({ "order": { "shop": SHOP } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unsigned_webhook_is_rejected() {
    let addon = TestAddon::start().await;
    let shop = ShopId::new(SHOP);
    addon.configure_shop(shop, true).await;
    let body = entity_saved(12, "intruder@example.com").to_string();

    let unsigned = Request::builder()
        .method("POST")
        .uri("/events/entity-saved")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.clone()))
        .unwrap();
    let response = addon.app().oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Signed for a different body
    let tampered = Request::builder()
        .method("POST")
        .uri("/events/entity-saved")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, sign_body(b"{}"))
        .body(Body::from(body))
        .unwrap();
    let response = addon.app().oneshot(tampered).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(addon.record_count().await, 0);
    assert!(addon.mailchimp.calls().is_empty());
}

#[tokio::test]
async fn test_full_queue_answers_service_unavailable() {
    let addon = TestAddon::start().await;
    addon.configure_shop(ShopId::new(SHOP), true).await;
    // The worker stalls on the first event's Mailchimp lookup
    addon.mailchimp.set_delay(Duration::from_secs(3));
    let app = shop_mailchimp_addon::app(addon.state(1));

    let mut statuses = Vec::new();
    for id in 0..3 {
        let email = format!("reader{id}@example.com");
        let response = app
            .clone()
            .oneshot(webhook_request("/events/entity-saved", &entity_saved(id, &email)))
            .await
            .unwrap();
        statuses.push(response.status());
    }

    assert_eq!(statuses.first(), Some(&StatusCode::ACCEPTED));
    assert_eq!(statuses.last(), Some(&StatusCode::SERVICE_UNAVAILABLE));
}

#[tokio::test]
async fn test_stopped_worker_answers_service_unavailable() {
    let addon = TestAddon::start().await;
    let (state, worker) = addon.state_with_worker(16);
    worker.abort();
    assert!(worker.await.unwrap_err().is_cancelled());

    let response = shop_mailchimp_addon::app(state)
        .oneshot(webhook_request(
            "/events/entity-saved",
            &entity_saved(13, "late@example.com"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Contacts
// =============================================================================

#[tokio::test]
async fn test_contacts_lists_shop_records() {
    let addon = TestAddon::start().await;
    let shop = ShopId::new(SHOP);
    addon.configure_shop(shop, true).await;
    addon.configure_shop(ShopId::new(SHOP + 1), true).await;

    for (shop, email) in [
        (shop, "b@example.com"),
        (shop, "a@example.com"),
        (ShopId::new(SHOP + 1), "other@example.com"),
    ] {
        addon
            .sync()
            .add_email_to_list(shop, &email_of(email), None)
            .await
            .unwrap();
    }

    let response = addon
        .app()
        .oneshot(admin_request("GET", &format!("/shops/{SHOP}/contacts"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let records = body_json(response).await;
    let emails: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails.len(), 2);
    assert!(emails.contains(&"a@example.com"));
    assert!(emails.contains(&"b@example.com"));
}

#[tokio::test]
async fn test_contacts_require_admin_token() {
    let addon = TestAddon::start().await;

    let response = addon
        .app()
        .oneshot(
            Request::get(format!("/shops/{SHOP}/contacts"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

//! Shop Mailchimp addon.
//!
//! Keeps each shop's Mailchimp audience list in sync with the people,
//! companies and orders that granted marketing permission. The crate is
//! usable as a library (call [`dispatcher::Dispatcher`] directly) or as the
//! `shop-mailchimp-addon` HTTP service built by [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod mailchimp;
pub mod middleware;
pub mod routes;
pub mod settings;
pub mod state;
pub mod store;
pub mod sync;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application: health checks, routes and outer layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity when running on `PostgreSQL`.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use secrecy::SecretString;

    use crate::config::{AuthConfig, MailchimpClientConfig};
    use crate::dispatcher::Dispatcher;
    use crate::events::EventQueue;
    use crate::mailchimp::MailchimpClient;
    use crate::settings::ShopSettings;
    use crate::store::{SettingsStore, SyncRecordStore};
    use crate::sync::MailchimpSync;

    fn memory_state() -> AppState {
        let client = MailchimpClient::new(&MailchimpClientConfig::default()).unwrap();
        let settings = ShopSettings::new(SettingsStore::memory(), Duration::from_secs(60));
        let dispatcher = Dispatcher::new(MailchimpSync::new(
            client,
            settings,
            SyncRecordStore::memory(),
        ));
        let (queue, _worker) = EventQueue::spawn(dispatcher.clone(), 4);
        let auth = AuthConfig {
            admin_token: SecretString::from("admin-token"),
            webhook_secret: SecretString::from("webhook-secret"),
        };
        AppState::new(dispatcher, queue, None, auth)
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(memory_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_without_database() {
        let response = app(memory_state())
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes_require_token() {
        let response = app(memory_state())
            .oneshot(
                Request::get("/shops/1/settings")
                    .header("authorization", "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app(memory_state())
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

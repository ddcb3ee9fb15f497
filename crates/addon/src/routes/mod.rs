//! HTTP route handlers.
//!
//! - `/events/*` - Platform webhooks, queued for background sync (signed)
//! - `/shops/{shop_id}/newsletter` - Storefront newsletter signup (public)
//! - `/shops/{shop_id}/settings` - Mailchimp settings for shop admins (bearer token)
//! - `/shops/{shop_id}/contacts` - Sync records for a shop (bearer token)

mod events;
mod newsletter;
mod settings;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

use crate::middleware::auth::{require_admin_token, require_webhook_signature};
use crate::state::AppState;

pub use newsletter::SubscribeForm;
pub use settings::SettingsView;

/// Build the application router (without health checks or outer layers).
///
/// The guards read their secrets from `state`.
pub fn routes(state: &AppState) -> Router<AppState> {
    let webhooks = Router::new()
        .route("/events", post(events::publish))
        .route("/events/entity-saved", post(events::entity_saved))
        .route("/events/order-finalized", post(events::order_finalized))
        .route_layer(from_fn_with_state(state.clone(), require_webhook_signature));

    let admin = Router::new()
        .route(
            "/shops/{shop_id}/settings",
            get(settings::show).put(settings::update),
        )
        .route("/shops/{shop_id}/contacts", get(settings::contacts))
        .route_layer(from_fn_with_state(state.clone(), require_admin_token));

    Router::new()
        .route("/shops/{shop_id}/newsletter", post(newsletter::subscribe))
        .merge(webhooks)
        .merge(admin)
}

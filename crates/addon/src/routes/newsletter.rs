//! Newsletter signup from the storefront.
//!
//! The signup form itself grants marketing permission, so only the shop's
//! enabled flag and the address are checked before syncing.

use axum::{
    Form, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shop_mailchimp_core::{Email, ShopId};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

/// Newsletter subscription form data.
#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    pub email: String,
}

/// Successful subscription.
#[derive(Debug, Serialize)]
pub struct Subscribed {
    pub email: Email,
    pub subscribed: bool,
}

/// POST /shops/{shop_id}/newsletter - subscribe an email to the shop's list.
#[instrument(skip(state, form), fields(shop = %shop_id))]
pub async fn subscribe(
    State(state): State<AppState>,
    Path(shop_id): Path<i64>,
    Form(form): Form<SubscribeForm>,
) -> Result<Json<Subscribed>, AppError> {
    let shop = ShopId::new(shop_id);

    if !state.settings().is_enabled(shop).await? {
        return Err(AppError::NotFound(format!(
            "newsletter is not available for shop {shop}"
        )));
    }

    let email = Email::parse(&form.email)
        .map_err(|e| AppError::BadRequest(format!("Please enter a valid email address: {e}")))?;

    state.sync().add_email_to_list(shop, &email, None).await?;
    tracing::info!(email = %email, "Newsletter subscription successful");

    Ok(Json(Subscribed {
        email,
        subscribed: true,
    }))
}

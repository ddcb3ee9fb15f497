//! Mailchimp settings for shop admins.
//!
//! The API key is never returned; the view only shows its data-center
//! suffix. Submitting the form without `api_key` keeps the stored key.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use shop_mailchimp_core::{MailchimpSettings, SettingsField, SettingsForm, ShopId, SyncRecord};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

/// Settings as shown to an admin.
#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub shop: ShopId,
    pub is_enabled: bool,
    pub api_key: Option<String>,
    pub list_id: Option<String>,
    pub username: Option<String>,
    /// True while API key, list id or username is missing.
    pub needs_setup: bool,
}

impl SettingsView {
    fn new(shop: ShopId, settings: &MailchimpSettings) -> Self {
        Self {
            shop,
            is_enabled: settings.enabled,
            api_key: settings.masked_api_key(),
            list_id: settings.list_id.clone(),
            username: settings.username.clone(),
            needs_setup: settings.needs_setup(),
        }
    }
}

/// Response to a settings update.
#[derive(Debug, Serialize)]
pub struct SettingsUpdated {
    pub changed: Vec<SettingsField>,
    pub settings: SettingsView,
}

/// GET /shops/{shop_id}/settings
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(shop_id): Path<i64>,
) -> Result<Json<SettingsView>, AppError> {
    let shop = ShopId::new(shop_id);
    let settings = state.settings().load(shop).await?;
    Ok(Json(SettingsView::new(shop, &settings)))
}

/// PUT /shops/{shop_id}/settings
#[instrument(skip(state, form))]
pub async fn update(
    State(state): State<AppState>,
    Path(shop_id): Path<i64>,
    Json(form): Json<SettingsForm>,
) -> Result<Json<SettingsUpdated>, AppError> {
    let shop = ShopId::new(shop_id);
    let changed = state.settings().save(shop, &form).await?;
    let settings = state.settings().load(shop).await?;

    Ok(Json(SettingsUpdated {
        changed,
        settings: SettingsView::new(shop, &settings),
    }))
}

/// GET /shops/{shop_id}/contacts
#[instrument(skip(state))]
pub async fn contacts(
    State(state): State<AppState>,
    Path(shop_id): Path<i64>,
) -> Result<Json<Vec<SyncRecord>>, AppError> {
    let records = state.sync().records().list(ShopId::new(shop_id)).await?;
    Ok(Json(records))
}

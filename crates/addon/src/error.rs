//! Unified error handling for the addon HTTP service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::events::EventQueueError;
use crate::middleware::auth::AuthError;
use crate::settings::ShopSettingsError;
use crate::sync::SyncError;

/// Application-level error type for HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Mailchimp sync failed.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Settings could not be loaded or saved.
    #[error("Settings error: {0}")]
    Settings(#[from] ShopSettingsError),

    /// Event could not be queued.
    #[error("Queue error: {0}")]
    Queue(#[from] EventQueueError),

    /// Missing or wrong shared secret.
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Sync(SyncError::Remote { .. }) => StatusCode::BAD_GATEWAY,
            Self::Sync(SyncError::NotConfigured { .. }) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Sync(SyncError::Settings(_) | SyncError::Store(_))
            | Self::Settings(ShopSettingsError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Settings(ShopSettingsError::Invalid(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Addon request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_)
            | Self::Settings(ShopSettingsError::Store(_))
            | Self::Sync(SyncError::Settings(_) | SyncError::Store(_)) => {
                "Internal server error".to_string()
            }
            Self::Sync(SyncError::Remote { .. }) => "Mailchimp request failed".to_string(),
            Self::Sync(SyncError::NotConfigured { .. }) => {
                "Mailchimp is not configured for this shop".to_string()
            }
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

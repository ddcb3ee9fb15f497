//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AuthConfig;
use crate::dispatcher::Dispatcher;
use crate::events::EventQueue;
use crate::settings::ShopSettings;
use crate::sync::MailchimpSync;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    dispatcher: Dispatcher,
    queue: EventQueue,
    pool: Option<PgPool>,
    auth: AuthConfig,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `pool` is `None` when running on in-memory stores; readiness then
    /// only reports that the process is up.
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        queue: EventQueue,
        pool: Option<PgPool>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                dispatcher,
                queue,
                pool,
                auth,
            }),
        }
    }

    /// The sync dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// The Mailchimp sync service.
    #[must_use]
    pub fn sync(&self) -> &MailchimpSync {
        self.inner.dispatcher.sync()
    }

    /// Per-shop settings.
    #[must_use]
    pub fn settings(&self) -> &ShopSettings {
        self.sync().settings()
    }

    /// The background event queue.
    #[must_use]
    pub fn queue(&self) -> &EventQueue {
        &self.inner.queue
    }

    /// The database pool, when running on `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Shared secrets for the route guards.
    #[must_use]
    pub fn auth(&self) -> &AuthConfig {
        &self.inner.auth
    }
}

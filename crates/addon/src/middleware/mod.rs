//! HTTP middleware for the addon routes.
//!
//! # Route guards
//!
//! - [`auth::require_webhook_signature`] on `/events*`: platform webhooks
//!   carry an HMAC-SHA256 of the raw body
//! - [`auth::require_admin_token`] on the shop settings and contacts routes
//!
//! The storefront newsletter signup stays public.

pub mod auth;

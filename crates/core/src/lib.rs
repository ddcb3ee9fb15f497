//! Shop Mailchimp Core - Shared types library.
//!
//! This crate provides the types shared by all addon components:
//! - `addon` - Sync service (dispatcher, Mailchimp client, HTTP webhooks)
//! - `cli` - Command-line tools for migrations, settings and manual syncs
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows the host
//! platform's event payloads to be described without pulling in the service.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, source entities, shop settings and sync records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

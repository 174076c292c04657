//! Quill Core - Shared types library.
//!
//! Types used by every Quill component:
//! - `site` - The public poetry site
//! - `cli` - Migrations, seeding and role management
//!
//! The core crate contains only types. No database access and no HTTP
//! clients; the optional `postgres` feature adds `sqlx` encode/decode impls.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, slugs, roles and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

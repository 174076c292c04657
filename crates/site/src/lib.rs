//! Quill site library.
//!
//! The public poetry site as a library, so the binary, the CLI and tests
//! share one set of repositories, services and routes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;

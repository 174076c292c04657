//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Content hash of main.css, computed at build time.
///
/// Usage in templates: `{{ ""|css_hash }}`
#[askama::filter_fn]
pub fn css_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("CSS_HASH"))
}

/// Content hash of comments.js.
#[askama::filter_fn]
pub fn js_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("JS_HASH"))
}

/// `1 reply`, `3 replies`.
///
/// Usage in templates: `{{ count|replies_label }}`
#[askama::filter_fn]
pub fn replies_label(count: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_replies(&count.to_string()))
}

fn format_replies(count: &str) -> String {
    if count == "1" {
        "1 reply".to_owned()
    } else {
        format!("{count} replies")
    }
}

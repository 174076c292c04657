//! Domain models for the site.

pub mod comment;
pub mod poem;
pub mod request;
pub mod session;
pub mod user;

use chrono::{DateTime, Utc};

pub use comment::{Comment, NewComment};
pub use poem::{NewPoem, Poem, PoemTitle};
pub use request::{NewPoemRequest, PoemRequest};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;

/// Render a timestamp as `05 Mar 2025, 09:14:07 PM`.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y, %I:%M:%S %p").to_string()
}

/// Return a trimmed string if it has any non-whitespace content.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn formats_twelve_hour_clock() {
        let at = Utc.with_ymd_and_hms(2025, 3, 5, 21, 14, 7).single();
        assert_eq!(
            at.map(format_timestamp).as_deref(),
            Some("05 Mar 2025, 09:14:07 PM")
        );
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some("  Rumi ")), Some("Rumi"));
        assert_eq!(non_blank(Some(" \t")), None);
        assert_eq!(non_blank(None), None);
    }
}

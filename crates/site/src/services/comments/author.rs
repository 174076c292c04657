//! Author name resolution for new comments and poem requests.

use crate::models::non_blank;

/// Name used when a user has neither a profile name nor a federated name.
pub const ANONYMOUS: &str = "Anonymous";

/// The name sources available for a user.
#[derive(Debug, Clone, Default)]
pub struct AuthorProfile {
    /// Name stored in the user's profile.
    pub name: Option<String>,
    /// Name reported by the federated identity provider.
    pub display_name: Option<String>,
}

impl AuthorProfile {
    /// Profile name, then federated display name, then [`ANONYMOUS`].
    /// Blank values count as missing.
    #[must_use]
    pub fn resolve(&self) -> String {
        non_blank(self.name.as_deref())
            .or_else(|| non_blank(self.display_name.as_deref()))
            .unwrap_or(ANONYMOUS)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: Option<&str>, display_name: Option<&str>) -> AuthorProfile {
        AuthorProfile {
            name: name.map(str::to_string),
            display_name: display_name.map(str::to_string),
        }
    }

    #[test]
    fn profile_name_wins() {
        let user = profile(Some("Mira Okafor"), Some("mira.o"));
        assert_eq!(user.resolve(), "Mira Okafor");
    }

    #[test]
    fn falls_back_to_federated_name() {
        let user = profile(None, Some("mira.o"));
        assert_eq!(user.resolve(), "mira.o");
    }

    #[test]
    fn falls_back_to_anonymous() {
        let user = profile(None, None);
        assert_eq!(user.resolve(), ANONYMOUS);
    }

    #[test]
    fn blank_names_are_skipped() {
        assert_eq!(profile(Some("   "), Some("mira.o")).resolve(), "mira.o");
        assert_eq!(profile(Some(""), Some("\t")).resolve(), ANONYMOUS);
    }
}

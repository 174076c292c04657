//! Role and status enums.

use serde::{Deserialize, Serialize};

/// Site-wide role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Can read, comment, reply, and submit poem requests.
    #[default]
    User,
    /// Can also moderate comments, write admin replies, and review requests.
    Admin,
}

impl UserRole {
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Review status of a poem request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "request_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Sort order of the poem listing.
///
/// Unknown values fall back to [`PoemSort::Newest`] so stale links from
/// older sort vocabularies still render a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PoemSort {
    #[default]
    Newest,
    Oldest,
    Alphabetical,
}

impl PoemSort {
    pub const ALL: [Self; 3] = [Self::Newest, Self::Oldest, Self::Alphabetical];

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "oldest" => Self::Oldest,
            "alphabetical" | "title" => Self::Alphabetical,
            _ => Self::Newest,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Alphabetical => "alphabetical",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest first",
            Self::Oldest => "Oldest first",
            Self::Alphabetical => "A to Z",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [UserRole::User, UserRole::Admin] {
            assert_eq!(role.to_string().parse::<UserRole>(), Ok(role));
        }
        assert!("superuser".parse::<UserRole>().is_err());
    }

    #[test]
    fn sort_falls_back_to_newest() {
        assert_eq!(PoemSort::parse("oldest"), PoemSort::Oldest);
        assert_eq!(PoemSort::parse("title"), PoemSort::Alphabetical);
        assert_eq!(PoemSort::parse("views"), PoemSort::Newest);
        assert_eq!(PoemSort::parse(""), PoemSort::Newest);
    }
}

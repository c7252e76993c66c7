use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::board::domain::UserId;

/// Role assigned to every account. Grants nothing on its own for `Admin`;
/// elevated access comes only from [`Actor::is_superuser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    NotAssigned,
    Admin,
    Employer,
    Applicant,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::NotAssigned,
        Role::Admin,
        Role::Employer,
        Role::Applicant,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::NotAssigned => "not_assigned",
            Role::Admin => "admin",
            Role::Employer => "employer",
            Role::Applicant => "applicant",
        }
    }

    pub fn allowed_values() -> Vec<&'static str> {
        Self::ALL.iter().map(|role| role.as_str()).collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{value}'")]
pub struct UnknownRole {
    pub value: String,
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Parses a role after trimming and lowercasing, so `Employer` and
    /// `employer` authorize identically.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| UnknownRole {
                value: raw.to_string(),
            })
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The authenticated party behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl Actor {
    pub fn new(id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
            is_superuser: false,
        }
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is(&self, user: UserId) -> bool {
        self.id == user
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of an application. Every application starts in `Applied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Shortlisted,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 3] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn allowed_values() -> Vec<&'static str> {
        Self::ALL.iter().map(|status| status.label()).collect()
    }

    /// Exact match against the status names; no case folding.
    pub fn parse(raw: &str) -> Result<Self, InvalidStatus> {
        Self::ALL
            .into_iter()
            .find(|status| status.label() == raw)
            .ok_or_else(|| InvalidStatus {
                value: raw.to_string(),
                allowed: Self::allowed_values(),
            })
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status '{value}'; allowed: {}", .allowed.join(", "))]
pub struct InvalidStatus {
    pub value: String,
    pub allowed: Vec<&'static str>,
}

/// Outcome of a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
}

impl StatusChange {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Validates a requested status against the current one.
///
/// Moves between the three states are unconditional, including leaving
/// `rejected` and returning to `applied`. Who may ask is decided by the
/// access policy, not here.
pub fn transition(
    current: ApplicationStatus,
    requested: &str,
) -> Result<StatusChange, InvalidStatus> {
    let to = ApplicationStatus::parse(requested)?;
    Ok(StatusChange { from: current, to })
}

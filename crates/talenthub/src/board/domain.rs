use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::salary::{Salary, SalaryView};
use super::status::ApplicationStatus;
use crate::access::Role;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of an account; also the identity carried by an actor.
    UserId
);
record_id!(JobId);
record_id!(ApplicationId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub salary: Option<Salary>,
    pub salary_confidential: bool,
    /// Pinned at creation.
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub salary: Option<Salary>,
    pub salary_confidential: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Handle to a stored resume file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRef {
    pub key: String,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub job: JobId,
    pub user: UserId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub resume: Option<ResumeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDraft {
    pub job: JobId,
    pub user: UserId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub resume: Option<ResumeRef>,
}

/// Payload for creating or fully replacing a user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInput {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Payload for creating or fully replacing a job. The creator is never read
/// from input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobInput {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub salary: Option<Salary>,
    #[serde(default)]
    pub salary_confidential: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    /// `Some(None)` clears the salary; a missing key leaves it untouched.
    #[serde(default, deserialize_with = "present")]
    pub salary: Option<Option<Salary>>,
    pub salary_confidential: Option<bool>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ApplicationInput {
    pub job: JobId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusInput {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&UserRecord> for UserView {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            email: record.email.clone(),
            role: record.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub salary: Option<SalaryView>,
    pub salary_confidential: bool,
    /// Creator's username.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl JobView {
    /// `disclose` comes from the access policy for the requesting actor.
    pub fn new(record: &JobRecord, creator: &str, disclose: bool) -> Self {
        let salary = if disclose {
            record.salary.map(SalaryView::Disclosed)
        } else {
            Some(SalaryView::Confidential)
        };

        Self {
            id: record.id,
            title: record.title.clone(),
            description: record.description.clone(),
            requirements: record.requirements.clone(),
            salary,
            salary_confidential: record.salary_confidential,
            created_by: creator.to_string(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub job: JobId,
    pub job_title: String,
    pub user: UserId,
    pub username: String,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub resume: Option<String>,
}

impl ApplicationView {
    pub fn new(record: &ApplicationRecord, job_title: &str, username: &str) -> Self {
        Self {
            id: record.id,
            job: record.job,
            job_title: job_title.to_string(),
            user: record.user,
            username: username.to_string(),
            status: record.status,
            applied_at: record.applied_at,
            resume: record.resume.as_ref().map(|resume| resume.key.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(confidential: bool) -> JobRecord {
        JobRecord {
            id: JobId(1),
            title: "Backend Engineer".to_string(),
            description: "Build the API".to_string(),
            requirements: String::new(),
            salary: Some(Salary::whole(5000).expect("in range")),
            salary_confidential: confidential,
            created_by: UserId(2),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn masked_salary_renders_sentinel() {
        let view = JobView::new(&job(true), "acme", false);
        assert_eq!(view.salary, Some(SalaryView::Confidential));
        let json = serde_json::to_value(&view).expect("serializes");
        assert_eq!(json["salary"], "confidential");
        assert_eq!(json["created_by"], "acme");
    }

    #[test]
    fn disclosed_salary_renders_amount() {
        let view = JobView::new(&job(true), "acme", true);
        let json = serde_json::to_value(&view).expect("serializes");
        assert_eq!(json["salary"], "5000.00");
        assert_eq!(json["salary_confidential"], true);
    }

    #[test]
    fn job_patch_distinguishes_null_from_missing() {
        let cleared: JobPatch = serde_json::from_str(r#"{"salary": null}"#).expect("patch");
        assert_eq!(cleared.salary, Some(None));
        let untouched: JobPatch = serde_json::from_str(r#"{"title": "SRE"}"#).expect("patch");
        assert_eq!(untouched.salary, None);
    }

    #[test]
    fn job_input_ignores_creator_fields() {
        let input: JobInput = serde_json::from_str(
            r#"{"title": "SRE", "description": "On call", "created_by": 99}"#,
        )
        .expect("input");
        assert_eq!(input.title, "SRE");
        assert!(!input.salary_confidential);
    }
}

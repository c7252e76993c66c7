use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::role::{Actor, Role};
use crate::board::domain::{ApplicationRecord, JobRecord, UserId};

/// Resource families guarded by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    User,
    Job,
    Application,
}

impl ResourceKind {
    pub const fn label(self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Job => "job",
            ResourceKind::Application => "application",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    List,
    Create,
    Read,
    Update,
    UpdateStatus,
    Delete,
}

impl Action {
    pub const fn label(self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::UpdateStatus => "update_status",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ownership facts of a concrete record, enough for instance-level rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instance {
    User {
        id: UserId,
    },
    Job {
        created_by: UserId,
    },
    Application {
        applicant: UserId,
        job_owner: UserId,
    },
}

impl Instance {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Instance::User { .. } => ResourceKind::User,
            Instance::Job { .. } => ResourceKind::Job,
            Instance::Application { .. } => ResourceKind::Application,
        }
    }

    pub fn job(job: &JobRecord) -> Self {
        Instance::Job {
            created_by: job.created_by,
        }
    }

    /// The owning job is required because employer rights flow from it.
    pub fn application(application: &ApplicationRecord, job: &JobRecord) -> Self {
        Instance::Application {
            applicant: application.user,
            job_owner: job.created_by,
        }
    }
}

/// Raised when the policy refuses an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("permission denied: cannot {action} {kind}")]
pub struct AccessDenied {
    pub action: Action,
    pub kind: ResourceKind,
}

/// Decides whether `actor` may perform `action`.
///
/// Without an instance only the resource-kind rules apply; actions that are
/// defined purely by ownership (job update/delete, application read, status
/// changes, delete) are refused until the instance is supplied. An instance of
/// a different kind than `kind` is always refused.
pub fn can(actor: &Actor, action: Action, kind: ResourceKind, instance: Option<&Instance>) -> bool {
    if let Some(instance) = instance {
        if instance.kind() != kind {
            return false;
        }
    }

    match kind {
        ResourceKind::User => actor.is_superuser,
        ResourceKind::Job => job_rule(actor, action, instance),
        ResourceKind::Application => application_rule(actor, action, instance),
    }
}

fn job_rule(actor: &Actor, action: Action, instance: Option<&Instance>) -> bool {
    match action {
        Action::List | Action::Read => {
            actor.is_superuser || matches!(actor.role, Role::Employer | Role::Applicant)
        }
        Action::Create => actor.is_superuser || actor.has_role(Role::Employer),
        Action::Update | Action::Delete => match instance {
            Some(Instance::Job { created_by }) => actor.is_superuser || actor.is(*created_by),
            _ => false,
        },
        Action::UpdateStatus => false,
    }
}

fn application_rule(actor: &Actor, action: Action, instance: Option<&Instance>) -> bool {
    match action {
        // Superuser status alone does not make someone an applicant.
        Action::Create => actor.has_role(Role::Applicant),
        Action::List => {
            actor.is_superuser || matches!(actor.role, Role::Applicant | Role::Employer)
        }
        Action::Read | Action::Delete => match instance {
            Some(Instance::Application {
                applicant,
                job_owner,
            }) => {
                actor.is_superuser
                    || (actor.has_role(Role::Applicant) && actor.is(*applicant))
                    || (actor.has_role(Role::Employer) && actor.is(*job_owner))
            }
            _ => false,
        },
        Action::UpdateStatus => match instance {
            Some(Instance::Application { job_owner, .. }) => {
                actor.is_superuser || (actor.has_role(Role::Employer) && actor.is(*job_owner))
            }
            _ => false,
        },
        Action::Update => false,
    }
}

/// [`can`] as a `Result`, logging refusals.
pub fn authorize(
    actor: &Actor,
    action: Action,
    kind: ResourceKind,
    instance: Option<&Instance>,
) -> Result<(), AccessDenied> {
    if can(actor, action, kind, instance) {
        return Ok(());
    }

    debug!(
        actor = actor.id.0,
        role = actor.role.as_str(),
        superuser = actor.is_superuser,
        %action,
        %kind,
        "access denied"
    );
    Err(AccessDenied { action, kind })
}

/// A confidential salary is shown only to the job's creator and superusers.
pub fn can_see_salary(actor: &Actor, job: &JobRecord) -> bool {
    !job.salary_confidential || actor.is_superuser || actor.is(job.created_by)
}

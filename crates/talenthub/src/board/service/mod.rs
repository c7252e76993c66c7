mod applications;
mod jobs;
mod users;

pub use applications::ApplicationScope;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::domain::{UserDraft, UserId, UserRecord};
use super::repository::{Repository, RepositoryError, ResumeStore, ResumeStoreError, Storage};
use super::status::InvalidStatus;
use crate::access::{AccessDenied, Actor, ResourceKind};
use crate::config::BoardConfig;
use crate::query::{PageLimits, QueryError};

/// Service composing the access policy, list pipeline, and status machine
/// around the record stores.
pub struct JobBoardService<S> {
    storage: Arc<S>,
    resumes: Option<Arc<dyn ResumeStore>>,
    config: BoardConfig,
}

impl<S> JobBoardService<S>
where
    S: Storage,
{
    pub fn new(storage: Arc<S>, config: BoardConfig) -> Self {
        Self {
            storage,
            resumes: None,
            config,
        }
    }

    /// Enables resume uploads on application submission.
    pub fn with_resume_store(mut self, store: Arc<dyn ResumeStore>) -> Self {
        self.resumes = Some(store);
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Maps the identity handed over by the authentication layer to an actor.
    pub fn resolve_actor(&self, id: UserId) -> Result<Actor, BoardError> {
        let user = self
            .storage
            .users()
            .find(id)?
            .ok_or(BoardError::Unauthenticated)?;
        Ok(Actor {
            id: user.id,
            username: user.username,
            role: user.role,
            is_superuser: user.is_superuser,
        })
    }

    /// Creates an account outside the access policy, for bootstrapping and fixtures.
    pub fn seed_user(&self, draft: UserDraft) -> Result<UserRecord, BoardError> {
        users::validate_username(&draft.username)?;
        users::validate_email(&draft.email)?;
        self.storage
            .users()
            .insert(draft)
            .map_err(users::username_conflict)
    }

    fn limits(&self, default_per_page: usize) -> PageLimits {
        PageLimits {
            default_per_page,
            max_per_page: self.config.max_per_page,
        }
    }

    /// Usernames for display, tolerating accounts removed mid-request.
    fn usernames(
        &self,
        ids: impl IntoIterator<Item = UserId>,
    ) -> Result<BTreeMap<UserId, String>, BoardError> {
        let mut names = BTreeMap::new();
        for id in ids.into_iter().collect::<BTreeSet<_>>() {
            let name = match self.storage.users().find(id)? {
                Some(user) => user.username,
                None => UNKNOWN_USER.to_string(),
            };
            names.insert(id, name);
        }
        Ok(names)
    }
}

const UNKNOWN_USER: &str = "unknown";

/// Kinds of domain conflict reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DuplicateApplication,
    SelfApplication,
    StaleStatus,
}

impl ConflictKind {
    pub const fn message(self) -> &'static str {
        match self {
            ConflictKind::DuplicateApplication => "you have already applied to this job",
            ConflictKind::SelfApplication => "you cannot apply to your own job",
            ConflictKind::StaleStatus => "application status changed concurrently; retry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    Field {
        field: &'static str,
        message: String,
    },
    #[error(transparent)]
    Status(#[from] InvalidStatus),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ValidationError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field,
            message: message.into(),
        }
    }
}

/// Error raised by the board service.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("authentication required")]
    Unauthenticated,
    #[error(transparent)]
    PermissionDenied(#[from] AccessDenied),
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: u64 },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{}", .0.message())]
    Conflict(ConflictKind),
    #[error(transparent)]
    Repository(RepositoryError),
    #[error(transparent)]
    ResumeStore(#[from] ResumeStoreError),
    #[error("request was throttled; expected available in {retry_after_secs} seconds")]
    Throttled { retry_after_secs: u64 },
}

impl BoardError {
    pub fn not_found(kind: ResourceKind, id: u64) -> Self {
        BoardError::NotFound { kind, id }
    }

    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            BoardError::Conflict(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl From<RepositoryError> for BoardError {
    fn from(err: RepositoryError) -> Self {
        warn!(error = %err, "record store failure");
        BoardError::Repository(err)
    }
}

impl From<QueryError> for BoardError {
    fn from(err: QueryError) -> Self {
        BoardError::Validation(err.into())
    }
}

impl From<InvalidStatus> for BoardError {
    fn from(err: InvalidStatus) -> Self {
        BoardError::Validation(err.into())
    }
}

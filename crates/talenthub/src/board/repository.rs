use std::fmt;
use std::hash::Hash;

use super::domain::{
    ApplicationDraft, ApplicationId, ApplicationRecord, JobDraft, JobId, JobRecord, ResumeRef,
    UserDraft, UserId, UserRecord,
};
use super::status::ApplicationStatus;

/// A record type the store can persist.
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: Copy + Ord + Hash + fmt::Debug + From<u64> + Send + Sync + 'static;
    type Draft: Send;

    fn id(&self) -> Self::Id;

    fn materialize(id: Self::Id, draft: Self::Draft) -> Self;

    /// Uniqueness constraint checked by the store on insert and update.
    fn conflicts_with(&self, _other: &Self) -> bool {
        false
    }
}

impl Entity for UserRecord {
    type Id = UserId;
    type Draft = UserDraft;

    fn id(&self) -> UserId {
        self.id
    }

    fn materialize(id: UserId, draft: UserDraft) -> Self {
        Self {
            id,
            username: draft.username,
            email: draft.email,
            role: draft.role,
            is_superuser: draft.is_superuser,
        }
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Entity for JobRecord {
    type Id = JobId;
    type Draft = JobDraft;

    fn id(&self) -> JobId {
        self.id
    }

    fn materialize(id: JobId, draft: JobDraft) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            requirements: draft.requirements,
            salary: draft.salary,
            salary_confidential: draft.salary_confidential,
            created_by: draft.created_by,
            created_at: draft.created_at,
        }
    }
}

impl Entity for ApplicationRecord {
    type Id = ApplicationId;
    type Draft = ApplicationDraft;

    fn id(&self) -> ApplicationId {
        self.id
    }

    fn materialize(id: ApplicationId, draft: ApplicationDraft) -> Self {
        Self {
            id,
            job: draft.job,
            user: draft.user,
            status: draft.status,
            applied_at: draft.applied_at,
            resume: draft.resume,
        }
    }

    /// One application per (job, applicant).
    fn conflicts_with(&self, other: &Self) -> bool {
        self.job == other.job && self.user == other.user
    }
}

/// Storage abstraction so the service can be exercised in isolation.
pub trait Repository<R: Entity>: Send + Sync {
    fn find(&self, id: R::Id) -> Result<Option<R>, RepositoryError>;
    /// Every record satisfying `predicate`; a fresh sequence per call.
    fn query(&self, predicate: &dyn Fn(&R) -> bool) -> Result<Vec<R>, RepositoryError>;
    fn insert(&self, draft: R::Draft) -> Result<R, RepositoryError>;
    fn update(&self, record: R) -> Result<R, RepositoryError>;
    fn delete(&self, id: R::Id) -> Result<bool, RepositoryError>;
}

pub trait ApplicationRepository: Repository<ApplicationRecord> {
    /// Writes `next` only while the stored status still equals `expected`.
    fn compare_and_set_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
    ) -> Result<ApplicationRecord, RepositoryError>;
}

/// Bundle of the record stores a board runs against.
pub trait Storage: Send + Sync + 'static {
    type Users: Repository<UserRecord>;
    type Jobs: Repository<JobRecord>;
    type Applications: ApplicationRepository;

    fn users(&self) -> &Self::Users;
    fn jobs(&self) -> &Self::Jobs;
    fn applications(&self) -> &Self::Applications;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record violates a uniqueness constraint")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record changed concurrently")]
    Stale,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// A resume file as received from the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeUpload {
    pub file_name: String,
    pub content_type: mime::Mime,
    pub bytes: Vec<u8>,
}

impl ResumeUpload {
    pub fn new(file_name: impl Into<String>, content_type: mime::Mime, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }
}

/// Blob store receiving resume files.
pub trait ResumeStore: Send + Sync {
    fn store(&self, upload: ResumeUpload) -> Result<ResumeRef, ResumeStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ResumeStoreError {
    #[error("resume storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("resume storage unavailable: {0}")]
    Unavailable(String),
}

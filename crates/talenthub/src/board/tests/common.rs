use std::marker::PhantomData;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use serde_json::Value;

use crate::access::{Actor, Role};
use crate::board::domain::{
    ApplicationId, ApplicationRecord, JobInput, JobRecord, ResumeRef, UserDraft, UserRecord,
};
use crate::board::memory::{MemoryRepository, MemoryResumeStore, MemoryStorage};
use crate::board::repository::{
    ApplicationRepository, Entity, Repository, RepositoryError, ResumeStore, ResumeStoreError,
    ResumeUpload, Storage,
};
use crate::board::router::{board_router, ACTOR_HEADER};
use crate::board::salary::Salary;
use crate::board::service::JobBoardService;
use crate::board::status::ApplicationStatus;
use crate::config::BoardConfig;

/// A seeded board with one account per role.
pub(super) struct Fixture<S: Storage = MemoryStorage> {
    pub(super) service: Arc<JobBoardService<S>>,
    pub(super) resumes: MemoryResumeStore,
    pub(super) admin: Actor,
    pub(super) employer: Actor,
    pub(super) rival_employer: Actor,
    pub(super) applicant: Actor,
    pub(super) other_applicant: Actor,
    pub(super) unassigned: Actor,
}

pub(super) fn fixture() -> Fixture {
    fixture_with(MemoryStorage::default())
}

pub(super) fn fixture_with<S: Storage>(storage: S) -> Fixture<S> {
    fixture_configured(storage, BoardConfig::default())
}

pub(super) fn fixture_configured<S: Storage>(storage: S, config: BoardConfig) -> Fixture<S> {
    let resumes = MemoryResumeStore::default();
    let service = JobBoardService::new(Arc::new(storage), config)
        .with_resume_store(Arc::new(resumes.clone()));

    let seed = |username: &str, role: Role, is_superuser: bool| {
        let record = service
            .seed_user(UserDraft {
                username: username.to_string(),
                email: format!("{username}@talenthub.test"),
                role,
                is_superuser,
            })
            .expect("seed user");
        service.resolve_actor(record.id).expect("actor resolves")
    };

    let admin = seed("root", Role::NotAssigned, true);
    let employer = seed("acme", Role::Employer, false);
    let rival_employer = seed("globex", Role::Employer, false);
    let applicant = seed("ada", Role::Applicant, false);
    let other_applicant = seed("grace", Role::Applicant, false);
    let unassigned = seed("drifter", Role::NotAssigned, false);

    Fixture {
        service: Arc::new(service),
        resumes,
        admin,
        employer,
        rival_employer,
        applicant,
        other_applicant,
        unassigned,
    }
}

pub(super) fn job_input(title: &str, salary: Option<u64>, confidential: bool) -> JobInput {
    JobInput {
        title: title.to_string(),
        description: format!("{title} role"),
        requirements: String::new(),
        salary: salary.map(|units| Salary::whole(units).expect("salary in range")),
        salary_confidential: confidential,
    }
}

pub(super) fn pdf(name: &str) -> ResumeUpload {
    ResumeUpload::new(name, mime::APPLICATION_PDF, b"%PDF-1.4".to_vec())
}

pub(super) fn router<S: Storage>(fixture: &Fixture<S>) -> axum::Router {
    board_router(fixture.service.clone())
}

pub(super) fn request(
    method: Method,
    uri: &str,
    actor: Option<&Actor>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor.id.0.to_string());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("json body")))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Record store whose every call fails.
pub(super) struct UnavailableRepository<R>(PhantomData<fn() -> R>);

impl<R> Default for UnavailableRepository<R> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl<R: Entity> Repository<R> for UnavailableRepository<R> {
    fn find(&self, _id: R::Id) -> Result<Option<R>, RepositoryError> {
        Err(offline())
    }

    fn query(&self, _predicate: &dyn Fn(&R) -> bool) -> Result<Vec<R>, RepositoryError> {
        Err(offline())
    }

    fn insert(&self, _draft: R::Draft) -> Result<R, RepositoryError> {
        Err(offline())
    }

    fn update(&self, _record: R) -> Result<R, RepositoryError> {
        Err(offline())
    }

    fn delete(&self, _id: R::Id) -> Result<bool, RepositoryError> {
        Err(offline())
    }
}

impl ApplicationRepository for UnavailableRepository<ApplicationRecord> {
    fn compare_and_set_status(
        &self,
        _id: ApplicationId,
        _expected: ApplicationStatus,
        _next: ApplicationStatus,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(offline())
    }
}

/// Users resolve normally; jobs and applications are offline.
#[derive(Default)]
pub(super) struct DegradedStorage {
    users: MemoryRepository<UserRecord>,
    jobs: UnavailableRepository<JobRecord>,
    applications: UnavailableRepository<ApplicationRecord>,
}

impl Storage for DegradedStorage {
    type Users = MemoryRepository<UserRecord>;
    type Jobs = UnavailableRepository<JobRecord>;
    type Applications = UnavailableRepository<ApplicationRecord>;

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn jobs(&self) -> &Self::Jobs {
        &self.jobs
    }

    fn applications(&self) -> &Self::Applications {
        &self.applications
    }
}

/// Applications store where another writer always changes the status just
/// before a compare-and-set lands.
#[derive(Default)]
pub(super) struct RacingApplications {
    inner: MemoryRepository<ApplicationRecord>,
}

impl Repository<ApplicationRecord> for RacingApplications {
    fn find(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.find(id)
    }

    fn query(
        &self,
        predicate: &dyn Fn(&ApplicationRecord) -> bool,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.query(predicate)
    }

    fn insert(
        &self,
        draft: <ApplicationRecord as Entity>::Draft,
    ) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(draft)
    }

    fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.update(record)
    }

    fn delete(&self, id: ApplicationId) -> Result<bool, RepositoryError> {
        self.inner.delete(id)
    }
}

impl ApplicationRepository for RacingApplications {
    fn compare_and_set_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let interloper = ApplicationStatus::ALL
            .into_iter()
            .find(|status| *status != expected && *status != next)
            .unwrap_or(next);
        self.inner.compare_and_set_status(id, expected, interloper)?;
        self.inner.compare_and_set_status(id, expected, next)
    }
}

#[derive(Default)]
pub(super) struct RacingStorage {
    users: MemoryRepository<UserRecord>,
    jobs: MemoryRepository<JobRecord>,
    applications: RacingApplications,
}

impl Storage for RacingStorage {
    type Users = MemoryRepository<UserRecord>;
    type Jobs = MemoryRepository<JobRecord>;
    type Applications = RacingApplications;

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn jobs(&self) -> &Self::Jobs {
        &self.jobs
    }

    fn applications(&self) -> &Self::Applications {
        &self.applications
    }
}

/// Applications store that loses every insert to a concurrent submission.
#[derive(Default)]
pub(super) struct ContestedApplications {
    inner: MemoryRepository<ApplicationRecord>,
}

impl Repository<ApplicationRecord> for ContestedApplications {
    fn find(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.find(id)
    }

    fn query(
        &self,
        predicate: &dyn Fn(&ApplicationRecord) -> bool,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.query(predicate)
    }

    fn insert(
        &self,
        _draft: <ApplicationRecord as Entity>::Draft,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.update(record)
    }

    fn delete(&self, id: ApplicationId) -> Result<bool, RepositoryError> {
        self.inner.delete(id)
    }
}

impl ApplicationRepository for ContestedApplications {
    fn compare_and_set_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
    ) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.compare_and_set_status(id, expected, next)
    }
}

#[derive(Default)]
pub(super) struct ContestedStorage {
    users: MemoryRepository<UserRecord>,
    jobs: MemoryRepository<JobRecord>,
    applications: ContestedApplications,
}

impl Storage for ContestedStorage {
    type Users = MemoryRepository<UserRecord>;
    type Jobs = MemoryRepository<JobRecord>;
    type Applications = ContestedApplications;

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn jobs(&self) -> &Self::Jobs {
        &self.jobs
    }

    fn applications(&self) -> &Self::Applications {
        &self.applications
    }
}

pub(super) struct FailingResumeStore;

impl ResumeStore for FailingResumeStore {
    fn store(&self, _upload: ResumeUpload) -> Result<ResumeRef, ResumeStoreError> {
        Err(ResumeStoreError::Unavailable("bucket offline".to_string()))
    }
}

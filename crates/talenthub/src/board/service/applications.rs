use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use tracing::{info, warn};

use super::{BoardError, ConflictKind, JobBoardService, ValidationError, UNKNOWN_USER};
use crate::access::{authorize, AccessDenied, Action, Actor, Instance, ResourceKind, Role};
use crate::board::domain::{
    ApplicationDraft, ApplicationId, ApplicationInput, ApplicationRecord, ApplicationView, JobId,
    JobRecord, UserId,
};
use crate::board::repository::{
    ApplicationRepository, Repository, RepositoryError, ResumeUpload, Storage,
};
use crate::board::status::{transition, ApplicationStatus};
use crate::query::{execute, FilterField, ListQuery, Page, QuerySchema, SortKey};

/// Which applications a listing may draw from, narrowed before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationScope {
    All,
    SubmittedBy(UserId),
    ForJobsOf(UserId),
}

impl ApplicationScope {
    pub fn for_actor(actor: &Actor) -> Option<Self> {
        if actor.is_superuser {
            return Some(ApplicationScope::All);
        }
        match actor.role {
            Role::Applicant => Some(ApplicationScope::SubmittedBy(actor.id)),
            Role::Employer => Some(ApplicationScope::ForJobsOf(actor.id)),
            Role::Admin | Role::NotAssigned => None,
        }
    }
}

fn status(application: &ApplicationRecord) -> &str {
    application.status.label()
}

/// Newest first.
fn by_recency(a: &ApplicationRecord, b: &ApplicationRecord) -> Ordering {
    b.applied_at.cmp(&a.applied_at).then(b.id.cmp(&a.id))
}

pub(super) fn application_schema() -> QuerySchema<ApplicationRecord> {
    QuerySchema {
        filters: vec![FilterField::exact("status", status)],
        sort_keys: Vec::new(),
        default_sort: SortKey::new("applied_at", by_recency),
    }
}

impl<S> JobBoardService<S>
where
    S: Storage,
{
    pub fn list_applications(
        &self,
        actor: &Actor,
        query: &ListQuery,
    ) -> Result<Page<ApplicationView>, BoardError> {
        authorize(actor, Action::List, ResourceKind::Application, None)?;
        let scope = ApplicationScope::for_actor(actor).ok_or(AccessDenied {
            action: Action::List,
            kind: ResourceKind::Application,
        })?;

        let applications = self.storage.applications();
        let candidates = match scope {
            ApplicationScope::All => applications.query(&|_: &ApplicationRecord| true)?,
            ApplicationScope::SubmittedBy(user) => {
                applications.query(&|application: &ApplicationRecord| application.user == user)?
            }
            ApplicationScope::ForJobsOf(owner) => {
                let owned: BTreeSet<JobId> = self
                    .storage
                    .jobs()
                    .query(&|job: &JobRecord| job.created_by == owner)?
                    .into_iter()
                    .map(|job| job.id)
                    .collect();
                applications
                    .query(&|application: &ApplicationRecord| owned.contains(&application.job))?
            }
        };

        let page = execute(
            candidates,
            &application_schema(),
            query,
            self.limits(self.config.applications_per_page),
        )?;

        let mut titles = BTreeMap::new();
        for job in page.results.iter().map(|application| application.job) {
            if let Entry::Vacant(entry) = titles.entry(job) {
                let title = self.storage.jobs().find(job)?.map(|record| record.title);
                entry.insert(title.unwrap_or_default());
            }
        }
        let usernames = self.usernames(page.results.iter().map(|application| application.user))?;

        Ok(page.map(|application| {
            let title = titles.get(&application.job).map(String::as_str).unwrap_or("");
            let username = usernames
                .get(&application.user)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_USER);
            ApplicationView::new(&application, title, username)
        }))
    }

    /// Submits an application for `actor`, attaching a resume when one is uploaded.
    pub fn apply(
        &self,
        actor: &Actor,
        input: ApplicationInput,
        resume: Option<ResumeUpload>,
    ) -> Result<ApplicationView, BoardError> {
        authorize(actor, Action::Create, ResourceKind::Application, None)?;
        let job = self.find_job(input.job)?;

        if job.created_by == actor.id {
            return Err(BoardError::Conflict(ConflictKind::SelfApplication));
        }
        let existing = self
            .storage
            .applications()
            .query(&|application: &ApplicationRecord| {
                application.job == job.id && application.user == actor.id
            })?;
        if !existing.is_empty() {
            return Err(BoardError::Conflict(ConflictKind::DuplicateApplication));
        }

        let upload = match resume {
            Some(upload) if upload.bytes.is_empty() => {
                return Err(ValidationError::field("resume", "the submitted file is empty").into());
            }
            Some(upload) => {
                let store = self.resumes.as_ref().ok_or_else(|| {
                    ValidationError::field("resume", "resume uploads are not enabled")
                })?;
                Some((store, upload))
            }
            None => None,
        };

        let applications = self.storage.applications();
        let mut record = applications
            .insert(ApplicationDraft {
                job: job.id,
                user: actor.id,
                status: ApplicationStatus::Applied,
                applied_at: Utc::now(),
                resume: None,
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    BoardError::Conflict(ConflictKind::DuplicateApplication)
                }
                other => other.into(),
            })?;

        // Written after the insert; a failed write withdraws the application.
        if let Some((store, upload)) = upload {
            let stored = match store.store(upload) {
                Ok(stored) => stored,
                Err(err) => {
                    warn!(error = %err, application = record.id.0, "resume upload failed");
                    applications.delete(record.id)?;
                    return Err(err.into());
                }
            };
            let key = stored.key.clone();
            record = applications
                .update(ApplicationRecord {
                    resume: Some(stored),
                    ..record
                })
                .map_err(|err| {
                    warn!(error = %err, key = %key, "resume stored but not attached");
                    BoardError::from(err)
                })?;
        }
        info!(
            application = record.id.0,
            job = job.id.0,
            applicant = actor.id.0,
            "application submitted"
        );
        Ok(ApplicationView::new(&record, &job.title, &actor.username))
    }

    pub fn get_application(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<ApplicationView, BoardError> {
        let (record, job) = self.authorized_application(actor, Action::Read, id)?;
        self.application_view(&record, &job)
    }

    /// Moves the application to `requested`. Only the owning employer or a
    /// superuser may ask; a same-state request succeeds without a write.
    pub fn update_application_status(
        &self,
        actor: &Actor,
        id: ApplicationId,
        requested: &str,
    ) -> Result<ApplicationView, BoardError> {
        let (record, job) = self.authorized_application(actor, Action::UpdateStatus, id)?;
        let change = transition(record.status, requested)?;
        if change.is_noop() {
            return self.application_view(&record, &job);
        }

        let updated = self
            .storage
            .applications()
            .compare_and_set_status(id, change.from, change.to)
            .map_err(|err| match err {
                RepositoryError::Stale => BoardError::Conflict(ConflictKind::StaleStatus),
                RepositoryError::NotFound => {
                    BoardError::not_found(ResourceKind::Application, id.0)
                }
                other => other.into(),
            })?;
        info!(
            application = id.0,
            from = %change.from,
            to = %change.to,
            by = actor.id.0,
            "application status changed"
        );
        self.application_view(&updated, &job)
    }

    pub fn delete_application(&self, actor: &Actor, id: ApplicationId) -> Result<(), BoardError> {
        let (record, _) = self.authorized_application(actor, Action::Delete, id)?;
        if !self.storage.applications().delete(record.id)? {
            return Err(BoardError::not_found(ResourceKind::Application, id.0));
        }
        info!(application = id.0, by = actor.id.0, "application withdrawn");
        Ok(())
    }

    /// Loads the application with its job and checks `action` against both.
    fn authorized_application(
        &self,
        actor: &Actor,
        action: Action,
        id: ApplicationId,
    ) -> Result<(ApplicationRecord, JobRecord), BoardError> {
        let missing = || BoardError::not_found(ResourceKind::Application, id.0);
        let record = self.storage.applications().find(id)?.ok_or_else(missing)?;
        let job = self.storage.jobs().find(record.job)?.ok_or_else(missing)?;
        authorize(
            actor,
            action,
            ResourceKind::Application,
            Some(&Instance::application(&record, &job)),
        )?;
        Ok((record, job))
    }

    fn application_view(
        &self,
        record: &ApplicationRecord,
        job: &JobRecord,
    ) -> Result<ApplicationView, BoardError> {
        let usernames = self.usernames([record.user])?;
        let username = usernames
            .get(&record.user)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_USER);
        Ok(ApplicationView::new(record, &job.title, username))
    }
}

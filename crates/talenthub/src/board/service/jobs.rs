use std::cmp::Ordering;

use chrono::Utc;
use tracing::info;

use super::{BoardError, JobBoardService, ValidationError, UNKNOWN_USER};
use crate::access::{authorize, can_see_salary, Action, Actor, Instance, ResourceKind};
use crate::board::domain::{
    ApplicationRecord, JobDraft, JobId, JobInput, JobPatch, JobRecord, JobView,
};
use crate::board::repository::{Repository, RepositoryError, Storage};
use crate::board::salary::Salary;
use crate::query::{execute, FilterField, ListQuery, Page, QuerySchema, SortKey};

const TITLE_MAX_LEN: usize = 255;

/// A job paired with whether the listing actor may see its salary.
pub(super) struct ListedJob {
    record: JobRecord,
    disclose: bool,
}

impl ListedJob {
    fn new(actor: &Actor, record: JobRecord) -> Self {
        let disclose = can_see_salary(actor, &record);
        Self { record, disclose }
    }

    /// Masked salaries rank as absent.
    fn visible_salary(&self) -> Option<Salary> {
        self.record.salary.filter(|_| self.disclose)
    }
}

fn title(job: &ListedJob) -> &str {
    &job.record.title
}

fn by_id(a: &ListedJob, b: &ListedJob) -> Ordering {
    a.record.id.cmp(&b.record.id)
}

fn by_title(a: &ListedJob, b: &ListedJob) -> Ordering {
    a.record.title.cmp(&b.record.title).then(by_id(a, b))
}

/// Jobs without a visible salary sort first.
fn by_salary(a: &ListedJob, b: &ListedJob) -> Ordering {
    a.visible_salary().cmp(&b.visible_salary()).then(by_id(a, b))
}

fn by_created_at(a: &ListedJob, b: &ListedJob) -> Ordering {
    a.record.created_at.cmp(&b.record.created_at).then(by_id(a, b))
}

pub(super) fn job_schema() -> QuerySchema<ListedJob> {
    QuerySchema {
        filters: vec![FilterField::contains("title", title)],
        sort_keys: vec![
            SortKey::new("id", by_id),
            SortKey::new("title", by_title),
            SortKey::new("salary", by_salary),
            SortKey::new("created_at", by_created_at),
        ],
        default_sort: SortKey::new("id", by_id),
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::field("title", "this field may not be blank"));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(ValidationError::field(
            "title",
            format!("ensure this field has no more than {TITLE_MAX_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.trim().is_empty() {
        return Err(ValidationError::field(
            "description",
            "this field may not be blank",
        ));
    }
    Ok(())
}

impl<S> JobBoardService<S>
where
    S: Storage,
{
    pub fn list_jobs(
        &self,
        actor: &Actor,
        query: &ListQuery,
    ) -> Result<Page<JobView>, BoardError> {
        authorize(actor, Action::List, ResourceKind::Job, None)?;
        let records = self
            .storage
            .jobs()
            .query(&|_: &JobRecord| true)?
            .into_iter()
            .map(|record| ListedJob::new(actor, record))
            .collect();
        let page = execute(
            records,
            &job_schema(),
            query,
            self.limits(self.config.jobs_per_page),
        )?;

        let creators = self.usernames(page.results.iter().map(|job| job.record.created_by))?;
        Ok(page.map(|job| {
            let creator = creators
                .get(&job.record.created_by)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_USER);
            JobView::new(&job.record, creator, job.disclose)
        }))
    }

    /// Posts a job owned by `actor`.
    pub fn create_job(&self, actor: &Actor, input: JobInput) -> Result<JobView, BoardError> {
        authorize(actor, Action::Create, ResourceKind::Job, None)?;
        validate_title(&input.title)?;
        validate_description(&input.description)?;

        let record = self.storage.jobs().insert(JobDraft {
            title: input.title,
            description: input.description,
            requirements: input.requirements,
            salary: input.salary,
            salary_confidential: input.salary_confidential,
            created_by: actor.id,
            created_at: Utc::now(),
        })?;
        info!(job = record.id.0, by = actor.id.0, "job posted");
        Ok(JobView::new(&record, &actor.username, true))
    }

    pub fn get_job(&self, actor: &Actor, id: JobId) -> Result<JobView, BoardError> {
        authorize(actor, Action::Read, ResourceKind::Job, None)?;
        let record = self.find_job(id)?;
        authorize(actor, Action::Read, ResourceKind::Job, Some(&Instance::job(&record)))?;
        self.job_view(actor, &record)
    }

    /// Full replacement of the descriptive fields; the creator never changes.
    pub fn replace_job(
        &self,
        actor: &Actor,
        id: JobId,
        input: JobInput,
    ) -> Result<JobView, BoardError> {
        let mut record = self.owned_job(actor, Action::Update, id)?;
        validate_title(&input.title)?;
        validate_description(&input.description)?;

        record.title = input.title;
        record.description = input.description;
        record.requirements = input.requirements;
        record.salary = input.salary;
        record.salary_confidential = input.salary_confidential;
        self.save_job(actor, record)
    }

    pub fn patch_job(
        &self,
        actor: &Actor,
        id: JobId,
        patch: JobPatch,
    ) -> Result<JobView, BoardError> {
        let mut record = self.owned_job(actor, Action::Update, id)?;
        if let Some(title) = patch.title {
            validate_title(&title)?;
            record.title = title;
        }
        if let Some(description) = patch.description {
            validate_description(&description)?;
            record.description = description;
        }
        if let Some(requirements) = patch.requirements {
            record.requirements = requirements;
        }
        if let Some(salary) = patch.salary {
            record.salary = salary;
        }
        if let Some(confidential) = patch.salary_confidential {
            record.salary_confidential = confidential;
        }
        self.save_job(actor, record)
    }

    /// Removes the job and every application submitted to it.
    pub fn delete_job(&self, actor: &Actor, id: JobId) -> Result<(), BoardError> {
        let record = self.owned_job(actor, Action::Delete, id)?;
        self.remove_job(record.id)?;
        info!(job = id.0, by = actor.id.0, "job deleted");
        Ok(())
    }

    pub(super) fn remove_job(&self, id: JobId) -> Result<(), BoardError> {
        let applications = self.storage.applications();
        let submitted =
            applications.query(&|application: &ApplicationRecord| application.job == id)?;
        for application in submitted {
            applications.delete(application.id)?;
        }
        if !self.storage.jobs().delete(id)? {
            return Err(BoardError::not_found(ResourceKind::Job, id.0));
        }
        Ok(())
    }

    pub(super) fn find_job(&self, id: JobId) -> Result<JobRecord, BoardError> {
        self.storage
            .jobs()
            .find(id)?
            .ok_or_else(|| BoardError::not_found(ResourceKind::Job, id.0))
    }

    /// Existence is checked before ownership, so strangers see 404 for
    /// missing jobs and 403 for other people's.
    fn owned_job(
        &self,
        actor: &Actor,
        action: Action,
        id: JobId,
    ) -> Result<JobRecord, BoardError> {
        let record = self.find_job(id)?;
        authorize(actor, action, ResourceKind::Job, Some(&Instance::job(&record)))?;
        Ok(record)
    }

    fn save_job(&self, actor: &Actor, record: JobRecord) -> Result<JobView, BoardError> {
        let id = record.id;
        let saved = self
            .storage
            .jobs()
            .update(record)
            .map_err(|err| match err {
                RepositoryError::NotFound => BoardError::not_found(ResourceKind::Job, id.0),
                other => other.into(),
            })?;
        info!(job = id.0, by = actor.id.0, "job updated");
        self.job_view(actor, &saved)
    }

    fn job_view(&self, actor: &Actor, record: &JobRecord) -> Result<JobView, BoardError> {
        let creators = self.usernames([record.created_by])?;
        let creator = creators
            .get(&record.created_by)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_USER);
        Ok(JobView::new(record, creator, can_see_salary(actor, record)))
    }
}

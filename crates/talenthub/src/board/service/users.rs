use std::cmp::Ordering;

use tracing::info;

use super::{BoardError, JobBoardService, ValidationError};
use crate::access::{authorize, Action, Actor, Instance, ResourceKind};
use crate::board::domain::{
    ApplicationRecord, JobRecord, UserDraft, UserId, UserInput, UserPatch, UserRecord, UserView,
};
use crate::board::repository::{Repository, RepositoryError, Storage};
use crate::query::{execute, FilterField, ListQuery, Page, QuerySchema, SortKey};

const USERNAME_MAX_LEN: usize = 150;

fn username(user: &UserRecord) -> &str {
    &user.username
}

fn email(user: &UserRecord) -> &str {
    &user.email
}

fn role(user: &UserRecord) -> &str {
    user.role.as_str()
}

fn by_id(a: &UserRecord, b: &UserRecord) -> Ordering {
    a.id.cmp(&b.id)
}

fn by_username(a: &UserRecord, b: &UserRecord) -> Ordering {
    a.username.cmp(&b.username).then(a.id.cmp(&b.id))
}

fn by_email(a: &UserRecord, b: &UserRecord) -> Ordering {
    a.email.cmp(&b.email).then(a.id.cmp(&b.id))
}

fn by_role(a: &UserRecord, b: &UserRecord) -> Ordering {
    role(a).cmp(role(b)).then(a.id.cmp(&b.id))
}

pub(super) fn user_schema() -> QuerySchema<UserRecord> {
    QuerySchema {
        filters: vec![
            FilterField::contains("username", username),
            FilterField::contains("email", email),
            FilterField::exact("role", role),
        ],
        sort_keys: vec![
            SortKey::new("id", by_id),
            SortKey::new("username", by_username),
            SortKey::new("email", by_email),
            SortKey::new("role", by_role),
        ],
        default_sort: SortKey::new("id", by_id),
    }
}

pub(super) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::field("username", "this field may not be blank"));
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(ValidationError::field(
            "username",
            format!("ensure this field has no more than {USERNAME_MAX_LEN} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(ValidationError::field(
            "username",
            "may contain only letters, digits and @/./+/-/_ characters",
        ));
    }
    Ok(())
}

/// Email is optional; when given it needs a local part and a dotted domain.
pub(super) fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Ok(());
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::field("email", "enter a valid email address"))
    }
}

pub(super) fn username_conflict(err: RepositoryError) -> BoardError {
    match err {
        RepositoryError::Conflict => BoardError::Validation(ValidationError::field(
            "username",
            "a user with that username already exists",
        )),
        other => other.into(),
    }
}

impl<S> JobBoardService<S>
where
    S: Storage,
{
    pub fn list_users(
        &self,
        actor: &Actor,
        query: &ListQuery,
    ) -> Result<Page<UserView>, BoardError> {
        authorize(actor, Action::List, ResourceKind::User, None)?;
        let records = self.storage.users().query(&|_: &UserRecord| true)?;
        let page = execute(
            records,
            &user_schema(),
            query,
            self.limits(self.config.users_per_page),
        )?;
        Ok(page.map(|record| UserView::from(&record)))
    }

    pub fn create_user(&self, actor: &Actor, input: UserInput) -> Result<UserView, BoardError> {
        authorize(actor, Action::Create, ResourceKind::User, None)?;
        validate_username(&input.username)?;
        validate_email(&input.email)?;

        let record = self
            .storage
            .users()
            .insert(UserDraft {
                username: input.username,
                email: input.email,
                role: input.role,
                is_superuser: false,
            })
            .map_err(username_conflict)?;
        info!(
            user = record.id.0,
            role = record.role.as_str(),
            by = actor.id.0,
            "user created"
        );
        Ok(UserView::from(&record))
    }

    pub fn get_user(&self, actor: &Actor, id: UserId) -> Result<UserView, BoardError> {
        let record = self.authorized_user(actor, Action::Read, id)?;
        Ok(UserView::from(&record))
    }

    /// Full replacement; the superuser flag is not writable through this path.
    pub fn replace_user(
        &self,
        actor: &Actor,
        id: UserId,
        input: UserInput,
    ) -> Result<UserView, BoardError> {
        let mut record = self.authorized_user(actor, Action::Update, id)?;
        validate_username(&input.username)?;
        validate_email(&input.email)?;

        record.username = input.username;
        record.email = input.email;
        record.role = input.role;
        self.save_user(actor, record)
    }

    pub fn patch_user(
        &self,
        actor: &Actor,
        id: UserId,
        patch: UserPatch,
    ) -> Result<UserView, BoardError> {
        let mut record = self.authorized_user(actor, Action::Update, id)?;
        if let Some(username) = patch.username {
            validate_username(&username)?;
            record.username = username;
        }
        if let Some(email) = patch.email {
            validate_email(&email)?;
            record.email = email;
        }
        if let Some(role) = patch.role {
            record.role = role;
        }
        self.save_user(actor, record)
    }

    /// Removes the account together with its applications, the jobs it
    /// created, and every application on those jobs.
    pub fn delete_user(&self, actor: &Actor, id: UserId) -> Result<(), BoardError> {
        let record = self.authorized_user(actor, Action::Delete, id)?;

        let applications = self.storage.applications();
        let submitted = applications.query(&|application: &ApplicationRecord| {
            application.user == record.id
        })?;
        for application in submitted {
            applications.delete(application.id)?;
        }
        let posted = self
            .storage
            .jobs()
            .query(&|job: &JobRecord| job.created_by == record.id)?;
        for job in posted {
            self.remove_job(job.id)?;
        }
        if !self.storage.users().delete(record.id)? {
            return Err(BoardError::not_found(ResourceKind::User, id.0));
        }
        info!(user = id.0, by = actor.id.0, "user deleted");
        Ok(())
    }

    fn authorized_user(
        &self,
        actor: &Actor,
        action: Action,
        id: UserId,
    ) -> Result<UserRecord, BoardError> {
        authorize(actor, action, ResourceKind::User, None)?;
        let record = self
            .storage
            .users()
            .find(id)?
            .ok_or_else(|| BoardError::not_found(ResourceKind::User, id.0))?;
        authorize(actor, action, ResourceKind::User, Some(&Instance::User { id }))?;
        Ok(record)
    }

    fn save_user(&self, actor: &Actor, record: UserRecord) -> Result<UserView, BoardError> {
        let id = record.id;
        let saved = self
            .storage
            .users()
            .update(record)
            .map_err(|err| match err {
                RepositoryError::NotFound => BoardError::not_found(ResourceKind::User, id.0),
                other => username_conflict(other),
            })?;
        info!(user = id.0, by = actor.id.0, "user updated");
        Ok(UserView::from(&saved))
    }
}

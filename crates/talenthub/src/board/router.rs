use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request, State},
    http::{
        header::{CONTENT_TYPE, RETRY_AFTER},
        request::Parts,
        HeaderMap, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::domain::{
    ApplicationId, ApplicationInput, ApplicationView, JobId, JobInput, JobPatch, JobView,
    StatusInput, UserId, UserInput, UserPatch, UserView,
};
use super::repository::{ResumeUpload, Storage};
use super::service::{BoardError, JobBoardService, ValidationError};
use super::throttle::{throttle_requests, ThrottleGate};
use crate::access::Actor;
use crate::query::{ListQuery, Page};

/// Header carrying the id of the user authenticated upstream.
pub const ACTOR_HEADER: &str = "x-user-id";

type Board<S> = State<Arc<JobBoardService<S>>>;
type Params = Query<Vec<(String, String)>>;

/// Router exposing the users, jobs, and applications resources. The user
/// administration routes are throttled per caller.
pub fn board_router<S>(service: Arc<JobBoardService<S>>) -> Router
where
    S: Storage,
{
    let admin = Router::new()
        .route(
            "/api/v1/admin/users",
            get(list_users::<S>).post(create_user::<S>),
        )
        .route(
            "/api/v1/admin/users/:user_id",
            get(get_user::<S>)
                .put(replace_user::<S>)
                .patch(patch_user::<S>)
                .delete(delete_user::<S>),
        )
        .route_layer(middleware::from_fn_with_state(
            ThrottleGate::new(service.clone()),
            throttle_requests::<S>,
        ));

    Router::new()
        .merge(admin)
        .route("/api/v1/jobs", get(list_jobs::<S>).post(create_job::<S>))
        .route(
            "/api/v1/jobs/:job_id",
            get(get_job::<S>)
                .put(replace_job::<S>)
                .patch(patch_job::<S>)
                .delete(delete_job::<S>),
        )
        .route(
            "/api/v1/applications",
            get(list_applications::<S>).post(submit_application::<S>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(get_application::<S>)
                .patch(update_application_status::<S>)
                .delete(delete_application::<S>),
        )
        .with_state(service)
}

pub(super) fn actor_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// The authenticated caller, resolved before any body is read.
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<Arc<JobBoardService<S>>> for CurrentActor
where
    S: Storage,
{
    type Rejection = BoardError;

    async fn from_request_parts(
        parts: &mut Parts,
        service: &Arc<JobBoardService<S>>,
    ) -> Result<Self, Self::Rejection> {
        let id = actor_id(&parts.headers).ok_or(BoardError::Unauthenticated)?;
        service.resolve_actor(UserId(id)).map(Self)
    }
}

fn deleted(resource: &str) -> Json<serde_json::Value> {
    Json(json!({ "detail": format!("{resource} successfully deleted") }))
}

async fn list_users<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Query(params): Params,
) -> Result<Json<Page<UserView>>, BoardError> {
    let page = service.list_users(&actor, &ListQuery::from_params(params))?;
    Ok(Json(page))
}

async fn create_user<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    JsonBody(input): JsonBody<UserInput>,
) -> Result<(StatusCode, Json<UserView>), BoardError> {
    let view = service.create_user(&actor, input)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_user<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(user_id): Path<u64>,
) -> Result<Json<UserView>, BoardError> {
    Ok(Json(service.get_user(&actor, UserId(user_id))?))
}

async fn replace_user<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(user_id): Path<u64>,
    JsonBody(input): JsonBody<UserInput>,
) -> Result<Json<UserView>, BoardError> {
    Ok(Json(service.replace_user(&actor, UserId(user_id), input)?))
}

async fn patch_user<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(user_id): Path<u64>,
    JsonBody(patch): JsonBody<UserPatch>,
) -> Result<Json<UserView>, BoardError> {
    Ok(Json(service.patch_user(&actor, UserId(user_id), patch)?))
}

async fn delete_user<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(user_id): Path<u64>,
) -> Result<Json<serde_json::Value>, BoardError> {
    service.delete_user(&actor, UserId(user_id))?;
    Ok(deleted("User"))
}

async fn list_jobs<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Query(params): Params,
) -> Result<Json<Page<JobView>>, BoardError> {
    let page = service.list_jobs(&actor, &ListQuery::from_params(params))?;
    Ok(Json(page))
}

async fn create_job<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    JsonBody(input): JsonBody<JobInput>,
) -> Result<(StatusCode, Json<JobView>), BoardError> {
    let view = service.create_job(&actor, input)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_job<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(job_id): Path<u64>,
) -> Result<Json<JobView>, BoardError> {
    Ok(Json(service.get_job(&actor, JobId(job_id))?))
}

async fn replace_job<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(job_id): Path<u64>,
    JsonBody(input): JsonBody<JobInput>,
) -> Result<Json<JobView>, BoardError> {
    Ok(Json(service.replace_job(&actor, JobId(job_id), input)?))
}

async fn patch_job<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(job_id): Path<u64>,
    JsonBody(patch): JsonBody<JobPatch>,
) -> Result<Json<JobView>, BoardError> {
    Ok(Json(service.patch_job(&actor, JobId(job_id), patch)?))
}

async fn delete_job<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(job_id): Path<u64>,
) -> Result<Json<serde_json::Value>, BoardError> {
    service.delete_job(&actor, JobId(job_id))?;
    Ok(deleted("Job"))
}

async fn list_applications<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Query(params): Params,
) -> Result<Json<Page<ApplicationView>>, BoardError> {
    let page = service.list_applications(&actor, &ListQuery::from_params(params))?;
    Ok(Json(page))
}

async fn submit_application<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    form: ApplicationForm,
) -> Result<(StatusCode, Json<ApplicationView>), BoardError> {
    let view = service.apply(&actor, form.input, form.resume)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_application<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(application_id): Path<u64>,
) -> Result<Json<ApplicationView>, BoardError> {
    Ok(Json(
        service.get_application(&actor, ApplicationId(application_id))?,
    ))
}

async fn update_application_status<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(application_id): Path<u64>,
    JsonBody(input): JsonBody<StatusInput>,
) -> Result<Json<ApplicationView>, BoardError> {
    let view = service.update_application_status(
        &actor,
        ApplicationId(application_id),
        &input.status,
    )?;
    Ok(Json(view))
}

async fn delete_application<S: Storage>(
    State(service): Board<S>,
    CurrentActor(actor): CurrentActor,
    Path(application_id): Path<u64>,
) -> Result<Json<serde_json::Value>, BoardError> {
    service.delete_application(&actor, ApplicationId(application_id))?;
    Ok(deleted("Application"))
}

/// JSON body whose rejections surface as validation errors.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = BoardError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ValidationError::field("body", rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Application submission, either JSON or `multipart/form-data` with a
/// `job` field and an optional `resume` file.
pub struct ApplicationForm {
    pub input: ApplicationInput,
    pub resume: Option<ResumeUpload>,
}

#[async_trait]
impl<S> FromRequest<S> for ApplicationForm
where
    S: Send + Sync,
{
    type Rejection = BoardError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));
        if !is_multipart {
            let JsonBody(input) = JsonBody::<ApplicationInput>::from_request(req, state).await?;
            return Ok(Self {
                input,
                resume: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| ValidationError::field("body", rejection.body_text()))?;
        let malformed = |err: axum::extract::multipart::MultipartError| {
            ValidationError::field("body", err.body_text())
        };

        let mut job = None;
        let mut resume = None;
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("job") => {
                    let raw = field.text().await.map_err(malformed)?;
                    let id = raw.trim().parse::<u64>().map_err(|_| {
                        ValidationError::field("job", format!("invalid job id '{raw}'"))
                    })?;
                    job = Some(JobId(id));
                }
                Some("resume") => {
                    let file_name = field.file_name().unwrap_or("resume").to_string();
                    let content_type = field
                        .content_type()
                        .and_then(|value| value.parse::<mime::Mime>().ok())
                        .unwrap_or(mime::APPLICATION_OCTET_STREAM);
                    let bytes = field.bytes().await.map_err(malformed)?;
                    resume = Some(ResumeUpload::new(file_name, content_type, bytes.to_vec()));
                }
                _ => {}
            }
        }

        let job = job.ok_or_else(|| ValidationError::field("job", "this field is required"))?;
        Ok(Self {
            input: ApplicationInput { job },
            resume,
        })
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, payload) = match &self {
            BoardError::Unauthenticated => (StatusCode::UNAUTHORIZED, json!({ "error": message })),
            BoardError::PermissionDenied(denied) => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": message,
                    "action": denied.action,
                    "resource": denied.kind,
                }),
            ),
            BoardError::NotFound { kind, id } => (
                StatusCode::NOT_FOUND,
                json!({ "error": message, "resource": kind, "id": id }),
            ),
            BoardError::Validation(ValidationError::Status(invalid)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "allowed": invalid.allowed }),
            ),
            BoardError::Validation(ValidationError::Field { field, .. }) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "field": field }),
            ),
            BoardError::Validation(ValidationError::Query(_)) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            BoardError::Conflict(kind) => (
                StatusCode::CONFLICT,
                json!({ "error": message, "kind": kind }),
            ),
            BoardError::Throttled { retry_after_secs } => {
                let payload = json!({ "error": message, "retry_after": retry_after_secs });
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(RETRY_AFTER, retry_after_secs.to_string())],
                    Json(payload),
                )
                    .into_response();
            }
            BoardError::Repository(_) | BoardError::ResumeStore(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            ),
        };
        (status, Json(payload)).into_response()
    }
}

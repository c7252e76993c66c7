//! End-to-end hiring scenarios driven through the public service facade and the HTTP router.

mod common {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use talenthub::access::{Actor, Role};
    use talenthub::board::{board_router, JobBoardService, MemoryStorage, UserDraft, ACTOR_HEADER};
    use talenthub::config::BoardConfig;

    pub(super) struct Board {
        pub(super) service: Arc<JobBoardService<MemoryStorage>>,
        pub(super) root: Actor,
        pub(super) acme: Actor,
        pub(super) globex: Actor,
        pub(super) ada: Actor,
    }

    impl Board {
        pub(super) fn new() -> Self {
            let service = JobBoardService::new(
                Arc::new(MemoryStorage::default()),
                BoardConfig::default(),
            );
            let seed = |username: &str, role: Role, is_superuser: bool| {
                let user = service
                    .seed_user(UserDraft {
                        username: username.to_string(),
                        email: format!("{username}@example.com"),
                        role,
                        is_superuser,
                    })
                    .expect("seeded");
                service.resolve_actor(user.id).expect("actor")
            };
            let root = seed("root", Role::NotAssigned, true);
            let acme = seed("acme", Role::Employer, false);
            let globex = seed("globex", Role::Employer, false);
            let ada = seed("ada", Role::Applicant, false);

            Self {
                service: Arc::new(service),
                root,
                acme,
                globex,
                ada,
            }
        }

        pub(super) async fn call(
            &self,
            method: Method,
            uri: &str,
            actor: &Actor,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(ACTOR_HEADER, actor.id.0.to_string());
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
                None => builder.body(Body::empty()).expect("request"),
            };

            let response = board_router(self.service.clone())
                .oneshot(request)
                .await
                .expect("route executes");
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body");
            (status, serde_json::from_slice(&bytes).expect("json"))
        }
    }
}

use axum::http::{Method, StatusCode};
use common::Board;
use serde_json::json;

#[tokio::test]
async fn confidential_salary_is_visible_only_to_creator_and_superusers() {
    let board = Board::new();
    let (status, job) = board
        .call(
            Method::POST,
            "/api/v1/jobs",
            &board.acme,
            Some(json!({
                "title": "Principal Engineer",
                "description": "Own the architecture",
                "salary": 5000,
                "salary_confidential": true,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/v1/jobs/{}", job["id"]);

    let (_, as_applicant) = board.call(Method::GET, &uri, &board.ada, None).await;
    assert_eq!(as_applicant["salary"], "confidential");

    let (_, as_rival) = board.call(Method::GET, &uri, &board.globex, None).await;
    assert_eq!(as_rival["salary"], "confidential");

    let (_, as_creator) = board.call(Method::GET, &uri, &board.acme, None).await;
    assert_eq!(as_creator["salary"], "5000.00");

    let (_, as_root) = board.call(Method::GET, &uri, &board.root, None).await;
    assert_eq!(as_root["salary"], "5000.00");
}

#[tokio::test]
async fn only_the_job_owner_moves_an_application_forward() {
    let board = Board::new();
    let (_, job) = board
        .call(
            Method::POST,
            "/api/v1/jobs",
            &board.acme,
            Some(json!({ "title": "Backend", "description": "APIs" })),
        )
        .await;
    let (status, application) = board
        .call(
            Method::POST,
            "/api/v1/applications",
            &board.ada,
            Some(json!({ "job": job["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/v1/applications/{}", application["id"]);

    let (status, _) = board
        .call(
            Method::PATCH,
            &uri,
            &board.ada,
            Some(json!({ "status": "shortlisted" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = board
        .call(
            Method::PATCH,
            &uri,
            &board.acme,
            Some(json!({ "status": "shortlisted" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "shortlisted");

    let (_, listed) = board
        .call(
            Method::GET,
            "/api/v1/applications?status=shortlisted",
            &board.ada,
            None,
        )
        .await;
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["results"][0]["job_title"], "Backend");
}

#[tokio::test]
async fn a_second_application_to_the_same_job_conflicts() {
    let board = Board::new();
    let (_, job) = board
        .call(
            Method::POST,
            "/api/v1/jobs",
            &board.acme,
            Some(json!({ "title": "Backend", "description": "APIs" })),
        )
        .await;
    let payload = json!({ "job": job["id"] });

    let (first, _) = board
        .call(
            Method::POST,
            "/api/v1/applications",
            &board.ada,
            Some(payload.clone()),
        )
        .await;
    assert_eq!(first, StatusCode::CREATED);

    let (second, body) = board
        .call(Method::POST, "/api/v1/applications", &board.ada, Some(payload))
        .await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "duplicate_application");

    let (_, listed) = board
        .call(Method::GET, "/api/v1/applications", &board.root, None)
        .await;
    assert_eq!(listed["count"], 1);
}

#[tokio::test]
async fn strangers_cannot_delete_a_job_but_superusers_can() {
    let board = Board::new();
    let (_, job) = board
        .call(
            Method::POST,
            "/api/v1/jobs",
            &board.acme,
            Some(json!({ "title": "Backend", "description": "APIs" })),
        )
        .await;
    let uri = format!("/api/v1/jobs/{}", job["id"]);

    let (status, _) = board.call(Method::DELETE, &uri, &board.globex, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, still_there) = board.call(Method::GET, &uri, &board.ada, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(still_there["title"], "Backend");

    let (status, _) = board.call(Method::DELETE, &uri, &board.root, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = board.call(Method::GET, &uri, &board.ada, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

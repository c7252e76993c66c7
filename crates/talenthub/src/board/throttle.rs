//! Per-caller request budgets for the user administration routes.
//!
//! Known users are counted by id. Everyone else, including callers whose
//! actor header names no user, is counted per `x-forwarded-for` address.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::debug;

use super::domain::UserId;
use super::repository::Storage;
use super::router::actor_id;
use super::service::{BoardError, JobBoardService};
use crate::config::ThrottleConfig;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

/// Who a request is charged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    User(UserId),
    Anonymous(String),
}

pub struct Throttle {
    users: DefaultKeyedRateLimiter<UserId>,
    anonymous: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            users: RateLimiter::keyed(Quota::per_minute(config.user_per_minute)),
            anonymous: RateLimiter::keyed(Quota::per_minute(config.anon_per_minute)),
            clock: DefaultClock::default(),
        }
    }

    /// Spends one request from the caller's budget, or reports how long
    /// until the next one is available.
    pub fn admit(&self, caller: &Caller) -> Result<(), Duration> {
        let verdict = match caller {
            Caller::User(id) => self.users.check_key(id),
            Caller::Anonymous(client) => self.anonymous.check_key(client),
        };
        verdict.map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

/// Middleware state: the throttle plus the service used to tell real users
/// from anonymous callers.
pub(super) struct ThrottleGate<S> {
    service: Arc<JobBoardService<S>>,
    throttle: Arc<Throttle>,
}

impl<S> Clone for ThrottleGate<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            throttle: Arc::clone(&self.throttle),
        }
    }
}

impl<S: Storage> ThrottleGate<S> {
    pub(super) fn new(service: Arc<JobBoardService<S>>) -> Self {
        let throttle = Arc::new(Throttle::new(service.config().throttle));
        Self { service, throttle }
    }

    fn caller(&self, headers: &HeaderMap) -> Caller {
        let known_user = actor_id(headers)
            .and_then(|id| self.service.resolve_actor(UserId(id)).ok())
            .map(|actor| actor.id);
        match known_user {
            Some(id) => Caller::User(id),
            None => Caller::Anonymous(client_address(headers)),
        }
    }
}

fn client_address(headers: &HeaderMap) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

pub(super) async fn throttle_requests<S: Storage>(
    State(gate): State<ThrottleGate<S>>,
    request: Request,
    next: Next,
) -> Response {
    let caller = gate.caller(request.headers());
    match gate.throttle.admit(&caller) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            debug!(?caller, retry_after_secs, "request throttled");
            BoardError::Throttled {
                retry_after_secs: retry_after_secs.max(1),
            }
            .into_response()
        }
    }
}

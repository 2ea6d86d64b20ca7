//! HTTP backend for the API service
//!
//! [`ApiClient`] keeps the session cookie and the CSRF token for the
//! service. Mutating requests carry the token in `X-CSRF-Token`; when the
//! server answers 403 the token is dropped, fetched again and the request
//! is retried once.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{SharedClock, SystemClock};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::TaskBackend;
use crate::error::{PlannerError, PlannerResult};
use crate::models::{
    NewScheduledTask, NewUnscheduledTask, ProjectStepPlacement, ScheduledTask, Slot, TaskEdit,
    UnscheduledTask,
};

pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Client-side lifetime of a fetched token, below the server's 24 hours
pub const TOKEN_CACHE_HOURS: i64 = 23;

/// Session established with the API service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionInfo {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    fetched_at: DateTime<Utc>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    clock: SharedClock,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> PlannerResult<Self> {
        Self::with_clock(base_url, SystemClock::shared())
    }

    pub fn with_clock(base_url: &str, clock: SharedClock) -> PlannerResult<Self> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                clock,
                token: Mutex::new(None),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    /// Exchange an access token from the auth provider for a session cookie
    pub async fn establish_session(&self, access_token: &str) -> PlannerResult<SessionInfo> {
        let response = self
            .inner
            .http
            .post(self.url("/api/session"))
            .bearer_auth(access_token)
            .send()
            .await?;

        let session: SessionInfo = decode(response).await?;
        self.clear_token().await;

        info!("Session established for user {}", session.user_id);
        Ok(session)
    }

    pub async fn end_session(&self) -> PlannerResult<()> {
        let response = self
            .inner
            .http
            .delete(self.url("/api/session"))
            .send()
            .await?;

        self.clear_token().await;
        let _: Value = decode(response).await?;

        info!("Session ended");
        Ok(())
    }

    /// Cached CSRF token, fetched when missing or older than 23 hours
    pub async fn csrf_token(&self) -> PlannerResult<String> {
        let mut cached = self.inner.token.lock().await;
        let now = self.inner.clock.now();

        if let Some(entry) = cached.as_ref() {
            if now - entry.fetched_at < Duration::hours(TOKEN_CACHE_HOURS) {
                return Ok(entry.token.clone());
            }
        }

        debug!("Fetching CSRF token");
        let response = self
            .inner
            .http
            .get(self.url("/api/csrf/token"))
            .send()
            .await?;
        let body: TokenResponse = decode(response).await?;

        *cached = Some(CachedToken {
            token: body.token.clone(),
            fetched_at: now,
        });
        Ok(body.token)
    }

    pub async fn clear_token(&self) {
        *self.inner.token.lock().await = None;
    }

    /// Remember a token the server attached to a response
    async fn capture_token(&self, response: &Response) {
        let Some(token) = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
        else {
            return;
        };

        let mut cached = self.inner.token.lock().await;
        if cached.as_ref().map(|c| c.token.as_str()) != Some(token) {
            *cached = Some(CachedToken {
                token: token.to_string(),
                fetched_at: self.inner.clock.now(),
            });
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PlannerResult<T> {
        let response = self.inner.http.get(self.url(path)).send().await?;
        self.capture_token(&response).await;
        decode(response).await
    }

    /// Mutating request with the CSRF header, retried once on 403
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> PlannerResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body.map(serde_json::to_vec).transpose()?;

        let response = self.send_with_token(method.clone(), path, body.clone()).await?;
        if response.status() != StatusCode::FORBIDDEN {
            return decode(response).await;
        }

        warn!("CSRF token rejected for {} {}, retrying with a new token", method, path);
        self.clear_token().await;

        let response = self.send_with_token(method, path, body).await?;
        decode(response).await
    }

    async fn send_with_token(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> PlannerResult<Response> {
        let token = self.csrf_token().await?;

        let mut request = self
            .inner
            .http
            .request(method, self.url(path))
            .header(CSRF_HEADER, token);

        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body);
        }

        let response = request.send().await?;
        self.capture_token(&response).await;
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> PlannerResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().unwrap_or("Unknown error").to_string(),
    };

    Err(match status {
        StatusCode::UNAUTHORIZED => PlannerError::Unauthorized,
        StatusCode::FORBIDDEN => PlannerError::CsrfRejected,
        StatusCode::NOT_FOUND => PlannerError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            PlannerError::Validation(message)
        }
        _ => PlannerError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

/// [`TaskBackend`] over the API service's task routes
#[derive(Clone)]
pub struct HttpTaskBackend {
    client: ApiClient,
}

impl HttpTaskBackend {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskBackend for HttpTaskBackend {
    async fn scheduled_tasks(&self) -> PlannerResult<Vec<ScheduledTask>> {
        self.client.get_json("/api/tasks/scheduled").await
    }

    async fn unscheduled_tasks(&self) -> PlannerResult<Vec<UnscheduledTask>> {
        self.client.get_json("/api/tasks/unscheduled").await
    }

    async fn project_tasks(&self) -> PlannerResult<Vec<UnscheduledTask>> {
        self.client.get_json("/api/tasks/project").await
    }

    async fn add_scheduled(&self, task: NewScheduledTask) -> PlannerResult<ScheduledTask> {
        self.client
            .send_json(Method::POST, "/api/tasks/scheduled", Some(&task))
            .await
    }

    async fn update_scheduled(&self, id: &str, edit: TaskEdit) -> PlannerResult<ScheduledTask> {
        self.client
            .send_json(Method::PUT, &format!("/api/tasks/scheduled/{}", id), Some(&edit))
            .await
    }

    async fn move_scheduled(&self, id: &str, slot: Slot) -> PlannerResult<ScheduledTask> {
        self.client
            .send_json(
                Method::PUT,
                &format!("/api/tasks/scheduled/{}/slot", id),
                Some(&slot),
            )
            .await
    }

    async fn set_completed(&self, id: &str, completed: bool) -> PlannerResult<ScheduledTask> {
        self.client
            .send_json(
                Method::PUT,
                &format!("/api/tasks/scheduled/{}/completion", id),
                Some(&json!({ "completed": completed })),
            )
            .await
    }

    async fn delete_scheduled(&self, id: &str) -> PlannerResult<()> {
        let _: Value = self
            .client
            .send_json::<Value, _>(
                Method::DELETE,
                &format!("/api/tasks/scheduled/{}", id),
                None,
            )
            .await?;
        Ok(())
    }

    async fn add_unscheduled(&self, task: NewUnscheduledTask) -> PlannerResult<UnscheduledTask> {
        self.client
            .send_json(Method::POST, "/api/tasks/unscheduled", Some(&task))
            .await
    }

    async fn delete_unscheduled(&self, id: &str) -> PlannerResult<()> {
        let _: Value = self
            .client
            .send_json::<Value, _>(
                Method::DELETE,
                &format!("/api/tasks/unscheduled/{}", id),
                None,
            )
            .await?;
        Ok(())
    }

    async fn schedule_unscheduled(&self, id: &str, slot: Slot) -> PlannerResult<ScheduledTask> {
        self.client
            .send_json(
                Method::POST,
                &format!("/api/tasks/unscheduled/{}/schedule", id),
                Some(&slot),
            )
            .await
    }

    async fn unschedule(&self, id: &str) -> PlannerResult<UnscheduledTask> {
        self.client
            .send_json::<Value, _>(
                Method::POST,
                &format!("/api/tasks/scheduled/{}/unschedule", id),
                None,
            )
            .await
    }

    async fn schedule_project_step(
        &self,
        placement: ProjectStepPlacement,
    ) -> PlannerResult<ScheduledTask> {
        self.client
            .send_json(Method::POST, "/api/tasks/project/schedule", Some(&placement))
            .await
    }
}

//! API service routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::{
    SignedCookieJar,
    cookie::{Cookie, SameSite},
};
use chrono::Utc;
use planner::{
    NewScheduledTask, NewUnscheduledTask, ProjectStepPlacement, Slot, TaskEdit,
    colors::ensure_task_color,
    projects::project_sidebar_tasks,
    validation::{validate_new_scheduled, validate_new_unscheduled, validate_slot, validate_task_edit},
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    csrf::CSRF_HEADER,
    error::{ApiError, ApiResult},
    extract::{CurrentSession, JsonBody},
    middleware::{add_csrf_token, csrf_protection, load_session, rate_limit},
    models::{CompletionRequest, CsrfTokenResponse, HealthResponse, SessionResponse},
    session::SESSION_COOKIE,
    state::AppState,
};

const TASK_NOT_FOUND: &str = "Task not found";

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let task_routes = Router::new()
        .route("/scheduled", get(list_scheduled).post(create_scheduled))
        .route("/scheduled/:id", put(update_scheduled).delete(delete_scheduled))
        .route("/scheduled/:id/slot", put(move_scheduled))
        .route("/scheduled/:id/completion", put(set_completion))
        .route("/scheduled/:id/unschedule", post(unschedule))
        .route("/unscheduled", get(list_unscheduled).post(create_unscheduled))
        .route("/unscheduled/:id", delete(delete_unscheduled))
        .route("/unscheduled/:id/schedule", post(schedule_unscheduled))
        .route("/project", get(list_project_tasks))
        .route("/project/schedule", post(schedule_project_step));

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/csrf/token", get(csrf_token))
        .route("/api/session", post(create_session).delete(delete_session))
        .nest("/api/tasks", task_routes)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), csrf_protection))
        .layer(from_fn_with_state(state.clone(), add_csrf_token))
        .layer(from_fn_with_state(state.clone(), load_session))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    let csrf_header = HeaderName::from_static(CSRF_HEADER);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, csrf_header.clone()])
        .expose_headers([csrf_header])
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        environment: state.config.environment.to_string(),
    })
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} not found", uri.path()))
}

/// Mint a fresh CSRF token for the current session
pub async fn csrf_token(
    State(state): State<AppState>,
    session: Option<CurrentSession>,
) -> ApiResult<Json<CsrfTokenResponse>> {
    let Some(CurrentSession(session)) = session else {
        return Err(ApiError::unauthorized("Session required for CSRF token"));
    };

    let token = state.csrf.generate_token(&session.id).await;
    Ok(Json(CsrfTokenResponse {
        success: true,
        token,
    }))
}

/// Exchange a provider access token for a session cookie
pub async fn create_session(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    previous: Option<CurrentSession>,
    headers: HeaderMap,
) -> ApiResult<(SignedCookieJar, Json<SessionResponse>)> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Missing access token"))?;

    let claims = state.access_tokens.verify(token).map_err(|e| {
        warn!("Rejected access token: {}", e);
        ApiError::unauthorized("Invalid access token")
    })?;

    if let Some(CurrentSession(previous)) = previous {
        state.csrf.revoke(&previous.id).await;
        state
            .sessions
            .destroy(&previous.id)
            .await
            .map_err(|e| ApiError::internal("Failed to replace session", e))?;
    }

    let session = state
        .sessions
        .create(claims.sub)
        .await
        .map_err(|e| ApiError::internal("Failed to create session", e))?;

    let production = state.config.environment.is_production();
    let cookie = Cookie::build((SESSION_COOKIE, session.id.clone()))
        .path("/")
        .http_only(true)
        .secure(production)
        .same_site(if production {
            SameSite::Strict
        } else {
            SameSite::Lax
        });

    Ok((
        jar.add(cookie),
        Json(SessionResponse {
            success: true,
            user_id: session.user_id,
            expires_at: session.expires_at,
        }),
    ))
}

/// End the current session and forget its CSRF token
pub async fn delete_session(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    session: Option<CurrentSession>,
) -> ApiResult<(SignedCookieJar, Json<serde_json::Value>)> {
    if let Some(CurrentSession(session)) = session {
        state.csrf.revoke(&session.id).await;
        state
            .sessions
            .destroy(&session.id)
            .await
            .map_err(|e| ApiError::internal("Failed to delete session", e))?;
        info!("Session ended for user {}", session.user_id);
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Json(json!({ "success": true }))))
}

fn parse_id(id: &str, not_found: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::not_found(not_found))
}

pub async fn list_scheduled(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<impl IntoResponse> {
    let tasks = state
        .task_repository
        .list_scheduled(session.user_id)
        .await
        .map_err(|e| ApiError::internal("Failed to get scheduled tasks", e))?;

    let tasks: Vec<_> = tasks.into_iter().map(ensure_task_color).collect();
    Ok(Json(tasks))
}

pub async fn create_scheduled(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    JsonBody(payload): JsonBody<NewScheduledTask>,
) -> ApiResult<impl IntoResponse> {
    validate_new_scheduled(&payload).map_err(ApiError::BadRequest)?;

    let task = state
        .task_repository
        .create_scheduled(session.user_id, &payload)
        .await
        .map_err(|e| ApiError::internal("Failed to create scheduled task", e))?;

    Ok((StatusCode::CREATED, Json(ensure_task_color(task))))
}

pub async fn update_scheduled(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
    JsonBody(edit): JsonBody<TaskEdit>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;
    validate_task_edit(&edit).map_err(ApiError::BadRequest)?;

    let task = state
        .task_repository
        .update_scheduled(session.user_id, id, &edit)
        .await
        .map_err(|e| ApiError::internal("Failed to update task", e))?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;

    Ok(Json(ensure_task_color(task)))
}

/// Move a scheduled task to another slot
pub async fn move_scheduled(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
    JsonBody(slot): JsonBody<Slot>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;
    validate_slot(slot).map_err(ApiError::BadRequest)?;

    let task = state
        .task_repository
        .move_scheduled(session.user_id, id, slot)
        .await
        .map_err(|e| ApiError::internal("Failed to move task", e))?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;

    Ok(Json(ensure_task_color(task)))
}

pub async fn set_completion(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<CompletionRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;

    let task = state
        .task_repository
        .set_completed(session.user_id, id, payload.completed)
        .await
        .map_err(|e| ApiError::internal("Failed to update task", e))?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;

    Ok(Json(ensure_task_color(task)))
}

pub async fn delete_scheduled(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;

    let deleted = state
        .task_repository
        .delete_scheduled(session.user_id, id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete task", e))?;

    if deleted {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(ApiError::not_found(TASK_NOT_FOUND))
    }
}

/// Move a scheduled task back to the unscheduled pool
pub async fn unschedule(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;

    let task = state
        .task_repository
        .unschedule(session.user_id, id)
        .await
        .map_err(|e| ApiError::internal("Failed to unschedule task", e))?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;

    Ok(Json(ensure_task_color(task)))
}

pub async fn list_unscheduled(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<impl IntoResponse> {
    let tasks = state
        .task_repository
        .list_unscheduled(session.user_id)
        .await
        .map_err(|e| ApiError::internal("Failed to get unscheduled tasks", e))?;

    let tasks: Vec<_> = tasks.into_iter().map(ensure_task_color).collect();
    Ok(Json(tasks))
}

pub async fn create_unscheduled(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    JsonBody(payload): JsonBody<NewUnscheduledTask>,
) -> ApiResult<impl IntoResponse> {
    validate_new_unscheduled(&payload).map_err(ApiError::BadRequest)?;

    let task = state
        .task_repository
        .create_unscheduled(session.user_id, &payload)
        .await
        .map_err(|e| ApiError::internal("Failed to create unscheduled task", e))?;

    Ok((StatusCode::CREATED, Json(ensure_task_color(task))))
}

pub async fn delete_unscheduled(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;

    let deleted = state
        .task_repository
        .delete_unscheduled(session.user_id, id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete task", e))?;

    if deleted {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(ApiError::not_found(TASK_NOT_FOUND))
    }
}

/// Put an unscheduled task on the calendar
pub async fn schedule_unscheduled(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
    JsonBody(slot): JsonBody<Slot>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, TASK_NOT_FOUND)?;
    validate_slot(slot).map_err(ApiError::BadRequest)?;

    let task = state
        .task_repository
        .schedule_unscheduled(session.user_id, id, slot)
        .await
        .map_err(|e| ApiError::internal("Failed to schedule task", e))?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;

    Ok(Json(ensure_task_color(task)))
}

/// Sidebar tasks derived from the user's projects
pub async fn list_project_tasks(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<impl IntoResponse> {
    let goals = state
        .goal_repository
        .list_with_steps(session.user_id)
        .await
        .map_err(|e| ApiError::internal("Failed to get projects", e))?;

    Ok(Json(project_sidebar_tasks(&goals)))
}

/// Schedule a project step and mark it complete
pub async fn schedule_project_step(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    JsonBody(placement): JsonBody<ProjectStepPlacement>,
) -> ApiResult<impl IntoResponse> {
    const STEP_NOT_FOUND: &str = "Project step not found";

    validate_new_scheduled(&placement.task).map_err(ApiError::BadRequest)?;
    parse_id(&placement.goal_id, STEP_NOT_FOUND)?;
    parse_id(&placement.step_id, STEP_NOT_FOUND)?;

    let task = state
        .goal_repository
        .schedule_step(session.user_id, &placement)
        .await
        .map_err(|e| ApiError::internal("Failed to schedule project step", e))?
        .ok_or_else(|| ApiError::not_found(STEP_NOT_FOUND))?;

    Ok(Json(ensure_task_color(task)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessClaims, sign_access_token};
    use crate::error::RATE_LIMIT_MESSAGE;
    use crate::state::test_support::{JWT_SECRET, test_state};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header::SET_COOKIE},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// Establish a session and return its cookie
    async fn login(app: &Router) -> String {
        let claims = AccessClaims {
            sub: Uuid::new_v4(),
            exp: (Utc::now().timestamp() + 3600) as u64,
            email: None,
        };
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/session")
            .header(
                AUTHORIZATION,
                format!("Bearer {}", sign_access_token(JWT_SECRET, &claims)),
            )
            .body(Body::empty())
            .unwrap();

        let response = send(app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("HttpOnly"));
        let cookie = cookie.split(';').next().unwrap().to_string();

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user_id"], claims.sub.to_string());

        cookie
    }

    fn unscheduled_post(cookie: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/tasks/unscheduled")
            .header("cookie", cookie)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(CSRF_HEADER, token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(test_state(100));

        let response = send(&app, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["environment"], "test");
        assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = create_router(test_state(100));

        let response = send(&app, get("/api/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "success": false, "message": "Route /api/nope not found" })
        );
    }

    #[tokio::test]
    async fn test_csrf_token_requires_session() {
        let app = create_router(test_state(100));

        let response = send(&app, get("/api/csrf/token")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await["message"],
            "Session required for CSRF token"
        );
    }

    #[tokio::test]
    async fn test_session_rejects_bad_access_token() {
        let app = create_router(test_state(100));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/session")
            .header(AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();

        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_is_issued_and_reused_on_session_requests() {
        let app = create_router(test_state(100));
        let cookie = login(&app).await;

        let request = |cookie: &str| {
            Request::builder()
                .uri("/health")
                .header("cookie", cookie)
                .body(Body::empty())
                .unwrap()
        };

        let first = send(&app, request(&cookie)).await;
        let second = send(&app, request(&cookie)).await;

        let first = first.headers()[CSRF_HEADER].to_str().unwrap().to_string();
        let second = second.headers()[CSRF_HEADER].to_str().unwrap().to_string();
        assert_eq!(first.len(), 64);
        assert_eq!(first, second);

        // No session, no token
        let anonymous = send(&app, get("/health")).await;
        assert!(anonymous.headers().get(CSRF_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_csrf_protection_on_task_routes() {
        let app = create_router(test_state(100));
        let cookie = login(&app).await;

        let response = send(
            &app,
            Request::builder()
                .uri("/api/csrf/token")
                .header("cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let header = response.headers()[CSRF_HEADER].to_str().unwrap().to_string();
        let body = body_json(response).await;
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(header, token);

        let task = json!({
            "name": "",
            "category": "deepwork",
            "color": "",
            "duration": "1 hour"
        });

        let missing = send(&app, unscheduled_post(&cookie, None, task.clone())).await;
        assert_eq!(missing.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(missing).await["message"], "CSRF token required");

        let invalid = send(&app, unscheduled_post(&cookie, Some("deadbeef"), task.clone())).await;
        assert_eq!(invalid.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(invalid).await["message"], "Invalid CSRF token");

        // A valid token reaches the handler, which rejects the empty name
        let accepted = send(&app, unscheduled_post(&cookie, Some(token.as_str()), task.clone())).await;
        assert_eq!(accepted.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(accepted).await["message"], "Task name is required");

        // The token may also travel in the body
        let mut with_field = task;
        with_field["_csrf"] = json!(token.as_str());
        let accepted = send(&app, unscheduled_post(&cookie, None, with_field)).await;
        assert_eq!(accepted.status(), StatusCode::BAD_REQUEST);

        // Form submissions carry it as a urlencoded field
        let form = |csrf: &str| {
            Request::builder()
                .method(Method::POST)
                .uri("/api/tasks/unscheduled")
                .header("cookie", &cookie)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("name=Write+report&_csrf={}", csrf)))
                .unwrap()
        };

        let rejected = send(&app, form("deadbeef")).await;
        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(rejected).await["message"], "Invalid CSRF token");

        // Past the CSRF check, the JSON handler refuses the form body
        let accepted = send(&app, form(&token)).await;
        assert_eq!(accepted.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mutation_without_session() {
        let app = create_router(test_state(100));
        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/api/tasks/scheduled/abc")
            .body(Body::empty())
            .unwrap();

        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await["message"],
            "Session required for CSRF protection"
        );
    }

    #[tokio::test]
    async fn test_task_routes_require_session() {
        let app = create_router(test_state(100));

        let response = send(&app, get("/api/tasks/scheduled")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Authentication required");
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let state = test_state(100);
        let app = create_router(state.clone());
        let cookie = login(&app).await;

        let response = send(
            &app,
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/session")
                .header("cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(CSRF_HEADER).is_none());
        assert_eq!(state.csrf.len().await, 0);

        let response = send(
            &app,
            Request::builder()
                .uri("/api/csrf/token")
                .header("cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let app = create_router(test_state(2));

        assert_eq!(send(&app, get("/health")).await.status(), StatusCode::OK);
        assert_eq!(send(&app, get("/health")).await.status(), StatusCode::OK);

        let limited = send(&app, get("/health")).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().get("retry-after").is_some());
        assert_eq!(body_json(limited).await["message"], RATE_LIMIT_MESSAGE);
    }
}

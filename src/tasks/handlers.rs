use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::jwt::AuthUser;
use crate::auth::repo::User;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tasks::dto::{
    CreateTaskRequest, DeleteParams, DeleteResponse, TaskResponse, UpdateTaskRequest,
};
use crate::tasks::repo::Task;
use crate::tasks::status::TaskStatus;

pub fn task_routes() -> Router<AppState> {
    Router::new().route(
        "/tasks",
        get(list_tasks)
            .post(create_task)
            .patch(update_task_status)
            .delete(delete_task),
    )
}

fn parse_status(label: &str) -> Result<TaskStatus, ApiError> {
    label.parse::<TaskStatus>().map_err(ApiError::InvalidArgument)
}

/// GET /tasks — every task owned by the caller, oldest first.
#[instrument(skip(state))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = Task::list_by_owner(&state.db, user_id)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "list_by_owner failed");
            ApiError::Internal(e)
        })?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// POST /tasks {content, status} — insert a task owned by the caller.
#[instrument(skip(state, payload))]
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let status = parse_status(&payload.status)?;

    if payload.content.trim().is_empty() {
        warn!(%user_id, "create with empty content");
        return Err(ApiError::InvalidArgument("Content must not be empty".into()));
    }

    // The token subject must still have a user row.
    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| {
            warn!(%user_id, "create for missing user row");
            ApiError::NotFound("User not found".into())
        })?;

    let task = Task::insert(&state.db, user.id, &payload.content, status.as_str())
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "insert task failed");
            ApiError::Internal(e)
        })?;

    info!(task_id = %task.id, %user_id, status = %status, "task created");
    Ok(Json(TaskResponse::from(task)))
}

/// PATCH /tasks {id, status} — move a task to another column.
#[instrument(skip(state, payload))]
pub async fn update_task_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let status = parse_status(&payload.status)?;

    let task = find_owned_task(&state, payload.id, user_id).await?;

    let updated = Task::update_status(&state.db, task.id, status.as_str())
        .await
        .map_err(|e| {
            error!(error = %e, task_id = %task.id, "update_status failed");
            ApiError::Internal(e)
        })?;

    info!(task_id = %updated.id, %user_id, status = %status, "task moved");
    Ok(Json(TaskResponse::from(updated)))
}

/// DELETE /tasks?id=<uuid> — hard delete, no recovery.
#[instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = params
        .id
        .ok_or_else(|| ApiError::InvalidArgument("Task ID required".into()))?;

    let task = find_owned_task(&state, id, user_id).await?;

    let deleted = Task::delete(&state.db, task.id).await.map_err(|e| {
        error!(error = %e, task_id = %task.id, "delete failed");
        ApiError::Internal(e)
    })?;
    if !deleted {
        // Lost a race with another delete of the same row.
        return Err(ApiError::NotFound("Task not found".into()));
    }

    info!(task_id = %task.id, %user_id, "task deleted");
    Ok(Json(DeleteResponse { success: true }))
}

/// Load a task by id and require the caller to own it. Unknown id is 404;
/// someone else's task is 403.
async fn find_owned_task(state: &AppState, id: Uuid, user_id: Uuid) -> Result<Task, ApiError> {
    let task = Task::find_by_id(&state.db, id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    if task.user_id != user_id {
        warn!(task_id = %task.id, owner = %task.user_id, caller = %user_id, "ownership check failed");
        return Err(ApiError::PermissionDenied("Task belongs to another user".into()));
    }
    Ok(task)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::app::build_app;
    use crate::auth::jwt::JwtKeys;
    use crate::state::AppState;

    // These tests only exercise paths that fail before any query runs; the
    // fake state's pool never connects.

    fn bearer() -> String {
        let keys = JwtKeys::from_ref(&AppState::fake());
        format!("Bearer {}", keys.sign_access(Uuid::new_v4()).unwrap())
    }

    fn json_request(method: Method, uri: &str, body: &str, auth: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_string(res: axum::response::Response) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_is_open() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_requires_identity() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::builder().uri("/tasks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_non_bearer_scheme() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .uri("/tasks")
            .header(header::AUTHORIZATION, "Token abcdef")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_refresh_token_on_task_routes() {
        let keys = JwtKeys::from_ref(&AppState::fake());
        let token = keys.sign_refresh(Uuid::new_v4()).unwrap();
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .uri("/tasks")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_without_id_is_invalid_argument() {
        let app = build_app(AppState::fake());
        let req = json_request(Method::DELETE, "/tasks", "", Some(bearer()));
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(res).await.contains("Task ID required"));
    }

    #[tokio::test]
    async fn create_rejects_unknown_status() {
        let app = build_app(AppState::fake());
        let req = json_request(
            Method::POST,
            "/tasks",
            r#"{"content": "ship it", "status": "urgent"}"#,
            Some(bearer()),
        );
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(res).await.contains("unknown status"));
    }

    #[tokio::test]
    async fn create_rejects_blank_content() {
        let app = build_app(AppState::fake());
        let req = json_request(
            Method::POST,
            "/tasks",
            r#"{"content": "   ", "status": "todo"}"#,
            Some(bearer()),
        );
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(res).await.contains("Content must not be empty"));
    }

    #[tokio::test]
    async fn update_rejects_unknown_status() {
        let app = build_app(AppState::fake());
        let body = format!(r#"{{"id": "{}", "status": "blocked"}}"#, Uuid::new_v4());
        let req = json_request(Method::PATCH, "/tasks", &body, Some(bearer()));
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

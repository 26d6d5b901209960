//! Task API Endpoints

use crate::auth::{middleware::AuthenticatedUser, models::MessageResponse};
use crate::tasks::{
    models::{CreateTaskRequest, Task, TaskError},
    service::TaskService,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;

/// List tasks - GET /task
pub async fn fetch_tasks(
    State(service): State<Arc<TaskService>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Task>>, TaskError> {
    let tasks = service.fetch_by_user_id(user.subject_id()).await?;
    Ok(Json(tasks))
}

/// Create task - POST /task
pub async fn create_task(
    State(service): State<Arc<TaskService>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<Json<MessageResponse>, TaskError> {
    service.create(user.subject_id(), &payload.title).await?;
    Ok(Json(MessageResponse::new("Task created successfully")))
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let status = match &self {
            TaskError::EmptyTitle | TaskError::InvalidOwner => StatusCode::BAD_REQUEST,
            TaskError::Internal(source) => {
                error!("Internal task failure: {:#}", source);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(MessageResponse::new(self.to_string()))).into_response()
    }
}

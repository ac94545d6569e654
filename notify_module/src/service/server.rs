use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDate;
use send_mail_module::MailClient;
use serde::Deserialize;
use serde_json::json;
use tokio::task;
use tracing::{error, info, warn};

use crate::digest::run_digest;
use crate::notify::{
    notify_assignment, process_mentions, AssignmentDetails, EntityKind, MailDispatcher,
    NotificationContext,
};
use crate::store::{NewComment, NewTask, TaskStore};

use super::config::ServiceConfig;
use super::state::AppState;
use super::BoxError;

pub async fn run_server(
    config: ServiceConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let config = Arc::new(config);

    // Fail fast if the store cannot be opened at all.
    let bootstrap_path = config.store_path.clone();
    task::spawn_blocking(move || TaskStore::new(&bootstrap_path))
        .await
        .map_err(|err| -> BoxError { err.into() })??;

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| format!("invalid host: {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    info!("TaskFlow notification service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(config))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Build the service router. Separate from [`run_server`] so tests can
/// drive the handlers against an in-process listener.
pub fn app(config: Arc<ServiceConfig>) -> Router {
    let state = AppState { config };
    Router::new()
        .route("/health", get(health))
        .route("/cron/daily_digest", get(daily_digest))
        .route("/tasks", post(create_task))
        .route("/comments", post(create_comment))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn build_dispatcher(config: &ServiceConfig) -> Result<MailDispatcher, BoxError> {
    let client = MailClient::new(&config.mail_endpoint, config.mail_timeout)?;
    Ok(MailDispatcher::new(client))
}

#[derive(Debug, Deserialize)]
struct DigestParams {
    test: Option<String>,
    user_id: Option<i64>,
}

/// GET /cron/daily_digest?test=1&user_id=3
///
/// Business-level failures (sends that did not go through) are reported
/// inside the 200 summary; only a store/setup failure returns 500.
async fn daily_digest(
    State(state): State<AppState>,
    Query(params): Query<DigestParams>,
) -> impl IntoResponse {
    let test_mode = params.test.as_deref() == Some("1");
    let target_user = params.user_id;
    if test_mode {
        info!(
            "digest running in test mode{}",
            target_user
                .map(|id| format!(" for user {id}"))
                .unwrap_or_default()
        );
    }

    let config = state.config.clone();
    let result = task::spawn_blocking(move || -> Result<_, BoxError> {
        let store = TaskStore::new(&config.store_path)?;
        let dispatcher = build_dispatcher(&config)?;
        Ok(run_digest(&store, &dispatcher, target_user)?)
    })
    .await;

    match result {
        Ok(Ok(summary)) => {
            let mut summary_json = serde_json::to_value(summary).unwrap_or_else(|_| json!({}));
            if let Some(map) = summary_json.as_object_mut() {
                map.insert("test_mode".to_string(), json!(test_mode));
            }
            (
                StatusCode::OK,
                Json(json!({"success": true, "summary": summary_json})),
            )
        }
        Ok(Err(err)) => {
            error!("digest run failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "digest run failed"})),
            )
        }
        Err(err) => {
            error!("digest task panicked: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "digest run failed"})),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    project_id: i64,
    title: String,
    #[serde(default)]
    description: String,
    status: Option<String>,
    priority: Option<String>,
    assigned_to: Option<i64>,
    due_date: Option<NaiveDate>,
    actor_id: i64,
}

/// POST /tasks
///
/// Performs the write, then runs the mention pipeline and the
/// assignment notifier inline. Notification failures never fail the
/// write; they are observable only in the logs.
async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> impl IntoResponse {
    if request.title.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Title is required"})),
        );
    }

    let config = state.config.clone();
    let result = task::spawn_blocking(move || -> Result<_, BoxError> {
        let store = TaskStore::new(&config.store_path)?;
        let actor = store
            .user_by_id(request.actor_id)?
            .ok_or_else(|| format!("unknown actor {}", request.actor_id))?;
        let project_name = store.project_name(request.project_id)?;

        let status = request.status.clone().unwrap_or_else(|| "not_started".to_string());
        let priority = request.priority.clone().unwrap_or_else(|| "medium".to_string());
        let task_id = store.create_task(&NewTask {
            project_id: request.project_id,
            title: request.title.clone(),
            description: request.description.clone(),
            status: status.clone(),
            priority: priority.clone(),
            assigned_to: request.assigned_to,
            created_by: request.actor_id,
            due_date: request.due_date,
        })?;
        store.log_activity(task_id, request.actor_id, "created", None, Some(&request.title))?;

        // The write is committed; from here on, notification failures
        // are logged but never fail the request.
        match build_dispatcher(&config) {
            Ok(dispatcher) => {
                if !request.description.trim().is_empty() {
                    let context = NotificationContext {
                        entity: EntityKind::Task,
                        title: request.title.clone(),
                        project_name: project_name.clone(),
                        actor_name: actor.full_name.clone(),
                        actor_id: Some(actor.id),
                        content: Some(request.description.clone()),
                    };
                    if let Err(err) = process_mentions(
                        &store,
                        &dispatcher,
                        &request.description,
                        &context,
                        config.suppress_self_mentions,
                    ) {
                        warn!("mention pipeline failed for task {}: {}", task_id, err);
                    }
                }

                if let Some(assignee_id) = request.assigned_to {
                    match store.user_by_id(assignee_id) {
                        Ok(Some(assignee)) => {
                            notify_assignment(
                                &dispatcher,
                                &assignee,
                                &AssignmentDetails {
                                    task_title: request.title.clone(),
                                    project_name,
                                    actor_name: actor.full_name.clone(),
                                    priority: priority.clone(),
                                    due_date: request.due_date,
                                },
                            );
                        }
                        Ok(None) => {
                            warn!("task {} assigned to unknown user {}", task_id, assignee_id)
                        }
                        Err(err) => warn!(
                            "assignee lookup failed for task {}, skipping notification: {}",
                            task_id, err
                        ),
                    }
                }
            }
            Err(err) => warn!(
                "mail dispatcher unavailable, skipping notifications for task {}: {}",
                task_id, err
            ),
        }

        Ok(json!({
            "id": task_id,
            "title": request.title,
            "status": status,
            "priority": priority,
        }))
    })
    .await;

    match result {
        Ok(Ok(data)) => (StatusCode::OK, Json(json!({"success": true, "data": data}))),
        Ok(Err(err)) => {
            error!("task creation failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Failed to create task"})),
            )
        }
        Err(err) => {
            error!("task creation panicked: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Failed to create task"})),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateCommentRequest {
    task_id: i64,
    content: String,
    actor_id: i64,
}

/// POST /comments
async fn create_comment(
    State(state): State<AppState>,
    Json(request): Json<CreateCommentRequest>,
) -> impl IntoResponse {
    if request.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Comment content is required"})),
        );
    }

    let config = state.config.clone();
    let result = task::spawn_blocking(move || -> Result<_, BoxError> {
        let store = TaskStore::new(&config.store_path)?;
        let actor = store
            .user_by_id(request.actor_id)?
            .ok_or_else(|| format!("unknown actor {}", request.actor_id))?;
        let (title, project_name) = store
            .task_context(request.task_id)?
            .ok_or_else(|| format!("unknown task {}", request.task_id))?;

        let comment_id = store.create_comment(&NewComment {
            task_id: request.task_id,
            user_id: request.actor_id,
            content: request.content.clone(),
        })?;
        store.log_activity(request.task_id, request.actor_id, "commented", None, None)?;

        // The write is committed; notification failures are logged but
        // never fail the request.
        match build_dispatcher(&config) {
            Ok(dispatcher) => {
                let context = NotificationContext {
                    entity: EntityKind::Comment,
                    title,
                    project_name,
                    actor_name: actor.full_name.clone(),
                    actor_id: Some(actor.id),
                    content: Some(request.content.clone()),
                };
                if let Err(err) = process_mentions(
                    &store,
                    &dispatcher,
                    &request.content,
                    &context,
                    config.suppress_self_mentions,
                ) {
                    warn!(
                        "mention pipeline failed for comment {}: {}",
                        comment_id, err
                    );
                }
            }
            Err(err) => warn!(
                "mail dispatcher unavailable, skipping notifications for comment {}: {}",
                comment_id, err
            ),
        }

        Ok(json!({"id": comment_id}))
    })
    .await;

    match result {
        Ok(Ok(data)) => (StatusCode::OK, Json(json!({"success": true, "data": data}))),
        Ok(Err(err)) => {
            error!("comment creation failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Failed to create comment"})),
            )
        }
        Err(err) => {
            error!("comment creation panicked: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Failed to create comment"})),
            )
        }
    }
}

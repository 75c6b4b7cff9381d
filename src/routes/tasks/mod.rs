/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::database::definitions::notification::{Notification, NotificationType};
use crate::database::definitions::project::Project;
use crate::database::definitions::task::{Task, TaskDraft, TaskEdit, TaskStatus};
use crate::database::definitions::user::User;
use crate::prelude::*;
use crate::require_session;
use crate::reward::{Completion, RewardEngine};
use crate::routes::{ensure_user, parse_id};
use aide::axum::routing::{get_with, post_with, put_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Extension;
use chrono::Utc;

mod extension;

pub fn router(state: ApplicationState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/",
            post_with(create_task, create_task_docs).get_with(get_tasks, get_tasks_docs),
        )
        .api_route(
            "/:id",
            get_with(get_task, get_task_docs)
                .put_with(put_task, put_task_docs)
                .delete_with(delete_task, delete_task_docs),
        )
        .api_route("/:id/status", put_with(put_status, put_status_docs))
        .api_route("/:id/comments", post_with(add_comment, add_comment_docs))
        .api_route(
            "/:id/attachments",
            post_with(add_attachment, add_attachment_docs),
        )
        .api_route(
            "/:id/extension",
            post_with(
                extension::request_extension,
                extension::request_extension_docs,
            )
            .put_with(
                extension::resolve_extension,
                extension::resolve_extension_docs,
            ),
        )
        .route_layer(require_session!(state))
        .with_state(state)
}

/// A task together with the project it belongs to, if that still exists.
struct Scoped {
    task: Task,
    project: Option<Project>,
}

impl Scoped {
    async fn load(state: &ApplicationState, id: &str) -> Result<Self> {
        let task: Task = state
            .connection()
            .fetch(&parse_id(Task::TABLE, id)?)
            .await?;
        let project: Option<Project> = state.connection().find(task.project()).await?;

        Ok(Self { task, project })
    }

    fn manages(&self, user: &User) -> bool {
        self.project
            .as_ref()
            .is_some_and(|project| project.can_manage(user))
    }

    fn can_view(&self, user: &User) -> bool {
        user.has_permission(Permission::TaskManage)
            || self.task.assigned_to() == user.id()
            || self.task.created_by() == user.id()
            || self.manages(user)
            || self
                .project
                .as_ref()
                .is_some_and(|project| project.is_member(user.id()))
    }

    fn can_edit(&self, user: &User) -> bool {
        user.has_permission(Permission::TaskManage)
            || self.task.created_by() == user.id()
            || self.manages(user)
    }

    fn can_change_status(&self, user: &User) -> bool {
        user.is_admin() || self.task.assigned_to() == user.id() || self.manages(user)
    }

    async fn viewed_by(state: &ApplicationState, user: &User, id: &str) -> Result<Self> {
        let scoped = Self::load(state, id).await?;
        if !scoped.can_view(user) {
            return Err(ApplicationError::Forbidden(
                "not involved in the task".to_owned(),
            ));
        }

        Ok(scoped)
    }

    async fn edited_by(state: &ApplicationState, user: &User, id: &str) -> Result<Self> {
        let scoped = Self::load(state, id).await?;
        if !scoped.can_edit(user) {
            return Err(ApplicationError::Forbidden(
                "only the creator or the project manager may modify the task".to_owned(),
            ));
        }

        Ok(scoped)
    }
}

/// Fails unless the user is part of the project.
async fn ensure_member(state: &ApplicationState, project: &Project, user: &Id) -> Result<()> {
    ensure_user(state, user).await?;
    if !project.is_member(user) {
        return Err(ApplicationError::BadRequest(format!(
            "{user} is not a member of the project"
        )));
    }

    Ok(())
}

#[instrument(skip(state, user, data))]
async fn create_task(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Json(data): Json<TaskDraft>,
) -> Result<(StatusCode, Json<Task>)> {
    user.require(Permission::TaskCreate)?;
    if data.project.table != Project::TABLE {
        return Err(ApplicationError::BadRequest(format!(
            "{} is not a project",
            data.project
        )));
    }

    let project: Project = state.connection().fetch(&data.project).await?;
    if !project.can_manage(&user)
        && !user.has_permission(Permission::TaskManage)
        && !project.is_member(user.id())
    {
        return Err(ApplicationError::Forbidden(
            "not a member of the project".to_owned(),
        ));
    }
    ensure_member(&state, &project, &data.assigned_to).await?;

    let task = Task::new(data, user.id().clone(), Utc::now())?;
    state.connection().store(&task).await?;
    info!("{} created task {}", user.id(), task.id());

    Notification::dispatch(
        state.connection(),
        [task.assigned_to()],
        user.id(),
        Some(task.id()),
        NotificationType::TaskAssigned,
        format!("{} assigned \"{}\" to you", user.name(), task.title()).as_str(),
    )
    .await;

    Ok((StatusCode::CREATED, Json(task)))
}

fn create_task_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Create a task")
        .description("Create a task within a project. The assignee has to be a member of the project.")
        .response::<201, Json<Task>>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone, Default)]
pub struct TaskFilter {
    /// only tasks in this status
    status: Option<TaskStatus>,
}

#[instrument(skip(state, user))]
async fn get_tasks(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Query(paging): Query<PagingOptions>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Page<Task>>> {
    let mut condition = "assignedTo = $user".to_owned();
    let mut bindings = vec![("user", json!(user.id()))];
    if let Some(status) = filter.status {
        condition.push_str(" AND status = $status");
        bindings.push(("status", json!(status)));
    }

    let page = paging
        .execute::<Task>(Some(condition.as_str()), bindings, state.connection())
        .await?;

    Ok(Json(page))
}

fn get_tasks_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Own tasks")
        .description("Obtain a page of the tasks assigned to the current user")
        .response::<200, Json<Page<Task>>>()
}

async fn get_task(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Task>> {
    let scoped = Scoped::viewed_by(&state, &user, id.as_str()).await?;

    Ok(Json(scoped.task))
}

fn get_task_docs(transform: TransformOperation) -> TransformOperation {
    transform.summary("Get a task").response::<200, Json<Task>>()
}

#[instrument(skip(state, user, data))]
async fn put_task(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<TaskEdit>,
) -> Result<Json<Task>> {
    let Scoped { mut task, project } = Scoped::edited_by(&state, &user, id.as_str()).await?;

    let reassigned = match &data.assigned_to {
        Some(assignee) if assignee != task.assigned_to() => {
            match &project {
                Some(project) => ensure_member(&state, project, assignee).await?,
                None => {
                    ensure_user(&state, assignee).await?;
                }
            }
            true
        }
        _ => false,
    };

    task.edit(data, Utc::now())?;
    state.connection().save(&mut task).await?;

    if reassigned {
        Notification::dispatch(
            state.connection(),
            [task.assigned_to()],
            user.id(),
            Some(task.id()),
            NotificationType::TaskAssigned,
            format!("{} assigned \"{}\" to you", user.name(), task.title()).as_str(),
        )
        .await;
    }

    Ok(Json(task))
}

fn put_task_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Edit a task")
        .description("Update the given fields of an open task")
        .response::<200, Json<Task>>()
}

#[instrument(skip(state, user))]
async fn delete_task(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let scoped = Scoped::edited_by(&state, &user, id.as_str()).await?;

    Repository::<Task>::remove(state.connection(), scoped.task.id()).await?;
    info!("{} deleted task {}", user.id(), scoped.task.id());

    Ok(StatusCode::NO_CONTENT)
}

fn delete_task_docs(transform: TransformOperation) -> TransformOperation {
    transform.summary("Delete a task").response::<204, ()>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct StatusRequest {
    status: TaskStatus,
}

#[instrument(skip(state, user))]
async fn put_status(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<StatusRequest>,
) -> Result<Json<Completion>> {
    let scoped = Scoped::load(&state, id.as_str()).await?;
    if !scoped.can_change_status(&user) {
        return Err(ApplicationError::Forbidden(
            "only the assignee or the project manager may change the status".to_owned(),
        ));
    }
    let mut task = scoped.task;

    if data.status == TaskStatus::Completed {
        let completion = RewardEngine::new(state.connection(), state.connection())
            .complete(task.id(), Utc::now())
            .await?;

        Notification::dispatch(
            state.connection(),
            [completion.task.created_by()],
            user.id(),
            Some(completion.task.id()),
            NotificationType::TaskCompleted,
            format!("\"{}\" got completed", completion.task.title()).as_str(),
        )
        .await;

        return Ok(Json(completion));
    }

    task.transition(data.status, Utc::now())?;
    state.connection().save(&mut task).await?;

    Notification::dispatch(
        state.connection(),
        [task.created_by(), task.assigned_to()],
        user.id(),
        Some(task.id()),
        NotificationType::TaskStatusChanged,
        format!("\"{}\" is now {}", task.title(), data.status).as_str(),
    )
    .await;

    let assignee: Option<User> = state.connection().find(task.assigned_to()).await?;
    let (total_points, current_streak) = assignee
        .map(|assignee| (*assignee.reward_points(), *assignee.current_streak()))
        .unwrap_or_default();

    Ok(Json(Completion {
        points_earned: 0,
        bonus_points: 0,
        total_points,
        current_streak,
        is_completed_on_time: *task.is_completed_on_time(),
        task,
    }))
}

fn put_status_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Change the status")
        .description("Move the task to a new status. Completing the task rewards the assignee if it happens on time. Completed tasks can't change anymore.")
        .response::<200, Json<Completion>>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct CommentRequest {
    text: String,
}

#[instrument(skip(state, user, data))]
async fn add_comment(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Task>)> {
    let Scoped { mut task, .. } = Scoped::viewed_by(&state, &user, id.as_str()).await?;

    task.comment(user.id().clone(), data.text.as_str(), Utc::now())?;
    state.connection().save(&mut task).await?;

    Notification::dispatch(
        state.connection(),
        [task.assigned_to(), task.created_by()],
        user.id(),
        Some(task.id()),
        NotificationType::TaskCommented,
        format!("{} commented on \"{}\"", user.name(), task.title()).as_str(),
    )
    .await;

    Ok((StatusCode::CREATED, Json(task)))
}

fn add_comment_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Comment a task")
        .response::<201, Json<Task>>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct AttachmentRequest {
    name: String,
    url: String,
}

#[instrument(skip(state, user))]
async fn add_attachment(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<AttachmentRequest>,
) -> Result<(StatusCode, Json<Task>)> {
    let Scoped { mut task, .. } = Scoped::viewed_by(&state, &user, id.as_str()).await?;

    task.attach(
        data.name.as_str(),
        data.url.as_str(),
        user.id().clone(),
        Utc::now(),
    );
    state.connection().save(&mut task).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

fn add_attachment_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Attach a file")
        .description("Reference an uploaded file from the task")
        .response::<201, Json<Task>>()
}

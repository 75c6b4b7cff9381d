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

use crate::database::definitions::project::{MilestoneDraft, Project, ProjectDraft, ProjectEdit};
use crate::database::definitions::task::Task;
use crate::database::definitions::user::User;
use crate::prelude::*;
use crate::require_session;
use crate::routes::{ensure_user, parse_id};
use aide::axum::routing::{delete_with, get_with, post_with, put_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Extension;
use chrono::Utc;

pub fn router(state: ApplicationState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/",
            post_with(create_project, create_project_docs)
                .get_with(get_projects, get_projects_docs),
        )
        .api_route(
            "/:id",
            get_with(get_project, get_project_docs)
                .put_with(put_project, put_project_docs)
                .delete_with(delete_project, delete_project_docs),
        )
        .api_route("/:id/team", post_with(add_member, add_member_docs))
        .api_route(
            "/:id/team/:user",
            delete_with(remove_member, remove_member_docs),
        )
        .api_route(
            "/:id/milestones",
            post_with(add_milestone, add_milestone_docs),
        )
        .api_route(
            "/:id/milestones/:index/complete",
            put_with(complete_milestone, complete_milestone_docs),
        )
        .api_route("/:id/documents", post_with(add_document, add_document_docs))
        .api_route("/:id/tasks", get_with(get_project_tasks, get_project_tasks_docs))
        .route_layer(require_session!(state))
        .with_state(state)
}

async fn load_project(state: &ApplicationState, id: &str) -> Result<Project> {
    state
        .connection()
        .fetch(&parse_id(Project::TABLE, id)?)
        .await
}

/// Loads a project the caller may modify.
async fn managed_project(state: &ApplicationState, user: &User, id: &str) -> Result<Project> {
    let project = load_project(state, id).await?;
    if !project.can_manage(user) {
        return Err(ApplicationError::Forbidden(
            "only the project manager may modify the project".to_owned(),
        ));
    }

    Ok(project)
}

/// Loads a project the caller is part of.
async fn visible_project(state: &ApplicationState, user: &User, id: &str) -> Result<Project> {
    let project = load_project(state, id).await?;
    if !project.can_manage(user) && !project.is_member(user.id()) {
        return Err(ApplicationError::Forbidden(
            "not a member of the project".to_owned(),
        ));
    }

    Ok(project)
}

#[instrument(skip(state, user, data))]
async fn create_project(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Json(data): Json<ProjectDraft>,
) -> Result<(StatusCode, Json<Project>)> {
    user.require(Permission::ProjectCreate)?;
    if let Some(manager) = &data.project_manager {
        ensure_user(&state, manager).await?;
    }
    for member in &data.team {
        ensure_user(&state, member).await?;
    }

    let project = Project::new(data, user.id().clone(), Utc::now())?;
    state.connection().store(&project).await?;
    info!("{} created project {}", user.id(), project.id());

    Ok((StatusCode::CREATED, Json(project)))
}

fn create_project_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Create a project")
        .description("Create a new project. The creator becomes project manager unless one is given. Requires `project.create`.")
        .response::<201, Json<Project>>()
}

#[instrument(skip(state, user))]
async fn get_projects(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Query(paging): Query<PagingOptions>,
) -> Result<Json<Page<Project>>> {
    let page = if user.has_permission(Permission::ProjectManage) {
        paging
            .execute::<Project>(None, Vec::new(), state.connection())
            .await?
    } else {
        paging
            .execute::<Project>(
                Some("projectManager = $user OR team CONTAINS $user"),
                vec![("user", json!(user.id()))],
                state.connection(),
            )
            .await?
    };

    Ok(Json(page))
}

fn get_projects_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("List projects")
        .description("Obtain a page of projects. Without `project.manage` only the own projects are listed.")
        .response::<200, Json<Page<Project>>>()
}

async fn get_project(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Project>> {
    Ok(Json(visible_project(&state, &user, id.as_str()).await?))
}

fn get_project_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Get a project")
        .response::<200, Json<Project>>()
}

#[instrument(skip(state, user, data))]
async fn put_project(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<ProjectEdit>,
) -> Result<Json<Project>> {
    let mut project = managed_project(&state, &user, id.as_str()).await?;
    if let Some(manager) = &data.project_manager {
        ensure_user(&state, manager).await?;
    }

    project.edit(data, Utc::now())?;
    state.connection().save(&mut project).await?;

    Ok(Json(project))
}

fn put_project_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Edit a project")
        .description("Update the given fields of a project")
        .response::<200, Json<Project>>()
}

#[instrument(skip(state, user))]
async fn delete_project(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let project = managed_project(&state, &user, id.as_str()).await?;

    // the tasks belong to the project
    sql_span!(state
        .connection()
        .query("DELETE task WHERE project = $project")
        .bind(("project", project.id().to_string())))?
    .check()?;
    Repository::<Project>::remove(state.connection(), project.id()).await?;
    info!("{} deleted project {}", user.id(), project.id());

    Ok(StatusCode::NO_CONTENT)
}

fn delete_project_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Delete a project")
        .description("Delete a project together with its tasks")
        .response::<204, ()>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct MemberRequest {
    user: Id,
}

#[instrument(skip(state, user))]
async fn add_member(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<MemberRequest>,
) -> Result<Json<Project>> {
    let mut project = managed_project(&state, &user, id.as_str()).await?;
    ensure_user(&state, &data.user).await?;

    if project.add_member(data.user, Utc::now()) {
        state.connection().save(&mut project).await?;
    }

    Ok(Json(project))
}

fn add_member_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Add a team member")
        .response::<200, Json<Project>>()
}

#[instrument(skip(state, user))]
async fn remove_member(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path((id, member)): Path<(String, String)>,
) -> Result<Json<Project>> {
    let mut project = managed_project(&state, &user, id.as_str()).await?;

    project.remove_member(&parse_id(User::TABLE, member.as_str())?, Utc::now())?;
    state.connection().save(&mut project).await?;

    Ok(Json(project))
}

fn remove_member_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Remove a team member")
        .response::<200, Json<Project>>()
}

#[instrument(skip(state, user, data))]
async fn add_milestone(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<MilestoneDraft>,
) -> Result<(StatusCode, Json<Project>)> {
    let mut project = managed_project(&state, &user, id.as_str()).await?;

    project.add_milestone(data, Utc::now())?;
    state.connection().save(&mut project).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

fn add_milestone_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Add a milestone")
        .response::<201, Json<Project>>()
}

#[instrument(skip(state, user))]
async fn complete_milestone(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<Project>> {
    let mut project = managed_project(&state, &user, id.as_str()).await?;

    project.complete_milestone(index, Utc::now())?;
    state.connection().save(&mut project).await?;

    Ok(Json(project))
}

fn complete_milestone_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Complete a milestone")
        .description("Mark the milestone at the given position as completed")
        .response::<200, Json<Project>>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct DocumentRequest {
    name: String,
    url: String,
}

#[instrument(skip(state, user))]
async fn add_document(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<DocumentRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    let mut project = visible_project(&state, &user, id.as_str()).await?;

    project.add_document(
        data.name.as_str(),
        data.url.as_str(),
        user.id().clone(),
        Utc::now(),
    );
    state.connection().save(&mut project).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

fn add_document_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Add a document")
        .response::<201, Json<Project>>()
}

#[instrument(skip(state, user))]
async fn get_project_tasks(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Query(paging): Query<PagingOptions>,
) -> Result<Json<Page<Task>>> {
    let project = visible_project(&state, &user, id.as_str()).await?;

    let page = paging
        .execute::<Task>(
            Some("project = $project"),
            vec![("project", json!(project.id()))],
            state.connection(),
        )
        .await?;

    Ok(Json(page))
}

fn get_project_tasks_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Tasks of a project")
        .response::<200, Json<Page<Task>>>()
}

#[cfg(test)]
mod tests {
    use crate::prelude::Role;
    use crate::tests::prelude::*;

    #[tokio::test]
    async fn test_project_lifecycle() -> Result<()> {
        let suite = TestSuite::init().await?;
        let (member, member_token) = suite.user_with_role("member", Role::Designer).await?;
        let (_, outsider_token) = suite.user_with_role("outsider", Role::Employee).await?;
        let admin = suite.token();

        let (status, project) = suite
            .post(
                "/projects",
                admin.as_str(),
                json!({
                    "name": "Website relaunch",
                    "client": {"name": "ACME", "company": "ACME Inc."},
                    "budget": 12000.0,
                    "team": [member.id()]
                }),
            )
            .await;
        assert_eq!(StatusCode::CREATED, status);
        assert_eq!(json!(suite.user().id()), project["projectManager"]);
        assert_eq!(json!("planning"), project["status"]);
        let uri = format!("/projects/{}", project["id"].as_str().unwrap_or_default());

        // members see the project, outsiders don't
        let (status, _) = suite.get(uri.as_str(), member_token.as_str()).await;
        assert_eq!(StatusCode::OK, status);
        let (status, _) = suite.get(uri.as_str(), outsider_token.as_str()).await;
        assert_eq!(StatusCode::FORBIDDEN, status);
        let (_, page) = suite.get("/projects", outsider_token.as_str()).await;
        assert_eq!(json!(0), page["total"]);
        let (_, page) = suite.get("/projects", member_token.as_str()).await;
        assert_eq!(json!(1), page["total"]);

        // only the manager modifies
        let (status, _) = suite
            .put(uri.as_str(), member_token.as_str(), json!({"status": "in_progress"}))
            .await;
        assert_eq!(StatusCode::FORBIDDEN, status);
        let (status, body) = suite
            .put(uri.as_str(), admin.as_str(), json!({"status": "in_progress"}))
            .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!("in_progress"), body["status"]);

        let (status, body) = suite
            .post(
                format!("{uri}/milestones").as_str(),
                admin.as_str(),
                json!({"title": "Wireframes"}),
            )
            .await;
        assert_eq!(StatusCode::CREATED, status);
        assert_eq!(json!(false), body["milestones"][0]["completed"]);
        let (status, body) = suite
            .put(
                format!("{uri}/milestones/0/complete").as_str(),
                admin.as_str(),
                json!({}),
            )
            .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!(true), body["milestones"][0]["completed"]);

        let (status, body) = suite
            .post(
                format!("{uri}/documents").as_str(),
                member_token.as_str(),
                json!({"name": "brief.pdf", "url": "https://files.test/brief.pdf"}),
            )
            .await;
        assert_eq!(StatusCode::CREATED, status);
        assert_eq!(json!(member.id()), body["documents"][0]["uploadedBy"]);

        let (status, body) = suite
            .delete(
                format!("{uri}/team/{}", member.id()).as_str(),
                admin.as_str(),
            )
            .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!([]), body["team"]);

        let (status, _) = suite.delete(uri.as_str(), admin.as_str()).await;
        assert_eq!(StatusCode::NO_CONTENT, status);
        let (status, _) = suite.get(uri.as_str(), admin.as_str()).await;
        assert_eq!(StatusCode::NOT_FOUND, status);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_requires_permission() -> Result<()> {
        let suite = TestSuite::init().await?;
        let (_, token) = suite.user_with_role("designer", Role::Designer).await?;

        let (status, _) = suite
            .post("/projects", token.as_str(), json!({"name": "Not allowed"}))
            .await;
        assert_eq!(StatusCode::FORBIDDEN, status);

        let (status, _) = suite
            .post(
                "/projects",
                suite.token().as_str(),
                json!({"name": "Ghost team", "team": ["user:missing"]}),
            )
            .await;
        assert_eq!(StatusCode::NOT_FOUND, status);

        Ok(())
    }
}

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

use super::Scoped;
use crate::database::definitions::notification::{Notification, NotificationType};
use crate::database::definitions::task::extension::ExtensionStatus;
use crate::database::definitions::task::Task;
use crate::database::definitions::user::User;
use crate::prelude::*;
use aide::transform::TransformOperation;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use chrono::{DateTime, Utc};

#[derive(Deserialize, JsonSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDraft {
    reason: String,
    new_due_date: DateTime<Utc>,
}

#[instrument(skip(state, user, data))]
pub(super) async fn request_extension(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<ExtensionDraft>,
) -> Result<(StatusCode, Json<Task>)> {
    let Scoped { mut task, .. } = Scoped::load(&state, id.as_str()).await?;

    task.open_extension(
        user.id(),
        data.reason.as_str(),
        data.new_due_date,
        Utc::now(),
    )?;
    state.connection().save(&mut task).await?;

    let admins = User::admins(state.connection()).await?;
    Notification::dispatch(
        state.connection(),
        admins.iter().map(User::id),
        user.id(),
        Some(task.id()),
        NotificationType::ExtensionRequested,
        format!("{} asks for more time on \"{}\"", user.name(), task.title()).as_str(),
    )
    .await;

    Ok((StatusCode::CREATED, Json(task)))
}

pub(super) fn request_extension_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Request an extension")
        .description("Ask for a later due date. Only the assignee may ask and only one request can be pending.")
        .response::<201, Json<Task>>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct ExtensionDecision {
    approve: bool,
}

#[instrument(skip(state, user))]
pub(super) async fn resolve_extension(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<ExtensionDecision>,
) -> Result<Json<Task>> {
    let Scoped { mut task, .. } = Scoped::load(&state, id.as_str()).await?;

    let status = task.resolve_extension(&user, data.approve, Utc::now())?;
    state.connection().save(&mut task).await?;

    let (kind, verb) = match status {
        ExtensionStatus::Approved => (NotificationType::ExtensionApproved, "approved"),
        _ => (NotificationType::ExtensionRejected, "rejected"),
    };
    Notification::dispatch(
        state.connection(),
        [task.assigned_to()],
        user.id(),
        Some(task.id()),
        kind,
        format!("Your extension for \"{}\" got {verb}", task.title()).as_str(),
    )
    .await;

    Ok(Json(task))
}

pub(super) fn resolve_extension_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Resolve an extension")
        .description("Approve or reject the pending extension request. Approval moves the due date. Admins only.")
        .response::<200, Json<Task>>()
}

#[cfg(test)]
mod tests {
    use crate::prelude::Role;
    use crate::routes::tasks::tests::project_with_task;
    use crate::tests::prelude::*;
    use chrono::{DateTime, Duration, Utc};

    #[tokio::test]
    async fn test_extension_flow() -> Result<()> {
        let suite = TestSuite::init().await?;
        let (member, token) = suite.user_with_role("member", Role::Designer).await?;
        let (_, task) = project_with_task(&suite, &member).await?;
        let uri = format!(
            "/tasks/{}/extension",
            task["id"].as_str().unwrap_or_default()
        );
        let new_due_date = Utc::now() + Duration::days(7);

        // only the assignee asks
        let (status, _) = suite
            .post(
                uri.as_str(),
                suite.token().as_str(),
                json!({"reason": "Need more time", "newDueDate": new_due_date}),
            )
            .await;
        assert_eq!(StatusCode::FORBIDDEN, status);

        let (status, body) = suite
            .post(
                uri.as_str(),
                token.as_str(),
                json!({"reason": "Client changed the brief", "newDueDate": new_due_date}),
            )
            .await;
        assert_eq!(StatusCode::CREATED, status);
        assert_eq!(json!("pending"), body["extensionRequest"]["status"]);

        let (status, _) = suite
            .post(
                uri.as_str(),
                token.as_str(),
                json!({"reason": "Again", "newDueDate": new_due_date}),
            )
            .await;
        assert_eq!(StatusCode::CONFLICT, status);

        // admins are notified and decide
        let (_, page) = suite.get("/notifications", suite.token().as_str()).await;
        assert_eq!(json!("extension_requested"), page["data"][0]["type"]);

        let (status, _) = suite
            .put(uri.as_str(), token.as_str(), json!({"approve": true}))
            .await;
        assert_eq!(StatusCode::FORBIDDEN, status);

        let (status, body) = suite
            .put(uri.as_str(), suite.token().as_str(), json!({"approve": true}))
            .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!("approved"), body["extensionRequest"]["status"]);
        let due_date: DateTime<Utc> = serde_json::from_value(body["dueDate"].clone())?;
        assert_eq!(new_due_date, due_date);

        let (status, _) = suite
            .put(uri.as_str(), suite.token().as_str(), json!({"approve": false}))
            .await;
        assert_eq!(StatusCode::CONFLICT, status);

        let (_, page) = suite.get("/notifications", token.as_str()).await;
        assert_eq!(json!("extension_approved"), page["data"][0]["type"]);

        Ok(())
    }
}

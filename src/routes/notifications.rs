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

use crate::database::definitions::notification::Notification;
use crate::database::definitions::user::User;
use crate::prelude::*;
use crate::require_session;
use crate::routes::parse_id;
use aide::axum::routing::{get_with, put_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query, State};
use axum::Extension;

pub fn router(state: ApplicationState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/", get_with(get_notifications, get_notifications_docs))
        .api_route("/read", put_with(read_all, read_all_docs))
        .api_route("/:id/read", put_with(read_one, read_one_docs))
        .route_layer(require_session!(state))
        .with_state(state)
}

#[derive(Deserialize, JsonSchema, Debug, Clone, Default)]
pub struct NotificationFilter {
    /// `true` lists only unread, `false` only read notifications
    unread: Option<bool>,
}

#[instrument(skip(state, user))]
async fn get_notifications(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Query(paging): Query<PagingOptions>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Page<Notification>>> {
    let mut condition = "recipient = $user".to_owned();
    let mut bindings = vec![("user", json!(user.id()))];
    if let Some(unread) = filter.unread {
        condition.push_str(" AND isRead = $read");
        bindings.push(("read", json!(!unread)));
    }

    let page = paging
        .execute::<Notification>(Some(condition.as_str()), bindings, state.connection())
        .await?;

    Ok(Json(page))
}

fn get_notifications_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Own notifications")
        .description("Obtain a page of the notifications of the current user, newest first")
        .response::<200, Json<Page<Notification>>>()
}

#[instrument(skip(state, user))]
async fn read_one(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    let mut notification: Notification = state
        .connection()
        .fetch(&parse_id(Notification::TABLE, id.as_str())?)
        .await?;
    // foreign notifications don't exist for the caller
    if notification.recipient() != user.id() {
        return Err(ApplicationError::NotFound(Notification::NAME.to_owned()));
    }

    if !notification.is_read() {
        notification.mark_read();
        state.connection().save(&mut notification).await?;
    }

    Ok(Json(notification))
}

fn read_one_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Mark as read")
        .response::<200, Json<Notification>>()
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
pub struct ReadAllResponse {
    /// the count of notifications marked as read
    updated: usize,
}

#[instrument(skip(state, user))]
async fn read_all(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
) -> Result<Json<ReadAllResponse>> {
    let updated = Notification::mark_all_read(user.id(), state.connection()).await?;

    Ok(Json(ReadAllResponse { updated }))
}

fn read_all_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Mark all as read")
        .response::<200, Json<ReadAllResponse>>()
}

#[cfg(test)]
mod tests {
    use crate::prelude::Role;
    use crate::routes::tasks::tests::project_with_task;
    use crate::tests::prelude::*;

    #[tokio::test]
    async fn test_read_notifications() -> Result<()> {
        let suite = TestSuite::init().await?;
        let (member, token) = suite.user_with_role("member", Role::Designer).await?;
        let (_, other_token) = suite.user_with_role("other", Role::Designer).await?;
        let (_, task) = project_with_task(&suite, &member).await?;

        // a comment by the admin notifies the assignee once more
        let (status, _) = suite
            .post(
                format!("/tasks/{}/comments", task["id"].as_str().unwrap_or_default()).as_str(),
                suite.token().as_str(),
                json!({"text": "Please use the new logo"}),
            )
            .await;
        assert_eq!(StatusCode::CREATED, status);

        let (status, page) = suite.get("/notifications?unread=true", token.as_str()).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!(2), page["total"]);
        let uri = format!(
            "/notifications/{}/read",
            page["data"][0]["id"].as_str().unwrap_or_default()
        );

        // nobody else can see or touch them
        let (status, _) = suite.put(uri.as_str(), other_token.as_str(), json!({})).await;
        assert_eq!(StatusCode::NOT_FOUND, status);

        let (status, body) = suite.put(uri.as_str(), token.as_str(), json!({})).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!(true), body["isRead"]);

        let (status, body) = suite.put("/notifications/read", token.as_str(), json!({})).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!(1), body["updated"]);

        let (_, page) = suite.get("/notifications?unread=true", token.as_str()).await;
        assert_eq!(json!(0), page["total"]);
        let (_, page) = suite.get("/notifications?unread=false", token.as_str()).await;
        assert_eq!(json!(2), page["total"]);

        Ok(())
    }
}

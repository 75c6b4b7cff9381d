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

use crate::database::definitions::user::{Reward, User, UserProfile};
use crate::prelude::*;
use crate::require_session;
use crate::routes::parse_id;
use aide::axum::routing::{get_with, post_with, put_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Extension;
use chrono::Utc;

const LEADERBOARD_SIZE: u64 = 10;

pub fn router(state: ApplicationState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/", get_with(get_users, get_users_docs))
        .api_route("/me", get_with(get_me, get_me_docs))
        .api_route("/leaderboard", get_with(get_leaderboard, get_leaderboard_docs))
        .api_route("/:id", get_with(get_user, get_user_docs))
        .api_route("/:id/role", put_with(put_role, put_role_docs))
        .api_route(
            "/:id/permissions",
            put_with(put_permissions, put_permissions_docs),
        )
        .api_route(
            "/:id/rewards",
            get_with(get_rewards, get_rewards_docs).post_with(grant_gift, grant_gift_docs),
        )
        .route_layer(require_session!(state))
        .with_state(state)
}

/// Loads a user the caller is allowed to look at: themself or anyone with `user.view`.
async fn visible_user(state: &ApplicationState, caller: &User, id: &str) -> Result<User> {
    let id = parse_id(User::TABLE, id)?;
    if &id != caller.id() {
        caller.require(Permission::UserView)?;
    }

    state.connection().fetch(&id).await
}

async fn get_me(Extension(user): Extension<User>) -> Json<UserProfile> {
    Json(user.profile())
}

fn get_me_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Own profile")
        .description("The profile of the authenticated user")
        .response::<200, Json<UserProfile>>()
}

#[instrument(skip(state, user))]
async fn get_users(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Query(paging): Query<PagingOptions>,
) -> Result<Json<Page<UserProfile>>> {
    user.require(Permission::UserView)?;

    let page = paging
        .execute::<User>(None, Vec::new(), state.connection())
        .await?;

    Ok(Json(page.map(|user| user.profile())))
}

fn get_users_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("List users")
        .description("Obtain a page of all users, newest first. Requires `user.view`.")
        .response::<200, Json<Page<UserProfile>>>()
}

async fn get_leaderboard(
    State(state): State<ApplicationState>,
) -> Result<Json<Vec<UserProfile>>> {
    let users = User::leaderboard(LEADERBOARD_SIZE, state.connection()).await?;

    Ok(Json(users.iter().map(User::profile).collect()))
}

fn get_leaderboard_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Leaderboard")
        .description("The ten users with the most reward points")
        .response::<200, Json<Vec<UserProfile>>>()
}

async fn get_user(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>> {
    let target = visible_user(&state, &user, id.as_str()).await?;

    Ok(Json(target.profile()))
}

fn get_user_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Get a user")
        .description("Obtain the profile of a user. Requires `user.view` for other users.")
        .response::<200, Json<UserProfile>>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct RoleRequest {
    role: Role,
}

#[instrument(skip(state, user))]
async fn put_role(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<RoleRequest>,
) -> Result<Json<UserProfile>> {
    user.require(Permission::UserManage)?;

    let mut target: User = state
        .connection()
        .fetch(&parse_id(User::TABLE, id.as_str())?)
        .await?;
    target.change_role(data.role);
    state.connection().save(&mut target).await?;
    info!("{} changed the role of {} to {}", user.id(), target.id(), data.role);

    Ok(Json(target.profile()))
}

fn put_role_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Change the role")
        .description("Change the role of a user. The permissions are reset to the defaults of the role. Requires `user.manage`.")
        .response::<200, Json<UserProfile>>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct PermissionsRequest {
    permissions: Vec<Permission>,
}

#[instrument(skip(state, user))]
async fn put_permissions(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<PermissionsRequest>,
) -> Result<Json<UserProfile>> {
    user.require(Permission::UserManage)?;

    let mut target: User = state
        .connection()
        .fetch(&parse_id(User::TABLE, id.as_str())?)
        .await?;
    target.replace_permissions(data.permissions);
    state.connection().save(&mut target).await?;

    Ok(Json(target.profile()))
}

fn put_permissions_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Replace the permissions")
        .description("Replace the capability tags of a user. Requires `user.manage`.")
        .response::<200, Json<UserProfile>>()
}

async fn get_rewards(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Reward>>> {
    let target = visible_user(&state, &user, id.as_str()).await?;

    Ok(Json(target.rewards().clone()))
}

fn get_rewards_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Reward log")
        .description("The reward log of a user, oldest first")
        .response::<200, Json<Vec<Reward>>>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct GiftRequest {
    description: String,
    value: u64,
}

#[instrument(skip(state, user))]
async fn grant_gift(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<GiftRequest>,
) -> Result<(StatusCode, Json<Vec<Reward>>)> {
    user.require(Permission::RewardGrant)?;
    if data.description.trim().is_empty() {
        return Err(ApplicationError::BadRequest(
            "description is required".to_owned(),
        ));
    }

    let mut target: User = state
        .connection()
        .fetch(&parse_id(User::TABLE, id.as_str())?)
        .await?;
    target.gift(data.value, data.description.as_str(), Utc::now());
    state.connection().save(&mut target).await?;

    Ok((StatusCode::CREATED, Json(target.rewards().clone())))
}

fn grant_gift_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .summary("Grant a gift")
        .description("Append a gift to the reward log of a user. Gifts don't count towards the points. Requires `reward.grant`.")
        .response::<201, Json<Vec<Reward>>>()
}

#[cfg(test)]
mod tests {
    use crate::tests::prelude::*;
    use crate::prelude::Role;

    #[tokio::test]
    async fn test_profiles() -> Result<()> {
        let suite = TestSuite::init().await?;
        let (employee, token) = suite.user_with_role("employee", Role::Employee).await?;
        let admin = suite.user().id().to_string();

        let (status, body) = suite.get("/users/me", token.as_str()).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!(employee.id()), body["id"]);

        // employees can't look at others
        let (status, _) = suite.get(format!("/users/{admin}").as_str(), token.as_str()).await;
        assert_eq!(StatusCode::FORBIDDEN, status);
        let (status, _) = suite.get("/users", token.as_str()).await;
        assert_eq!(StatusCode::FORBIDDEN, status);

        let (status, body) = suite
            .get(format!("/users/{}", employee.id()).as_str(), suite.token().as_str())
            .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!("employee"), body["name"]);

        let (status, body) = suite.get("/users?pageSize=1", suite.token().as_str()).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!(2), body["total"]);
        assert_eq!(1, body["data"].as_array().map(Vec::len).unwrap_or_default());

        Ok(())
    }

    #[tokio::test]
    async fn test_role_and_permissions() -> Result<()> {
        let suite = TestSuite::init().await?;
        let (employee, token) = suite.user_with_role("employee", Role::Employee).await?;
        let uri = format!("/users/{}/role", employee.id());

        let (status, _) = suite
            .put(uri.as_str(), token.as_str(), json!({"role": "admin"}))
            .await;
        assert_eq!(StatusCode::FORBIDDEN, status);

        let (status, body) = suite
            .put(
                uri.as_str(),
                suite.token().as_str(),
                json!({"role": "project_manager"}),
            )
            .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!("project_manager"), body["role"]);
        assert_eq!(
            json!(Role::ProjectManager.default_permissions()),
            body["permissions"]
        );

        let (status, body) = suite
            .put(
                format!("/users/{}/permissions", employee.id()).as_str(),
                suite.token().as_str(),
                json!({"permissions": ["reward.grant", "reward.grant", "user.view"]}),
            )
            .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!(["reward.grant", "user.view"]), body["permissions"]);

        let (status, _) = suite
            .put(
                format!("/users/{}/permissions", employee.id()).as_str(),
                suite.token().as_str(),
                json!({"permissions": ["everything"]}),
            )
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, status);

        Ok(())
    }

    #[tokio::test]
    async fn test_gifts_and_leaderboard() -> Result<()> {
        let suite = TestSuite::init().await?;
        let (employee, token) = suite.user_with_role("employee", Role::Employee).await?;
        let uri = format!("/users/{}/rewards", employee.id());

        let (status, _) = suite
            .post(
                uri.as_str(),
                token.as_str(),
                json!({"description": "self service", "value": 10}),
            )
            .await;
        assert_eq!(StatusCode::FORBIDDEN, status);

        let (status, body) = suite
            .post(
                uri.as_str(),
                suite.token().as_str(),
                json!({"description": "Coffee voucher", "value": 25}),
            )
            .await;
        assert_eq!(StatusCode::CREATED, status);
        assert_eq!(json!("gift"), body[0]["type"]);

        let (status, body) = suite.get(uri.as_str(), token.as_str()).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(1, body.as_array().map(Vec::len).unwrap_or_default());

        // gifts don't count as points
        let (_, body) = suite.get("/users/me", token.as_str()).await;
        assert_eq!(json!(0), body["rewardPoints"]);

        let (status, body) = suite.get("/users/leaderboard", token.as_str()).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(2, body.as_array().map(Vec::len).unwrap_or_default());

        Ok(())
    }
}

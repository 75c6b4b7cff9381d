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

use crate::database::definitions::user::User;
use crate::prelude::*;
use aide::axum::ApiRouter;
use aide::openapi::OpenApi;
use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use crate::routes::openapi::grouped;

pub mod auth;
pub mod extractor;
pub mod notifications;
pub mod openapi;
pub mod projects;
pub mod tasks;
pub mod users;

/// Wraps routes into the session middleware.
#[macro_export]
macro_rules! require_session {
    ($state:expr) => {
        axum::middleware::from_fn_with_state(
            $state.clone(),
            $crate::auth::middleware::require_session,
        )
    };
}

pub fn router(state: ApplicationState) -> Router {
    let mut api = OpenApi::default();

    ApiRouter::new()
        .nest("/auth", grouped(auth::router(state.clone()), "auth"))
        .nest("/users", grouped(users::router(state.clone()), "users"))
        .nest("/projects", grouped(projects::router(state.clone()), "projects"))
        .nest("/tasks", grouped(tasks::router(state.clone()), "tasks"))
        .nest(
            "/notifications",
            grouped(notifications::router(state.clone()), "notifications"),
        )
        .nest("/docs", openapi::router(state))
        .finish_api_with(&mut api, openapi::transform_api)
        .layer(Extension(Arc::new(api)))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new().gzip(true))
}

/// Parses a path parameter into an id of the given table.
pub fn parse_id(table: &str, raw: &str) -> Result<Id> {
    Id::try_from((table, raw))
}

/// Fails with `NotFound` if the referenced user doesn't exist.
pub async fn ensure_user(state: &ApplicationState, id: &Id) -> Result<User> {
    if id.table != User::TABLE {
        return Err(ApplicationError::BadRequest(format!("{id} is not a user")));
    }

    state.connection().fetch(id).await
}

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

use crate::error::ApplicationErrorResponse;
use crate::prelude::*;
use aide::axum::ApiRouter;
use aide::openapi::{ApiKeyLocation, OpenApi, SecurityScheme, Tag};
use aide::redoc::Redoc;
use aide::transform::TransformOpenApi;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Extension;
use std::sync::Arc;

/// Where the generated document is served.
pub const API_JSON: &str = "/docs/private/api.json";
const SESSION_SCHEME: &str = "SessionKey";

/// Route groups with their descriptions, in documentation order.
const GROUPS: [(&str, &str); 5] = [
    ("auth", "Registration and sessions"),
    ("users", "Profiles, roles, permissions and rewards"),
    ("projects", "Projects with their team, milestones and documents"),
    ("tasks", "Tasks, their completion and extension requests"),
    ("notifications", "Events addressed to the current user"),
];

/// The Redoc page and the raw document. Neither shows up in the document itself.
pub fn router(state: ApplicationState) -> ApiRouter {
    ApiRouter::new()
        .route("/", Redoc::new(API_JSON).with_title("yapm API").axum_route())
        .route("/private/api.json", get(serve_docs))
        .with_state(state)
}

/// Files every operation of the router under the given group.
pub fn grouped(router: ApiRouter, group: &str) -> ApiRouter {
    router.with_path_items(|item| item.tag(group))
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> Response {
    axum::Json(api.as_ref()).into_response()
}

pub fn transform_api(api: TransformOpenApi) -> TransformOpenApi {
    let api = GROUPS.iter().fold(api, |api, (name, description)| {
        api.tag(Tag {
            name: (*name).to_owned(),
            description: Some((*description).to_owned()),
            ..Default::default()
        })
    });

    api.title("yapm")
        .summary("Yet another project manager")
        .description("Projects, tasks and the rewards for completing them on time")
        .security_scheme(
            SESSION_SCHEME,
            SecurityScheme::ApiKey {
                location: ApiKeyLocation::Header,
                name: AUTHORIZATION.to_string(),
                description: Some("Bearer <session key>, alternatively the session cookie".to_owned()),
                extensions: Default::default(),
            },
        )
        .default_response_with::<Json<ApplicationErrorResponse>, _>(|response| {
            response.description("The request failed, see `error`")
        })
}

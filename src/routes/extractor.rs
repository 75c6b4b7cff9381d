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

use crate::prelude::*;
use axum::extract::FromRequest;
use axum::response::IntoResponse;
use axum_jsonschema::JsonSchemaRejection;
use serde::Serialize;

/// Json body validated against the schema of `T`. Rejections become `BadRequest`.
#[derive(FromRequest, OperationIo)]
#[from_request(via(axum_jsonschema::Json), rejection(ApplicationError))]
#[aide(
    input_with = "axum_jsonschema::Json<T>",
    output_with = "axum_jsonschema::Json<T>",
    json_schema
)]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
    T: Serialize,
{
    fn into_response(self) -> axum::response::Response {
        axum::Json(self.0).into_response()
    }
}

impl From<JsonSchemaRejection> for ApplicationError {
    fn from(rejection: JsonSchemaRejection) -> Self {
        let message = match rejection {
            JsonSchemaRejection::Json(rejection) => rejection.body_text(),
            JsonSchemaRejection::Serde(error) => {
                format!("{}: {}", field(error.path().to_string()), error.inner())
            }
            // one line per violated constraint
            JsonSchemaRejection::Schema(errors) => errors
                .iter()
                .map(|unit| {
                    format!(
                        "{}: {}",
                        field(unit.instance_location().to_string()),
                        unit.error_description()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };

        Self::BadRequest(message)
    }
}

fn field(location: String) -> String {
    match location.as_str() {
        "" | "/" | "." => "body".to_owned(),
        _ => location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    #[derive(Deserialize, Serialize, JsonSchema)]
    struct Estimate {
        hours: u8,
    }

    async fn echo(Json(estimate): Json<Estimate>) -> Json<Estimate> {
        Json(estimate)
    }

    async fn send(body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::post("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap();
        let response = Router::new()
            .route("/", post(echo))
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_valid_body() {
        let (status, body) = send(r#"{"hours": 8}"#).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!({"hours": 8}), body);
    }

    #[tokio::test]
    async fn test_rejections_name_the_field() {
        let (status, body) = send(r#"{"hours": "eight"}"#).await;
        assert_eq!(StatusCode::BAD_REQUEST, status);
        let message = body["error"].as_str().unwrap_or_default();
        assert!(message.contains("/hours: "), "{message}");

        let (status, body) = send("{").await;
        assert_eq!(StatusCode::BAD_REQUEST, status);
        assert!(body["error"].is_string());
    }
}

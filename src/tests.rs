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

use crate::auth::session::Session;
use crate::auth::Authenticate;
use crate::database::definitions::user::{User, WriteUser};
use crate::prelude::*;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "password";

/// A fresh in-memory backend with a registered and logged in admin.
#[derive(Getters)]
#[get = "pub"]
pub struct TestSuite {
    router: Router,
    state: ApplicationState,
    user: User,
    session: Session,
}

impl TestSuite {
    pub async fn init() -> Result<Self> {
        let info = crate::database::connect_in_memory().await?;
        let state = ApplicationState::new(info, Config::default());
        let router = crate::routes::router(state.clone());

        // the first user becomes admin
        let user = WriteUser::from(state.connection())
            .set_name(Some("admin"))
            .set_email(Some("admin@test.de"))
            .set_password(Some(TEST_PASSWORD))
            .set_department(Some("management"))
            .to_owned()
            .await?;
        let session = user
            .start_session(state.connection(), state.config())
            .await?;

        Ok(Self {
            router,
            state,
            user,
            session,
        })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.state.connection()
    }

    /// The session key of the default user.
    pub fn token(&self) -> String {
        self.session.id.id.clone()
    }

    /// Registers another user with the given role and starts a session for it.
    pub async fn user_with_role(&self, name: &str, role: Role) -> Result<(User, String)> {
        let email = format!("{name}@test.de");
        let user = WriteUser::from(self.connection())
            .set_name(Some(name))
            .set_email(Some(email.as_str()))
            .set_password(Some(TEST_PASSWORD))
            .set_role(Some(role))
            .to_owned()
            .await?;
        let session = user
            .start_session(self.connection(), self.state.config())
            .await?;

        Ok((user, session.id.id))
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}

pub mod prelude {
    pub use crate::error::Result;
    pub use crate::tests::TestSuite;
    pub use crate::tests::TEST_PASSWORD;
    pub use axum::http::{Method, StatusCode};
}

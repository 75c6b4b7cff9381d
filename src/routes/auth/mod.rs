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

use crate::auth::middleware::SESSION_COOKIE;
use crate::auth::session::Session;
use crate::auth::Authenticate;
use crate::database::definitions::user::{User, UserProfile, WriteUser};
use crate::error::ApplicationErrorResponse;
use crate::prelude::*;
use crate::require_session;
use aide::axum::routing::post_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;

pub fn router(state: ApplicationState) -> ApiRouter {
    let protected = ApiRouter::new()
        .api_route("/logout", post_with(logout, logout_docs))
        .route_layer(require_session!(state));

    ApiRouter::new()
        .api_route("/register", post_with(register, register_docs))
        .api_route("/login", post_with(login, login_docs))
        .api_route("/refresh", post_with(refresh, refresh_docs))
        .merge(protected)
        .with_state(state)
}

fn session_cookie(session: &Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.id.id.clone()))
        .same_site(SameSite::Strict)
        .http_only(true)
        .secure(true)
        .path("/")
        .build()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    #[serde(default)]
    department: Option<String>,
}

#[instrument(skip_all)]
async fn register(
    State(state): State<ApplicationState>,
    Json(data): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    let user = WriteUser::from(state.connection())
        .set_name(Some(data.name.as_str()))
        .set_email(Some(data.email.as_str()))
        .set_password(Some(data.password.as_str()))
        .set_department(data.department.as_deref())
        .to_owned()
        .await?;

    Ok((StatusCode::CREATED, Json(user.profile())))
}

fn register_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Register a new user. The very first user becomes admin, everyone else starts as employee.")
        .summary("Register")
        .response_with::<201, Json<UserProfile>, _>(|transform| transform.description("Registered"))
        .response_with::<409, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("The email is already registered")
        })
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct LoginRequest {
    /// the email
    email: String,
    /// the password
    password: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session: Session,
    pub user: UserProfile,
}

#[instrument(skip_all)]
async fn login(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    Json(data): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    // fetch the user
    match User::find_by_email(data.email.as_str(), state.connection()).await? {
        Some(user) => {
            user.login(data.password.as_str())?;

            // start a new session
            let session = user
                .start_session(state.connection(), state.config())
                .await?;
            let cookie = session_cookie(&session);
            info!("Started session for {}", user.id());

            Ok((
                jar.add(cookie),
                Json(LoginResponse {
                    session,
                    user: user.profile(),
                }),
            ))
        }
        None => Err(ApplicationError::Unauthorized),
    }
}

fn login_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Start a new session in order to be able to authenticate and authorize further requests")
        .summary("Start a new session")
        .response_with::<200, Json<LoginResponse>, _>(|transform| transform.description("Login succeeded"))
        .response_with::<401, Json<ApplicationErrorResponse>, _>(|transform| transform.description("Invalid credentials"))
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// the current session key
    session: String,
    refresh_token: String,
}

#[instrument(skip_all)]
async fn refresh(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    Json(data): Json<RefreshRequest>,
) -> Result<(CookieJar, Json<Session>)> {
    let session = Session::load(data.session.as_str(), state.connection())
        .await?
        .refresh(
            data.refresh_token.as_str(),
            state.connection(),
            state.config(),
        )
        .await?;
    let cookie = session_cookie(&session);

    Ok((jar.add(cookie), Json(session)))
}

fn refresh_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Exchange a session and its refresh token for a new session")
        .summary("Refresh a session")
        .response_with::<200, Json<Session>, _>(|transform| transform.description("The new session"))
        .response_with::<401, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("Unknown session or invalid refresh token")
        })
}

#[instrument(skip_all)]
async fn logout(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    user.logout(state.connection()).await?;

    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    ))
}

fn logout_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("End all sessions of the current user")
        .summary("Logout")
        .response::<204, ()>()
}

#[cfg(test)]
mod tests {
    use crate::routes::auth::LoginResponse;
    use crate::tests::prelude::*;

    #[tokio::test]
    async fn test_register_and_login() -> Result<()> {
        let suite = TestSuite::init().await?;

        let (status, body) = suite
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "name": "employee",
                    "email": "employee@test.de",
                    "password": TEST_PASSWORD,
                    "department": "design"
                })),
            )
            .await;
        assert_eq!(StatusCode::CREATED, status);
        assert_eq!(json!("employee"), body["role"]);
        assert!(body.get("password").is_none());

        let (status, _) = suite
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "name": "again",
                    "email": "employee@test.de",
                    "password": TEST_PASSWORD
                })),
            )
            .await;
        assert_eq!(StatusCode::CONFLICT, status);

        let (status, body) = suite
            .request(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({"email": "employee@test.de", "password": TEST_PASSWORD})),
            )
            .await;
        assert_eq!(StatusCode::OK, status);
        let login: LoginResponse = serde_json::from_value(body)?;

        let (status, body) = suite.get("/users/me", login.session.id.id.as_str()).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!("employee@test.de"), body["email"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_login() -> Result<()> {
        let suite = TestSuite::init().await?;

        for credentials in [
            json!({"email": "admin@test.de", "password": "wrong password"}),
            json!({"email": "nobody@test.de", "password": TEST_PASSWORD}),
        ] {
            let (status, _) = suite
                .request(Method::POST, "/auth/login", None, Some(credentials))
                .await;
            assert_eq!(StatusCode::UNAUTHORIZED, status);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_and_logout() -> Result<()> {
        let suite = TestSuite::init().await?;

        let (status, body) = suite
            .request(
                Method::POST,
                "/auth/refresh",
                None,
                Some(json!({
                    "session": suite.token(),
                    "refreshToken": suite.session().refresh_token()
                })),
            )
            .await;
        assert_eq!(StatusCode::OK, status);
        let token = body["id"]
            .as_str()
            .and_then(|id| id.split_once(':'))
            .map(|(_, key)| key.to_owned())
            .unwrap();

        // the old session got replaced
        let (status, _) = suite.get("/users/me", suite.token().as_str()).await;
        assert_eq!(StatusCode::UNAUTHORIZED, status);

        let (status, _) = suite
            .request(Method::POST, "/auth/logout", Some(token.as_str()), None)
            .await;
        assert_eq!(StatusCode::NO_CONTENT, status);

        let (status, _) = suite.get("/users/me", token.as_str()).await;
        assert_eq!(StatusCode::UNAUTHORIZED, status);

        Ok(())
    }

    #[tokio::test]
    async fn test_requires_session() -> Result<()> {
        let suite = TestSuite::init().await?;

        let (status, body) = suite
            .request(Method::GET, "/users/me", None, None)
            .await;
        assert_eq!(StatusCode::UNAUTHORIZED, status);
        assert_eq!(json!("Unauthorized"), body["error"]);

        let (status, _) = suite.get("/users/me", "invalid").await;
        assert_eq!(StatusCode::UNAUTHORIZED, status);

        Ok(())
    }
}

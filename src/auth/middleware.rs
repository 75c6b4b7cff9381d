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
use crate::database::definitions::user::User;
use crate::prelude::*;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

pub const SESSION_COOKIE: &str = "session";

/// Reads the session key from the bearer header, falling back to the session cookie.
fn session_key(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|key| key.trim().to_owned())
        .or_else(|| jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_owned()))
}

async fn authenticate(state: &ApplicationState, key: &str) -> Result<(User, Session)> {
    let connection = state.connection();
    // verify the session
    let session = Session::validate_session(key, connection).await?;
    // fetch the user
    let user: Option<User> = connection.find(session.target()).await?;

    match user {
        Some(user) => Ok((user, session)),
        None => {
            warn!("Session {} points to a missing user", session.id);
            session.end(connection).await?;

            Err(ApplicationError::Unauthorized)
        }
    }
}

pub async fn require_session(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(key) = session_key(request.headers(), &jar) else {
        return ApplicationError::Unauthorized.into_response();
    };

    match authenticate(&state, key.as_str()).await {
        Ok((user, session)) => {
            let extensions = request.extensions_mut();
            extensions.insert(user);
            extensions.insert(session);

            next.run(request).await
        }
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn test_session_key_sources() {
        let mut headers = HeaderMap::new();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "from-cookie"));

        assert_eq!(Some("from-cookie".to_owned()), session_key(&headers, &jar));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(Some("from-header".to_owned()), session_key(&headers, &jar));

        assert_eq!(None, session_key(&HeaderMap::new(), &CookieJar::new()));
    }
}

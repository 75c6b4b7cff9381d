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
use chrono::{DateTime, Duration, Utc};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

// 15m
pub const SESSION_LENGTH: i64 = 900;
// 20m
pub const REFRESH_LENGTH: i64 = 1200;

const KEY_LENGTH: usize = 64;

#[derive(Clone, Debug, Getters, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Id,
    #[get = "pub"]
    target: Id,
    #[get = "pub"]
    iat: DateTime<Utc>,
    #[get = "pub"]
    exp: DateTime<Utc>,
    #[get = "pub"]
    refresh_token: String,
    refresh_exp: DateTime<Utc>,
    #[serde(default)]
    revision: u64,
}

impl Record for Session {
    const TABLE: &'static str = "session";
    const NAME: &'static str = "Session";

    fn record_id(&self) -> &Id {
        &self.id
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

impl Session {
    /// Loads the session behind the given key. Expired sessions are ended.
    #[instrument(skip_all)]
    pub async fn validate_session(key: &str, connection: &DatabaseConnection) -> Result<Session> {
        let id = Id::try_from((Session::TABLE, key)).map_err(|_| ApplicationError::Unauthorized)?;
        let session: Option<Session> = connection.find(&id).await?;

        match session {
            Some(session) => {
                session.is_valid(connection).await?;
                Ok(session)
            }
            None => Err(ApplicationError::Unauthorized),
        }
    }

    #[instrument(skip_all)]
    pub async fn is_valid(&self, connection: &DatabaseConnection) -> Result<()> {
        if Utc::now() >= self.exp {
            // the session is not anymore valid, so we end it.
            self.end(connection).await?;

            Err(ApplicationError::Unauthorized)
        } else {
            Ok(())
        }
    }

    /// Ends the given session
    #[instrument(skip_all)]
    pub async fn end(&self, connection: &DatabaseConnection) -> Result<()> {
        Repository::<Session>::remove(connection, &self.id).await
    }

    /// Exchanges the session for a new one. Any mismatch ends the session.
    #[instrument(skip_all)]
    pub async fn refresh(
        self,
        refresh_token: &str,
        connection: &DatabaseConnection,
        config: &Config,
    ) -> Result<Session> {
        if self.refresh_token.eq(refresh_token) && Utc::now() < self.refresh_exp {
            // start a new session, this automatically ends the current session
            WriteSession::new(&self.target, connection)
                .set_session_length(*config.session_length())
                .set_refresh_length(*config.refresh_length())
                .to_owned()
                .await
        } else {
            self.end(connection).await?;

            Err(ApplicationError::Unauthorized)
        }
    }

    /// Like `validate_session`, but accepts expired sessions as long as they exist.
    #[instrument(skip_all)]
    pub async fn load(key: &str, connection: &DatabaseConnection) -> Result<Session> {
        let id = Id::try_from((Session::TABLE, key)).map_err(|_| ApplicationError::Unauthorized)?;
        let session: Option<Session> = connection.find(&id).await?;

        session.ok_or(ApplicationError::Unauthorized)
    }
}

#[derive(Clone, Debug)]
pub struct EndSession<'a> {
    target: &'a Id,
    connection: &'a DatabaseConnection,
}

impl<'a> EndSession<'a> {
    pub fn new(target: &'a Id, connection: &'a DatabaseConnection) -> Self {
        Self { target, connection }
    }
}

impl<'a> IntoFuture for EndSession<'a> {
    type Output = Result<()>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            sql_span!(self
                .connection
                .query("DELETE FROM session WHERE target = $target")
                .bind(("target", self.target.to_string())))?
            .check()?;

            Ok(())
        })
    }
}

#[derive(Clone, Debug, Setters)]
pub struct WriteSession<'a> {
    target: &'a Id,
    connection: &'a DatabaseConnection,
    /// lifetime in seconds
    #[set = "pub"]
    session_length: i64,
    /// lifetime of the refresh token in seconds
    #[set = "pub"]
    refresh_length: i64,
}

impl<'a> WriteSession<'a> {
    pub fn new(target: &'a Id, connection: &'a DatabaseConnection) -> Self {
        Self {
            target,
            connection,
            session_length: SESSION_LENGTH,
            refresh_length: REFRESH_LENGTH,
        }
    }
}

impl<'a> IntoFuture for WriteSession<'a> {
    type Output = Result<Session>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let iat = Utc::now();
            let session = Session {
                id: Id::with_length(Session::TABLE, KEY_LENGTH),
                target: self.target.clone(),
                iat,
                exp: iat + Duration::seconds(self.session_length),
                refresh_token: nanoid::nanoid!(KEY_LENGTH),
                refresh_exp: iat + Duration::seconds(self.refresh_length),
                revision: 0,
            };

            // end currently active sessions for the target
            EndSession::new(self.target, self.connection).await?;
            self.connection.store(&session).await?;

            Ok(session)
        })
    }
}

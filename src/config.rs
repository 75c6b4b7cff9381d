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

use crate::auth::session::{REFRESH_LENGTH, SESSION_LENGTH};
use crate::prelude::*;

#[derive(Deserialize, Debug, Clone, Getters)]
#[get = "pub"]
pub struct Config {
    #[serde(default = "default_endpoint")]
    surrealdb_endpoint: String,
    #[serde(default)]
    surrealdb_username: Option<String>,
    #[serde(default)]
    surrealdb_password: Option<String>,
    #[serde(default = "default_namespace")]
    surrealdb_namespace: String,
    #[serde(default = "default_database")]
    surrealdb_database: String,
    #[serde(default = "default_bind_address")]
    bind_address: String,
    /// lifetime of a session in seconds
    #[serde(default = "default_session_length")]
    session_length: i64,
    /// lifetime of the refresh token in seconds
    #[serde(default = "default_refresh_length")]
    refresh_length: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(envy::from_env::<Config>()?)
    }

    /// Root credentials, only if both parts are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.surrealdb_username
            .as_deref()
            .zip(self.surrealdb_password.as_deref())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            surrealdb_endpoint: default_endpoint(),
            surrealdb_username: None,
            surrealdb_password: None,
            surrealdb_namespace: default_namespace(),
            surrealdb_database: default_database(),
            bind_address: default_bind_address(),
            session_length: default_session_length(),
            refresh_length: default_refresh_length(),
        }
    }
}

fn default_endpoint() -> String {
    "ws://localhost:8000".to_owned()
}

fn default_namespace() -> String {
    "production".to_owned()
}

fn default_database() -> String {
    "yapm".to_owned()
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_owned()
}

fn default_session_length() -> i64 {
    SESSION_LENGTH
}

fn default_refresh_length() -> i64 {
    REFRESH_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!("ws://localhost:8000", config.surrealdb_endpoint());
        assert_eq!(900, *config.session_length());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let config = Config {
            surrealdb_username: Some("root".to_owned()),
            ..Default::default()
        };
        assert!(config.credentials().is_none());

        let config = Config {
            surrealdb_username: Some("root".to_owned()),
            surrealdb_password: Some("secret".to_owned()),
            ..Default::default()
        };
        assert_eq!(Some(("root", "secret")), config.credentials());
    }
}

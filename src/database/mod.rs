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

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use version_compare::{Cmp, Version};

pub mod definitions;
pub mod id;
pub mod page;
pub mod repository;
pub mod timestamp;

pub type DatabaseConnection = Surreal<Any>;

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection: DatabaseConnection,
    pub database: String,
    pub namespace: String,
}

/// Schema migrations as (version, query). Applied in order when the stored version is older.
const MIGRATIONS: &[(&str, &str)] = &[];

pub async fn connect(config: &Config) -> Result<ConnectionInfo> {
    open(
        config.surrealdb_endpoint(),
        config.credentials(),
        config.surrealdb_namespace(),
        config.surrealdb_database(),
    )
    .await
}

/// Opens a fresh in-memory database with a random name.
#[cfg(test)]
pub async fn connect_in_memory() -> Result<ConnectionInfo> {
    let database = nanoid::nanoid!();
    println!(
        "Connected with database {:?} in namespace \"test\"",
        database
    );

    open("mem://", None, "test", database.as_str()).await
}

async fn open(
    endpoint: &str,
    credentials: Option<(&str, &str)>,
    namespace: &str,
    database: &str,
) -> Result<ConnectionInfo> {
    // establish the connection
    let client = surrealdb::engine::any::connect(endpoint).await?;
    info!("Established connection to surrealdb at {endpoint}");

    // authenticate
    if let Some((username, password)) = credentials {
        client.signin(Root { username, password }).await?;
        info!("Authenticated with surrealdb");
    }

    client.use_ns(namespace).use_db(database).await?;

    // perform the migrations
    migrate(&client, env!("CARGO_PKG_VERSION"), MIGRATIONS).await?;
    // execute the up queries
    client
        .query(include_str!("./up.surrealql"))
        .await?
        .check()?;
    info!("Initiated tables");

    Ok(ConnectionInfo {
        connection: client,
        database: database.to_owned(),
        namespace: namespace.to_owned(),
    })
}

pub async fn migrate(
    client: &DatabaseConnection,
    current_version: &'static str,
    migrations: &[(&'static str, &'static str)],
) -> Result<()> {
    client
        .query(
            "DEFINE TABLE migration SCHEMALESS;
            DEFINE FIELD version     on TABLE migration TYPE string;
            DEFINE FIELD created_at  on TABLE migration VALUE $before OR time::now();",
        )
        .await?
        .check()?;
    // the last entry contains the last migrated version
    let last = client
        .query("SELECT version, created_at FROM migration ORDER BY created_at DESC LIMIT 1")
        .await?
        .check()?
        .take::<Option<String>>((0, "version"))?;

    let Some(last) = last else {
        // fresh database, nothing to migrate
        client
            .query("CREATE migration SET version = $version")
            .bind(("version", current_version))
            .await?
            .check()?;

        return Ok(());
    };

    if last.as_str().eq(current_version) {
        return Ok(());
    }

    let last_version =
        Version::from(last.as_str()).ok_or(ApplicationError::InternalServerError)?;
    let current = Version::from(current_version).ok_or(ApplicationError::InternalServerError)?;

    for (version, migration) in migrations {
        let target = Version::from(version).ok_or(ApplicationError::InternalServerError)?;
        if target.compare_to(&last_version, Cmp::Gt) && target.compare_to(&current, Cmp::Le) {
            info!("Executing surrealdb migration to {version}");
            client.query(*migration).await?.check()?;
        }
    }

    client
        .query("CREATE migration SET version = $version")
        .bind(("version", current_version))
        .await?
        .check()?;

    Ok(())
}

/// Awaits the given database request inside a tracing span.
#[macro_export]
macro_rules! sql_span {
    ($request: expr) => {{
        use tracing::Instrument;

        std::future::IntoFuture::into_future($request)
            .instrument(info_span!("Surrealdb Request"))
            .await
    }};
    ($request: expr, $title: expr) => {{
        use tracing::Instrument;

        std::future::IntoFuture::into_future($request)
            .instrument(info_span!(concat!("Surrealdb Request: ", $title)))
            .await
    }};
}

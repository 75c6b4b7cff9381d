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
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A document stored in its own table, versioned by a revision counter.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    const TABLE: &'static str;
    /// Human readable name used in not-found errors.
    const NAME: &'static str;

    fn record_id(&self) -> &Id;
    fn revision(&self) -> u64;
    fn set_revision(&mut self, revision: u64);
}

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn find(&self, id: &Id) -> Result<Option<T>>;

    async fn store(&self, record: &T) -> Result<()>;

    /// Writes the record only if nobody else saved it since it was loaded.
    /// On success the revision of `record` is advanced.
    async fn save(&self, record: &mut T) -> Result<()>;

    async fn remove(&self, id: &Id) -> Result<()>;

    async fn fetch(&self, id: &Id) -> Result<T> {
        self.find(id)
            .await?
            .ok_or(ApplicationError::NotFound(T::NAME.to_owned()))
    }
}

/// Converts a record into storable content. The id is carried by the record key.
pub fn to_content<T: Serialize>(record: &T) -> Result<serde_json::Value> {
    let mut content = serde_json::to_value(record)?;
    if let Some(object) = content.as_object_mut() {
        object.remove("id");
    }

    Ok(content)
}

#[async_trait]
impl<T: Record + 'static> Repository<T> for DatabaseConnection {
    #[instrument(skip(self))]
    async fn find(&self, id: &Id) -> Result<Option<T>> {
        let record: Option<T> = sql_span!(self
            .query("SELECT * FROM type::thing($table, $key)")
            .bind(("table", T::TABLE))
            .bind(("key", id.id.clone())))?
        .take(0)?;

        Ok(record)
    }

    #[instrument(skip_all)]
    async fn store(&self, record: &T) -> Result<()> {
        sql_span!(self
            .query("CREATE type::thing($table, $key) CONTENT $content RETURN NONE")
            .bind(("table", T::TABLE))
            .bind(("key", record.record_id().id.clone()))
            .bind(("content", to_content(record)?)))?
        .check()?;

        Ok(())
    }

    #[instrument(skip_all)]
    async fn save(&self, record: &mut T) -> Result<()> {
        let expected = record.revision();
        let key = record.record_id().id.clone();
        record.set_revision(expected + 1);

        let updated: Result<Vec<serde_json::Value>> = async {
            let content = to_content(record)?;

            Ok::<_, ApplicationError>(sql_span!(self
                .query(
                    "UPDATE type::thing($table, $key) CONTENT $content \
                     WHERE revision = $revision RETURN AFTER"
                )
                .bind(("table", T::TABLE))
                .bind(("key", key))
                .bind(("content", content))
                .bind(("revision", expected)))?
            .check()?
            .take::<Vec<serde_json::Value>>(0)?)
        }
        .await;

        match updated {
            Ok(updated) if !updated.is_empty() => Ok(()),
            Ok(_) => {
                record.set_revision(expected);
                warn!(
                    "Rejected stale write to {} at revision {expected}",
                    record.record_id()
                );

                Err(ApplicationError::Conflict(format!(
                    "{} was modified concurrently",
                    T::NAME
                )))
            }
            Err(error) => {
                record.set_revision(expected);
                Err(error)
            }
        }
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: &Id) -> Result<()> {
        sql_span!(self
            .query("DELETE type::thing($table, $key)")
            .bind(("table", T::TABLE))
            .bind(("key", id.id.clone())))?
        .check()?;

        Ok(())
    }
}

/// Runs a select against the table of `T` and returns all matching records.
#[instrument(skip(connection, bindings))]
pub async fn select_where<T: Record>(
    connection: &DatabaseConnection,
    condition: &str,
    order: &str,
    bindings: Vec<(&'static str, serde_json::Value)>,
) -> Result<Vec<T>> {
    let mut request = connection
        .query(format!(
            "SELECT * FROM type::table($table) WHERE {condition} ORDER BY {order}"
        ))
        .bind(("table", T::TABLE));
    for binding in bindings {
        request = request.bind(binding);
    }

    Ok(sql_span!(request)?.check()?.take::<Vec<T>>(0)?)
}

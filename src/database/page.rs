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

use crate::database::DatabaseConnection;
use crate::prelude::*;
use schemars::JsonSchema;
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::pin::Pin;

const MAX_PAGE_SIZE: u64 = 100;

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// the result
    pub data: Vec<T>,
    /// the total count of pages
    pub pages: u64,
    /// the total count of elements
    pub total: u64,
    /// the offset for the next page
    pub next_page_offset: u64,
}

impl<T> Page<T> {
    /// Converts the entries while keeping the paging information.
    pub fn map<R, F>(self, f: F) -> Page<R>
    where
        F: FnMut(T) -> R,
    {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pages: self.pages,
            total: self.total,
            next_page_offset: self.next_page_offset,
        }
    }
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PagingOptions {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl<'a> PagingOptions {
    /// Builds a paged select on the table of `T`. `condition` is a SurrealQL where clause.
    pub fn execute<T>(
        self,
        condition: Option<&'a str>,
        bindings: Vec<(&'static str, serde_json::Value)>,
        connection: &'a DatabaseConnection,
    ) -> PagingRequest<'a, T>
    where
        T: Record,
    {
        PagingRequest {
            options: self,
            condition,
            bindings,
            connection,
            response: PhantomData,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(ApplicationError::BadRequest(
                "page starts at 1".to_owned(),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ApplicationError::BadRequest(format!(
                "pageSize must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(())
    }
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

pub struct PagingRequest<'a, T>
where
    T: Record,
{
    pub options: PagingOptions,
    pub condition: Option<&'a str>,
    pub bindings: Vec<(&'static str, serde_json::Value)>,
    pub connection: &'a DatabaseConnection,
    response: PhantomData<T>,
}

impl<'a, T> IntoFuture for PagingRequest<'a, T>
where
    T: Record + 'a,
{
    type Output = Result<Page<T>>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            self.options.validate()?;

            let offset = (self.options.page - 1)
                .checked_mul(self.options.page_size)
                .filter(|offset| i64::try_from(*offset).is_ok())
                .ok_or(ApplicationError::BadRequest("page is out of range".to_owned()))?;
            let filter = self
                .condition
                .map(|condition| format!("WHERE {condition}"))
                .unwrap_or_default();
            let count_query = format!("SELECT count() FROM type::table($table) {filter} GROUP ALL");
            let query = format!(
                "SELECT * FROM type::table($table) {filter} ORDER BY createdAt DESC LIMIT {} START {offset}",
                self.options.page_size
            );

            // setup the database request
            let mut request = self
                .connection
                .query(count_query)
                .query(query)
                .bind(("table", T::TABLE));
            // apply the bindings
            for binding in self.bindings {
                request = request.bind(binding)
            }

            // process the request
            let mut response = sql_span!(request)?.check()?;
            // extract count
            let total = response
                .take::<Option<u64>>((0, "count"))?
                .unwrap_or_default();
            // parse the entries
            let data = response.take::<Vec<T>>(1)?;

            Ok(Page {
                data,
                pages: (total as f64 / self.options.page_size as f64).ceil() as u64,
                total,
                next_page_offset: offset.saturating_add(self.options.page_size),
            })
        })
    }
}

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

use crate::error::ApplicationError;
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

const ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

/// A record id in the form `table:key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    pub table: String,
    pub id: String,
}

impl TryFrom<(&str, &str)> for Id {
    type Error = ApplicationError;

    /// Accepts either a bare key or a full `table:key` id of the forced table.
    fn try_from((force, id): (&str, &str)) -> Result<Self, Self::Error> {
        let (table, key) = match id.split_once(':') {
            Some((table, key)) => (table, key),
            None => (force, id),
        };
        // for security reasons we can't allow every table
        if !table.eq(force) {
            return Err(ApplicationError::BadRequest(format!(
                "expected a {force} id"
            )));
        }

        let key = unescape(key);
        if key.is_empty() {
            return Err(ApplicationError::BadRequest("invalid id".to_owned()));
        }

        Ok(Self {
            table: table.to_string(),
            id: key,
        })
    }
}

impl Id {
    pub fn new((table, id): (&str, &str)) -> Self {
        Self {
            table: table.to_string(),
            id: id.to_string(),
        }
    }

    /// Generates a fresh random key for the given table.
    pub fn generate(table: &str) -> Self {
        Self::with_length(table, 20)
    }

    pub fn with_length(table: &str, length: usize) -> Self {
        Self {
            table: table.to_string(),
            id: nanoid::nanoid!(length, &ALPHABET),
        }
    }
}

// surrealdb escapes complex keys as ⟨key⟩ or `key`
fn unescape(key: &str) -> String {
    key.trim_start_matches(['⟨', '`'])
        .trim_end_matches(['⟩', '`'])
        .to_string()
}

fn parse<E: serde::de::Error>(value: &str) -> Result<Id, E> {
    let (table, key) = value
        .split_once(':')
        .ok_or(E::custom("Invalid id format"))?;

    Ok(Id {
        table: table.to_string(),
        id: unescape(key),
    })
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw_value = serde_json::value::Value::deserialize(deserializer)?;

        if let Some(string) = raw_value.as_str() {
            return parse(string);
        }

        // a surrealdb thing, either {tb, id: "key"} or {tb, id: {String: "key"}}
        if let Some(object) = raw_value.as_object() {
            let table = object
                .get("tb")
                .and_then(|table| table.as_str())
                .ok_or(serde::de::Error::custom("Invalid id format"))?;
            let key = match object.get("id") {
                Some(serde_json::Value::String(key)) => unescape(key),
                Some(serde_json::Value::Number(key)) => key.to_string(),
                Some(serde_json::Value::Object(inner)) => match inner.values().next() {
                    Some(serde_json::Value::String(key)) => unescape(key),
                    Some(serde_json::Value::Number(key)) => key.to_string(),
                    _ => return Err(serde::de::Error::custom("Invalid id format")),
                },
                _ => return Err(serde::de::Error::custom("Invalid id format")),
            };

            return Ok(Self {
                table: table.to_string(),
                id: key,
            });
        }

        Err(serde::de::Error::custom("Invalid datatype"))
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", &self.table, &self.id)
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

impl JsonSchema for Id {
    fn schema_name() -> String {
        "Id".to_owned()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            format: Some("string".to_string()),
            ..Default::default()
        }
        .into()
    }
}

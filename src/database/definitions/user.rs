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

use crate::database::repository::select_where;
use crate::prelude::*;
use chrono::{DateTime, Utc};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Points,
    Gift,
}

/// One entry of the append-only reward log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema, Getters)]
#[get = "pub"]
pub struct Reward {
    #[serde(rename = "type")]
    kind: RewardType,
    value: u64,
    description: String,
    timestamp: DateTime<Utc>,
}

/// How a completion moved the streak counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreakChange {
    Started,
    Continued,
    Reset,
    Unchanged,
}

impl StreakChange {
    pub fn advanced(&self) -> bool {
        !matches!(self, StreakChange::Unchanged)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Getters, MutGetters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct User {
    id: Id,
    name: String,
    email: String,
    password: String,
    role: Role,
    department: String,
    #[get_mut = "pub"]
    permissions: Vec<Permission>,
    reward_points: u64,
    current_streak: u32,
    last_task_completion: Option<DateTime<Utc>>,
    rewards: Vec<Reward>,
    #[serde(default)]
    revision: u64,
    #[serde(serialize_with = "crate::database::timestamp::serialize")]
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Record for User {
    const TABLE: &'static str = "user";
    const NAME: &'static str = "User";

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

impl User {
    /// Appends a points entry and raises the counter by the same amount.
    pub fn award(&mut self, points: u64, description: &str, now: DateTime<Utc>) {
        self.rewards.push(Reward {
            kind: RewardType::Points,
            value: points,
            description: description.to_owned(),
            timestamp: now,
        });
        self.reward_points += points;
        self.updated_at = now;
    }

    /// Appends a gift entry. Gifts never count towards the points.
    pub fn gift(&mut self, value: u64, description: &str, now: DateTime<Utc>) {
        self.rewards.push(Reward {
            kind: RewardType::Gift,
            value,
            description: description.to_owned(),
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// Moves the streak according to the calendar days (UTC) since the last completion.
    pub fn advance_streak(&mut self, now: DateTime<Utc>) -> StreakChange {
        let change = match self.last_task_completion {
            None => {
                self.current_streak = 1;
                StreakChange::Started
            }
            Some(last) => match (now.date_naive() - last.date_naive()).num_days() {
                1 => {
                    self.current_streak += 1;
                    StreakChange::Continued
                }
                days if days > 1 => {
                    self.current_streak = 1;
                    StreakChange::Reset
                }
                _ => StreakChange::Unchanged,
            },
        };

        self.last_task_completion = Some(now);
        self.updated_at = now;
        change
    }

    /// Changes the role and resets the permissions to the role defaults.
    pub fn change_role(&mut self, role: Role) {
        self.permissions = role.default_permissions();
        self.role = role;
        self.updated_at = Utc::now();
    }

    pub fn replace_permissions(&mut self, permissions: Vec<Permission>) {
        self.permissions = permissions.into_iter().fold(Vec::new(), |mut set, permission| {
            if !set.contains(&permission) {
                set.push(permission);
            }
            set
        });
        self.updated_at = Utc::now();
    }

    /// Sum of all points entries in the reward log.
    pub fn logged_points(&self) -> u64 {
        self.rewards
            .iter()
            .filter(|reward| reward.kind == RewardType::Points)
            .map(|reward| reward.value)
            .sum()
    }

    #[instrument(skip(connection))]
    pub async fn find_by_email(
        email: &str,
        connection: &DatabaseConnection,
    ) -> Result<Option<User>> {
        let mut users: Vec<User> = select_where(
            connection,
            "email = $email",
            "createdAt ASC",
            vec![("email", json!(email.to_lowercase()))],
        )
        .await?;

        Ok(users.pop())
    }

    #[instrument(skip(connection))]
    pub async fn admins(connection: &DatabaseConnection) -> Result<Vec<User>> {
        select_where(
            connection,
            "role = $role",
            "createdAt ASC",
            vec![("role", json!(Role::Admin))],
        )
        .await
    }

    /// The users with the most points, best first.
    #[instrument(skip(connection))]
    pub async fn leaderboard(limit: u64, connection: &DatabaseConnection) -> Result<Vec<User>> {
        Ok(sql_span!(connection.query(format!(
            "SELECT * FROM user ORDER BY rewardPoints DESC LIMIT {limit}"
        )))?
        .check()?
        .take::<Vec<User>>(0)?)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// The user as returned by the api, without credentials.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    pub permissions: Vec<Permission>,
    pub reward_points: u64,
    pub current_streak: u32,
    pub last_task_completion: Option<DateTime<Utc>>,
    #[serde(serialize_with = "crate::database::timestamp::serialize")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            department: user.department.clone(),
            permissions: user.permissions.clone(),
            reward_points: user.reward_points,
            current_streak: user.current_streak,
            last_task_completion: user.last_task_completion,
            created_at: user.created_at,
        }
    }
}

#[derive(Clone, Debug, Getters, Setters)]
pub struct WriteUser<'a> {
    #[get = "pub"]
    #[set = "pub"]
    name: Option<&'a str>,
    #[get = "pub"]
    #[set = "pub"]
    email: Option<&'a str>,
    #[set = "pub"]
    password: Option<&'a str>,
    #[get = "pub"]
    #[set = "pub"]
    department: Option<&'a str>,
    /// Without a role the first user becomes admin and every later one an employee.
    #[get = "pub"]
    #[set = "pub"]
    role: Option<Role>,
    connection: &'a DatabaseConnection,
}

impl<'a> From<&'a DatabaseConnection> for WriteUser<'a> {
    fn from(connection: &'a DatabaseConnection) -> Self {
        Self {
            name: None,
            email: None,
            password: None,
            department: None,
            role: None,
            connection,
        }
    }
}

impl<'a> IntoFuture for WriteUser<'a> {
    type Output = Result<User>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let name = required("name", self.name)?;
            let email = required("email", self.email)?.to_lowercase();
            let password = required("password", self.password)?;
            if !email.contains('@') {
                return Err(ApplicationError::BadRequest("invalid email".to_owned()));
            }
            if password.chars().count() < MIN_PASSWORD_LENGTH {
                return Err(ApplicationError::BadRequest(format!(
                    "password needs at least {MIN_PASSWORD_LENGTH} characters"
                )));
            }

            if User::find_by_email(email.as_str(), self.connection)
                .await?
                .is_some()
            {
                return Err(ApplicationError::Conflict(
                    "email is already registered".to_owned(),
                ));
            }

            let role = match self.role {
                Some(role) => role,
                None => {
                    let count = sql_span!(self
                        .connection
                        .query("SELECT count() FROM user GROUP ALL"))?
                    .take::<Option<u64>>((0, "count"))?
                    .unwrap_or_default();

                    if count == 0 {
                        Role::Admin
                    } else {
                        Role::Employee
                    }
                }
            };

            let now = Utc::now();
            let user = User {
                id: Id::generate(User::TABLE),
                name: name.to_owned(),
                email,
                password: crate::auth::hash_password(password)?,
                role,
                department: self.department.unwrap_or_default().to_owned(),
                permissions: role.default_permissions(),
                reward_points: 0,
                current_streak: 0,
                last_task_completion: None,
                rewards: Vec::new(),
                revision: 0,
                created_at: now,
                updated_at: now,
            };
            self.connection.store(&user).await?;
            info!("Registered user {} as {}", user.id, user.role);

            Ok(user)
        })
    }
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ApplicationError::BadRequest(format!("{field} is required"))),
    }
}

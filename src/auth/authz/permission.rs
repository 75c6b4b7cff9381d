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
use strum::IntoEnumIterator;

/// Capability tags held by a user.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    JsonSchema,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum Permission {
    #[serde(rename = "project.create")]
    #[strum(serialize = "project.create")]
    ProjectCreate,
    #[serde(rename = "project.manage")]
    #[strum(serialize = "project.manage")]
    ProjectManage,
    #[serde(rename = "task.create")]
    #[strum(serialize = "task.create")]
    TaskCreate,
    #[serde(rename = "task.manage")]
    #[strum(serialize = "task.manage")]
    TaskManage,
    #[serde(rename = "user.view")]
    #[strum(serialize = "user.view")]
    UserView,
    #[serde(rename = "user.manage")]
    #[strum(serialize = "user.manage")]
    UserManage,
    #[serde(rename = "reward.grant")]
    #[strum(serialize = "reward.grant")]
    RewardGrant,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    JsonSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    Designer,
    ProjectManager,
    SalesRepresentative,
    Employee,
}

impl Role {
    /// The permissions a user of this role starts with.
    pub fn default_permissions(&self) -> Vec<Permission> {
        match self {
            Role::Admin => Permission::iter().collect(),
            Role::ProjectManager => vec![
                Permission::ProjectCreate,
                Permission::ProjectManage,
                Permission::TaskCreate,
                Permission::TaskManage,
                Permission::UserView,
            ],
            Role::SalesRepresentative => vec![Permission::ProjectCreate, Permission::UserView],
            Role::Designer | Role::Employee => vec![Permission::TaskCreate],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_permission_names() {
        assert_eq!("task.create", Permission::TaskCreate.to_string());
        assert_eq!(
            Permission::RewardGrant,
            Permission::from_str("reward.grant").unwrap()
        );
        assert_eq!(json!("user.manage"), json!(Permission::UserManage));
        assert_eq!(
            Permission::ProjectManage,
            serde_json::from_value::<Permission>(json!("project.manage")).unwrap()
        );
    }

    #[test]
    fn test_role_defaults() {
        assert_eq!(7, Role::Admin.default_permissions().len());
        assert!(Role::Employee
            .default_permissions()
            .contains(&Permission::TaskCreate));
        assert!(!Role::Employee
            .default_permissions()
            .contains(&Permission::ProjectCreate));
        assert_eq!(json!("project_manager"), json!(Role::ProjectManager));
        assert_eq!("sales_representative", Role::SalesRepresentative.to_string());
    }
}

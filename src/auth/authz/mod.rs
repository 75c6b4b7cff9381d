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

use crate::database::definitions::user::User;
use crate::prelude::*;

pub mod permission;

pub trait Authorize {
    fn is_admin(&self) -> bool;

    fn has_permission(&self, permission: Permission) -> bool;

    /// Fails with `Forbidden` unless the permission is held.
    fn require(&self, permission: Permission) -> Result<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ApplicationError::Forbidden(format!(
                "missing permission {permission}"
            )))
        }
    }
}

impl Authorize for User {
    fn is_admin(&self) -> bool {
        matches!(self.role(), Role::Admin)
    }

    #[instrument(skip(self), fields(user = %self.id()))]
    fn has_permission(&self, permission: Permission) -> bool {
        // admins implicitly hold everything
        self.is_admin() || self.permissions().contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::definitions::user::tests::user_with_role;

    #[test]
    fn test_admin_holds_everything() {
        let mut admin = user_with_role(Role::Admin);
        admin.permissions_mut().clear();

        assert!(admin.is_admin());
        assert!(admin.require(Permission::RewardGrant).is_ok());
    }

    #[test]
    fn test_employee_permissions() {
        let employee = user_with_role(Role::Employee);

        assert!(!employee.is_admin());
        assert!(employee.require(Permission::TaskCreate).is_ok());
        assert!(matches!(
            employee.require(Permission::UserManage),
            Err(ApplicationError::Forbidden(_))
        ));
    }
}

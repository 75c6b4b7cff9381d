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

use crate::database::definitions::task::Task;
use crate::database::definitions::user::User;
use crate::prelude::*;
use chrono::{DateTime, Utc};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionStatus {
    Pending,
    Approved,
    Rejected,
}

/// A due date extension proposed by the assignee. Only the latest one is kept.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default, JsonSchema, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct ExtensionRequest {
    requested: bool,
    status: Option<ExtensionStatus>,
    requested_by: Option<Id>,
    requested_at: Option<DateTime<Utc>>,
    reason: Option<String>,
    new_due_date: Option<DateTime<Utc>>,
    approved_by: Option<Id>,
    approved_at: Option<DateTime<Utc>>,
}

impl ExtensionRequest {
    pub fn is_pending(&self) -> bool {
        self.requested && self.status == Some(ExtensionStatus::Pending)
    }
}

impl Task {
    #[instrument(skip(self, actor, reason), fields(task = %self.id))]
    pub fn open_extension(
        &mut self,
        actor: &Id,
        reason: &str,
        new_due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if actor != &self.assigned_to {
            return Err(ApplicationError::Forbidden(
                "only the assignee may request an extension".to_owned(),
            ));
        }
        self.ensure_open()?;
        if self.extension_request.is_pending() {
            return Err(ApplicationError::Conflict(
                "an extension request is already pending".to_owned(),
            ));
        }
        if reason.trim().is_empty() {
            return Err(ApplicationError::BadRequest("reason is required".to_owned()));
        }
        if new_due_date <= self.due_date {
            return Err(ApplicationError::BadRequest(
                "the new due date has to be later than the current one".to_owned(),
            ));
        }

        // a resolved request gets replaced
        self.extension_request = ExtensionRequest {
            requested: true,
            status: Some(ExtensionStatus::Pending),
            requested_by: Some(actor.clone()),
            requested_at: Some(now),
            reason: Some(reason.to_owned()),
            new_due_date: Some(new_due_date),
            approved_by: None,
            approved_at: None,
        };
        self.updated_at = now;

        Ok(())
    }

    /// Approval moves the due date, rejection keeps it.
    #[instrument(skip(self, resolver), fields(task = %self.id))]
    pub fn resolve_extension(
        &mut self,
        resolver: &User,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<ExtensionStatus> {
        if !resolver.is_admin() {
            return Err(ApplicationError::Forbidden(
                "only admins may resolve extension requests".to_owned(),
            ));
        }
        self.ensure_open()?;
        if !self.extension_request.is_pending() {
            return Err(ApplicationError::Conflict(
                "there is no pending extension request".to_owned(),
            ));
        }

        let status = if approve {
            if let Some(new_due_date) = self.extension_request.new_due_date {
                self.due_date = new_due_date;
            }
            ExtensionStatus::Approved
        } else {
            ExtensionStatus::Rejected
        };

        self.extension_request.status = Some(status);
        self.extension_request.approved_by = Some(resolver.id().clone());
        self.extension_request.approved_at = Some(now);
        self.updated_at = now;

        Ok(status)
    }
}

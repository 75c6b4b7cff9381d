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
use chrono::{DateTime, Utc};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default, JsonSchema)]
pub struct Client {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Document {
    name: String,
    url: String,
    uploaded_by: Id,
    uploaded_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Milestone {
    title: String,
    description: String,
    due_date: Option<DateTime<Utc>>,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub client: Client,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub team: Vec<Id>,
    /// Defaults to the creator.
    pub project_manager: Option<Id>,
}

#[derive(Deserialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub client: Option<Client>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<f64>,
    pub project_manager: Option<Id>,
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Project {
    id: Id,
    name: String,
    description: String,
    client: Client,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    status: ProjectStatus,
    budget: f64,
    team: Vec<Id>,
    project_manager: Id,
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    milestones: Vec<Milestone>,
    created_by: Id,
    #[serde(default)]
    revision: u64,
    #[serde(serialize_with = "crate::database::timestamp::serialize")]
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Record for Project {
    const TABLE: &'static str = "project";
    const NAME: &'static str = "Project";

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

fn validate_dates(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ApplicationError::BadRequest(
            "the end date has to be after the start date".to_owned(),
        )),
        _ => Ok(()),
    }
}

fn validate_budget(budget: f64) -> Result<()> {
    if budget.is_finite() && budget >= 0.0 {
        Ok(())
    } else {
        Err(ApplicationError::BadRequest(
            "budget has to be a positive number".to_owned(),
        ))
    }
}

impl Project {
    pub fn new(draft: ProjectDraft, created_by: Id, now: DateTime<Utc>) -> Result<Self> {
        if draft.name.trim().is_empty() {
            return Err(ApplicationError::BadRequest("name is required".to_owned()));
        }
        validate_dates(draft.start_date, draft.end_date)?;
        validate_budget(draft.budget)?;

        let mut project = Self {
            id: Id::generate(Project::TABLE),
            name: draft.name.trim().to_owned(),
            description: draft.description,
            client: draft.client,
            start_date: draft.start_date,
            end_date: draft.end_date,
            status: ProjectStatus::Planning,
            budget: draft.budget,
            team: Vec::new(),
            project_manager: draft.project_manager.unwrap_or_else(|| created_by.clone()),
            documents: Vec::new(),
            milestones: Vec::new(),
            created_by,
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        for member in draft.team {
            project.add_member(member, now);
        }

        Ok(project)
    }

    /// Team members and the project manager.
    pub fn is_member(&self, user: &Id) -> bool {
        &self.project_manager == user || self.team.contains(user)
    }

    /// Whether the user may modify the project and its team.
    pub fn can_manage(&self, user: &User) -> bool {
        user.has_permission(Permission::ProjectManage) || &self.project_manager == user.id()
    }

    pub fn edit(&mut self, edit: ProjectEdit, now: DateTime<Utc>) -> Result<()> {
        validate_dates(
            edit.start_date.or(self.start_date),
            edit.end_date.or(self.end_date),
        )?;
        if let Some(budget) = edit.budget {
            validate_budget(budget)?;
            self.budget = budget;
        }
        if let Some(name) = edit.name {
            if name.trim().is_empty() {
                return Err(ApplicationError::BadRequest("name is required".to_owned()));
            }
            self.name = name.trim().to_owned();
        }
        if let Some(description) = edit.description {
            self.description = description;
        }
        if let Some(client) = edit.client {
            self.client = client;
        }
        if edit.start_date.is_some() {
            self.start_date = edit.start_date;
        }
        if edit.end_date.is_some() {
            self.end_date = edit.end_date;
        }
        if let Some(status) = edit.status {
            self.status = status;
        }
        if let Some(project_manager) = edit.project_manager {
            self.project_manager = project_manager;
        }
        self.updated_at = now;

        Ok(())
    }

    /// Returns false if the user already was on the team.
    pub fn add_member(&mut self, user: Id, now: DateTime<Utc>) -> bool {
        if self.team.contains(&user) {
            return false;
        }

        self.team.push(user);
        self.updated_at = now;
        true
    }

    pub fn remove_member(&mut self, user: &Id, now: DateTime<Utc>) -> Result<()> {
        let before = self.team.len();
        self.team.retain(|member| member != user);
        if before == self.team.len() {
            return Err(ApplicationError::NotFound("Team member".to_owned()));
        }
        self.updated_at = now;

        Ok(())
    }

    pub fn add_document(&mut self, name: &str, url: &str, uploaded_by: Id, now: DateTime<Utc>) {
        self.documents.push(Document {
            name: name.to_owned(),
            url: url.to_owned(),
            uploaded_by,
            uploaded_at: now,
        });
        self.updated_at = now;
    }

    pub fn add_milestone(&mut self, draft: MilestoneDraft, now: DateTime<Utc>) -> Result<()> {
        if draft.title.trim().is_empty() {
            return Err(ApplicationError::BadRequest("title is required".to_owned()));
        }

        self.milestones.push(Milestone {
            title: draft.title,
            description: draft.description,
            due_date: draft.due_date,
            completed: false,
            completed_at: None,
        });
        self.updated_at = now;

        Ok(())
    }

    pub fn complete_milestone(&mut self, index: usize, now: DateTime<Utc>) -> Result<()> {
        let milestone = self
            .milestones
            .get_mut(index)
            .ok_or(ApplicationError::NotFound("Milestone".to_owned()))?;
        if milestone.completed {
            return Err(ApplicationError::Conflict(
                "milestone is already completed".to_owned(),
            ));
        }

        milestone.completed = true;
        milestone.completed_at = Some(now);
        self.updated_at = now;

        Ok(())
    }
}

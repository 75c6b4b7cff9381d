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

use crate::database::definitions::task::extension::ExtensionRequest;
use crate::prelude::*;
use chrono::{DateTime, Utc};

pub mod extension;

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
}

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Comment {
    author: Id,
    text: String,
    #[serde(serialize_with = "crate::database::timestamp::serialize")]
    created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Attachment {
    name: String,
    url: String,
    uploaded_by: Id,
    uploaded_at: DateTime<Utc>,
}

/// The writable fields of a new task.
#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub project: Id,
    pub assigned_to: Id,
    #[serde(default = "default_priority")]
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
}

fn default_priority() -> TaskPriority {
    TaskPriority::Medium
}

/// Partial update of a task. Absent fields stay untouched.
#[derive(Deserialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Id>,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Task {
    id: Id,
    title: String,
    description: String,
    project: Id,
    assigned_to: Id,
    status: TaskStatus,
    priority: TaskPriority,
    due_date: DateTime<Utc>,
    completion_date: Option<DateTime<Utc>>,
    is_completed_on_time: bool,
    reward_points: u64,
    created_by: Id,
    #[serde(default)]
    extension_request: ExtensionRequest,
    #[serde(default)]
    comments: Vec<Comment>,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    revision: u64,
    #[serde(serialize_with = "crate::database::timestamp::serialize")]
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Record for Task {
    const TABLE: &'static str = "task";
    const NAME: &'static str = "Task";

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

impl Task {
    pub fn new(draft: TaskDraft, created_by: Id, now: DateTime<Utc>) -> Result<Self> {
        if draft.title.trim().is_empty() {
            return Err(ApplicationError::BadRequest("title is required".to_owned()));
        }

        Ok(Self {
            id: Id::generate(Task::TABLE),
            title: draft.title.trim().to_owned(),
            description: draft.description,
            project: draft.project,
            assigned_to: draft.assigned_to,
            status: TaskStatus::Pending,
            priority: draft.priority,
            due_date: draft.due_date,
            completion_date: None,
            is_completed_on_time: false,
            reward_points: 0,
            created_by,
            extension_request: ExtensionRequest::default(),
            comments: Vec::new(),
            attachments: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_completed() {
            Err(ApplicationError::Conflict(
                "task is already completed".to_owned(),
            ))
        } else {
            Ok(())
        }
    }

    /// Marks the task as completed. The outcome fields are written only here.
    pub fn complete(&mut self, now: DateTime<Utc>, on_time: bool, points: u64) -> Result<()> {
        self.ensure_open()?;

        self.status = TaskStatus::Completed;
        self.completion_date = Some(now);
        self.is_completed_on_time = on_time;
        self.reward_points = points;
        self.updated_at = now;

        Ok(())
    }

    /// Moves the task to any status except completed.
    pub fn transition(&mut self, status: TaskStatus, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        if status == TaskStatus::Completed {
            return Err(ApplicationError::BadRequest(
                "completion has to be requested through the status endpoint".to_owned(),
            ));
        }

        self.status = status;
        self.updated_at = now;

        Ok(())
    }

    pub fn edit(&mut self, edit: TaskEdit, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;

        if let Some(title) = edit.title {
            if title.trim().is_empty() {
                return Err(ApplicationError::BadRequest("title is required".to_owned()));
            }
            self.title = title.trim().to_owned();
        }
        if let Some(description) = edit.description {
            self.description = description;
        }
        if let Some(priority) = edit.priority {
            self.priority = priority;
        }
        if let Some(due_date) = edit.due_date {
            self.due_date = due_date;
        }
        if let Some(assigned_to) = edit.assigned_to {
            self.assigned_to = assigned_to;
        }
        self.updated_at = now;

        Ok(())
    }

    pub fn comment(&mut self, author: Id, text: &str, now: DateTime<Utc>) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ApplicationError::BadRequest("text is required".to_owned()));
        }

        self.comments.push(Comment {
            author,
            text: text.to_owned(),
            created_at: now,
        });
        self.updated_at = now;

        Ok(())
    }

    pub fn attach(&mut self, name: &str, url: &str, uploaded_by: Id, now: DateTime<Utc>) {
        self.attachments.push(Attachment {
            name: name.to_owned(),
            url: url.to_owned(),
            uploaded_by,
            uploaded_at: now,
        });
        self.updated_at = now;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub fn task(assigned_to: &Id, priority: TaskPriority, due_date: DateTime<Utc>) -> Task {
        Task::new(
            TaskDraft {
                title: "Design the landing page".to_owned(),
                description: String::new(),
                project: Id::generate("project"),
                assigned_to: assigned_to.clone(),
                priority,
                due_date,
            },
            Id::generate("user"),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_complete_is_terminal() {
        let now = Utc::now();
        let mut task = task(&Id::generate("user"), TaskPriority::High, now);

        task.complete(now, true, 80).unwrap();
        assert_eq!(TaskStatus::Completed, *task.status());
        assert_eq!(80, *task.reward_points());
        assert_eq!(Some(now), *task.completion_date());

        let later = now + Duration::hours(1);
        assert!(matches!(
            task.complete(later, false, 0),
            Err(ApplicationError::Conflict(_))
        ));
        assert!(matches!(
            task.transition(TaskStatus::Pending, later),
            Err(ApplicationError::Conflict(_))
        ));
        assert!(matches!(
            task.edit(TaskEdit::default(), later),
            Err(ApplicationError::Conflict(_))
        ));
        // the outcome stays untouched
        assert_eq!(80, *task.reward_points());
        assert!(*task.is_completed_on_time());
        assert_eq!(Some(now), *task.completion_date());
    }

    #[test]
    fn test_transition() {
        let now = Utc::now();
        let mut task = task(&Id::generate("user"), TaskPriority::Low, now);

        task.transition(TaskStatus::InProgress, now).unwrap();
        task.transition(TaskStatus::Overdue, now).unwrap();
        task.transition(TaskStatus::InProgress, now).unwrap();
        assert_eq!(TaskStatus::InProgress, *task.status());

        assert!(matches!(
            task.transition(TaskStatus::Completed, now),
            Err(ApplicationError::BadRequest(_))
        ));
    }

    #[test]
    fn test_edit_and_logs() {
        let now = Utc::now();
        let user = Id::generate("user");
        let mut task = task(&user, TaskPriority::Low, now);

        task.edit(
            TaskEdit {
                title: Some("Renamed".to_owned()),
                priority: Some(TaskPriority::Urgent),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        assert_eq!("Renamed", task.title().as_str());
        assert_eq!(TaskPriority::Urgent, *task.priority());

        task.comment(user.clone(), "looks good", now).unwrap();
        assert!(task.comment(user.clone(), "  ", now).is_err());
        task.attach("draft.pdf", "https://files.test/draft.pdf", user, now);
        assert_eq!(1, task.comments().len());
        assert_eq!(1, task.attachments().len());
    }

    #[test]
    fn test_serialized_names() {
        let task = task(&Id::generate("user"), TaskPriority::Urgent, Utc::now());
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(json!("pending"), value["status"]);
        assert_eq!(json!("urgent"), value["priority"]);
        assert!(value.get("assignedTo").is_some());
        assert!(value.get("isCompletedOnTime").is_some());
        assert_eq!(json!(false), value["extensionRequest"]["requested"]);
    }
}

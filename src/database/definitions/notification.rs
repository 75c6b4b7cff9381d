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
use chrono::{DateTime, Utc};

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskStatusChanged,
    TaskCompleted,
    TaskCommented,
    ExtensionRequested,
    ExtensionApproved,
    ExtensionRejected,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Notification {
    id: Id,
    recipient: Id,
    actor: Id,
    task: Option<Id>,
    #[serde(rename = "type")]
    kind: NotificationType,
    message: String,
    is_read: bool,
    #[serde(default)]
    revision: u64,
    #[serde(serialize_with = "crate::database::timestamp::serialize")]
    created_at: DateTime<Utc>,
}

impl Record for Notification {
    const TABLE: &'static str = "notification";
    const NAME: &'static str = "Notification";

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

impl Notification {
    pub fn new(
        recipient: Id,
        actor: Id,
        task: Option<Id>,
        kind: NotificationType,
        message: String,
    ) -> Self {
        Self {
            id: Id::generate(Notification::TABLE),
            recipient,
            actor,
            task,
            kind,
            message,
            is_read: false,
            revision: 0,
            created_at: Utc::now(),
        }
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
    }

    /// Writes one notification per distinct recipient, skipping the actor.
    /// Failures are logged and never returned. Returns the count of written notifications.
    #[instrument(skip(repository, recipients, message))]
    pub async fn dispatch<'a>(
        repository: &dyn Repository<Notification>,
        recipients: impl IntoIterator<Item = &'a Id>,
        actor: &Id,
        task: Option<&Id>,
        kind: NotificationType,
        message: &str,
    ) -> usize {
        let mut delivered: Vec<&Id> = Vec::new();
        for recipient in recipients {
            if recipient == actor || delivered.contains(&recipient) {
                continue;
            }

            let notification = Notification::new(
                recipient.clone(),
                actor.clone(),
                task.cloned(),
                kind,
                message.to_owned(),
            );
            match repository.store(&notification).await {
                Ok(_) => delivered.push(recipient),
                Err(error) => warn!("Failed to notify {recipient} about {kind}: {error}"),
            }
        }

        delivered.len()
    }

    /// Marks every unread notification of the recipient as read.
    #[instrument(skip(connection))]
    pub async fn mark_all_read(recipient: &Id, connection: &DatabaseConnection) -> Result<usize> {
        let updated = sql_span!(connection
            .query(
                "UPDATE notification SET isRead = true, revision += 1 \
                 WHERE recipient = $recipient AND isRead = false RETURN AFTER"
            )
            .bind(("recipient", recipient.to_string())))?
        .check()?
        .take::<Vec<serde_json::Value>>(0)?;

        Ok(updated.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::select_where;

    #[tokio::test]
    async fn test_dispatch_skips_actor_and_duplicates() -> Result<()> {
        let connection = crate::database::connect_in_memory().await?.connection;
        let actor = Id::generate("user");
        let recipient = Id::generate("user");
        let task = Id::generate("task");

        let count = Notification::dispatch(
            &connection,
            [&recipient, &actor, &recipient],
            &actor,
            Some(&task),
            NotificationType::TaskCommented,
            "New comment",
        )
        .await;
        assert_eq!(1, count);

        let stored: Vec<Notification> = select_where(
            &connection,
            "recipient = $recipient",
            "createdAt DESC",
            vec![("recipient", json!(recipient))],
        )
        .await?;
        assert_eq!(1, stored.len());
        assert_eq!(NotificationType::TaskCommented, *stored[0].kind());
        assert_eq!(Some(task), *stored[0].task());
        assert!(!*stored[0].is_read());

        Ok(())
    }

    #[tokio::test]
    async fn test_mark_all_read() -> Result<()> {
        let connection = crate::database::connect_in_memory().await?.connection;
        let actor = Id::generate("user");
        let recipient = Id::generate("user");
        let other = Id::generate("user");

        for _ in 0..3 {
            Notification::dispatch(
                &connection,
                [&recipient, &other],
                &actor,
                None,
                NotificationType::TaskAssigned,
                "New task",
            )
            .await;
        }

        assert_eq!(3, Notification::mark_all_read(&recipient, &connection).await?);
        assert_eq!(0, Notification::mark_all_read(&recipient, &connection).await?);

        let unread: Vec<Notification> = select_where(
            &connection,
            "recipient = $recipient AND isRead = false",
            "createdAt DESC",
            vec![("recipient", json!(other))],
        )
        .await?;
        assert_eq!(3, unread.len());

        Ok(())
    }

    #[test]
    fn test_serialized_names() {
        let notification = Notification::new(
            Id::generate("user"),
            Id::generate("user"),
            None,
            NotificationType::ExtensionApproved,
            "approved".to_owned(),
        );
        let value = serde_json::to_value(&notification).unwrap();

        assert_eq!(json!("extension_approved"), value["type"]);
        assert_eq!(json!(false), value["isRead"]);
    }
}

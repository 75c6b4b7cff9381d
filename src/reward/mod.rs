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

pub mod rules;

/// Saves of the assignee per completion before a concurrent change is reported.
const MAX_SAVE_ATTEMPTS: usize = 3;

/// The outcome of a completion as reported to the caller.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub task: Task,
    /// points for the task itself
    pub points_earned: u64,
    /// streak bonus awarded with this completion
    pub bonus_points: u64,
    /// the assignee's points after the completion
    pub total_points: u64,
    pub current_streak: u32,
    pub is_completed_on_time: bool,
}

/// Computes and persists the rewards of a task completion.
pub struct RewardEngine<'a> {
    tasks: &'a dyn Repository<Task>,
    users: &'a dyn Repository<User>,
}

impl<'a> RewardEngine<'a> {
    pub fn new(tasks: &'a dyn Repository<Task>, users: &'a dyn Repository<User>) -> Self {
        Self { tasks, users }
    }

    /// Completes the task and rewards its assignee.
    ///
    /// The task is saved before the user. If the user changed in between, it is
    /// reloaded and rewarded again, up to [`MAX_SAVE_ATTEMPTS`] saves. Any other
    /// failing user save is returned as is and the completed task stays committed.
    #[instrument(skip(self))]
    pub async fn complete(&self, task_id: &Id, now: DateTime<Utc>) -> Result<Completion> {
        let mut task = self.tasks.fetch(task_id).await?;
        if task.is_completed() {
            return Err(ApplicationError::Conflict(
                "task is already completed".to_owned(),
            ));
        }

        let on_time = rules::is_on_time(*task.due_date(), now);
        let assignee: Option<User> = self.users.find(task.assigned_to()).await?;
        if assignee.is_none() {
            error!(
                "Assignee {} of task {} does not exist, completing without reward",
                task.assigned_to(),
                task.id()
            );
        }

        let points = match (&assignee, on_time) {
            (Some(_), true) => rules::completion_reward(*task.priority()),
            _ => 0,
        };
        task.complete(now, on_time, points)?;
        self.tasks.save(&mut task).await?;

        let Some(user) = assignee else {
            return Ok(Completion {
                task,
                points_earned: 0,
                bonus_points: 0,
                total_points: 0,
                current_streak: 0,
                is_completed_on_time: on_time,
            });
        };

        // late completions don't touch the user
        if !on_time {
            info!("Task {} completed late", task.id());

            return Ok(Completion {
                task,
                points_earned: 0,
                bonus_points: 0,
                total_points: *user.reward_points(),
                current_streak: *user.current_streak(),
                is_completed_on_time: false,
            });
        }

        let (user, bonus) = match self.reward_assignee(user, points, &task, now).await {
            Ok(rewarded) => rewarded,
            Err(error) => {
                error!(
                    "Task {} is completed but rewarding {} failed: {}",
                    task.id(),
                    task.assigned_to(),
                    error
                );
                return Err(error);
            }
        };
        let streak = *user.current_streak();
        info!(
            "Awarded {} points to {} for task {} (streak {streak})",
            points + bonus.unwrap_or_default(),
            user.id(),
            task.id()
        );

        Ok(Completion {
            task,
            points_earned: points,
            bonus_points: bonus.unwrap_or_default(),
            total_points: *user.reward_points(),
            current_streak: streak,
            is_completed_on_time: true,
        })
    }

    /// Applies points, streak and bonus to the user and saves it. Returns the saved user and the bonus.
    async fn reward_assignee(
        &self,
        mut user: User,
        points: u64,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Result<(User, Option<u64>)> {
        let description = format!("Completed task \"{}\"", task.title());
        let mut attempt = 1;

        loop {
            user.award(points, description.as_str(), now);
            let advanced = user.advance_streak(now).advanced();
            let streak = *user.current_streak();
            let bonus = if advanced {
                rules::streak_bonus(streak)
            } else {
                None
            };
            if let Some(bonus) = bonus {
                user.award(bonus, format!("{streak} day streak").as_str(), now);
            }

            match self.users.save(&mut user).await {
                Ok(()) => return Ok((user, bonus)),
                Err(ApplicationError::Conflict(_)) if attempt < MAX_SAVE_ATTEMPTS => {
                    warn!(
                        "{} changed while rewarding task {}, reloading (attempt {attempt})",
                        user.id(),
                        task.id()
                    );
                    attempt += 1;
                    let id = user.id().clone();
                    user = self.users.fetch(&id).await?;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

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

use crate::database::definitions::task::TaskPriority;
use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Points every on-time completion is worth before the priority bonus.
pub const BASE_REWARD: u64 = 50;
/// A streak bonus is paid on every multiple of this.
pub const STREAK_MILESTONE: u32 = 10;
pub const STREAK_BONUS_PER_DAY: u64 = 100;

/// The last instant of the due date's UTC calendar day.
pub fn end_of_day(due: DateTime<Utc>) -> DateTime<Utc> {
    due.date_naive().and_time(NaiveTime::MIN).and_utc() + Duration::days(1)
        - Duration::milliseconds(1)
}

pub fn is_on_time(due: DateTime<Utc>, completed_at: DateTime<Utc>) -> bool {
    completed_at <= end_of_day(due)
}

pub fn priority_bonus(priority: TaskPriority) -> u64 {
    match priority {
        TaskPriority::Urgent => 50,
        TaskPriority::High => 30,
        TaskPriority::Medium => 20,
        TaskPriority::Low => 10,
    }
}

pub fn completion_reward(priority: TaskPriority) -> u64 {
    BASE_REWARD + priority_bonus(priority)
}

pub fn streak_bonus(streak: u32) -> Option<u64> {
    if streak > 0 && streak % STREAK_MILESTONE == 0 {
        Some(streak as u64 * STREAK_BONUS_PER_DAY)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_end_of_day() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let end = end_of_day(due);

        assert_eq!(
            Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap() + Duration::milliseconds(999),
            end
        );
        assert!(is_on_time(due, end));
        assert!(is_on_time(due, due - Duration::days(3)));
        assert!(!is_on_time(due, end + Duration::milliseconds(1)));
    }

    #[test]
    fn test_completion_reward() {
        assert_eq!(100, completion_reward(TaskPriority::Urgent));
        assert_eq!(80, completion_reward(TaskPriority::High));
        assert_eq!(70, completion_reward(TaskPriority::Medium));
        assert_eq!(60, completion_reward(TaskPriority::Low));
    }

    #[test]
    fn test_streak_bonus() {
        assert_eq!(None, streak_bonus(0));
        assert_eq!(None, streak_bonus(9));
        assert_eq!(Some(1000), streak_bonus(10));
        assert_eq!(None, streak_bonus(11));
        assert_eq!(Some(3000), streak_bonus(30));
    }
}

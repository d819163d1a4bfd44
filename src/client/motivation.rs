//! Daily motivation messages

use chrono::{Datelike, NaiveDate};

pub const MOTIVATIONS: [&str; 20] = [
    "Showing up every day is its own kind of strength.",
    "The small things you fix today save someone a headache tomorrow.",
    "Steady hands build the things that last.",
    "Nobody notices a well-run house. That's the point, and it's yours.",
    "Good days are built one ordinary morning at a time.",
    "You don't have to win the day. Just don't give it away.",
    "Patience with people is a skill, and you've practised it plenty.",
    "The example you set is louder than anything you say.",
    "Take the long way home if it clears your head.",
    "A plan and a cup of coffee beat most problems.",
    "You've handled harder weeks than this one.",
    "Fixing it right the first time is still a superpower.",
    "The people who count on you are counting for good reason.",
    "Progress you can't see yet is still progress.",
    "Rest counts as part of the work.",
    "Kindness on a busy day goes further than you think.",
    "Keep the standard. It rubs off on everyone around you.",
    "One honest effort beats ten perfect intentions.",
    "Today's a good day to call someone you've been meaning to.",
    "You built this. Enjoy a minute of it.",
];

/// The day's pick: the same message all day, a different one tomorrow
pub fn for_day(day: NaiveDate) -> &'static str {
    MOTIVATIONS[day.day() as usize % MOTIVATIONS.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_follows_day_of_month() {
        let first = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let same_day_next_month = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        assert_eq!(for_day(first), MOTIVATIONS[1]);
        assert_eq!(for_day(first), for_day(same_day_next_month));
        assert_eq!(for_day(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()), MOTIVATIONS[0]);
        assert_ne!(for_day(first), for_day(first.succ_opt().unwrap()));
    }
}

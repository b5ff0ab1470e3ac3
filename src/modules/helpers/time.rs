use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

pub struct TimeHelper {}

impl TimeHelper {
    /// # combine a calendar date with a time of day
    /// pure and timezone-agnostic; any localization happens at the boundary
    pub fn combine(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
        date.and_time(time)
    }

    /// # shift a timestamp by whole minutes
    pub fn add_minutes(timestamp: NaiveDateTime, minutes: i64) -> NaiveDateTime {
        timestamp + Duration::minutes(minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn combine_keeps_date_and_time() {
        let combined = TimeHelper::combine(date(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(combined.to_string(), "2024-06-01 09:00:00");
    }

    #[test]
    fn add_minutes_rolls_over_midnight() {
        let late = TimeHelper::combine(date(), NaiveTime::from_hms_opt(23, 58, 0).unwrap());
        let shifted = TimeHelper::add_minutes(late, 5);
        assert_eq!(shifted.to_string(), "2024-06-02 00:03:00");
    }
}

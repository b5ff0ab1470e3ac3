use chrono::{Duration, NaiveTime};

pub struct Parsing {}

impl Parsing {
    /// # coerce an optional spreadsheet cell to an integer
    /// total function: missing values, the absence markers "", "nan" and
    /// "none" (any case, surrounding whitespace ignored) and anything
    /// unparseable all become 0. float strings truncate toward zero, so
    /// "1931.0" is 1931. this never errors; scoring relies on that.
    ///
    /// ## Arguments
    /// * `value` - the raw cell content, if any
    ///
    /// ## Returns
    /// * `i32` - the parsed value, or 0
    pub fn safe_int(value: Option<&str>) -> i32 {
        let raw = match value {
            Some(raw) => raw.trim(),
            None => return 0,
        };

        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("none") {
            return 0;
        }

        match raw.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => parsed.trunc() as i32,
            _ => 0,
        }
    }

    /// # parse a wall clock "HH:MM" string
    pub fn parse_clock(value: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
    }

    /// # parse a checkpoint interval "MM:SS" string
    /// minutes are not capped at 59; "90:00" is a valid hour and a half
    pub fn parse_interval(value: &str) -> Option<Duration> {
        let (minutes, seconds) = value.trim().split_once(':')?;
        let minutes = minutes.parse::<i64>().ok()?;
        let seconds = seconds.parse::<i64>().ok()?;
        if minutes < 0 || !(0..60).contains(&seconds) {
            return None;
        }

        Some(Duration::seconds(minutes * 60 + seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_int_parses_plain_integers() {
        assert_eq!(Parsing::safe_int(Some("1931")), 1931);
        assert_eq!(Parsing::safe_int(Some(" 25 ")), 25);
    }

    #[test]
    fn safe_int_truncates_float_strings() {
        assert_eq!(Parsing::safe_int(Some("1931.0")), 1931);
        assert_eq!(Parsing::safe_int(Some("10.9")), 10);
    }

    #[test]
    fn safe_int_returns_zero_for_absence_markers() {
        assert_eq!(Parsing::safe_int(None), 0);
        assert_eq!(Parsing::safe_int(Some("")), 0);
        assert_eq!(Parsing::safe_int(Some("  ")), 0);
        assert_eq!(Parsing::safe_int(Some("NaN")), 0);
        assert_eq!(Parsing::safe_int(Some("None")), 0);
        assert_eq!(Parsing::safe_int(Some(" none ")), 0);
    }

    #[test]
    fn safe_int_returns_zero_for_garbage() {
        assert_eq!(Parsing::safe_int(Some("abc")), 0);
        assert_eq!(Parsing::safe_int(Some("12abc")), 0);
    }

    #[test]
    fn parse_clock_accepts_hh_mm() {
        assert_eq!(
            Parsing::parse_clock("08:30"),
            NaiveTime::from_hms_opt(8, 30, 0)
        );
        assert_eq!(Parsing::parse_clock("8:30:00"), None);
        assert_eq!(Parsing::parse_clock("25:00"), None);
    }

    #[test]
    fn parse_interval_accepts_mm_ss() {
        assert_eq!(Parsing::parse_interval("02:30"), Some(Duration::seconds(150)));
        assert_eq!(Parsing::parse_interval("0:05"), Some(Duration::seconds(5)));
        assert_eq!(Parsing::parse_interval("90:00"), Some(Duration::seconds(5400)));
    }

    #[test]
    fn parse_interval_rejects_malformed_input() {
        assert_eq!(Parsing::parse_interval("230"), None);
        assert_eq!(Parsing::parse_interval("2:60"), None);
        assert_eq!(Parsing::parse_interval("-1:00"), None);
        assert_eq!(Parsing::parse_interval("a:b"), None);
        assert_eq!(Parsing::parse_interval(""), None);
    }
}

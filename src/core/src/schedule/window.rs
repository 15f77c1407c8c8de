use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use crate::error::ConfigError;

/// Which days of the week a window applies to.
///
/// Day indices follow a broadcast week that starts on Sunday (index 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySelector {
    EveryDay,
    Single(Weekday),
    /// Inclusive range; wraps through Saturday→Sunday when `from` comes after `to`.
    Range { from: Weekday, to: Weekday },
    /// Sunday through Thursday.
    Weekdays,
    /// Friday and Saturday.
    Weekends,
}

impl DaySelector {
    pub fn contains(&self, day: Weekday) -> bool {
        let idx = day.num_days_from_sunday();
        match *self {
            Self::EveryDay => true,
            Self::Single(d) => d == day,
            Self::Range { from, to } => {
                let from = from.num_days_from_sunday();
                let to = to.num_days_from_sunday();
                if from <= to {
                    (from..=to).contains(&idx)
                } else {
                    idx >= from || idx <= to
                }
            }
            Self::Weekdays => idx <= 4,
            Self::Weekends => idx >= 5,
        }
    }
}

impl FromStr for DaySelector {
    type Err = String;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let lower = token.trim().to_ascii_lowercase();
        match lower.as_str() {
            "weekdays" => return Ok(Self::Weekdays),
            "weekends" => return Ok(Self::Weekends),
            _ => {}
        }
        if let Some((from, to)) = lower.split_once('-') {
            let from = parse_day(from)?;
            let to = parse_day(to)?;
            return Ok(Self::Range { from, to });
        }
        parse_day(&lower).map(Self::Single)
    }
}

fn parse_day(abbr: &str) -> Result<Weekday, String> {
    match abbr {
        "sun" => Ok(Weekday::Sun),
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        other => Err(format!("unknown day {other:?}")),
    }
}

/// One recurring skip window: a day selector plus a time-of-day range.
///
/// Times are minutes since midnight. `end <= start` means the range crosses
/// midnight, so `end == start` covers the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub days: DaySelector,
    pub start: u16,
    pub end: u16,
}

impl TimeWindow {
    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        if !self.days.contains(at.weekday()) {
            return false;
        }
        let t = (at.hour() * 60 + at.minute()) as u16;
        if self.end > self.start {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }

    fn parse(entry: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidSkipWindow {
            entry: entry.to_string(),
            reason,
        };
        let tokens: Vec<&str> = entry.split_whitespace().collect();
        let (days, range) = match tokens.as_slice() {
            [range] => (DaySelector::EveryDay, *range),
            [days, range] => (days.parse().map_err(invalid)?, *range),
            _ => return Err(invalid("expected \"[days] HH:MM-HH:MM\"".to_string())),
        };
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| invalid(format!("missing time range in {range:?}")))?;
        Ok(Self {
            days,
            start: parse_clock(start).map_err(invalid)?,
            end: parse_clock(end).map_err(invalid)?,
        })
    }
}

fn parse_clock(value: &str) -> Result<u16, String> {
    let (hour, minute) = value
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("malformed time {value:?}"))?;
    let valid = |part: &str| {
        !part.is_empty() && part.len() <= 2 && part.bytes().all(|b| b.is_ascii_digit())
    };
    if !valid(hour) || minute.len() != 2 || !valid(minute) {
        return Err(format!("malformed time {value:?}"));
    }
    let hour: u16 = hour.parse().map_err(|_| format!("malformed time {value:?}"))?;
    let minute: u16 = minute
        .parse()
        .map_err(|_| format!("malformed time {value:?}"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("time out of range {value:?}"));
    }
    Ok(hour * 60 + minute)
}

/// True when `at` falls inside any of `windows`.
pub fn matches(windows: &[TimeWindow], at: &NaiveDateTime) -> bool {
    windows.iter().any(|w| w.contains(at))
}

/// A station's set of skip windows (union semantics).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSchedule {
    windows: Vec<TimeWindow>,
}

impl SkipSchedule {
    /// Parse a comma-separated skip expression such as
    /// `"weekdays 02:00-06:00, fri-sat 23:00-01:00, 12:00-12:30"`.
    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        let windows = expr
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(TimeWindow::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { windows })
    }

    pub fn from_windows(windows: Vec<TimeWindow>) -> Self {
        Self { windows }
    }

    pub fn matches(&self, at: &NaiveDateTime) -> bool {
        matches(&self.windows, at)
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:02}:{:02}-{:02}:{:02}",
            self.days,
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2024-01-07 is a Sunday.
    fn at(day_offset: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 7 + day_offset)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn midnight_crossing_window() {
        let schedule = SkipSchedule::parse("23:00-01:00").unwrap();
        assert!(schedule.matches(&at(2, 23, 30)));
        assert!(schedule.matches(&at(2, 0, 30)));
        assert!(!schedule.matches(&at(2, 12, 0)));
        assert!(!schedule.matches(&at(2, 1, 0)));
        assert!(schedule.matches(&at(2, 23, 0)));
    }

    #[test]
    fn plain_window_is_half_open() {
        let schedule = SkipSchedule::parse("02:00-06:00").unwrap();
        assert!(schedule.matches(&at(0, 2, 0)));
        assert!(schedule.matches(&at(0, 5, 59)));
        assert!(!schedule.matches(&at(0, 6, 0)));
        assert!(!schedule.matches(&at(0, 1, 59)));
    }

    #[test]
    fn equal_start_and_end_covers_the_day() {
        let schedule = SkipSchedule::parse("mon 08:00-08:00").unwrap();
        assert!(schedule.matches(&at(1, 0, 0)));
        assert!(schedule.matches(&at(1, 23, 59)));
        assert!(!schedule.matches(&at(2, 12, 0)));
    }

    #[test]
    fn wrapping_day_range() {
        let sel: DaySelector = "fri-mon".parse().unwrap();
        for day in [Weekday::Fri, Weekday::Sat, Weekday::Sun, Weekday::Mon] {
            assert!(sel.contains(day), "{day:?} should be included");
        }
        for day in [Weekday::Tue, Weekday::Wed, Weekday::Thu] {
            assert!(!sel.contains(day), "{day:?} should be excluded");
        }
    }

    #[test]
    fn forward_day_range() {
        let sel: DaySelector = "Tue-Thu".parse().unwrap();
        assert!(sel.contains(Weekday::Wed));
        assert!(!sel.contains(Weekday::Mon));
        assert!(!sel.contains(Weekday::Fri));
    }

    #[test]
    fn broadcast_week_groups() {
        let weekdays = DaySelector::Weekdays;
        let weekends = DaySelector::Weekends;
        for day in [Weekday::Sun, Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu] {
            assert!(weekdays.contains(day));
            assert!(!weekends.contains(day));
        }
        for day in [Weekday::Fri, Weekday::Sat] {
            assert!(weekends.contains(day));
            assert!(!weekdays.contains(day));
        }
    }

    #[test]
    fn day_prefix_limits_window() {
        let schedule = SkipSchedule::parse("weekends 10:00-12:00").unwrap();
        // Friday
        assert!(schedule.matches(&at(5, 11, 0)));
        // Sunday is a weekday in the broadcast week
        assert!(!schedule.matches(&at(0, 11, 0)));
    }

    #[test]
    fn union_of_entries() {
        let schedule =
            SkipSchedule::parse(" sun 02:00-03:00 , wed 20:00-21:00,, 12:00-12:30").unwrap();
        assert_eq!(schedule.windows().len(), 3);
        assert!(schedule.matches(&at(0, 2, 15)));
        assert!(schedule.matches(&at(3, 20, 15)));
        assert!(schedule.matches(&at(4, 12, 10)));
        assert!(!schedule.matches(&at(4, 2, 15)));
    }

    #[test]
    fn empty_expression_never_matches() {
        let schedule = SkipSchedule::parse("  ").unwrap();
        assert!(schedule.is_empty());
        assert!(!schedule.matches(&at(0, 0, 0)));
    }

    #[test]
    fn matching_is_pure() {
        let schedule = SkipSchedule::parse("fri-mon 23:00-01:00").unwrap();
        let ts = at(5, 23, 45);
        let first = schedule.matches(&ts);
        for _ in 0..5 {
            assert_eq!(schedule.matches(&ts), first);
        }
    }

    #[test]
    fn rejects_malformed_entries() {
        for bad in [
            "xyz 02:00-03:00",
            "mon-xyz 02:00-03:00",
            "25:00-03:00",
            "02:60-03:00",
            "0200-0300",
            "02:00",
            "mon 02:00-03:00 extra",
            "2:5-03:00",
        ] {
            let err = SkipSchedule::parse(bad).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidSkipWindow { .. }),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn accepts_single_digit_hours() {
        let schedule = SkipSchedule::parse("2:00-6:30").unwrap();
        assert_eq!(schedule.windows()[0].start, 120);
        assert_eq!(schedule.windows()[0].end, 390);
    }
}

use serde::{Deserialize, Serialize};

pub const SECS_PER_DAY: i64 = 86_400;

/// Time filter applied to history queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Last7Days,
    Last30Days,
    Days(u32),
    #[default]
    AllTime,
}

impl TimeRange {
    /// Map a `days` query value to a range. Anything missing or zero is all time.
    pub fn from_days(days: Option<u32>) -> Self {
        match days {
            Some(7) => Self::Last7Days,
            Some(30) => Self::Last30Days,
            Some(0) | None => Self::AllTime,
            Some(n) => Self::Days(n),
        }
    }

    pub fn days(&self) -> Option<u32> {
        match self {
            Self::Last7Days => Some(7),
            Self::Last30Days => Some(30),
            Self::Days(n) => Some(*n),
            Self::AllTime => None,
        }
    }

    /// Lower bound (unix seconds, inclusive) relative to `now`.
    pub fn since(&self, now: i64) -> Option<i64> {
        self.days()
            .map(|days| now.saturating_sub(i64::from(days).saturating_mul(SECS_PER_DAY)))
    }
}

/// A play row as shown in "recent plays" tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentPlay {
    pub station: String,
    pub artist: String,
    pub title: String,
    /// Unix seconds.
    pub played_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSong {
    pub artist: String,
    pub title: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopArtist {
    pub artist: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCount {
    pub hour: u8,
    pub count: u64,
}

/// Day-of-week bucket; `dow` 0 is Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowCount {
    pub dow: u8,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    /// `YYYY-MM-DD`, UTC.
    pub day: String,
    pub count: u64,
}

/// Payload of `/api/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub top_songs: Vec<TopSong>,
    pub top_artists: Vec<TopArtist>,
    pub plays_by_hour: Vec<HourCount>,
    pub plays_by_dow: Vec<DowCount>,
}

/// Payload of `/api/artist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistDetail {
    pub artist: String,
    pub songs: Vec<TopSong>,
    pub plays_by_day: Vec<DayCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_days_maps_known_ranges() {
        assert_eq!(TimeRange::from_days(Some(7)), TimeRange::Last7Days);
        assert_eq!(TimeRange::from_days(Some(30)), TimeRange::Last30Days);
        assert_eq!(TimeRange::from_days(Some(90)), TimeRange::Days(90));
        assert_eq!(TimeRange::from_days(Some(0)), TimeRange::AllTime);
        assert_eq!(TimeRange::from_days(None), TimeRange::AllTime);
    }

    #[test]
    fn since_subtracts_whole_days() {
        let now = 1_700_000_000;
        assert_eq!(TimeRange::Last7Days.since(now), Some(now - 7 * SECS_PER_DAY));
        assert_eq!(TimeRange::AllTime.since(now), None);
    }

    #[test]
    fn recent_play_omits_missing_uri() {
        let play = RecentPlay {
            station: "a".into(),
            artist: "b".into(),
            title: "c".into(),
            played_at: 1,
            track_uri: None,
        };
        let json = serde_json::to_string(&play).unwrap();
        assert!(!json.contains("track_uri"));
    }
}

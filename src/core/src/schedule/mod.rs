mod window;

pub use window::{matches, DaySelector, SkipSchedule, TimeWindow};

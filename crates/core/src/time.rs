use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};

/// Last-changed stamp carried by every entity.
pub type Timestamp = DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}

/// True if both instants fall on the same calendar day.
pub fn is_same_day(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.date() == b.date()
}

/// Midnight of the day `dt` falls on.
pub fn cut_date(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date().and_time(NaiveTime::MIN)
}

/// The calendar day of `date` combined with the time of day of `time`.
pub fn to_date_time(date: NaiveDateTime, time: NaiveDateTime) -> NaiveDateTime {
    date.date().and_time(time.time())
}

/// Offset that moves `source` onto `dest`. With `keep_time` only the date of
/// `dest` counts and the time of day of `source` is preserved.
pub fn move_offset(source: NaiveDateTime, dest: NaiveDateTime, keep_time: bool) -> Duration {
    let adjusted = if keep_time {
        to_date_time(dest, source)
    } else {
        dest
    };
    adjusted - source
}

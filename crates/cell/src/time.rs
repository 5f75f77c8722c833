use chrono::{Local, NaiveDateTime};

/// Source of the timestamp embedded in every ID.
///
/// IDs carry the local wall-clock date (and, depending on the
/// [`Pattern`](crate::Pattern), hour and minute). Plugging in a fixed or
/// stepped source makes generated IDs deterministic in tests.
///
/// # Example
///
/// ```
/// use cell::TimeSource;
/// use chrono::{NaiveDate, NaiveDateTime};
///
/// struct FixedTime(NaiveDateTime);
/// impl TimeSource for FixedTime {
///     fn now(&self) -> NaiveDateTime {
///         self.0
///     }
/// }
///
/// let at = NaiveDate::from_ymd_opt(2023, 11, 5)
///     .unwrap()
///     .and_hms_opt(1, 40, 27)
///     .unwrap();
/// assert_eq!(FixedTime(at).now(), at);
/// ```
pub trait TimeSource {
    fn now(&self) -> NaiveDateTime;
}

/// The system clock in the local time zone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LocalClock;

impl TimeSource for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

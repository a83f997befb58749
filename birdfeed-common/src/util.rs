use thiserror::Error;
use time::Duration;

/// A strictly positive span of time, e.g. the lifetime of a cached feed.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    pub fn from_seconds(seconds: i64) -> Result<Self, NonPositiveDurationError> {
        Duration::seconds(seconds).try_into()
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }

    /// Whole seconds, rounded up so sub-second durations never become zero.
    #[must_use]
    pub fn whole_seconds_ceil(&self) -> i64 {
        let seconds = self.0.whole_seconds();
        if self.0.subsec_nanoseconds() > 0 {
            seconds + 1
        } else {
            seconds
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::util::PositiveDuration;
    use time::Duration;

    #[test]
    fn only_positive_durations() {
        assert!(PositiveDuration::new(Duration::seconds(1)).is_some());
        assert!(PositiveDuration::new(Duration::ZERO).is_none());
        assert!(PositiveDuration::new(Duration::seconds(-5)).is_none());
        assert!(PositiveDuration::from_seconds(0).is_err());
    }

    #[test]
    fn seconds_round_up() {
        let exact = PositiveDuration::from_seconds(90).unwrap();
        assert_eq!(exact.whole_seconds_ceil(), 90);

        let fractional = PositiveDuration::new(Duration::milliseconds(1500)).unwrap();
        assert_eq!(fractional.whole_seconds_ceil(), 2);

        let tiny = PositiveDuration::new(Duration::nanoseconds(1)).unwrap();
        assert_eq!(tiny.whole_seconds_ceil(), 1);
    }
}

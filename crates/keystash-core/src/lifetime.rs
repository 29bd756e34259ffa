//! Lifetime (TTL) normalization.

use serde::{Deserialize, Serialize};

/// Structured duration input for lifetimes. Converts to whole seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeSpan {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl LifeSpan {
    #[must_use]
    pub const fn total_seconds(&self) -> u64 {
        self.days * 86_400 + self.hours * 3_600 + self.minutes * 60 + self.seconds
    }
}

/// A requested item lifetime.
///
/// `Default` defers to the adapter's configured default lifetime. Anything
/// that normalizes to zero or below means "no expiry": the item persists
/// until explicitly deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifetime {
    #[default]
    Default,
    Seconds(i64),
    Span(LifeSpan),
}

impl Lifetime {
    /// Explicit "no expiry".
    #[must_use]
    pub const fn none() -> Self {
        Self::Seconds(0)
    }

    /// Resolve to a positive TTL in seconds, or `None` for no expiry.
    ///
    /// `default` is the adapter's (already normalized) default lifetime,
    /// substituted when this is [`Lifetime::Default`].
    #[must_use]
    pub fn normalize(self, default: Option<u64>) -> Option<u64> {
        match self {
            Self::Default => default,
            Self::Seconds(secs) if secs > 0 => Some(secs as u64),
            Self::Seconds(_) => None,
            Self::Span(span) => match span.total_seconds() {
                0 => None,
                secs => Some(secs),
            },
        }
    }
}

impl From<i64> for Lifetime {
    fn from(secs: i64) -> Self {
        Self::Seconds(secs)
    }
}

impl From<LifeSpan> for Lifetime {
    fn from(span: LifeSpan) -> Self {
        Self::Span(span)
    }
}

impl From<std::time::Duration> for Lifetime {
    fn from(duration: std::time::Duration) -> Self {
        Self::Seconds(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_mean_no_expiry() {
        assert_eq!(Lifetime::Seconds(0).normalize(None), None);
        assert_eq!(Lifetime::Seconds(-5).normalize(Some(60)), None);
        assert_eq!(Lifetime::none().normalize(Some(60)), None);
    }

    #[test]
    fn span_converts_to_whole_seconds() {
        let span = LifeSpan {
            days: 1,
            hours: 1,
            ..LifeSpan::default()
        };
        assert_eq!(Lifetime::Span(span).normalize(None), Some(90_000));
    }

    #[test]
    fn empty_span_means_no_expiry() {
        assert_eq!(Lifetime::Span(LifeSpan::default()).normalize(Some(30)), None);
    }

    #[test]
    fn default_substitutes_adapter_lifetime() {
        assert_eq!(Lifetime::Default.normalize(Some(120)), Some(120));
        assert_eq!(Lifetime::Default.normalize(None), None);
    }

    #[test]
    fn duration_truncates_to_seconds() {
        let lifetime = Lifetime::from(std::time::Duration::from_millis(2_900));
        assert_eq!(lifetime.normalize(None), Some(2));
    }
}

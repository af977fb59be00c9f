use std::time::Duration;

/// Failure reported by a [`Notifier`](crate::app::notifier::Notifier).
///
/// The scheduler supervisor branches on the variant: rate limiting always backs off and
/// retries, anything else follows the configured fatal policy.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("delivery failed: {0:#}")]
    Fatal(anyhow::Error),
}

impl DeliveryError {
    pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
        Self::Fatal(err.into())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Stable label used as the `kind` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Fatal(_) => "delivery_fatal",
        }
    }
}

/// Rejected command-layer argument.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("unknown weekday: {0:?}")]
    UnknownWeekday(String),

    #[error("day of month must be within 1..=31, got {0}")]
    DayOfMonthOutOfRange(u32),

    #[error("not a day of month: {0:?}")]
    InvalidDayOfMonth(String),

    #[error("a calendar rule needs at least one day")]
    EmptyRule,

    #[error("calendar rule mixes weekdays and days of month: {0:?}")]
    MixedRule(String),

    #[error("invalid date {0:?}: expected YYYY-MM-DD or DD/MM/YYYY")]
    InvalidDate(String),
}

pub fn require_non_empty(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(value.to_owned())
}

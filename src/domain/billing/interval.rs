//! Billing interval arithmetic.
//!
//! A billing period is `[start, start + count × unit)`. Day and week units are
//! fixed-length; month and year units are calendar-aware and clamp the day of
//! month to the last valid day of the target month (Jan 31 + 1 month is the
//! last day of February). Time of day is always preserved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, ValidationError};

/// Upper bound for `interval_count`, keeping every computed end representable.
pub const MAX_INTERVAL_COUNT: i64 = 1_000;

/// Unit of a recurring billing interval as sent by Korvex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum IntervalUnit {
    Days,
    Weeks,
    Months,
    Years,
    /// Unrecognised unit, kept verbatim for logging.
    Unknown(String),
}

impl IntervalUnit {
    pub fn as_str(&self) -> &str {
        match self {
            IntervalUnit::Days => "DAYS",
            IntervalUnit::Weeks => "WEEKS",
            IntervalUnit::Months => "MONTHS",
            IntervalUnit::Years => "YEARS",
            IntervalUnit::Unknown(raw) => raw,
        }
    }
}

impl From<String> for IntervalUnit {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DAY" | "DAYS" | "DAILY" => IntervalUnit::Days,
            "WEEK" | "WEEKS" | "WEEKLY" => IntervalUnit::Weeks,
            "MONTH" | "MONTHS" | "MONTHLY" => IntervalUnit::Months,
            "YEAR" | "YEARS" | "YEARLY" | "ANNUAL" => IntervalUnit::Years,
            _ => IntervalUnit::Unknown(raw),
        }
    }
}

impl Serialize for IntervalUnit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated billing interval: a known unit and a positive count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingInterval {
    unit: IntervalUnit,
    count: u32,
}

impl BillingInterval {
    /// Builds an interval from provider values.
    ///
    /// A count of zero or less is degenerate and treated as 1.
    ///
    /// # Errors
    ///
    /// - `InvalidFormat` if the unit is not recognised
    /// - `OutOfRange` if the count exceeds [`MAX_INTERVAL_COUNT`]
    pub fn new(unit: IntervalUnit, count: i64) -> Result<Self, ValidationError> {
        if let IntervalUnit::Unknown(raw) = &unit {
            return Err(ValidationError::invalid_format(
                "interval_type",
                format!("unsupported interval unit '{}'", raw),
            ));
        }
        if count > MAX_INTERVAL_COUNT {
            return Err(ValidationError::out_of_range(
                "interval_count",
                1,
                MAX_INTERVAL_COUNT,
                count,
            ));
        }
        let count = count.max(1) as u32;
        Ok(Self { unit, count })
    }

    /// One calendar month.
    pub fn monthly() -> Self {
        Self {
            unit: IntervalUnit::Months,
            count: 1,
        }
    }

    pub fn unit(&self) -> &IntervalUnit {
        &self.unit
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the end of a period starting at `start`.
    ///
    /// The result is always strictly later than `start`.
    pub fn period_end(&self, start: Timestamp) -> Result<Timestamp, ValidationError> {
        let count = self.count;
        let end = match self.unit {
            IntervalUnit::Days => start.checked_add_days(i64::from(count)),
            IntervalUnit::Weeks => start.checked_add_days(i64::from(count) * 7),
            IntervalUnit::Months => start.checked_add_months(count),
            IntervalUnit::Years => count
                .checked_mul(12)
                .and_then(|months| start.checked_add_months(months)),
            IntervalUnit::Unknown(_) => None,
        };
        end.filter(|end| end.is_after(&start)).ok_or_else(|| {
            ValidationError::invalid_format(
                "billing_period",
                format!("cannot add {} {} to {}", count, self.unit, start.to_rfc3339()),
            )
        })
    }

    /// Returns the full period starting at `start`.
    pub fn period_from(&self, start: Timestamp) -> Result<BillingPeriod, ValidationError> {
        let end = self.period_end(start)?;
        Ok(BillingPeriod { start, end })
    }
}

/// A billing window with `end` strictly after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

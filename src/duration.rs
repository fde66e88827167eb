//! Wait durations
//!
//! ISO-8601 period expressions (`P1D`, `PT4H`, `P1M2DT30M`) bound to a
//! waitstate by the scenario. Deadlines are computed from the instant the
//! waitstate started, never from the current virtual time, and never touch
//! the engine clock.

use crate::error::{Result, ScenarioError};
use crate::types::Instant;
use chrono::DateTime;
use jiff::{tz::TimeZone, Span, Timestamp};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// A parsed, validated wait-duration expression.
#[derive(Clone, Debug)]
pub struct WaitDuration {
    expression: String,
    span: Span,
}

impl WaitDuration {
    /// Parse an ISO-8601 period. Anything not starting with the `P`
    /// designator is rejected instead of being read as some default.
    pub fn parse(expression: &str) -> Result<Self> {
        if !expression.starts_with('P') {
            return Err(malformed(
                expression,
                "expected ISO-8601 period starting with 'P'",
            ));
        }
        let span: Span = expression
            .parse()
            .map_err(|e: jiff::Error| malformed(expression, e))?;
        Ok(Self {
            expression: expression.to_string(),
            span,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The instant this duration after `start`, with calendar units (years,
    /// months, days) applied in UTC.
    pub fn after(&self, start: Instant) -> Result<Instant> {
        // Leap-second instants carry subsec nanos >= 1e9; summing them into
        // one nanosecond count normalises that.
        let nanos = i128::from(start.timestamp()) * NANOS_PER_SECOND
            + i128::from(start.timestamp_subsec_nanos());
        let ts = Timestamp::from_nanosecond(nanos).map_err(|e| malformed(&self.expression, e))?;
        let end = ts
            .to_zoned(TimeZone::UTC)
            .checked_add(self.span)
            .map_err(|e| malformed(&self.expression, e))?
            .timestamp()
            .as_nanosecond();
        // Split with a non-negative remainder so pre-1970 instants convert.
        let seconds = i64::try_from(end.div_euclid(NANOS_PER_SECOND))
            .map_err(|_| malformed(&self.expression, "deadline out of range"))?;
        let subsec = u32::try_from(end.rem_euclid(NANOS_PER_SECOND))
            .map_err(|_| malformed(&self.expression, "deadline out of range"))?;
        DateTime::from_timestamp(seconds, subsec)
            .ok_or_else(|| malformed(&self.expression, "deadline out of range"))
    }
}

/// `start` when no duration is configured, otherwise `start + duration`.
pub fn deadline(start: Instant, duration: Option<&str>) -> Result<Instant> {
    match duration {
        None => Ok(start),
        Some(expression) => WaitDuration::parse(expression)?.after(start),
    }
}

fn malformed(expression: &str, reason: impl std::fmt::Display) -> ScenarioError {
    ScenarioError::MalformedDuration {
        expression: expression.to_string(),
        reason: reason.to_string(),
    }
}

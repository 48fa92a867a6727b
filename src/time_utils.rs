// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 timestamp with any offset into UTC.
pub fn parse_utc_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Drop sub-second precision so stored timestamps sort lexicographically.
pub fn truncate_to_secs(date: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(date.timestamp(), 0).unwrap_or(date)
}

/// Whole days from `now` until `target`, negative when `target` has passed.
///
/// Counts calendar days (UTC), so a deadline later today is 0 days away.
pub fn days_until(target: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (target.date_naive() - now.date_naive()).num_days()
}

/// True when both instants fall on the same UTC calendar day.
pub fn same_day(a: DateTime<Utc>, day: NaiveDate) -> bool {
    a.date_naive() == day
}

/// Serde adapter persisting timestamps as second-precision RFC3339 strings.
///
/// Firestore orders string fields lexicographically; a fixed format keeps
/// `order_by("deadline")` chronological.
pub mod rfc3339_secs {
    use super::{format_utc_rfc3339, parse_utc_rfc3339};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_utc_rfc3339(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_utc_rfc3339(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid RFC3339 timestamp: {raw}")))
    }
}

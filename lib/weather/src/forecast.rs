//! Daily aggregation of a sub-daily forecast feed.

use crate::model::{ForecastEntry, ForecastPayload, Units};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::BTreeMap;
use tracing::warn;

/// Number of days reported by the forecast adapter.
pub const FORECAST_DAYS: usize = 5;

/// Rounds a temperature to the nearest whole degree, halves away from zero.
#[must_use]
pub fn round_degrees(value: f64) -> i64 {
    // `as` turns -0.0 into 0, so "-0" never reaches the user.
    value.round() as i64
}

/// Groups feed samples by calendar date and formats up to five day-lines.
///
/// Dates are taken in the feed's own UTC offset (`city.timezone`, UTC when
/// absent). Each line carries the condition of the temporally middle sample
/// of the day and the mean of all the day's temperatures:
/// `"<Weekday> <YYYY-MM-DD>: <condition>, <temp>°<units>"`.
pub(crate) fn daily_lines(payload: &ForecastPayload, units: Units) -> Vec<String> {
    let offset_secs = payload.city.as_ref().map_or(0, |city| city.timezone);
    let offset = FixedOffset::east_opt(offset_secs).unwrap_or_else(|| {
        warn!(offset_secs, "forecast feed offset out of range, using UTC");
        Utc.fix()
    });

    let mut days: BTreeMap<NaiveDate, Vec<&ForecastEntry>> = BTreeMap::new();
    for entry in &payload.list {
        let Some(timestamp) = DateTime::from_timestamp(entry.dt, 0) else {
            warn!(dt = entry.dt, "skipping forecast sample with invalid timestamp");
            continue;
        };
        let date = timestamp.with_timezone(&offset).date_naive();
        days.entry(date).or_default().push(entry);
    }

    days.into_iter()
        .take(FORECAST_DAYS)
        .map(|(date, mut samples)| {
            samples.sort_by_key(|sample| sample.dt);
            let middle = samples[samples.len() / 2];
            let condition = middle
                .weather
                .first()
                .map_or("unknown", |condition| condition.description.as_str());
            let mean = samples.iter().map(|sample| sample.main.temp).sum::<f64>()
                / samples.len() as f64;
            format!(
                "{}: {}, {}°{}",
                date.format("%A %Y-%m-%d"),
                condition,
                round_degrees(mean),
                units
            )
        })
        .collect()
}

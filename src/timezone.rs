//! Local time annotation.
//!
//! Timezone resolution is an injected collaborator: anything implementing
//! [`TimezoneLookup`] (including a plain closure) maps a coordinate to an
//! IANA identifier. Stops the lookup cannot resolve use the configured
//! default, and `inputed_timezone` records which one was applied.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use log::warn;

use crate::{AnnotatedStop, ClusteredStop, LocalTime, Stop};

/// Resolve the timezone of a coordinate.
pub trait TimezoneLookup: Send + Sync {
    fn timezone_for(&self, latitude: f64, longitude: f64) -> Option<String>;
}

impl<F> TimezoneLookup for F
where
    F: Fn(f64, f64) -> Option<String> + Send + Sync,
{
    fn timezone_for(&self, latitude: f64, longitude: f64) -> Option<String> {
        self(latitude, longitude)
    }
}

/// Lookup that never resolves; every stop uses the default timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTimezoneLookup;

impl TimezoneLookup for NoTimezoneLookup {
    fn timezone_for(&self, _latitude: f64, _longitude: f64) -> Option<String> {
        None
    }
}

/// Resolve a stop's timezone, falling back to `default_tz`.
///
/// Identifiers returned by the lookup that are not in the IANA database
/// are treated as unresolved.
fn resolve<L: TimezoneLookup + ?Sized>(
    stop: &Stop,
    lookup: &L,
    default_tz: Tz,
) -> (Option<String>, Tz) {
    match lookup.timezone_for(stop.latitude, stop.longitude) {
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => (Some(name), tz),
            Err(_) => {
                warn!(
                    "[Timezone] Lookup returned unknown timezone `{}` for {}#{}; using {}",
                    name,
                    stop.device_id,
                    stop.stop_index,
                    default_tz.name()
                );
                (None, default_tz)
            }
        },
        None => (None, default_tz),
    }
}

fn to_utc(stop: &Stop, timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(|| {
        warn!(
            "[Timezone] Timestamp {} of {}#{} is out of range; using the epoch",
            timestamp_ms, stop.device_id, stop.stop_index
        );
        DateTime::default()
    })
}

/// Compute the local calendar and clock fields of a stop.
///
/// Timestamps outside chrono's representable range are logged and
/// annotated as the Unix epoch.
pub fn annotate_stop<L: TimezoneLookup + ?Sized>(
    stop: &Stop,
    lookup: &L,
    default_tz: Tz,
) -> LocalTime {
    let (timezone, tz) = resolve(stop, lookup, default_tz);

    let start = to_utc(stop, stop.start_ts).with_timezone(&tz);
    let end = to_utc(stop, stop.end_ts).with_timezone(&tz);
    let weekday = start.weekday();

    LocalTime {
        timezone,
        inputed_timezone: tz.name().to_string(),
        stop_datetime: start.naive_local(),
        end_stop_datetime: end.naive_local(),
        date: start.date_naive(),
        year: start.year(),
        month: start.month(),
        day: start.day(),
        hour: start.hour(),
        weekday: weekday.number_from_monday(),
        weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        end_date: end.date_naive(),
    }
}

/// Annotate every clustered stop of a device.
pub fn annotate_stops<L: TimezoneLookup + ?Sized>(
    rows: Vec<ClusteredStop>,
    lookup: &L,
    default_tz: Tz,
) -> Vec<AnnotatedStop> {
    rows.into_iter()
        .map(|row| {
            let local = annotate_stop(&row.stop, lookup, default_tz);
            AnnotatedStop {
                stop: row.stop,
                cluster: row.cluster,
                local,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_at(ts_ms: i64) -> Stop {
        Stop {
            device_id: "d".to_string(),
            stop_index: 1,
            start_ts: ts_ms,
            end_ts: ts_ms + 3_600_000,
            latitude: 4.6,
            longitude: -74.08,
        }
    }

    #[test]
    fn test_unknown_lookup_result_falls_back() {
        let lookup = |_: f64, _: f64| Some("Mars/Olympus_Mons".to_string());
        let local = annotate_stop(&stop_at(0), &lookup, Tz::America__Bogota);
        assert_eq!(local.timezone, None);
        assert_eq!(local.inputed_timezone, "America/Bogota");
    }
}

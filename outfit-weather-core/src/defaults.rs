//! Placeholder readings used when no source has anything for a date.
//!
//! These values are guesses. They are returned tagged `default`, never
//! written to the cache, and any cache entry equal to one of them is
//! discarded on read.

use chrono::{Datelike, NaiveDate};

use crate::model::{
    CachedHistoricalEntry, Observation, PrecipitationType, Sky, WeatherRecord, WeatherSource,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderReading {
    /// `(month, day)`; `None` for the generic fallback.
    pub month_day: Option<(u32, u32)>,
    pub temperature: f64,
    pub rain: f64,
    pub humidity: f64,
    pub season: &'static str,
}

pub const GENERIC_DEFAULT: PlaceholderReading = PlaceholderReading {
    month_day: None,
    temperature: 20.0,
    rain: 0.0,
    humidity: 60.0,
    season: "초가을",
};

const DEFAULT_TABLE: &[PlaceholderReading] = &[
    GENERIC_DEFAULT,
    PlaceholderReading {
        month_day: Some((1, 1)),
        temperature: -3.0,
        rain: 0.0,
        humidity: 55.0,
        season: "한겨울",
    },
    PlaceholderReading {
        month_day: Some((5, 5)),
        temperature: 19.0,
        rain: 0.0,
        humidity: 55.0,
        season: "늦봄",
    },
    PlaceholderReading {
        month_day: Some((8, 15)),
        temperature: 29.0,
        rain: 0.0,
        humidity: 75.0,
        season: "늦여름",
    },
    PlaceholderReading {
        month_day: Some((12, 25)),
        temperature: 1.0,
        rain: 0.0,
        humidity: 60.0,
        season: "초겨울",
    },
];

pub fn placeholder_for(date: NaiveDate) -> &'static PlaceholderReading {
    let key = (date.month(), date.day());
    DEFAULT_TABLE
        .iter()
        .find(|p| p.month_day == Some(key))
        .unwrap_or(&DEFAULT_TABLE[0])
}

pub fn default_record(date: NaiveDate) -> WeatherRecord {
    placeholder_record(placeholder_for(date))
}

pub fn generic_default_record() -> WeatherRecord {
    placeholder_record(&GENERIC_DEFAULT)
}

fn placeholder_record(p: &PlaceholderReading) -> WeatherRecord {
    let observation = Observation {
        temperature: p.temperature,
        min_temperature: None,
        max_temperature: None,
        rain: p.rain,
        humidity: Some(p.humidity),
        sky: Sky::Clear,
        precipitation_type: PrecipitationType::None,
    };
    WeatherRecord::build(observation, p.season, WeatherSource::Default)
}

fn same(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn matches_placeholder(temperature: f64, rain: f64, humidity: Option<f64>, season: &str) -> bool {
    DEFAULT_TABLE.iter().any(|p| {
        same(temperature, p.temperature)
            && same(rain, p.rain)
            && humidity.is_some_and(|h| same(h, p.humidity))
            && season == p.season
    })
}

/// True when a cache entry holds one of the placeholder readings.
pub fn is_placeholder(entry: &CachedHistoricalEntry) -> bool {
    matches_placeholder(entry.average_temperature, entry.rain, entry.humidity, &entry.season)
}

pub fn record_is_placeholder(record: &WeatherRecord) -> bool {
    matches_placeholder(record.average_temperature, record.rain, record.humidity, &record.season)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CachedHistoricalEntry;

    #[test]
    fn generic_default_is_the_sentinel_tuple() {
        let record = generic_default_record();
        assert_eq!(record.average_temperature, 20.0);
        assert_eq!(record.rain, 0.0);
        assert_eq!(record.humidity, Some(60.0));
        assert_eq!(record.season, "초가을");
        assert_eq!(record.source, WeatherSource::Default);
        assert!(record_is_placeholder(&record));
    }

    #[test]
    fn per_date_lookup_falls_back_to_generic() {
        let new_year = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        assert_eq!(placeholder_for(new_year).temperature, -3.0);

        let ordinary = NaiveDate::from_ymd_opt(2026, 3, 17).unwrap();
        assert_eq!(*placeholder_for(ordinary), GENERIC_DEFAULT);
    }

    #[test]
    fn every_table_entry_is_detected_once_cached() {
        for p in DEFAULT_TABLE {
            let date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
            let entry = CachedHistoricalEntry::from_record(date, "seoul", &placeholder_record(p));
            assert!(is_placeholder(&entry), "{p:?} must be detected");
        }
    }

    #[test]
    fn real_readings_are_not_placeholders() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 20).unwrap();
        let mut entry =
            CachedHistoricalEntry::from_record(date, "seoul", &generic_default_record());
        entry.average_temperature = 22.0;
        assert!(!is_placeholder(&entry));

        entry.average_temperature = 20.0;
        entry.humidity = Some(61.0);
        assert!(!is_placeholder(&entry));
    }
}

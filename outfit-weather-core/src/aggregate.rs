//! Statistics shared by every path that reduces several samples to one day.
//!
//! Temperature is the mean of samples, rain is the peak sample, and coded
//! values (sky, precipitation form) take the most frequent value. Ties in the
//! frequency count go to the value that appeared first in the input.

use std::collections::HashMap;
use std::hash::Hash;

use crate::model::{Observation, PrecipitationType, Sky};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Most frequent value; on a tie, the earliest first occurrence wins.
pub fn most_frequent<T, I>(values: I) -> Option<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    // value -> (count, index of first occurrence)
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();
    for (idx, value) in values.into_iter().enumerate() {
        counts.entry(value).or_insert((0, idx)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value)
}

/// Round to one decimal, as providers report.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// One time-slot of a multi-sample provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub temperature: f64,
    pub rain: f64,
    pub humidity: Option<f64>,
    pub sky: Sky,
    pub precipitation_type: PrecipitationType,
}

/// Reduce samples of one day to a daily observation.
pub fn summarize(samples: &[Sample]) -> Option<Observation> {
    let temps: Vec<f64> = samples.iter().map(|s| s.temperature).collect();
    let rains: Vec<f64> = samples.iter().map(|s| s.rain.max(0.0)).collect();
    let humidity: Vec<f64> = samples.iter().filter_map(|s| s.humidity).collect();

    Some(Observation {
        temperature: round1(mean(&temps)?),
        min_temperature: min(&temps),
        max_temperature: max(&temps),
        rain: max(&rains).unwrap_or(0.0),
        humidity: mean(&humidity).map(round1),
        sky: most_frequent(samples.iter().map(|s| s.sky))?,
        precipitation_type: most_frequent(samples.iter().map(|s| s.precipitation_type))?,
    })
}

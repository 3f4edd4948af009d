//! Descriptive headway statistics and Average Wait Time per stop.
//!
//! All values are in minutes. Null and negative headways never enter a
//! statistic; an empty selection is reported as such rather than as zero.

use serde::Serialize;

use crate::model::{Headway, StopKey};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeadwaySummary {
    InsufficientData,
    Available(DescriptiveStats),
}

impl HeadwaySummary {
    pub fn stats(&self) -> Option<&DescriptiveStats> {
        match self {
            HeadwaySummary::Available(s) => Some(s),
            HeadwaySummary::InsufficientData => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "minutes", rename_all = "snake_case")]
pub enum WaitTime {
    /// The observed timeframe has zero length.
    Undefined,
    Minutes(f64),
}

impl WaitTime {
    pub fn minutes(&self) -> Option<f64> {
        match self {
            WaitTime::Minutes(m) => Some(*m),
            WaitTime::Undefined => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopWaitTime {
    pub key: StopKey,
    pub events: usize,
    pub awt: WaitTime,
    pub mean_headway: Option<f64>,
}

/// Headway durations in minutes that may enter a statistic.
pub fn usable_minutes<'a>(headways: impl IntoIterator<Item = &'a Headway>) -> Vec<f64> {
    headways
        .into_iter()
        .filter(|h| !h.is_negative())
        .filter_map(Headway::minutes)
        .collect()
}

/// Arithmetic mean, or `None` for no values.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation given a pre-computed mean.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// Quantile of already sorted values with linear interpolation between
/// closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

pub fn describe<'a>(headways: impl IntoIterator<Item = &'a Headway>) -> HeadwaySummary {
    let mut values = usable_minutes(headways);
    let Some(avg) = mean(&values) else {
        return HeadwaySummary::InsufficientData;
    };
    values.sort_by(f64::total_cmp);

    // values is non-empty past this point
    let q = |p: f64| quantile(&values, p).unwrap_or(f64::NAN);

    HeadwaySummary::Available(DescriptiveStats {
        count: values.len(),
        mean: avg,
        stddev: stddev(&values, avg),
        min: values[0],
        p25: q(0.25),
        median: q(0.5),
        p75: q(0.75),
        max: values[values.len() - 1],
    })
}

/// AWT = Σh² / 2T, with T the span between the earliest and latest event.
///
/// The first headway of each series is null and so never contributes; the
/// wait before the first observed vehicle is not counted.
pub fn average_wait_time(headways: &[Headway]) -> WaitTime {
    let (Some(first), Some(last)) = (
        headways.iter().map(|h| h.time).min(),
        headways.iter().map(|h| h.time).max(),
    ) else {
        return WaitTime::Undefined;
    };

    let timeframe = (last - first).num_seconds() as f64 / 60.0;
    if timeframe <= 0.0 {
        return WaitTime::Undefined;
    }

    let sum_of_squares: f64 = usable_minutes(headways).iter().map(|h| h * h).sum();
    WaitTime::Minutes(sum_of_squares / (2.0 * timeframe))
}

pub fn stop_wait_time(key: &StopKey, headways: &[Headway]) -> StopWaitTime {
    StopWaitTime {
        key: key.clone(),
        events: headways.len(),
        awt: average_wait_time(headways),
        mean_headway: mean(&usable_minutes(headways)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 11)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn headway(time: NaiveDateTime, minutes: Option<i64>) -> Headway {
        Headway {
            stop_id: "1".into(),
            direction: "East".into(),
            time,
            previous: minutes.map(|m| time - TimeDelta::minutes(m)),
            duration: minutes.map(TimeDelta::minutes),
        }
    }

    #[test]
    fn test_mean_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
    }

    #[test]
    fn test_stddev_population() {
        assert_eq!(stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 5.0), 2.0);
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let v = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(quantile(&v, 0.0), Some(10.0));
        assert_eq!(quantile(&v, 0.25), Some(17.5));
        assert_eq!(quantile(&v, 0.5), Some(25.0));
        assert_eq!(quantile(&v, 1.0), Some(40.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_describe_skips_nulls() {
        let headways = vec![
            headway(at(8, 0), None),
            headway(at(8, 10), Some(10)),
            headway(at(8, 30), Some(20)),
            headway(at(9, 0), Some(30)),
        ];

        let summary = describe(&headways);
        let stats = summary.stats().unwrap();

        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.median, 20.0);
        assert_eq!(stats.p25, 15.0);
        assert_eq!(stats.p75, 25.0);
    }

    #[test]
    fn test_describe_all_null_is_insufficient() {
        let headways = vec![headway(at(8, 0), None), headway(at(9, 0), None)];
        assert_eq!(describe(&headways), HeadwaySummary::InsufficientData);
        assert_eq!(describe(&Vec::<Headway>::new()), HeadwaySummary::InsufficientData);
    }

    #[test]
    fn test_negative_headway_excluded() {
        let headways = vec![headway(at(8, 10), Some(10)), headway(at(8, 5), Some(-5))];
        let summary = describe(&headways);
        let stats = summary.stats().unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.min, 10.0);
    }

    #[test]
    fn test_awt_from_sum_of_squares() {
        // headways 10 and 20 over a 30 minute span: (100 + 400) / 60
        let headways = vec![
            headway(at(8, 0), None),
            headway(at(8, 10), Some(10)),
            headway(at(8, 30), Some(20)),
        ];
        let awt = average_wait_time(&headways).minutes().unwrap();
        assert!((awt - 500.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_awt_uniform_headway_is_half_headway() {
        let headways = vec![
            headway(at(8, 0), None),
            headway(at(8, 10), Some(10)),
            headway(at(8, 20), Some(10)),
        ];
        assert_eq!(average_wait_time(&headways), WaitTime::Minutes(5.0));
    }

    #[test]
    fn test_awt_single_event_undefined() {
        let headways = vec![headway(at(8, 0), None)];
        assert_eq!(average_wait_time(&headways), WaitTime::Undefined);
        assert_eq!(average_wait_time(&[]), WaitTime::Undefined);
    }

    #[test]
    fn test_awt_identical_timestamps_undefined() {
        let headways = vec![headway(at(8, 0), None), headway(at(8, 0), Some(0))];
        assert_eq!(average_wait_time(&headways), WaitTime::Undefined);
    }

    #[test]
    fn test_stop_wait_time_reports_mean() {
        let key = StopKey::new("1", "East");
        let headways = vec![
            headway(at(8, 0), None),
            headway(at(8, 10), Some(10)),
            headway(at(8, 30), Some(20)),
        ];
        let row = stop_wait_time(&key, &headways);
        assert_eq!(row.events, 3);
        assert_eq!(row.mean_headway, Some(15.0));

        let lonely = stop_wait_time(&key, &headways[..1]);
        assert_eq!(lonely.awt, WaitTime::Undefined);
        assert_eq!(lonely.mean_headway, None);
    }
}

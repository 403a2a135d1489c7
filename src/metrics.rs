//! Reduces telemetry datapoints to scalars.
//!
//! Every method here swallows telemetry errors: the failure is logged and the
//! caller gets the "no activity" value, so a metric fetch never aborts the
//! owning checker.

use time::{Duration, OffsetDateTime};

use crate::provider::{Datapoint, Dimension, MetricQuery, Statistic, TelemetryApi};

/// Datapoints are always requested per day.
pub const PERIOD: Duration = Duration::DAY;

/// The transient description of one metric request.
#[derive(Debug, Clone)]
pub struct MetricWindow<'a> {
    pub namespace: &'a str,
    pub metric_name: &'a str,
    pub dimension: Dimension,
    pub window: Duration,
    pub now: OffsetDateTime,
}

impl MetricWindow<'_> {
    fn query(&self, statistics: Vec<Statistic>) -> MetricQuery {
        MetricQuery {
            namespace: self.namespace.to_string(),
            metric_name: self.metric_name.to_string(),
            dimension: self.dimension.clone(),
            start: self.now - self.window,
            end: self.now,
            period: PERIOD,
            statistics,
        }
    }
}

pub struct MetricAverager<'a, T: TelemetryApi + ?Sized> {
    source: &'a T,
}

impl<'a, T: TelemetryApi + ?Sized> MetricAverager<'a, T> {
    pub fn new(source: &'a T) -> Self {
        Self { source }
    }

    /// Mean of `stat` across the window's datapoints; `0.0` when there are
    /// none or the fetch fails.
    pub fn average(&self, window: &MetricWindow<'_>, stat: Statistic) -> f64 {
        self.mean(window, stat).unwrap_or(0.0)
    }

    /// Like [`average`](Self::average) but keeps "no datapoints" distinct.
    pub fn mean(&self, window: &MetricWindow<'_>, stat: Statistic) -> Option<f64> {
        let points = self.datapoints(window, &[stat]);
        mean_of(&points, stat)
    }

    /// Sum of the per-period `Sum` statistic.
    pub fn total(&self, window: &MetricWindow<'_>) -> f64 {
        self.datapoints(window, &[Statistic::Sum])
            .iter()
            .filter_map(|d| d.sum)
            .sum()
    }

    pub fn datapoints(&self, window: &MetricWindow<'_>, stats: &[Statistic]) -> Vec<Datapoint> {
        let query = window.query(stats.to_vec());
        tracing::debug!(
            namespace = window.namespace,
            metric = window.metric_name,
            dimension = %window.dimension.value,
            "fetching metric statistics"
        );
        match self.source.get_metric_statistics(&query) {
            Ok(points) => points,
            Err(err) => {
                tracing::warn!(
                    metric = window.metric_name,
                    dimension = %window.dimension.value,
                    error = %err,
                    "metric fetch failed, treating as no data"
                );
                Vec::new()
            }
        }
    }
}

/// Arithmetic mean of `stat`; datapoints lacking the statistic count as 0.
pub fn mean_of(points: &[Datapoint], stat: Statistic) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let sum: f64 = points.iter().map(|d| d.value(stat).unwrap_or(0.0)).sum();
    Some(sum / points.len() as f64)
}

pub fn max_of(points: &[Datapoint], stat: Statistic) -> f64 {
    points
        .iter()
        .filter_map(|d| d.value(stat))
        .fold(0.0, f64::max)
}

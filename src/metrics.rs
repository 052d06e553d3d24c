use std::time::{Duration, Instant};

use anyhow::Result;
use opentelemetry::{
    metrics::{Counter, Histogram},
    KeyValue,
};
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider},
    Resource,
};

use crate::config::StorageConfig;

pub fn low_latency_boundaries() -> Vec<f64> {
    vec![
        0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0,
    ]
}

/// Installs the global OTLP meter provider when metrics are enabled.
pub fn init_provider(
    config: &StorageConfig,
    service_version: &str,
) -> Result<Option<SdkMeterProvider>> {
    if !config.telemetry.enable_metrics {
        return Ok(None);
    }

    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.name", "storage-commands"))
        .with_attribute(KeyValue::new("service.instance.id", config.instance_id()))
        .with_attribute(KeyValue::new(
            "service.version",
            service_version.to_string(),
        ))
        .build();

    let mut exporter = MetricExporter::builder().with_tonic();
    if let Some(endpoint) = &config.telemetry.endpoint {
        exporter = exporter.with_endpoint(endpoint.to_owned());
    }
    let exporter = exporter.build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(config.telemetry.metrics_interval)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();

    opentelemetry::global::set_meter_provider(provider.clone());
    Ok(Some(provider))
}

pub trait TimerUpdate {
    fn add(&self, duration: Duration, labels: &[KeyValue]);
}

impl TimerUpdate for Histogram<f64> {
    fn add(&self, duration: Duration, labels: &[KeyValue]) {
        self.record(duration.as_secs_f64(), labels);
    }
}

pub struct Timer<'a, T: TimerUpdate + Sync> {
    start: Instant,
    metric: &'a T,
    labels: &'a [KeyValue],
}

impl<'a, T: TimerUpdate + Sync> Timer<'a, T> {
    #[must_use]
    pub fn start_with_labels(metric: &'a T, labels: &'a [KeyValue]) -> Self {
        Self {
            start: Instant::now(),
            metric,
            labels,
        }
    }
}

impl<T: TimerUpdate + Sync> Drop for Timer<'_, T> {
    fn drop(&mut self) {
        self.metric.add(self.start.elapsed(), self.labels);
    }
}

pub trait AutoIncrement {
    fn increment(&self, labels: &[KeyValue]);
}

impl AutoIncrement for Counter<u64> {
    fn increment(&self, labels: &[KeyValue]) {
        self.add(1, labels);
    }
}

/// Increments the counter when dropped.
pub struct Increment<'a, T: AutoIncrement + Sync> {
    metric: &'a T,
    labels: &'a [KeyValue],
}

impl<'a, T: AutoIncrement + Sync> Increment<'a, T> {
    pub fn inc(metric: &'a T, labels: &'a [KeyValue]) -> Self {
        Self { metric, labels }
    }
}

impl<T: AutoIncrement + Sync> Drop for Increment<'_, T> {
    fn drop(&mut self) {
        self.metric.increment(self.labels);
    }
}

pub mod commands {
    use opentelemetry::{
        metrics::{Counter, Histogram},
        KeyValue,
    };

    use crate::metrics::low_latency_boundaries;

    #[derive(Debug, Clone)]
    pub struct Metrics {
        pub duration: Histogram<f64>,
        pub requests: Counter<u64>,
        pub failures: Counter<u64>,
        pub payload_bytes: Counter<u64>,
    }

    impl Default for Metrics {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Metrics {
        pub fn new() -> Metrics {
            let meter = opentelemetry::global::meter("storage-commands");

            let duration = meter
                .f64_histogram("storage.command_duration")
                .with_unit("s")
                .with_boundaries(low_latency_boundaries())
                .with_description("storage command latencies in seconds")
                .build();
            let requests = meter
                .u64_counter("storage.commands")
                .with_description("number of executed storage commands")
                .build();
            let failures = meter
                .u64_counter("storage.command_failures")
                .with_description("number of storage commands that returned an error")
                .build();
            let payload_bytes = meter
                .u64_counter("storage.payload_bytes")
                .with_description("bytes written by blob add and update commands")
                .build();

            Metrics {
                duration,
                requests,
                failures,
                payload_bytes,
            }
        }

        pub fn record<T, E>(&self, result: &Result<T, E>, labels: &[KeyValue]) {
            if result.is_err() {
                self.failures.add(1, labels);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_disabled_by_default() {
        let config = StorageConfig::default();
        assert!(init_provider(&config, "test").unwrap().is_none());
    }
}

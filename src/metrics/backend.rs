//! `prometheus` crate implementation of [`MetricRegistry`].
//!
//! The crate has no summary or info/enum types, so they are mapped onto what
//! it does have:
//!
//! - Summary: a `HistogramVec`. `_sum` and `_count` carry the same data.
//! - Info: a `GaugeVec` labeled by the info fields, always 1.
//! - Enum: a `GaugeVec` with one extra label named after the metric, 1 for the
//!   current state and 0 for the others.

use crate::error::{RegistryError, Result};
use crate::metrics::registry::{MetricDef, MetricKind, MetricRegistry};
use crate::metrics::schema::ALL_METRICS;
use anyhow::Context;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::{BTreeMap, HashMap};

enum Family {
    Gauge(GaugeVec),
    Summary(HistogramVec),
    Counter(CounterVec),
    Info(GaugeVec),
    Enum(GaugeVec),
}

pub struct PrometheusRegistry {
    registry: Registry,
    families: HashMap<&'static str, Family>,
}

impl PrometheusRegistry {
    /// Registers every metric the exporter publishes.
    pub fn new() -> Result<Self, RegistryError> {
        Self::with_metrics(ALL_METRICS)
    }

    pub fn with_metrics(metrics: &[&MetricDef]) -> Result<Self, RegistryError> {
        let registry = Registry::new();
        let mut families = HashMap::new();

        for metric in metrics {
            let family = match metric.kind {
                MetricKind::Gauge => {
                    let vec = GaugeVec::new(Opts::new(metric.name, metric.help), metric.labels)?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Gauge(vec)
                }
                MetricKind::Summary => {
                    let vec = HistogramVec::new(
                        HistogramOpts::new(metric.name, metric.help),
                        metric.labels,
                    )?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Summary(vec)
                }
                MetricKind::Counter => {
                    let vec = CounterVec::new(Opts::new(metric.name, metric.help), metric.labels)?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Counter(vec)
                }
                MetricKind::Info { fields } => {
                    let vec = GaugeVec::new(Opts::new(metric.name, metric.help), fields)?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Info(vec)
                }
                MetricKind::Enum { .. } => {
                    let mut labels = metric.labels.to_vec();
                    labels.push(metric.name);
                    let vec = GaugeVec::new(Opts::new(metric.name, metric.help), &labels)?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Enum(vec)
                }
            };
            families.insert(metric.name, family);
        }

        tracing::debug!(count = families.len(), "Registered metric families");
        Ok(Self { registry, families })
    }

    /// Renders every registered family in the text exposition format.
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        Ok(String::from_utf8(buffer).context("Encoded metrics are not UTF-8")?)
    }

    fn family(&self, metric: &MetricDef) -> Result<&Family, RegistryError> {
        self.families
            .get(metric.name)
            .ok_or_else(|| RegistryError::UnknownMetric(metric.name.to_string()))
    }
}

impl MetricRegistry for PrometheusRegistry {
    fn set_gauge(
        &self,
        metric: &MetricDef,
        labels: &[&str],
        value: f64,
    ) -> Result<(), RegistryError> {
        match self.family(metric)? {
            Family::Gauge(vec) => {
                vec.get_metric_with_label_values(labels)?.set(value);
                Ok(())
            }
            _ => Err(RegistryError::kind_mismatch(metric.name, "gauge")),
        }
    }

    fn observe_summary(
        &self,
        metric: &MetricDef,
        labels: &[&str],
        value: f64,
    ) -> Result<(), RegistryError> {
        match self.family(metric)? {
            Family::Summary(vec) => {
                vec.get_metric_with_label_values(labels)?.observe(value);
                Ok(())
            }
            _ => Err(RegistryError::kind_mismatch(metric.name, "summary")),
        }
    }

    fn increment_counter(&self, metric: &MetricDef, labels: &[&str]) -> Result<(), RegistryError> {
        match self.family(metric)? {
            Family::Counter(vec) => {
                vec.get_metric_with_label_values(labels)?.inc();
                Ok(())
            }
            _ => Err(RegistryError::kind_mismatch(metric.name, "counter")),
        }
    }

    fn set_info(
        &self,
        metric: &MetricDef,
        info: &BTreeMap<String, String>,
    ) -> Result<(), RegistryError> {
        let (Family::Info(vec), MetricKind::Info { fields }) = (self.family(metric)?, metric.kind)
        else {
            return Err(RegistryError::kind_mismatch(metric.name, "info"));
        };

        if let Some(unknown) = info.keys().find(|k| !fields.contains(&k.as_str())) {
            return Err(RegistryError::UnknownField {
                metric: metric.name.to_string(),
                field: unknown.clone(),
            });
        }

        // fields the page didn't yield are published empty
        let values: Vec<&str> = fields
            .iter()
            .map(|f| info.get(*f).map(String::as_str).unwrap_or(""))
            .collect();

        vec.reset();
        vec.get_metric_with_label_values(&values)?.set(1.0);
        Ok(())
    }

    fn set_enum_state(
        &self,
        metric: &MetricDef,
        labels: &[&str],
        state: &str,
    ) -> Result<(), RegistryError> {
        let (Family::Enum(vec), MetricKind::Enum { states }) = (self.family(metric)?, metric.kind)
        else {
            return Err(RegistryError::kind_mismatch(metric.name, "enum"));
        };

        if !states.contains(&state) {
            return Err(RegistryError::UnknownState {
                metric: metric.name.to_string(),
                state: state.to_string(),
            });
        }

        for candidate in states {
            let mut values = labels.to_vec();
            values.push(*candidate);
            let value = if *candidate == state { 1.0 } else { 0.0 };
            vec.get_metric_with_label_values(&values)?.set(value);
        }
        Ok(())
    }

    fn reset(&self, metric: &MetricDef) -> Result<(), RegistryError> {
        match self.family(metric)? {
            Family::Gauge(vec) | Family::Info(vec) | Family::Enum(vec) => vec.reset(),
            Family::Summary(vec) => vec.reset(),
            Family::Counter(vec) => vec.reset(),
        }
        Ok(())
    }
}

use crate::error::RegistryError;
use std::collections::BTreeMap;
use std::fmt;

/// The kind of a metric, fixed when the metric is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A value that can go up and down
    Gauge,
    /// A stream of observations, exported as sum and count
    Summary,
    /// A monotonically increasing count
    Counter,
    /// Constant string facts, exported as labels on a `_info` series
    Info {
        /// Field names, in label order
        fields: &'static [&'static str],
    },
    /// A value drawn from a closed set of states
    Enum {
        /// Every state the metric can take
        states: &'static [&'static str],
    },
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Summary => write!(f, "summary"),
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Info { .. } => write!(f, "info"),
            MetricKind::Enum { .. } => write!(f, "enum"),
        }
    }
}

/// A static handle to one metric family.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDef {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    /// Label names, in the order label values are passed
    pub labels: &'static [&'static str],
}

/// Sink for metric updates.
///
/// Every method addresses one series of one family and is independent of
/// every other call, so readers may observe the registry at any time.
/// Implementors must be thread-safe to be shared with the exposition endpoint.
pub trait MetricRegistry: Send + Sync {
    /// Sets a gauge series to `value`.
    fn set_gauge(&self, metric: &MetricDef, labels: &[&str], value: f64)
        -> Result<(), RegistryError>;

    /// Records one observation on a summary series.
    fn observe_summary(
        &self,
        metric: &MetricDef,
        labels: &[&str],
        value: f64,
    ) -> Result<(), RegistryError>;

    /// Adds one to a counter series.
    fn increment_counter(&self, metric: &MetricDef, labels: &[&str]) -> Result<(), RegistryError>;

    /// Replaces the facts carried by an info metric.
    fn set_info(
        &self,
        metric: &MetricDef,
        info: &BTreeMap<String, String>,
    ) -> Result<(), RegistryError>;

    /// Sets the current state of an enum series.
    fn set_enum_state(
        &self,
        metric: &MetricDef,
        labels: &[&str],
        state: &str,
    ) -> Result<(), RegistryError>;

    /// Drops every series of a family. Only used before recounting
    /// cumulative-count families.
    fn reset(&self, metric: &MetricDef) -> Result<(), RegistryError>;
}

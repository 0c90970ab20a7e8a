//! Mock implementations and server helpers for testing.
//!
//! This module provides a recording [`MetricRegistry`] and a mock modem
//! server builder for testing HTTP interactions with the SB8200.

use crate::error::RegistryError;
use crate::metrics::registry::{MetricDef, MetricRegistry};
use std::collections::BTreeMap;
use std::sync::Mutex;
use wiremock::matchers::{header, method, path};
use wiremock::{Match, Mock as WireMock, MockServer, Request, ResponseTemplate};

/// One call made against a [`RecordingRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricUpdate {
    Gauge {
        name: &'static str,
        labels: Vec<String>,
        value: f64,
    },
    Summary {
        name: &'static str,
        labels: Vec<String>,
        value: f64,
    },
    Counter {
        name: &'static str,
        labels: Vec<String>,
    },
    Info {
        name: &'static str,
        info: BTreeMap<String, String>,
    },
    Enum {
        name: &'static str,
        labels: Vec<String>,
        state: String,
    },
    Reset {
        name: &'static str,
    },
}

/// Registry that records every call in order and never fails.
#[derive(Debug, Default)]
pub struct RecordingRegistry {
    updates: Mutex<Vec<MetricUpdate>>,
}

fn owned(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|l| l.to_string()).collect()
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, update: MetricUpdate) {
        self.updates.lock().unwrap().push(update);
    }

    /// Every recorded call, in order.
    pub fn updates(&self) -> Vec<MetricUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// Every `set_gauge` call on `name`, in order.
    pub fn gauges(&self, name: &str) -> Vec<(Vec<String>, f64)> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                MetricUpdate::Gauge {
                    name: n,
                    labels,
                    value,
                } if n == name => Some((labels, value)),
                _ => None,
            })
            .collect()
    }

    /// Gauge series of `name` as they stand after resets, sorted by labels.
    pub fn current_gauges(&self, name: &str) -> Vec<(Vec<String>, f64)> {
        let mut current: BTreeMap<Vec<String>, f64> = BTreeMap::new();
        for update in self.updates() {
            match update {
                MetricUpdate::Reset { name: n } if n == name => current.clear(),
                MetricUpdate::Gauge {
                    name: n,
                    labels,
                    value,
                } if n == name => {
                    current.insert(labels, value);
                }
                _ => {}
            }
        }
        current.into_iter().collect()
    }

    /// Every `observe_summary` call on `name`, in order.
    pub fn summaries(&self, name: &str) -> Vec<(Vec<String>, f64)> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                MetricUpdate::Summary {
                    name: n,
                    labels,
                    value,
                } if n == name => Some((labels, value)),
                _ => None,
            })
            .collect()
    }

    /// How many times the counter series was incremented.
    pub fn counter_total(&self, name: &str, labels: &[&str]) -> usize {
        let labels = owned(labels);
        self.updates()
            .iter()
            .filter(|u| match u {
                MetricUpdate::Counter { name: n, labels: l } => *n == name && *l == labels,
                _ => false,
            })
            .count()
    }

    /// Every `set_enum_state` call on `name`, in order.
    pub fn enum_states(&self, name: &str) -> Vec<(Vec<String>, String)> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                MetricUpdate::Enum {
                    name: n,
                    labels,
                    state,
                } if n == name => Some((labels, state)),
                _ => None,
            })
            .collect()
    }

    pub fn last_info(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.updates().into_iter().rev().find_map(|u| match u {
            MetricUpdate::Info { name: n, info } if n == name => Some(info),
            _ => None,
        })
    }

    /// Names of every family that received a value, without duplicates.
    pub fn touched(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .updates()
            .iter()
            .filter_map(|u| match u {
                MetricUpdate::Gauge { name, .. }
                | MetricUpdate::Summary { name, .. }
                | MetricUpdate::Counter { name, .. }
                | MetricUpdate::Info { name, .. }
                | MetricUpdate::Enum { name, .. } => Some(*name),
                MetricUpdate::Reset { .. } => None,
            })
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl MetricRegistry for RecordingRegistry {
    fn set_gauge(
        &self,
        metric: &MetricDef,
        labels: &[&str],
        value: f64,
    ) -> Result<(), RegistryError> {
        self.record(MetricUpdate::Gauge {
            name: metric.name,
            labels: owned(labels),
            value,
        });
        Ok(())
    }

    fn observe_summary(
        &self,
        metric: &MetricDef,
        labels: &[&str],
        value: f64,
    ) -> Result<(), RegistryError> {
        self.record(MetricUpdate::Summary {
            name: metric.name,
            labels: owned(labels),
            value,
        });
        Ok(())
    }

    fn increment_counter(&self, metric: &MetricDef, labels: &[&str]) -> Result<(), RegistryError> {
        self.record(MetricUpdate::Counter {
            name: metric.name,
            labels: owned(labels),
        });
        Ok(())
    }

    fn set_info(
        &self,
        metric: &MetricDef,
        info: &BTreeMap<String, String>,
    ) -> Result<(), RegistryError> {
        self.record(MetricUpdate::Info {
            name: metric.name,
            info: info.clone(),
        });
        Ok(())
    }

    fn set_enum_state(
        &self,
        metric: &MetricDef,
        labels: &[&str],
        state: &str,
    ) -> Result<(), RegistryError> {
        self.record(MetricUpdate::Enum {
            name: metric.name,
            labels: owned(labels),
            state: state.to_string(),
        });
        Ok(())
    }

    fn reset(&self, metric: &MetricDef) -> Result<(), RegistryError> {
        self.record(MetricUpdate::Reset { name: metric.name });
        Ok(())
    }
}

/// Matches the raw query string. The modem's queries are bare keys
/// (`?ct_abc123`), which the key/value matchers don't describe well.
pub struct QueryMatcher {
    expected: String,
    prefix: bool,
}

pub fn query_exact(expected: impl Into<String>) -> QueryMatcher {
    QueryMatcher {
        expected: expected.into(),
        prefix: false,
    }
}

pub fn query_prefix(expected: impl Into<String>) -> QueryMatcher {
    QueryMatcher {
        expected: expected.into(),
        prefix: true,
    }
}

impl Match for QueryMatcher {
    fn matches(&self, request: &Request) -> bool {
        match request.url.query() {
            Some(query) if self.prefix => query.starts_with(&self.expected),
            Some(query) => query == self.expected,
            None => false,
        }
    }
}

pub const STATUS_PATH: &str = "/cmconnectionstatus.html";
pub const INFO_PATH: &str = "/cmswinfo.html";

/// Builder for creating wiremock server mocks for modem endpoints.
pub struct MockModemServerBuilder {
    server: MockServer,
}

impl MockModemServerBuilder {
    /// Creates a new mock modem server builder.
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Mocks a successful login answering with `token` and a session cookie.
    pub async fn mock_login(self, token: &str) -> Self {
        WireMock::given(method("GET"))
            .and(path(STATUS_PATH))
            .and(query_prefix("login_"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("set-cookie", "sessionId=42; Path=/")
                    .append_header("set-cookie", "HttpOnly=true")
                    .set_body_string(token),
            )
            .mount(&self.server)
            .await;
        self
    }

    /// Mocks a login that is expected exactly `times` times.
    pub async fn mock_login_with_expectation(self, token: &str, times: u64) -> Self {
        WireMock::given(method("GET"))
            .and(path(STATUS_PATH))
            .and(query_prefix("login_"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("set-cookie", "sessionId=42; Path=/")
                    .append_header("set-cookie", "HttpOnly=true")
                    .set_body_string(token),
            )
            .expect(times)
            .mount(&self.server)
            .await;
        self
    }

    /// Mocks a login answering with `status`.
    pub async fn mock_login_status(self, status: u16) -> Self {
        WireMock::given(method("GET"))
            .and(path(STATUS_PATH))
            .and(query_prefix("login_"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
        self
    }

    /// Mocks an authenticated page fetched with `token` and the session cookie.
    pub async fn mock_page(self, page_path: &str, token: &str, body: &str) -> Self {
        WireMock::given(method("GET"))
            .and(path(page_path))
            .and(query_exact(format!("ct_{}", token)))
            .and(header("cookie", "HttpOnly=true; sessionId=42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
        self
    }

    /// Mocks an authenticated page answering with `status`.
    pub async fn mock_page_status(self, page_path: &str, token: &str, status: u16) -> Self {
        WireMock::given(method("GET"))
            .and(path(page_path))
            .and(query_exact(format!("ct_{}", token)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
        self
    }

    /// Builds and returns the configured mock server.
    pub fn build(self) -> MockServer {
        self.server
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::schema::{DS_LOCK_STATUS, PARSE_RESULT};

    #[tokio::test]
    async fn test_mock_modem_server_builder() {
        let server = MockModemServerBuilder::new()
            .await
            .mock_login("abc123")
            .await
            .build();

        let url = server.uri();
        assert!(url.starts_with("http://"));
    }

    #[test]
    fn test_recording_registry_tracks_resets() {
        let registry = RecordingRegistry::new();
        registry.set_gauge(&DS_LOCK_STATUS, &["LOCKED"], 2.0).unwrap();
        registry.reset(&DS_LOCK_STATUS).unwrap();
        registry.set_gauge(&DS_LOCK_STATUS, &["NOT_LOCKED"], 1.0).unwrap();
        registry.increment_counter(&PARSE_RESULT, &["startup", "true"]).unwrap();

        assert_eq!(registry.gauges(DS_LOCK_STATUS.name).len(), 2);
        assert_eq!(
            registry.current_gauges(DS_LOCK_STATUS.name),
            vec![(vec!["NOT_LOCKED".to_string()], 1.0)]
        );
        assert_eq!(registry.counter_total(PARSE_RESULT.name, &["startup", "true"]), 1);
        assert_eq!(registry.touched(), vec![PARSE_RESULT.name, DS_LOCK_STATUS.name]);
    }
}

//! Projection of extracted rows onto registry updates.
//!
//! Nothing here returns early on a bad cell or row. Failures are logged with
//! enough context to find the offending markup, counted, and skipped.

use crate::error::ParseError;
use crate::metrics::registry::{MetricDef, MetricRegistry};
use crate::metrics::schema::{
    self, Aggregation, Sample, StateMetric, StateSpec, TableSchema, CELL_CONVERSION_ERRORS,
    DROPPED_ROWS, MODEM_INFO, MODEM_UPTIME, PARSE_RESULT, PRODUCT_INFO_LABELS,
    STARTUP_PARSE_TARGET, STARTUP_SECTION, UPTIME_LABEL,
};
use crate::modem::fields::{
    leading_number, map_state, normalize_label_value, parse_system_time, parse_uptime,
};
use crate::modem::html::{self, RawTable, StateRow};
use chrono::NaiveDateTime;
use scraper::Html;
use std::collections::{BTreeMap, HashMap};

pub const PRODUCT_INFO_PARSE_TARGET: &str = "product_info";
pub const DATETIME_PARSE_TARGET: &str = "datetime";

/// Counts from one projection pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectionResult {
    pub rows_seen: usize,
    pub rows_projected: usize,
    pub rows_dropped: usize,
    pub cell_errors: usize,
}

fn log_registry_error(metric: &MetricDef, result: Result<(), crate::error::RegistryError>) {
    if let Err(e) = result {
        tracing::warn!(metric = metric.name, error = %e, "Failed to update metric");
    }
}

/// Records one parse attempt for `parse_target`.
pub fn record_parse_outcome(registry: &dyn MetricRegistry, parse_target: &str, ok: bool) {
    let outcome = if ok { "true" } else { "false" };
    log_registry_error(
        &PARSE_RESULT,
        registry.increment_counter(&PARSE_RESULT, &[parse_target, outcome]),
    );
}

fn record_cell_error(registry: &dyn MetricRegistry, parse_target: &str) {
    log_registry_error(
        &CELL_CONVERSION_ERRORS,
        registry.increment_counter(&CELL_CONVERSION_ERRORS, &[parse_target]),
    );
}

fn record_dropped_row(registry: &dyn MetricRegistry, parse_target: &str) {
    log_registry_error(
        &DROPPED_ROWS,
        registry.increment_counter(&DROPPED_ROWS, &[parse_target]),
    );
}

/// Projects the rows of one table family.
///
/// Per-entity columns become one series per row, labeled by the entity id.
/// Cumulative columns are tallied over every accepted row and then replace the
/// family wholesale. When no row is accepted the cumulative families keep
/// their previous values.
pub fn project_rows(
    table: &RawTable,
    schema: &TableSchema,
    registry: &dyn MetricRegistry,
) -> ProjectionResult {
    let mut result = ProjectionResult {
        rows_seen: table.rows.len(),
        ..Default::default()
    };

    let Some(entity_index) = schema.entity_index() else {
        tracing::error!(
            parse_target = schema.parse_target,
            columns = ?schema.column_names(),
            "Schema has no entity id column"
        );
        return result;
    };

    let mut tallies: Vec<(&'static MetricDef, BTreeMap<String, usize>)> = schema
        .columns
        .iter()
        .filter_map(|c| match c.aggregation {
            Aggregation::CumulativeCount(metric) => Some((metric, BTreeMap::new())),
            _ => None,
        })
        .collect();

    for (row_idx, row) in table.rows.iter().enumerate() {
        if row.len() != schema.width() {
            tracing::error!(
                parse_target = schema.parse_target,
                row_idx,
                expected = ?schema.column_names(),
                data = ?row,
                "Unexpected number of columns for row"
            );
            result.rows_dropped += 1;
            record_dropped_row(registry, schema.parse_target);
            continue;
        }

        let entity = row[entity_index].trim();
        if entity.is_empty() {
            tracing::error!(
                parse_target = schema.parse_target,
                row_idx,
                data = ?row,
                "Row has no entity id"
            );
            result.rows_dropped += 1;
            record_dropped_row(registry, schema.parse_target);
            continue;
        }

        tracing::debug!(parse_target = schema.parse_target, row_idx, entity, "Processing row");

        let mut tally = tallies.iter_mut();
        for (column, cell) in schema.columns.iter().zip(row) {
            match &column.aggregation {
                Aggregation::EntityId | Aggregation::Ignored => {}
                Aggregation::CumulativeCount(_) => {
                    if let Some((_, counts)) = tally.next() {
                        *counts.entry(normalize_label_value(cell)).or_insert(0) += 1;
                    }
                }
                Aggregation::PerEntity(sample) => {
                    let value = match leading_number(column.name, cell) {
                        Ok(value) => value,
                        Err(e) => {
                            tracing::error!(
                                parse_target = schema.parse_target,
                                row_idx,
                                column = column.name,
                                raw = %cell,
                                error = %e,
                                "Failed to convert cell"
                            );
                            result.cell_errors += 1;
                            record_cell_error(registry, schema.parse_target);
                            continue;
                        }
                    };
                    match sample {
                        Sample::Gauge(metric) => {
                            log_registry_error(metric, registry.set_gauge(metric, &[entity], value))
                        }
                        Sample::Summary(metric) => log_registry_error(
                            metric,
                            registry.observe_summary(metric, &[entity], value),
                        ),
                    }
                }
            }
        }
        result.rows_projected += 1;
    }

    if result.rows_projected == 0 {
        if !tallies.is_empty() {
            tracing::warn!(
                parse_target = schema.parse_target,
                "No rows accepted; keeping previous cumulative counts"
            );
        }
        return result;
    }

    for (metric, counts) in &tallies {
        log_registry_error(metric, registry.reset(metric));
        for (value, count) in counts {
            log_registry_error(
                metric,
                registry.set_gauge(metric, &[value.as_str()], *count as f64),
            );
        }
    }

    result
}

/// Extracts and projects one table family, recording the parse outcome.
pub fn project_table(
    document: &Html,
    schema: &TableSchema,
    registry: &dyn MetricRegistry,
) -> Result<ProjectionResult, ParseError> {
    let table = match html::extract_rows(document, schema.section) {
        Ok(table) => table,
        Err(e) => {
            tracing::error!(
                parse_target = schema.parse_target,
                error = %e,
                "Failed to extract table"
            );
            record_parse_outcome(registry, schema.parse_target, false);
            return Err(e);
        }
    };

    tracing::info!(
        parse_target = schema.parse_target,
        count = table.rows.len(),
        "Updating channel metrics"
    );
    let result = project_rows(&table, schema, registry);
    record_parse_outcome(registry, schema.parse_target, true);
    Ok(result)
}

/// Projects the key/value/comment rows of the startup procedure.
pub fn project_startup(
    section: &HashMap<String, StateRow>,
    specs: &[StateSpec],
    registry: &dyn MetricRegistry,
) -> ProjectionResult {
    let mut result = ProjectionResult {
        rows_seen: section.len(),
        ..Default::default()
    };

    for spec in specs {
        let Some(row) = section.get(spec.key) else {
            tracing::debug!(key = spec.key, "Startup procedure key not on page");
            continue;
        };
        result.rows_projected += 1;

        match &spec.metric {
            None => {}
            Some(StateMetric::Gauge(metric)) => match leading_number(spec.key, &row.value) {
                Ok(value) => log_registry_error(
                    metric,
                    registry.set_gauge(metric, &[row.comment.as_str()], value),
                ),
                Err(e) => {
                    tracing::error!(
                        parse_target = STARTUP_PARSE_TARGET,
                        key = spec.key,
                        raw = %row.value,
                        error = %e,
                        "Failed to convert startup value"
                    );
                    result.cell_errors += 1;
                    record_cell_error(registry, STARTUP_PARSE_TARGET);
                }
            },
            Some(StateMetric::Enum {
                metric,
                values,
                default,
            }) => {
                let state = map_state(&row.value, values, default);
                log_registry_error(
                    metric,
                    registry.set_enum_state(metric, &[row.comment.as_str()], state),
                );
            }
        }
    }

    result
}

/// Extracts and projects the startup procedure, recording the parse outcome.
pub fn project_startup_section(
    document: &Html,
    registry: &dyn MetricRegistry,
) -> Result<ProjectionResult, ParseError> {
    let keys = schema::startup_keys();
    match html::extract_key_value_section(document, STARTUP_SECTION, &keys) {
        Ok(section) => {
            let result = project_startup(&section, schema::STARTUP, registry);
            record_parse_outcome(registry, STARTUP_PARSE_TARGET, true);
            Ok(result)
        }
        Err(e) => {
            tracing::error!(
                parse_target = STARTUP_PARSE_TARGET,
                error = %e,
                "Failed to extract startup procedure"
            );
            record_parse_outcome(registry, STARTUP_PARSE_TARGET, false);
            Err(e)
        }
    }
}

/// Projects the product-info page values.
///
/// Uptime is the only number on the page. When it is missing the rest of the
/// page is usually missing too, so it decides the parse outcome. Returns
/// whether uptime was parsed.
pub fn project_product_info(
    values: &HashMap<String, String>,
    registry: &dyn MetricRegistry,
) -> bool {
    let uptime = values.get(UPTIME_LABEL).and_then(|raw| parse_uptime(raw));
    let parsed = match uptime {
        Some(uptime) => {
            log_registry_error(
                &MODEM_UPTIME,
                registry.set_gauge(&MODEM_UPTIME, &[], uptime.as_secs_f64()),
            );
            true
        }
        None => {
            tracing::error!(
                uptime = ?values.get(UPTIME_LABEL),
                "Failed to parse uptime. Scrape issue?"
            );
            false
        }
    };
    record_parse_outcome(registry, PRODUCT_INFO_PARSE_TARGET, parsed);

    let info: BTreeMap<String, String> = PRODUCT_INFO_LABELS
        .iter()
        .filter_map(|(label, field)| values.get(*label).map(|v| (field.to_string(), v.clone())))
        .collect();

    // an empty write would erase the last good value
    if info.is_empty() {
        tracing::warn!("No modem info parsed; keeping previous value");
    } else {
        tracing::debug!(?info, "Modem info");
        log_registry_error(&MODEM_INFO, registry.set_info(&MODEM_INFO, &info));
    }

    parsed
}

/// Extracts and projects the product-info page.
pub fn project_product_page(document: &Html, registry: &dyn MetricRegistry) -> bool {
    let mut labels: Vec<&str> = PRODUCT_INFO_LABELS.iter().map(|(label, _)| *label).collect();
    labels.push(UPTIME_LABEL);

    match html::extract_labelled_values(document, &labels) {
        Ok(values) => project_product_info(&values, registry),
        Err(e) => {
            tracing::error!(
                parse_target = PRODUCT_INFO_PARSE_TARGET,
                error = %e,
                "Failed to extract product info"
            );
            record_parse_outcome(registry, PRODUCT_INFO_PARSE_TARGET, false);
            false
        }
    }
}

/// Parses the device clock. Only the parse outcome is published.
pub fn project_system_time(
    document: &Html,
    registry: &dyn MetricRegistry,
) -> Option<NaiveDateTime> {
    let parsed = html::extract_system_time_text(document).and_then(|t| parse_system_time(&t));
    match parsed {
        Some(time) => tracing::debug!(%time, "Modem system time"),
        None => tracing::error!("Failed to parse modem system time. HTML scrape error?"),
    }
    record_parse_outcome(registry, DATETIME_PARSE_TARGET, parsed.is_some());
    parsed
}

/// Runs every projection of the connection-status page.
///
/// Each family is independent, so a missing table does not stop the others.
pub fn project_connection_page(document: &Html, registry: &dyn MetricRegistry) {
    project_system_time(document, registry);
    // failures are already logged and counted
    let _ = project_table(document, &schema::DOWNSTREAM, registry);
    let _ = project_table(document, &schema::UPSTREAM, registry);
    let _ = project_startup_section(document, registry);
}

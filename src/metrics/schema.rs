//! Metric definitions and the column layouts that feed them.
//!
//! The device does not give us usable column headers (see `modem::html`), so
//! every table family is described here as an ordered list of columns. The
//! position of a [`ColumnSpec`] in its slice is the position of the cell in
//! each row. If the firmware changes the layout, only this file should need to
//! change.

use super::registry::{MetricDef, MetricKind};

macro_rules! metric {
    ($vis:vis $ident:ident, $name:expr, $help:expr, $kind:expr, [$($label:expr),* $(,)?]) => {
        $vis static $ident: MetricDef = MetricDef {
            name: $name,
            help: $help,
            kind: $kind,
            labels: &[$($label),*],
        };
    };
}

// Meta metrics: how the scrape itself is going.

metric!(pub REQUEST_DURATION, "meta_request_duration_seconds",
    "Time spent waiting for modem to respond", MetricKind::Summary, ["scrape_target"]);
metric!(pub SCRAPE_RESULT, "meta_scrape_result_total",
    "Count of successful vs failed scrapes", MetricKind::Counter, ["http_code", "scrape_target"]);
metric!(pub PARSE_RESULT, "meta_parse_result_total",
    "Count of successful vs failed parse attempts", MetricKind::Counter,
    ["parse_target", "parse_result"]);
metric!(pub CELL_CONVERSION_ERRORS, "meta_cell_conversion_errors_total",
    "Count of table cells that could not be converted to a metric value", MetricKind::Counter,
    ["parse_target"]);
metric!(pub DROPPED_ROWS, "meta_dropped_rows_total",
    "Count of table rows dropped because they did not match the expected layout",
    MetricKind::Counter, ["parse_target"]);

// Hardware info.

pub const MODEM_INFO_FIELDS: &[&str] =
    &["docsis_version", "software_version", "mac_address", "serial_number"];

metric!(pub MODEM_INFO, "sb8200_modem_info", "Assorted Modem Info",
    MetricKind::Info { fields: MODEM_INFO_FIELDS }, []);
metric!(pub MODEM_UPTIME, "sb8200_modem_uptime_seconds",
    "Count of seconds since modem was last booted.", MetricKind::Gauge, []);

/// Product-info page labels and the info field each one feeds.
pub const PRODUCT_INFO_LABELS: &[(&str, &str)] = &[
    ("Standard Specification Compliant", "docsis_version"),
    ("Software Version", "software_version"),
    ("Cable Modem MAC Address", "mac_address"),
    ("Serial Number", "serial_number"),
];

pub const UPTIME_LABEL: &str = "Up Time";

// Startup procedure.

const OK_STATES: &[&str] = &["ok", "not_ok"];

metric!(pub STARTUP_DOWNSTREAM_HZ, "sb8200_startup_downstream_channel_hz",
    "Initial frequency of the downstream channel.", MetricKind::Gauge, ["comment"]);
metric!(pub STARTUP_CONNECTIVITY, "sb8200_startup_connectivity_state",
    "Indicates if DOCSIS network detected.", MetricKind::Enum { states: OK_STATES }, ["comment"]);
metric!(pub STARTUP_CONFIG_FILE, "sb8200_startup_config_state",
    "Indicates if head-end provisioning file is valid.", MetricKind::Enum { states: OK_STATES },
    ["comment"]);
metric!(pub STARTUP_SECURITY, "sb8200_startup_security_state",
    "Indicates if DOCSIS layer 1/2 security in effect.",
    MetricKind::Enum { states: &["enabled", "not_enabled"] }, ["comment"]);
metric!(pub STARTUP_NETWORK_ACCESS, "sb8200_startup_docsis_net_access_state",
    "Indicates if the modem is authorized to access the DOCSIS network.",
    MetricKind::Enum { states: &["allowed", "not_allowed"] }, ["comment"]);

// Downstream channels.

metric!(pub DS_LOCK_STATUS, "sb8200_downstream_channel_lock_status_count",
    "Lock/Not Lock status of the channel.", MetricKind::Gauge, ["lock_status"]);
metric!(pub DS_MODULATION, "sb8200_downstream_modulation_scheme_count",
    "Count of modulation scheme of the channel.", MetricKind::Gauge, ["modulation_scheme"]);
metric!(pub DS_FREQUENCY, "sb8200_downstream_frequency_hz",
    "Frequency of the channel.", MetricKind::Gauge, ["channel_id"]);
metric!(pub DS_POWER, "sb8200_downstream_power_dbmv",
    "Received power of the channel.", MetricKind::Gauge, ["channel_id"]);
metric!(pub DS_SNR, "sb8200_downstream_snr_dbmv",
    "Signal to Noise Ratio / Modulation Error Ratio of the channel.", MetricKind::Gauge,
    ["channel_id"]);
metric!(pub DS_CORRECTED, "sb8200_downstream_corrected",
    "Count of corrected errors on the channel.", MetricKind::Summary, ["channel_id"]);
metric!(pub DS_UNCORRECTABLE, "sb8200_downstream_uncorrectable",
    "Count of uncorrectable errors on the channel.", MetricKind::Summary, ["channel_id"]);

// Upstream channels.

metric!(pub US_LOCK_STATUS, "sb8200_upstream_channel_lock_count",
    "Lock/Not Lock status of the channel.", MetricKind::Gauge, ["lock_status"]);
metric!(pub US_CHANNEL_TYPE, "sb8200_upstream_channel_type",
    "Modulation scheme of the channel.", MetricKind::Gauge, ["modulation_scheme"]);
metric!(pub US_FREQUENCY, "sb8200_upstream_frequency_hz",
    "Frequency of the upstream channel.", MetricKind::Gauge, ["channel_id"]);
metric!(pub US_WIDTH, "sb8200_upstream_ch_width_hz",
    "Width of upstream channel.", MetricKind::Gauge, ["channel_id"]);
metric!(pub US_POWER, "sb8200_upstream_power_dbmv",
    "Transmit power of the channel.", MetricKind::Gauge, ["channel_id"]);

/// Every metric the exporter publishes, for registration.
pub static ALL_METRICS: &[&MetricDef] = &[
    &REQUEST_DURATION,
    &SCRAPE_RESULT,
    &PARSE_RESULT,
    &CELL_CONVERSION_ERRORS,
    &DROPPED_ROWS,
    &MODEM_INFO,
    &MODEM_UPTIME,
    &STARTUP_DOWNSTREAM_HZ,
    &STARTUP_CONNECTIVITY,
    &STARTUP_CONFIG_FILE,
    &STARTUP_SECURITY,
    &STARTUP_NETWORK_ACCESS,
    &DS_LOCK_STATUS,
    &DS_MODULATION,
    &DS_FREQUENCY,
    &DS_POWER,
    &DS_SNR,
    &DS_CORRECTED,
    &DS_UNCORRECTABLE,
    &US_LOCK_STATUS,
    &US_CHANNEL_TYPE,
    &US_FREQUENCY,
    &US_WIDTH,
    &US_POWER,
];

/// How a per-row value is recorded.
#[derive(Debug, PartialEq)]
pub enum Sample {
    Gauge(&'static MetricDef),
    Summary(&'static MetricDef),
}

/// What happens to the cells of one column.
#[derive(Debug, PartialEq)]
pub enum Aggregation {
    /// The row's entity identifier; used as a label, never as a value
    EntityId,
    /// One series per row, labeled by entity id
    PerEntity(Sample),
    /// One series per distinct value, holding how many rows carry it
    CumulativeCount(&'static MetricDef),
    /// Present in the markup, not published
    Ignored,
}

#[derive(Debug, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub aggregation: Aggregation,
}

/// Ordered layout of one table family.
#[derive(Debug)]
pub struct TableSchema {
    /// Heading text that locates the table
    pub section: &'static str,
    /// Label used for parse-outcome accounting
    pub parse_target: &'static str,
    pub columns: &'static [ColumnSpec],
}

impl TableSchema {
    /// Number of cells a well-formed row carries.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Position of the entity identifier column.
    pub fn entity_index(&self) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.aggregation == Aggregation::EntityId)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

const fn entity(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        aggregation: Aggregation::EntityId,
    }
}

const fn ignored(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        aggregation: Aggregation::Ignored,
    }
}

const fn count(name: &'static str, metric: &'static MetricDef) -> ColumnSpec {
    ColumnSpec {
        name,
        aggregation: Aggregation::CumulativeCount(metric),
    }
}

const fn gauge(name: &'static str, metric: &'static MetricDef) -> ColumnSpec {
    ColumnSpec {
        name,
        aggregation: Aggregation::PerEntity(Sample::Gauge(metric)),
    }
}

const fn summary(name: &'static str, metric: &'static MetricDef) -> ColumnSpec {
    ColumnSpec {
        name,
        aggregation: Aggregation::PerEntity(Sample::Summary(metric)),
    }
}

// Row layout: ['4', 'Locked', 'QAM256', '363000000 Hz', '6.2 dBmV', '40.5 dB', '0', '0']
pub static DOWNSTREAM: TableSchema = TableSchema {
    section: "Downstream Bonded Channels",
    parse_target: "conn_downstream",
    columns: &[
        entity("Channel ID"),
        count("Lock Status", &DS_LOCK_STATUS),
        count("Modulation", &DS_MODULATION),
        gauge("Frequency", &DS_FREQUENCY),
        gauge("Power", &DS_POWER),
        gauge("SNR/MER", &DS_SNR),
        summary("Corrected", &DS_CORRECTED),
        summary("Uncorrectables", &DS_UNCORRECTABLE),
    ],
};

// Row layout: ['1', '1', 'Locked', 'SC-QAM Upstream', '10400000 Hz', '3200000 Hz', '43.0 dBmV']
pub static UPSTREAM: TableSchema = TableSchema {
    section: "Upstream Bonded Channels",
    parse_target: "conn_upstream",
    columns: &[
        // a row counter, like a spreadsheet's
        ignored("Channel"),
        entity("Channel ID"),
        count("Lock Status", &US_LOCK_STATUS),
        count("US Channel Type", &US_CHANNEL_TYPE),
        gauge("Frequency", &US_FREQUENCY),
        gauge("Width", &US_WIDTH),
        gauge("Power", &US_POWER),
    ],
};

/// How one startup-procedure value is published.
#[derive(Debug)]
pub enum StateMetric {
    /// Leading number of the value, labeled by comment
    Gauge(&'static MetricDef),
    /// Raw value mapped onto a declared state
    Enum {
        metric: &'static MetricDef,
        values: &'static [(&'static str, &'static str)],
        default: &'static str,
    },
}

#[derive(Debug)]
pub struct StateSpec {
    pub key: &'static str,
    pub metric: Option<StateMetric>,
}

pub const STARTUP_SECTION: &str = "Startup Procedure";
pub const STARTUP_PARSE_TARGET: &str = "startup";

pub static STARTUP: &[StateSpec] = &[
    // {'Value': '363000000 Hz', 'Comment': 'Locked'}
    StateSpec {
        key: "Acquire Downstream Channel",
        metric: Some(StateMetric::Gauge(&STARTUP_DOWNSTREAM_HZ)),
    },
    StateSpec {
        key: "Connectivity State",
        metric: Some(StateMetric::Enum {
            metric: &STARTUP_CONNECTIVITY,
            values: &[("OK", "ok")],
            default: "not_ok",
        }),
    },
    // no useful set of states to map
    StateSpec {
        key: "Boot State",
        metric: None,
    },
    StateSpec {
        key: "Configuration File",
        metric: Some(StateMetric::Enum {
            metric: &STARTUP_CONFIG_FILE,
            values: &[("OK", "ok")],
            default: "not_ok",
        }),
    },
    StateSpec {
        key: "Security",
        metric: Some(StateMetric::Enum {
            metric: &STARTUP_SECURITY,
            values: &[("Enabled", "enabled")],
            default: "not_enabled",
        }),
    },
    StateSpec {
        key: "DOCSIS Network Access Enabled",
        metric: Some(StateMetric::Enum {
            metric: &STARTUP_NETWORK_ACCESS,
            values: &[("Allowed", "allowed")],
            default: "not_allowed",
        }),
    },
];

/// Keys of the startup section worth extracting.
pub fn startup_keys() -> Vec<&'static str> {
    STARTUP.iter().map(|s| s.key).collect()
}

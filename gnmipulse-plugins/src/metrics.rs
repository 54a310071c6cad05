//! Self-monitoring sample helpers shared by all plugins.

use gnmipulse_exporter::{DescriptorSpec, Sample, ValueKind, SRC_PLUGIN};

pub(crate) const PARSER_METRIC_NAME: &str = "plugin_parser";
pub(crate) const FORMATTER_METRIC_NAME: &str = "plugin_formatter";
const PARSER_METRIC_HELP: &str = "Plugin parser statistics";
const FORMATTER_METRIC_HELP: &str = "Plugin formatter statistics";
const SELF_MON_LABEL_KEYS: &[&str] = &["plugin_name", "metric"];

/// Descriptor of the parser self-monitoring counter family.
pub fn parser_descriptor() -> DescriptorSpec {
    DescriptorSpec {
        source: SRC_PLUGIN,
        name: PARSER_METRIC_NAME,
        help: PARSER_METRIC_HELP,
        kind: ValueKind::Counter,
        label_keys: SELF_MON_LABEL_KEYS,
    }
}

/// Descriptor of the formatter self-monitoring gauge family.
pub fn formatter_descriptor() -> DescriptorSpec {
    DescriptorSpec {
        source: SRC_PLUGIN,
        name: FORMATTER_METRIC_NAME,
        help: FORMATTER_METRIC_HELP,
        kind: ValueKind::Gauge,
        label_keys: SELF_MON_LABEL_KEYS,
    }
}

pub(crate) fn parser_sample(
    device: &str,
    plugin: &str,
    metric: &'static str,
    value: f64,
) -> Sample {
    Sample {
        source: SRC_PLUGIN,
        name: PARSER_METRIC_NAME,
        device: device.to_string(),
        kind: ValueKind::Counter,
        value,
        label_values: vec![plugin.to_string(), metric.to_string()],
    }
}

pub(crate) fn formatter_sample(
    device: &str,
    plugin: &str,
    metric: &'static str,
    value: f64,
) -> Sample {
    Sample {
        source: SRC_PLUGIN,
        name: FORMATTER_METRIC_NAME,
        device: device.to_string(),
        kind: ValueKind::Gauge,
        value,
        label_values: vec![plugin.to_string(), metric.to_string()],
    }
}

//! Sample shape of the `oc_lldp_if_nbr` family.

use gnmipulse_exporter::{DescriptorSpec, Sample, ValueKind, SRC_PLUGIN};

pub(crate) const METRIC_NAME: &str = "oc_lldp_if_nbr";
const METRIC_HELP: &str = "Openconfig LLDP Metric";

/// Label keys of the neighbor gauge family, in emission order.
const LABEL_KEYS: &[&str] = &[
    "metric",
    "custom_label",
    "local_if_name",
    "nbr_system_name",
    "nbr_port_id",
    "nbr_port_id_type",
    "nbr_port_description",
];

pub(crate) fn descriptor() -> DescriptorSpec {
    DescriptorSpec {
        source: SRC_PLUGIN,
        name: METRIC_NAME,
        help: METRIC_HELP,
        kind: ValueKind::Gauge,
        label_keys: LABEL_KEYS,
    }
}

/// Label values of one neighbor sample; field order matches
/// [`LABEL_KEYS`].
#[derive(Debug, Default, Clone)]
pub(crate) struct LldpLabels {
    pub metric: String,
    pub custom_label: String,
    pub local_if_name: String,
    pub nbr_system_name: String,
    pub nbr_port_id: String,
    pub nbr_port_id_type: String,
    pub nbr_port_description: String,
}

impl LldpLabels {
    pub(crate) fn into_sample(self, device: &str, value: f64) -> Sample {
        Sample {
            source: SRC_PLUGIN,
            name: METRIC_NAME,
            device: device.to_string(),
            kind: ValueKind::Gauge,
            value,
            label_values: vec![
                self.metric,
                self.custom_label,
                self.local_if_name,
                self.nbr_system_name,
                self.nbr_port_id,
                self.nbr_port_id_type,
                self.nbr_port_description,
            ],
        }
    }
}

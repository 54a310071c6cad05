//! Sample shape of the `oc_if` families.

use gnmipulse_exporter::{DescriptorSpec, Sample, ValueKind, SRC_PLUGIN};

pub(crate) const METRIC_NAME: &str = "oc_if";
const METRIC_HELP: &str = "Openconfig Interfaces Metric";

/// Label keys of both `oc_if` families, in emission order.
const LABEL_KEYS: &[&str] = &[
    "kind",
    "metric",
    "custom_label",
    "name",
    "real_name",
    "index",
    "if_type",
    "if_index",
    "description",
    "admin_status",
    "oper_status",
    "lag_type",
];

/// Interface classification carried in the `kind` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IfKind {
    Iface,
    IfaceLag,
    IfaceLagMember,
    SubIface,
    SubIfaceLag,
    SubIfaceLagMember,
}

impl IfKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            IfKind::Iface => "iface",
            IfKind::IfaceLag => "iface_lag",
            IfKind::IfaceLagMember => "iface_lag_member",
            IfKind::SubIface => "sub_iface",
            IfKind::SubIfaceLag => "sub_iface_lag",
            IfKind::SubIfaceLagMember => "sub_iface_lag_member",
        }
    }
}

pub(crate) fn descriptor(kind: ValueKind) -> DescriptorSpec {
    DescriptorSpec {
        source: SRC_PLUGIN,
        name: METRIC_NAME,
        help: METRIC_HELP,
        kind,
        label_keys: LABEL_KEYS,
    }
}

/// Label values of one `oc_if` sample; field order matches
/// [`LABEL_KEYS`].
#[derive(Debug, Default, Clone)]
pub(crate) struct IfLabels {
    pub kind: String,
    pub metric: String,
    pub custom_label: String,
    pub name: String,
    pub real_name: String,
    pub index: String,
    pub if_type: String,
    pub if_index: String,
    pub description: String,
    pub admin_status: String,
    pub oper_status: String,
    pub lag_type: String,
}

impl IfLabels {
    pub(crate) fn into_sample(self, device: &str, kind: ValueKind, value: f64) -> Sample {
        Sample {
            source: SRC_PLUGIN,
            name: METRIC_NAME,
            device: device.to_string(),
            kind,
            value,
            label_values: vec![
                self.kind,
                self.metric,
                self.custom_label,
                self.name,
                self.real_name,
                self.index,
                self.if_type,
                self.if_index,
                self.description,
                self.admin_status,
                self.oper_status,
                self.lag_type,
            ],
        }
    }
}

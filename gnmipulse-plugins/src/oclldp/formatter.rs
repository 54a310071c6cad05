//! Formatter for the `oc_lldp_if_nbr` gauge family.

use gnmipulse_exporter::{DescriptorSpec, Sample};
use gnmipulse_models::oclldp;

use super::metrics::{descriptor, LldpLabels};
use super::{DATA_MODEL, LLDP_NB_STATE};
use crate::{Formatter, FormatterPaths, PluginConfig};

pub struct OcLldpFormatter {
    config: PluginConfig,
}

impl OcLldpFormatter {
    pub fn new(config: PluginConfig) -> Self {
        Self { config }
    }

    fn labels(&self, metric: &str, if_name: &str, nbr: &oclldp::Neighbor) -> LldpLabels {
        LldpLabels {
            metric: metric.to_string(),
            custom_label: self.config.custom_label.clone(),
            local_if_name: if_name.to_string(),
            nbr_system_name: nbr.system_name.clone().unwrap_or_default(),
            nbr_port_id: nbr.port_id.clone().unwrap_or_default(),
            nbr_port_id_type: nbr.port_id_type.short_str().to_string(),
            nbr_port_description: nbr.port_description.clone().unwrap_or_default(),
        }
    }
}

impl Formatter for OcLldpFormatter {
    type Model = oclldp::Root;

    fn describe(&self) -> Vec<DescriptorSpec> {
        vec![descriptor()]
    }

    fn paths(&self) -> FormatterPaths {
        FormatterPaths {
            xpaths: vec![LLDP_NB_STATE.to_string()],
            datamodels: vec![DATA_MODEL.to_string()],
        }
    }

    fn collect(&self, model: &Self::Model) -> Vec<Sample> {
        let mut out = Vec::new();
        for (if_name, iface) in &model.lldp.interface {
            for nbr in iface.neighbor.values() {
                let readings = [
                    ("age", nbr.age.unwrap_or(0) as f64),
                    ("last_update", nbr.last_update.unwrap_or(0) as f64),
                    ("ttl", nbr.ttl.unwrap_or(0) as f64),
                ];
                for (metric, value) in readings {
                    out.push(
                        self.labels(metric, if_name, nbr)
                            .into_sample(&self.config.device_name, value),
                    );
                }
            }
        }
        out
    }
}

//! Parse-quality counters kept by every parser instance.

use gnmipulse_exporter::{DescriptorSpec, Sample};

use crate::metrics::{parser_descriptor, parser_sample};
use crate::PluginConfig;

#[derive(Debug, Default)]
struct Counters {
    duplicates: u64,
    delete_not_found: u64,
    container_not_found: u64,
    leaf_not_found: u64,
    invalid_path: u64,
}

/// Per-parser self-monitoring. The owning plugin serializes access, so
/// no internal locking is needed.
#[derive(Debug)]
pub struct ParserMon {
    config: PluginConfig,
    counters: Counters,
}

impl ParserMon {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            counters: Counters::default(),
        }
    }

    pub fn describe(&self) -> Vec<DescriptorSpec> {
        vec![parser_descriptor()]
    }

    pub fn collect(&self) -> Vec<Sample> {
        let readings = [
            ("gnmi_update_duplicates", self.counters.duplicates),
            ("delete_path_not_found", self.counters.delete_not_found),
            ("yang_container_not_found", self.counters.container_not_found),
            ("yang_leaf_not_found", self.counters.leaf_not_found),
            ("invalid_gnmi_path", self.counters.invalid_path),
        ];
        readings
            .into_iter()
            .map(|(metric, value)| {
                parser_sample(
                    &self.config.device_name,
                    &self.config.plugin_name,
                    metric,
                    value as f64,
                )
            })
            .collect()
    }

    /// Adds the coalesced-duplicates hint carried by an update.
    pub fn add_duplicates(&mut self, duplicates: u64) {
        self.counters.duplicates += duplicates;
    }

    pub fn delete_not_found(&mut self) {
        self.counters.delete_not_found += 1;
    }

    pub fn container_not_found(&mut self) {
        self.counters.container_not_found += 1;
    }

    pub fn leaf_not_found(&mut self) {
        self.counters.leaf_not_found += 1;
    }

    pub fn invalid_path(&mut self) {
        self.counters.invalid_path += 1;
    }

    #[cfg(test)]
    pub(crate) fn reading(&self, metric: &str) -> u64 {
        match metric {
            "gnmi_update_duplicates" => self.counters.duplicates,
            "delete_path_not_found" => self.counters.delete_not_found,
            "yang_container_not_found" => self.counters.container_not_found,
            "yang_leaf_not_found" => self.counters.leaf_not_found,
            "invalid_gnmi_path" => self.counters.invalid_path,
            _ => panic!("unknown counter {metric}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_emits_all_counters() {
        let mut mon = ParserMon::new(PluginConfig {
            device_name: "router01".to_string(),
            plugin_name: "oc_interfaces".to_string(),
            ..PluginConfig::default()
        });
        mon.add_duplicates(3);
        mon.invalid_path();

        let samples = mon.collect();
        assert_eq!(samples.len(), 5);
        let dup = samples
            .iter()
            .find(|s| s.label_values[1] == "gnmi_update_duplicates")
            .unwrap();
        assert_eq!(dup.value, 3.0);
        assert_eq!(dup.label_values[0], "oc_interfaces");
        assert_eq!(dup.device, "router01");
    }
}

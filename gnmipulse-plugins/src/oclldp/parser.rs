//! Parser for the `openconfig-lldp` neighbor subtree.

use regex::Regex;

use gnmipulse_client::gnmi::{Notification, Path};
use gnmipulse_client::paths::{full_schema_path, path_strings};
use gnmipulse_exporter::{DescriptorSpec, Sample};
use gnmipulse_models::oclldp;

use super::LLDP_NB_STATE;
use crate::parsermon::ParserMon;
use crate::values::{int_val, string_val, uint_val};
use crate::{Parser, PluginConfig, PluginError};

#[derive(Debug, Default, PartialEq)]
struct PathMeta {
    if_name: String,
    nbr_id: String,
    leaf: String,
}

pub struct OcLldpParser {
    mon: ParserMon,
    model: oclldp::Root,
    rx_desc: Regex,
}

impl OcLldpParser {
    pub fn new(config: PluginConfig) -> Result<Self, PluginError> {
        let rx_desc =
            Regex::new(&config.desc_sanitize).map_err(|source| PluginError::InvalidRegex {
                option: "desc_sanitize".to_string(),
                source,
            })?;
        Ok(Self {
            mon: ParserMon::new(config),
            model: oclldp::Root::new(),
            rx_desc,
        })
    }

    fn sanitize_description(&self, raw: &str) -> String {
        self.rx_desc
            .find_iter(raw)
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extracts interface name, neighbor id and leaf name from the full
    /// keyed path.
    fn path_meta(prefix: Option<&Path>, path: Option<&Path>) -> Result<PathMeta, ()> {
        let full_path = path_strings(prefix, path);
        if full_path.len() < 2 {
            return Err(());
        }

        let mut out = PathMeta::default();
        for elem in &full_path {
            if elem.matches('=').count() != 1 || !elem.ends_with(']') {
                continue;
            }
            if let Some(rest) = elem.strip_prefix("interface[name=") {
                out.if_name = rest[..rest.len() - 1].to_string();
            } else if let Some(rest) = elem.strip_prefix("neighbor[id=") {
                out.nbr_id = rest[..rest.len() - 1].to_string();
            }
        }
        out.leaf = full_path.last().cloned().unwrap_or_default();

        if out.if_name.is_empty() || out.nbr_id.is_empty() || out.leaf.is_empty() {
            return Err(());
        }
        Ok(out)
    }

    /// The plugin handles a single container; anything else counts as
    /// unknown.
    fn is_neighbor_state(&mut self, prefix: Option<&Path>, path: Option<&Path>) -> bool {
        let full_path = full_schema_path(prefix, path);
        let leaf_index = match full_path.rfind('/') {
            Some(index) => index,
            None => {
                self.mon.invalid_path();
                return false;
            }
        };
        if &full_path[..leaf_index] == LLDP_NB_STATE {
            true
        } else {
            self.mon.container_not_found();
            false
        }
    }

    fn remove_entry(&mut self, prefix: Option<&Path>, path: &Path) {
        let meta = match Self::path_meta(prefix, Some(path)) {
            Ok(meta) => meta,
            Err(()) => {
                self.mon.invalid_path();
                return;
            }
        };

        match self.model.lldp.interface.get_mut(&meta.if_name) {
            Some(iface) => {
                if iface.delete_neighbor(&meta.nbr_id) {
                    // Drop the interface once its last neighbor is gone.
                    if iface.neighbor.is_empty() {
                        self.model.lldp.delete_interface(&meta.if_name);
                    }
                } else {
                    self.mon.delete_not_found();
                }
            }
            None => self.mon.delete_not_found(),
        }
    }

    fn apply_update(&mut self, nf: &Notification, index: usize) {
        let update = &nf.update[index];
        let meta = match Self::path_meta(nf.prefix.as_ref(), update.path.as_ref()) {
            Ok(meta) => meta,
            Err(()) => {
                self.mon.invalid_path();
                return;
            }
        };

        let value = update.val.as_ref();
        let target = self
            .model
            .lldp
            .interface_entry(&meta.if_name)
            .neighbor_entry(&meta.nbr_id);
        match meta.leaf.as_str() {
            "age" => target.age = Some(uint_val(value)),
            "chassis-id" => target.chassis_id = Some(string_val(value).to_string()),
            "chassis-id-type" => {
                target.chassis_id_type = oclldp::ChassisIdType::from_wire(string_val(value))
            }
            "id" => target.id = Some(string_val(value).to_string()),
            "last-update" => target.last_update = Some(int_val(value)),
            "management-address" => {
                target.management_address = Some(string_val(value).to_string())
            }
            "management-address-type" => {
                target.management_address_type = Some(string_val(value).to_string())
            }
            "port-description" => {
                let sanitized = self.sanitize_description(string_val(value));
                self.model
                    .lldp
                    .interface_entry(&meta.if_name)
                    .neighbor_entry(&meta.nbr_id)
                    .port_description = Some(sanitized);
            }
            "port-id" => target.port_id = Some(string_val(value).to_string()),
            "port-id-type" => {
                target.port_id_type = oclldp::PortIdType::from_wire(string_val(value))
            }
            "system-description" => {
                target.system_description = Some(string_val(value).to_string())
            }
            "system-name" => target.system_name = Some(string_val(value).to_string()),
            "ttl" => target.ttl = Some(uint_val(value) as u16),
            _ => self.mon.leaf_not_found(),
        }
    }

    #[cfg(test)]
    pub(crate) fn counter_reading(&self, metric: &str) -> u64 {
        self.mon.reading(metric)
    }
}

impl Parser for OcLldpParser {
    type Model = oclldp::Root;

    fn describe(&self) -> Vec<DescriptorSpec> {
        self.mon.describe()
    }

    fn collect(&self) -> Vec<Sample> {
        self.mon.collect()
    }

    fn parse_notification(&mut self, nf: &Notification) {
        for delete in &nf.delete {
            self.remove_entry(nf.prefix.as_ref(), delete);
        }

        for index in 0..nf.update.len() {
            if !self.is_neighbor_state(nf.prefix.as_ref(), nf.update[index].path.as_ref()) {
                continue;
            }
            self.mon.add_duplicates(nf.update[index].duplicates as u64);
            self.apply_update(nf, index);
        }
    }

    fn model(&self) -> &Self::Model {
        &self.model
    }

    fn clear_cache(&mut self) {
        self.model = oclldp::Root::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{notification, path, update};
    use gnmipulse_client::gnmi::typed_value::Value;
    use gnmipulse_models::oclldp::PortIdType;

    fn parser() -> OcLldpParser {
        OcLldpParser::new(PluginConfig {
            device_name: "router01".to_string(),
            plugin_name: "oc_lldp".to_string(),
            desc_sanitize: "[a-zA-Z0-9_:\\-/]".to_string(),
            ..PluginConfig::default()
        })
        .unwrap()
    }

    fn nbr_prefix(if_name: &str, nbr_id: &str) -> gnmipulse_client::gnmi::Path {
        path(&[
            "lldp",
            "interfaces",
            &format!("interface[name={if_name}]"),
            "neighbors",
            &format!("neighbor[id={nbr_id}]"),
            "state",
        ])
    }

    #[test]
    fn test_neighbor_updates_materialize_entities() {
        let mut parser = parser();
        parser.parse_notification(&notification(
            Some(nbr_prefix("eth0", "nbr1")),
            vec![
                update(&["system-name"], Value::StringVal("peer1".into())),
                update(&["port-id"], Value::StringVal("xe-0/0/1".into())),
                update(
                    &["port-id-type"],
                    Value::StringVal("openconfig-lldp:INTERFACE_NAME".into()),
                ),
                update(&["age"], Value::UintVal(120)),
                update(&["last-update"], Value::IntVal(1690000000)),
                update(&["ttl"], Value::UintVal(120)),
                update(
                    &["port-description"],
                    Value::StringVal("to peer1 #uplink".into()),
                ),
            ],
            vec![],
        ));

        let nbr = parser
            .model()
            .lldp
            .interface
            .get("eth0")
            .unwrap()
            .neighbor
            .get("nbr1")
            .unwrap();
        assert_eq!(nbr.system_name.as_deref(), Some("peer1"));
        assert_eq!(nbr.port_id.as_deref(), Some("xe-0/0/1"));
        assert_eq!(nbr.port_id_type, PortIdType::InterfaceName);
        assert_eq!(nbr.age, Some(120));
        assert_eq!(nbr.last_update, Some(1690000000));
        assert_eq!(nbr.ttl, Some(120));
        // Sanitized: spaces and '#' stripped.
        assert_eq!(nbr.port_description.as_deref(), Some("topeer1uplink"));
    }

    #[test]
    fn test_unknown_leaf_counted() {
        let mut parser = parser();
        parser.parse_notification(&notification(
            Some(nbr_prefix("eth0", "nbr1")),
            vec![update(&["made-up"], Value::UintVal(1))],
            vec![],
        ));
        assert_eq!(parser.counter_reading("yang_leaf_not_found"), 1);
    }

    #[test]
    fn test_unknown_container_counted() {
        let mut parser = parser();
        parser.parse_notification(&notification(
            None,
            vec![update(
                &["lldp", "state", "system-name"],
                Value::StringVal("r1".into()),
            )],
            vec![],
        ));
        assert_eq!(parser.counter_reading("yang_container_not_found"), 1);
    }

    #[test]
    fn test_delete_neighbor_then_empty_interface_removed() {
        let mut parser = parser();
        for nbr in ["nbr1", "nbr2"] {
            parser.parse_notification(&notification(
                Some(nbr_prefix("eth0", nbr)),
                vec![update(&["age"], Value::UintVal(1))],
                vec![],
            ));
        }

        let delete = vec![
            "lldp".to_string(),
            "interfaces".to_string(),
            "interface[name=eth0]".to_string(),
            "neighbors".to_string(),
            "neighbor[id=nbr1]".to_string(),
        ];
        parser.parse_notification(&notification(None, vec![], vec![delete.clone()]));
        assert!(parser.model().lldp.interface.contains_key("eth0"));

        let delete2: Vec<String> = delete
            .iter()
            .map(|s| s.replace("nbr1", "nbr2"))
            .collect();
        parser.parse_notification(&notification(None, vec![], vec![delete2]));
        // Last neighbor gone: the interface entry disappears with it.
        assert!(parser.model().lldp.interface.is_empty());
    }

    #[test]
    fn test_delete_missing_neighbor_counted() {
        let mut parser = parser();
        parser.parse_notification(&notification(
            None,
            vec![],
            vec![vec![
                "lldp".to_string(),
                "interfaces".to_string(),
                "interface[name=eth0]".to_string(),
                "neighbors".to_string(),
                "neighbor[id=ghost]".to_string(),
            ]],
        ));
        assert_eq!(parser.counter_reading("delete_path_not_found"), 1);
    }

    #[test]
    fn test_path_without_neighbor_id_is_invalid() {
        let mut parser = parser();
        parser.parse_notification(&notification(
            None,
            vec![update(
                &[
                    "lldp",
                    "interfaces",
                    "interface[name=eth0]",
                    "neighbors",
                    "neighbor",
                    "state",
                    "age",
                ],
                Value::UintVal(1),
            )],
            vec![],
        ));
        assert_eq!(parser.counter_reading("invalid_gnmi_path"), 1);
    }
}

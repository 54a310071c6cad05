//! Parser for the `openconfig-interfaces` subtrees.

use regex::Regex;

use gnmipulse_client::gnmi::{Notification, Path};
use gnmipulse_client::paths::{full_schema_path, path_strings};
use gnmipulse_exporter::{DescriptorSpec, Sample};
use gnmipulse_models::ocif;

use super::{IF_AGG_STATE, IF_STATE, IF_STATE_COUNTERS, SUB_IF_STATE, SUB_IF_STATE_COUNTERS};
use crate::parsermon::ParserMon;
use crate::values::{bool_val, string_list, string_val, uint_val};
use crate::{option_flag, Parser, PluginConfig, PluginError};

/// Metadata extracted from a keyed gNMI path.
#[derive(Debug, Default, PartialEq)]
struct PathMeta {
    if_name: String,
    if_index: u32,
    is_subif: bool,
    leaf: String,
}

/// The known containers, selected by the schema path up to the leaf.
#[derive(Debug, Clone, Copy)]
enum Container {
    IfState,
    IfStateCounters,
    IfAggState,
    SubIfState,
    SubIfStateCounters,
}

pub struct OcIfParser {
    mon: ParserMon,
    model: ocif::Root,
    /// Description sanitize: characters to retain.
    rx_desc: Regex,
    /// Interface name filter.
    rx_name: Regex,
    /// Subinterface index filter.
    rx_index: Regex,
    disable_deletes: bool,
}

impl OcIfParser {
    pub fn new(config: PluginConfig) -> Result<Self, PluginError> {
        let disable_deletes = option_flag(&config.options, "disable_gnmi_delete");

        let rx_desc =
            Regex::new(&config.desc_sanitize).map_err(|source| PluginError::InvalidRegex {
                option: "desc_sanitize".to_string(),
                source,
            })?;
        let rx_name = compile_filter(&config.options, "name_filter")?;
        let rx_index = compile_filter(&config.options, "index_filter")?;

        Ok(Self {
            mon: ParserMon::new(config),
            model: ocif::Root::new(),
            rx_desc,
            rx_name,
            rx_index,
            disable_deletes,
        })
    }

    fn sanitize_description(&self, raw: &str) -> String {
        self.rx_desc
            .find_iter(raw)
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extracts interface name, optional subinterface index and leaf
    /// name from the full keyed path.
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
            } else if let Some(rest) = elem.strip_prefix("subinterface[index=") {
                let index: u32 = rest[..rest.len() - 1].parse().map_err(|_| ())?;
                out.is_subif = true;
                out.if_index = index;
            }
        }
        out.leaf = full_path.last().cloned().unwrap_or_default();

        if out.if_name.is_empty() || out.leaf.is_empty() {
            return Err(());
        }
        Ok(out)
    }

    /// Selects the handler for an update by its container schema path.
    fn container_lookup(&mut self, prefix: Option<&Path>, path: Option<&Path>) -> Option<Container> {
        let full_path = full_schema_path(prefix, path);
        let leaf_index = match full_path.rfind('/') {
            Some(index) => index,
            None => {
                self.mon.invalid_path();
                return None;
            }
        };

        match &full_path[..leaf_index] {
            IF_STATE => Some(Container::IfState),
            IF_STATE_COUNTERS => Some(Container::IfStateCounters),
            SUB_IF_STATE => Some(Container::SubIfState),
            SUB_IF_STATE_COUNTERS => Some(Container::SubIfStateCounters),
            IF_AGG_STATE => Some(Container::IfAggState),
            _ => {
                self.mon.container_not_found();
                None
            }
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

        if !meta.is_subif {
            if !self.model.delete_interface(&meta.if_name) {
                self.mon.delete_not_found();
            }
        } else {
            match self.model.interface.get_mut(&meta.if_name) {
                Some(iface) => {
                    if !iface.delete_subinterface(meta.if_index) {
                        self.mon.delete_not_found();
                    }
                }
                None => self.mon.delete_not_found(),
            }
        }
    }

    fn apply_update(&mut self, container: Container, nf: &Notification, index: usize) {
        let update = &nf.update[index];
        let meta = match Self::path_meta(nf.prefix.as_ref(), update.path.as_ref()) {
            Ok(meta) => meta,
            Err(()) => {
                self.mon.invalid_path();
                return;
            }
        };

        // Optional filters: silently drop non-matching updates.
        if !self.rx_name.is_match(&meta.if_name) {
            return;
        }
        if matches!(container, Container::SubIfState | Container::SubIfStateCounters)
            && !self.rx_index.is_match(&meta.if_index.to_string())
        {
            return;
        }

        let value = update.val.as_ref();
        match container {
            Container::IfState => {
                let target = self.model.interface_entry(&meta.if_name);
                match meta.leaf.as_str() {
                    "admin-status" => {
                        target.admin_status = ocif::AdminStatus::from_wire(string_val(value))
                    }
                    "cpu" => target.cpu = Some(bool_val(value)),
                    "description" => {
                        let sanitized = self.sanitize_description(string_val(value));
                        self.model.interface_entry(&meta.if_name).description = Some(sanitized);
                    }
                    "enabled" => target.enabled = Some(bool_val(value)),
                    "ifindex" => target.ifindex = Some(uint_val(value) as u32),
                    "last-change" => target.last_change = Some(uint_val(value)),
                    "logical" => target.logical = Some(bool_val(value)),
                    "loopback-mode" => {
                        target.loopback_mode = ocif::LoopbackMode::from_wire(string_val(value))
                    }
                    "management" => target.management = Some(bool_val(value)),
                    "mtu" => target.mtu = Some(uint_val(value) as u16),
                    "name" => target.name = Some(string_val(value).to_string()),
                    "oper-status" => {
                        target.oper_status = ocif::OperStatus::from_wire(string_val(value))
                    }
                    // tpid isn't handled but accepted to avoid false
                    // leaf-not-found counting
                    "tpid" => {}
                    "type" => target.if_type = ocif::InterfaceType::from_wire(string_val(value)),
                    _ => self.mon.leaf_not_found(),
                }
            }
            Container::IfStateCounters => {
                let target = &mut self.model.interface_entry(&meta.if_name).counters;
                if !write_counter_leaf(target, &meta.leaf, uint_val(value), true) {
                    self.mon.leaf_not_found();
                }
            }
            Container::IfAggState => {
                let target = &mut self.model.interface_entry(&meta.if_name).aggregation;
                match meta.leaf.as_str() {
                    "lag-speed" => target.lag_speed = Some(uint_val(value) as u32),
                    "lag-type" => {
                        target.lag_type = ocif::AggregationType::from_wire(string_val(value))
                    }
                    "member" => target.member.extend(string_list(value)),
                    "min-links" => target.min_links = Some(uint_val(value) as u16),
                    _ => self.mon.leaf_not_found(),
                }
            }
            Container::SubIfState => {
                let target = self
                    .model
                    .interface_entry(&meta.if_name)
                    .subinterface_entry(meta.if_index);
                match meta.leaf.as_str() {
                    "admin-status" => {
                        target.admin_status = ocif::AdminStatus::from_wire(string_val(value))
                    }
                    "cpu" => target.cpu = Some(bool_val(value)),
                    "description" => {
                        let sanitized = self.sanitize_description(string_val(value));
                        self.model
                            .interface_entry(&meta.if_name)
                            .subinterface_entry(meta.if_index)
                            .description = Some(sanitized);
                    }
                    "enabled" => target.enabled = Some(bool_val(value)),
                    "ifindex" => target.ifindex = Some(uint_val(value) as u32),
                    "index" => target.index = Some(uint_val(value) as u32),
                    "last-change" => target.last_change = Some(uint_val(value)),
                    "logical" => target.logical = Some(bool_val(value)),
                    "management" => target.management = Some(bool_val(value)),
                    "name" => target.name = Some(string_val(value).to_string()),
                    "oper-status" => {
                        target.oper_status = ocif::OperStatus::from_wire(string_val(value))
                    }
                    _ => self.mon.leaf_not_found(),
                }
            }
            Container::SubIfStateCounters => {
                let target = &mut self
                    .model
                    .interface_entry(&meta.if_name)
                    .subinterface_entry(meta.if_index)
                    .counters;
                if !write_counter_leaf(target, &meta.leaf, uint_val(value), false) {
                    self.mon.leaf_not_found();
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn counter_reading(&self, metric: &str) -> u64 {
        self.mon.reading(metric)
    }
}

fn compile_filter(
    options: &std::collections::HashMap<String, String>,
    key: &str,
) -> Result<Regex, PluginError> {
    match options.get(key).filter(|v| !v.is_empty()) {
        Some(pattern) => Regex::new(pattern).map_err(|source| PluginError::InvalidRegex {
            option: key.to_string(),
            source,
        }),
        None => Ok(Regex::new(".*").expect("static regex")),
    }
}

/// Assigns one counter leaf. `resets` exists on interfaces only.
/// Returns false for unknown leaves.
fn write_counter_leaf(target: &mut ocif::Counters, leaf: &str, value: u64, iface_level: bool) -> bool {
    match leaf {
        "carrier-transitions" => target.carrier_transitions = Some(value),
        "in-broadcast-pkts" => target.in_broadcast_pkts = Some(value),
        "in-discards" => target.in_discards = Some(value),
        "in-errors" => target.in_errors = Some(value),
        "in-fcs-errors" => target.in_fcs_errors = Some(value),
        "in-multicast-pkts" => target.in_multicast_pkts = Some(value),
        "in-octets" => target.in_octets = Some(value),
        "in-pkts" => target.in_pkts = Some(value),
        "in-unicast-pkts" => target.in_unicast_pkts = Some(value),
        "in-unknown-protos" => target.in_unknown_protos = Some(value),
        "last-clear" => target.last_clear = Some(value),
        "out-broadcast-pkts" => target.out_broadcast_pkts = Some(value),
        "out-discards" => target.out_discards = Some(value),
        "out-errors" => target.out_errors = Some(value),
        "out-multicast-pkts" => target.out_multicast_pkts = Some(value),
        "out-octets" => target.out_octets = Some(value),
        "out-pkts" => target.out_pkts = Some(value),
        "out-unicast-pkts" => target.out_unicast_pkts = Some(value),
        "resets" if iface_level => target.resets = Some(value),
        _ => return false,
    }
    true
}

impl Parser for OcIfParser {
    type Model = ocif::Root;

    fn describe(&self) -> Vec<DescriptorSpec> {
        self.mon.describe()
    }

    fn collect(&self) -> Vec<Sample> {
        self.mon.collect()
    }

    fn parse_notification(&mut self, nf: &Notification) {
        if !self.disable_deletes {
            for delete in &nf.delete {
                self.remove_entry(nf.prefix.as_ref(), delete);
            }
        }

        for index in 0..nf.update.len() {
            let container =
                match self.container_lookup(nf.prefix.as_ref(), nf.update[index].path.as_ref()) {
                    Some(container) => container,
                    None => continue,
                };
            self.mon.add_duplicates(nf.update[index].duplicates as u64);
            self.apply_update(container, nf, index);
        }
    }

    fn model(&self) -> &Self::Model {
        &self.model
    }

    fn clear_cache(&mut self) {
        self.model = ocif::Root::new();
    }
}

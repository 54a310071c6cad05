//! Formatter for the `oc_if` counter and gauge families.

use std::collections::{HashMap, HashSet};

use gnmipulse_exporter::{DescriptorSpec, Sample, ValueKind};
use gnmipulse_models::{ocif, CounterMode};

use super::metrics::{descriptor, IfKind, IfLabels};
use super::{DATA_MODEL, IF_AGG_STATE, IF_STATE, SUB_IF_STATE};
use crate::{option_flag, Formatter, FormatterPaths, PluginConfig};

/// LAG lookup tables built at the top of every collect pass and dropped
/// with it.
struct LagTables<'a> {
    /// Member name -> LAG name.
    member_of: HashMap<&'a str, &'a str>,
    /// Names of interfaces that are LAGs.
    lags: HashSet<&'a str>,
}

impl<'a> LagTables<'a> {
    fn build(model: &'a ocif::Root) -> Self {
        let mut member_of = HashMap::new();
        let mut lags = HashSet::new();
        for (name, iface) in &model.interface {
            for member in &iface.aggregation.member {
                member_of.insert(member.as_str(), name.as_str());
                lags.insert(name.as_str());
            }
        }
        Self { member_of, lags }
    }
}

pub struct OcIfFormatter {
    config: PluginConfig,
}

impl OcIfFormatter {
    pub fn new(config: PluginConfig) -> Self {
        Self { config }
    }

    /// Classification of one interface plus the alias/real-name split
    /// for LAG members.
    fn classify<'a>(
        &self,
        name: &'a str,
        iface: &ocif::Interface,
        tables: &LagTables<'a>,
        sub_level: bool,
    ) -> (IfKind, &'a str, &'a str, &'static str) {
        let mut kind = if sub_level {
            IfKind::SubIface
        } else {
            IfKind::Iface
        };
        let mut alias = name;
        let mut real_name = "";
        let mut lag_type = "";

        if tables.lags.contains(name) {
            lag_type = iface.aggregation.lag_type.short_str();
            kind = if sub_level {
                IfKind::SubIfaceLag
            } else {
                IfKind::IfaceLag
            };
        }
        if let Some(lag_name) = tables.member_of.get(name) {
            real_name = name;
            alias = *lag_name;
            kind = if sub_level {
                IfKind::SubIfaceLagMember
            } else {
                IfKind::IfaceLagMember
            };
        }
        (kind, alias, real_name, lag_type)
    }

    fn pull_mode(&self, name: &str, tables: &LagTables<'_>) -> CounterMode {
        if tables.lags.contains(name) {
            // LAG traffic is accounted on the member ports.
            CounterMode::ForceToZero
        } else if self.config.use_defaults {
            CounterMode::UseDefaults
        } else {
            CounterMode::Normal
        }
    }

    fn labels(
        &self,
        metric: &str,
        kind: IfKind,
        alias: &str,
        real_name: &str,
        lag_type: &str,
        iface: &ocif::Interface,
    ) -> IfLabels {
        let description = match iface.description.as_deref() {
            Some(desc) if !desc.is_empty() => desc.to_string(),
            _ => alias.to_string(),
        };
        IfLabels {
            kind: kind.as_str().to_string(),
            metric: metric.to_string(),
            custom_label: self.config.custom_label.clone(),
            name: alias.to_string(),
            real_name: real_name.to_string(),
            index: String::new(),
            if_type: iface.if_type.short_str().to_string(),
            if_index: iface.ifindex.unwrap_or(0).to_string(),
            description,
            admin_status: iface.admin_status.short_str().to_string(),
            oper_status: iface.oper_status.short_str().to_string(),
            lag_type: lag_type.to_string(),
        }
    }

    fn sub_labels(
        &self,
        metric: &str,
        kind: IfKind,
        alias: &str,
        real_name: &str,
        lag_type: &str,
        index: u32,
        sub: &ocif::Subinterface,
    ) -> IfLabels {
        let description = match sub.description.as_deref() {
            Some(desc) if !desc.is_empty() => desc.to_string(),
            _ => index.to_string(),
        };
        IfLabels {
            kind: kind.as_str().to_string(),
            metric: metric.to_string(),
            custom_label: self.config.custom_label.clone(),
            name: alias.to_string(),
            real_name: real_name.to_string(),
            index: index.to_string(),
            if_type: String::new(),
            if_index: sub.ifindex.unwrap_or(0).to_string(),
            description,
            admin_status: sub.admin_status.short_str().to_string(),
            oper_status: sub.oper_status.short_str().to_string(),
            lag_type: lag_type.to_string(),
        }
    }

    fn if_counters(&self, model: &ocif::Root, tables: &LagTables<'_>, out: &mut Vec<Sample>) {
        for (name, iface) in &model.interface {
            let (kind, alias, real_name, lag_type) = self.classify(name, iface, tables, false);
            let mode = self.pull_mode(name, tables);
            for (counter, value) in iface.counters.pull(mode) {
                let labels = self.labels(counter, kind, alias, real_name, lag_type, iface);
                out.push(labels.into_sample(&self.config.device_name, ValueKind::Counter, value));
            }
        }
    }

    fn if_gauges(&self, model: &ocif::Root, tables: &LagTables<'_>, out: &mut Vec<Sample>) {
        for (name, iface) in &model.interface {
            let (kind, alias, real_name, lag_type) = self.classify(name, iface, tables, false);
            let gauges = [
                ("last_change", iface.last_change.unwrap_or(0) as f64),
                ("last_clear", iface.counters.last_clear.unwrap_or(0) as f64),
                ("mtu", iface.mtu.unwrap_or(0) as f64),
                (
                    "lag_speed",
                    iface.aggregation.lag_speed.unwrap_or(0) as f64,
                ),
                (
                    "lag_min_links",
                    iface.aggregation.min_links.unwrap_or(0) as f64,
                ),
            ];
            for (gauge, value) in gauges {
                let labels = self.labels(gauge, kind, alias, real_name, lag_type, iface);
                out.push(labels.into_sample(&self.config.device_name, ValueKind::Gauge, value));
            }
        }
    }

    fn sub_if_counters(&self, model: &ocif::Root, tables: &LagTables<'_>, out: &mut Vec<Sample>) {
        for (name, iface) in &model.interface {
            let (kind, alias, real_name, lag_type) = self.classify(name, iface, tables, true);
            let mode = self.pull_mode(name, tables);
            for (index, sub) in &iface.subinterface {
                for (counter, value) in sub.counters.pull(mode) {
                    let labels =
                        self.sub_labels(counter, kind, alias, real_name, lag_type, *index, sub);
                    out.push(labels.into_sample(
                        &self.config.device_name,
                        ValueKind::Counter,
                        value,
                    ));
                }
            }
        }
    }

    fn sub_if_gauges(&self, model: &ocif::Root, tables: &LagTables<'_>, out: &mut Vec<Sample>) {
        for (name, iface) in &model.interface {
            let (kind, alias, real_name, lag_type) = self.classify(name, iface, tables, true);
            for (index, sub) in &iface.subinterface {
                let gauges = [
                    ("last_change", sub.last_change.unwrap_or(0) as f64),
                    ("last_clear", sub.counters.last_clear.unwrap_or(0) as f64),
                    (
                        "lag_speed",
                        iface.aggregation.lag_speed.unwrap_or(0) as f64,
                    ),
                    (
                        "lag_min_links",
                        iface.aggregation.min_links.unwrap_or(0) as f64,
                    ),
                ];
                for (gauge, value) in gauges {
                    let labels =
                        self.sub_labels(gauge, kind, alias, real_name, lag_type, *index, sub);
                    out.push(labels.into_sample(&self.config.device_name, ValueKind::Gauge, value));
                }
            }
        }
    }
}

impl Formatter for OcIfFormatter {
    type Model = ocif::Root;

    fn describe(&self) -> Vec<DescriptorSpec> {
        vec![descriptor(ValueKind::Counter), descriptor(ValueKind::Gauge)]
    }

    /// Builds the subscription paths, honoring the `gnmi_filter`
    /// interface list and the `disable_subint` switch.
    fn paths(&self) -> FormatterPaths {
        let filter = self
            .config
            .options
            .get("gnmi_filter")
            .cloned()
            .unwrap_or_default()
            .replace(' ', "");
        let names: Vec<&str> = filter.split(',').collect();

        let (if_paths, sub_if_paths) = if names[0].is_empty() {
            (
                vec![IF_STATE.to_string()],
                vec![SUB_IF_STATE.to_string()],
            )
        } else {
            let mut if_paths = Vec::with_capacity(names.len());
            let mut sub_if_paths = Vec::with_capacity(names.len());
            for name in &names {
                let keyed = format!("/interface[name={name}]/");
                if_paths.push(IF_STATE.replace("/interface/", &keyed));
                sub_if_paths.push(SUB_IF_STATE.replace("/interface/", &keyed));
            }
            (if_paths, sub_if_paths)
        };

        let mut xpaths = if_paths;
        xpaths.push(IF_AGG_STATE.to_string());
        if !option_flag(&self.config.options, "disable_subint") {
            xpaths.extend(sub_if_paths);
        }

        FormatterPaths {
            xpaths,
            datamodels: vec![DATA_MODEL.to_string()],
        }
    }

    fn collect(&self, model: &Self::Model) -> Vec<Sample> {
        let tables = LagTables::build(model);
        let mut out = Vec::with_capacity(model.interface.len() * 24);
        self.if_counters(model, &tables, &mut out);
        self.if_gauges(model, &tables, &mut out);
        self.sub_if_counters(model, &tables, &mut out);
        self.sub_if_gauges(model, &tables, &mut out);
        out
    }
}

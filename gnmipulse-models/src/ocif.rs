//! Operational-state containers for `openconfig-interfaces`, including
//! the `openconfig-if-aggregate` augmentation.

use std::collections::BTreeMap;

use crate::{enum_from_wire, CounterMode};

/// `/interfaces/interface/state/admin-status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminStatus {
    #[default]
    Unset,
    Up,
    Down,
    Testing,
}

static ADMIN_STATUS_NAMES: &[(&str, AdminStatus)] = &[
    ("UP", AdminStatus::Up),
    ("DOWN", AdminStatus::Down),
    ("TESTING", AdminStatus::Testing),
];

impl AdminStatus {
    pub fn from_wire(wire: &str) -> Self {
        enum_from_wire(ADMIN_STATUS_NAMES, wire, AdminStatus::Unset)
    }

    /// Label form; unset renders as the empty string.
    pub fn short_str(self) -> &'static str {
        match self {
            AdminStatus::Unset => "",
            AdminStatus::Up => "UP",
            AdminStatus::Down => "DOWN",
            AdminStatus::Testing => "TESTING",
        }
    }
}

/// `/interfaces/interface/state/oper-status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperStatus {
    #[default]
    Unset,
    Up,
    Down,
    Testing,
    Unknown,
    Dormant,
    NotPresent,
    LowerLayerDown,
}

static OPER_STATUS_NAMES: &[(&str, OperStatus)] = &[
    ("UP", OperStatus::Up),
    ("DOWN", OperStatus::Down),
    ("TESTING", OperStatus::Testing),
    ("UNKNOWN", OperStatus::Unknown),
    ("DORMANT", OperStatus::Dormant),
    ("NOT_PRESENT", OperStatus::NotPresent),
    ("LOWER_LAYER_DOWN", OperStatus::LowerLayerDown),
];

impl OperStatus {
    pub fn from_wire(wire: &str) -> Self {
        enum_from_wire(OPER_STATUS_NAMES, wire, OperStatus::Unset)
    }

    pub fn short_str(self) -> &'static str {
        match self {
            OperStatus::Unset => "",
            OperStatus::Up => "UP",
            OperStatus::Down => "DOWN",
            OperStatus::Testing => "TESTING",
            OperStatus::Unknown => "UNKNOWN",
            OperStatus::Dormant => "DORMANT",
            OperStatus::NotPresent => "NOT_PRESENT",
            OperStatus::LowerLayerDown => "LOWER_LAYER_DOWN",
        }
    }
}

/// `/interfaces/interface/state/loopback-mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopbackMode {
    #[default]
    Unset,
    None,
    Facility,
    Terminal,
}

static LOOPBACK_MODE_NAMES: &[(&str, LoopbackMode)] = &[
    ("NONE", LoopbackMode::None),
    ("FACILITY", LoopbackMode::Facility),
    ("TERMINAL", LoopbackMode::Terminal),
];

impl LoopbackMode {
    pub fn from_wire(wire: &str) -> Self {
        enum_from_wire(LOOPBACK_MODE_NAMES, wire, LoopbackMode::Unset)
    }
}

/// `/interfaces/interface/state/type`: IANA interface types commonly
/// reported by network operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceType {
    #[default]
    Unset,
    EthernetCsmacd,
    GigabitEthernet,
    Ieee8023AdLag,
    L2Vlan,
    L3Ipvlan,
    SoftwareLoopback,
    Tunnel,
    Atm,
    Ppp,
    Mpls,
    Bridge,
    Other,
}

static INTERFACE_TYPE_NAMES: &[(&str, InterfaceType)] = &[
    ("ethernetCsmacd", InterfaceType::EthernetCsmacd),
    ("gigabitEthernet", InterfaceType::GigabitEthernet),
    ("ieee8023adLag", InterfaceType::Ieee8023AdLag),
    ("l2vlan", InterfaceType::L2Vlan),
    ("l3ipvlan", InterfaceType::L3Ipvlan),
    ("softwareLoopback", InterfaceType::SoftwareLoopback),
    ("tunnel", InterfaceType::Tunnel),
    ("atm", InterfaceType::Atm),
    ("ppp", InterfaceType::Ppp),
    ("mpls", InterfaceType::Mpls),
    ("bridge", InterfaceType::Bridge),
    ("other", InterfaceType::Other),
];

impl InterfaceType {
    pub fn from_wire(wire: &str) -> Self {
        enum_from_wire(INTERFACE_TYPE_NAMES, wire, InterfaceType::Unset)
    }

    pub fn short_str(self) -> &'static str {
        match self {
            InterfaceType::Unset => "",
            InterfaceType::EthernetCsmacd => "ethernetCsmacd",
            InterfaceType::GigabitEthernet => "gigabitEthernet",
            InterfaceType::Ieee8023AdLag => "ieee8023adLag",
            InterfaceType::L2Vlan => "l2vlan",
            InterfaceType::L3Ipvlan => "l3ipvlan",
            InterfaceType::SoftwareLoopback => "softwareLoopback",
            InterfaceType::Tunnel => "tunnel",
            InterfaceType::Atm => "atm",
            InterfaceType::Ppp => "ppp",
            InterfaceType::Mpls => "mpls",
            InterfaceType::Bridge => "bridge",
            InterfaceType::Other => "other",
        }
    }
}

/// `/interfaces/interface/aggregation/state/lag-type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationType {
    #[default]
    Unset,
    Lacp,
    Static,
}

static AGGREGATION_TYPE_NAMES: &[(&str, AggregationType)] = &[
    ("LACP", AggregationType::Lacp),
    ("STATIC", AggregationType::Static),
];

impl AggregationType {
    pub fn from_wire(wire: &str) -> Self {
        enum_from_wire(AGGREGATION_TYPE_NAMES, wire, AggregationType::Unset)
    }

    pub fn short_str(self) -> &'static str {
        match self {
            AggregationType::Unset => "",
            AggregationType::Lacp => "LACP",
            AggregationType::Static => "STATIC",
        }
    }
}

/// Counters container shared by interfaces and subinterfaces
/// (`…/state/counters`).
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub carrier_transitions: Option<u64>,
    pub in_broadcast_pkts: Option<u64>,
    pub in_discards: Option<u64>,
    pub in_errors: Option<u64>,
    pub in_fcs_errors: Option<u64>,
    pub in_multicast_pkts: Option<u64>,
    pub in_octets: Option<u64>,
    pub in_pkts: Option<u64>,
    pub in_unicast_pkts: Option<u64>,
    pub in_unknown_protos: Option<u64>,
    pub last_clear: Option<u64>,
    pub out_broadcast_pkts: Option<u64>,
    pub out_discards: Option<u64>,
    pub out_errors: Option<u64>,
    pub out_multicast_pkts: Option<u64>,
    pub out_octets: Option<u64>,
    pub out_pkts: Option<u64>,
    pub out_unicast_pkts: Option<u64>,
    pub resets: Option<u64>,
}

impl Counters {
    /// Leaf names (YANG path form) and current values, in schema order.
    fn leaves(&self) -> [(&'static str, Option<u64>); 19] {
        [
            ("carrier-transitions", self.carrier_transitions),
            ("in-broadcast-pkts", self.in_broadcast_pkts),
            ("in-discards", self.in_discards),
            ("in-errors", self.in_errors),
            ("in-fcs-errors", self.in_fcs_errors),
            ("in-multicast-pkts", self.in_multicast_pkts),
            ("in-octets", self.in_octets),
            ("in-pkts", self.in_pkts),
            ("in-unicast-pkts", self.in_unicast_pkts),
            ("in-unknown-protos", self.in_unknown_protos),
            ("last-clear", self.last_clear),
            ("out-broadcast-pkts", self.out_broadcast_pkts),
            ("out-discards", self.out_discards),
            ("out-errors", self.out_errors),
            ("out-multicast-pkts", self.out_multicast_pkts),
            ("out-octets", self.out_octets),
            ("out-pkts", self.out_pkts),
            ("out-unicast-pkts", self.out_unicast_pkts),
            ("resets", self.resets),
        ]
    }

    /// Extracts the counter leaves under the given pull policy.
    /// `last-clear` is a timestamp, not a counter, and is never pulled.
    pub fn pull(&self, mode: CounterMode) -> Vec<(&'static str, f64)> {
        let mut out = Vec::with_capacity(19);
        for (name, value) in self.leaves() {
            if name == "last-clear" {
                continue;
            }
            match mode {
                CounterMode::Normal => {
                    if let Some(v) = value {
                        out.push((name, v as f64));
                    }
                }
                CounterMode::UseDefaults => {
                    out.push((name, value.unwrap_or(0) as f64));
                }
                CounterMode::ForceToZero => {
                    if name.starts_with("in-") || name.starts_with("out-") {
                        out.push((name, 0.0));
                    } else if let Some(v) = value {
                        out.push((name, v as f64));
                    }
                }
            }
        }
        out
    }
}

/// `/interfaces/interface/aggregation/state`
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub lag_type: AggregationType,
    pub lag_speed: Option<u32>,
    pub min_links: Option<u16>,
    pub member: Vec<String>,
}

/// `/interfaces/interface/subinterfaces/subinterface`
#[derive(Debug, Clone, Default)]
pub struct Subinterface {
    pub index: Option<u32>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub admin_status: AdminStatus,
    pub oper_status: OperStatus,
    pub ifindex: Option<u32>,
    pub enabled: Option<bool>,
    pub logical: Option<bool>,
    pub management: Option<bool>,
    pub cpu: Option<bool>,
    pub last_change: Option<u64>,
    pub counters: Counters,
}

impl Subinterface {
    /// New entry with schema defaults populated.
    pub fn with_defaults(index: u32) -> Self {
        Self {
            index: Some(index),
            enabled: Some(true),
            ..Self::default()
        }
    }
}

/// `/interfaces/interface`
#[derive(Debug, Clone, Default)]
pub struct Interface {
    pub name: Option<String>,
    pub description: Option<String>,
    pub if_type: InterfaceType,
    pub admin_status: AdminStatus,
    pub oper_status: OperStatus,
    pub loopback_mode: LoopbackMode,
    pub ifindex: Option<u32>,
    pub mtu: Option<u16>,
    pub enabled: Option<bool>,
    pub logical: Option<bool>,
    pub management: Option<bool>,
    pub cpu: Option<bool>,
    pub last_change: Option<u64>,
    pub counters: Counters,
    pub aggregation: Aggregation,
    pub subinterface: BTreeMap<u32, Subinterface>,
}

impl Interface {
    /// New entry with schema defaults populated.
    pub fn with_defaults(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            enabled: Some(true),
            ..Self::default()
        }
    }

    /// Returns the subinterface at `index`, creating it with schema
    /// defaults on first access.
    pub fn subinterface_entry(&mut self, index: u32) -> &mut Subinterface {
        self.subinterface
            .entry(index)
            .or_insert_with(|| Subinterface::with_defaults(index))
    }

    /// Removes the subinterface at `index`. Returns false when absent.
    pub fn delete_subinterface(&mut self, index: u32) -> bool {
        self.subinterface.remove(&index).is_some()
    }
}

/// Model root: `/interfaces`.
#[derive(Debug, Clone, Default)]
pub struct Root {
    pub interface: BTreeMap<String, Interface>,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the interface entry for `name`, creating it with schema
    /// defaults on first access.
    pub fn interface_entry(&mut self, name: &str) -> &mut Interface {
        self.interface
            .entry(name.to_string())
            .or_insert_with(|| Interface::with_defaults(name))
    }

    /// Removes the interface `name` and its whole subtree. Returns
    /// false when absent.
    pub fn delete_interface(&mut self, name: &str) -> bool {
        self.interface.remove(name).is_some()
    }
}

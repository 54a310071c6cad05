//! Operational-state containers for `openconfig-lldp`, reduced to the
//! per-interface neighbor table.

use std::collections::BTreeMap;

use crate::enum_from_wire;

/// `…/neighbors/neighbor/state/chassis-id-type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChassisIdType {
    #[default]
    Unset,
    ChassisComponent,
    InterfaceAlias,
    PortComponent,
    MacAddress,
    NetworkAddress,
    InterfaceName,
    Local,
}

static CHASSIS_ID_TYPE_NAMES: &[(&str, ChassisIdType)] = &[
    ("CHASSIS_COMPONENT", ChassisIdType::ChassisComponent),
    ("INTERFACE_ALIAS", ChassisIdType::InterfaceAlias),
    ("PORT_COMPONENT", ChassisIdType::PortComponent),
    ("MAC_ADDRESS", ChassisIdType::MacAddress),
    ("NETWORK_ADDRESS", ChassisIdType::NetworkAddress),
    ("INTERFACE_NAME", ChassisIdType::InterfaceName),
    ("LOCAL", ChassisIdType::Local),
];

impl ChassisIdType {
    pub fn from_wire(wire: &str) -> Self {
        enum_from_wire(CHASSIS_ID_TYPE_NAMES, wire, ChassisIdType::Unset)
    }

    pub fn short_str(self) -> &'static str {
        match self {
            ChassisIdType::Unset => "",
            ChassisIdType::ChassisComponent => "CHASSIS_COMPONENT",
            ChassisIdType::InterfaceAlias => "INTERFACE_ALIAS",
            ChassisIdType::PortComponent => "PORT_COMPONENT",
            ChassisIdType::MacAddress => "MAC_ADDRESS",
            ChassisIdType::NetworkAddress => "NETWORK_ADDRESS",
            ChassisIdType::InterfaceName => "INTERFACE_NAME",
            ChassisIdType::Local => "LOCAL",
        }
    }
}

/// `…/neighbors/neighbor/state/port-id-type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortIdType {
    #[default]
    Unset,
    InterfaceAlias,
    PortComponent,
    MacAddress,
    NetworkAddress,
    InterfaceName,
    AgentCircuitId,
    Local,
}

static PORT_ID_TYPE_NAMES: &[(&str, PortIdType)] = &[
    ("INTERFACE_ALIAS", PortIdType::InterfaceAlias),
    ("PORT_COMPONENT", PortIdType::PortComponent),
    ("MAC_ADDRESS", PortIdType::MacAddress),
    ("NETWORK_ADDRESS", PortIdType::NetworkAddress),
    ("INTERFACE_NAME", PortIdType::InterfaceName),
    ("AGENT_CIRCUIT_ID", PortIdType::AgentCircuitId),
    ("LOCAL", PortIdType::Local),
];

impl PortIdType {
    pub fn from_wire(wire: &str) -> Self {
        enum_from_wire(PORT_ID_TYPE_NAMES, wire, PortIdType::Unset)
    }

    pub fn short_str(self) -> &'static str {
        match self {
            PortIdType::Unset => "",
            PortIdType::InterfaceAlias => "INTERFACE_ALIAS",
            PortIdType::PortComponent => "PORT_COMPONENT",
            PortIdType::MacAddress => "MAC_ADDRESS",
            PortIdType::NetworkAddress => "NETWORK_ADDRESS",
            PortIdType::InterfaceName => "INTERFACE_NAME",
            PortIdType::AgentCircuitId => "AGENT_CIRCUIT_ID",
            PortIdType::Local => "LOCAL",
        }
    }
}

/// `/lldp/interfaces/interface/neighbors/neighbor`
#[derive(Debug, Clone, Default)]
pub struct Neighbor {
    pub id: Option<String>,
    pub age: Option<u64>,
    pub chassis_id: Option<String>,
    pub chassis_id_type: ChassisIdType,
    pub last_update: Option<i64>,
    pub management_address: Option<String>,
    pub management_address_type: Option<String>,
    pub port_description: Option<String>,
    pub port_id: Option<String>,
    pub port_id_type: PortIdType,
    pub system_description: Option<String>,
    pub system_name: Option<String>,
    pub ttl: Option<u16>,
}

impl Neighbor {
    pub fn with_defaults(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }
}

/// `/lldp/interfaces/interface`
#[derive(Debug, Clone, Default)]
pub struct Interface {
    pub name: Option<String>,
    pub neighbor: BTreeMap<String, Neighbor>,
}

impl Interface {
    pub fn with_defaults(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            neighbor: BTreeMap::new(),
        }
    }

    /// Returns the neighbor entry for `id`, creating it with schema
    /// defaults on first access.
    pub fn neighbor_entry(&mut self, id: &str) -> &mut Neighbor {
        self.neighbor
            .entry(id.to_string())
            .or_insert_with(|| Neighbor::with_defaults(id))
    }

    pub fn delete_neighbor(&mut self, id: &str) -> bool {
        self.neighbor.remove(id).is_some()
    }
}

/// `/lldp` container.
#[derive(Debug, Clone, Default)]
pub struct Lldp {
    pub interface: BTreeMap<String, Interface>,
}

impl Lldp {
    /// Returns the interface entry for `name`, creating it with schema
    /// defaults on first access.
    pub fn interface_entry(&mut self, name: &str) -> &mut Interface {
        self.interface
            .entry(name.to_string())
            .or_insert_with(|| Interface::with_defaults(name))
    }

    pub fn delete_interface(&mut self, name: &str) -> bool {
        self.interface.remove(name).is_some()
    }
}

/// Model root.
#[derive(Debug, Clone, Default)]
pub struct Root {
    pub lldp: Lldp,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }
}

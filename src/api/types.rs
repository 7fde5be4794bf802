use std::net::Ipv4Addr;

/// Offset/limit pair sent with listing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pagination {
  pub offset: u32,
  pub limit: u32,
}

impl Pagination {
  pub fn first(limit: u32) -> Self {
    Self { offset: 0, limit }
  }

  pub fn next(self) -> Self {
    Self {
      offset: self.offset + self.limit,
      ..self
    }
  }

  pub fn previous(self) -> Self {
    Self {
      offset: self.offset.saturating_sub(self.limit),
      ..self
    }
  }

  /// 1-based page number for display
  pub fn page_number(&self) -> u32 {
    if self.limit == 0 {
      1
    } else {
      self.offset / self.limit + 1
    }
  }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
}

impl<T> Page<T> {
  pub fn empty() -> Self {
    Self {
      items: Vec::new(),
      total: 0,
    }
  }

  /// Whether another page follows the one starting at `pagination`.
  pub fn has_more(&self, pagination: Pagination) -> bool {
    u64::from(pagination.offset) + (self.items.len() as u64) < self.total
  }
}

/// IPAM network
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
  pub id: String,
  pub name: String,
  pub vlan_id: Option<i64>,
  pub subnet_mask: Option<u8>,
  pub gateway: String,
  pub address: String,
  pub dhcp_enabled: bool,
  pub dhcp_start: String,
  pub dhcp_end: String,
  pub port_group_id: String,
  pub domain: String,
  pub dns_servers: Vec<String>,
}

impl Network {
  /// Identifier used in URLs and resource keys
  pub fn code(&self) -> &str {
    &self.name
  }

  /// Number of host addresses in the subnet (network and broadcast excluded).
  pub fn usable_addresses(&self) -> u64 {
    match self.subnet_mask {
      Some(mask @ 1..=32) => (1u64 << (32 - u32::from(mask))).saturating_sub(2),
      _ => 0,
    }
  }

  /// Share of usable addresses taken, rounded to a whole percent.
  pub fn usage_percent(&self, taken: usize) -> u8 {
    usage_percent(taken, self.usable_addresses())
  }

  pub fn cidr(&self) -> String {
    match self.subnet_mask {
      Some(mask) => format!("{}/{}", self.address, mask),
      None => self.address.clone(),
    }
  }
}

/// `round(taken / max(total, 1) * 100)`, clamped to 100.
pub fn usage_percent(taken: usize, total: u64) -> u8 {
  let total = total.max(1) as f64;
  let percent = (taken as f64 / total * 100.0).round();
  percent.min(100.0) as u8
}

/// Address assigned inside a network
#[derive(Debug, Clone, PartialEq)]
pub struct IpAddress {
  pub id: String,
  pub address: String,
  pub prefix_length: Option<u8>,
  pub hostname: String,
  pub description: String,
  pub state: String,
  pub interface_id: String,
  pub network_id: String,
}

impl IpAddress {
  pub fn cidr(&self) -> String {
    match self.prefix_length {
      Some(prefix) => format!("{}/{}", self.address, prefix),
      None => self.address.clone(),
    }
  }
}

/// Numeric value of a dotted IPv4 address, for ordering.
pub fn ip_to_number(ip: &str) -> Option<u32> {
  ip.trim().parse::<Ipv4Addr>().ok().map(u32::from)
}

/// Sort addresses numerically; unparseable ones go last in text order.
pub fn sort_by_address(ips: &mut [IpAddress]) {
  ips.sort_by(|a, b| {
    let key = |ip: &IpAddress| (ip_to_number(&ip.address).unwrap_or(u32::MAX), ip.address.clone());
    key(a).cmp(&key(b))
  });
}

/// Next unassigned address the backend suggests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeIp {
  pub address: String,
  pub prefix: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
  On,
  Off,
  Unknown,
}

impl PowerState {
  pub fn parse(value: &str) -> Self {
    match value.to_ascii_lowercase().as_str() {
      "on" | "poweredon" | "running" | "started" => PowerState::On,
      "off" | "poweredoff" | "stopped" | "shutdown" => PowerState::Off,
      _ => PowerState::Unknown,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      PowerState::On => "running",
      PowerState::Off => "stopped",
      PowerState::Unknown => "unknown",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMachine {
  pub id: String,
  pub name: String,
  pub memory_mb: i64,
  pub num_cpus: i64,
  pub power_state: PowerState,
  pub template_id: String,
  pub network: String,
  pub ip_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
  pub id: String,
  pub name: String,
  pub os_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SshKey {
  pub id: String,
  pub name: String,
  pub key_type: String,
  pub public_key: String,
}

// ============================================================================
// Drafts: the user-editable subset of each record
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkDraft {
  pub name: String,
  pub vlan_id: Option<i64>,
  pub subnet_mask: Option<i64>,
  pub gateway: String,
  pub address: String,
  pub dhcp_enabled: bool,
  pub dhcp_start: String,
  pub dhcp_end: String,
  pub port_group_id: String,
  pub domain: String,
  /// Comma-separated while editing
  pub dns_servers: String,
}

impl From<&Network> for NetworkDraft {
  fn from(network: &Network) -> Self {
    Self {
      name: network.name.clone(),
      vlan_id: network.vlan_id,
      subnet_mask: network.subnet_mask.map(i64::from),
      gateway: network.gateway.clone(),
      address: network.address.clone(),
      dhcp_enabled: network.dhcp_enabled,
      dhcp_start: network.dhcp_start.clone(),
      dhcp_end: network.dhcp_end.clone(),
      port_group_id: network.port_group_id.clone(),
      domain: network.domain.clone(),
      dns_servers: network.dns_servers.join(", "),
    }
  }
}

impl NetworkDraft {
  pub fn dns_server_list(&self) -> Vec<String> {
    self
      .dns_servers
      .split(',')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(String::from)
      .collect()
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpAddressDraft {
  pub ip_address: String,
  pub prefix_length: Option<i64>,
  pub hostname: String,
  pub description: String,
}

impl IpAddressDraft {
  /// Prefill from the backend's next free address.
  pub fn from_free_ip(free: &FreeIp) -> Self {
    Self {
      ip_address: free.address.clone(),
      prefix_length: free.prefix.map(i64::from),
      ..Self::default()
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VmDraft {
  pub name: String,
  pub memory_mb: Option<i64>,
  pub num_cpus: Option<i64>,
}

impl From<&VirtualMachine> for VmDraft {
  fn from(vm: &VirtualMachine) -> Self {
    Self {
      name: vm.name.clone(),
      memory_mb: Some(vm.memory_mb),
      num_cpus: Some(vm.num_cpus),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SshKeyDraft {
  pub name: String,
  pub key_type: String,
}

impl Default for SshKeyDraft {
  fn default() -> Self {
    Self {
      name: String::new(),
      key_type: "ed25519".to_string(),
    }
  }
}

//! Typed forms for the console's drafts.

mod field;
mod state;
mod validate;

pub use field::{Choice, Field, SelectOption};
pub use state::{FormEvent, FormState};
pub use validate::{
  validate_ip_address, validate_network, validate_ssh_key, validate_vm, FieldErrors,
};

use crate::api::types::{IpAddressDraft, NetworkDraft, SshKeyDraft, VmDraft};

/// Key types the backend can generate
pub const SSH_KEY_TYPES: &[&str] = &["ed25519", "rsa", "ecdsa"];

pub fn network_fields() -> Vec<Field<NetworkDraft>> {
  vec![
    Field::Text {
      name: "name",
      label: "Name",
      get: |d| d.name.as_str(),
      set: |d, v| d.name = v,
    },
    Field::Text {
      name: "address",
      label: "Network Address",
      get: |d| d.address.as_str(),
      set: |d, v| d.address = v,
    },
    Field::Number {
      name: "subnet_mask",
      label: "Subnet Mask",
      get: |d| d.subnet_mask,
      set: |d, v| d.subnet_mask = v,
    },
    Field::Text {
      name: "gateway",
      label: "Gateway",
      get: |d| d.gateway.as_str(),
      set: |d, v| d.gateway = v,
    },
    Field::Number {
      name: "vlan_id",
      label: "VLAN ID",
      get: |d| d.vlan_id,
      set: |d, v| d.vlan_id = v,
    },
    Field::Checkbox {
      name: "dhcp_enabled",
      label: "DHCP Enabled",
      get: |d| d.dhcp_enabled,
      set: |d, v| d.dhcp_enabled = v,
    },
    Field::Text {
      name: "dhcp_start",
      label: "DHCP Start",
      get: |d| d.dhcp_start.as_str(),
      set: |d, v| d.dhcp_start = v,
    },
    Field::Text {
      name: "dhcp_end",
      label: "DHCP End",
      get: |d| d.dhcp_end.as_str(),
      set: |d, v| d.dhcp_end = v,
    },
    Field::Text {
      name: "port_group_id",
      label: "Port Group",
      get: |d| d.port_group_id.as_str(),
      set: |d, v| d.port_group_id = v,
    },
    Field::Text {
      name: "domain",
      label: "Domain",
      get: |d| d.domain.as_str(),
      set: |d, v| d.domain = v,
    },
    Field::Text {
      name: "dns_servers",
      label: "DNS Servers",
      get: |d| d.dns_servers.as_str(),
      set: |d, v| d.dns_servers = v,
    },
  ]
}

pub fn ip_address_fields() -> Vec<Field<IpAddressDraft>> {
  vec![
    Field::Text {
      name: "ip_address",
      label: "IP Address",
      get: |d| d.ip_address.as_str(),
      set: |d, v| d.ip_address = v,
    },
    Field::Number {
      name: "prefix_length",
      label: "Prefix",
      get: |d| d.prefix_length,
      set: |d, v| d.prefix_length = v,
    },
    Field::Text {
      name: "hostname",
      label: "Hostname",
      get: |d| d.hostname.as_str(),
      set: |d, v| d.hostname = v,
    },
    Field::Text {
      name: "description",
      label: "Description",
      get: |d| d.description.as_str(),
      set: |d, v| d.description = v,
    },
  ]
}

pub fn vm_fields() -> Vec<Field<VmDraft>> {
  vec![
    Field::Text {
      name: "name",
      label: "Name",
      get: |d| d.name.as_str(),
      set: |d, v| d.name = v,
    },
    Field::Number {
      name: "memory_mb",
      label: "Memory (MB)",
      get: |d| d.memory_mb,
      set: |d, v| d.memory_mb = v,
    },
    Field::Number {
      name: "num_cpus",
      label: "vCPUs",
      get: |d| d.num_cpus,
      set: |d, v| d.num_cpus = v,
    },
  ]
}

pub fn ssh_key_fields() -> Vec<Field<SshKeyDraft>> {
  vec![
    Field::Text {
      name: "name",
      label: "Name",
      get: |d| d.name.as_str(),
      set: |d, v| d.name = v,
    },
    Field::Select {
      name: "key_type",
      label: "Key Type",
      get: |d| d.key_type.as_str(),
      set: |d, v| d.key_type = v,
      choices: Choice::from_options(SSH_KEY_TYPES),
    },
  ]
}

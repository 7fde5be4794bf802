//! Local validation run before any write reaches the backend.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::api::types::{IpAddressDraft, NetworkDraft, SshKeyDraft, VmDraft};

/// Field name to message, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Record a message; the first message for a field wins.
  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self.0.entry(field.to_string()).or_insert_with(|| message.into());
  }

  pub fn get(&self, field: &str) -> Option<&str> {
    self.0.get(field).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn clear(&mut self) {
    self.0.clear();
  }
}

impl From<&BTreeMap<String, String>> for FieldErrors {
  /// Adopt backend field messages, normalizing `SubnetMask` / `subnetMask`
  /// style names to the snake_case names forms use.
  fn from(fields: &BTreeMap<String, String>) -> Self {
    let mut errors = FieldErrors::new();
    for (field, message) in fields {
      errors.add(&snake_case(field), message.clone());
    }
    errors
  }
}

fn snake_case(name: &str) -> String {
  let mut out = String::with_capacity(name.len() + 4);
  let mut prev_lower = false;
  for c in name.chars() {
    if c.is_ascii_uppercase() {
      if prev_lower {
        out.push('_');
      }
      out.push(c.to_ascii_lowercase());
      prev_lower = false;
    } else {
      prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
      out.push(c);
    }
  }
  out
}

fn is_blank(value: &str) -> bool {
  value.trim().is_empty()
}

fn is_ipv4(value: &str) -> bool {
  value.trim().parse::<Ipv4Addr>().is_ok()
}

/// Require an IPv4 address in `field`.
fn require_ipv4(errors: &mut FieldErrors, field: &str, value: &str, missing: &str) {
  if is_blank(value) {
    errors.add(field, missing);
  } else if !is_ipv4(value) {
    errors.add(field, "Invalid IPv4 address");
  }
}

/// Check an optional IPv4 address in `field`.
fn optional_ipv4(errors: &mut FieldErrors, field: &str, value: &str) {
  if !is_blank(value) && !is_ipv4(value) {
    errors.add(field, "Invalid IPv4 address");
  }
}

pub fn validate_network(draft: &NetworkDraft) -> FieldErrors {
  let mut errors = FieldErrors::new();

  if is_blank(&draft.name) {
    errors.add("name", "Name is required");
  }
  require_ipv4(
    &mut errors,
    "address",
    &draft.address,
    "Network address is required",
  );
  match draft.subnet_mask {
    None => errors.add("subnet_mask", "Subnet Mask is required"),
    Some(mask) if !(1..=32).contains(&mask) => {
      errors.add("subnet_mask", "Subnet Mask must be between 1 and 32")
    }
    Some(_) => {}
  }
  require_ipv4(&mut errors, "gateway", &draft.gateway, "Gateway is required");

  if draft.dhcp_enabled {
    optional_ipv4(&mut errors, "dhcp_start", &draft.dhcp_start);
    optional_ipv4(&mut errors, "dhcp_end", &draft.dhcp_end);
  }
  for server in draft.dns_server_list() {
    if !is_ipv4(&server) {
      errors.add("dns_servers", "Invalid IPv4 address");
    }
  }

  errors
}

pub fn validate_ip_address(draft: &IpAddressDraft) -> FieldErrors {
  let mut errors = FieldErrors::new();
  require_ipv4(&mut errors, "ip_address", &draft.ip_address, "IP is required");
  if let Some(prefix) = draft.prefix_length {
    if !(1..=32).contains(&prefix) {
      errors.add("prefix_length", "Prefix length must be between 1 and 32");
    }
  }
  errors
}

pub fn validate_vm(draft: &VmDraft) -> FieldErrors {
  let mut errors = FieldErrors::new();
  if is_blank(&draft.name) {
    errors.add("name", "Name is required");
  }
  if draft.memory_mb.map_or(true, |m| m <= 0) {
    errors.add("memory_mb", "Memory must be greater than zero");
  }
  if draft.num_cpus.map_or(true, |c| c <= 0) {
    errors.add("num_cpus", "vCPU count must be greater than zero");
  }
  errors
}

pub fn validate_ssh_key(draft: &SshKeyDraft) -> FieldErrors {
  let mut errors = FieldErrors::new();
  if is_blank(&draft.name) {
    errors.add("name", "Name is required");
  }
  errors
}

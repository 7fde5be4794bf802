//! Resource keys for every backend resource and the invalidations each write declares.
//!
//! Dependent resources nest under their owner's key, so a prefix pattern on
//! `["network", code]` also reaches that network's IP list and free-IP hint.

use crate::query::{KeyPattern, ResourceKey};

use super::types::Pagination;

pub const NETWORK_LIST: &str = "network-list";
pub const NETWORK: &str = "network";
pub const VM_LIST: &str = "vm-list";
pub const VM: &str = "vm";
pub const TEMPLATE_LIST: &str = "template-list";
pub const SSH_KEYS: &str = "ssh-keys";

pub fn network_list(pagination: Pagination) -> ResourceKey {
  ResourceKey::new(NETWORK_LIST)
    .with(pagination.offset)
    .with(pagination.limit)
}

pub fn network(code: &str) -> ResourceKey {
  ResourceKey::new(NETWORK).with(code)
}

pub fn ip_addresses(code: &str) -> ResourceKey {
  network(code).with("ip-addresses")
}

pub fn free_ip(code: &str) -> ResourceKey {
  network(code).with("free-ip")
}

pub fn vm_list(pagination: Pagination) -> ResourceKey {
  ResourceKey::new(VM_LIST)
    .with(pagination.offset)
    .with(pagination.limit)
}

pub fn vm(name: &str) -> ResourceKey {
  ResourceKey::new(VM).with(name)
}

pub fn template_list(pagination: Pagination) -> ResourceKey {
  ResourceKey::new(TEMPLATE_LIST)
    .with(pagination.offset)
    .with(pagination.limit)
}

pub fn ssh_keys() -> ResourceKey {
  ResourceKey::new(SSH_KEYS)
}

// ============================================================================
// Invalidation plans
// ============================================================================

pub fn after_network_created() -> Vec<KeyPattern> {
  vec![KeyPattern::tag(NETWORK_LIST)]
}

/// An update may rename the network, which changes its code. The old code's
/// key and dependents are invalidated so anyone still watching them observes
/// the rename; the new code's key is invalidated in case it was cached.
pub fn after_network_updated(old_code: &str, new_code: &str) -> Vec<KeyPattern> {
  let mut patterns = vec![
    KeyPattern::Prefix(network(old_code)),
    KeyPattern::tag(NETWORK_LIST),
  ];
  if old_code != new_code {
    patterns.push(KeyPattern::Exact(network(new_code)));
  }
  patterns
}

pub fn after_network_deleted(code: &str) -> Vec<KeyPattern> {
  vec![
    KeyPattern::Prefix(network(code)),
    KeyPattern::tag(NETWORK_LIST),
  ]
}

/// Only the address list; the network record itself is left alone.
pub fn after_ip_created(code: &str) -> Vec<KeyPattern> {
  vec![KeyPattern::Exact(ip_addresses(code))]
}

pub fn after_ip_deleted(code: &str) -> Vec<KeyPattern> {
  vec![KeyPattern::Exact(ip_addresses(code))]
}

pub fn after_vm_updated(old_name: &str, new_name: &str) -> Vec<KeyPattern> {
  let mut patterns = vec![KeyPattern::Exact(vm(old_name)), KeyPattern::tag(VM_LIST)];
  if old_name != new_name {
    patterns.push(KeyPattern::Exact(vm(new_name)));
  }
  patterns
}

/// Power changes show up both in the record and in listings.
pub fn after_vm_power_changed(name: &str) -> Vec<KeyPattern> {
  vec![KeyPattern::Exact(vm(name)), KeyPattern::tag(VM_LIST)]
}

pub fn after_ssh_key_generated() -> Vec<KeyPattern> {
  vec![KeyPattern::Exact(ssh_keys())]
}

#[cfg(test)]
mod tests {
  use super::*;

  fn matched(patterns: &[KeyPattern], key: &ResourceKey) -> bool {
    patterns.iter().any(|p| p.matches(key))
  }

  #[test]
  fn test_key_encoding() {
    assert_eq!(network("N1").to_string(), "[network, N1]");
    assert_eq!(ip_addresses("N1").to_string(), "[network, N1, ip-addresses]");
    assert_eq!(
      network_list(Pagination::first(25)).to_string(),
      "[network-list, 0, 25]"
    );
    assert_ne!(
      network_list(Pagination::first(25)),
      network_list(Pagination::first(25).next())
    );
  }

  #[test]
  fn test_ip_creation_touches_only_the_ip_list() {
    let plan = after_ip_created("N1");
    assert!(matched(&plan, &ip_addresses("N1")));
    assert!(!matched(&plan, &network("N1")));
    assert!(!matched(&plan, &free_ip("N1")));
    assert!(!matched(&plan, &ip_addresses("N2")));
    assert!(!matched(&plan, &network_list(Pagination::first(25))));
  }

  #[test]
  fn test_rename_reaches_old_dependents_and_new_key() {
    let plan = after_network_updated("N1", "N2");
    assert!(matched(&plan, &network("N1")));
    assert!(matched(&plan, &ip_addresses("N1")));
    assert!(matched(&plan, &network("N2")));
    assert!(!matched(&plan, &ip_addresses("N2")));
    assert!(matched(&plan, &network_list(Pagination::first(10).next())));
  }

  #[test]
  fn test_delete_network_plan() {
    let plan = after_network_deleted("N1");
    assert!(matched(&plan, &free_ip("N1")));
    assert!(!matched(&plan, &network("N10")));
    assert!(!matched(&plan, &vm("N1")));
  }

  #[test]
  fn test_vm_plans() {
    let plan = after_vm_power_changed("web-1");
    assert!(matched(&plan, &vm("web-1")));
    assert!(matched(&plan, &vm_list(Pagination::first(25))));
    assert!(!matched(&plan, &vm("web-2")));

    assert_eq!(after_vm_updated("a", "a").len(), 2);
    assert!(matched(&after_vm_updated("a", "b"), &vm("b")));
  }
}

//! Resource keys and the patterns used to invalidate them.

use std::fmt;

/// Canonical identity of a cached value.
///
/// A key is an ordered list of segments. The first segment is the resource
/// tag (e.g. `"network"`), the rest are scoping identifiers. Dependent
/// resources nest under their owner, so `["network", "N1", "ip-addresses"]`
/// starts with `["network", "N1"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
  segments: Vec<String>,
}

impl ResourceKey {
  /// Create a key holding only a resource tag.
  pub fn new(tag: impl Into<String>) -> Self {
    Self {
      segments: vec![tag.into()],
    }
  }

  /// Append a scoping identifier.
  pub fn with(mut self, segment: impl ToString) -> Self {
    self.segments.push(segment.to_string());
    self
  }

  pub fn tag(&self) -> &str {
    &self.segments[0]
  }

  pub fn segments(&self) -> &[String] {
    &self.segments
  }

  /// True when every segment of `prefix` matches the leading segments of `self`.
  pub fn starts_with(&self, prefix: &ResourceKey) -> bool {
    self.segments.starts_with(&prefix.segments)
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}]", self.segments.join(", "))
  }
}

/// Selects the cache entries an invalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
  /// Exactly one key
  Exact(ResourceKey),
  /// Every key starting with the given segments (a bare tag matches the whole resource type)
  Prefix(ResourceKey),
}

impl KeyPattern {
  /// Pattern matching every key of a resource type.
  pub fn tag(tag: impl Into<String>) -> Self {
    Self::Prefix(ResourceKey::new(tag))
  }

  pub fn matches(&self, key: &ResourceKey) -> bool {
    match self {
      Self::Exact(exact) => exact == key,
      Self::Prefix(prefix) => key.starts_with(prefix),
    }
  }
}

impl From<ResourceKey> for KeyPattern {
  fn from(key: ResourceKey) -> Self {
    Self::Exact(key)
  }
}

impl fmt::Display for KeyPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Exact(key) => write!(f, "{}", key),
      Self::Prefix(key) => write!(f, "{}*", key),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_equality_requires_every_segment() {
    let a = ResourceKey::new("network").with("N1");
    let b = ResourceKey::new("network").with("N1");
    let c = ResourceKey::new("network").with("N2");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, ResourceKey::new("network"));
  }

  #[test]
  fn test_prefix_matches_dependents() {
    let network = ResourceKey::new("network").with("N1");
    let ips = network.clone().with("ip-addresses");
    let other = ResourceKey::new("network").with("N10");

    let pattern = KeyPattern::Prefix(network.clone());
    assert!(pattern.matches(&network));
    assert!(pattern.matches(&ips));
    assert!(!pattern.matches(&other));
  }

  #[test]
  fn test_exact_does_not_match_owner() {
    let network = ResourceKey::new("network").with("N1");
    let ips = network.clone().with("ip-addresses");

    let pattern = KeyPattern::from(ips.clone());
    assert!(pattern.matches(&ips));
    assert!(!pattern.matches(&network));
  }

  #[test]
  fn test_tag_pattern() {
    let pattern = KeyPattern::tag("vm");
    assert!(pattern.matches(&ResourceKey::new("vm").with("web-1")));
    assert!(!pattern.matches(&ResourceKey::new("vm-list").with(0).with(25)));
  }

  #[test]
  fn test_display() {
    let key = ResourceKey::new("network").with("N1");
    assert_eq!(key.to_string(), "[network, N1]");
    assert_eq!(KeyPattern::Prefix(key).to_string(), "[network, N1]*");
  }
}

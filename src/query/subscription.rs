use tokio::sync::mpsc;

use super::key::ResourceKey;

/// Identifier of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Handle returned by `QueryClient::subscribe`.
///
/// Hand it back to `QueryClient::unsubscribe` when the view is torn down.
/// Dropping it has the same effect: the release is queued and applied before
/// the client next polls, invalidates or ensures, so a dropped handle never
/// triggers a refresh.
#[must_use = "dropping a subscription releases it"]
#[derive(Debug)]
pub struct Subscription {
  id: SubscriptionId,
  key: ResourceKey,
  release: Option<mpsc::UnboundedSender<SubscriptionId>>,
}

impl Subscription {
  pub(crate) fn new(
    id: SubscriptionId,
    key: ResourceKey,
    release: mpsc::UnboundedSender<SubscriptionId>,
  ) -> Self {
    Self {
      id,
      key,
      release: Some(release),
    }
  }

  pub fn id(&self) -> SubscriptionId {
    self.id
  }

  pub fn key(&self) -> &ResourceKey {
    &self.key
  }

  /// Disarm the drop-time release; the caller releases the id directly.
  pub(crate) fn disarm(mut self) -> SubscriptionId {
    self.release = None;
    self.id
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(tx) = self.release.take() {
      // Client already gone: nothing left to release
      let _ = tx.send(self.id);
    }
  }
}

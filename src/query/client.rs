//! Session-scoped resource cache with subscriptions and invalidation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::entry::{CacheEntry, Status};
use super::key::{KeyPattern, ResourceKey};
use super::subscription::{Subscription, SubscriptionId};

/// A factory producing one fetch per call.
pub type Loader<V, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, E>> + Send + Sync>;

/// Wrap an async closure into a [`Loader`].
pub fn loader<V, E, F, Fut>(fetcher: F) -> Loader<V, E>
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<V, E>> + Send + 'static,
{
  Arc::new(move || -> BoxFuture<'static, Result<V, E>> { Box::pin(fetcher()) })
}

type UpdateFn<V, E> = Box<dyn FnMut(&ResourceKey, &CacheEntry<V, E>) + Send>;

struct Subscriber<V, E> {
  id: SubscriptionId,
  on_update: UpdateFn<V, E>,
}

struct Completion<V, E> {
  key: ResourceKey,
  result: Result<V, E>,
}

/// Cache timing policy.
#[derive(Debug, Clone)]
pub struct QueryConfig {
  /// Fresh data older than this is refetched by `ensure`. `None` keeps it fresh until invalidated.
  pub stale_time: Option<chrono::Duration>,
  /// Grace period before an unsubscribed entry is evicted. `None` never evicts.
  pub gc_time: Option<Duration>,
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      stale_time: None,
      gc_time: Some(Duration::from_secs(5 * 60)),
    }
  }
}

/// The cache store, fetch registry, subscription layer and invalidation bus.
///
/// One instance lives for the whole session and is owned by a single task.
/// Loaders run as spawned tasks; their results queue on a channel and are
/// applied by [`QueryClient::poll`] (or [`QueryClient::until_idle`]), so every
/// entry update and subscriber notification runs to completion on the owner.
pub struct QueryClient<V, E> {
  config: QueryConfig,
  entries: HashMap<ResourceKey, CacheEntry<V, E>>,
  loaders: HashMap<ResourceKey, Loader<V, E>>,
  /// Number of loader invocations pending per key
  in_flight: HashMap<ResourceKey, usize>,
  subscribers: HashMap<ResourceKey, Vec<Subscriber<V, E>>>,
  subscription_keys: HashMap<SubscriptionId, ResourceKey>,
  /// When each key lost its last subscriber
  unused_since: HashMap<ResourceKey, Instant>,
  next_id: u64,
  completion_tx: mpsc::UnboundedSender<Completion<V, E>>,
  completion_rx: mpsc::UnboundedReceiver<Completion<V, E>>,
  release_tx: mpsc::UnboundedSender<SubscriptionId>,
  release_rx: mpsc::UnboundedReceiver<SubscriptionId>,
  /// Invalidations posted by writes that succeeded
  write_tx: mpsc::UnboundedSender<Vec<KeyPattern>>,
  write_rx: mpsc::UnboundedReceiver<Vec<KeyPattern>>,
}

impl<V, E> QueryClient<V, E>
where
  V: Send + 'static,
  E: fmt::Display + Send + 'static,
{
  pub fn new(config: QueryConfig) -> Self {
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let (release_tx, release_rx) = mpsc::unbounded_channel();
    let (write_tx, write_rx) = mpsc::unbounded_channel();

    Self {
      config,
      entries: HashMap::new(),
      loaders: HashMap::new(),
      in_flight: HashMap::new(),
      subscribers: HashMap::new(),
      subscription_keys: HashMap::new(),
      unused_since: HashMap::new(),
      next_id: 0,
      completion_tx,
      completion_rx,
      release_tx,
      release_rx,
      write_tx,
      write_rx,
    }
  }

  // ==========================================================================
  // Cache store
  // ==========================================================================

  /// Read an entry without side effects.
  pub fn get(&self, key: &ResourceKey) -> Option<&CacheEntry<V, E>> {
    self.entries.get(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Overwrite an entry's data, status and timestamp. Only reached through
  /// loader completions, which keeps a single writer per key.
  fn put(&mut self, key: &ResourceKey, data: V, status: Status) {
    let entry = self.entries.entry(key.clone()).or_default();
    entry.store(data, status);
  }

  /// Mark every matching entry stale, keeping its data servable.
  ///
  /// Entries mid-fetch are flagged instead so their result lands as stale.
  /// Errored entries keep their error visible. Returns the keys that changed.
  pub fn mark_stale(&mut self, pattern: &KeyPattern) -> Vec<ResourceKey> {
    let mut marked = Vec::new();
    for (key, entry) in self.entries.iter_mut() {
      if !pattern.matches(key) {
        continue;
      }
      match entry.status() {
        Status::Loading => entry.invalidated_in_flight = true,
        Status::Idle | Status::Fresh => {
          entry.mark_stale();
          Self::notify(&mut self.subscribers, key, entry);
          marked.push(key.clone());
        }
        Status::Stale | Status::Errored => {}
      }
    }
    marked
  }

  /// Remove an entry entirely.
  pub fn evict(&mut self, key: &ResourceKey) -> bool {
    self.unused_since.remove(key);
    if !self.subscribers.contains_key(key) {
      self.loaders.remove(key);
    }
    let removed = self.entries.remove(key).is_some();
    if removed {
      debug!(%key, "evicted");
    }
    removed
  }

  // ==========================================================================
  // Fetch registry
  // ==========================================================================

  /// Register (or replace) the loader for a key without fetching.
  pub fn register(&mut self, key: ResourceKey, loader: Loader<V, E>) {
    self.loaders.insert(key, loader);
  }

  pub fn is_fetching(&self, key: &ResourceKey) -> bool {
    self.in_flight.contains_key(key)
  }

  /// Start a fetch if the key is missing or stale and none is in flight.
  ///
  /// Returns `true` when a loader was started.
  pub fn ensure(&mut self, key: &ResourceKey) -> bool {
    self.drain_releases();
    if self.in_flight.contains_key(key) {
      return false;
    }

    let needs_fetch = match self.entries.get(key) {
      None => true,
      Some(entry) => match entry.status() {
        Status::Idle | Status::Stale => true,
        Status::Fresh => self
          .config
          .stale_time
          .is_some_and(|stale_time| entry.is_expired(stale_time)),
        Status::Loading | Status::Errored => false,
      },
    };

    needs_fetch && self.start_fetch(key)
  }

  /// Fetch again unless a fetch is already in flight. Used for manual retry.
  pub fn retry(&mut self, key: &ResourceKey) -> bool {
    if self.in_flight.contains_key(key) {
      return false;
    }
    self.start_fetch(key)
  }

  /// Start another fetch even if one is in flight. Completions are applied
  /// in the order they resolve, so the last one to finish wins.
  pub fn refetch(&mut self, key: &ResourceKey) -> bool {
    self.start_fetch(key)
  }

  fn start_fetch(&mut self, key: &ResourceKey) -> bool {
    let future = match self.loaders.get(key) {
      Some(loader) => loader(),
      None => {
        warn!(%key, "no loader registered");
        return false;
      }
    };

    let tx = self.completion_tx.clone();
    let task_key = key.clone();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the client may have been dropped
      let _ = tx.send(Completion {
        key: task_key,
        result,
      });
    });

    *self.in_flight.entry(key.clone()).or_insert(0) += 1;
    let entry = self.entries.entry(key.clone()).or_default();
    entry.begin_loading();
    debug!(%key, "fetch started");
    Self::notify(&mut self.subscribers, key, entry);
    true
  }

  fn apply(&mut self, completion: Completion<V, E>) {
    let Completion { key, result } = completion;

    let remaining = match self.in_flight.get_mut(&key) {
      Some(count) => {
        *count = count.saturating_sub(1);
        *count
      }
      None => 0,
    };
    if remaining == 0 {
      self.in_flight.remove(&key);
    }

    let mut refresh = false;
    match result {
      Ok(data) => {
        let invalidated = self
          .entries
          .get(&key)
          .is_some_and(|entry| entry.invalidated_in_flight);
        let status = if invalidated {
          Status::Stale
        } else {
          Status::Fresh
        };
        self.put(&key, data, status);
        refresh = invalidated && remaining == 0;
        debug!(%key, status = status.label(), "fetch finished");
      }
      Err(error) => {
        warn!(%key, %error, "fetch failed");
        self.entries.entry(key.clone()).or_default().fail(error);
      }
    }

    if let Some(entry) = self.entries.get_mut(&key) {
      if remaining == 0 {
        entry.invalidated_in_flight = false;
      }
      Self::notify(&mut self.subscribers, &key, entry);
    }

    if refresh && self.subscribers.contains_key(&key) {
      self.start_fetch(&key);
    }
  }

  // ==========================================================================
  // Subscriptions
  // ==========================================================================

  /// Declare a dependency on `key`.
  ///
  /// The loader replaces any previously registered one for the key, and a
  /// fetch starts right away if the key is missing or stale. `on_update` runs
  /// whenever the entry changes.
  pub fn subscribe<F>(&mut self, key: ResourceKey, loader: Loader<V, E>, on_update: F) -> Subscription
  where
    F: FnMut(&ResourceKey, &CacheEntry<V, E>) + Send + 'static,
  {
    self.next_id += 1;
    let id = SubscriptionId(self.next_id);

    self.loaders.insert(key.clone(), loader);
    self.subscribers.entry(key.clone()).or_default().push(Subscriber {
      id,
      on_update: Box::new(on_update),
    });
    self.subscription_keys.insert(id, key.clone());
    self.unused_since.remove(&key);
    debug!(%key, id = id.0, "subscribed");

    self.ensure(&key);
    Subscription::new(id, key, self.release_tx.clone())
  }

  pub fn unsubscribe(&mut self, subscription: Subscription) {
    let id = subscription.disarm();
    self.release(id);
  }

  pub fn subscriber_count(&self, key: &ResourceKey) -> usize {
    self.subscribers.get(key).map_or(0, Vec::len)
  }

  /// Apply releases queued by dropped handles.
  fn drain_releases(&mut self) {
    while let Ok(id) = self.release_rx.try_recv() {
      self.release(id);
    }
  }

  fn release(&mut self, id: SubscriptionId) {
    let Some(key) = self.subscription_keys.remove(&id) else {
      return;
    };

    if let Some(list) = self.subscribers.get_mut(&key) {
      list.retain(|subscriber| subscriber.id != id);
      if list.is_empty() {
        self.subscribers.remove(&key);
        self.unused_since.insert(key.clone(), Instant::now());
        debug!(%key, "last subscriber released");
      }
    }
  }

  fn notify(
    subscribers: &mut HashMap<ResourceKey, Vec<Subscriber<V, E>>>,
    key: &ResourceKey,
    entry: &CacheEntry<V, E>,
  ) {
    if let Some(list) = subscribers.get_mut(key) {
      for subscriber in list.iter_mut() {
        (subscriber.on_update)(key, entry);
      }
    }
  }

  // ==========================================================================
  // Invalidation
  // ==========================================================================

  /// Mark matching entries stale and refresh the subscribed ones.
  ///
  /// Returns the number of fetches started.
  pub fn invalidate(&mut self, pattern: &KeyPattern) -> usize {
    self.drain_releases();
    self.mark_stale(pattern);

    let targets: Vec<ResourceKey> = self
      .subscribers
      .keys()
      .filter(|key| pattern.matches(key))
      .cloned()
      .collect();

    let mut started = 0;
    for key in targets {
      let errored = self.entries.get(&key).is_some_and(CacheEntry::is_errored);
      let fetched = if errored {
        self.retry(&key)
      } else {
        self.ensure(&key)
      };
      if fetched {
        started += 1;
      }
    }

    debug!(%pattern, refreshed = started, "invalidated");
    started
  }

  /// Sender for the invalidations of a background write.
  ///
  /// Held by the write task itself, so the plan is applied even when the
  /// handle that started the write is dropped first.
  pub(crate) fn write_sender(&self) -> mpsc::UnboundedSender<Vec<KeyPattern>> {
    self.write_tx.clone()
  }

  /// Invalidate everything posted by finished writes.
  ///
  /// Returns `true` if any write was applied.
  pub fn apply_writes(&mut self) -> bool {
    let mut applied = false;
    while let Ok(patterns) = self.write_rx.try_recv() {
      for pattern in &patterns {
        self.invalidate(pattern);
      }
      debug!(patterns = patterns.len(), "write applied");
      applied = true;
    }
    applied
  }

  // ==========================================================================
  // Driving
  // ==========================================================================

  /// Apply queued releases, completions and write invalidations, then evict
  /// expired entries.
  ///
  /// Returns `true` if any entry changed. Call this in the event loop tick.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;

    self.drain_releases();
    while let Ok(completion) = self.completion_rx.try_recv() {
      self.apply(completion);
      changed = true;
    }
    changed |= self.apply_writes();

    changed | (self.collect_garbage() > 0)
  }

  /// Wait until no fetch is in flight, applying completions as they arrive.
  pub async fn until_idle(&mut self) {
    self.drain_releases();
    self.apply_writes();
    while !self.in_flight.is_empty() {
      match self.completion_rx.recv().await {
        Some(completion) => self.apply(completion),
        None => break,
      }
    }
  }

  /// Evict unsubscribed entries whose grace period has elapsed.
  ///
  /// Stale entries expire like any other; only an entry mid-fetch is kept.
  pub fn collect_garbage(&mut self) -> usize {
    let Some(gc_time) = self.config.gc_time else {
      return 0;
    };

    let now = Instant::now();
    let expired: Vec<ResourceKey> = self
      .unused_since
      .iter()
      .filter(|(_, since)| now.duration_since(**since) >= gc_time)
      .map(|(key, _)| key.clone())
      .collect();

    let mut evicted = 0;
    for key in expired {
      if self.subscribers.contains_key(&key) || self.in_flight.contains_key(&key) {
        continue;
      }
      let loading = self
        .entries
        .get(&key)
        .is_some_and(|entry| entry.status() == Status::Loading);
      if !loading && self.evict(&key) {
        evicted += 1;
      }
    }
    evicted
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use tokio::sync::Semaphore;

  type Client = QueryClient<u32, String>;

  fn client() -> Client {
    QueryClient::new(QueryConfig::default())
  }

  fn key(id: &str) -> ResourceKey {
    ResourceKey::new("network").with(id)
  }

  /// Loader returning `value`, counting invocations.
  fn counting(calls: &Arc<AtomicUsize>, value: u32) -> Loader<u32, String> {
    let calls = calls.clone();
    loader(move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async move { Ok(value) }
    })
  }

  /// Loader that blocks until the gate has permits.
  fn gated(calls: &Arc<AtomicUsize>, gate: &Arc<Semaphore>, value: u32) -> Loader<u32, String> {
    let calls = calls.clone();
    let gate = gate.clone();
    loader(move || {
      calls.fetch_add(1, Ordering::SeqCst);
      let gate = gate.clone();
      async move {
        let _permit = gate.acquire().await.map_err(|e| e.to_string())?;
        Ok(value)
      }
    })
  }

  /// Loader whose n-th call returns `results[n]` (the last one repeats).
  fn scripted(calls: &Arc<AtomicUsize>, results: Vec<Result<u32, String>>) -> Loader<u32, String> {
    let calls = calls.clone();
    loader(move || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      let result = results[n.min(results.len() - 1)].clone();
      async move { result }
    })
  }

  fn recorder() -> (Arc<Mutex<Vec<Status>>>, impl FnMut(&ResourceKey, &CacheEntry<u32, String>) + Send) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |_: &ResourceKey, entry: &CacheEntry<u32, String>| {
      sink.lock().unwrap().push(entry.status());
    })
  }

  #[tokio::test]
  async fn test_never_subscribed_key_is_absent() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let _sub = client.subscribe(key("N1"), counting(&calls, 1), |_, _| {});
    client.until_idle().await;

    assert!(client.get(&key("N2")).is_none());
    assert!(client.get(&ResourceKey::new("vm").with("N1")).is_none());
  }

  #[tokio::test]
  async fn test_subscribe_fetches_once_and_coalesces() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let first = client.subscribe(key("N1"), gated(&calls, &gate, 42), |_, _| {});
    assert_eq!(client.get(&key("N1")).map(|e| e.status()), Some(Status::Loading));

    let second = client.subscribe(key("N1"), gated(&calls, &gate, 42), |_, _| {});
    assert!(!client.ensure(&key("N1")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.subscriber_count(&key("N1")), 2);

    gate.add_permits(1);
    client.until_idle().await;

    let entry = client.get(&key("N1")).unwrap();
    assert_eq!(entry.status(), Status::Fresh);
    assert_eq!(entry.data(), Some(&42));
    assert!(entry.fetched_at().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    client.unsubscribe(first);
    client.unsubscribe(second);
  }

  #[tokio::test]
  async fn test_invalidate_marks_stale_then_refreshes_once() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let (seen, on_update) = recorder();

    let _sub = client.subscribe(key("N1"), counting(&calls, 7), on_update);
    client.until_idle().await;

    let started = client.invalidate(&KeyPattern::Exact(key("N1")));
    assert_eq!(started, 1);
    client.until_idle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
      *seen.lock().unwrap(),
      vec![
        Status::Loading,
        Status::Fresh,
        Status::Stale,
        Status::Loading,
        Status::Fresh
      ]
    );
  }

  #[tokio::test]
  async fn test_invalidate_without_subscribers_does_not_fetch() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = client.subscribe(key("N1"), counting(&calls, 7), |_, _| {});
    client.until_idle().await;
    client.unsubscribe(sub);

    let started = client.invalidate(&KeyPattern::Exact(key("N1")));
    assert_eq!(started, 0);
    assert_eq!(client.get(&key("N1")).map(|e| e.status()), Some(Status::Stale));
    assert_eq!(client.get(&key("N1")).and_then(|e| e.data()), Some(&7));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_failed_loader_keeps_prior_data() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = scripted(&calls, vec![Ok(1), Err("backend down".to_string())]);

    let _sub = client.subscribe(key("N1"), loader, |_, _| {});
    client.until_idle().await;
    client.invalidate(&KeyPattern::Exact(key("N1")));
    client.until_idle().await;

    let entry = client.get(&key("N1")).unwrap();
    assert_eq!(entry.status(), Status::Errored);
    assert_eq!(entry.error().map(String::as_str), Some("backend down"));
    assert_eq!(entry.retained_data(), Some(&1));
  }

  #[tokio::test]
  async fn test_errored_entry_stays_visible_until_retry() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = scripted(&calls, vec![Err("nope".to_string()), Ok(5)]);

    let _sub = client.subscribe(key("N1"), loader, |_, _| {});
    client.until_idle().await;

    // A second subscriber does not clear the error by itself
    let _other = client.subscribe(key("N1"), scripted(&calls, vec![Ok(5)]), |_, _| {});
    assert!(client.get(&key("N1")).unwrap().is_errored());

    // Marking stale leaves the error in place, the refresh retries it
    assert!(client.mark_stale(&KeyPattern::tag("network")).is_empty());
    assert_eq!(client.invalidate(&KeyPattern::tag("network")), 1);
    client.until_idle().await;

    let entry = client.get(&key("N1")).unwrap();
    assert_eq!(entry.status(), Status::Fresh);
    assert_eq!(entry.data(), Some(&5));
    assert!(entry.retained_error().is_none());
  }

  #[tokio::test]
  async fn test_retry_after_error() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = scripted(&calls, vec![Err("nope".to_string()), Ok(9)]);

    let _sub = client.subscribe(key("N1"), loader, |_, _| {});
    client.until_idle().await;
    assert!(client.get(&key("N1")).unwrap().is_errored());

    assert!(client.retry(&key("N1")));
    assert!(client.get(&key("N1")).unwrap().is_loading());
    client.until_idle().await;
    assert_eq!(client.get(&key("N1")).and_then(|e| e.data()), Some(&9));
  }

  #[tokio::test]
  async fn test_grace_period_keeps_entry_for_resubscribe() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = client.subscribe(key("N1"), counting(&calls, 3), |_, _| {});
    client.until_idle().await;
    client.unsubscribe(sub);
    client.poll();

    assert!(client.get(&key("N1")).is_some());

    let _again = client.subscribe(key("N1"), counting(&calls, 3), |_, _| {});
    assert_eq!(client.get(&key("N1")).map(|e| e.status()), Some(Status::Fresh));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_evicts_after_grace_period() {
    let mut client: Client = QueryClient::new(QueryConfig {
      stale_time: None,
      gc_time: Some(Duration::ZERO),
    });
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = client.subscribe(key("N1"), counting(&calls, 3), |_, _| {});
    client.until_idle().await;
    drop(sub);
    client.poll();

    assert!(client.get(&key("N1")).is_none());
    assert_eq!(client.subscriber_count(&key("N1")), 0);
  }

  #[tokio::test]
  async fn test_unwatched_stale_entries_expire() {
    let mut client: Client = QueryClient::new(QueryConfig {
      stale_time: None,
      gc_time: Some(Duration::ZERO),
    });
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = client.subscribe(key("N1"), counting(&calls, 3), |_, _| {});
    client.until_idle().await;
    client.unsubscribe(sub);
    assert_eq!(client.invalidate(&KeyPattern::Exact(key("N1"))), 0);
    assert_eq!(client.get(&key("N1")).map(|e| e.status()), Some(Status::Stale));

    client.poll();
    assert!(client.get(&key("N1")).is_none());
    assert_eq!(client.collect_garbage(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_entries_mid_fetch_are_not_evicted() {
    let mut client: Client = QueryClient::new(QueryConfig {
      stale_time: None,
      gc_time: Some(Duration::ZERO),
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let sub = client.subscribe(key("N1"), gated(&calls, &gate, 3), |_, _| {});
    client.unsubscribe(sub);
    client.poll();
    assert_eq!(client.get(&key("N1")).map(|e| e.status()), Some(Status::Loading));

    gate.add_permits(1);
    client.until_idle().await;
    assert_eq!(client.get(&key("N1")).map(|e| e.status()), Some(Status::Fresh));
  }

  #[tokio::test]
  async fn test_invalidate_skips_handles_dropped_since_last_poll() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = client.subscribe(key("N1"), counting(&calls, 3), |_, _| {});
    client.until_idle().await;
    drop(sub);

    assert_eq!(client.invalidate(&KeyPattern::Exact(key("N1"))), 0);
    assert!(!client.is_fetching(&key("N1")));
    assert_eq!(client.subscriber_count(&key("N1")), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_dropping_handle_releases_subscription() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = client.subscribe(key("N1"), counting(&calls, 3), |_, _| {});
    assert_eq!(client.subscriber_count(&key("N1")), 1);
    drop(sub);
    client.poll();
    assert_eq!(client.subscriber_count(&key("N1")), 0);
  }

  #[tokio::test]
  async fn test_unsubscribe_does_not_cancel_fetch() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let sub = client.subscribe(key("N1"), gated(&calls, &gate, 11), |_, _| {});
    client.unsubscribe(sub);
    gate.add_permits(1);
    client.until_idle().await;

    assert_eq!(client.get(&key("N1")).and_then(|e| e.data()), Some(&11));
  }

  #[tokio::test]
  async fn test_invalidation_during_fetch_refreshes_after_completion() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let _sub = client.subscribe(key("N1"), gated(&calls, &gate, 1), |_, _| {});
    assert_eq!(client.invalidate(&KeyPattern::Exact(key("N1"))), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    gate.add_permits(2);
    client.until_idle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.get(&key("N1")).map(|e| e.status()), Some(Status::Fresh));
  }

  #[tokio::test]
  async fn test_prefix_invalidation_reaches_subscribed_dependents() {
    let mut client = client();
    let network_calls = Arc::new(AtomicUsize::new(0));
    let ip_calls = Arc::new(AtomicUsize::new(0));
    let other_calls = Arc::new(AtomicUsize::new(0));

    let ips = key("N1").with("ip-addresses");
    let _a = client.subscribe(key("N1"), counting(&network_calls, 1), |_, _| {});
    let _b = client.subscribe(ips.clone(), counting(&ip_calls, 2), |_, _| {});
    let _c = client.subscribe(key("N2"), counting(&other_calls, 3), |_, _| {});
    client.until_idle().await;

    assert_eq!(client.invalidate(&KeyPattern::Prefix(key("N1"))), 2);
    client.until_idle().await;

    assert_eq!(network_calls.load(Ordering::SeqCst), 2);
    assert_eq!(ip_calls.load(Ordering::SeqCst), 2);
    assert_eq!(other_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_applies_last_completion() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let slow_then_fast = loader(move || {
      let n = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        let (delay, value) = if n == 0 { (60, 1) } else { (5, 2) };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok::<_, String>(value)
      }
    });

    let _sub = client.subscribe(key("N1"), slow_then_fast, |_, _| {});
    assert!(client.refetch(&key("N1")));
    client.until_idle().await;

    // The first call resolves last, so its value wins
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.get(&key("N1")).and_then(|e| e.data()), Some(&1));
  }

  #[tokio::test]
  async fn test_stale_time_expires_fresh_entries() {
    let mut client: Client = QueryClient::new(QueryConfig {
      stale_time: Some(chrono::Duration::milliseconds(-1)),
      gc_time: None,
    });
    let calls = Arc::new(AtomicUsize::new(0));

    let _sub = client.subscribe(key("N1"), counting(&calls, 1), |_, _| {});
    client.until_idle().await;
    assert!(client.ensure(&key("N1")));
    client.until_idle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_ensure_without_loader_is_noop() {
    let mut client = client();
    assert!(!client.ensure(&key("N1")));
    assert!(client.get(&key("N1")).is_none());
  }

  #[tokio::test]
  async fn test_explicit_evict() {
    let mut client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    client.register(key("N1"), counting(&calls, 4));
    assert!(client.ensure(&key("N1")));
    client.until_idle().await;

    assert!(client.evict(&key("N1")));
    assert!(client.get(&key("N1")).is_none());
    assert!(!client.evict(&key("N1")));
  }
}

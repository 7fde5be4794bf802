//! Writes against the backend and the invalidations they trigger.

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::client::QueryClient;
use super::key::KeyPattern;

/// Run a write and, only if it succeeds, invalidate `invalidates`.
///
/// On failure the error is returned and no cache entry is touched.
pub async fn execute<V, CE, T, E, Fut>(
  client: &mut QueryClient<V, CE>,
  action: Fut,
  invalidates: &[KeyPattern],
) -> Result<T, E>
where
  V: Send + 'static,
  CE: fmt::Display + Send + 'static,
  E: fmt::Display,
  Fut: Future<Output = Result<T, E>>,
{
  match action.await {
    Ok(output) => {
      for pattern in invalidates {
        client.invalidate(pattern);
      }
      Ok(output)
    }
    Err(error) => {
      warn!(%error, "mutation failed");
      Err(error)
    }
  }
}

/// A write running in the background, polled from the event loop.
///
/// Mirrors how queries are driven: `start` spawns the write, `poll` picks up
/// the outcome on a later tick. The invalidations travel with the task to the
/// client, so they apply on success even if this handle is dropped first.
pub struct Mutation<T, E> {
  receiver: Option<mpsc::UnboundedReceiver<Result<T, E>>>,
}

impl<T, E> Default for Mutation<T, E> {
  fn default() -> Self {
    Self { receiver: None }
  }
}

impl<T, E> Mutation<T, E>
where
  T: Send + 'static,
  E: fmt::Display + Send + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Whether a write is in flight.
  pub fn is_pending(&self) -> bool {
    self.receiver.is_some()
  }

  /// Spawn the write. Ignored while another write is pending.
  ///
  /// Returns `true` if the write was started.
  pub fn start<V, CE, Fut>(
    &mut self,
    client: &QueryClient<V, CE>,
    action: Fut,
    invalidates: Vec<KeyPattern>,
  ) -> bool
  where
    V: Send + 'static,
    CE: fmt::Display + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    if self.is_pending() {
      return false;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    let writes = client.write_sender();

    tokio::spawn(async move {
      let result = action.await;
      // Invalidations go out before the result so `poll` sees them queued
      if result.is_ok() && !invalidates.is_empty() {
        let _ = writes.send(invalidates);
      }
      // Ignore send errors - the owner may have gone away
      let _ = tx.send(result);
    });
    true
  }

  /// Collect the outcome if the write finished.
  ///
  /// Returns the result exactly once; on success the write's invalidations
  /// are applied first.
  pub fn poll<V, CE>(&mut self, client: &mut QueryClient<V, CE>) -> Option<Result<T, E>>
  where
    V: Send + 'static,
    CE: fmt::Display + Send + 'static,
  {
    let receiver = self.receiver.as_mut()?;

    match receiver.try_recv() {
      Ok(result) => {
        self.receiver = None;
        match &result {
          Ok(_) => {
            client.apply_writes();
            debug!("mutation applied");
          }
          Err(error) => warn!(%error, "mutation failed"),
        }
        Some(result)
      }
      Err(mpsc::error::TryRecvError::Empty) => None,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        warn!("mutation task ended without a result");
        self.receiver = None;
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::{loader, CacheEntry, QueryConfig, ResourceKey, Status, Subscription};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  fn ips(code: &str) -> ResourceKey {
    ResourceKey::new("network").with(code).with("ip-addresses")
  }

  fn network(code: &str) -> ResourceKey {
    ResourceKey::new("network").with(code)
  }

  struct Seeded {
    client: QueryClient<u32, String>,
    network_calls: Arc<AtomicUsize>,
    ip_calls: Arc<AtomicUsize>,
    _subs: Vec<Subscription>,
  }

  async fn seeded() -> Seeded {
    let mut client = QueryClient::new(QueryConfig::default());
    let network_calls = Arc::new(AtomicUsize::new(0));
    let ip_calls = Arc::new(AtomicUsize::new(0));

    let n = network_calls.clone();
    let network_sub = client.subscribe(
      network("N1"),
      loader(move || {
        n.fetch_add(1, Ordering::SeqCst);
        async { Ok(1) }
      }),
      |_: &ResourceKey, _: &CacheEntry<u32, String>| {},
    );

    let i = ip_calls.clone();
    let ip_sub = client.subscribe(
      ips("N1"),
      loader(move || {
        i.fetch_add(1, Ordering::SeqCst);
        async { Ok(10) }
      }),
      |_: &ResourceKey, _: &CacheEntry<u32, String>| {},
    );

    client.until_idle().await;
    Seeded {
      client,
      network_calls,
      ip_calls,
      _subs: vec![network_sub, ip_sub],
    }
  }

  #[tokio::test]
  async fn test_execute_invalidates_only_declared_keys() {
    let Seeded {
      mut client,
      network_calls,
      ip_calls,
      _subs,
      ..
    } = seeded().await;

    let result: Result<(), String> = execute(
      &mut client,
      async { Ok(()) },
      &[KeyPattern::Exact(ips("N1"))],
    )
    .await;
    assert!(result.is_ok());

    assert_eq!(client.get(&network("N1")).map(|e| e.status()), Some(Status::Fresh));
    assert_eq!(client.get(&ips("N1")).map(|e| e.status()), Some(Status::Loading));
    client.until_idle().await;

    assert_eq!(network_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ip_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_execute_failure_leaves_cache_untouched() {
    let Seeded {
      mut client,
      ip_calls,
      _subs,
      ..
    } = seeded().await;

    let result: Result<(), String> = execute(
      &mut client,
      async { Err("409 conflict".to_string()) },
      &[KeyPattern::Exact(ips("N1"))],
    )
    .await;

    assert_eq!(result, Err("409 conflict".to_string()));
    assert_eq!(client.get(&ips("N1")).map(|e| e.status()), Some(Status::Fresh));
    assert_eq!(ip_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_pollable_mutation() {
    let Seeded {
      mut client,
      ip_calls,
      _subs,
      ..
    } = seeded().await;
    let mut mutation: Mutation<u32, String> = Mutation::new();

    assert!(mutation.start(
      &client,
      async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(3)
      },
      vec![KeyPattern::Exact(ips("N1"))],
    ));
    assert!(mutation.is_pending());
    assert!(!mutation.start(&client, async { Ok(4) }, Vec::new()));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(mutation.poll(&mut client), Some(Ok(3)));
    assert!(!mutation.is_pending());
    assert_eq!(client.get(&ips("N1")).map(|e| e.status()), Some(Status::Loading));
    assert_eq!(mutation.poll(&mut client), None);

    client.until_idle().await;
    assert_eq!(ip_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_pollable_mutation_failure() {
    let Seeded {
      mut client,
      network_calls,
      ip_calls,
      _subs,
      ..
    } = seeded().await;
    let mut mutation: Mutation<(), String> = Mutation::new();

    mutation.start(
      &client,
      async { Err("500".to_string()) },
      vec![KeyPattern::Prefix(network("N1"))],
    );
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(mutation.poll(&mut client), Some(Err("500".to_string())));
    assert!(!client.poll());
    assert!(!client.is_fetching(&network("N1")));
    assert_eq!(network_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ip_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_write_invalidates_after_handle_is_dropped() {
    let Seeded {
      mut client,
      network_calls,
      ip_calls,
      _subs,
      ..
    } = seeded().await;
    let mut mutation: Mutation<(), String> = Mutation::new();

    mutation.start(
      &client,
      async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(())
      },
      vec![KeyPattern::Exact(ips("N1"))],
    );
    // The view that started the write goes away mid-flight
    drop(mutation);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(client.poll());
    assert_eq!(client.get(&ips("N1")).map(|e| e.status()), Some(Status::Loading));
    client.until_idle().await;

    assert_eq!(client.get(&ips("N1")).map(|e| e.status()), Some(Status::Fresh));
    assert_eq!(ip_calls.load(Ordering::SeqCst), 2);
    assert_eq!(network_calls.load(Ordering::SeqCst), 1);
  }
}

//! Resource cache for data fetching, inspired by TanStack Query.
//!
//! A single [`QueryClient`] is created per session. Views subscribe to
//! [`ResourceKey`]s with a loader; the client coalesces fetches per key,
//! keeps stale data servable while refreshing, and notifies subscribers when
//! an entry changes. Writes go through [`Mutation`] (or [`execute`]) and
//! declare which [`KeyPattern`]s to invalidate once the backend confirms.
//!
//! # Example
//!
//! ```ignore
//! let api = api_client.clone();
//! let key = ResourceKey::new("network").with("N1");
//! let sub = client.subscribe(
//!     key.clone(),
//!     loader(move || {
//!         let api = api.clone();
//!         async move { api.network("N1").await.map(Resource::Network) }
//!     }),
//!     |_, _| {},
//! );
//!
//! // In event loop tick
//! if client.poll() {
//!     // An entry changed, trigger re-render
//! }
//!
//! // In render
//! match client.get(&key).map(|e| e.status()) {
//!     Some(Status::Loading) => render_spinner(),
//!     Some(Status::Errored) => render_error(),
//!     _ => render_data(),
//! }
//! ```

mod client;
mod entry;
mod key;
mod mutation;
mod subscription;

pub use client::{loader, Loader, QueryClient, QueryConfig};
pub use entry::{CacheEntry, Status};
pub use key::{KeyPattern, ResourceKey};
pub use mutation::{execute, Mutation};
pub use subscription::{Subscription, SubscriptionId};

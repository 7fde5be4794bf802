//! Backend access: REST client, wire models, domain records and cache keys.

mod api_types;
pub mod client;
pub mod error;
pub mod keys;
pub mod resource;
pub mod types;

pub use client::ApiClient;
pub use error::ApiError;
pub use resource::{Cache, Entry, Query, Resource};

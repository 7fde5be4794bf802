//! Cached resource values and the queries that load them.

use crate::query::{loader, CacheEntry, Loader, QueryClient, ResourceKey};

use super::client::ApiClient;
use super::error::ApiError;
use super::keys;
use super::types::{FreeIp, IpAddress, Network, Page, Pagination, SshKey, Template, VirtualMachine};

/// Anything the console caches
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
  Networks(Page<Network>),
  Network(Network),
  IpAddresses(Vec<IpAddress>),
  FreeIp(FreeIp),
  Vms(Page<VirtualMachine>),
  Vm(VirtualMachine),
  Templates(Page<Template>),
  SshKeys(Vec<SshKey>),
}

/// The session cache
pub type Cache = QueryClient<Resource, ApiError>;

/// A cache entry as views see it
pub type Entry = CacheEntry<Resource, ApiError>;

impl Resource {
  pub fn as_networks(&self) -> Option<&Page<Network>> {
    match self {
      Resource::Networks(page) => Some(page),
      _ => None,
    }
  }

  pub fn as_network(&self) -> Option<&Network> {
    match self {
      Resource::Network(network) => Some(network),
      _ => None,
    }
  }

  pub fn as_ip_addresses(&self) -> Option<&[IpAddress]> {
    match self {
      Resource::IpAddresses(ips) => Some(ips),
      _ => None,
    }
  }

  pub fn as_free_ip(&self) -> Option<&FreeIp> {
    match self {
      Resource::FreeIp(free) => Some(free),
      _ => None,
    }
  }

  pub fn as_vms(&self) -> Option<&Page<VirtualMachine>> {
    match self {
      Resource::Vms(page) => Some(page),
      _ => None,
    }
  }

  pub fn as_vm(&self) -> Option<&VirtualMachine> {
    match self {
      Resource::Vm(vm) => Some(vm),
      _ => None,
    }
  }

  pub fn as_templates(&self) -> Option<&Page<Template>> {
    match self {
      Resource::Templates(page) => Some(page),
      _ => None,
    }
  }

  pub fn as_ssh_keys(&self) -> Option<&[SshKey]> {
    match self {
      Resource::SshKeys(list) => Some(list),
      _ => None,
    }
  }
}

/// A key paired with the loader that fills it
pub struct Query {
  pub key: ResourceKey,
  pub loader: Loader<Resource, ApiError>,
}

impl Query {
  pub fn network_list(api: &ApiClient, pagination: Pagination) -> Self {
    let api = api.clone();
    Self {
      key: keys::network_list(pagination),
      loader: loader(move || {
        let api = api.clone();
        async move { api.list_networks(pagination).await.map(Resource::Networks) }
      }),
    }
  }

  pub fn network(api: &ApiClient, code: &str) -> Self {
    let api = api.clone();
    let code = code.to_string();
    Self {
      key: keys::network(&code),
      loader: loader(move || {
        let api = api.clone();
        let code = code.clone();
        async move { api.network(&code).await.map(Resource::Network) }
      }),
    }
  }

  pub fn ip_addresses(api: &ApiClient, code: &str) -> Self {
    let api = api.clone();
    let code = code.to_string();
    Self {
      key: keys::ip_addresses(&code),
      loader: loader(move || {
        let api = api.clone();
        let code = code.clone();
        async move { api.ip_addresses(&code).await.map(Resource::IpAddresses) }
      }),
    }
  }

  pub fn free_ip(api: &ApiClient, code: &str) -> Self {
    let api = api.clone();
    let code = code.to_string();
    Self {
      key: keys::free_ip(&code),
      loader: loader(move || {
        let api = api.clone();
        let code = code.clone();
        async move { api.free_ip(&code).await.map(Resource::FreeIp) }
      }),
    }
  }

  pub fn vm_list(api: &ApiClient, pagination: Pagination) -> Self {
    let api = api.clone();
    Self {
      key: keys::vm_list(pagination),
      loader: loader(move || {
        let api = api.clone();
        async move { api.list_vms(pagination).await.map(Resource::Vms) }
      }),
    }
  }

  pub fn vm(api: &ApiClient, name: &str) -> Self {
    let api = api.clone();
    let name = name.to_string();
    Self {
      key: keys::vm(&name),
      loader: loader(move || {
        let api = api.clone();
        let name = name.clone();
        async move { api.vm(&name).await.map(Resource::Vm) }
      }),
    }
  }

  pub fn template_list(api: &ApiClient, pagination: Pagination) -> Self {
    let api = api.clone();
    Self {
      key: keys::template_list(pagination),
      loader: loader(move || {
        let api = api.clone();
        async move { api.templates(pagination).await.map(Resource::Templates) }
      }),
    }
  }

  pub fn ssh_keys(api: &ApiClient) -> Self {
    let api = api.clone();
    Self {
      key: keys::ssh_keys(),
      loader: loader(move || {
        let api = api.clone();
        async move { api.ssh_keys().await.map(Resource::SshKeys) }
      }),
    }
  }
}

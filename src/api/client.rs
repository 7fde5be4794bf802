use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::api_types::{
  CreateIpAddressRequest, CreateNetworkRequest, DeleteIpAddressRequest, FreeIpResponse,
  GenerateSshKeyRequest, IpAddressListResponse, NetworkListResponse, NetworkWebModel,
  SshKeyResponse, TemplateListResponse, UpdateVirtualMachineRequest, VirtualMachineListResponse,
  VirtualMachineResponse,
};
use super::error::{ApiError, Result};
use super::types::{
  sort_by_address, FreeIp, IpAddress, IpAddressDraft, Network, NetworkDraft, Page, Pagination,
  SshKey, SshKeyDraft, Template, VirtualMachine, VmDraft,
};

const NETWORKS: &[&str] = &["api", "v1", "ipam", "networks"];
const IP_ADDRESSES: &[&str] = &["api", "v1", "ipam", "ip-addresses"];
const VIRTUAL_MACHINES: &[&str] = &["api", "v1", "virtual-machines"];
const TEMPLATES: &[&str] = &["api", "v1", "templates"];
const SSH_KEYS: &[&str] = &["api", "v1", "settings", "ssh-keys"];

/// REST client for the IPAM backend
#[derive(Clone)]
pub struct ApiClient {
  http: Client,
  base: Url,
}

impl ApiClient {
  /// Create a client for `base_url`, sending `token` as a bearer token when set.
  pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static("netcon"));
    if let Some(token) = token.filter(|t| !t.is_empty()) {
      let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| ApiError::Transport(format!("invalid token: {}", e)))?;
      headers.insert(AUTHORIZATION, value);
    }

    let http = Client::builder()
      .default_headers(headers)
      .timeout(timeout)
      .build()?;

    Ok(Self {
      http,
      base: normalize_base(base_url)?,
    })
  }

  /// Host shown in the header
  pub fn host(&self) -> &str {
    self.base.host_str().unwrap_or("")
  }

  /// Build a URL from the base plus path segments. Each segment is
  /// percent-encoded, so network codes with spaces or slashes stay intact.
  pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::Url(format!("{} cannot be a base URL", self.base)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn paged(&self, segments: &[&str], pagination: Pagination) -> Result<Url> {
    let mut url = self.endpoint(segments)?;
    url
      .query_pairs_mut()
      .append_pair("offset", &pagination.offset.to_string())
      .append_pair("limit", &pagination.limit.to_string());
    Ok(url)
  }

  // ==========================================================================
  // Request helpers
  // ==========================================================================

  async fn send<B: Serialize + ?Sized>(
    &self,
    method: Method,
    url: Url,
    body: Option<&B>,
  ) -> Result<Response> {
    debug!(%method, %url, "request");
    let mut request = self.http.request(method, url.clone());
    if let Some(body) = body {
      request = request.json(body);
    }
    let response = request.send().await?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(ApiError::from_response(status, url.path(), &text))
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    let response = self.send::<()>(Method::GET, url, None).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  /// Send a write and discard the response body.
  async fn write<B: Serialize + ?Sized>(
    &self,
    method: Method,
    url: Url,
    body: Option<&B>,
  ) -> Result<()> {
    self.send(method, url, body).await?;
    Ok(())
  }

  // ==========================================================================
  // Networks
  // ==========================================================================

  pub async fn list_networks(&self, pagination: Pagination) -> Result<Page<Network>> {
    let url = self.paged(NETWORKS, pagination)?;
    let response: NetworkListResponse = self.get_json(url).await?;
    Ok(response.into_page()?)
  }

  pub async fn network(&self, code: &str) -> Result<Network> {
    let url = self.endpoint(&join(NETWORKS, &[code]))?;
    let model: NetworkWebModel = self.get_json(url).await?;
    Ok(model.into())
  }

  pub async fn create_network(&self, draft: &NetworkDraft) -> Result<()> {
    let url = self.endpoint(NETWORKS)?;
    self
      .write(Method::POST, url, Some(&CreateNetworkRequest::from(draft)))
      .await
  }

  pub async fn update_network(&self, code: &str, draft: &NetworkDraft) -> Result<()> {
    let url = self.endpoint(&join(NETWORKS, &[code]))?;
    self
      .write(Method::PUT, url, Some(&CreateNetworkRequest::from(draft)))
      .await
  }

  pub async fn delete_network(&self, code: &str) -> Result<()> {
    let url = self.endpoint(&join(NETWORKS, &[code]))?;
    self.write::<()>(Method::DELETE, url, None).await
  }

  // ==========================================================================
  // IP addresses
  // ==========================================================================

  /// Addresses of a network, sorted numerically.
  pub async fn ip_addresses(&self, code: &str) -> Result<Vec<IpAddress>> {
    let url = self.endpoint(&join(NETWORKS, &[code, "ip-addresses"]))?;
    let response: IpAddressListResponse = self.get_json(url).await?;
    let mut ips = response.into_addresses()?;
    sort_by_address(&mut ips);
    Ok(ips)
  }

  pub async fn create_ip_address(&self, code: &str, draft: &IpAddressDraft) -> Result<()> {
    let url = self.endpoint(&join(NETWORKS, &[code, "ip-addresses"]))?;
    self
      .write(Method::POST, url, Some(&CreateIpAddressRequest::from(draft)))
      .await
  }

  pub async fn delete_ip_address(&self, code: &str, address: &str) -> Result<()> {
    let url = self.endpoint(IP_ADDRESSES)?;
    let body = DeleteIpAddressRequest {
      ip_address: address.to_string(),
      network: code.to_string(),
    };
    self.write(Method::DELETE, url, Some(&body)).await
  }

  pub async fn free_ip(&self, code: &str) -> Result<FreeIp> {
    let url = self.endpoint(&join(NETWORKS, &[code, "free-ip"]))?;
    let response: FreeIpResponse = self.get_json(url).await?;
    Ok(response.into())
  }

  // ==========================================================================
  // Virtual machines
  // ==========================================================================

  pub async fn list_vms(&self, pagination: Pagination) -> Result<Page<VirtualMachine>> {
    let url = self.paged(VIRTUAL_MACHINES, pagination)?;
    let response: VirtualMachineListResponse = self.get_json(url).await?;
    Ok(response.into_page()?)
  }

  pub async fn vm(&self, name: &str) -> Result<VirtualMachine> {
    let url = self.endpoint(&join(VIRTUAL_MACHINES, &[name]))?;
    let response: VirtualMachineResponse = self.get_json(url).await?;
    Ok(response.into())
  }

  pub async fn update_vm(&self, name: &str, draft: &VmDraft) -> Result<()> {
    let url = self.endpoint(&join(VIRTUAL_MACHINES, &[name]))?;
    self
      .write(Method::PUT, url, Some(&UpdateVirtualMachineRequest::from(draft)))
      .await
  }

  pub async fn start_vm(&self, name: &str) -> Result<()> {
    let url = self.endpoint(&join(VIRTUAL_MACHINES, &[name, "start"]))?;
    self.write::<()>(Method::POST, url, None).await
  }

  pub async fn stop_vm(&self, name: &str) -> Result<()> {
    let url = self.endpoint(&join(VIRTUAL_MACHINES, &[name, "stop"]))?;
    self.write::<()>(Method::POST, url, None).await
  }

  // ==========================================================================
  // Templates and SSH keys
  // ==========================================================================

  pub async fn templates(&self, pagination: Pagination) -> Result<Page<Template>> {
    let url = self.paged(TEMPLATES, pagination)?;
    let response: TemplateListResponse = self.get_json(url).await?;
    Ok(response.into_page()?)
  }

  pub async fn ssh_keys(&self) -> Result<Vec<SshKey>> {
    let url = self.endpoint(SSH_KEYS)?;
    let keys: Vec<SshKeyResponse> = self.get_json(url).await?;
    Ok(keys.into_iter().map(SshKey::from).collect())
  }

  pub async fn generate_ssh_key(&self, draft: &SshKeyDraft) -> Result<()> {
    let url = self.endpoint(SSH_KEYS)?;
    self
      .write(Method::POST, url, Some(&GenerateSshKeyRequest::from(draft)))
      .await
  }
}

fn join<'a>(base: &[&'a str], rest: &[&'a str]) -> Vec<&'a str> {
  base.iter().chain(rest).copied().collect()
}

/// Parse the configured base URL, making sure its path ends with `/` so
/// endpoint segments append instead of replacing the last path component.
fn normalize_base(base_url: &str) -> Result<Url> {
  let trimmed = base_url.trim();
  let with_slash = if trimmed.ends_with('/') {
    trimmed.to_string()
  } else {
    format!("{}/", trimmed)
  };
  let url = Url::parse(&with_slash)?;
  if url.cannot_be_a_base() {
    return Err(ApiError::Url(format!("{} cannot be a base URL", base_url)));
  }
  Ok(url)
}

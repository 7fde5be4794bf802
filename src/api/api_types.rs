//! Serde types matching the backend's request and response bodies.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs. Read models use
//! the backend's PascalCase field names; request bodies use camelCase.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::types::{
  FreeIp, IpAddress, IpAddressDraft, Network, NetworkDraft, Page, PowerState, SshKey, SshKeyDraft,
  Template, VirtualMachine, VmDraft,
};

/// Accept an identifier sent either as a JSON string or a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(deserializer)? {
    Value::String(s) => s,
    Value::Number(n) => n.to_string(),
    Value::Null => String::new(),
    other => other.to_string(),
  })
}

/// Decode `value` as a list of `T`, treating any other shape as empty.
fn list_or_empty<T: for<'de> Deserialize<'de>>(value: Value) -> serde_json::Result<Vec<T>> {
  match value {
    Value::Array(_) => serde_json::from_value(value),
    _ => Ok(Vec::new()),
  }
}

// ============================================================================
// Networks
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NetworkWebModel {
  #[serde(rename = "ID", deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(rename = "Name")]
  pub name: String,
  #[serde(rename = "VlanID")]
  pub vlan_id: Option<i64>,
  #[serde(rename = "SubnetMask")]
  pub subnet_mask: Option<u8>,
  #[serde(rename = "Gateway")]
  pub gateway: String,
  #[serde(rename = "Address")]
  pub address: String,
  #[serde(rename = "DHCPEnabled")]
  pub dhcp_enabled: bool,
  #[serde(rename = "DHCPStart")]
  pub dhcp_start: String,
  #[serde(rename = "DHCPEnd")]
  pub dhcp_end: String,
  #[serde(rename = "PortGroupID", deserialize_with = "string_or_number")]
  pub port_group_id: String,
  #[serde(rename = "Domain")]
  pub domain: String,
  #[serde(rename = "DNSServers")]
  pub dns_servers: Vec<String>,
}

/// `GET /networks` response: `{ data: [...], total }`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NetworkListResponse {
  pub data: Value,
  pub total: u64,
}

impl From<NetworkWebModel> for Network {
  fn from(model: NetworkWebModel) -> Self {
    Network {
      id: model.id,
      name: model.name,
      vlan_id: model.vlan_id,
      subnet_mask: model.subnet_mask,
      gateway: model.gateway,
      address: model.address,
      dhcp_enabled: model.dhcp_enabled,
      dhcp_start: model.dhcp_start,
      dhcp_end: model.dhcp_end,
      port_group_id: model.port_group_id,
      domain: model.domain,
      dns_servers: model.dns_servers,
    }
  }
}

impl NetworkListResponse {
  /// An unexpected `data` shape yields an empty page.
  pub fn into_page(self) -> serde_json::Result<Page<Network>> {
    if !self.data.is_array() {
      return Ok(Page::empty());
    }
    let models: Vec<NetworkWebModel> = list_or_empty(self.data)?;
    Ok(Page {
      items: models.into_iter().map(Network::from).collect(),
      total: self.total,
    })
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNetworkRequest {
  pub name: String,
  pub vlan_id: Option<i64>,
  pub subnet_mask: Option<i64>,
  pub gateway: String,
  pub address: String,
  pub dhcp_enabled: bool,
  pub dhcp_start: String,
  pub dhcp_end: String,
  pub port_group_id: String,
  pub domain: String,
  pub dns_servers: Vec<String>,
}

impl From<&NetworkDraft> for CreateNetworkRequest {
  fn from(draft: &NetworkDraft) -> Self {
    Self {
      name: draft.name.trim().to_string(),
      vlan_id: draft.vlan_id,
      subnet_mask: draft.subnet_mask,
      gateway: draft.gateway.trim().to_string(),
      address: draft.address.trim().to_string(),
      dhcp_enabled: draft.dhcp_enabled,
      dhcp_start: draft.dhcp_start.trim().to_string(),
      dhcp_end: draft.dhcp_end.trim().to_string(),
      port_group_id: draft.port_group_id.trim().to_string(),
      domain: draft.domain.trim().to_string(),
      dns_servers: draft.dns_server_list(),
    }
  }
}

// ============================================================================
// IP addresses
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IpAddressResponse {
  #[serde(rename = "ID", deserialize_with = "string_or_number")]
  pub id: String,
  pub ip_address: String,
  pub prefix_length: Option<u8>,
  #[serde(rename = "Hostname")]
  pub hostname: String,
  #[serde(rename = "Description")]
  pub description: String,
  #[serde(rename = "State")]
  pub state: String,
  #[serde(rename = "InterfaceID", deserialize_with = "string_or_number")]
  pub interface_id: String,
  #[serde(rename = "NetworkID", deserialize_with = "string_or_number")]
  pub network_id: String,
}

/// `GET /networks/{code}/ip-addresses` response: `{ Data: [...] }`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IpAddressListResponse {
  #[serde(rename = "Data")]
  pub data: Value,
}

impl From<IpAddressResponse> for IpAddress {
  fn from(item: IpAddressResponse) -> Self {
    IpAddress {
      id: item.id,
      address: item.ip_address,
      prefix_length: item.prefix_length,
      hostname: item.hostname,
      description: item.description,
      state: item.state,
      interface_id: item.interface_id,
      network_id: item.network_id,
    }
  }
}

impl IpAddressListResponse {
  pub fn into_addresses(self) -> serde_json::Result<Vec<IpAddress>> {
    let items: Vec<IpAddressResponse> = list_or_empty(self.data)?;
    Ok(items.into_iter().map(IpAddress::from).collect())
  }
}

#[derive(Debug, Serialize)]
pub struct CreateIpAddressRequest {
  pub ip_address: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub prefix_length: Option<i64>,
  pub hostname: String,
  pub description: String,
}

impl From<&IpAddressDraft> for CreateIpAddressRequest {
  fn from(draft: &IpAddressDraft) -> Self {
    Self {
      ip_address: draft.ip_address.trim().to_string(),
      prefix_length: draft.prefix_length,
      hostname: draft.hostname.trim().to_string(),
      description: draft.description.trim().to_string(),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct DeleteIpAddressRequest {
  pub ip_address: String,
  pub network: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FreeIpResponse {
  pub ip_address: String,
  pub prefix_length: Option<u8>,
}

impl From<FreeIpResponse> for FreeIp {
  fn from(resp: FreeIpResponse) -> Self {
    FreeIp {
      address: resp.ip_address,
      prefix: resp.prefix_length,
    }
  }
}

// ============================================================================
// Virtual machines
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VirtualMachineResponse {
  #[serde(rename = "ID", deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(rename = "Name")]
  pub name: String,
  #[serde(rename = "MemoryMB")]
  pub memory_mb: i64,
  #[serde(rename = "NumCpus")]
  pub num_cpus: i64,
  #[serde(rename = "PowerState")]
  pub power_state: String,
  #[serde(rename = "TemplateID", deserialize_with = "string_or_number")]
  pub template_id: String,
  #[serde(rename = "Network")]
  pub network: String,
  #[serde(rename = "IPAddress")]
  pub ip_address: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VirtualMachineListResponse {
  #[serde(rename = "VirtualMachines")]
  pub virtual_machines: Value,
  #[serde(rename = "Total")]
  pub total: u64,
}

impl From<VirtualMachineResponse> for VirtualMachine {
  fn from(vm: VirtualMachineResponse) -> Self {
    VirtualMachine {
      id: vm.id,
      name: vm.name,
      memory_mb: vm.memory_mb,
      num_cpus: vm.num_cpus,
      power_state: PowerState::parse(&vm.power_state),
      template_id: vm.template_id,
      network: vm.network,
      ip_address: vm.ip_address,
    }
  }
}

impl VirtualMachineListResponse {
  pub fn into_page(self) -> serde_json::Result<Page<VirtualMachine>> {
    let items: Vec<VirtualMachineResponse> = list_or_empty(self.virtual_machines)?;
    let items: Vec<VirtualMachine> = items.into_iter().map(VirtualMachine::from).collect();
    let total = self.total.max(items.len() as u64);
    Ok(Page { items, total })
  }
}

#[derive(Debug, Serialize)]
pub struct UpdateVirtualMachineRequest {
  #[serde(rename = "Name")]
  pub name: String,
  #[serde(rename = "MemoryMB")]
  pub memory_mb: i64,
  #[serde(rename = "NumCpus")]
  pub num_cpus: i64,
}

impl From<&VmDraft> for UpdateVirtualMachineRequest {
  fn from(draft: &VmDraft) -> Self {
    Self {
      name: draft.name.trim().to_string(),
      memory_mb: draft.memory_mb.unwrap_or_default(),
      num_cpus: draft.num_cpus.unwrap_or_default(),
    }
  }
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TemplateResponse {
  #[serde(rename = "ID", deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(rename = "Name")]
  pub name: String,
  #[serde(rename = "OsType")]
  pub os_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TemplateListResponse {
  #[serde(rename = "Templates")]
  pub templates: Value,
  #[serde(rename = "Total")]
  pub total: u64,
}

impl TemplateListResponse {
  pub fn into_page(self) -> serde_json::Result<Page<Template>> {
    let items: Vec<TemplateResponse> = list_or_empty(self.templates)?;
    let items: Vec<Template> = items
      .into_iter()
      .map(|t| Template {
        id: t.id,
        name: t.name,
        os_type: t.os_type,
      })
      .collect();
    let total = self.total.max(items.len() as u64);
    Ok(Page { items, total })
  }
}

// ============================================================================
// SSH keys
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SshKeyResponse {
  #[serde(rename = "ID", deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(rename = "Name")]
  pub name: String,
  #[serde(rename = "KeyType")]
  pub key_type: String,
  #[serde(rename = "PublicKey")]
  pub public_key: String,
}

impl From<SshKeyResponse> for SshKey {
  fn from(key: SshKeyResponse) -> Self {
    SshKey {
      id: key.id,
      name: key.name,
      key_type: key.key_type,
      public_key: key.public_key,
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSshKeyRequest {
  pub name: String,
  pub key_type: String,
}

impl From<&SshKeyDraft> for GenerateSshKeyRequest {
  fn from(draft: &SshKeyDraft) -> Self {
    Self {
      name: draft.name.trim().to_string(),
      key_type: draft.key_type.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_network_list_decodes() {
    let body = json!({
      "data": [{
        "ID": 7,
        "Name": "N1",
        "VlanID": 100,
        "SubnetMask": 24,
        "Gateway": "10.0.0.1",
        "Address": "10.0.0.0",
        "DHCPEnabled": true,
        "DNSServers": ["1.1.1.1"]
      }],
      "total": 1
    });
    let resp: NetworkListResponse = serde_json::from_value(body).unwrap();
    let page = resp.into_page().unwrap();

    assert_eq!(page.total, 1);
    let net = &page.items[0];
    assert_eq!(net.id, "7");
    assert_eq!(net.code(), "N1");
    assert_eq!(net.subnet_mask, Some(24));
    assert!(net.dhcp_enabled);
    assert_eq!(net.port_group_id, "");
    assert_eq!(net.dns_servers, vec!["1.1.1.1"]);
  }

  #[test]
  fn test_network_list_unexpected_shape_is_empty() {
    let resp: NetworkListResponse =
      serde_json::from_value(json!({"data": {"oops": true}, "total": 5})).unwrap();
    assert_eq!(resp.into_page().unwrap(), Page::empty());

    let resp: NetworkListResponse = serde_json::from_value(json!({})).unwrap();
    assert_eq!(resp.into_page().unwrap(), Page::empty());
  }

  #[test]
  fn test_ip_list_decodes() {
    let body = json!({
      "Data": [{
        "ID": "a1",
        "ip_address": "10.0.0.5",
        "prefix_length": 24,
        "Hostname": "web-1",
        "Description": "frontend",
        "State": "assigned",
        "InterfaceID": null,
        "NetworkID": 7
      }]
    });
    let resp: IpAddressListResponse = serde_json::from_value(body).unwrap();
    let ips = resp.into_addresses().unwrap();

    assert_eq!(ips.len(), 1);
    assert_eq!(ips[0].cidr(), "10.0.0.5/24");
    assert_eq!(ips[0].hostname, "web-1");
    assert_eq!(ips[0].interface_id, "");
    assert_eq!(ips[0].network_id, "7");
  }

  #[test]
  fn test_create_network_request_is_camel_case() {
    let draft = NetworkDraft {
      name: " N1 ".to_string(),
      subnet_mask: Some(24),
      gateway: "10.0.0.1".to_string(),
      address: "10.0.0.0".to_string(),
      dns_servers: "1.1.1.1, 8.8.8.8".to_string(),
      ..NetworkDraft::default()
    };
    let body = serde_json::to_value(CreateNetworkRequest::from(&draft)).unwrap();

    assert_eq!(body["name"], "N1");
    assert_eq!(body["subnetMask"], 24);
    assert_eq!(body["dhcpEnabled"], false);
    assert_eq!(body["dnsServers"], json!(["1.1.1.1", "8.8.8.8"]));
    assert!(body.get("vlanId").is_some());
  }

  /// What the backend echoes back after storing a create request.
  fn echo(req: &CreateNetworkRequest) -> NetworkWebModel {
    serde_json::from_value(json!({
      "ID": 1,
      "Name": req.name,
      "VlanID": req.vlan_id,
      "SubnetMask": req.subnet_mask,
      "Gateway": req.gateway,
      "Address": req.address,
      "DHCPEnabled": req.dhcp_enabled,
      "DHCPStart": req.dhcp_start,
      "DHCPEnd": req.dhcp_end,
      "PortGroupID": req.port_group_id,
      "Domain": req.domain,
      "DNSServers": req.dns_servers,
    }))
    .unwrap()
  }

  #[test]
  fn test_network_draft_survives_submit_and_reread() {
    let draft = NetworkDraft {
      name: "lab".to_string(),
      vlan_id: Some(42),
      subnet_mask: Some(26),
      gateway: "192.168.5.1".to_string(),
      address: "192.168.5.0".to_string(),
      dhcp_enabled: true,
      dhcp_start: "192.168.5.10".to_string(),
      dhcp_end: "192.168.5.50".to_string(),
      port_group_id: "pg-7".to_string(),
      domain: "lab.local".to_string(),
      dns_servers: "192.168.5.2, 192.168.5.3".to_string(),
    };

    let request = CreateNetworkRequest::from(&draft);
    let reread = Network::from(echo(&request));
    assert_eq!(NetworkDraft::from(&reread), draft);
  }

  #[test]
  fn test_vm_draft_survives_submit_and_reread() {
    let draft = VmDraft {
      name: "web-1".to_string(),
      memory_mb: Some(4096),
      num_cpus: Some(2),
    };
    let request = serde_json::to_value(UpdateVirtualMachineRequest::from(&draft)).unwrap();
    assert_eq!(request, json!({"Name": "web-1", "MemoryMB": 4096, "NumCpus": 2}));

    let reread: VirtualMachineResponse = serde_json::from_value(request).unwrap();
    assert_eq!(VmDraft::from(&VirtualMachine::from(reread)), draft);
  }

  #[test]
  fn test_template_list_decodes() {
    let body = json!({"Templates": [{"ID": 1, "Name": "ubuntu-22.04", "OsType": "linux"}]});
    let resp: TemplateListResponse = serde_json::from_value(body).unwrap();
    let page = resp.into_page().unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].name, "ubuntu-22.04");
    assert_eq!(page.items[0].os_type, "linux");
  }

  #[test]
  fn test_vm_power_state_mapping() {
    let body = json!({"ID": "vm-1", "Name": "db", "PowerState": "poweredOff"});
    let vm: VirtualMachine = serde_json::from_value::<VirtualMachineResponse>(body)
      .unwrap()
      .into();
    assert_eq!(vm.power_state, PowerState::Off);
  }
}

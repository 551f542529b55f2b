//! Wire types for the fabric control-plane API.

use serde::{Deserialize, Serialize};

/// An id/name reference pair, used wherever one entity points at another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdName {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

impl IdName {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A numeric field the control plane also accepts as the literal "auto".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoNumber {
    Auto,
    Value(i64),
}

impl AutoNumber {
    /// Zero means "let the control plane assign one".
    pub fn from_value(v: i64) -> Self {
        if v == 0 { AutoNumber::Auto } else { AutoNumber::Value(v) }
    }
}

impl Serialize for AutoNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AutoNumber::Auto => serializer.serialize_str("auto"),
            AutoNumber::Value(v) => serializer.serialize_i64(*v),
        }
    }
}

impl<'de> Deserialize<'de> for AutoNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(AutoNumber::Value)
                .ok_or_else(|| serde::de::Error::custom("expected an integer")),
            serde_json::Value::String(s) if s == "auto" => Ok(AutoNumber::Auto),
            other => Err(serde::de::Error::custom(format!(
                "expected a number or \"auto\", got {other}"
            ))),
        }
    }
}

/// An address field as the control plane reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRef {
    #[serde(default)]
    pub address: String,
}

// =============================================================================
// Reference kinds
// =============================================================================

/// A site known to the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteSite {
    pub id: i64,
    pub name: String,
}

/// A tenant known to the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteTenant {
    pub id: i64,
    pub name: String,
}

/// An inventory hardware profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteProfile {
    pub id: i64,
    pub name: String,
}

/// A switch port. Lookup identity is the composite `port@switch` form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePort {
    pub id: i64,
    pub port: String,
    #[serde(default)]
    pub switch_name: String,
}

impl RemotePort {
    /// Composite lookup name, e.g. "swp1@leaf01".
    pub fn link_name(&self) -> String {
        format!("{}@{}", self.port, self.switch_name)
    }
}

// =============================================================================
// Inventory servers
// =============================================================================

/// A server NIC ↔ switch port link on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortLink {
    pub local: IdName,
    pub remote: IdName,
}

/// Inventory server record as returned by List.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteServer {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tenant: IdName,
    #[serde(default)]
    pub site: IdName,
    #[serde(default)]
    pub profile: IdName,
    #[serde(default)]
    pub asn: i64,
    #[serde(default)]
    pub main_ip: AddressRef,
    #[serde(default)]
    pub mgmt_ip: AddressRef,
    #[serde(default)]
    pub port_count: i64,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub links: Vec<PortLink>,
    #[serde(default)]
    pub custom_data: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub role: String,
}

/// Payload for server Add and Update calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPayload {
    pub name: String,
    pub description: String,
    pub tenant: IdName,
    pub site: IdName,
    pub profile: IdName,
    pub asn: AutoNumber,
    pub main_address: String,
    pub mgmt_address: String,
    pub port_count: i64,
    pub uuid: String,
    pub links: Vec<PortLink>,
    pub custom_data: String,
    pub tags: Vec<String>,
    pub role: String,
}

// =============================================================================
// Server clusters
// =============================================================================

/// Server cluster record as returned by List.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCluster {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub admin: IdName,
    #[serde(default)]
    pub site: IdName,
    #[serde(default)]
    pub vpc: IdName,
    #[serde(default)]
    pub template: IdName,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub servers: Vec<IdName>,
}

/// Payload for cluster Add calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPayload {
    pub name: String,
    pub admin: IdName,
    pub site: IdName,
    pub vpc: IdName,
    pub template: IdName,
    pub tags: Vec<String>,
    pub servers: Vec<IdName>,
}

/// Payload for cluster Update calls. The update surface is only the member
/// list and tags; placement fields are create-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterUpdate {
    pub tags: Vec<String>,
    pub servers: Vec<IdName>,
}

// =============================================================================
// Cluster templates
// =============================================================================

/// VNet type within a cluster template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VnetKind {
    L2vpn,
    L3vpn,
}

/// Gateway assignment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayAssign {
    Auto,
    Manual,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// IPv4/IPv6 gateway configuration for a VNet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_type: Option<GatewayAssign>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub allocation: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub child_subnet_prefix_length: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub hostnum: i64,
}

/// One VNet blueprint within a cluster template. The postfix is appended
/// to the cluster name to form the VNet name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnetProfile {
    pub postfix: String,
    #[serde(rename = "type")]
    pub kind: VnetKind,
    pub server_nics: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vlan: String,
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "vlanID")]
    pub vlan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_gateway: Option<GatewayProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_gateway: Option<GatewayProfile>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ipv4_dhcp_enabled: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ipv6_dhcp_enabled: bool,
}

/// Cluster template record as returned by List.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteTemplate {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub vnets: Vec<VnetProfile>,
}

/// Payload for template Add and Update calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatePayload {
    pub name: String,
    pub vnets: Vec<VnetProfile>,
}

// =============================================================================
// VPCs
// =============================================================================

/// VPC record as returned by List.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVpc {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub admin_tenant: IdName,
    #[serde(default)]
    pub guest_tenants: Vec<IdName>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Payload for VPC Add and Update calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcPayload {
    pub name: String,
    pub admin_tenant: IdName,
    pub guest_tenants: Vec<IdName>,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_number_serializes_auto_for_zero() {
        assert_eq!(
            serde_json::to_string(&AutoNumber::from_value(0)).unwrap(),
            "\"auto\""
        );
        assert_eq!(
            serde_json::to_string(&AutoNumber::from_value(65001)).unwrap(),
            "65001"
        );
    }

    #[test]
    fn auto_number_roundtrips() {
        let auto: AutoNumber = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(auto, AutoNumber::Auto);
        let value: AutoNumber = serde_json::from_str("42").unwrap();
        assert_eq!(value, AutoNumber::Value(42));
        assert!(serde_json::from_str::<AutoNumber>("\"manual\"").is_err());
    }

    #[test]
    fn vnet_profile_skips_unset_fields() {
        let vnet = VnetProfile {
            postfix: "frontend".into(),
            kind: VnetKind::L2vpn,
            server_nics: vec!["eth1".into()],
            vlan: String::new(),
            vlan_id: String::new(),
            ipv4_gateway: None,
            ipv6_gateway: None,
            ipv4_dhcp_enabled: false,
            ipv6_dhcp_enabled: false,
        };
        let json = serde_json::to_value(&vnet).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "postfix": "frontend",
                "type": "l2vpn",
                "serverNics": ["eth1"],
            })
        );
    }

    #[test]
    fn vnet_gateway_serializes_set_fields() {
        let vnet = VnetProfile {
            postfix: "storage".into(),
            kind: VnetKind::L3vpn,
            server_nics: vec!["eth2".into()],
            vlan: "tagged".into(),
            vlan_id: "auto".into(),
            ipv4_gateway: Some(GatewayProfile {
                assign_type: Some(GatewayAssign::Auto),
                allocation: "10.188.0.0/16".into(),
                child_subnet_prefix_length: 24,
                hostnum: 1,
            }),
            ipv6_gateway: None,
            ipv4_dhcp_enabled: true,
            ipv6_dhcp_enabled: false,
        };
        let json = serde_json::to_value(&vnet).unwrap();
        assert_eq!(json["vlanID"], "auto");
        assert_eq!(json["ipv4Gateway"]["assignType"], "auto");
        assert_eq!(json["ipv4Gateway"]["childSubnetPrefixLength"], 24);
        assert_eq!(json["ipv4DhcpEnabled"], true);
        assert!(json.get("ipv6Gateway").is_none());
        assert!(json.get("ipv6DhcpEnabled").is_none());
    }

    #[test]
    fn remote_server_tolerates_sparse_listings() {
        let server: RemoteServer = serde_json::from_str(
            r#"{"id": 12, "name": "web-1", "site": {"id": 3, "name": "nyc1"}}"#,
        )
        .unwrap();
        assert_eq!(server.site.id, 3);
        assert!(server.main_ip.address.is_empty());
        assert!(server.links.is_empty());
    }
}

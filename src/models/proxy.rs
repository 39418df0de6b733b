//! Proxy model definitions
//!
//! Contains the canonical, format-independent description of one proxy node
//! as supplied by the panel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents the protocol of a proxy node.
/// This is the canonical enum used for protocol identification across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[serde(rename = "vmess")]
    VMess,
    Vless,
    Trojan,
    #[serde(alias = "ss")]
    Shadowsocks,
    #[serde(rename = "shadowtls", alias = "shadow-tls")]
    ShadowTls,
    Hysteria,
    #[serde(alias = "hy2")]
    Hysteria2,
    /// Any protocol tag this crate does not know; such nodes never validate.
    #[serde(other)]
    Unknown,
}

impl ProxyType {
    /// Human-readable protocol name, also used when deriving labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ProxyType::VMess => "VMess",
            ProxyType::Vless => "VLESS",
            ProxyType::Trojan => "Trojan",
            ProxyType::Shadowsocks => "SS",
            ProxyType::ShadowTls => "ShadowTLS",
            ProxyType::Hysteria => "Hysteria",
            ProxyType::Hysteria2 => "Hysteria2",
            ProxyType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Represents one reachable proxy endpoint.
///
/// The record is flat: every protocol-specific credential or transport
/// setting is an optional field, and the protocol registry decides which of
/// them a given [`ProxyType`] needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyNode {
    pub id: String,
    pub protocol: ProxyType,
    #[serde(alias = "address", alias = "host_address")]
    pub server: String,
    pub port: u16,
    /// Display label shown by clients
    #[serde(alias = "name", alias = "tag")]
    pub remark: String,
    /// Optional group/region tag
    pub group: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Ordering hint, lower values first
    pub priority: Option<i32>,

    pub uuid: Option<String>,
    pub alter_id: u16,
    pub password: Option<String>,
    /// Shadowsocks cipher
    #[serde(alias = "cipher")]
    pub method: Option<String>,
    pub flow: Option<String>,

    /// Transport: tcp, ws, grpc, http, httpupgrade
    #[serde(alias = "transport")]
    pub network: Option<String>,
    pub path: Option<String>,
    pub host: Option<String>,
    pub service_name: Option<String>,

    /// Stream security: none, tls, reality
    pub security: Option<String>,
    pub sni: Option<String>,
    pub alpn: Vec<String>,
    pub fingerprint: Option<String>,
    pub allow_insecure: bool,
    pub public_key: Option<String>,
    pub short_id: Option<String>,

    pub obfs: Option<String>,
    pub obfs_password: Option<String>,
    /// upload speed in Mbps
    pub up_mbps: Option<u32>,
    /// download speed in Mbps
    pub down_mbps: Option<u32>,
    /// Port hopping range, e.g. `20000-30000,40000`
    pub ports: Option<String>,

    pub shadowtls_password: Option<String>,
    pub shadowtls_version: Option<u8>,

    pub udp: Option<bool>,
}

impl Default for ProxyNode {
    fn default() -> Self {
        ProxyNode {
            id: String::new(),
            protocol: ProxyType::Unknown,
            server: String::new(),
            port: 0,
            remark: String::new(),
            group: None,
            enabled: true,
            priority: None,
            uuid: None,
            alter_id: 0,
            password: None,
            method: None,
            flow: None,
            network: None,
            path: None,
            host: None,
            service_name: None,
            security: None,
            sni: None,
            alpn: Vec::new(),
            fingerprint: None,
            allow_insecure: false,
            public_key: None,
            short_id: None,
            obfs: None,
            obfs_password: None,
            up_mbps: None,
            down_mbps: None,
            ports: None,
            shadowtls_password: None,
            shadowtls_version: None,
            udp: None,
        }
    }
}

impl ProxyNode {
    /// Transport name with `tcp` as the implied default.
    pub fn network_or_tcp(&self) -> &str {
        non_empty(&self.network).unwrap_or("tcp")
    }

    /// Whether the node uses TLS or REALITY.
    pub fn tls_enabled(&self) -> bool {
        matches!(non_empty(&self.security), Some("tls") | Some("reality"))
    }

    pub fn is_reality(&self) -> bool {
        non_empty(&self.security) == Some("reality")
    }

    /// Server name for TLS, falling back to the transport host header.
    pub fn server_name(&self) -> Option<&str> {
        non_empty(&self.sni).or_else(|| non_empty(&self.host))
    }

    /// Server host formatted for use inside a URI authority.
    pub fn authority_host(&self) -> String {
        if self.server.contains(':') && !self.server.starts_with('[') {
            format!("[{}]", self.server)
        } else {
            self.server.clone()
        }
    }
}

/// Returns the contained string when it is present and not blank.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

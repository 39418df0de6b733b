use std::fmt;

use crate::models::proxy::{non_empty, ProxyNode};

/// A field of [`ProxyNode`] that a protocol can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeField {
    Server,
    Port,
    Uuid,
    AlterId,
    Password,
    Method,
    Flow,
    Network,
    Path,
    Host,
    ServiceName,
    Security,
    Sni,
    Alpn,
    Fingerprint,
    PublicKey,
    ShortId,
    Obfs,
    ObfsPassword,
    UpMbps,
    DownMbps,
    Ports,
    ShadowTlsPassword,
    ShadowTlsVersion,
}

impl NodeField {
    pub const ALL: [NodeField; 24] = [
        NodeField::Server,
        NodeField::Port,
        NodeField::Uuid,
        NodeField::AlterId,
        NodeField::Password,
        NodeField::Method,
        NodeField::Flow,
        NodeField::Network,
        NodeField::Path,
        NodeField::Host,
        NodeField::ServiceName,
        NodeField::Security,
        NodeField::Sni,
        NodeField::Alpn,
        NodeField::Fingerprint,
        NodeField::PublicKey,
        NodeField::ShortId,
        NodeField::Obfs,
        NodeField::ObfsPassword,
        NodeField::UpMbps,
        NodeField::DownMbps,
        NodeField::Ports,
        NodeField::ShadowTlsPassword,
        NodeField::ShadowTlsVersion,
    ];

    /// Canonical field name, as it appears in the panel payload.
    pub fn name(self) -> &'static str {
        match self {
            NodeField::Server => "server",
            NodeField::Port => "port",
            NodeField::Uuid => "uuid",
            NodeField::AlterId => "alter_id",
            NodeField::Password => "password",
            NodeField::Method => "method",
            NodeField::Flow => "flow",
            NodeField::Network => "network",
            NodeField::Path => "path",
            NodeField::Host => "host",
            NodeField::ServiceName => "service_name",
            NodeField::Security => "security",
            NodeField::Sni => "sni",
            NodeField::Alpn => "alpn",
            NodeField::Fingerprint => "fingerprint",
            NodeField::PublicKey => "public_key",
            NodeField::ShortId => "short_id",
            NodeField::Obfs => "obfs",
            NodeField::ObfsPassword => "obfs_password",
            NodeField::UpMbps => "up_mbps",
            NodeField::DownMbps => "down_mbps",
            NodeField::Ports => "ports",
            NodeField::ShadowTlsPassword => "shadowtls_password",
            NodeField::ShadowTlsVersion => "shadowtls_version",
        }
    }

    /// Whether the node carries a usable value for this field.
    /// Blank strings and zero counters count as absent.
    pub fn is_present(self, node: &ProxyNode) -> bool {
        match self {
            NodeField::Server => !node.server.trim().is_empty(),
            NodeField::Port => node.port != 0,
            NodeField::Uuid => non_empty(&node.uuid).is_some(),
            NodeField::AlterId => node.alter_id != 0,
            NodeField::Password => non_empty(&node.password).is_some(),
            NodeField::Method => non_empty(&node.method).is_some(),
            NodeField::Flow => non_empty(&node.flow).is_some(),
            NodeField::Network => non_empty(&node.network).is_some(),
            NodeField::Path => non_empty(&node.path).is_some(),
            NodeField::Host => non_empty(&node.host).is_some(),
            NodeField::ServiceName => non_empty(&node.service_name).is_some(),
            NodeField::Security => non_empty(&node.security).is_some(),
            NodeField::Sni => non_empty(&node.sni).is_some(),
            NodeField::Alpn => node.alpn.iter().any(|a| !a.trim().is_empty()),
            NodeField::Fingerprint => non_empty(&node.fingerprint).is_some(),
            NodeField::PublicKey => non_empty(&node.public_key).is_some(),
            NodeField::ShortId => non_empty(&node.short_id).is_some(),
            NodeField::Obfs => non_empty(&node.obfs).is_some(),
            NodeField::ObfsPassword => non_empty(&node.obfs_password).is_some(),
            NodeField::UpMbps => node.up_mbps.is_some_and(|v| v > 0),
            NodeField::DownMbps => node.down_mbps.is_some_and(|v| v > 0),
            NodeField::Ports => non_empty(&node.ports).is_some(),
            NodeField::ShadowTlsPassword => non_empty(&node.shadowtls_password).is_some(),
            NodeField::ShadowTlsVersion => node.shadowtls_version.is_some(),
        }
    }

    /// Resets the field to its absent value.
    pub fn clear(self, node: &mut ProxyNode) {
        match self {
            NodeField::Server => node.server.clear(),
            NodeField::Port => node.port = 0,
            NodeField::Uuid => node.uuid = None,
            NodeField::AlterId => node.alter_id = 0,
            NodeField::Password => node.password = None,
            NodeField::Method => node.method = None,
            NodeField::Flow => node.flow = None,
            NodeField::Network => node.network = None,
            NodeField::Path => node.path = None,
            NodeField::Host => node.host = None,
            NodeField::ServiceName => node.service_name = None,
            NodeField::Security => node.security = None,
            NodeField::Sni => node.sni = None,
            NodeField::Alpn => node.alpn.clear(),
            NodeField::Fingerprint => node.fingerprint = None,
            NodeField::PublicKey => node.public_key = None,
            NodeField::ShortId => node.short_id = None,
            NodeField::Obfs => node.obfs = None,
            NodeField::ObfsPassword => node.obfs_password = None,
            NodeField::UpMbps => node.up_mbps = None,
            NodeField::DownMbps => node.down_mbps = None,
            NodeField::Ports => node.ports = None,
            NodeField::ShadowTlsPassword => node.shadowtls_password = None,
            NodeField::ShadowTlsVersion => node.shadowtls_version = None,
        }
    }
}

impl fmt::Display for NodeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joins field names for log and error messages.
pub fn join_fields(fields: &[NodeField]) -> String {
    fields
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Protocol descriptor registry
//!
//! Every supported protocol is described by one entry in a static table:
//! the fields it needs, the values it accepts and the client formats able to
//! load it. Validation and renderer lookups go through this table, so adding
//! a protocol starts with adding a descriptor here.

pub mod fields;

use std::net::Ipv6Addr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::proxy::{non_empty, ProxyNode, ProxyType};
use crate::models::target::{ClientFormat, FormatSupport};

pub use fields::{join_fields, NodeField};

/// Static description of one proxy protocol.
#[derive(Debug)]
pub struct ProtocolDescriptor {
    pub proxy_type: ProxyType,
    /// Scheme used by the URI-list family, without `://`
    pub uri_scheme: &'static str,
    pub required: &'static [NodeField],
    pub optional: &'static [NodeField],
    /// Accepted transports; empty when the protocol has no transport choice
    pub networks: &'static [&'static str],
    /// Accepted stream security values; empty when not applicable
    pub securities: &'static [&'static str],
    /// Accepted ciphers; empty when the protocol has no cipher choice
    pub methods: &'static [&'static str],
    pub formats: FormatSupport,
    /// `type` key in sing-box outbounds
    pub singbox_type: &'static str,
    /// `protocol` key in Xray outbounds
    pub xray_protocol: Option<&'static str>,
}

impl ProtocolDescriptor {
    pub fn supports(&self, format: ClientFormat) -> bool {
        self.formats.contains(format.support_flag())
    }

    pub fn accepts_network(&self, network: &str) -> bool {
        self.networks.contains(&network)
    }

    /// All fields the protocol understands, required ones first.
    pub fn fields(&self) -> impl Iterator<Item = NodeField> + '_ {
        self.required.iter().chain(self.optional.iter()).copied()
    }
}

const V2RAY_NETWORKS: &[&str] = &["tcp", "ws", "grpc", "http", "httpupgrade"];

const SS_METHODS: &[&str] = &[
    "aes-128-gcm",
    "aes-256-gcm",
    "chacha20-ietf-poly1305",
    "xchacha20-ietf-poly1305",
    "2022-blake3-aes-128-gcm",
    "2022-blake3-aes-256-gcm",
    "2022-blake3-chacha20-poly1305",
];

const TLS_FIELDS: &[NodeField] = &[NodeField::Sni, NodeField::Alpn, NodeField::Fingerprint];

static DESCRIPTORS: [ProtocolDescriptor; 7] = [
    ProtocolDescriptor {
        proxy_type: ProxyType::VMess,
        uri_scheme: "vmess",
        required: &[NodeField::Server, NodeField::Port, NodeField::Uuid, NodeField::Network],
        optional: &[
            NodeField::AlterId,
            NodeField::Method,
            NodeField::Security,
            NodeField::Sni,
            NodeField::Alpn,
            NodeField::Fingerprint,
            NodeField::Path,
            NodeField::Host,
            NodeField::ServiceName,
        ],
        networks: V2RAY_NETWORKS,
        securities: &["none", "tls"],
        methods: &[],
        formats: FormatSupport::all(),
        singbox_type: "vmess",
        xray_protocol: Some("vmess"),
    },
    ProtocolDescriptor {
        proxy_type: ProxyType::Vless,
        uri_scheme: "vless",
        required: &[NodeField::Server, NodeField::Port, NodeField::Uuid, NodeField::Network],
        optional: &[
            NodeField::Flow,
            NodeField::Security,
            NodeField::Sni,
            NodeField::Alpn,
            NodeField::Fingerprint,
            NodeField::PublicKey,
            NodeField::ShortId,
            NodeField::Path,
            NodeField::Host,
            NodeField::ServiceName,
        ],
        networks: V2RAY_NETWORKS,
        securities: &["none", "tls", "reality"],
        methods: &[],
        formats: FormatSupport::all().difference(FormatSupport::CLASH),
        singbox_type: "vless",
        xray_protocol: Some("vless"),
    },
    ProtocolDescriptor {
        proxy_type: ProxyType::Trojan,
        uri_scheme: "trojan",
        required: &[NodeField::Server, NodeField::Port, NodeField::Password],
        optional: &[
            NodeField::Network,
            NodeField::Security,
            NodeField::Sni,
            NodeField::Alpn,
            NodeField::Fingerprint,
            NodeField::Path,
            NodeField::Host,
            NodeField::ServiceName,
        ],
        networks: &["tcp", "ws", "grpc"],
        securities: &["tls"],
        methods: &[],
        formats: FormatSupport::all(),
        singbox_type: "trojan",
        xray_protocol: Some("trojan"),
    },
    ProtocolDescriptor {
        proxy_type: ProxyType::Shadowsocks,
        uri_scheme: "ss",
        required: &[NodeField::Server, NodeField::Port, NodeField::Method, NodeField::Password],
        optional: &[],
        networks: &[],
        securities: &[],
        methods: SS_METHODS,
        formats: FormatSupport::all(),
        singbox_type: "shadowsocks",
        xray_protocol: Some("shadowsocks"),
    },
    ProtocolDescriptor {
        proxy_type: ProxyType::ShadowTls,
        uri_scheme: "ss",
        required: &[
            NodeField::Server,
            NodeField::Port,
            NodeField::Method,
            NodeField::Password,
            NodeField::ShadowTlsPassword,
            NodeField::Sni,
        ],
        optional: &[NodeField::ShadowTlsVersion, NodeField::Alpn, NodeField::Fingerprint],
        networks: &[],
        securities: &[],
        methods: SS_METHODS,
        formats: FormatSupport::MIHOMO.union(FormatSupport::SINGBOX_ALL),
        singbox_type: "shadowtls",
        xray_protocol: None,
    },
    ProtocolDescriptor {
        proxy_type: ProxyType::Hysteria,
        uri_scheme: "hysteria",
        required: &[
            NodeField::Server,
            NodeField::Port,
            NodeField::Password,
            NodeField::UpMbps,
            NodeField::DownMbps,
        ],
        optional: &[
            NodeField::Sni,
            NodeField::Alpn,
            NodeField::Fingerprint,
            NodeField::Obfs,
            NodeField::Ports,
        ],
        networks: &[],
        securities: &[],
        methods: &[],
        formats: FormatSupport::GENERIC
            .union(FormatSupport::MIHOMO)
            .union(FormatSupport::STASH)
            .union(FormatSupport::SINGBOX_ALL),
        singbox_type: "hysteria",
        xray_protocol: None,
    },
    ProtocolDescriptor {
        proxy_type: ProxyType::Hysteria2,
        uri_scheme: "hysteria2",
        required: &[NodeField::Server, NodeField::Port, NodeField::Password],
        optional: &[
            NodeField::Sni,
            NodeField::Alpn,
            NodeField::Fingerprint,
            NodeField::Obfs,
            NodeField::ObfsPassword,
            NodeField::UpMbps,
            NodeField::DownMbps,
            NodeField::Ports,
        ],
        networks: &[],
        securities: &[],
        methods: &[],
        formats: FormatSupport::GENERIC
            .union(FormatSupport::MIHOMO)
            .union(FormatSupport::STASH)
            .union(FormatSupport::SINGBOX_ALL),
        singbox_type: "hysteria2",
        xray_protocol: None,
    },
];

/// Port hopping list: comma separated ports or `start-end` ranges.
static PORTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,5}(-\d{1,5})?(,\d{1,5}(-\d{1,5})?)*$").unwrap());

/// Why a node cannot be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNode {
    #[error("protocol {0} has no descriptor")]
    UnknownProtocol(ProxyType),
    #[error("missing required fields: {}", join_fields(.0))]
    MissingFields(Vec<NodeField>),
    #[error("invalid {field}: {reason}")]
    InvalidValue { field: NodeField, reason: String },
}

impl InvalidNode {
    /// Required fields the node lacked; empty for other failures.
    pub fn missing_fields(&self) -> &[NodeField] {
        match self {
            InvalidNode::MissingFields(fields) => fields,
            _ => &[],
        }
    }

    fn value(field: NodeField, reason: impl Into<String>) -> Self {
        InvalidNode::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// All registered descriptors.
pub fn descriptors() -> &'static [ProtocolDescriptor] {
    &DESCRIPTORS
}

pub fn descriptor(proxy_type: ProxyType) -> Option<&'static ProtocolDescriptor> {
    DESCRIPTORS.iter().find(|d| d.proxy_type == proxy_type)
}

/// Whether `format` can load nodes of `proxy_type`.
pub fn supports(proxy_type: ProxyType, format: ClientFormat) -> bool {
    descriptor(proxy_type).is_some_and(|d| d.supports(format))
}

/// Whether `format` can load this particular node.
///
/// Clash Premium predates the Shadowsocks 2022 ciphers, so those nodes are
/// excluded from it even though the protocol itself is supported.
pub fn supports_node(node: &ProxyNode, format: ClientFormat) -> bool {
    if !supports(node.protocol, format) {
        return false;
    }
    if format == ClientFormat::Clash {
        if let Some(method) = non_empty(&node.method) {
            return !method.starts_with("2022-");
        }
    }
    true
}

/// Checks a node against its protocol descriptor.
///
/// Presence of every required field is checked first, so the error lists all
/// missing fields at once; value rules are checked afterwards.
pub fn validate(node: &ProxyNode) -> Result<(), InvalidNode> {
    let desc = descriptor(node.protocol).ok_or(InvalidNode::UnknownProtocol(node.protocol))?;

    let mut missing: Vec<NodeField> = desc
        .required
        .iter()
        .copied()
        .filter(|field| !field.is_present(node))
        .collect();

    if node.is_reality() {
        for field in [NodeField::PublicKey, NodeField::Sni] {
            if !field.is_present(node) && !missing.contains(&field) {
                missing.push(field);
            }
        }
    }
    if node.protocol == ProxyType::Hysteria2
        && NodeField::Obfs.is_present(node)
        && !NodeField::ObfsPassword.is_present(node)
    {
        missing.push(NodeField::ObfsPassword);
    }

    if !missing.is_empty() {
        return Err(InvalidNode::MissingFields(missing));
    }

    check_server(&node.server)?;

    if let Some(uuid) = non_empty(&node.uuid) {
        if uuid::Uuid::parse_str(uuid).is_err() {
            return Err(InvalidNode::value(NodeField::Uuid, "not a valid UUID"));
        }
    }

    if !desc.networks.is_empty() {
        if let Some(network) = non_empty(&node.network) {
            if !desc.accepts_network(network) {
                return Err(InvalidNode::value(
                    NodeField::Network,
                    format!("transport '{}' is not supported", network),
                ));
            }
        }
    }

    if !desc.securities.is_empty() {
        if let Some(security) = non_empty(&node.security) {
            if !desc.securities.contains(&security) {
                return Err(InvalidNode::value(
                    NodeField::Security,
                    format!("security '{}' is not supported", security),
                ));
            }
        }
    }

    if !desc.methods.is_empty() {
        let method = non_empty(&node.method).unwrap_or_default();
        if !desc.methods.contains(&method) {
            return Err(InvalidNode::value(
                NodeField::Method,
                format!("cipher '{}' is not supported", method),
            ));
        }
    }

    if node.protocol == ProxyType::Hysteria2 {
        if let Some(obfs) = non_empty(&node.obfs) {
            if obfs != "salamander" {
                return Err(InvalidNode::value(
                    NodeField::Obfs,
                    format!("obfs '{}' is not supported", obfs),
                ));
            }
        }
    }

    if let Some(version) = node.shadowtls_version {
        if node.protocol == ProxyType::ShadowTls && !(2..=3).contains(&version) {
            return Err(InvalidNode::value(
                NodeField::ShadowTlsVersion,
                "only versions 2 and 3 are supported",
            ));
        }
    }

    if let Some(ports) = non_empty(&node.ports) {
        if !PORTS_RE.is_match(ports) {
            return Err(InvalidNode::value(NodeField::Ports, "malformed port list"));
        }
    }

    Ok(())
}

/// Clears every field the node's protocol does not list, so renderers never
/// see leftovers such as a VMess `flow` or a Shadowsocks `sni`.
pub fn retain_known_fields(node: &mut ProxyNode) {
    let Some(desc) = descriptor(node.protocol) else {
        return;
    };
    for field in NodeField::ALL {
        if !desc.fields().any(|known| known == field) {
            field.clear(node);
        }
    }
}

/// The server is spliced verbatim into URIs and documents, so it must be a
/// bare host without whitespace or control characters.
fn check_server(server: &str) -> Result<(), InvalidNode> {
    if server.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(InvalidNode::value(
            NodeField::Server,
            "contains whitespace or control characters",
        ));
    }
    if server.contains(':') {
        let bare = server.trim_start_matches('[').trim_end_matches(']');
        return bare
            .parse::<Ipv6Addr>()
            .map(|_| ())
            .map_err(|_| InvalidNode::value(NodeField::Server, "malformed IPv6 address"));
    }
    match url::Host::parse(server) {
        Ok(_) => Ok(()),
        Err(e) => Err(InvalidNode::value(NodeField::Server, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vless() -> ProxyNode {
        ProxyNode {
            id: "v1".to_string(),
            protocol: ProxyType::Vless,
            server: "vless.example.com".to_string(),
            port: 443,
            uuid: Some("b831381d-6324-4d53-ad4f-8cda48b30811".to_string()),
            network: Some("tcp".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_protocol_has_one_descriptor() {
        for proxy_type in [
            ProxyType::VMess,
            ProxyType::Vless,
            ProxyType::Trojan,
            ProxyType::Shadowsocks,
            ProxyType::ShadowTls,
            ProxyType::Hysteria,
            ProxyType::Hysteria2,
        ] {
            let count = descriptors()
                .iter()
                .filter(|d| d.proxy_type == proxy_type)
                .count();
            assert_eq!(count, 1, "{}", proxy_type);
        }
        assert!(descriptor(ProxyType::Unknown).is_none());
    }

    #[test]
    fn test_descriptor_requires_server_and_port() {
        for desc in descriptors() {
            assert!(desc.required.contains(&NodeField::Server));
            assert!(desc.required.contains(&NodeField::Port));
            assert!(desc.formats.intersects(FormatSupport::SINGBOX_ALL));
        }
    }

    #[test]
    fn test_valid_vless() {
        assert_eq!(validate(&vless()), Ok(()));
    }

    #[test]
    fn test_missing_transport_is_reported() {
        let mut node = vless();
        node.network = None;
        let err = validate(&node).unwrap_err();
        assert_eq!(err.missing_fields(), &[NodeField::Network]);
    }

    #[test]
    fn test_reality_needs_public_key_and_sni() {
        let mut node = vless();
        node.security = Some("reality".to_string());
        let err = validate(&node).unwrap_err();
        assert_eq!(err.missing_fields(), &[NodeField::PublicKey, NodeField::Sni]);
    }

    #[test]
    fn test_bad_uuid() {
        let mut node = vless();
        node.uuid = Some("not-a-uuid".to_string());
        assert!(matches!(
            validate(&node),
            Err(InvalidNode::InvalidValue {
                field: NodeField::Uuid,
                ..
            })
        ));
    }

    #[test]
    fn test_server_with_delimiters_is_rejected() {
        let mut node = vless();
        node.server = "evil.example.com/path?x".to_string();
        assert!(validate(&node).is_err());
        node.server = "2001:db8::1".to_string();
        assert_eq!(validate(&node), Ok(()));
    }

    #[test]
    fn test_server_padding_is_rejected() {
        for server in [" vless.example.com", "vless.example.com\n", "vless.\texample.com", "vless.example.com\r"] {
            let mut node = vless();
            node.server = server.to_string();
            assert!(
                matches!(
                    validate(&node),
                    Err(InvalidNode::InvalidValue {
                        field: NodeField::Server,
                        ..
                    })
                ),
                "{:?}",
                server
            );
        }
    }

    #[test]
    fn test_retain_known_fields() {
        let mut node = vless();
        node.flow = Some("xtls-rprx-vision".to_string());
        node.method = Some("aes-128-gcm".to_string());
        node.obfs = Some("salamander".to_string());
        node.up_mbps = Some(100);
        retain_known_fields(&mut node);
        assert_eq!(node.flow.as_deref(), Some("xtls-rprx-vision"));
        assert_eq!(node.method, None);
        assert_eq!(node.obfs, None);
        assert_eq!(node.up_mbps, None);
        assert_eq!(node.network.as_deref(), Some("tcp"));

        let mut ss = ProxyNode {
            protocol: ProxyType::Shadowsocks,
            server: "1.2.3.4".to_string(),
            port: 8388,
            method: Some("aes-128-gcm".to_string()),
            password: Some("secret".to_string()),
            network: Some("ws".to_string()),
            sni: Some("cdn.example.com".to_string()),
            alter_id: 4,
            ..Default::default()
        };
        retain_known_fields(&mut ss);
        assert_eq!(ss.network, None);
        assert_eq!(ss.sni, None);
        assert_eq!(ss.alter_id, 0);
        assert_eq!(ss.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_unsupported_cipher() {
        let node = ProxyNode {
            protocol: ProxyType::Shadowsocks,
            server: "1.2.3.4".to_string(),
            port: 8388,
            method: Some("rc4-md5".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            validate(&node),
            Err(InvalidNode::InvalidValue {
                field: NodeField::Method,
                ..
            })
        ));
    }

    #[test]
    fn test_port_list_format() {
        let mut node = ProxyNode {
            protocol: ProxyType::Hysteria2,
            server: "hy.example.com".to_string(),
            port: 443,
            password: Some("pw".to_string()),
            ports: Some("20000-30000,40000".to_string()),
            ..Default::default()
        };
        assert_eq!(validate(&node), Ok(()));
        node.ports = Some("20000-".to_string());
        assert!(validate(&node).is_err());
    }

    #[test]
    fn test_capabilities() {
        assert!(supports(ProxyType::VMess, ClientFormat::Clash));
        assert!(!supports(ProxyType::Vless, ClientFormat::Clash));
        assert!(supports(ProxyType::ShadowTls, ClientFormat::SingBoxLegacy));
        assert!(!supports(ProxyType::ShadowTls, ClientFormat::Generic));
        assert!(!supports(ProxyType::Hysteria2, ClientFormat::V2RayJson));
        assert!(!supports(ProxyType::Unknown, ClientFormat::Generic));
    }

    #[test]
    fn test_clash_rejects_2022_ciphers() {
        let mut node = ProxyNode {
            protocol: ProxyType::Shadowsocks,
            method: Some("2022-blake3-aes-128-gcm".to_string()),
            ..Default::default()
        };
        assert!(!supports_node(&node, ClientFormat::Clash));
        assert!(supports_node(&node, ClientFormat::Mihomo));
        node.method = Some("aes-128-gcm".to_string());
        assert!(supports_node(&node, ClientFormat::Clash));
    }
}

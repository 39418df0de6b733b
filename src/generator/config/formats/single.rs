//! Generic URI-list renderer
//!
//! One share link per node, optionally wrapped in a single base64 blob.

use serde_json::json;
use thiserror::Error;

use crate::generator::RenderContext;
use crate::models::{non_empty, ProxyNode, ProxyType};
use crate::registry::{self, NodeField};
use crate::utils::base64::{base64_encode, url_safe_base64_encode};
use crate::utils::url::{build_query, url_encode};

/// Why a share link could not be built.
#[derive(Debug, Error)]
pub enum UriError {
    #[error("{0} has no share link form")]
    Unsupported(ProxyType),
    #[error("required field {0} is empty")]
    MissingField(NodeField),
    #[error("failed to encode vmess payload: {0}")]
    Json(#[from] serde_json::Error),
}

fn field<'a>(value: &'a Option<String>, name: NodeField) -> Result<&'a str, UriError> {
    non_empty(value).ok_or(UriError::MissingField(name))
}

/// Convert a proxy to its share link.
pub fn proxy_to_uri(node: &ProxyNode) -> Result<String, UriError> {
    let descriptor = registry::descriptor(node.protocol).ok_or(UriError::Unsupported(node.protocol))?;
    let scheme = descriptor.uri_scheme;
    let host = node.authority_host();
    let remark = url_encode(&node.remark);
    let alpn = node.alpn.join(",");

    match node.protocol {
        ProxyType::Shadowsocks => {
            let method = field(&node.method, NodeField::Method)?;
            let password = field(&node.password, NodeField::Password)?;
            // SIP022 keys are base64 already and go in plain form
            let user_info = if method.starts_with("2022-") {
                format!("{}:{}", url_encode(method), url_encode(password))
            } else {
                url_safe_base64_encode(&format!("{}:{}", method, password))
            };
            Ok(format!(
                "{}://{}@{}:{}#{}",
                scheme, user_info, host, node.port, remark
            ))
        }
        ProxyType::VMess => {
            let uuid = field(&node.uuid, NodeField::Uuid)?;
            let network = node.network_or_tcp();
            let path = if network == "grpc" {
                non_empty(&node.service_name)
            } else {
                non_empty(&node.path)
            };
            let vmess = json!({
                "v": "2",
                "ps": node.remark,
                "add": node.server,
                "port": node.port.to_string(),
                "id": uuid,
                "aid": node.alter_id.to_string(),
                "scy": non_empty(&node.method).unwrap_or("auto"),
                "net": network,
                "type": "none",
                "host": non_empty(&node.host).unwrap_or_default(),
                "path": path.unwrap_or_default(),
                "tls": if node.tls_enabled() { "tls" } else { "" },
                "sni": non_empty(&node.sni).unwrap_or_default(),
                "alpn": alpn,
                "fp": non_empty(&node.fingerprint).unwrap_or_default(),
            });
            let payload = serde_json::to_string(&vmess)?;
            Ok(format!("{}://{}", scheme, base64_encode(&payload)))
        }
        ProxyType::Vless => {
            let uuid = field(&node.uuid, NodeField::Uuid)?;
            let security = non_empty(&node.security).unwrap_or("none");
            let mut params = vec![
                ("encryption", "none"),
                ("type", node.network_or_tcp()),
                ("security", security),
            ];
            params.extend(transport_params(node));
            params.extend(tls_params(node, &alpn));
            if node.is_reality() {
                params.push(("pbk", non_empty(&node.public_key).unwrap_or_default()));
                params.push(("sid", non_empty(&node.short_id).unwrap_or_default()));
            }
            params.push(("flow", non_empty(&node.flow).unwrap_or_default()));
            Ok(format!(
                "{}://{}@{}:{}?{}#{}",
                scheme,
                uuid,
                host,
                node.port,
                build_query(params),
                remark
            ))
        }
        ProxyType::Trojan => {
            let password = field(&node.password, NodeField::Password)?;
            let mut params = vec![("type", node.network_or_tcp()), ("security", "tls")];
            params.extend(transport_params(node));
            params.extend(tls_params(node, &alpn));
            if node.allow_insecure {
                params.push(("allowInsecure", "1"));
            }
            Ok(format!(
                "{}://{}@{}:{}?{}#{}",
                scheme,
                url_encode(password),
                host,
                node.port,
                build_query(params),
                remark
            ))
        }
        ProxyType::Hysteria => {
            let auth = field(&node.password, NodeField::Password)?;
            let up = node.up_mbps.unwrap_or_default().to_string();
            let down = node.down_mbps.unwrap_or_default().to_string();
            let mut params = vec![
                ("protocol", "udp"),
                ("auth", auth),
                ("peer", node.server_name().unwrap_or_default()),
                ("upmbps", up.as_str()),
                ("downmbps", down.as_str()),
                ("alpn", alpn.as_str()),
                ("obfsParam", non_empty(&node.obfs).unwrap_or_default()),
                ("mport", non_empty(&node.ports).unwrap_or_default()),
            ];
            if node.allow_insecure {
                params.push(("insecure", "1"));
            }
            Ok(format!(
                "{}://{}:{}?{}#{}",
                scheme,
                host,
                node.port,
                build_query(params),
                remark
            ))
        }
        ProxyType::Hysteria2 => {
            let password = field(&node.password, NodeField::Password)?;
            let mut params = vec![
                ("sni", node.server_name().unwrap_or_default()),
                ("alpn", alpn.as_str()),
                ("obfs", non_empty(&node.obfs).unwrap_or_default()),
                ("obfs-password", non_empty(&node.obfs_password).unwrap_or_default()),
                ("mport", non_empty(&node.ports).unwrap_or_default()),
            ];
            if node.allow_insecure {
                params.push(("insecure", "1"));
            }
            Ok(format!(
                "{}://{}@{}:{}/?{}#{}",
                scheme,
                url_encode(password),
                host,
                node.port,
                build_query(params),
                remark
            ))
        }
        ProxyType::ShadowTls | ProxyType::Unknown => Err(UriError::Unsupported(node.protocol)),
    }
}

fn transport_params(node: &ProxyNode) -> Vec<(&'static str, &str)> {
    match node.network_or_tcp() {
        "grpc" => vec![(
            "serviceName",
            non_empty(&node.service_name).unwrap_or_default(),
        )],
        "ws" | "http" | "httpupgrade" => vec![
            ("path", non_empty(&node.path).unwrap_or_default()),
            ("host", non_empty(&node.host).unwrap_or_default()),
        ],
        _ => Vec::new(),
    }
}

fn tls_params<'a>(node: &'a ProxyNode, alpn: &'a str) -> Vec<(&'static str, &'a str)> {
    if !node.tls_enabled() && node.protocol != ProxyType::Trojan {
        return Vec::new();
    }
    vec![
        ("sni", node.server_name().unwrap_or_default()),
        ("alpn", alpn),
        ("fp", non_empty(&node.fingerprint).unwrap_or_default()),
    ]
}

/// Share links for every node that has one, in order.
pub fn proxy_to_lines(nodes: &[ProxyNode]) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|node| match proxy_to_uri(node) {
            Ok(uri) => Some(uri),
            Err(e) => {
                log::debug!("Skipping node '{}' in URI list: {}", node.id, e);
                None
            }
        })
        .collect()
}

/// Render the `generic` document.
pub fn proxy_to_single(ctx: &RenderContext) -> String {
    let text = proxy_to_lines(ctx.nodes).join("\n");
    if ctx.settings.render.generic_base64 {
        base64_encode(&text)
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn vless_reality() -> ProxyNode {
        ProxyNode {
            id: "v1".to_string(),
            protocol: ProxyType::Vless,
            server: "reality.example.com".to_string(),
            port: 443,
            remark: "NL #1".to_string(),
            uuid: Some("b831381d-6324-4d53-ad4f-8cda48b30811".to_string()),
            network: Some("tcp".to_string()),
            security: Some("reality".to_string()),
            sni: Some("www.microsoft.com".to_string()),
            public_key: Some("pbk123".to_string()),
            short_id: Some("ab".to_string()),
            fingerprint: Some("chrome".to_string()),
            flow: Some("xtls-rprx-vision".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_vless_reality_uri() {
        let uri = proxy_to_uri(&vless_reality()).unwrap();
        assert_eq!(
            uri,
            "vless://b831381d-6324-4d53-ad4f-8cda48b30811@reality.example.com:443\
             ?encryption=none&type=tcp&security=reality&sni=www.microsoft.com&fp=chrome\
             &pbk=pbk123&sid=ab&flow=xtls-rprx-vision#NL%20%231"
        );
    }

    #[test]
    fn test_ss_uri_uses_sip002() {
        let node = ProxyNode {
            protocol: ProxyType::Shadowsocks,
            server: "2001:db8::1".to_string(),
            port: 8388,
            remark: "ss".to_string(),
            method: Some("aes-256-gcm".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        };
        let uri = proxy_to_uri(&node).unwrap();
        assert_eq!(
            uri,
            format!(
                "ss://{}@[2001:db8::1]:8388#ss",
                url_safe_base64_encode("aes-256-gcm:pass")
            )
        );
    }

    #[test]
    fn test_vmess_payload_is_json() {
        let node = ProxyNode {
            protocol: ProxyType::VMess,
            server: "vm.example.com".to_string(),
            port: 443,
            remark: "vm".to_string(),
            uuid: Some("b831381d-6324-4d53-ad4f-8cda48b30811".to_string()),
            network: Some("ws".to_string()),
            path: Some("/ray".to_string()),
            security: Some("tls".to_string()),
            ..Default::default()
        };
        let uri = proxy_to_uri(&node).unwrap();
        let payload = STANDARD.decode(uri.trim_start_matches("vmess://")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["add"], "vm.example.com");
        assert_eq!(value["port"], "443");
        assert_eq!(value["net"], "ws");
        assert_eq!(value["path"], "/ray");
        assert_eq!(value["tls"], "tls");
    }

    #[test]
    fn test_trojan_password_is_escaped() {
        let node = ProxyNode {
            protocol: ProxyType::Trojan,
            server: "t.example.com".to_string(),
            port: 443,
            remark: "t".to_string(),
            password: Some("p@ss#word".to_string()),
            ..Default::default()
        };
        let uri = proxy_to_uri(&node).unwrap();
        assert!(uri.starts_with("trojan://p%40ss%23word@t.example.com:443?type=tcp&security=tls"));
        assert!(uri.ends_with("#t"));
    }

    #[test]
    fn test_shadowtls_has_no_link() {
        let node = ProxyNode {
            protocol: ProxyType::ShadowTls,
            ..Default::default()
        };
        assert!(matches!(
            proxy_to_uri(&node),
            Err(UriError::Unsupported(ProxyType::ShadowTls))
        ));
        assert!(proxy_to_lines(&[node]).is_empty());
    }
}

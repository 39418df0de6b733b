//! v2ray-json renderer
//!
//! Emits a JSON array with one complete Xray client configuration per node,
//! the layout v2rayNG and Streisand import as a multi-profile subscription.

use serde::Serialize;
use serde_json::{json, Value};

use crate::generator::RenderContext;
use crate::models::{non_empty, ProxyNode, ProxyType};
use crate::registry;

const SOCKS_PORT: u16 = 10808;
const HTTP_PORT: u16 = 10809;

#[derive(Debug, Serialize)]
pub struct XrayConfig {
    pub remarks: String,
    pub log: XrayLog,
    pub inbounds: Vec<XrayInbound>,
    pub outbounds: Vec<XrayOutbound>,
    pub routing: XrayRouting,
}

#[derive(Debug, Serialize)]
pub struct XrayLog {
    pub loglevel: String,
}

#[derive(Debug, Serialize)]
pub struct XrayInbound {
    pub tag: String,
    pub port: u16,
    pub listen: String,
    pub protocol: String,
    pub settings: Value,
    pub sniffing: Value,
}

#[derive(Debug, Serialize)]
pub struct XrayOutbound {
    pub tag: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(rename = "streamSettings", skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct XrayRouting {
    #[serde(rename = "domainStrategy")]
    pub domain_strategy: String,
    pub rules: Vec<Value>,
}

fn sniffing() -> Value {
    json!({
        "enabled": true,
        "destOverride": ["http", "tls", "quic"],
        "routeOnly": true
    })
}

fn build_inbounds() -> Vec<XrayInbound> {
    vec![
        XrayInbound {
            tag: "socks".to_string(),
            port: SOCKS_PORT,
            listen: "127.0.0.1".to_string(),
            protocol: "socks".to_string(),
            settings: json!({ "auth": "noauth", "udp": true }),
            sniffing: sniffing(),
        },
        XrayInbound {
            tag: "http".to_string(),
            port: HTTP_PORT,
            listen: "127.0.0.1".to_string(),
            protocol: "http".to_string(),
            settings: json!({ "allowTransparent": false }),
            sniffing: sniffing(),
        },
    ]
}

fn protocol_settings(node: &ProxyNode) -> Option<Value> {
    let uuid = non_empty(&node.uuid).unwrap_or_default();
    let password = non_empty(&node.password).unwrap_or_default();
    let settings = match node.protocol {
        ProxyType::VMess => json!({
            "vnext": [{
                "address": node.server,
                "port": node.port,
                "users": [{
                    "id": uuid,
                    "alterId": node.alter_id,
                    "security": non_empty(&node.method).unwrap_or("auto")
                }]
            }]
        }),
        ProxyType::Vless => {
            let mut user = json!({ "id": uuid, "encryption": "none" });
            if let Some(flow) = non_empty(&node.flow) {
                user["flow"] = json!(flow);
            }
            json!({
                "vnext": [{
                    "address": node.server,
                    "port": node.port,
                    "users": [user]
                }]
            })
        }
        ProxyType::Trojan => json!({
            "servers": [{
                "address": node.server,
                "port": node.port,
                "password": password
            }]
        }),
        ProxyType::Shadowsocks => json!({
            "servers": [{
                "address": node.server,
                "port": node.port,
                "method": non_empty(&node.method).unwrap_or_default(),
                "password": password
            }]
        }),
        _ => return None,
    };
    Some(settings)
}

fn stream_settings(node: &ProxyNode) -> Option<Value> {
    if node.protocol == ProxyType::Shadowsocks {
        return None;
    }
    let network = node.network_or_tcp();
    let mut settings = json!({ "network": network, "security": "none" });

    if node.is_reality() {
        settings["security"] = json!("reality");
        settings["realitySettings"] = json!({
            "serverName": non_empty(&node.sni).unwrap_or_default(),
            "publicKey": non_empty(&node.public_key).unwrap_or_default(),
            "shortId": non_empty(&node.short_id).unwrap_or_default(),
            "fingerprint": non_empty(&node.fingerprint).unwrap_or("chrome")
        });
    } else if node.tls_enabled() || node.protocol == ProxyType::Trojan {
        let mut tls = json!({ "allowInsecure": node.allow_insecure });
        if let Some(sni) = node.server_name() {
            tls["serverName"] = json!(sni);
        }
        if !node.alpn.is_empty() {
            tls["alpn"] = json!(node.alpn);
        }
        if let Some(fp) = non_empty(&node.fingerprint) {
            tls["fingerprint"] = json!(fp);
        }
        settings["security"] = json!("tls");
        settings["tlsSettings"] = tls;
    }

    let path = non_empty(&node.path).unwrap_or("/");
    let host = non_empty(&node.host).unwrap_or_default();
    match network {
        "ws" => {
            settings["wsSettings"] = json!({ "path": path, "headers": { "Host": host } });
        }
        "grpc" => {
            settings["grpcSettings"] = json!({
                "serviceName": non_empty(&node.service_name).unwrap_or_default()
            });
        }
        "http" => {
            let hosts: Vec<&str> = non_empty(&node.host).into_iter().collect();
            settings["httpSettings"] = json!({ "path": path, "host": hosts });
        }
        "httpupgrade" => {
            settings["httpupgradeSettings"] = json!({ "path": path, "host": host });
        }
        _ => {}
    }
    Some(settings)
}

/// Build the Xray config for one node, or `None` when Xray cannot dial it.
pub fn node_to_config(node: &ProxyNode) -> Option<XrayConfig> {
    let protocol = registry::descriptor(node.protocol)?.xray_protocol?;
    let settings = protocol_settings(node)?;

    let outbounds = vec![
        XrayOutbound {
            tag: "proxy".to_string(),
            protocol: protocol.to_string(),
            settings: Some(settings),
            stream_settings: stream_settings(node),
        },
        XrayOutbound {
            tag: "direct".to_string(),
            protocol: "freedom".to_string(),
            settings: None,
            stream_settings: None,
        },
        XrayOutbound {
            tag: "block".to_string(),
            protocol: "blackhole".to_string(),
            settings: None,
            stream_settings: None,
        },
    ];

    Some(XrayConfig {
        remarks: node.remark.clone(),
        log: XrayLog {
            loglevel: "warning".to_string(),
        },
        inbounds: build_inbounds(),
        outbounds,
        routing: XrayRouting {
            domain_strategy: "AsIs".to_string(),
            rules: vec![
                json!({ "type": "field", "ip": ["geoip:private"], "outboundTag": "direct" }),
                json!({ "type": "field", "network": "tcp,udp", "outboundTag": "proxy" }),
            ],
        },
    })
}

/// Render the `v2ray-json` document.
pub fn proxy_to_v2ray_json(ctx: &RenderContext) -> String {
    let configs: Vec<XrayConfig> = ctx
        .nodes
        .iter()
        .filter_map(|node| {
            let config = node_to_config(node);
            if config.is_none() {
                log::debug!("Skipping node '{}': no Xray outbound for {}", node.id, node.protocol);
            }
            config
        })
        .collect();

    match serde_json::to_string_pretty(&configs) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize v2ray-json document: {}", e);
            "[]".to_string()
        }
    }
}

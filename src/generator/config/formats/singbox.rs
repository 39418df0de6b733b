use std::collections::HashSet;

use serde_json::{json, Value};

use crate::generator::pipeline::unique_name;
use crate::generator::RenderContext;
use crate::models::{non_empty, ProxyGroupConfig, ProxyGroupType, ProxyNode, ProxyType};
use crate::registry;

const DIRECT_TAG: &str = "direct";
const BLOCK_TAG: &str = "block";
const DNS_OUT_TAG: &str = "dns-out";
const REMOTE_DNS_TAG: &str = "dns-remote";
const LOCAL_DNS_TAG: &str = "dns-local";
const MIXED_PORT: u16 = 2080;

/// sing-box configuration schema a document is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingBoxSchema {
    /// sing-box 1.12 and newer: rule actions, typed DNS servers
    Current,
    /// sing-box 1.10 and 1.11: special outbounds, address-style DNS servers
    Legacy,
}

fn tls_object(node: &ProxyNode, force: bool) -> Option<Value> {
    if !force && !node.tls_enabled() {
        return None;
    }
    let mut tls = json!({ "enabled": true });
    if let Some(sni) = node.server_name() {
        tls["server_name"] = json!(sni);
    }
    if node.allow_insecure {
        tls["insecure"] = json!(true);
    }
    if !node.alpn.is_empty() {
        tls["alpn"] = json!(node.alpn);
    }
    let fingerprint = non_empty(&node.fingerprint);
    if node.is_reality() {
        tls["utls"] = json!({
            "enabled": true,
            "fingerprint": fingerprint.unwrap_or("chrome")
        });
        tls["reality"] = json!({
            "enabled": true,
            "public_key": non_empty(&node.public_key).unwrap_or_default(),
            "short_id": non_empty(&node.short_id).unwrap_or_default()
        });
    } else if let Some(fp) = fingerprint {
        tls["utls"] = json!({ "enabled": true, "fingerprint": fp });
    }
    Some(tls)
}

fn transport_object(node: &ProxyNode) -> Option<Value> {
    let path = non_empty(&node.path).unwrap_or("/");
    let host = non_empty(&node.host);
    match node.network_or_tcp() {
        "ws" => {
            let mut transport = json!({ "type": "ws", "path": path });
            if let Some(host) = host {
                transport["headers"] = json!({ "Host": host });
            }
            Some(transport)
        }
        "grpc" => Some(json!({
            "type": "grpc",
            "service_name": non_empty(&node.service_name).unwrap_or_default()
        })),
        "http" => {
            let hosts: Vec<&str> = host.into_iter().collect();
            Some(json!({ "type": "http", "host": hosts, "path": path }))
        }
        "httpupgrade" => Some(json!({
            "type": "httpupgrade",
            "host": host.unwrap_or_default(),
            "path": path
        })),
        _ => None,
    }
}

/// `20000-30000,40000` to `["20000:30000", "40000:40000"]`
fn server_ports(ports: &str) -> Vec<String> {
    ports
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once('-') {
            Some((start, end)) => format!("{}:{}", start, end),
            None => format!("{}:{}", p, p),
        })
        .collect()
}

fn insert_opt(target: &mut Value, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        target[key] = value;
    }
}

/// Convert a node to its sing-box outbounds.
///
/// ShadowTLS yields two outbounds: the shadowsocks outbound clients select,
/// and the shadowtls outbound it detours through. The detour tag is made
/// unique against `taken`, which must hold every other tag of the document.
pub fn proxy_to_outbounds(
    node: &ProxyNode,
    schema: SingBoxSchema,
    taken: &mut HashSet<String>,
) -> Vec<Value> {
    let Some(descriptor) = registry::descriptor(node.protocol) else {
        return Vec::new();
    };
    let tag = node.remark.as_str();
    let password = non_empty(&node.password).unwrap_or_default();
    let mut outbound = json!({
        "type": descriptor.singbox_type,
        "tag": tag,
        "server": node.server,
        "server_port": node.port
    });

    match node.protocol {
        ProxyType::VMess => {
            outbound["uuid"] = json!(non_empty(&node.uuid).unwrap_or_default());
            outbound["alter_id"] = json!(node.alter_id);
            outbound["security"] = json!(non_empty(&node.method).unwrap_or("auto"));
            insert_opt(&mut outbound, "tls", tls_object(node, false));
            insert_opt(&mut outbound, "transport", transport_object(node));
        }
        ProxyType::Vless => {
            outbound["uuid"] = json!(non_empty(&node.uuid).unwrap_or_default());
            if let Some(flow) = non_empty(&node.flow) {
                outbound["flow"] = json!(flow);
            }
            insert_opt(&mut outbound, "tls", tls_object(node, false));
            insert_opt(&mut outbound, "transport", transport_object(node));
        }
        ProxyType::Trojan => {
            outbound["password"] = json!(password);
            insert_opt(&mut outbound, "tls", tls_object(node, true));
            insert_opt(&mut outbound, "transport", transport_object(node));
        }
        ProxyType::Shadowsocks => {
            outbound["method"] = json!(non_empty(&node.method).unwrap_or_default());
            outbound["password"] = json!(password);
        }
        ProxyType::ShadowTls => {
            let detour = unique_name(&format!("{} shadowtls", tag), taken);
            let shadowsocks = json!({
                "type": "shadowsocks",
                "tag": tag,
                "method": non_empty(&node.method).unwrap_or_default(),
                "password": password,
                "detour": &detour
            });
            let mut shadowtls = json!({
                "type": descriptor.singbox_type,
                "tag": detour,
                "server": node.server,
                "server_port": node.port,
                "version": node.shadowtls_version.unwrap_or(3),
                "password": non_empty(&node.shadowtls_password).unwrap_or_default()
            });
            insert_opt(&mut shadowtls, "tls", tls_object(node, true));
            return vec![shadowsocks, shadowtls];
        }
        ProxyType::Hysteria => {
            outbound["auth_str"] = json!(password);
            outbound["up_mbps"] = json!(node.up_mbps.unwrap_or_default());
            outbound["down_mbps"] = json!(node.down_mbps.unwrap_or_default());
            if let Some(obfs) = non_empty(&node.obfs) {
                outbound["obfs"] = json!(obfs);
            }
            insert_opt(&mut outbound, "tls", tls_object(node, true));
        }
        ProxyType::Hysteria2 => {
            outbound["password"] = json!(password);
            if let Some(up) = node.up_mbps {
                outbound["up_mbps"] = json!(up);
            }
            if let Some(down) = node.down_mbps {
                outbound["down_mbps"] = json!(down);
            }
            if let Some(obfs) = non_empty(&node.obfs) {
                outbound["obfs"] = json!({
                    "type": obfs,
                    "password": non_empty(&node.obfs_password).unwrap_or_default()
                });
            }
            if schema == SingBoxSchema::Current {
                if let Some(ports) = non_empty(&node.ports) {
                    outbound["server_ports"] = json!(server_ports(ports));
                }
            }
            insert_opt(&mut outbound, "tls", tls_object(node, true));
        }
        ProxyType::Unknown => return Vec::new(),
    }
    vec![outbound]
}

fn group_to_outbound(group: &ProxyGroupConfig) -> Value {
    let members = if group.proxies.is_empty() {
        vec![DIRECT_TAG.to_string()]
    } else {
        group.proxies.clone()
    };
    match group.group_type {
        ProxyGroupType::Select => json!({
            "type": group.group_type.singbox_type(),
            "tag": group.name,
            "outbounds": members
        }),
        ProxyGroupType::URLTest => json!({
            "type": group.group_type.singbox_type(),
            "tag": group.name,
            "outbounds": members,
            "url": group.url,
            "interval": format!("{}s", group.interval),
            "tolerance": group.tolerance
        }),
    }
}

fn dns_section(schema: SingBoxSchema, selector: &str) -> Value {
    match schema {
        SingBoxSchema::Current => json!({
            "servers": [
                {
                    "type": "https",
                    "tag": REMOTE_DNS_TAG,
                    "server": "1.1.1.1",
                    "detour": selector
                },
                { "type": "local", "tag": LOCAL_DNS_TAG }
            ],
            "final": REMOTE_DNS_TAG
        }),
        SingBoxSchema::Legacy => json!({
            "servers": [
                {
                    "tag": REMOTE_DNS_TAG,
                    "address": "https://1.1.1.1/dns-query",
                    "detour": selector
                },
                { "tag": LOCAL_DNS_TAG, "address": "local", "detour": DIRECT_TAG }
            ],
            "rules": [{ "outbound": "any", "server": LOCAL_DNS_TAG }],
            "final": REMOTE_DNS_TAG
        }),
    }
}

fn inbounds_section(schema: SingBoxSchema) -> Value {
    match schema {
        SingBoxSchema::Current => json!([
            {
                "type": "tun",
                "tag": "tun-in",
                "address": ["172.19.0.1/30", "fdfe:dcba:9876::1/126"],
                "auto_route": true,
                "strict_route": true,
                "stack": "mixed"
            },
            {
                "type": "mixed",
                "tag": "mixed-in",
                "listen": "127.0.0.1",
                "listen_port": MIXED_PORT
            }
        ]),
        SingBoxSchema::Legacy => json!([
            {
                "type": "tun",
                "tag": "tun-in",
                "inet4_address": "172.19.0.1/30",
                "inet6_address": "fdfe:dcba:9876::1/126",
                "auto_route": true,
                "strict_route": true,
                "stack": "mixed",
                "sniff": true
            },
            {
                "type": "mixed",
                "tag": "mixed-in",
                "listen": "127.0.0.1",
                "listen_port": MIXED_PORT,
                "sniff": true
            }
        ]),
    }
}

fn route_section(schema: SingBoxSchema, selector: &str) -> Value {
    match schema {
        SingBoxSchema::Current => json!({
            "rules": [
                { "action": "sniff" },
                { "protocol": "dns", "action": "hijack-dns" },
                { "ip_is_private": true, "outbound": DIRECT_TAG }
            ],
            "final": selector,
            "auto_detect_interface": true,
            "default_domain_resolver": LOCAL_DNS_TAG
        }),
        SingBoxSchema::Legacy => json!({
            "rules": [
                { "protocol": "dns", "outbound": DNS_OUT_TAG },
                { "ip_is_private": true, "outbound": DIRECT_TAG }
            ],
            "final": selector,
            "auto_detect_interface": true
        }),
    }
}

/// Build the complete sing-box document.
pub fn build_singbox_config(ctx: &RenderContext, schema: SingBoxSchema) -> Value {
    let groups = ctx.groups();
    let selector = ctx.settings.render.selector_group_name.as_str();

    let mut builtins = vec![json!({ "type": "direct", "tag": DIRECT_TAG })];
    if schema == SingBoxSchema::Legacy {
        builtins.push(json!({ "type": "block", "tag": BLOCK_TAG }));
        builtins.push(json!({ "type": "dns", "tag": DNS_OUT_TAG }));
    }

    let mut taken: HashSet<String> = groups.iter().map(|g| g.name.clone()).collect();
    taken.extend(ctx.nodes.iter().map(|n| n.remark.clone()));
    taken.extend(builtins.iter().filter_map(|o| o["tag"].as_str().map(str::to_string)));

    let mut outbounds: Vec<Value> = groups.iter().map(group_to_outbound).collect();
    for node in ctx.nodes {
        outbounds.extend(proxy_to_outbounds(node, schema, &mut taken));
    }
    outbounds.extend(builtins);

    json!({
        "log": { "level": "info", "timestamp": true },
        "dns": dns_section(schema, selector),
        "inbounds": inbounds_section(schema),
        "outbounds": outbounds,
        "route": route_section(schema, selector)
    })
}

fn render(ctx: &RenderContext, schema: SingBoxSchema) -> String {
    let config = build_singbox_config(ctx, schema);
    match serde_json::to_string_pretty(&config) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize sing-box document: {}", e);
            r#"{"outbounds":[{"type":"direct","tag":"direct"}]}"#.to_string()
        }
    }
}

/// Render the `singbox` document.
pub fn proxy_to_singbox(ctx: &RenderContext) -> String {
    render(ctx, SingBoxSchema::Current)
}

/// Render the `singbox-legacy` document.
pub fn proxy_to_singbox_legacy(ctx: &RenderContext) -> String {
    render(ctx, SingBoxSchema::Legacy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hysteria2() -> ProxyNode {
        ProxyNode {
            id: "h".to_string(),
            protocol: ProxyType::Hysteria2,
            server: "hy.example.com".to_string(),
            port: 443,
            remark: "hy2".to_string(),
            password: Some("pw".to_string()),
            obfs: Some("salamander".to_string()),
            obfs_password: Some("obfs-pw".to_string()),
            ports: Some("20000-30000,40000".to_string()),
            sni: Some("hy.example.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_server_ports() {
        assert_eq!(
            server_ports("20000-30000, 40000"),
            vec!["20000:30000".to_string(), "40000:40000".to_string()]
        );
    }

    #[test]
    fn test_hysteria2_port_hopping_only_in_current_schema() {
        let current = proxy_to_outbounds(&hysteria2(), SingBoxSchema::Current, &mut HashSet::new());
        assert_eq!(current[0]["server_ports"][0], "20000:30000");
        assert_eq!(current[0]["obfs"]["type"], "salamander");
        assert_eq!(current[0]["tls"]["server_name"], "hy.example.com");

        let legacy = proxy_to_outbounds(&hysteria2(), SingBoxSchema::Legacy, &mut HashSet::new());
        assert!(legacy[0].get("server_ports").is_none());
    }

    #[test]
    fn test_shadowtls_detours() {
        let node = ProxyNode {
            protocol: ProxyType::ShadowTls,
            server: "stls.example.com".to_string(),
            port: 443,
            remark: "stls".to_string(),
            method: Some("2022-blake3-aes-128-gcm".to_string()),
            password: Some("ss-pw".to_string()),
            shadowtls_password: Some("stls-pw".to_string()),
            sni: Some("www.apple.com".to_string()),
            ..Default::default()
        };
        let outbounds = proxy_to_outbounds(&node, SingBoxSchema::Current, &mut HashSet::new());
        assert_eq!(outbounds.len(), 2);
        assert_eq!(outbounds[0]["type"], "shadowsocks");
        assert_eq!(outbounds[0]["detour"], "stls shadowtls");
        assert!(outbounds[0].get("server").is_none());
        assert_eq!(outbounds[1]["type"], "shadowtls");
        assert_eq!(outbounds[1]["version"], 3);
        assert_eq!(outbounds[1]["tls"]["server_name"], "www.apple.com");

        let mut taken: HashSet<String> = ["stls shadowtls".to_string()].into();
        let outbounds = proxy_to_outbounds(&node, SingBoxSchema::Current, &mut taken);
        assert_eq!(outbounds[0]["detour"], "stls shadowtls 2");
        assert_eq!(outbounds[1]["tag"], "stls shadowtls 2");
        assert!(taken.contains("stls shadowtls 2"));
    }

    #[test]
    fn test_vmess_ws_transport() {
        let node = ProxyNode {
            protocol: ProxyType::VMess,
            server: "vm.example.com".to_string(),
            port: 80,
            remark: "vm".to_string(),
            uuid: Some("b831381d-6324-4d53-ad4f-8cda48b30811".to_string()),
            network: Some("ws".to_string()),
            path: Some("/ws".to_string()),
            host: Some("cdn.example.com".to_string()),
            ..Default::default()
        };
        let outbound = &proxy_to_outbounds(&node, SingBoxSchema::Current, &mut HashSet::new())[0];
        assert_eq!(outbound["transport"]["type"], "ws");
        assert_eq!(outbound["transport"]["headers"]["Host"], "cdn.example.com");
        assert!(outbound.get("tls").is_none());
        assert_eq!(outbound["security"], "auto");
    }
}

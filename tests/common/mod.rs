#![allow(dead_code)]

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use subpage::models::{ProxyNode, ProxyType, Subscription};

pub const NOW: i64 = 1_700_000_000;

pub fn subscription() -> Subscription {
    Subscription {
        short_id: "abc123".to_string(),
        username: "alice".to_string(),
        used_traffic: 500_000_000,
        traffic_limit: 10_000_000_000,
        expires_at: Some(NOW + 86_400),
        enabled: true,
    }
}

pub fn vmess(id: &str, remark: &str) -> ProxyNode {
    ProxyNode {
        id: id.to_string(),
        protocol: ProxyType::VMess,
        server: format!("{}.example.com", id),
        port: 443,
        remark: remark.to_string(),
        uuid: Some("b831381d-6324-4d53-ad4f-8cda48b30811".to_string()),
        network: Some("ws".to_string()),
        path: Some("/ray".to_string()),
        security: Some("tls".to_string()),
        sni: Some(format!("{}.example.com", id)),
        ..Default::default()
    }
}

pub fn trojan(id: &str, remark: &str) -> ProxyNode {
    ProxyNode {
        id: id.to_string(),
        protocol: ProxyType::Trojan,
        server: format!("{}.example.com", id),
        port: 443,
        remark: remark.to_string(),
        password: Some("trojan-secret".to_string()),
        security: Some("tls".to_string()),
        ..Default::default()
    }
}

pub fn shadowsocks(id: &str, remark: &str) -> ProxyNode {
    ProxyNode {
        id: id.to_string(),
        protocol: ProxyType::Shadowsocks,
        server: format!("{}.example.com", id),
        port: 8388,
        remark: remark.to_string(),
        method: Some("aes-256-gcm".to_string()),
        password: Some("ss-secret".to_string()),
        ..Default::default()
    }
}

pub fn vless(id: &str, remark: &str) -> ProxyNode {
    ProxyNode {
        id: id.to_string(),
        protocol: ProxyType::Vless,
        server: format!("{}.example.com", id),
        port: 443,
        remark: remark.to_string(),
        uuid: Some("9d2e6a1c-40b4-4c55-a1b0-1fd5b7bb1f3e".to_string()),
        network: Some("tcp".to_string()),
        flow: Some("xtls-rprx-vision".to_string()),
        security: Some("reality".to_string()),
        sni: Some("www.example.org".to_string()),
        public_key: Some("jNXHt1yRo0vDuchQlIP6Z0ZvjT3KtzVI-T4E7RoLJS0".to_string()),
        short_id: Some("6ba85179e30d4fc2".to_string()),
        fingerprint: Some("chrome".to_string()),
        ..Default::default()
    }
}

pub fn hysteria2(id: &str, remark: &str) -> ProxyNode {
    ProxyNode {
        id: id.to_string(),
        protocol: ProxyType::Hysteria2,
        server: format!("{}.example.com", id),
        port: 443,
        remark: remark.to_string(),
        password: Some("hy2-secret".to_string()),
        sni: Some(format!("{}.example.com", id)),
        ..Default::default()
    }
}

pub fn shadowtls(id: &str, remark: &str) -> ProxyNode {
    ProxyNode {
        id: id.to_string(),
        protocol: ProxyType::ShadowTls,
        server: format!("{}.example.com", id),
        port: 443,
        remark: remark.to_string(),
        method: Some("2022-blake3-aes-128-gcm".to_string()),
        password: Some("c3MtMjAyMi1zZWNyZXQtMTI=".to_string()),
        shadowtls_password: Some("stls-secret".to_string()),
        shadowtls_version: Some(3),
        sni: Some("www.apple.com".to_string()),
        ..Default::default()
    }
}

pub fn hysteria(id: &str, remark: &str) -> ProxyNode {
    ProxyNode {
        id: id.to_string(),
        protocol: ProxyType::Hysteria,
        server: format!("{}.example.com", id),
        port: 443,
        remark: remark.to_string(),
        password: Some("hy-secret".to_string()),
        up_mbps: Some(50),
        down_mbps: Some(200),
        sni: Some(format!("{}.example.com", id)),
        ..Default::default()
    }
}

/// One node per protocol, two region tags.
pub fn mixed_nodes() -> Vec<ProxyNode> {
    let mut nodes = vec![
        vmess("m1", "Frankfurt"),
        vless("m2", "Amsterdam"),
        trojan("m3", "Tokyo"),
        shadowsocks("m4", "Seoul"),
        shadowtls("m5", "Osaka"),
        hysteria("m6", "Warsaw"),
        hysteria2("m7", "Singapore"),
    ];
    for (node, region) in nodes
        .iter_mut()
        .zip(["Europe", "Europe", "Asia", "Asia", "Asia", "Europe", "Asia"])
    {
        node.group = Some(region.to_string());
    }
    nodes
}

/// Nodes every client format can load.
pub fn portable_nodes() -> Vec<ProxyNode> {
    vec![
        vmess("n1", "Frankfurt"),
        trojan("n2", "Amsterdam"),
        shadowsocks("n3", "Tokyo"),
    ]
}

/// Decodes a base64-wrapped URI list into its lines.
pub fn generic_lines(body: &str) -> Vec<String> {
    let decoded = STANDARD.decode(body.trim()).expect("generic body is base64");
    let text = String::from_utf8(decoded).expect("generic body is utf-8");
    text.lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

const SINGBOX_SCAFFOLD: &[&str] = &["selector", "urltest", "direct", "block", "dns", "shadowtls"];

/// Node outbounds of a sing-box document, without groups and built-ins.
pub fn singbox_nodes(doc: &Value) -> Vec<Value> {
    doc["outbounds"]
        .as_array()
        .expect("outbounds is an array")
        .iter()
        .filter(|o| !SINGBOX_SCAFFOLD.contains(&o["type"].as_str().unwrap_or_default()))
        .cloned()
        .collect()
}

/// Every outbound tag of a sing-box document, in order.
pub fn singbox_tags(doc: &Value) -> Vec<String> {
    doc["outbounds"]
        .as_array()
        .expect("outbounds is an array")
        .iter()
        .map(|o| o["tag"].as_str().expect("outbound has a tag").to_string())
        .collect()
}

/// Asserts that outbound tags are unique and every reference resolves.
pub fn assert_singbox_references(doc: &Value) {
    let tags = singbox_tags(doc);
    let unique: HashSet<&String> = tags.iter().collect();
    assert_eq!(unique.len(), tags.len(), "duplicate outbound tags: {:?}", tags);

    for outbound in doc["outbounds"].as_array().unwrap() {
        if let Some(detour) = outbound["detour"].as_str() {
            assert!(tags.iter().any(|t| t == detour), "dangling detour {}", detour);
        }
        for member in outbound["outbounds"].as_array().into_iter().flatten() {
            let member = member.as_str().unwrap();
            assert!(tags.iter().any(|t| t == member), "dangling member {}", member);
        }
    }
}

fn yaml_names(seq: &serde_yaml::Value) -> Vec<String> {
    seq.as_sequence()
        .expect("sequence")
        .iter()
        .map(|item| item["name"].as_str().expect("entry has a name").to_string())
        .collect()
}

/// Asserts that proxy and group names of a Clash document share no name,
/// that no group shadows a built-in policy and that every member resolves.
pub fn assert_clash_references(doc: &serde_yaml::Value) {
    let proxies = yaml_names(&doc["proxies"]);
    let groups = yaml_names(&doc["proxy-groups"]);
    let mut all: Vec<&String> = proxies.iter().chain(groups.iter()).collect();
    let total = all.len();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), total, "duplicate names: {:?} / {:?}", proxies, groups);
    for builtin in ["DIRECT", "REJECT"] {
        assert!(!all.iter().any(|n| n.as_str() == builtin), "{} redefined", builtin);
    }

    for group in doc["proxy-groups"].as_sequence().unwrap() {
        for member in group["proxies"].as_sequence().unwrap() {
            let member = member.as_str().unwrap();
            assert!(
                member == "DIRECT" || all.iter().any(|n| n.as_str() == member),
                "dangling member {}",
                member
            );
        }
    }
}

/// Number of nodes a rendered document carries, parsed with its own grammar.
pub fn node_count(token: &str, body: &str) -> usize {
    match token {
        "generic" => generic_lines(body).len(),
        "clash" | "mihomo" | "stash" => {
            let doc: serde_yaml::Value = serde_yaml::from_str(body).expect("valid yaml");
            assert!(doc["proxy-groups"].is_sequence(), "proxy-groups missing");
            doc["proxies"].as_sequence().expect("proxies present").len()
        }
        "singbox" | "singbox-legacy" => {
            let doc: Value = serde_json::from_str(body).expect("valid json");
            assert!(doc["route"].is_object(), "route missing");
            assert!(doc["inbounds"].is_array(), "inbounds missing");
            singbox_nodes(&doc).len()
        }
        "v2ray-json" => {
            let doc: Value = serde_json::from_str(body).expect("valid json");
            doc.as_array().expect("array of configs").len()
        }
        other => panic!("unexpected token {}", other),
    }
}

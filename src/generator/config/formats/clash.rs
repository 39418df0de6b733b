use serde_yaml::Value;

use crate::generator::yaml::clash::{
    ClashOpts, ClashProxy, ClashProxyGroup, ClashYamlOutput, CommonProxyOptions,
    CommonProxyOptionsBuilder,
};
use crate::generator::RenderContext;
use crate::models::{non_empty, ProxyGroupConfigs, ProxyGroupType, ProxyNode, ProxyType};

const DIRECT: &str = "DIRECT";

/// Client flavour of the Clash YAML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClashDialect {
    /// Clash Premium
    Clash,
    /// Clash.Meta
    Mihomo,
    Stash,
}

fn opts<'a, I>(pairs: I) -> ClashOpts
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn string(value: &str) -> Value {
    Value::String(value.to_string())
}

fn headers(host: Option<&str>, as_list: bool) -> Option<(&'static str, Value)> {
    let host = host?;
    let value = if as_list {
        Value::Sequence(vec![string(host)])
    } else {
        string(host)
    };
    let mut map = serde_yaml::Mapping::new();
    map.insert(string("Host"), value);
    Some(("headers", Value::Mapping(map)))
}

/// Transport settings shared by VMess, VLESS and Trojan.
#[derive(Default)]
struct Transport {
    network: Option<String>,
    ws_opts: Option<ClashOpts>,
    http_opts: Option<ClashOpts>,
    grpc_opts: Option<ClashOpts>,
}

fn transport(node: &ProxyNode, dialect: ClashDialect) -> Option<Transport> {
    let path = non_empty(&node.path).unwrap_or("/");
    let host = non_empty(&node.host);
    let network = node.network_or_tcp();
    let transport = match network {
        "tcp" => Transport::default(),
        "ws" => Transport {
            network: Some("ws".to_string()),
            ws_opts: Some(opts(
                [Some(("path", string(path))), headers(host, false)]
                    .into_iter()
                    .flatten(),
            )),
            ..Default::default()
        },
        "httpupgrade" if dialect == ClashDialect::Mihomo => Transport {
            network: Some("ws".to_string()),
            ws_opts: Some(opts(
                [
                    Some(("path", string(path))),
                    headers(host, false),
                    Some(("v2ray-http-upgrade", Value::Bool(true))),
                ]
                .into_iter()
                .flatten(),
            )),
            ..Default::default()
        },
        "grpc" => Transport {
            network: Some("grpc".to_string()),
            grpc_opts: Some(opts([(
                "grpc-service-name",
                string(non_empty(&node.service_name).unwrap_or_default()),
            )])),
            ..Default::default()
        },
        "http" => Transport {
            network: Some("http".to_string()),
            http_opts: Some(opts(
                [
                    Some(("path", Value::Sequence(vec![string(path)]))),
                    headers(host, true),
                ]
                .into_iter()
                .flatten(),
            )),
            ..Default::default()
        },
        _ => return None,
    };
    Some(transport)
}

fn common(node: &ProxyNode, dialect: ClashDialect, tls: bool) -> CommonProxyOptionsBuilder {
    let mut builder = CommonProxyOptions::builder(node.remark.clone(), node.server.clone(), node.port)
        .udp(node.udp.unwrap_or(true));
    if tls {
        builder = builder
            .skip_cert_verify(node.allow_insecure)
            .alpn(&node.alpn);
        if dialect == ClashDialect::Mihomo {
            builder = builder.client_fingerprint(non_empty(&node.fingerprint));
        }
    }
    builder
}

fn mbps(value: Option<u32>) -> Option<String> {
    value.filter(|v| *v > 0).map(|v| format!("{} Mbps", v))
}

/// Convert a node to its Clash proxy entry for the given dialect.
///
/// Returns `None` when the dialect has no way to express the node.
pub fn proxy_to_clash(node: &ProxyNode, dialect: ClashDialect) -> Option<ClashProxy> {
    let password = non_empty(&node.password).unwrap_or_default().to_string();
    let sni = node.server_name().map(str::to_string);

    let proxy = match node.protocol {
        ProxyType::Shadowsocks => ClashProxy::Shadowsocks {
            common: common(node, dialect, false).build(),
            cipher: non_empty(&node.method)?.to_string(),
            password,
            plugin: None,
            plugin_opts: None,
        },
        ProxyType::ShadowTls if dialect == ClashDialect::Mihomo => {
            let mut plugin_opts = opts([
                ("host", string(node.server_name()?)),
                (
                    "password",
                    string(non_empty(&node.shadowtls_password).unwrap_or_default()),
                ),
                (
                    "version",
                    Value::Number(node.shadowtls_version.unwrap_or(3).into()),
                ),
            ]);
            if let Some(fp) = non_empty(&node.fingerprint) {
                plugin_opts.insert("fingerprint".to_string(), string(fp));
            }
            ClashProxy::Shadowsocks {
                common: common(node, dialect, false).build(),
                cipher: non_empty(&node.method)?.to_string(),
                password,
                plugin: Some("shadow-tls".to_string()),
                plugin_opts: Some(plugin_opts),
            }
        }
        ProxyType::VMess => {
            let t = transport(node, dialect)?;
            let tls = node.tls_enabled();
            ClashProxy::VMess {
                common: common(node, dialect, tls).tls(tls).build(),
                uuid: non_empty(&node.uuid)?.to_string(),
                alter_id: node.alter_id,
                cipher: non_empty(&node.method).unwrap_or("auto").to_string(),
                network: t.network,
                servername: if tls { sni } else { None },
                ws_opts: t.ws_opts,
                http_opts: t.http_opts,
                grpc_opts: t.grpc_opts,
            }
        }
        ProxyType::Vless => {
            let t = transport(node, dialect)?;
            let tls = node.tls_enabled();
            let mut builder = common(node, dialect, tls).tls(tls);
            if node.is_reality() {
                builder = builder.client_fingerprint(Some(
                    non_empty(&node.fingerprint).unwrap_or("chrome"),
                ));
            }
            let reality_opts = node.is_reality().then(|| {
                opts([
                    (
                        "public-key",
                        string(non_empty(&node.public_key).unwrap_or_default()),
                    ),
                    (
                        "short-id",
                        string(non_empty(&node.short_id).unwrap_or_default()),
                    ),
                ])
            });
            ClashProxy::Vless {
                common: builder.build(),
                uuid: non_empty(&node.uuid)?.to_string(),
                flow: non_empty(&node.flow).map(str::to_string),
                network: t.network,
                servername: if tls { sni } else { None },
                reality_opts,
                ws_opts: t.ws_opts,
                http_opts: t.http_opts,
                grpc_opts: t.grpc_opts,
            }
        }
        ProxyType::Trojan => {
            let t = transport(node, dialect)?;
            ClashProxy::Trojan {
                common: common(node, dialect, true).sni(sni.as_deref()).build(),
                password,
                network: t.network,
                ws_opts: t.ws_opts,
                grpc_opts: t.grpc_opts,
            }
        }
        ProxyType::Hysteria => {
            let stash = dialect == ClashDialect::Stash;
            ClashProxy::Hysteria {
                common: common(node, dialect, true).sni(sni.as_deref()).build(),
                auth_str: (!stash).then(|| password.clone()),
                auth: stash.then_some(password),
                up: if stash { None } else { mbps(node.up_mbps) },
                down: if stash { None } else { mbps(node.down_mbps) },
                up_speed: if stash { node.up_mbps } else { None },
                down_speed: if stash { node.down_mbps } else { None },
                obfs: non_empty(&node.obfs).map(str::to_string),
                ports: non_empty(&node.ports).map(str::to_string),
                protocol: Some("udp".to_string()),
            }
        }
        ProxyType::Hysteria2 => {
            let stash = dialect == ClashDialect::Stash;
            ClashProxy::Hysteria2 {
                common: common(node, dialect, true).sni(sni.as_deref()).build(),
                password: (!stash).then(|| password.clone()),
                auth: stash.then_some(password),
                ports: if stash {
                    None
                } else {
                    non_empty(&node.ports).map(str::to_string)
                },
                up: if stash { None } else { mbps(node.up_mbps) },
                down: if stash { None } else { mbps(node.down_mbps) },
                up_speed: if stash { node.up_mbps } else { None },
                down_speed: if stash { node.down_mbps } else { None },
                obfs: non_empty(&node.obfs).map(str::to_string),
                obfs_password: non_empty(&node.obfs_password).map(str::to_string),
            }
        }
        _ => return None,
    };
    Some(proxy)
}

fn groups_to_clash(groups: ProxyGroupConfigs) -> Vec<ClashProxyGroup> {
    groups
        .into_iter()
        .map(|group| {
            let proxies = if group.proxies.is_empty() {
                vec![DIRECT.to_string()]
            } else {
                group.proxies
            };
            match group.group_type {
                ProxyGroupType::Select => ClashProxyGroup::Select {
                    name: group.name,
                    proxies,
                },
                ProxyGroupType::URLTest => ClashProxyGroup::UrlTest {
                    name: group.name,
                    proxies,
                    url: group.url,
                    interval: Some(group.interval),
                    tolerance: Some(group.tolerance),
                },
            }
        })
        .collect()
}

/// Build the Clash document structure for a dialect.
pub fn build_clash_config(ctx: &RenderContext, dialect: ClashDialect) -> ClashYamlOutput {
    let render = &ctx.settings.render;

    let mut proxies = Vec::with_capacity(ctx.nodes.len());
    let mut visible = Vec::with_capacity(ctx.nodes.len());
    for node in ctx.nodes {
        match proxy_to_clash(node, dialect) {
            Some(proxy) => {
                proxies.push(proxy);
                visible.push(node.clone());
            }
            None => log::debug!("Skipping node '{}': not expressible for {:?}", node.id, dialect),
        }
    }

    let groups = crate::generator::generate_groups(&visible, render);

    ClashYamlOutput {
        mixed_port: (dialect != ClashDialect::Stash).then_some(render.clash_mixed_port),
        proxies,
        proxy_groups: groups_to_clash(groups),
        rules: vec![format!("MATCH,{}", render.selector_group_name)],
        ..Default::default()
    }
}

fn render(ctx: &RenderContext, dialect: ClashDialect) -> String {
    let config = build_clash_config(ctx, dialect);
    match serde_yaml::to_string(&config) {
        Ok(yaml) => yaml,
        Err(e) => {
            log::error!("Failed to serialize {:?} document: {}", dialect, e);
            format!(
                "proxies: []\nproxy-groups:\n- name: {}\n  type: select\n  proxies:\n  - {}\n",
                ctx.settings.render.selector_group_name, DIRECT
            )
        }
    }
}

/// Render the `clash` document.
pub fn proxy_to_clash_yaml(ctx: &RenderContext) -> String {
    render(ctx, ClashDialect::Clash)
}

/// Render the `mihomo` document.
pub fn proxy_to_mihomo_yaml(ctx: &RenderContext) -> String {
    render(ctx, ClashDialect::Mihomo)
}

/// Render the `stash` document.
pub fn proxy_to_stash_yaml(ctx: &RenderContext) -> String {
    render(ctx, ClashDialect::Stash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_yaml(proxy: &ClashProxy) -> serde_yaml::Value {
        serde_yaml::to_value(proxy).unwrap()
    }

    fn hysteria2() -> ProxyNode {
        ProxyNode {
            protocol: ProxyType::Hysteria2,
            server: "hy.example.com".to_string(),
            port: 443,
            remark: "hy2".to_string(),
            password: Some("pw".to_string()),
            up_mbps: Some(50),
            down_mbps: Some(200),
            ports: Some("20000-30000".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_hysteria2_dialects() {
        let mihomo = to_yaml(&proxy_to_clash(&hysteria2(), ClashDialect::Mihomo).unwrap());
        assert_eq!(mihomo["type"], "hysteria2");
        assert_eq!(mihomo["password"], "pw");
        assert_eq!(mihomo["up"], "50 Mbps");
        assert_eq!(mihomo["ports"], "20000-30000");

        let stash = to_yaml(&proxy_to_clash(&hysteria2(), ClashDialect::Stash).unwrap());
        assert_eq!(stash["auth"], "pw");
        assert_eq!(stash["up-speed"], 50);
        assert!(stash.get("password").is_none());
    }

    #[test]
    fn test_vless_reality_opts() {
        let node = ProxyNode {
            protocol: ProxyType::Vless,
            server: "r.example.com".to_string(),
            port: 443,
            remark: "r".to_string(),
            uuid: Some("b831381d-6324-4d53-ad4f-8cda48b30811".to_string()),
            network: Some("tcp".to_string()),
            security: Some("reality".to_string()),
            sni: Some("www.microsoft.com".to_string()),
            public_key: Some("pbk".to_string()),
            short_id: Some("ab".to_string()),
            ..Default::default()
        };
        let value = to_yaml(&proxy_to_clash(&node, ClashDialect::Mihomo).unwrap());
        assert_eq!(value["servername"], "www.microsoft.com");
        assert_eq!(value["tls"], true);
        assert_eq!(value["client-fingerprint"], "chrome");
        assert_eq!(value["reality-opts"]["public-key"], "pbk");
    }

    #[test]
    fn test_shadowtls_only_in_mihomo() {
        let node = ProxyNode {
            protocol: ProxyType::ShadowTls,
            server: "s.example.com".to_string(),
            port: 443,
            remark: "stls".to_string(),
            method: Some("aes-128-gcm".to_string()),
            password: Some("pw".to_string()),
            shadowtls_password: Some("stls-pw".to_string()),
            sni: Some("www.apple.com".to_string()),
            ..Default::default()
        };
        let value = to_yaml(&proxy_to_clash(&node, ClashDialect::Mihomo).unwrap());
        assert_eq!(value["type"], "ss");
        assert_eq!(value["plugin"], "shadow-tls");
        assert_eq!(value["plugin-opts"]["host"], "www.apple.com");
        assert_eq!(value["plugin-opts"]["version"], 3);
        assert!(proxy_to_clash(&node, ClashDialect::Stash).is_none());
    }

    #[test]
    fn test_ws_opts() {
        let node = ProxyNode {
            protocol: ProxyType::VMess,
            server: "vm.example.com".to_string(),
            port: 443,
            remark: "vm".to_string(),
            uuid: Some("b831381d-6324-4d53-ad4f-8cda48b30811".to_string()),
            network: Some("ws".to_string()),
            path: Some("/ray".to_string()),
            host: Some("cdn.example.com".to_string()),
            security: Some("tls".to_string()),
            ..Default::default()
        };
        let value = to_yaml(&proxy_to_clash(&node, ClashDialect::Clash).unwrap());
        assert_eq!(value["network"], "ws");
        assert_eq!(value["ws-opts"]["path"], "/ray");
        assert_eq!(value["ws-opts"]["headers"]["Host"], "cdn.example.com");
        assert_eq!(value["servername"], "cdn.example.com");
        assert_eq!(value["alterId"], 0);
    }

    #[test]
    fn test_httpupgrade_needs_mihomo() {
        let node = ProxyNode {
            protocol: ProxyType::VMess,
            server: "vm.example.com".to_string(),
            port: 80,
            remark: "vm".to_string(),
            uuid: Some("b831381d-6324-4d53-ad4f-8cda48b30811".to_string()),
            network: Some("httpupgrade".to_string()),
            ..Default::default()
        };
        assert!(proxy_to_clash(&node, ClashDialect::Clash).is_none());
        let value = to_yaml(&proxy_to_clash(&node, ClashDialect::Mihomo).unwrap());
        assert_eq!(value["ws-opts"]["v2ray-http-upgrade"], true);
    }
}

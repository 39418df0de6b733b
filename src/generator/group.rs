//! Group generation utilities
//!
//! Builds the format-independent proxy group layout shared by the Clash
//! family and the sing-box renderers.

use crate::models::{ProxyGroupConfig, ProxyGroupConfigs, ProxyGroupType, ProxyNode};
use crate::settings::RenderSettings;

const URL_TEST_TOLERANCE: u32 = 50;

/// Policy and outbound names the client formats define on their own.
pub const BUILTIN_NAMES: &[&str] = &["DIRECT", "REJECT", "direct", "block", "dns-out"];

/// Names neither a node label nor a region group may take: the generated
/// selector and auto groups plus the built-in outbounds.
pub fn reserved_names(render: &RenderSettings) -> Vec<String> {
    let mut names = vec![
        render.selector_group_name.clone(),
        render.auto_group_name.clone(),
    ];
    names.extend(BUILTIN_NAMES.iter().map(|s| s.to_string()));
    names
}

/// Generates the proxy groups for a visible node list.
///
/// The first group is always the selector. When there are nodes it lists the
/// auto group, then the region groups, then every node; with no nodes its
/// member list is empty and the renderer substitutes its direct outbound.
pub fn generate_groups(nodes: &[ProxyNode], render: &RenderSettings) -> ProxyGroupConfigs {
    let node_names: Vec<String> = nodes.iter().map(|n| n.remark.clone()).collect();

    let mut selector = ProxyGroupConfig::new(
        render.selector_group_name.clone(),
        ProxyGroupType::Select,
    );
    let mut groups = Vec::new();

    if nodes.is_empty() {
        groups.push(selector);
        return groups;
    }

    let mut auto = ProxyGroupConfig::new(render.auto_group_name.clone(), ProxyGroupType::URLTest);
    auto.proxies = node_names.clone();
    auto.url = render.test_url.clone();
    auto.interval = render.test_interval;
    auto.tolerance = URL_TEST_TOLERANCE;
    selector.proxies.push(auto.name.clone());

    let regions = if render.region_groups {
        region_groups(nodes, render)
    } else {
        Vec::new()
    };
    selector
        .proxies
        .extend(regions.iter().map(|group| group.name.clone()));
    selector.proxies.extend(node_names);

    groups.push(selector);
    groups.push(auto);
    groups.extend(regions);
    groups
}

/// One selector per group tag, in first-seen order.
fn region_groups(nodes: &[ProxyNode], render: &RenderSettings) -> ProxyGroupConfigs {
    let reserved = reserved_names(render);
    let mut regions: ProxyGroupConfigs = Vec::new();
    for node in nodes {
        let Some(tag) = node.group.as_deref() else {
            continue;
        };
        if reserved.iter().any(|name| name == tag) {
            log::debug!("Group tag '{}' collides with a built-in name, skipping", tag);
            continue;
        }
        match regions.iter_mut().find(|group| group.name == tag) {
            Some(group) => group.proxies.push(node.remark.clone()),
            None => {
                let mut group = ProxyGroupConfig::new(tag.to_string(), ProxyGroupType::Select);
                group.proxies.push(node.remark.clone());
                regions.push(group);
            }
        }
    }
    regions
}

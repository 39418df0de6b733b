//! Shared pre-render pipeline
//!
//! Every renderer works from the output of [`prepare`], which filters,
//! labels and orders the raw panel nodes so that the same input always
//! produces the same visible node sequence.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::debug;

use crate::models::{ProxyNode, Subscription, SubscriptionStatus, UsageSummary};
use crate::registry;

/// Inputs of the pipeline that do not come from the panel.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Unix seconds used for expiry checks
    pub now: i64,
    /// Names node labels must not take, usually the group names
    pub reserved_names: Vec<String>,
}

/// Pipeline result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    /// Visible nodes, in render order, with unique labels
    pub nodes: Vec<ProxyNode>,
    pub summary: UsageSummary,
    pub status: SubscriptionStatus,
}

/// Runs the pre-render pipeline over the raw panel nodes.
pub fn prepare(
    subscription: &Subscription,
    raw_nodes: &[ProxyNode],
    options: &PrepareOptions,
) -> Prepared {
    let summary = subscription.summary();
    let status = subscription.status(options.now);

    if !status.is_active() {
        debug!(
            "Subscription {} is {}, rendering without nodes",
            subscription.short_id,
            status.as_str()
        );
        return Prepared {
            nodes: Vec::new(),
            summary,
            status,
        };
    }

    let mut seen_ids = HashSet::new();
    let mut nodes: Vec<ProxyNode> = Vec::with_capacity(raw_nodes.len());
    for raw in raw_nodes {
        if !raw.enabled {
            continue;
        }
        let mut node = raw.clone();
        registry::retain_known_fields(&mut node);
        if let Err(e) = registry::validate(&node) {
            debug!(
                "Dropping node '{}' ({} {}:{}): {}",
                node.id, node.protocol, node.server, node.port, e
            );
            continue;
        }
        if !seen_ids.insert(raw.id.as_str()) {
            debug!("Dropping node '{}': duplicate identifier", node.id);
            continue;
        }
        nodes.push(resolve_tags(node));
    }

    nodes.sort_by(compare_nodes);

    let mut taken: HashSet<String> = options.reserved_names.iter().cloned().collect();
    taken.extend(nodes.iter().filter_map(|n| n.group.clone()));
    for node in nodes.iter_mut() {
        node.remark = unique_name(&node.remark, &mut taken);
    }

    Prepared {
        nodes,
        summary,
        status,
    }
}

fn resolve_tags(mut node: ProxyNode) -> ProxyNode {
    let remark = node.remark.trim();
    node.remark = if remark.is_empty() {
        format!("{} {}:{}", node.protocol, node.server, node.port)
    } else {
        remark.to_string()
    };
    node.group = node
        .group
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string);
    node
}

/// Priority ascending with missing hints last, then identifier.
fn compare_nodes(a: &ProxyNode, b: &ProxyNode) -> Ordering {
    let priority = match (a.priority, b.priority) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    priority.then_with(|| a.id.cmp(&b.id))
}

/// Returns `base`, or `base 2`, `base 3`, ... if taken, and marks the result taken.
pub(crate) fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut counter = 2;
    while taken.contains(&name) {
        name = format!("{} {}", base, counter);
        counter += 1;
    }
    taken.insert(name.clone());
    name
}

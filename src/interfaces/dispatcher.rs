//! Format dispatcher
//!
//! Resolves a client-type token to its renderer, runs the shared pipeline and
//! attaches the response metadata subscription clients read.

use log::{debug, info};
use thiserror::Error;

use crate::generator::config::formats::{
    proxy_to_clash_yaml, proxy_to_mihomo_yaml, proxy_to_single, proxy_to_singbox,
    proxy_to_singbox_legacy, proxy_to_stash_yaml, proxy_to_v2ray_json,
};
use crate::generator::group::reserved_names;
use crate::generator::{prepare, PrepareOptions, RenderContext};
use crate::models::{ClientFormat, ProxyNode, RenderedOutput, Subscription};
use crate::registry;
use crate::settings::Settings;
use crate::utils::base64::base64_encode;
use crate::utils::unix_now;

/// The only failure that crosses the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unsupported client format '{0}'")]
    UnsupportedFormat(String),
}

pub type RenderFn = fn(&RenderContext) -> String;

/// One renderer per client format.
static RENDERERS: [(ClientFormat, RenderFn); 7] = [
    (ClientFormat::Generic, proxy_to_single),
    (ClientFormat::Stash, proxy_to_stash_yaml),
    (ClientFormat::SingBox, proxy_to_singbox),
    (ClientFormat::SingBoxLegacy, proxy_to_singbox_legacy),
    (ClientFormat::Mihomo, proxy_to_mihomo_yaml),
    (ClientFormat::Clash, proxy_to_clash_yaml),
    (ClientFormat::V2RayJson, proxy_to_v2ray_json),
];

pub fn renderer(format: ClientFormat) -> Option<RenderFn> {
    RENDERERS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, render)| *render)
}

/// Resolve a path token to a registered format.
pub fn resolve(token: &str) -> Result<ClientFormat, DispatchError> {
    ClientFormat::from_token(token)
        .filter(|format| renderer(*format).is_some())
        .ok_or_else(|| DispatchError::UnsupportedFormat(token.to_string()))
}

/// Render using the global settings and the current time.
pub fn dispatch(
    token: &str,
    subscription: &Subscription,
    nodes: &[ProxyNode],
) -> Result<RenderedOutput, DispatchError> {
    let settings = Settings::current();
    dispatch_with(token, subscription, nodes, &settings, unix_now())
}

/// Render with explicit settings and clock.
pub fn dispatch_with(
    token: &str,
    subscription: &Subscription,
    nodes: &[ProxyNode],
    settings: &Settings,
    now: i64,
) -> Result<RenderedOutput, DispatchError> {
    let format = resolve(token)?;
    let render = renderer(format).ok_or_else(|| DispatchError::UnsupportedFormat(token.to_string()))?;

    let prepared = prepare(
        subscription,
        nodes,
        &PrepareOptions {
            now,
            reserved_names: reserved_names(&settings.render),
        },
    );

    let visible: Vec<ProxyNode> = prepared
        .nodes
        .into_iter()
        .filter(|node| {
            let supported = registry::supports_node(node, format);
            if !supported {
                debug!(
                    "Skipping node '{}': {} is not supported by {}",
                    node.id, node.protocol, format
                );
            }
            supported
        })
        .collect();

    let ctx = RenderContext {
        subscription,
        nodes: &visible,
        summary: &prepared.summary,
        settings,
    };
    let body = render(&ctx);

    info!(
        "Rendered {} for subscription {} ({}, {} nodes)",
        format,
        subscription.short_id,
        prepared.status.as_str(),
        visible.len()
    );

    Ok(with_headers(RenderedOutput::new(format, body.into_bytes()), &ctx))
}

fn with_headers(output: RenderedOutput, ctx: &RenderContext) -> RenderedOutput {
    let render = &ctx.settings.render;
    let mut output = output
        .with_header("subscription-userinfo", ctx.summary.to_header_value())
        .with_header("profile-update-interval", render.update_interval_hours.to_string());

    let title = ctx.title();
    if !title.is_empty() {
        output = output.with_header("profile-title", format!("base64:{}", base64_encode(title)));
    }
    let filename: String = ctx
        .subscription
        .username
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let filename = filename.trim();
    if !filename.is_empty() {
        output = output.with_header(
            "content-disposition",
            format!("attachment; filename=\"{}\"", filename),
        );
    }
    let support_url = render.support_url.trim();
    if !support_url.is_empty() && !support_url.chars().any(char::is_control) {
        output = output.with_header("support-url", support_url);
    }
    output
}

//! Document generation
//!
//! [`pipeline`] turns raw panel data into the visible node list, [`group`]
//! lays out the proxy groups and [`config::formats`] holds one renderer per
//! client format.

pub mod config;
pub mod group;
pub mod pipeline;
pub mod yaml;

use crate::models::{ProxyGroupConfigs, ProxyNode, Subscription, UsageSummary};
use crate::settings::Settings;

pub use group::generate_groups;
pub use pipeline::{prepare, PrepareOptions, Prepared};

/// Everything a renderer may read.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub subscription: &'a Subscription,
    /// Visible nodes the format can load, in render order
    pub nodes: &'a [ProxyNode],
    pub summary: &'a UsageSummary,
    pub settings: &'a Settings,
}

impl<'a> RenderContext<'a> {
    pub fn groups(&self) -> ProxyGroupConfigs {
        generate_groups(self.nodes, &self.settings.render)
    }

    /// Profile title, falling back to the username.
    pub fn title(&self) -> &'a str {
        let title = self.settings.render.profile_title.trim();
        if title.is_empty() {
            self.subscription.username.as_str()
        } else {
            title
        }
    }
}

//! Core data models for the application
//!
//! This module contains the canonical data structures the renderers work
//! from, separated from the logic that operates on them.
//!
//! # Usage
//!
//! ```rust
//! use subpage::models::{ProxyNode, ProxyType, Subscription};
//!
//! let mut node = ProxyNode::default();
//! node.protocol = ProxyType::Trojan;
//! node.server = "example.com".to_string();
//! node.port = 443;
//!
//! let subscription = Subscription {
//!     short_id: "abc123".to_string(),
//!     ..Default::default()
//! };
//! assert!(subscription.enabled);
//! ```

pub mod app_state;
pub mod proxy;
pub mod proxy_group_config;
pub mod rendered;
pub mod subscription;
pub mod target;

pub use app_state::AppState;
pub use proxy::*;
pub use proxy_group_config::*;
pub use rendered::RenderedOutput;
pub use subscription::*;
pub use target::{ClientFormat, FormatSupport};

//! Upstream panel collaborator
//!
//! The renderers never touch the network. Handlers ask a
//! [`SubscriptionSource`] for the canonical payload and hand it to the
//! dispatcher.

pub mod panel;

use futures::future::BoxFuture;

use crate::models::CanonicalPayload;

pub use panel::{PanelClient, PanelError};

/// Anything able to supply a subscription and its nodes by short id.
pub trait SubscriptionSource: Send + Sync {
    fn fetch<'a>(&'a self, short_id: &'a str) -> BoxFuture<'a, Result<CanonicalPayload, PanelError>>;
}

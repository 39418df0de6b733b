pub mod api;
pub mod generator;
pub mod interfaces;
pub mod models;
pub mod registry;
pub mod settings;
pub mod utils;
#[cfg(feature = "web-api")]
pub mod web_handlers;

// Re-export the main model types for easier access
pub use models::{
    CanonicalPayload, ClientFormat, ProxyNode, ProxyType, RenderedOutput, Subscription,
    UsageSummary,
};

// Re-export the engine entry points
pub use interfaces::{dispatch, dispatch_with, DispatchError};
pub use settings::Settings;

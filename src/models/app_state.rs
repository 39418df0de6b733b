use std::sync::Arc;

use crate::api::{PanelClient, PanelError, SubscriptionSource};
use crate::settings::Settings;

/// Application state shared by the web handlers
#[derive(Clone)]
pub struct AppState {
    /// Settings snapshot taken at startup
    pub settings: Arc<Settings>,

    /// Where subscriptions are fetched from
    pub source: Arc<dyn SubscriptionSource>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, source: Arc<dyn SubscriptionSource>) -> Self {
        Self { settings, source }
    }

    /// State backed by the panel configured in `settings`.
    pub fn with_panel(settings: Arc<Settings>) -> Result<Self, PanelError> {
        let client = PanelClient::new(&settings.panel)?;
        Ok(Self::new(settings, Arc::new(client)))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

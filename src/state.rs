use std::sync::Arc;

use crate::audio::Synth;
use crate::config::AppConfig;
use crate::registry::HubHandle;

/// Context shared by every HTTP handler. Built once at startup and never
/// mutated afterwards.
#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub hub: HubHandle,
    pub synth: Arc<Synth>,
}

impl AppState {
    pub fn new(config: AppConfig, hub: HubHandle, synth: Arc<Synth>) -> Arc<Self> {
        Arc::new(Self { config, hub, synth })
    }
}

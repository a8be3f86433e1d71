use crate::config::Config;
use crate::store::MetadataStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<MetadataStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = MetadataStore::new(config.metadata_file.clone(), config.upload_dir.clone());
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }
}

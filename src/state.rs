use std::sync::Arc;

use crate::{config::Config, database::store::Store};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Arc<Self> {
        Arc::new(Self { store, config })
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }
}

use std::sync::Arc;

use super::config::ServiceConfig;

#[derive(Clone)]
pub(super) struct AppState {
    pub(super) config: Arc<ServiceConfig>,
}

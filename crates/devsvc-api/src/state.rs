use std::sync::Arc;

use devsvc_lifecycle::Service;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

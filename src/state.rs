use std::sync::Arc;

use crate::access::AccessGate;
use crate::config::AppConfig;
use crate::database::{Backend, Directory, Store};
use crate::filter::PageLimits;
use crate::services::Notifier;
use crate::session::SessionResolver;

/// Shared, read-only handles. Nothing request-specific lives here; the
/// principal travels with each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub sessions: Arc<SessionResolver>,
    pub gate: Arc<AccessGate>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new<B: Backend + 'static>(config: AppConfig, backend: Arc<B>, notifier: Arc<dyn Notifier>) -> Self {
        let store: Arc<dyn Store> = backend.clone();
        let directory: Arc<dyn Directory> = backend;

        let sessions = SessionResolver::new(
            directory.clone(),
            config.security.jwt_secret.clone(),
            config.security.session_cookie.clone(),
            config.security.api_key_prefix.clone(),
        );
        let gate = AccessGate::new(directory, store.clone(), Arc::new(config.plans.clone()));

        Self {
            config: Arc::new(config),
            store,
            sessions: Arc::new(sessions),
            gate: Arc::new(gate),
            notifier,
        }
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.config.api.default_page_size,
            max_page_size: self.config.api.max_page_size,
            max_search_length: self.config.api.max_search_length,
        }
    }
}

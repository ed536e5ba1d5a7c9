use std::sync::Arc;

use crate::application::reporting::ErrorReporter;
use crate::infrastructure::fatal::FatalMonitor;
use crate::infrastructure::jwt::JwtService;

pub(crate) mod http;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) reporter: Arc<ErrorReporter>,
    pub(crate) jwt: Arc<JwtService>,
    pub(crate) monitor: FatalMonitor,
}

impl AppState {
    pub(crate) fn new(reporter: Arc<ErrorReporter>, jwt: Arc<JwtService>, monitor: FatalMonitor) -> Self {
        Self {
            reporter,
            jwt,
            monitor,
        }
    }
}

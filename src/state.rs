use std::sync::Arc;

use crate::config::BookingSettings;
use crate::db::Store;
use crate::mail::Mailer;

/// Shared by every request handler through `web::Data`.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub settings: BookingSettings,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, settings: BookingSettings) -> Self {
        Self {
            store,
            mailer,
            settings,
        }
    }
}

//! State shared by every HTTP and relay handler.

use std::sync::Arc;

use courier_framework::Robot;

use crate::http::remote::RemoteScripts;
use crate::relay::RelaySettings;

#[derive(Clone)]
pub struct AppState {
    pub robot: Arc<Robot>,
    pub relay: RelaySettings,
    pub remote: Arc<RemoteScripts>,
}

impl AppState {
    pub fn new(robot: Arc<Robot>, relay: RelaySettings, client: reqwest::Client) -> Self {
        Self {
            robot,
            relay,
            remote: Arc::new(RemoteScripts::new(client)),
        }
    }
}

//! Authorization callback that opens the system browser

use multicloud_core::ports::{AuthorizationCallback, AuthorizationRequest};
use tracing::{info, warn};

/// Opens the authorization URL in the default browser
///
/// When no browser can be launched the request text is logged so the user
/// can copy the URL by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserCallback;

impl BrowserCallback {
    pub fn new() -> Self {
        Self
    }
}

impl AuthorizationCallback for BrowserCallback {
    fn on_authorization_request(&self, request: &AuthorizationRequest) {
        let Some(uri) = request.uri.as_deref() else {
            return;
        };

        info!("Opening browser for authorization");
        if let Err(e) = webbrowser::open(uri) {
            warn!(error = %e, "Failed to open browser");
            info!("{}", request);
        }
    }
}

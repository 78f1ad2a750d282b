//! Integration tests for multicloud-oauth2
//!
//! Runs complete grants against a wiremock token endpoint. Redirect-based
//! grants are driven by issuing the browser's redirect request directly
//! against the local listener.

mod common;

mod test_authorization_code;
mod test_direct_grants;

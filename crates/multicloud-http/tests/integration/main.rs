//! Integration tests for multicloud-http
//!
//! Uses wiremock to stand in for provider REST APIs and runs complete
//! operations (request building, dispatch, normalization, transfers)
//! against it.

mod common;

mod test_download;
mod test_operations;
mod test_upload;

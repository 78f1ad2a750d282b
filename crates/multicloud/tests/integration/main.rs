//! Integration tests for the multicloud client
//!
//! Runs account management, authorization and operations end to end
//! against wiremock providers.


mod test_operations;

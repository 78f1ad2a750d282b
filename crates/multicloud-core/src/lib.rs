//! MultiCloud Core - Domain types, ports and configuration
//!
//! This crate holds everything the provider-agnostic engines share:
//! - **Domain types** - `FileDescriptor`, `Token`, `RequestTemplate`, `OAuth2Settings`, `DataChunk`
//! - **Port definitions** - `CredentialStore`, `TemplateSource`, `ProgressListener`, `AuthorizationCallback`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module is pure data with no I/O. Ports are the trait seams
//! the HTTP, OAuth2 and facade crates depend on; each port ships an
//! in-memory adapter so the engines can be wired without external services.

pub mod config;
pub mod domain;
pub mod ports;

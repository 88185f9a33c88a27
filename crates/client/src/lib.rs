//! Client for the remote document-assembly engine.
//!
//! Provides:
//! - [`AssemblyClient`]: signed requests for assemble / interview /
//!   component-info / combined-answers, with optimistic package upload
//! - [`Transport`] / [`Connection`]: how requests travel, with
//!   [`HttpTransport`] as the shipped implementation

pub mod client;
pub mod http;
pub mod request;
pub mod retry;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use quillwork_config::ServiceConfig;
use quillwork_core::ServiceError;
use quillwork_security::SigningKey;

pub use client::AssemblyClient;
pub use http::HttpTransport;
pub use retry::{PACKAGE_NOT_FOUND_FAULT, try_without_and_with_package};
pub use transport::{Connection, ConnectionGuard, Operation, Transport, TransportError};

/// Build an HTTP-backed client from the `[service]` config section.
pub fn from_config(config: &ServiceConfig) -> Result<AssemblyClient, ServiceError> {
    let endpoint = config
        .endpoint
        .as_deref()
        .ok_or_else(|| ServiceError::InvalidArgument("service.endpoint is not configured".into()))?;
    let subscriber_id = config.subscriber_id.as_deref().ok_or_else(|| {
        ServiceError::InvalidArgument("service.subscriber_id is not configured".into())
    })?;
    let signing_key = config
        .signing_key
        .as_deref()
        .ok_or_else(|| ServiceError::InvalidArgument("service.signing_key is not configured".into()))
        .and_then(|key| {
            SigningKey::new(key).map_err(|e| ServiceError::InvalidArgument(e.to_string()))
        })?;

    let transport = HttpTransport::new(endpoint, Duration::from_secs(config.timeout_secs))?;
    AssemblyClient::new(subscriber_id, signing_key, Arc::new(transport))
}

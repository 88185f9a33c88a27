//! JSON-over-HTTP transport.
//!
//! Each operation is POSTed to `{endpoint}/{operation}`. Non-2xx responses
//! carry `{"fault": {"code": ..., "message": ...}}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::transport::{
    AUTHENTICATION_FAILED_FAULT, Connection, Operation, Transport, TransportError,
};

/// HTTP transport backed by a shared `reqwest::Client`.
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        Ok(Box::new(HttpConnection {
            endpoint: self.endpoint.clone(),
            client: self.client.clone(),
        }))
    }
}

/// HTTP is request-scoped, so close and abort have nothing to release.
struct HttpConnection {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct FaultEnvelope {
    fault: FaultBody,
}

#[derive(Deserialize)]
struct FaultBody {
    code: String,
    #[serde(default)]
    message: String,
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Turn a non-success status and body into a transport error.
fn fault_from_response(status: u16, body: &str) -> TransportError {
    if let Ok(envelope) = serde_json::from_str::<FaultEnvelope>(body) {
        return TransportError::Fault {
            code: envelope.fault.code,
            message: envelope.fault.message,
        };
    }
    if status == 401 || status == 403 {
        return TransportError::Fault {
            code: AUTHENTICATION_FAILED_FAULT.into(),
            message: format!("engine rejected the request signature (HTTP {status})"),
        };
    }
    TransportError::Protocol(format!("HTTP {status}: {body}"))
}

#[async_trait]
impl Connection for HttpConnection {
    async fn call(
        &mut self,
        operation: Operation,
        request: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let url = format!("{}/{}", self.endpoint, operation.as_str());
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), operation = %operation, "Engine returned an error");
            return Err(fault_from_response(status.as_u16(), &body));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| TransportError::Protocol(format!("invalid JSON body: {e}")))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn abort(&mut self) {}
}

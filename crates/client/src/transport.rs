//! Transport abstraction: how signed requests reach the engine.
//!
//! A [`Transport`] hands out [`Connection`]s. The client wraps every
//! connection in a [`ConnectionGuard`], which closes it after use and falls
//! back to aborting it when a graceful close fails.

use async_trait::async_trait;
use quillwork_core::ServiceError;
use tracing::{debug, warn};

/// Fault code the engine reports when a request signature does not verify.
pub const AUTHENTICATION_FAILED_FAULT: &str = "AuthenticationFailed";

/// The four remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AssembleDocument,
    GetInterview,
    GetComponentInfo,
    GetAnswers,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::AssembleDocument => "AssembleDocument",
            Operation::GetInterview => "GetInterview",
            Operation::GetComponentInfo => "GetComponentInfo",
            Operation::GetAnswers => "GetAnswers",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The engine processed the request and answered with a fault.
    #[error("Fault [{code}]: {message}")]
    Fault { code: String, message: String },

    #[error("Communication failure: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// The exchange completed but was not understood.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Communication-layer failures, as opposed to faults and protocol errors.
    pub fn is_communication(&self) -> bool {
        matches!(self, TransportError::Network(_) | TransportError::Timeout(_))
    }
}

impl From<TransportError> for ServiceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Fault { code, message } if code == AUTHENTICATION_FAILED_FAULT => {
                ServiceError::AuthenticationFailed(message)
            }
            TransportError::Fault { code, message } => ServiceError::Fault { code, message },
            TransportError::Network(msg) => ServiceError::Network(msg),
            TransportError::Timeout(msg) => ServiceError::Timeout(msg),
            TransportError::Protocol(msg) => ServiceError::InvalidResponse(msg),
        }
    }
}

/// Opens connections to the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError>;
}

/// One open channel to the engine.
#[async_trait]
pub trait Connection: Send {
    /// Send one request and wait for its response.
    async fn call(
        &mut self,
        operation: Operation,
        request: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError>;

    /// Close gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Tear down immediately. Must not fail.
    fn abort(&mut self);
}

/// Scoped ownership of a [`Connection`].
///
/// [`ConnectionGuard::close`] closes the connection. If closing fails at the
/// communication layer, the failure is logged, the connection is aborted and
/// the close counts as done. Any other close failure aborts the connection and
/// is returned. A guard dropped without being closed aborts its connection.
pub struct ConnectionGuard {
    connection: Option<Box<dyn Connection>>,
}

impl ConnectionGuard {
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    pub async fn call(
        &mut self,
        operation: Operation,
        request: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        match self.connection.as_mut() {
            Some(connection) => connection.call(operation, request).await,
            None => Err(TransportError::Protocol("connection already released".into())),
        }
    }

    pub async fn close(mut self) -> Result<(), TransportError> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        match connection.close().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_communication() => {
                warn!(error = %e, "Closing connection failed, aborting it");
                connection.abort();
                Ok(())
            }
            Err(e) => {
                connection.abort();
                Err(e)
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            debug!("Connection released without close, aborting");
            connection.abort();
        }
    }
}

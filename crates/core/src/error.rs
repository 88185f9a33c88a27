//! Error types for the Quillwork domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Quillwork operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Remote engine errors ---
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    // --- Template location errors ---
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    // --- Answer document errors ---
    #[error("Answer error: {0}")]
    Answers(#[from] AnswerError),

    // --- Work session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors raised while talking to the remote assembly engine.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// A required argument was missing or empty. Raised before any request is sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine rejected the request signature.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The engine returned a fault. `code` is the engine's machine-readable identifier.
    #[error("Engine fault [{code}]: {message}")]
    Fault { code: String, message: String },

    /// The template's location cannot be used with this service.
    #[error("Unsupported template location: {0}")]
    UnsupportedLocation(String),

    #[error("Package unavailable: {0}")]
    PackageUnavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid response from engine: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// The engine fault code, if this error is an engine fault.
    pub fn fault_code(&self) -> Option<&str> {
        match self {
            ServiceError::Fault { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Errors from template locations and locator strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Malformed locator: {0}")]
    MalformedLocator(String),

    #[error("The location type '{0}' is not registered")]
    UnregisteredLocationType(String),

    #[error("Invalid locator content for '{tag}': {reason}")]
    InvalidLocatorContent { tag: String, reason: String },

    #[error("File not found at template location: {0}")]
    FileNotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("I/O error reading {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Locator encryption failed: {0}")]
    Encryption(String),

    #[error("A global location registry is already installed")]
    RegistryAlreadyInstalled,

    #[error("No global location registry installed")]
    RegistryNotInstalled,
}

/// Errors from answer documents.
#[derive(Debug, Clone, Error)]
pub enum AnswerError {
    #[error("Failed to parse answer document: {0}")]
    Parse(String),

    #[error("Unsupported answer document version: {0}")]
    UnsupportedVersion(String),

    #[error("Answer '{0}' is not a finite number")]
    NonFiniteNumber(String),
}

/// Errors from work-session state transitions.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("The current work item is not an interview")]
    NotAnInterview,

    #[error("The work session has no remaining work items")]
    Completed,
}

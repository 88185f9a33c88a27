//! # Quillwork Core
//!
//! Domain types, traits, and error definitions for the Quillwork
//! document-assembly client. This crate has **no transport or crypto
//! dependencies**: it defines the domain model (answers, templates, template
//! locations, the remote assembly service) that the other crates implement
//! against.
//!
//! ## Layout
//!
//! - [`answers`]: the cumulative answer set and its overlay semantics
//! - [`template`]: templates, document types and output-format flags
//! - [`location`]: template locations, locators and the location registry
//! - [`service`]: the [`AssemblyService`] trait and its request/response types

pub mod answers;
pub mod error;
pub mod location;
pub mod service;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use answers::{AnswerSet, AnswerValue};
pub use error::{AnswerError, Error, LocationError, Result, ServiceError, SessionError};
pub use location::{
    LocationKind, LocationRegistry, LocationRegistryBuilder, LocatorCodec,
    PackageLocation, PackagePathTemplateLocation, PathTemplateLocation, TemplateLocation,
};
pub use service::{
    AssembleDocumentResult, AssembleDocumentSettings, AssemblyService, ComponentInfo, Document,
    InterviewFormat, InterviewResult, InterviewSettings, NamedFile,
};
pub use template::{DocumentType, OutputFormat, Template, TemplateType};

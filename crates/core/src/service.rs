//! AssemblyService trait: the abstraction over the remote assembly engine.
//!
//! An assembly service knows how to assemble a document, deliver an interview,
//! describe a template's components, and combine answer sets. The work session
//! drives templates through it without knowing how requests travel.
//!
//! Implementations: `quillwork_client::AssemblyClient` (signed requests over a
//! transport), plus scripted services in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::answers::AnswerSet;
use crate::error::ServiceError;
use crate::template::{DocumentType, Template};

/// Interview setting holding the URL interview images are served from.
pub const TEMP_INTERVIEW_URL: &str = "TempInterviewUrl";
/// Interview setting removed when document preview is disabled.
pub const DOC_PREVIEW_URL: &str = "DocPreviewUrl";
/// Interview setting removed when saving answers is disabled.
pub const SAVE_ANSWERS_PAGE_URL: &str = "SaveAnswersPageUrl";

/// Assembly setting carrying the retain-transient-answers flag.
pub const RETAIN_TRANSIENT_ANSWERS: &str = "RetainTransientAnswers";

/// Settings for one document assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembleDocumentSettings {
    /// Requested document format.
    #[serde(default)]
    pub format: DocumentType,

    /// Keep answers the engine would otherwise prune because later steps need them.
    #[serde(default)]
    pub retain_transient_answers: bool,

    /// Assemble with field markup instead of merged values.
    #[serde(default)]
    pub use_markup_syntax: bool,

    /// Engine-specific settings, sent verbatim and included in the signature.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl AssembleDocumentSettings {
    /// Settings as sent to the engine, with the retain-transient flag folded in.
    pub fn effective_settings(&self) -> BTreeMap<String, String> {
        let mut settings = self.settings.clone();
        if self.retain_transient_answers {
            settings.insert(RETAIN_TRANSIENT_ANSWERS.to_string(), "True".to_string());
        }
        settings
    }
}

/// Interview runtime flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewFormat {
    #[default]
    JavaScript,
    Silverlight,
    Unspecified,
}

impl InterviewFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            InterviewFormat::JavaScript => "JavaScript",
            InterviewFormat::Silverlight => "Silverlight",
            InterviewFormat::Unspecified => "Unspecified",
        }
    }
}

/// Settings for delivering one interview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterviewSettings {
    #[serde(default)]
    pub format: InterviewFormat,

    /// Interview title. The work session fills in the template title when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub disable_document_preview: bool,

    #[serde(default)]
    pub disable_save_answers: bool,

    /// Engine-specific settings (URLs, theme, ...).
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl InterviewSettings {
    /// Settings as sent to the engine, with URLs of disabled features removed.
    pub fn effective_settings(&self) -> BTreeMap<String, String> {
        let mut settings = self.settings.clone();
        if self.disable_document_preview {
            settings.remove(DOC_PREVIEW_URL);
        }
        if self.disable_save_answers {
            settings.remove(SAVE_ANSWERS_PAGE_URL);
        }
        settings
    }

    /// URL interview images are requested from, or empty.
    pub fn temp_interview_url(&self) -> &str {
        self.settings
            .get(TEMP_INTERVIEW_URL)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// A file returned alongside a document or interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// An assembled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// File name of the template the document was assembled from.
    pub template_file_name: String,
    pub document_type: DocumentType,
    pub content: Vec<u8>,
    #[serde(default)]
    pub supporting_files: Vec<NamedFile>,
}

impl Document {
    /// Suggested output file name: template stem plus the document type's extension.
    pub fn file_name(&self) -> String {
        let stem = std::path::Path::new(&self.template_file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        format!("{}.{}", stem, self.document_type.extension())
    }
}

/// Result of one assembly.
#[derive(Debug, Clone)]
pub struct AssembleDocumentResult {
    /// The document, until taken by [`AssembleDocumentResult::extract_document`].
    pub document: Option<Document>,

    /// Post-assembly answers. Assembly can change answers.
    pub answers: AnswerSet,

    /// Templates queued by ASSEMBLE instructions in the assembled template.
    pub pending_assemblies: Vec<Template>,

    /// Variables asked for during assembly that had no answer.
    pub unanswered_variables: Vec<String>,
}

impl AssembleDocumentResult {
    /// Move the document out of this result.
    pub fn extract_document(&mut self) -> Option<Document> {
        self.document.take()
    }

    pub fn pending_assemblies_count(&self) -> usize {
        self.pending_assemblies.len()
    }
}

/// An interview ready to embed in a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewResult {
    pub html_fragment: String,
    #[serde(default)]
    pub files: Vec<NamedFile>,
}

/// A variable defined by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    /// Variable kind as reported by the engine (e.g. "Text", "Date").
    pub kind: String,
}

/// A dialog defined by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogInfo {
    pub name: String,
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Component metadata for a template's interview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    #[serde(default)]
    pub variables: Vec<VariableInfo>,
    #[serde(default)]
    pub dialogs: Vec<DialogInfo>,
}

/// The core AssemblyService trait.
///
/// Each call is one round trip to the engine. Callers needing timeouts or
/// cancellation impose them at the transport.
#[async_trait]
pub trait AssemblyService: Send + Sync {
    /// A human-readable name for this service (e.g. "cloud", "scripted").
    fn name(&self) -> &str;

    /// Assemble a document from `template` with `answers`.
    async fn assemble_document(
        &self,
        template: &Template,
        answers: &AnswerSet,
        settings: &AssembleDocumentSettings,
        billing_ref: &str,
    ) -> Result<AssembleDocumentResult, ServiceError>;

    /// Fetch the interview for `template`, pre-filled with `answers`.
    async fn get_interview(
        &self,
        template: &Template,
        answers: &AnswerSet,
        settings: &InterviewSettings,
        marked_variables: &[String],
        billing_ref: &str,
    ) -> Result<InterviewResult, ServiceError>;

    /// Describe the variables (and optionally dialogs) of `template`.
    async fn get_component_info(
        &self,
        template: &Template,
        include_dialogs: bool,
        billing_ref: &str,
    ) -> Result<ComponentInfo, ServiceError>;

    /// Overlay `answers` in order into one answer set.
    async fn get_answers(
        &self,
        answers: &[AnswerSet],
        billing_ref: &str,
    ) -> Result<AnswerSet, ServiceError>;
}

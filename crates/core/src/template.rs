//! Templates, document types and output-format flags.
//!
//! A [`Template`] names a template file at a [`TemplateLocation`], plus the
//! command-line switches it is assembled with. Its file extension decides
//! whether it produces a document and which document type is native to it;
//! its switches decide whether it presents an interview.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LocationError;
use crate::location::{LocationRegistry, TemplateLocation};

/// The kind of template, derived from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    WordDocx,
    WordRtf,
    WordPerfect,
    HotDocsPdf,
    HotDocsHfd,
    PlainText,
    /// Presents an interview and runs logic but produces no document.
    InterviewOnly,
    Unknown,
}

impl TemplateType {
    /// Classify a template file name by its extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Self {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("docx") => TemplateType::WordDocx,
            Some("rtf") => TemplateType::WordRtf,
            Some("wpt") => TemplateType::WordPerfect,
            Some("hpt") => TemplateType::HotDocsPdf,
            Some("hft") => TemplateType::HotDocsHfd,
            Some("ttx") => TemplateType::PlainText,
            Some("cmp") => TemplateType::InterviewOnly,
            _ => TemplateType::Unknown,
        }
    }
}

/// A document format the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Whatever format is native to the template.
    #[default]
    Native,
    WordDocx,
    WordDoc,
    WordRtf,
    WordPerfect,
    Pdf,
    Html,
    HtmlWithDataUris,
    Mhtml,
    PlainText,
    Hfd,
    Hpd,
    Xml,
    Unknown,
}

impl DocumentType {
    /// Conventional file extension for assembled documents of this type.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentType::WordDocx => "docx",
            DocumentType::WordDoc => "doc",
            DocumentType::WordRtf => "rtf",
            DocumentType::WordPerfect => "wpd",
            DocumentType::Pdf => "pdf",
            DocumentType::Html | DocumentType::HtmlWithDataUris => "htm",
            DocumentType::Mhtml => "mht",
            DocumentType::PlainText => "txt",
            DocumentType::Hfd => "hfd",
            DocumentType::Hpd => "hpd",
            DocumentType::Xml => "xml",
            DocumentType::Native | DocumentType::Unknown => "bin",
        }
    }
}

/// Bit-flag set of outputs requested from an assembly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputFormat(u32);

impl OutputFormat {
    pub const NONE: OutputFormat = OutputFormat(0);
    pub const ANSWERS: OutputFormat = OutputFormat(1);
    pub const DOCX: OutputFormat = OutputFormat(1 << 1);
    pub const HFD: OutputFormat = OutputFormat(1 << 2);
    pub const HPD: OutputFormat = OutputFormat(1 << 3);
    pub const HTML: OutputFormat = OutputFormat(1 << 4);
    pub const HTML_WITH_DATA_URIS: OutputFormat = OutputFormat(1 << 5);
    pub const MHTML: OutputFormat = OutputFormat(1 << 6);
    pub const NATIVE: OutputFormat = OutputFormat(1 << 7);
    pub const PDF: OutputFormat = OutputFormat(1 << 8);
    pub const PLAIN_TEXT: OutputFormat = OutputFormat(1 << 9);
    pub const RTF: OutputFormat = OutputFormat(1 << 10);
    pub const WPD: OutputFormat = OutputFormat(1 << 11);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        OutputFormat(bits)
    }

    pub const fn contains(self, other: OutputFormat) -> bool {
        self.0 & other.0 == other.0
    }

    /// The output flags for an assembly of `document_type`, always including answers.
    pub fn for_document(document_type: DocumentType) -> Self {
        let format = match document_type {
            DocumentType::Native => OutputFormat::NATIVE,
            DocumentType::Pdf => OutputFormat::PDF,
            DocumentType::Html => OutputFormat::HTML,
            DocumentType::HtmlWithDataUris => OutputFormat::HTML_WITH_DATA_URIS,
            DocumentType::Mhtml => OutputFormat::MHTML,
            DocumentType::PlainText => OutputFormat::PLAIN_TEXT,
            DocumentType::WordDoc | DocumentType::WordDocx => OutputFormat::DOCX,
            DocumentType::WordPerfect => OutputFormat::WPD,
            DocumentType::WordRtf => OutputFormat::RTF,
            DocumentType::Hfd => OutputFormat::HFD,
            DocumentType::Hpd => OutputFormat::HPD,
            DocumentType::Xml | DocumentType::Unknown => OutputFormat::NONE,
        };
        format | OutputFormat::ANSWERS
    }
}

impl BitOr for OutputFormat {
    type Output = OutputFormat;

    fn bitor(self, rhs: Self) -> Self::Output {
        OutputFormat(self.0 | rhs.0)
    }
}

impl BitOrAssign for OutputFormat {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputFormat({:#x})", self.0)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A template file at some location.
#[derive(Debug, Clone)]
pub struct Template {
    /// File name including extension, without path information.
    pub file_name: String,

    /// Where the template and its dependencies live.
    pub location: Arc<dyn TemplateLocation>,

    /// Assembly switches, as passed to an ASSEMBLE instruction (e.g. `/ni`).
    pub switches: String,

    /// Display title. Falls back to the file stem.
    pub title: Option<String>,

    /// Caching key for templates whose files are temporary.
    pub key: String,
}

/// Serialized template state, encrypted into a template locator.
#[derive(Serialize, Deserialize)]
struct TemplateState {
    file_name: String,
    switches: String,
    key: String,
    #[serde(default)]
    title: Option<String>,
    location: String,
}

impl Template {
    pub fn new(file_name: impl Into<String>, location: Arc<dyn TemplateLocation>) -> Self {
        Self {
            file_name: file_name.into(),
            location,
            switches: String::new(),
            title: None,
            key: String::new(),
        }
    }

    pub fn with_switches(mut self, switches: impl Into<String>) -> Self {
        self.switches = switches.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn title(&self) -> &str {
        match &self.title {
            Some(title) => title.as_str(),
            None => Path::new(&self.file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&self.file_name),
        }
    }

    pub fn template_type(&self) -> TemplateType {
        TemplateType::from_file_name(&self.file_name)
    }

    /// False when the switches suppress the interview (`/ni`).
    pub fn has_interview(&self) -> bool {
        !self
            .switches
            .split_whitespace()
            .any(|s| s.eq_ignore_ascii_case("/ni"))
    }

    pub fn generates_document(&self) -> bool {
        !matches!(
            self.template_type(),
            TemplateType::InterviewOnly | TemplateType::Unknown
        )
    }

    pub fn native_document_type(&self) -> DocumentType {
        match self.template_type() {
            TemplateType::WordDocx => DocumentType::WordDocx,
            TemplateType::WordRtf => DocumentType::WordRtf,
            TemplateType::WordPerfect => DocumentType::WordPerfect,
            TemplateType::HotDocsPdf => DocumentType::Hpd,
            TemplateType::HotDocsHfd => DocumentType::Hfd,
            TemplateType::PlainText => DocumentType::PlainText,
            TemplateType::InterviewOnly => DocumentType::Native,
            TemplateType::Unknown => DocumentType::Unknown,
        }
    }

    /// Read a file colocated with this template.
    pub fn get_file(&self, file_name: &str) -> Result<Vec<u8>, LocationError> {
        self.location.get_file(file_name)
    }

    /// Encrypted locator from which [`Template::locate`] rebuilds this template.
    pub fn create_locator(&self, registry: &LocationRegistry) -> Result<String, LocationError> {
        let state = TemplateState {
            file_name: self.file_name.clone(),
            switches: self.switches.clone(),
            key: self.key.clone(),
            title: self.title.clone(),
            location: registry.create_locator(self.location.as_ref())?,
        };
        let json = serde_json::to_string(&state)
            .map_err(|e| LocationError::Encryption(e.to_string()))?;
        registry.codec().encrypt(&json)
    }

    pub fn locate(registry: &LocationRegistry, locator: &str) -> Result<Self, LocationError> {
        let json = registry.codec().decrypt(locator)?;
        let state: TemplateState = serde_json::from_str(&json)
            .map_err(|e| LocationError::MalformedLocator(e.to_string()))?;
        Ok(Self {
            file_name: state.file_name,
            location: registry.locate(&state.location)?,
            switches: state.switches,
            title: state.title,
            key: state.key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::PathTemplateLocation;

    fn template(name: &str) -> Template {
        Template::new(name, Arc::new(PathTemplateLocation::new("/templates")))
    }

    #[test]
    fn classifies_by_extension() {
        assert_eq!(template("Lease.DOCX").template_type(), TemplateType::WordDocx);
        assert_eq!(template("intake.cmp").template_type(), TemplateType::InterviewOnly);
        assert_eq!(template("notes").template_type(), TemplateType::Unknown);
    }

    #[test]
    fn interview_only_generates_no_document() {
        let t = template("intake.cmp");
        assert!(t.has_interview());
        assert!(!t.generates_document());
        assert_eq!(t.native_document_type(), DocumentType::Native);
    }

    #[test]
    fn ni_switch_suppresses_interview() {
        let t = template("letter.rtf").with_switches("/NI /pc");
        assert!(!t.has_interview());
        assert!(t.generates_document());
        assert_eq!(t.native_document_type(), DocumentType::WordRtf);
    }

    #[test]
    fn title_falls_back_to_stem() {
        assert_eq!(template("Demo Employment.docx").title(), "Demo Employment");
        assert_eq!(template("a.docx").with_title("Agreement").title(), "Agreement");
    }

    #[test]
    fn output_format_always_includes_answers() {
        let f = OutputFormat::for_document(DocumentType::Pdf);
        assert!(f.contains(OutputFormat::PDF));
        assert!(f.contains(OutputFormat::ANSWERS));

        let f = OutputFormat::for_document(DocumentType::Xml);
        assert_eq!(f, OutputFormat::ANSWERS);
    }

    #[test]
    fn word_doc_maps_to_docx_output() {
        assert_eq!(
            OutputFormat::for_document(DocumentType::WordDoc),
            OutputFormat::DOCX | OutputFormat::ANSWERS
        );
    }
}

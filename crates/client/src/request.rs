//! Wire messages for the four engine operations.
//!
//! Each request body knows the ordered field list its signature covers. The
//! order is part of the wire contract: the engine recomputes the HMAC over the
//! same fields and rejects the call when the values differ.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use quillwork_core::{ComponentInfo, OutputFormat};
use quillwork_security::{RequestSignature, SignatureField, SigningKey, TIMESTAMP_FORMAT};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A request body together with its signature.
#[derive(Debug, Serialize)]
pub struct Signed<B> {
    #[serde(flatten)]
    pub body: B,
    pub signature: RequestSignature,
}

/// Fields a request signature covers, in wire order.
pub trait SignedFields {
    fn signature_fields(&self) -> Vec<SignatureField<'_>>;

    fn sign(self, key: &SigningKey) -> Signed<Self>
    where
        Self: Sized,
    {
        let signature = key.sign(&self.signature_fields());
        Signed {
            body: self,
            signature,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssembleDocumentRequest {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub subscriber_id: String,
    pub package_id: String,
    pub template_file_name: String,
    pub upload_package: bool,
    pub billing_ref: String,
    pub output_format: OutputFormat,
    pub settings: BTreeMap<String, String>,
    /// Answer documents, overlaid in order by the engine.
    pub answers: Vec<String>,
    pub use_markup_syntax: bool,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_package")]
    pub package: Option<Vec<u8>>,
}

impl SignedFields for AssembleDocumentRequest {
    fn signature_fields(&self) -> Vec<SignatureField<'_>> {
        vec![
            SignatureField::Timestamp(self.timestamp),
            SignatureField::Text(&self.subscriber_id),
            SignatureField::Text(&self.package_id),
            SignatureField::Text(&self.template_file_name),
            SignatureField::Flag(self.upload_package),
            SignatureField::Text(&self.billing_ref),
            SignatureField::Number(u64::from(self.output_format.bits())),
            SignatureField::Settings(&self.settings),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct GetInterviewRequest {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub subscriber_id: String,
    pub package_id: String,
    pub template_file_name: String,
    pub upload_package: bool,
    pub billing_ref: String,
    pub format: String,
    pub temp_interview_url: String,
    pub settings: BTreeMap<String, String>,
    pub title: String,
    pub answers: Vec<String>,
    pub marked_variables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_package")]
    pub package: Option<Vec<u8>>,
}

impl SignedFields for GetInterviewRequest {
    fn signature_fields(&self) -> Vec<SignatureField<'_>> {
        vec![
            SignatureField::Timestamp(self.timestamp),
            SignatureField::Text(&self.subscriber_id),
            SignatureField::Text(&self.package_id),
            SignatureField::Text(&self.template_file_name),
            SignatureField::Flag(self.upload_package),
            SignatureField::Text(&self.billing_ref),
            SignatureField::Text(&self.format),
            SignatureField::Text(&self.temp_interview_url),
            SignatureField::Settings(&self.settings),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct GetComponentInfoRequest {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub subscriber_id: String,
    pub package_id: String,
    pub template_file_name: String,
    pub upload_package: bool,
    pub billing_ref: String,
    pub include_dialogs: bool,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_package")]
    pub package: Option<Vec<u8>>,
}

impl SignedFields for GetComponentInfoRequest {
    fn signature_fields(&self) -> Vec<SignatureField<'_>> {
        vec![
            SignatureField::Timestamp(self.timestamp),
            SignatureField::Text(&self.subscriber_id),
            SignatureField::Text(&self.package_id),
            SignatureField::Text(&self.template_file_name),
            SignatureField::Flag(self.upload_package),
            SignatureField::Text(&self.billing_ref),
            SignatureField::Flag(self.include_dialogs),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct GetAnswersRequest {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub subscriber_id: String,
    pub billing_ref: String,
    pub answers: Vec<String>,
}

impl SignedFields for GetAnswersRequest {
    fn signature_fields(&self) -> Vec<SignatureField<'_>> {
        vec![
            SignatureField::Timestamp(self.timestamp),
            SignatureField::Text(&self.subscriber_id),
            SignatureField::Text(&self.billing_ref),
        ]
    }
}

// --- Responses ---

#[derive(Debug, Deserialize)]
pub struct WireFile {
    pub name: String,
    #[serde(deserialize_with = "deserialize_base64")]
    pub content: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct WireDocument {
    #[serde(deserialize_with = "deserialize_base64")]
    pub content: Vec<u8>,
    #[serde(default)]
    pub supporting_files: Vec<WireFile>,
}

/// A template queued by an ASSEMBLE instruction, relative to the parent's location.
#[derive(Debug, Deserialize)]
pub struct WirePendingAssembly {
    pub file_name: String,
    #[serde(default)]
    pub switches: String,
}

#[derive(Debug, Deserialize)]
pub struct AssembleDocumentResponse {
    #[serde(default)]
    pub document: Option<WireDocument>,
    /// Post-assembly answer document.
    #[serde(default)]
    pub answers: String,
    #[serde(default)]
    pub pending_assemblies: Vec<WirePendingAssembly>,
    #[serde(default)]
    pub unanswered_variables: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetInterviewResponse {
    pub html_fragment: String,
    #[serde(default)]
    pub files: Vec<WireFile>,
}

#[derive(Debug, Deserialize)]
pub struct GetComponentInfoResponse {
    #[serde(flatten)]
    pub info: ComponentInfo,
}

#[derive(Debug, Deserialize)]
pub struct GetAnswersResponse {
    pub answers: String,
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
}

fn serialize_package<S: Serializer>(package: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match package {
        Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
        None => s.serialize_none(),
    }
}

fn deserialize_base64<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(d)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

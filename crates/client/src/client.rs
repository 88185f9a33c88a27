//! AssemblyClient: the signed-request implementation of [`AssemblyService`].
//!
//! The client requires package-backed template locations: the engine addresses
//! templates by package id and file name, and receives the package bytes only
//! when its cache misses (see [`crate::retry`]).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use quillwork_core::location::PackageLocation;
use quillwork_core::{
    AnswerSet, AssembleDocumentResult, AssembleDocumentSettings, AssemblyService, ComponentInfo,
    Document, DocumentType, InterviewResult, InterviewSettings, NamedFile, OutputFormat,
    ServiceError, Template,
};
use quillwork_security::SigningKey;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::request::{
    AssembleDocumentRequest, AssembleDocumentResponse, GetAnswersRequest, GetAnswersResponse,
    GetComponentInfoRequest, GetComponentInfoResponse, GetInterviewRequest, GetInterviewResponse,
    SignedFields, WireFile,
};
use crate::retry::try_without_and_with_package;
use crate::transport::{ConnectionGuard, Operation, Transport};

/// Client for the remote assembly engine.
pub struct AssemblyClient {
    name: String,
    subscriber_id: String,
    signing_key: SigningKey,
    transport: Arc<dyn Transport>,
}

impl AssemblyClient {
    pub fn new(
        subscriber_id: impl Into<String>,
        signing_key: SigningKey,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ServiceError> {
        let subscriber_id = subscriber_id.into();
        if subscriber_id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "subscriber id must not be empty".into(),
            ));
        }
        Ok(Self {
            name: format!("cloud:{}", transport.name()),
            subscriber_id,
            signing_key,
            transport,
        })
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    /// Send one signed request over a fresh connection.
    async fn send<B, R>(&self, operation: Operation, body: B) -> Result<R, ServiceError>
    where
        B: SignedFields + Serialize + Send,
        R: DeserializeOwned,
    {
        let request = serde_json::to_value(body.sign(&self.signing_key)).map_err(|e| {
            ServiceError::InvalidArgument(format!("could not encode {operation} request: {e}"))
        })?;

        let connection = self.transport.connect().await?;
        let mut guard = ConnectionGuard::new(connection);
        debug!(operation = %operation, "Sending signed request");
        let result = guard.call(operation, request).await;

        match (result, guard.close().await) {
            (Ok(value), Ok(())) => serde_json::from_value(value).map_err(|e| {
                ServiceError::InvalidResponse(format!("{operation} response: {e}"))
            }),
            (Ok(_), Err(close_err)) => Err(close_err.into()),
            (Err(e), close) => {
                if let Err(close_err) = close {
                    warn!(operation = %operation, error = %close_err, "Close failed after call error");
                }
                Err(e.into())
            }
        }
    }
}

/// The package view of a template's location, or `UnsupportedLocation`.
fn package_of(template: &Template) -> Result<&dyn PackageLocation, ServiceError> {
    template.location.as_package().ok_or_else(|| {
        ServiceError::UnsupportedLocation(format!(
            "the assembly engine requires template packages, but '{}' is at a '{}' location",
            template.file_name,
            template.location.type_tag()
        ))
    })
}

fn validate_template(template: &Template) -> Result<&dyn PackageLocation, ServiceError> {
    if template.file_name.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(
            "template file name must not be empty".into(),
        ));
    }
    let package = package_of(template)?;
    if package.package_id().is_empty() {
        return Err(ServiceError::InvalidArgument(
            "template package id must not be empty".into(),
        ));
    }
    Ok(package)
}

/// Package bytes, read only when uploading.
fn package_if_needed(
    package: &dyn PackageLocation,
    upload: bool,
) -> Result<Option<Vec<u8>>, ServiceError> {
    if !upload {
        return Ok(None);
    }
    package
        .read_package()
        .map(Some)
        .map_err(|e| ServiceError::PackageUnavailable(format!("{}: {e}", package.package_id())))
}

fn named_files(files: Vec<WireFile>) -> Vec<NamedFile> {
    files
        .into_iter()
        .map(|f| NamedFile {
            name: f.name,
            content: f.content,
        })
        .collect()
}

fn answer_document(answers: &AnswerSet) -> Result<String, ServiceError> {
    answers
        .to_document()
        .map_err(|e| ServiceError::InvalidArgument(e.to_string()))
}

fn parse_answers(document: &str) -> Result<AnswerSet, ServiceError> {
    AnswerSet::from_document(document)
        .map_err(|e| ServiceError::InvalidResponse(format!("answers: {e}")))
}

#[async_trait]
impl AssemblyService for AssemblyClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn assemble_document(
        &self,
        template: &Template,
        answers: &AnswerSet,
        settings: &AssembleDocumentSettings,
        billing_ref: &str,
    ) -> Result<AssembleDocumentResult, ServiceError> {
        let package = validate_template(template)?;
        let output_format = OutputFormat::for_document(settings.format);
        let engine_settings = settings.effective_settings();
        let answer_document = answer_document(answers)?;

        info!(
            template = %template.file_name,
            package_id = package.package_id(),
            format = ?settings.format,
            "Assembling document"
        );

        let response: AssembleDocumentResponse =
            try_without_and_with_package(package.package_id(), |upload| {
                let request = package_if_needed(package, upload).map(|bytes| {
                    AssembleDocumentRequest {
                        timestamp: Utc::now(),
                        subscriber_id: self.subscriber_id.clone(),
                        package_id: package.package_id().to_string(),
                        template_file_name: template.file_name.clone(),
                        upload_package: upload,
                        billing_ref: billing_ref.to_string(),
                        output_format,
                        settings: engine_settings.clone(),
                        answers: vec![answer_document.clone()],
                        use_markup_syntax: settings.use_markup_syntax,
                        package: bytes,
                    }
                });
                async move { self.send(Operation::AssembleDocument, request?).await }
            })
            .await?;

        let document_type = if template.generates_document() {
            match settings.format {
                DocumentType::Native => template.native_document_type(),
                other => other,
            }
        } else {
            settings.format
        };

        let pending_assemblies = response
            .pending_assemblies
            .into_iter()
            .map(|p| {
                Template::new(p.file_name, template.location.clone()).with_switches(p.switches)
            })
            .collect();

        Ok(AssembleDocumentResult {
            document: response.document.map(|d| Document {
                template_file_name: template.file_name.clone(),
                document_type,
                content: d.content,
                supporting_files: named_files(d.supporting_files),
            }),
            answers: parse_answers(&response.answers)?,
            pending_assemblies,
            unanswered_variables: response.unanswered_variables,
        })
    }

    async fn get_interview(
        &self,
        template: &Template,
        answers: &AnswerSet,
        settings: &InterviewSettings,
        marked_variables: &[String],
        billing_ref: &str,
    ) -> Result<InterviewResult, ServiceError> {
        let package = validate_template(template)?;
        let effective = settings.effective_settings();
        let title = settings
            .title
            .clone()
            .unwrap_or_else(|| template.title().to_string());
        let answer_document = answer_document(answers)?;

        info!(
            template = %template.file_name,
            package_id = package.package_id(),
            format = settings.format.as_str(),
            "Requesting interview"
        );

        let response: GetInterviewResponse =
            try_without_and_with_package(package.package_id(), |upload| {
                let request = package_if_needed(package, upload).map(|bytes| GetInterviewRequest {
                    timestamp: Utc::now(),
                    subscriber_id: self.subscriber_id.clone(),
                    package_id: package.package_id().to_string(),
                    template_file_name: template.file_name.clone(),
                    upload_package: upload,
                    billing_ref: billing_ref.to_string(),
                    format: settings.format.as_str().to_string(),
                    temp_interview_url: settings.temp_interview_url().to_string(),
                    settings: effective.clone(),
                    title: title.clone(),
                    answers: vec![answer_document.clone()],
                    marked_variables: marked_variables.to_vec(),
                    package: bytes,
                });
                async move { self.send(Operation::GetInterview, request?).await }
            })
            .await?;

        Ok(InterviewResult {
            html_fragment: response.html_fragment,
            files: named_files(response.files),
        })
    }

    async fn get_component_info(
        &self,
        template: &Template,
        include_dialogs: bool,
        billing_ref: &str,
    ) -> Result<ComponentInfo, ServiceError> {
        let package = validate_template(template)?;

        let response: GetComponentInfoResponse =
            try_without_and_with_package(package.package_id(), |upload| {
                let request =
                    package_if_needed(package, upload).map(|bytes| GetComponentInfoRequest {
                        timestamp: Utc::now(),
                        subscriber_id: self.subscriber_id.clone(),
                        package_id: package.package_id().to_string(),
                        template_file_name: template.file_name.clone(),
                        upload_package: upload,
                        billing_ref: billing_ref.to_string(),
                        include_dialogs,
                        package: bytes,
                    });
                async move { self.send(Operation::GetComponentInfo, request?).await }
            })
            .await?;

        Ok(response.info)
    }

    async fn get_answers(
        &self,
        answers: &[AnswerSet],
        billing_ref: &str,
    ) -> Result<AnswerSet, ServiceError> {
        if answers.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "at least one answer set is required".into(),
            ));
        }

        let request = GetAnswersRequest {
            timestamp: Utc::now(),
            subscriber_id: self.subscriber_id.clone(),
            billing_ref: billing_ref.to_string(),
            answers: answers
                .iter()
                .map(answer_document)
                .collect::<Result<_, _>>()?,
        };
        let response: GetAnswersResponse = self.send(Operation::GetAnswers, request).await?;
        parse_answers(&response.answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::PACKAGE_NOT_FOUND_FAULT;
    use crate::transport::{Connection, TransportError};
    use quillwork_core::{PackagePathTemplateLocation, PathTemplateLocation};
    use quillwork_security::SignatureField;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    type Reply = Result<serde_json::Value, TransportError>;

    /// A transport that replays scripted replies and records every request.
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<(Operation, serde_json::Value)>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(Operation, serde_json::Value)> {
            self.requests.lock().unwrap().clone()
        }
    }

    struct ScriptedConnection {
        transport: Arc<ScriptedTransport>,
    }

    /// Hands out connections that reach back into the shared script.
    struct SharedTransport(Arc<ScriptedTransport>);

    #[async_trait]
    impl Transport for SharedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
            Ok(Box::new(ScriptedConnection {
                transport: self.0.clone(),
            }))
        }
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn call(
            &mut self,
            operation: Operation,
            request: serde_json::Value,
        ) -> Result<serde_json::Value, TransportError> {
            self.transport
                .requests
                .lock()
                .unwrap()
                .push((operation, request));
            self.transport
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Protocol("script exhausted".into())))
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        fn abort(&mut self) {}
    }

    fn client(script: &Arc<ScriptedTransport>) -> AssemblyClient {
        AssemblyClient::new(
            "acme",
            SigningKey::new("signing-key").unwrap(),
            Arc::new(SharedTransport(script.clone())),
        )
        .unwrap()
    }

    fn package_template(dir: &std::path::Path) -> Template {
        let pkg = dir.join("lease.pkg");
        std::fs::write(&pkg, b"PK-bytes").unwrap();
        Template::new(
            "lease.docx",
            Arc::new(PackagePathTemplateLocation::new("lease-v3", pkg)),
        )
    }

    fn cache_miss() -> Reply {
        Err(TransportError::Fault {
            code: PACKAGE_NOT_FOUND_FAULT.into(),
            message: "not cached".into(),
        })
    }

    fn assembled(answers: &AnswerSet) -> Reply {
        Ok(serde_json::json!({
            "document": { "content": "ZG9j" },
            "answers": answers.to_document().unwrap(),
            "pending_assemblies": [{ "file_name": "addendum.docx", "switches": "/ni" }],
            "unanswered_variables": ["Landlord"],
        }))
    }

    #[tokio::test]
    async fn assemble_maps_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut returned = AnswerSet::new();
        returned.set("Tenant", "Ada");
        let script = ScriptedTransport::new(vec![assembled(&returned)]);
        let template = package_template(dir.path());

        let mut result = client(&script)
            .assemble_document(&template, &AnswerSet::new(), &Default::default(), "ref")
            .await
            .unwrap();

        let doc = result.extract_document().unwrap();
        assert_eq!(doc.content, b"doc");
        assert_eq!(doc.document_type, DocumentType::WordDocx);
        assert_eq!(result.answers, returned);
        assert_eq!(result.unanswered_variables, vec!["Landlord".to_string()]);
        assert_eq!(result.pending_assemblies.len(), 1);
        let pending = &result.pending_assemblies[0];
        assert_eq!(pending.file_name, "addendum.docx");
        assert!(!pending.has_interview());
        assert!(pending.location.same_location(template.location.as_ref()));

        let requests = script.requests();
        assert_eq!(requests.len(), 1);
        let (op, body) = &requests[0];
        assert_eq!(*op, Operation::AssembleDocument);
        assert_eq!(body["upload_package"], false);
        assert!(body.get("package").is_none());
        assert_eq!(
            body["output_format"],
            (OutputFormat::NATIVE | OutputFormat::ANSWERS).bits()
        );
    }

    #[tokio::test]
    async fn cache_miss_uploads_package_once() {
        let dir = tempfile::tempdir().unwrap();
        let script = ScriptedTransport::new(vec![cache_miss(), assembled(&AnswerSet::new())]);
        let template = package_template(dir.path());

        client(&script)
            .assemble_document(&template, &AnswerSet::new(), &Default::default(), "")
            .await
            .unwrap();

        let requests = script.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1["upload_package"], false);
        assert_eq!(requests[1].1["upload_package"], true);
        assert_eq!(requests[1].1["package"], "UEstYnl0ZXM=");
    }

    #[tokio::test]
    async fn other_fault_surfaces_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let script = ScriptedTransport::new(vec![Err(TransportError::Fault {
            code: "HotDocs.Server.AssemblyError".into(),
            message: "boom".into(),
        })]);
        let template = package_template(dir.path());

        let err = client(&script)
            .get_component_info(&template, true, "")
            .await
            .unwrap_err();
        assert_eq!(err.fault_code(), Some("HotDocs.Server.AssemblyError"));
        assert_eq!(script.requests().len(), 1);
    }

    #[tokio::test]
    async fn signature_verifies_over_wire_fields() {
        let dir = tempfile::tempdir().unwrap();
        let script = ScriptedTransport::new(vec![Ok(serde_json::json!({
            "variables": [{ "name": "Tenant", "kind": "Text" }],
        }))]);
        let template = package_template(dir.path());

        let info = client(&script)
            .get_component_info(&template, false, "portal")
            .await
            .unwrap();
        assert_eq!(info.variables[0].name, "Tenant");

        // Recompute the way the engine does, from the transmitted fields.
        let (_, body) = &script.requests()[0];
        let timestamp = chrono::NaiveDateTime::parse_from_str(
            body["timestamp"].as_str().unwrap(),
            quillwork_security::TIMESTAMP_FORMAT,
        )
        .unwrap()
        .and_utc();
        let fields = [
            SignatureField::Timestamp(timestamp),
            SignatureField::Text("acme"),
            SignatureField::Text("lease-v3"),
            SignatureField::Text("lease.docx"),
            SignatureField::Flag(false),
            SignatureField::Text("portal"),
            SignatureField::Flag(false),
        ];
        let key = SigningKey::new("signing-key").unwrap();
        assert!(key.verify(&fields, body["signature"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn interview_request_drops_disabled_urls_and_defaults_title() {
        let dir = tempfile::tempdir().unwrap();
        let script = ScriptedTransport::new(vec![Ok(serde_json::json!({
            "html_fragment": "<div id=\"interview\"></div>",
        }))]);
        let template = package_template(dir.path());
        let mut settings = InterviewSettings {
            disable_save_answers: true,
            ..Default::default()
        };
        settings
            .settings
            .insert("SaveAnswersPageUrl".into(), "/save".into());
        settings
            .settings
            .insert("TempInterviewUrl".into(), "/img".into());

        let result = client(&script)
            .get_interview(&template, &AnswerSet::new(), &settings, &["Tenant".into()], "")
            .await
            .unwrap();
        assert!(result.html_fragment.contains("interview"));

        let (op, body) = &script.requests()[0];
        assert_eq!(*op, Operation::GetInterview);
        assert_eq!(body["title"], "lease");
        assert_eq!(body["temp_interview_url"], "/img");
        assert_eq!(body["format"], "JavaScript");
        assert!(body["settings"].get("SaveAnswersPageUrl").is_none());
        assert_eq!(body["marked_variables"][0], "Tenant");
    }

    #[tokio::test]
    async fn non_package_location_is_unsupported() {
        let script = ScriptedTransport::new(vec![]);
        let template = Template::new("a.docx", Arc::new(PathTemplateLocation::new("/t")));
        let err = client(&script)
            .assemble_document(&template, &AnswerSet::new(), &Default::default(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedLocation(_)));
        assert!(script.requests().is_empty());
    }

    #[tokio::test]
    async fn get_answers_requires_input_and_combines() {
        let mut combined = AnswerSet::new();
        combined.set("A", 1.0);
        let script = ScriptedTransport::new(vec![Ok(serde_json::json!({
            "answers": combined.to_document().unwrap(),
        }))]);
        let client = client(&script);

        assert!(matches!(
            client.get_answers(&[], "").await,
            Err(ServiceError::InvalidArgument(_))
        ));
        assert!(script.requests().is_empty());

        let result = client
            .get_answers(&[AnswerSet::new(), combined.clone()], "")
            .await
            .unwrap();
        assert_eq!(result, combined);
        assert_eq!(script.requests()[0].1["answers"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_finite_answer_rejected_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let script = ScriptedTransport::new(vec![]);
        let template = package_template(dir.path());
        let mut answers = AnswerSet::new();
        answers.set("Rate", f64::NAN);

        let err = client(&script)
            .assemble_document(&template, &answers, &Default::default(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(m) if m.contains("Rate")));

        let err = client(&script)
            .get_answers(&[AnswerSet::new(), answers], "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
        assert!(script.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_package_file_is_unavailable_on_upload() {
        let script = ScriptedTransport::new(vec![cache_miss()]);
        let template = Template::new(
            "lease.docx",
            Arc::new(PackagePathTemplateLocation::new("gone", "/nonexistent/gone.pkg")),
        );
        let err = client(&script)
            .get_component_info(&template, false, "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PackageUnavailable(_)));
        assert_eq!(script.requests().len(), 1);
    }

    #[test]
    fn empty_subscriber_rejected() {
        let script = ScriptedTransport::new(vec![]);
        assert!(matches!(
            AssemblyClient::new(" ", SigningKey::new("k").unwrap(), Arc::new(SharedTransport(script))),
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn retain_flag_is_sent_in_settings() {
        let dir = tempfile::tempdir().unwrap();
        let script = ScriptedTransport::new(vec![assembled(&AnswerSet::new())]);
        let template = package_template(dir.path());
        let settings = AssembleDocumentSettings {
            format: DocumentType::Pdf,
            retain_transient_answers: true,
            settings: BTreeMap::new(),
            ..Default::default()
        };

        let mut result = client(&script)
            .assemble_document(&template, &AnswerSet::new(), &settings, "")
            .await
            .unwrap();
        assert_eq!(result.extract_document().unwrap().document_type, DocumentType::Pdf);

        let (_, body) = &script.requests()[0];
        assert_eq!(body["settings"]["RetainTransientAnswers"], "True");
        assert_eq!(
            body["output_format"],
            (OutputFormat::PDF | OutputFormat::ANSWERS).bits()
        );
    }
}

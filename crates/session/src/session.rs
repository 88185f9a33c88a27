//! WorkSession: drives a template through its interviews and documents.
//!
//! The session owns the answer set and the work queue. Each step asks the
//! [`AssemblyService`] to do the remote work for the current item, folds the
//! returned answers back into the answer set, queues any templates the step
//! discovered, and completes the item.
//!
//! A session has a single owner; every mutating operation takes `&mut self`.

use std::sync::Arc;

use quillwork_core::{
    AnswerSet, AssembleDocumentResult, AssembleDocumentSettings, AssemblyService, Document,
    DocumentType, InterviewFormat, InterviewResult, InterviewSettings, Result, SessionError,
    Template, TemplateType,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::queue::WorkQueue;
use crate::work_item::WorkItem;

/// Callbacks run around each document assembly in [`WorkSession::assemble_documents_with`].
///
/// `state` is the caller's context, threaded through every callback of one run.
pub trait AssemblyHooks<S> {
    /// Runs before the assembly request. May adjust the per-item settings.
    fn before_assembly(
        &mut self,
        _template: &Template,
        _answers: &AnswerSet,
        _settings: &mut AssembleDocumentSettings,
        _state: &mut S,
    ) {
    }

    /// Runs after a successful assembly, before its results are applied.
    fn after_assembly(
        &mut self,
        _template: &Template,
        _result: &AssembleDocumentResult,
        _state: &mut S,
    ) {
    }
}

/// No callbacks.
pub struct NoHooks;

impl<S> AssemblyHooks<S> for NoHooks {}

pub struct WorkSession {
    id: Uuid,
    service: Arc<dyn AssemblyService>,
    queue: WorkQueue,
    answers: AnswerSet,
    default_assembly_settings: AssembleDocumentSettings,
    default_interview_settings: InterviewSettings,
}

impl WorkSession {
    pub fn new(service: Arc<dyn AssemblyService>, template: Template) -> Self {
        let queue = WorkQueue::for_template(&template);
        let id = Uuid::new_v4();
        info!(
            session = %id,
            template = %template.file_name,
            items = queue.len(),
            service = service.name(),
            "Work session started"
        );
        Self {
            id,
            service,
            queue,
            answers: AnswerSet::new(),
            default_assembly_settings: AssembleDocumentSettings::default(),
            default_interview_settings: InterviewSettings::default(),
        }
    }

    /// Start from existing answers.
    pub fn with_answers(mut self, answers: AnswerSet) -> Self {
        self.answers = answers;
        self
    }

    pub fn with_default_assembly_settings(mut self, settings: AssembleDocumentSettings) -> Self {
        self.default_assembly_settings = settings;
        self
    }

    pub fn with_default_interview_settings(mut self, settings: InterviewSettings) -> Self {
        self.default_interview_settings = settings;
        self
    }

    /// Identifies this session in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn work_items(&self) -> &[WorkItem] {
        self.queue.items()
    }

    pub fn current_item(&self) -> Option<&WorkItem> {
        self.queue.current()
    }

    pub fn is_completed(&self) -> bool {
        self.queue.is_completed()
    }

    pub fn default_assembly_settings_mut(&mut self) -> &mut AssembleDocumentSettings {
        &mut self.default_assembly_settings
    }

    pub fn default_interview_settings_mut(&mut self) -> &mut InterviewSettings {
        &mut self.default_interview_settings
    }

    /// Fetch the interview for the current item.
    ///
    /// The title defaults to the template's title.
    pub async fn current_interview(
        &self,
        settings: &InterviewSettings,
        marked_variables: &[String],
        billing_ref: &str,
    ) -> Result<InterviewResult> {
        let item = self.queue.current().ok_or(SessionError::Completed)?;
        if !item.is_interview() {
            return Err(SessionError::NotAnInterview.into());
        }

        let template = item.template();
        let mut settings = settings.clone();
        if settings.title.is_none() {
            settings.title = Some(template.title().to_string());
        }

        let interview = self
            .service
            .get_interview(template, &self.answers, &settings, marked_variables, billing_ref)
            .await?;
        Ok(interview)
    }

    /// Fetch the current interview with the default settings, overriding their
    /// format unless `format` is `Unspecified`.
    pub async fn current_interview_with_format(
        &self,
        format: InterviewFormat,
        billing_ref: &str,
    ) -> Result<InterviewResult> {
        let mut settings = self.default_interview_settings.clone();
        if format != InterviewFormat::Unspecified {
            settings.format = format;
        }
        self.current_interview(&settings, &[], billing_ref).await
    }

    /// Record answers posted back from the current interview and complete it.
    ///
    /// Does nothing, and leaves the answers untouched, unless the current item
    /// is an interview. An interview-only template is assembled silently so
    /// its logic runs and any templates it queues are inserted.
    pub async fn finish_interview(&mut self, posted_answers: &AnswerSet) -> Result<()> {
        let Some(index) = self.queue.current_index() else {
            debug!("finish_interview on a completed session");
            return Ok(());
        };
        let item = &self.queue.items()[index];
        if !item.is_interview() {
            debug!(index, "finish_interview while current item is a document");
            return Ok(());
        }
        let template = item.template().clone();

        self.answers.overlay(posted_answers);
        if template.template_type() == TemplateType::InterviewOnly {
            let mut settings = self.default_assembly_settings.clone();
            settings.format = DocumentType::Native;
            settings.retain_transient_answers |= !self.queue.is_last(index);

            info!(session = %self.id, template = %template.file_name, index, "Running interview-only template");
            let result = self
                .service
                .assemble_document(&template, &self.answers, &settings, "")
                .await?;
            self.answers.load(result.answers);
            self.queue.insert_pending(&result.pending_assemblies, index);
        }

        if let Some(item) = self.queue.get_mut(index) {
            item.complete();
        }
        Ok(())
    }

    /// Assemble the contiguous run of document items starting at the current item.
    pub async fn assemble_documents(&mut self, billing_ref: &str) -> Result<Vec<Document>> {
        self.assemble_documents_with(&mut NoHooks, &mut (), billing_ref)
            .await
    }

    /// [`WorkSession::assemble_documents`] with callbacks around each assembly.
    ///
    /// Returns an empty list, with no side effects, when the current item is an
    /// interview or the session is complete. Templates discovered while
    /// assembling are inserted after their parent and, if they are documents
    /// too, assembled in the same run.
    ///
    /// On error the failing item stays current and the documents assembled
    /// earlier in the run are not returned, although their items remain
    /// completed. Callers that need them should collect them from
    /// [`AssemblyHooks::after_assembly`].
    pub async fn assemble_documents_with<S, H>(
        &mut self,
        hooks: &mut H,
        state: &mut S,
        billing_ref: &str,
    ) -> Result<Vec<Document>>
    where
        H: AssemblyHooks<S> + ?Sized,
    {
        let mut documents = Vec::new();
        let Some(mut index) = self.queue.current_index() else {
            return Ok(documents);
        };

        while let Some(item) = self.queue.get(index).filter(|item| item.is_document()) {
            let template = item.template().clone();

            let mut settings = self.default_assembly_settings.clone();
            settings.format = template.native_document_type();
            settings.retain_transient_answers |= !self.queue.is_last(index);

            hooks.before_assembly(&template, &self.answers, &mut settings, state);

            info!(
                session = %self.id,
                template = %template.file_name,
                index,
                format = ?settings.format,
                "Assembling work item"
            );
            let mut result = self
                .service
                .assemble_document(&template, &self.answers, &settings, billing_ref)
                .await?;

            hooks.after_assembly(&template, &result, state);

            self.answers.load(result.answers.clone());
            self.queue.insert_pending(&result.pending_assemblies, index);
            let document = result.extract_document();
            if let Some(item) = self.queue.get_mut(index) {
                item.set_unanswered_variables(std::mem::take(&mut result.unanswered_variables));
                item.complete();
            }

            match document {
                Some(document) => documents.push(document),
                None => warn!(template = %template.file_name, "Assembly returned no document"),
            }

            index += 1;
        }

        Ok(documents)
    }
}

impl std::fmt::Debug for WorkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkSession")
            .field("id", &self.id)
            .field("service", &self.service.name())
            .field("items", &self.queue.len())
            .field("current", &self.queue.current_index())
            .field("answers", &self.answers.len())
            .finish()
    }
}

//! Work items: one interview or one document-generation step.

use quillwork_core::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemKind {
    Interview,
    Document,
}

/// A step in a work session. Items only ever move from pending to completed.
#[derive(Debug, Clone)]
pub enum WorkItem {
    Interview {
        template: Template,
        completed: bool,
    },
    Document {
        template: Template,
        completed: bool,
        /// Variables asked for during assembly that had no answer.
        unanswered_variables: Vec<String>,
    },
}

impl WorkItem {
    pub fn interview(template: Template) -> Self {
        WorkItem::Interview {
            template,
            completed: false,
        }
    }

    pub fn document(template: Template) -> Self {
        WorkItem::Document {
            template,
            completed: false,
            unanswered_variables: Vec::new(),
        }
    }

    pub fn kind(&self) -> WorkItemKind {
        match self {
            WorkItem::Interview { .. } => WorkItemKind::Interview,
            WorkItem::Document { .. } => WorkItemKind::Document,
        }
    }

    pub fn template(&self) -> &Template {
        match self {
            WorkItem::Interview { template, .. } | WorkItem::Document { template, .. } => template,
        }
    }

    pub fn is_completed(&self) -> bool {
        match self {
            WorkItem::Interview { completed, .. } | WorkItem::Document { completed, .. } => {
                *completed
            }
        }
    }

    pub fn is_interview(&self) -> bool {
        self.kind() == WorkItemKind::Interview
    }

    pub fn is_document(&self) -> bool {
        self.kind() == WorkItemKind::Document
    }

    /// Unanswered variables recorded at assembly. Always empty for interviews.
    pub fn unanswered_variables(&self) -> &[String] {
        match self {
            WorkItem::Document {
                unanswered_variables,
                ..
            } => unanswered_variables,
            WorkItem::Interview { .. } => &[],
        }
    }

    pub(crate) fn complete(&mut self) {
        match self {
            WorkItem::Interview { completed, .. } | WorkItem::Document { completed, .. } => {
                *completed = true
            }
        }
    }

    pub(crate) fn set_unanswered_variables(&mut self, variables: Vec<String>) {
        if let WorkItem::Document {
            unanswered_variables,
            ..
        } = self
        {
            *unanswered_variables = variables;
        }
    }
}

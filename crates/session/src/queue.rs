//! WorkQueue: the ordered work items of a session.
//!
//! Items are never removed or reordered. New items are inserted directly
//! after the item whose assembly discovered them, so the queue grows while it
//! is being walked. The current item is the first one not yet completed.

use quillwork_core::Template;
use tracing::debug;

use crate::work_item::WorkItem;

#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    items: Vec<WorkItem>,
}

/// The items a template contributes: an interview if it has one, then a
/// document if it generates one.
fn items_for(template: &Template) -> impl Iterator<Item = WorkItem> {
    let interview = template
        .has_interview()
        .then(|| WorkItem::interview(template.clone()));
    let document = template
        .generates_document()
        .then(|| WorkItem::document(template.clone()));
    interview.into_iter().chain(document)
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue for a root template.
    pub fn for_template(template: &Template) -> Self {
        Self {
            items: items_for(template).collect(),
        }
    }

    /// Insert the items of `templates`, in order, starting at `after_index + 1`.
    ///
    /// Returns the number of items inserted. Templates with neither an
    /// interview nor a document contribute nothing.
    pub fn insert_pending(&mut self, templates: &[Template], after_index: usize) -> usize {
        let mut position = (after_index + 1).min(self.items.len());
        let start = position;
        for template in templates {
            for item in items_for(template) {
                self.items.insert(position, item);
                position += 1;
            }
        }
        let inserted = position - start;
        if inserted > 0 {
            debug!(after_index, inserted, "Inserted pending work items");
        }
        inserted
    }

    /// Index of the first pending item.
    pub fn current_index(&self) -> Option<usize> {
        self.items.iter().position(|item| !item.is_completed())
    }

    pub fn current(&self) -> Option<&WorkItem> {
        self.current_index().map(|i| &self.items[i])
    }

    pub fn is_completed(&self) -> bool {
        self.current_index().is_none()
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.items.len()
    }

    pub fn get(&self, index: usize) -> Option<&WorkItem> {
        self.items.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut WorkItem> {
        self.items.get_mut(index)
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::WorkItemKind;
    use quillwork_core::PathTemplateLocation;
    use std::sync::Arc;

    fn template(name: &str) -> Template {
        Template::new(name, Arc::new(PathTemplateLocation::new("/templates")))
    }

    fn shape(queue: &WorkQueue) -> Vec<(String, WorkItemKind, bool)> {
        queue
            .items()
            .iter()
            .map(|i| (i.template().file_name.clone(), i.kind(), i.is_completed()))
            .collect()
    }

    #[test]
    fn root_with_interview_and_document() {
        let queue = WorkQueue::for_template(&template("lease.docx"));
        assert_eq!(queue.len(), 2);
        assert!(queue.items()[0].is_interview());
        assert!(queue.items()[1].is_document());
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn root_shapes() {
        assert_eq!(WorkQueue::for_template(&template("intake.cmp")).len(), 1);
        assert_eq!(
            WorkQueue::for_template(&template("letter.rtf").with_switches("/ni")).len(),
            1
        );
        let empty = WorkQueue::for_template(&template("data.cmp").with_switches("/ni"));
        assert!(empty.is_empty());
        assert!(empty.is_completed());
    }

    #[test]
    fn pending_inserted_after_trigger_in_order() {
        let mut queue = WorkQueue::for_template(&template("root.docx"));
        queue.items.push(WorkItem::document(template("tail.docx")));

        let t1 = template("t1.docx");
        let t2 = template("t2.docx").with_switches("/ni");
        let inserted = queue.insert_pending(&[t1, t2], 1);
        assert_eq!(inserted, 3);

        assert_eq!(
            shape(&queue),
            vec![
                ("root.docx".into(), WorkItemKind::Interview, false),
                ("root.docx".into(), WorkItemKind::Document, false),
                ("t1.docx".into(), WorkItemKind::Interview, false),
                ("t1.docx".into(), WorkItemKind::Document, false),
                ("t2.docx".into(), WorkItemKind::Document, false),
                ("tail.docx".into(), WorkItemKind::Document, false),
            ]
        );
    }

    #[test]
    fn template_without_interview_or_document_adds_nothing() {
        let mut queue = WorkQueue::for_template(&template("root.docx"));
        let inserted = queue.insert_pending(&[template("data.cmp").with_switches("/NI")], 0);
        assert_eq!(inserted, 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn current_is_first_pending() {
        let mut queue = WorkQueue::for_template(&template("root.docx"));
        queue.insert_pending(&[template("child.docx")], 1);

        for expected in 0..queue.len() {
            assert_eq!(queue.current_index(), Some(expected));
            queue.get_mut(expected).unwrap().complete();
        }
        assert!(queue.current().is_none());
        assert!(queue.is_completed());
    }

    #[test]
    fn unanswered_variables_only_stick_to_documents() {
        let mut queue = WorkQueue::for_template(&template("root.docx"));
        let vars = vec!["Landlord".to_string()];
        queue.get_mut(0).unwrap().set_unanswered_variables(vars.clone());
        queue.get_mut(1).unwrap().set_unanswered_variables(vars.clone());
        assert!(queue.items()[0].unanswered_variables().is_empty());
        assert_eq!(queue.items()[1].unanswered_variables(), vars.as_slice());
    }
}

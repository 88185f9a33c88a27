//! Work sessions for Quillwork.
//!
//! A [`WorkSession`] takes a root template through its interviews and
//! documents, queueing further templates as assembly discovers them.

pub mod queue;
pub mod session;
pub mod work_item;

pub use queue::WorkQueue;
pub use session::{AssemblyHooks, NoHooks, WorkSession};
pub use work_item::{WorkItem, WorkItemKind};

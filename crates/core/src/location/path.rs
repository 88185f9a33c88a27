//! Templates stored in a plain directory on disk.

use std::any::Any;
use std::path::{Path, PathBuf};

use super::{LocationKind, TemplateLocation, read_colocated};
use crate::error::LocationError;

/// A directory containing a template and its dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplateLocation {
    directory: PathBuf,
}

impl PathTemplateLocation {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl TemplateLocation for PathTemplateLocation {
    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn get_file(&self, file_name: &str) -> Result<Vec<u8>, LocationError> {
        read_colocated(&self.directory, file_name)
    }

    fn serialize_content(&self) -> String {
        self.directory.to_string_lossy().into_owned()
    }

    fn same_location(&self, other: &dyn TemplateLocation) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| o == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn template_directory(&self) -> Option<&Path> {
        Some(&self.directory)
    }
}

impl LocationKind for PathTemplateLocation {
    const TAG: &'static str = "path";

    fn from_content(content: &str) -> Result<Self, LocationError> {
        if content.trim().is_empty() {
            return Err(LocationError::InvalidLocatorContent {
                tag: Self::TAG.into(),
                reason: "empty directory".into(),
            });
        }
        Ok(Self::new(content))
    }
}

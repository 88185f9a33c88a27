//! Templates inside a template package file on disk.
//!
//! The engine caches packages by id. The client only uploads the package
//! bytes when the engine reports a cache miss. Files inside the package are
//! read from its extracted directory: the package path without its extension
//! (`/pkgs/lease.pkg` → `/pkgs/lease/`).

use std::any::Any;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{LocationKind, PackageLocation, TemplateLocation, read_colocated};
use crate::error::LocationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagePathTemplateLocation {
    package_id: String,
    package_path: PathBuf,
}

impl PackagePathTemplateLocation {
    pub fn new(package_id: impl Into<String>, package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_id: package_id.into(),
            package_path: package_path.into(),
        }
    }

    pub fn package_path(&self) -> &Path {
        &self.package_path
    }

    /// Directory the package is extracted into.
    pub fn extracted_directory(&self) -> PathBuf {
        self.package_path.with_extension("")
    }
}

impl TemplateLocation for PackagePathTemplateLocation {
    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn get_file(&self, file_name: &str) -> Result<Vec<u8>, LocationError> {
        read_colocated(&self.extracted_directory(), file_name)
    }

    fn serialize_content(&self) -> String {
        // Two string fields always serialize.
        serde_json::to_string(self).unwrap_or_default()
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

    fn as_package(&self) -> Option<&dyn PackageLocation> {
        Some(self)
    }
}

impl PackageLocation for PackagePathTemplateLocation {
    fn package_id(&self) -> &str {
        &self.package_id
    }

    fn read_package(&self) -> Result<Vec<u8>, LocationError> {
        std::fs::read(&self.package_path).map_err(|e| LocationError::Io {
            path: self.package_path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl LocationKind for PackagePathTemplateLocation {
    const TAG: &'static str = "package-path";

    fn from_content(content: &str) -> Result<Self, LocationError> {
        let loc: Self =
            serde_json::from_str(content).map_err(|e| LocationError::InvalidLocatorContent {
                tag: Self::TAG.into(),
                reason: e.to_string(),
            })?;
        if loc.package_id.is_empty() {
            return Err(LocationError::InvalidLocatorContent {
                tag: Self::TAG.into(),
                reason: "empty package id".into(),
            });
        }
        Ok(loc)
    }
}

//! Template locations: where a template and its dependent files live.
//!
//! A location may be a directory on disk, a template package, a document
//! management system, or anything else a host implements. Every location can
//! be turned into a **locator**: an opaque, encrypted string
//! `encrypt(tag + "|" + content)` from which the [`LocationRegistry`] can
//! rebuild an equal location later (e.g. in another request).
//!
//! Host-defined variants implement [`TemplateLocation`] plus [`LocationKind`]
//! and are registered by tag at start-up.

use std::any::Any;
use std::fmt;
use std::path::Path;

use crate::error::LocationError;

mod package;
mod path;
pub mod registry;

pub use package::PackagePathTemplateLocation;
pub use path::PathTemplateLocation;
pub use registry::{LocationConstructor, LocationRegistry, LocationRegistryBuilder};

/// Separator between the type tag and the serialized content inside a locator.
pub const LOCATOR_SEPARATOR: char = '|';

/// Reversible encryption applied to locator strings.
///
/// Implemented by `quillwork_security::LocatorCipher`; consumers must treat
/// the output as opaque ciphertext.
pub trait LocatorCodec: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, LocationError>;

    fn decrypt(&self, locator: &str) -> Result<String, LocationError>;
}

/// A place templates live.
pub trait TemplateLocation: fmt::Debug + Send + Sync {
    /// Stable tag identifying this variant inside locators (e.g. `"path"`).
    fn type_tag(&self) -> &str;

    /// Read a file living at the same location as the template.
    ///
    /// `file_name` must be a bare file name; path separators are rejected.
    fn get_file(&self, file_name: &str) -> Result<Vec<u8>, LocationError>;

    /// Content string from which [`LocationKind::from_content`] rebuilds this location.
    fn serialize_content(&self) -> String;

    /// Variant-aware equality.
    fn same_location(&self, other: &dyn TemplateLocation) -> bool;

    fn as_any(&self) -> &dyn Any;

    /// Directory holding the template files, for locations resident on disk.
    fn template_directory(&self) -> Option<&Path> {
        None
    }

    /// Package view of this location, for locations backed by a template package.
    fn as_package(&self) -> Option<&dyn PackageLocation> {
        None
    }

    /// Encrypted locator string for this location.
    fn create_locator(&self, codec: &dyn LocatorCodec) -> Result<String, LocationError> {
        codec.encrypt(&format!(
            "{}{}{}",
            self.type_tag(),
            LOCATOR_SEPARATOR,
            self.serialize_content()
        ))
    }
}

impl PartialEq for dyn TemplateLocation {
    fn eq(&self, other: &Self) -> bool {
        self.same_location(other)
    }
}

/// Constructor side of a location variant, used by the registry.
pub trait LocationKind: TemplateLocation + Sized + 'static {
    /// The tag this variant writes into its locators.
    const TAG: &'static str;

    /// Build an instance from a string produced by [`TemplateLocation::serialize_content`].
    fn from_content(content: &str) -> Result<Self, LocationError>;
}

/// A location backed by a template package that the engine may cache by id.
pub trait PackageLocation: Send + Sync {
    fn package_id(&self) -> &str;

    /// The complete package bytes, uploaded when the engine's cache misses.
    fn read_package(&self) -> Result<Vec<u8>, LocationError>;
}

/// Reject file names that would escape the location's directory.
pub fn validate_file_name(file_name: &str) -> Result<(), LocationError> {
    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name == "."
        || file_name == ".."
    {
        return Err(LocationError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

/// Read a file under `dir` after validating its name.
pub(crate) fn read_colocated(dir: &Path, file_name: &str) -> Result<Vec<u8>, LocationError> {
    validate_file_name(file_name)?;
    let path = dir.join(file_name);
    std::fs::read(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LocationError::FileNotFound(path.display().to_string()),
        _ => LocationError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        },
    })
}

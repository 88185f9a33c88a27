//! Location registry: decodes locators back into template locations.
//!
//! The registry has two phases. During start-up a [`LocationRegistryBuilder`]
//! collects `tag → constructor` entries; [`LocationRegistryBuilder::finalize`]
//! then produces an immutable [`LocationRegistry`] that is safe to share
//! across threads. A process may install one finalized registry globally with
//! [`install_global`]; after that, registration is no longer possible.
//!
//! Lookup scans entries in registration order and the first matching tag wins.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use super::{
    LOCATOR_SEPARATOR, LocationKind, LocatorCodec, PackagePathTemplateLocation,
    PathTemplateLocation, TemplateLocation,
};
use crate::error::LocationError;

/// Builds a location from the content part of a locator.
pub type LocationConstructor =
    Box<dyn Fn(&str) -> Result<Arc<dyn TemplateLocation>, LocationError> + Send + Sync>;

struct RegistryEntry {
    tag: String,
    construct: LocationConstructor,
}

/// Start-up phase: collects location variants.
pub struct LocationRegistryBuilder {
    codec: Arc<dyn LocatorCodec>,
    entries: Vec<RegistryEntry>,
}

impl LocationRegistryBuilder {
    pub fn new(codec: Arc<dyn LocatorCodec>) -> Self {
        Self {
            codec,
            entries: Vec::new(),
        }
    }

    /// Register a variant under its own [`LocationKind::TAG`].
    pub fn register<T: LocationKind>(&mut self) -> &mut Self {
        self.register_with(T::TAG, |content| {
            T::from_content(content).map(|loc| Arc::new(loc) as Arc<dyn TemplateLocation>)
        })
    }

    /// Register an explicit constructor for `tag`.
    ///
    /// Registering a tag twice is allowed but the later entry is never reached.
    pub fn register_with<F>(&mut self, tag: impl Into<String>, construct: F) -> &mut Self
    where
        F: Fn(&str) -> Result<Arc<dyn TemplateLocation>, LocationError> + Send + Sync + 'static,
    {
        let tag = tag.into();
        if self.entries.iter().any(|e| e.tag == tag) {
            debug!(tag = %tag, "Location tag registered more than once; first registration wins");
        }
        self.entries.push(RegistryEntry {
            tag,
            construct: Box::new(construct),
        });
        self
    }

    /// Register the built-in `path` and `package-path` variants.
    pub fn with_builtin_locations(&mut self) -> &mut Self {
        self.register::<PathTemplateLocation>()
            .register::<PackagePathTemplateLocation>()
    }

    /// Freeze the registry. No further registration is possible.
    pub fn finalize(self) -> LocationRegistry {
        info!(locations = self.entries.len(), "Location registry finalized");
        LocationRegistry {
            codec: self.codec,
            entries: self.entries,
        }
    }
}

/// Read-only phase: decodes and encodes locators.
pub struct LocationRegistry {
    codec: Arc<dyn LocatorCodec>,
    entries: Vec<RegistryEntry>,
}

impl LocationRegistry {
    pub fn builder(codec: Arc<dyn LocatorCodec>) -> LocationRegistryBuilder {
        LocationRegistryBuilder::new(codec)
    }

    /// Rebuild a location from a locator string.
    pub fn locate(&self, locator: &str) -> Result<Arc<dyn TemplateLocation>, LocationError> {
        let plain = self.codec.decrypt(locator)?;
        let (tag, content) = plain.split_once(LOCATOR_SEPARATOR).ok_or_else(|| {
            LocationError::MalformedLocator("missing type separator".into())
        })?;

        let entry = self
            .entries
            .iter()
            .find(|e| e.tag == tag)
            .ok_or_else(|| LocationError::UnregisteredLocationType(tag.to_string()))?;

        (entry.construct)(content).map_err(|e| match e {
            LocationError::InvalidLocatorContent { .. } => e,
            other => LocationError::InvalidLocatorContent {
                tag: tag.to_string(),
                reason: other.to_string(),
            },
        })
    }

    /// Encode `location` as a locator string with this registry's codec.
    pub fn create_locator(&self, location: &dyn TemplateLocation) -> Result<String, LocationError> {
        location.create_locator(self.codec.as_ref())
    }

    pub fn codec(&self) -> &dyn LocatorCodec {
        self.codec.as_ref()
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.entries.iter().any(|e| e.tag == tag)
    }

    /// Registered tags, in registration order.
    pub fn tags(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.tag.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for LocationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

static GLOBAL_REGISTRY: OnceLock<LocationRegistry> = OnceLock::new();

/// Install the process-wide registry. Succeeds only once.
pub fn install_global(registry: LocationRegistry) -> Result<&'static LocationRegistry, LocationError> {
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| LocationError::RegistryAlreadyInstalled)?;
    global()
}

/// The process-wide registry installed by [`install_global`].
pub fn global() -> Result<&'static LocationRegistry, LocationError> {
    GLOBAL_REGISTRY.get().ok_or(LocationError::RegistryNotInstalled)
}

pub mod answers;
pub mod assemble;
pub mod component_info;
pub mod config_cmd;
pub mod locator;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use quillwork_client::AssemblyClient;
use quillwork_config::AppConfig;
use quillwork_core::{LocationRegistry, Template};
use quillwork_security::LocatorCipher;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.context("Failed to load config")
}

/// Registry of the built-in location types, keyed by `[locator] key`.
pub fn registry(config: &AppConfig) -> anyhow::Result<LocationRegistry> {
    let key = config
        .locator
        .key
        .as_deref()
        .context("No locator key configured (set [locator] key or QUILLWORK_LOCATOR_KEY)")?;
    let mut builder = LocationRegistry::builder(Arc::new(LocatorCipher::new(key)));
    builder.with_builtin_locations();
    Ok(builder.finalize())
}

pub fn locate_template(config: &AppConfig, locator: &str) -> anyhow::Result<Template> {
    let registry = registry(config)?;
    Template::locate(&registry, locator).context("Invalid template locator")
}

pub fn client(config: &AppConfig) -> anyhow::Result<AssemblyClient> {
    quillwork_client::from_config(&config.service).context("Cannot build engine client")
}

//! `quillwork config`: Configuration management commands.

use std::path::Path;

use clap::Subcommand;
use quillwork_config::AppConfig;

const REDACTED: &str = "[REDACTED]";

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration, secrets redacted
    Show,

    /// Print the config file path
    Path,

    /// Check the configuration and report what is missing
    Validate,

    /// Print a default config file
    Init,
}

pub fn run(config: &AppConfig, path: Option<&Path>, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => println!("{}", show(config)?),
        ConfigAction::Path => {
            let config_path = match path {
                Some(path) => path.to_path_buf(),
                None => AppConfig::config_dir().join("config.toml"),
            };
            println!("{}", config_path.display());
        }
        ConfigAction::Validate => validate(config),
        ConfigAction::Init => println!("{}", AppConfig::default_toml()),
    }
    Ok(())
}

fn show(config: &AppConfig) -> anyhow::Result<String> {
    let mut config = config.clone();
    if config.service.signing_key.is_some() {
        config.service.signing_key = Some(REDACTED.into());
    }
    if config.locator.key.is_some() {
        config.locator.key = Some(REDACTED.into());
    }
    Ok(toml::to_string_pretty(&config)?)
}

fn validate(config: &AppConfig) {
    println!("Validating configuration...");

    let mut warnings = Vec::new();
    if config.service.endpoint.is_none() {
        warnings.push("No engine endpoint (set [service] endpoint or QUILLWORK_ENDPOINT)");
    }
    if config.service.subscriber_id.is_none() {
        warnings.push("No subscriber id (set [service] subscriber_id or QUILLWORK_SUBSCRIBER_ID)");
    }
    if config.service.signing_key.is_none() {
        warnings.push("No signing key (set [service] signing_key or QUILLWORK_SIGNING_KEY)");
    }
    if config.locator.key.is_none() {
        warnings.push("No locator key (set [locator] key or QUILLWORK_LOCATOR_KEY)");
    }

    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!(
        "   Endpoint:  {}",
        config.service.endpoint.as_deref().unwrap_or("(none)")
    );
    println!("   Timeout:   {}s", config.service.timeout_secs);
    println!("   Interview: {:?}", config.interview.format);
}

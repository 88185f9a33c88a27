//! `quillwork locator`: Create and inspect template locators.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Subcommand};
use quillwork_config::AppConfig;
use quillwork_core::{
    LocationRegistry, PackagePathTemplateLocation, PathTemplateLocation, Template,
    TemplateLocation,
};

#[derive(Subcommand)]
pub enum LocatorAction {
    /// Encode a template and its location as a locator
    Create(CreateArgs),

    /// Decode a locator and print what it points at
    Inspect {
        locator: String,
    },
}

#[derive(Args)]
pub struct CreateArgs {
    /// Template file name
    pub file_name: String,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Package id (defaults to the package file stem)
    #[arg(long, requires = "package")]
    pub package_id: Option<String>,

    /// Template switches, e.g. "/ni"
    #[arg(long, default_value = "")]
    pub switches: String,

    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct LocationArgs {
    /// Directory containing the template
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Package file containing the template
    #[arg(long)]
    pub package: Option<PathBuf>,
}

pub fn run(config: &AppConfig, action: LocatorAction) -> anyhow::Result<()> {
    let registry = super::registry(config)?;
    match action {
        LocatorAction::Create(args) => {
            let locator = create(&registry, args)?;
            println!("{locator}");
        }
        LocatorAction::Inspect { locator } => {
            let template = Template::locate(&registry, &locator).context("Invalid locator")?;
            print!("{}", describe(&template));
        }
    }
    Ok(())
}

fn create(registry: &LocationRegistry, args: CreateArgs) -> anyhow::Result<String> {
    let location: Arc<dyn TemplateLocation> = match (args.location.dir, args.location.package) {
        (Some(dir), _) => Arc::new(PathTemplateLocation::new(dir)),
        (None, Some(package)) => {
            let package_id = match args.package_id {
                Some(id) => id,
                None => package
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
                    .context("Cannot derive a package id from the package path")?,
            };
            Arc::new(PackagePathTemplateLocation::new(package_id, package))
        }
        (None, None) => anyhow::bail!("Either --dir or --package is required"),
    };

    let mut template = Template::new(args.file_name, location).with_switches(args.switches);
    template.title = args.title;

    tracing::debug!(template = %template.file_name, location = template.location.type_tag(), "Creating locator");
    template
        .create_locator(registry)
        .context("Failed to create locator")
}

fn describe(template: &Template) -> String {
    let mut out = String::new();
    out.push_str(&format!("File:      {}\n", template.file_name));
    out.push_str(&format!("Title:     {}\n", template.title()));
    out.push_str(&format!("Type:      {:?}\n", template.template_type()));
    out.push_str(&format!("Switches:  {}\n", template.switches));
    out.push_str(&format!("Location:  {}\n", template.location.type_tag()));
    out.push_str(&format!("Content:   {}\n", template.location.serialize_content()));
    if let Some(package) = template.location.as_package() {
        out.push_str(&format!("Package:   {}\n", package.package_id()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillwork_security::LocatorCipher;

    fn registry() -> LocationRegistry {
        let mut builder = LocationRegistry::builder(Arc::new(LocatorCipher::new("cli-test")));
        builder.with_builtin_locations();
        builder.finalize()
    }

    #[test]
    fn package_locator_round_trips() {
        let registry = registry();
        let args = CreateArgs {
            file_name: "lease.docx".into(),
            location: LocationArgs {
                dir: None,
                package: Some(PathBuf::from("/srv/packages/leases.pkg")),
            },
            package_id: None,
            switches: "/ni".into(),
            title: Some("Residential Lease".into()),
        };

        let locator = create(&registry, args).unwrap();
        let template = Template::locate(&registry, &locator).unwrap();
        let description = describe(&template);

        assert!(description.contains("File:      lease.docx"));
        assert!(description.contains("Title:     Residential Lease"));
        assert!(description.contains("Location:  package-path"));
        assert!(description.contains("Package:   leases"));
        assert!(!template.has_interview());
    }

    #[test]
    fn directory_locator_has_no_package() {
        let registry = registry();
        let dir = tempfile::tempdir().unwrap();
        let args = CreateArgs {
            file_name: "memo.rtf".into(),
            location: LocationArgs {
                dir: Some(dir.path().to_path_buf()),
                package: None,
            },
            package_id: None,
            switches: String::new(),
            title: None,
        };

        let locator = create(&registry, args).unwrap();
        let description = describe(&Template::locate(&registry, &locator).unwrap());
        assert!(description.contains("Location:  path"));
        assert!(description.contains("Title:     memo"));
        assert!(!description.contains("Package:"));
    }
}

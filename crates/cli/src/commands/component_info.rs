//! `quillwork component-info`: List a template's variables and dialogs.

use quillwork_config::AppConfig;
use quillwork_core::{AssemblyService, ComponentInfo};

pub async fn run(config: &AppConfig, locator: &str, include_dialogs: bool) -> anyhow::Result<()> {
    let template = super::locate_template(config, locator)?;
    let client = super::client(config)?;

    let info = client
        .get_component_info(&template, include_dialogs, &config.service.billing_ref)
        .await?;
    print!("{}", render(&info));
    Ok(())
}

fn render(info: &ComponentInfo) -> String {
    let mut out = format!("Variables ({}):\n", info.variables.len());
    for variable in &info.variables {
        out.push_str(&format!("  {:<32} {}\n", variable.name, variable.kind));
    }
    if !info.dialogs.is_empty() {
        out.push_str(&format!("Dialogs ({}):\n", info.dialogs.len()));
        for dialog in &info.dialogs {
            out.push_str(&format!("  {}: {}\n", dialog.name, dialog.variables.join(", ")));
        }
    }
    out
}

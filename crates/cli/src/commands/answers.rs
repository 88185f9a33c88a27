//! `quillwork answers`: Answer file commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use quillwork_config::AppConfig;
use quillwork_core::{AnswerSet, AssemblyService};

#[derive(Subcommand)]
pub enum AnswersAction {
    /// Overlay answer files in order; later files win
    Combine {
        /// Answer files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Combine locally instead of asking the engine
        #[arg(long)]
        local: bool,
    },
}

pub async fn run(config: &AppConfig, action: AnswersAction) -> anyhow::Result<()> {
    match action {
        AnswersAction::Combine {
            files,
            output,
            local,
        } => {
            let sets = files
                .iter()
                .map(|path| read_answer_file(path))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let combined = if local {
                combine_locally(&sets)
            } else {
                let client = super::client(config)?;
                client
                    .get_answers(&sets, &config.service.billing_ref)
                    .await?
            };

            tracing::info!(files = files.len(), answers = combined.len(), "Combined answers");
            let document = combined.to_document()?;
            match output {
                Some(path) => std::fs::write(&path, document)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{document}"),
            }
        }
    }
    Ok(())
}

pub fn read_answer_file(path: &Path) -> anyhow::Result<AnswerSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    AnswerSet::from_document(&content)
        .with_context(|| format!("Invalid answer file {}", path.display()))
}

fn combine_locally(sets: &[AnswerSet]) -> AnswerSet {
    let mut combined = AnswerSet::new();
    for set in sets {
        combined.overlay(set);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillwork_core::AnswerValue;

    fn write(dir: &Path, name: &str, pairs: &[(&str, &str)]) -> PathBuf {
        let mut set = AnswerSet::new();
        for (k, v) in pairs {
            set.set(*k, *v);
        }
        let path = dir.join(name);
        std::fs::write(&path, set.to_document().unwrap()).unwrap();
        path
    }

    #[test]
    fn later_files_win() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "a.json", &[("Client", "Ada"), ("City", "Provo")]);
        let second = write(dir.path(), "b.json", &[("Client", "Grace")]);

        let sets = vec![
            read_answer_file(&first).unwrap(),
            read_answer_file(&second).unwrap(),
        ];
        let combined = combine_locally(&sets);
        assert_eq!(combined.get("Client"), Some(&AnswerValue::Text("Grace".into())));
        assert_eq!(combined.get("City"), Some(&AnswerValue::Text("Provo".into())));
    }

    #[test]
    fn unreadable_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = read_answer_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing.json"));

        std::fs::write(&path, "not json").unwrap();
        let err = read_answer_file(&path).unwrap_err();
        assert!(err.to_string().starts_with("Invalid answer file"));
    }
}

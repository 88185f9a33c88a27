//! `quillwork assemble`: Run a work session end to end.
//!
//! Each interview in the session is answered by the next `--answers` file,
//! standing in for the answers a browser would post back.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use quillwork_config::AppConfig;
use quillwork_core::location::validate_file_name;
use quillwork_core::{AnswerSet, Document};
use quillwork_session::{WorkItem, WorkSession};
use tracing::{info, warn};

use super::answers::read_answer_file;

/// File the final answers are written to, inside the output directory.
const ANSWERS_FILE: &str = "answers.json";

#[derive(Args)]
pub struct AssembleArgs {
    /// Template locator
    pub locator: String,

    /// Answers posted for each interview, in order
    #[arg(short, long)]
    pub answers: Vec<PathBuf>,

    /// Answers the session starts with
    #[arg(long)]
    pub initial: Option<PathBuf>,

    /// Directory the documents are written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

pub async fn run(config: &AppConfig, args: AssembleArgs) -> anyhow::Result<()> {
    let template = super::locate_template(config, &args.locator)?;
    let client = Arc::new(super::client(config)?);

    let initial = match &args.initial {
        Some(path) => read_answer_file(path)?,
        None => AnswerSet::new(),
    };
    let posted = args
        .answers
        .iter()
        .map(|path| read_answer_file(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut session = WorkSession::new(client, template)
        .with_answers(initial)
        .with_default_assembly_settings(config.assembly.to_settings())
        .with_default_interview_settings(config.interview.to_settings());

    let documents = drive(&mut session, posted, &config.service.billing_ref).await?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    for path in write_documents(&args.output, &documents)? {
        println!("  wrote {}", path.display());
    }
    let answers_path = args.output.join(ANSWERS_FILE);
    std::fs::write(&answers_path, session.answers().to_document()?)
        .with_context(|| format!("Failed to write {}", answers_path.display()))?;

    print!("{}", disposition(session.work_items()));
    Ok(())
}

/// Advance the session until every item is complete.
async fn drive(
    session: &mut WorkSession,
    posted: Vec<AnswerSet>,
    billing_ref: &str,
) -> anyhow::Result<Vec<Document>> {
    let mut posted = posted.into_iter();
    let mut documents = Vec::new();

    while let Some(item) = session.current_item() {
        if item.is_interview() {
            let template = item.template().file_name.clone();
            let answers = match posted.next() {
                Some(answers) => answers,
                None => {
                    warn!(template = %template, "No answer file left for interview, posting none");
                    AnswerSet::new()
                }
            };
            info!(template = %template, answers = answers.len(), "Finishing interview");
            session.finish_interview(&answers).await?;
        } else {
            documents.extend(session.assemble_documents(billing_ref).await?);
        }
    }

    let unused = posted.count();
    if unused > 0 {
        warn!(unused, "Answer files left over after the last interview");
    }
    Ok(documents)
}

/// Write each document and its supporting files into `dir`.
///
/// Names come from the engine: a name that is not a plain file name is
/// skipped, and a name already written in this run gets a numeric suffix.
fn write_documents(dir: &Path, documents: &[Document]) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut taken = HashSet::new();
    for document in documents {
        let files = std::iter::once((document.file_name(), &document.content)).chain(
            document
                .supporting_files
                .iter()
                .map(|file| (file.name.clone(), &file.content)),
        );

        for (name, content) in files {
            if let Err(e) = validate_file_name(&name) {
                warn!(name = %name, error = %e, "Skipping output file with unsafe name");
                continue;
            }
            let name = unique_name(&name, &mut taken);
            let path = dir.join(&name);
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }
    }
    Ok(written)
}

/// `name`, or `stem-N.ext` for the first N >= 2 not yet in `taken`.
fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if taken.insert(candidate.clone()) {
            warn!(name, renamed = %candidate, "Output name already used, renaming");
            return candidate;
        }
        n += 1;
    }
}

fn disposition(items: &[WorkItem]) -> String {
    let mut out = String::from("Work items:\n");
    for item in items {
        let status = if item.is_completed() { "done" } else { "pending" };
        out.push_str(&format!(
            "  [{status}] {:?} {}\n",
            item.kind(),
            item.template().file_name
        ));
        if !item.unanswered_variables().is_empty() {
            out.push_str(&format!(
                "         unanswered: {}\n",
                item.unanswered_variables().join(", ")
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quillwork_core::{
        AssembleDocumentResult, AssembleDocumentSettings, AssemblyService, ComponentInfo,
        DocumentType, InterviewResult, InterviewSettings, NamedFile, PathTemplateLocation,
        ServiceError, Template,
    };
    use std::sync::Mutex;

    /// Echoes answers back; `root.docx` queues `appendix.rtf`.
    #[derive(Default)]
    struct EchoEngine {
        seen: Mutex<Vec<AnswerSet>>,
    }

    #[async_trait]
    impl AssemblyService for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        async fn assemble_document(
            &self,
            template: &Template,
            answers: &AnswerSet,
            settings: &AssembleDocumentSettings,
            _billing_ref: &str,
        ) -> Result<AssembleDocumentResult, ServiceError> {
            self.seen.lock().unwrap().push(answers.clone());
            let pending_assemblies = if template.file_name == "root.docx" {
                vec![Template::new("appendix.rtf", template.location.clone())]
            } else {
                Vec::new()
            };
            Ok(AssembleDocumentResult {
                document: Some(Document {
                    template_file_name: template.file_name.clone(),
                    document_type: settings.format,
                    content: template.file_name.as_bytes().to_vec(),
                    supporting_files: Vec::new(),
                }),
                answers: answers.clone(),
                pending_assemblies,
                unanswered_variables: vec!["Notary".into()],
            })
        }

        async fn get_interview(
            &self,
            _template: &Template,
            _answers: &AnswerSet,
            _settings: &InterviewSettings,
            _marked_variables: &[String],
            _billing_ref: &str,
        ) -> Result<InterviewResult, ServiceError> {
            Ok(InterviewResult::default())
        }

        async fn get_component_info(
            &self,
            _template: &Template,
            _include_dialogs: bool,
            _billing_ref: &str,
        ) -> Result<ComponentInfo, ServiceError> {
            Ok(ComponentInfo::default())
        }

        async fn get_answers(
            &self,
            _answers: &[AnswerSet],
            _billing_ref: &str,
        ) -> Result<AnswerSet, ServiceError> {
            Ok(AnswerSet::new())
        }
    }

    fn posted(name: &str, value: &str) -> AnswerSet {
        let mut set = AnswerSet::new();
        set.set(name, value);
        set
    }

    #[tokio::test]
    async fn each_interview_takes_the_next_answer_file() {
        let engine = Arc::new(EchoEngine::default());
        let root = Template::new("root.docx", Arc::new(PathTemplateLocation::new("/t")));
        let mut session = WorkSession::new(engine.clone(), root);

        let documents = drive(
            &mut session,
            vec![posted("Client", "Ada"), posted("Appendix", "B")],
            "",
        )
        .await
        .unwrap();

        let names: Vec<_> = documents.iter().map(|d| d.file_name()).collect();
        assert_eq!(names, vec!["root.docx", "appendix.rtf"]);
        assert!(session.is_completed());

        let seen = engine.seen.lock().unwrap();
        assert!(seen[0].contains("Client"));
        assert!(!seen[0].contains("Appendix"));
        assert!(seen[1].contains("Appendix"));
    }

    #[tokio::test]
    async fn missing_answer_files_still_finish_the_session() {
        let engine = Arc::new(EchoEngine::default());
        let root = Template::new("root.docx", Arc::new(PathTemplateLocation::new("/t")));
        let mut session = WorkSession::new(engine, root);

        let documents = drive(&mut session, Vec::new(), "").await.unwrap();
        assert_eq!(documents.len(), 2);

        let report = disposition(session.work_items());
        assert!(report.contains("[done] Interview appendix.rtf"));
        assert!(report.contains("unanswered: Notary"));
        assert!(!report.contains("pending"));
    }

    #[test]
    fn writes_documents_and_supporting_files() {
        let dir = tempfile::tempdir().unwrap();
        let documents = vec![Document {
            template_file_name: "flyer.docx".into(),
            document_type: DocumentType::Html,
            content: b"<html/>".to_vec(),
            supporting_files: vec![NamedFile {
                name: "logo.png".into(),
                content: vec![0x89, 0x50],
            }],
        }];

        let written = write_documents(dir.path(), &documents).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read(dir.path().join("flyer.htm")).unwrap(), b"<html/>");
        assert_eq!(std::fs::read(dir.path().join("logo.png")).unwrap(), vec![0x89, 0x50]);
    }

    #[test]
    fn unsafe_supporting_file_names_stay_inside_output() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let documents = vec![Document {
            template_file_name: "notice.docx".into(),
            document_type: DocumentType::Html,
            content: b"<p/>".to_vec(),
            supporting_files: vec![
                NamedFile {
                    name: "../escaped.txt".into(),
                    content: b"x".to_vec(),
                },
                NamedFile {
                    name: "..".into(),
                    content: b"x".to_vec(),
                },
            ],
        }];

        let written = write_documents(&out, &documents).unwrap();
        assert_eq!(written, vec![out.join("notice.htm")]);
        assert!(!root.path().join("escaped.txt").exists());
    }

    #[test]
    fn repeated_names_get_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let document = |content: &[u8]| Document {
            template_file_name: "letter.docx".into(),
            document_type: DocumentType::WordDocx,
            content: content.to_vec(),
            supporting_files: Vec::new(),
        };
        let documents = vec![document(b"first"), document(b"second"), document(b"third")];

        let written = write_documents(dir.path(), &documents).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("letter.docx"),
                dir.path().join("letter-2.docx"),
                dir.path().join("letter-3.docx"),
            ]
        );
        assert_eq!(std::fs::read(dir.path().join("letter.docx")).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join("letter-3.docx")).unwrap(), b"third");
    }
}

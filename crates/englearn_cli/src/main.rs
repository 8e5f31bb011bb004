//! Command-line consumer of `englearn_core`.
//!
//! # Responsibility
//! - Browse, filter and export resolved content from a terminal.
//! - Exercise the same resolver path the app uses, including remote writes.

use clap::{Args, Parser, Subcommand, ValueEnum};
use englearn_core::config::remote_db_path_from_env;
use englearn_core::{
    export_questions, export_rules, filter_questions, filter_rules, init_logging, CsvLabels,
    DataResolver, EntityFilter, Grade, LoggingConfig, RemoteStore, ResolverConfig, RuleDraft, Scope,
    SqliteRemoteStore, StaticCatalog,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "englearn", version, about = "Browse and export English learning content")]
struct Cli {
    /// Content database; falls back to `ENGLEARN_DB_PATH`, otherwise only
    /// the bundled catalog is used.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List grammar rules
    Rules(ViewArgs),
    /// List quiz questions
    Questions(ViewArgs),
    /// Write a filtered collection to CSV
    Export {
        #[arg(value_enum)]
        kind: ExportKind,
        #[command(flatten)]
        view: ViewArgs,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
    /// Create a grammar rule
    AddRule {
        #[arg(long)]
        grade: u8,
        #[arg(long)]
        title: String,
        #[arg(long)]
        explanation: String,
        #[arg(long)]
        unit: String,
        /// Repeat for several examples
        #[arg(long = "example", required = true)]
        examples: Vec<String>,
    },
    /// Print the core version
    Version,
}

#[derive(Args, Debug, Clone, Default)]
struct ViewArgs {
    /// Restrict to one grade (1-12); omit for all grades
    #[arg(long)]
    grade: Option<u8>,
    #[arg(long)]
    unit: Option<String>,
    #[arg(long)]
    search: Option<String>,
}

impl ViewArgs {
    fn scope(&self) -> Result<Scope, Box<dyn Error>> {
        Ok(self.grade.map(Grade::new).transpose()?.into())
    }

    fn filter(&self) -> EntityFilter {
        EntityFilter {
            unit: self.unit.clone(),
            search: self.search.clone(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ExportKind {
    Rules,
    Questions,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(config) = LoggingConfig::from_env()? {
        init_logging(&config)?;
    }
    if let Command::Version = cli.command {
        println!("englearn_core version={}", englearn_core::core_version());
        return Ok(());
    }

    let resolver = build_resolver(cli.db)?;
    match cli.command {
        Command::Rules(view) => {
            let snapshot = resolver.load(view.scope()?).await;
            let rules = filter_rules(&snapshot.rules, &view.filter());
            for rule in &rules {
                println!("{}\tgrade {}\t{}\t{}", rule.id_str(), rule.grade, rule.unit, rule.title);
            }
            println!("{} rules ({})", rules.len(), snapshot.rules_source.as_str());
            report_error(snapshot.error.as_deref());
        }
        Command::Questions(view) => {
            let snapshot = resolver.load(view.scope()?).await;
            let questions = filter_questions(&snapshot.questions, &view.filter());
            for question in &questions {
                println!(
                    "{}\tgrade {}\t{}\t{}",
                    question.id_str(),
                    question.grade,
                    question.unit,
                    question.question
                );
            }
            println!(
                "{} questions ({})",
                questions.len(),
                snapshot.questions_source.as_str()
            );
            report_error(snapshot.error.as_deref());
        }
        Command::Export { kind, view, out } => {
            let snapshot = resolver.load(view.scope()?).await;
            let labels = CsvLabels::default();
            let export = match kind {
                ExportKind::Rules => export_rules(&filter_rules(&snapshot.rules, &view.filter()), &labels)?,
                ExportKind::Questions => {
                    export_questions(&filter_questions(&snapshot.questions, &view.filter()), &labels)?
                }
            };
            let path = export.write_to_dir(out)?;
            println!("wrote {}", path.display());
        }
        Command::AddRule {
            grade,
            title,
            explanation,
            unit,
            examples,
        } => {
            let grade = Grade::new(grade)?;
            resolver.load(Scope::Grade(grade)).await;
            let rule = resolver.add_rule(RuleDraft {
                title,
                explanation,
                examples,
                unit,
                grade,
            })?;
            println!("added {}", rule.id_str());
        }
        Command::Version => {}
    }

    resolver.wait_for_sync().await;
    info!("event=cli_exit module=cli status=ok");
    Ok(())
}

fn build_resolver(db: Option<PathBuf>) -> Result<DataResolver, Box<dyn Error>> {
    let catalog = Arc::new(StaticCatalog::builtin()?);
    let remote = match db.or_else(remote_db_path_from_env) {
        Some(path) => {
            let store: Arc<dyn RemoteStore> = Arc::new(SqliteRemoteStore::open(&path)?);
            Some(store)
        }
        None => None,
    };
    Ok(DataResolver::new(catalog, remote, ResolverConfig::from_env())?)
}

fn report_error(error: Option<&str>) {
    if let Some(error) = error {
        eprintln!("warning: {error}");
    }
}

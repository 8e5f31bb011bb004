//! CSV export of resolved collections.
//!
//! # Responsibility
//! - Render rules and questions into the fixed CSV layout consumed by
//!   spreadsheet users.
//!
//! # Invariants
//! - File names are fixed per entity kind and never derived from filters.
//! - Header cells are quoted only when needed; text cells are always quoted,
//!   integer cells (`grade`, `correct`) never are.
//! - Sequence fields are joined with `" | "`.

use crate::model::grammar_rule::GrammarRule;
use crate::model::quiz_question::QuizQuestion;
use crate::model::EntityKind;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub const RULES_FILE_NAME: &str = "grammar_rules.csv";
pub const QUESTIONS_FILE_NAME: &str = "quiz_questions.csv";
const LIST_SEPARATOR: &str = " | ";

#[derive(Debug)]
pub enum ExportError {
    /// Filtered collection is empty; the export action is unavailable.
    NothingToExport(EntityKind),
    Csv(csv::Error),
    Io(io::Error),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NothingToExport(kind) => write!(f, "no {} rows to export", kind.as_str()),
            Self::Csv(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NothingToExport(_) => None,
            Self::Csv(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<csv::Error> for ExportError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<io::Error> for ExportError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Column header labels; `Default` is English.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLabels {
    pub title: String,
    pub explanation: String,
    pub examples: String,
    pub unit: String,
    pub grade: String,
    pub question: String,
    pub options: String,
    pub correct: String,
}

impl Default for CsvLabels {
    fn default() -> Self {
        Self {
            title: "title".to_string(),
            explanation: "explanation".to_string(),
            examples: "examples".to_string(),
            unit: "unit".to_string(),
            grade: "grade".to_string(),
            question: "question".to_string(),
            options: "options".to_string(),
            correct: "correct".to_string(),
        }
    }
}

/// Rendered CSV document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub file_name: &'static str,
    pub contents: String,
}

impl CsvExport {
    /// Writes the document into `dir` (created if missing) and returns the
    /// file path.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name);
        std::fs::write(&path, self.contents.as_bytes())?;
        info!(
            "event=csv_export module=export status=ok file={} bytes={}",
            path.display(),
            self.contents.len()
        );
        Ok(path)
    }
}

pub fn export_rules(rules: &[GrammarRule], labels: &CsvLabels) -> Result<CsvExport, ExportError> {
    if rules.is_empty() {
        return Err(ExportError::NothingToExport(EntityKind::Rule));
    }
    let header = [
        &labels.title,
        &labels.explanation,
        &labels.examples,
        &labels.unit,
        &labels.grade,
    ];
    let rows = rules.iter().map(|rule| {
        vec![
            Cell::Text(rule.title.clone()),
            Cell::Text(rule.explanation.clone()),
            Cell::Text(rule.examples.join(LIST_SEPARATOR)),
            Cell::Text(rule.unit.clone()),
            Cell::Integer(usize::from(rule.grade.get())),
        ]
    });
    Ok(CsvExport {
        file_name: RULES_FILE_NAME,
        contents: render(&header, rows)?,
    })
}

pub fn export_questions(
    questions: &[QuizQuestion],
    labels: &CsvLabels,
) -> Result<CsvExport, ExportError> {
    if questions.is_empty() {
        return Err(ExportError::NothingToExport(EntityKind::Question));
    }
    let header = [
        &labels.question,
        &labels.options,
        &labels.correct,
        &labels.explanation,
        &labels.unit,
        &labels.grade,
    ];
    let rows = questions.iter().map(|question| {
        vec![
            Cell::Text(question.question.clone()),
            Cell::Text(question.options.join(LIST_SEPARATOR)),
            Cell::Integer(question.correct),
            Cell::Text(question.explanation.clone()),
            Cell::Text(question.unit.clone()),
            Cell::Integer(usize::from(question.grade.get())),
        ]
    });
    Ok(CsvExport {
        file_name: QUESTIONS_FILE_NAME,
        contents: render(&header, rows)?,
    })
}

enum Cell {
    Text(String),
    Integer(usize),
}

fn render(header: &[&String], rows: impl Iterator<Item = Vec<Cell>>) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    let mut header_writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(&mut buffer);
    header_writer.write_record(header)?;
    header_writer.flush()?;
    drop(header_writer);
    let mut contents = into_text(buffer)?;

    for row in rows {
        let cells = row
            .into_iter()
            .map(|cell| match cell {
                Cell::Text(text) => quote_text(&text),
                Cell::Integer(value) => Ok(value.to_string()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        contents.push_str(&cells.join(","));
        contents.push('\n');
    }
    Ok(contents)
}

/// Quotes one text cell, doubling embedded quotes.
fn quote_text(text: &str) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record([text])?;
    let mut bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;
    bytes.pop();
    into_text(bytes)
}

fn into_text(bytes: Vec<u8>) -> Result<String, ExportError> {
    String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
}

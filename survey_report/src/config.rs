// ********* Questionnaire data structures ***********

use std::collections::HashMap;
use std::fmt::Display;

use chrono::NaiveDateTime;
use snafu::Snafu;

/// The name of the column holding the submission time of a response.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// The stable identifier of a question, independent of its prompt.
#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn new(id: &str) -> QuestionId {
        QuestionId(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum QuestionKind {
    /// A free-form answer.
    Text,
    /// One answer picked in the list of options of the question.
    Choice,
    /// A number picked in an inclusive range.
    Scale { min: i64, max: i64 },
}

impl QuestionKind {
    pub const DEFAULT_SCALE: QuestionKind = QuestionKind::Scale { min: 1, max: 5 };
}

/// What happens after a choice has been made.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Action {
    /// Go on with the next question in the schema.
    Continue,
    /// Stop the session, and submit what has been answered so far.
    Terminate,
    /// Suppress all the questions until the given one, which must come later in the schema.
    SkipTo(QuestionId),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionDefinition {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Only used by choice questions.
    pub options: Vec<String>,
    /// Only used by choice questions. Values without a rule continue.
    pub branch_rules: HashMap<String, Action>,
}

impl QuestionDefinition {
    pub fn text(id: &str, prompt: &str) -> QuestionDefinition {
        QuestionDefinition {
            id: QuestionId::new(id),
            kind: QuestionKind::Text,
            prompt: prompt.to_string(),
            options: Vec::new(),
            branch_rules: HashMap::new(),
        }
    }

    pub fn choice(id: &str, prompt: &str, options: &[&str]) -> QuestionDefinition {
        QuestionDefinition {
            id: QuestionId::new(id),
            kind: QuestionKind::Choice,
            prompt: prompt.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            branch_rules: HashMap::new(),
        }
    }

    pub fn scale(id: &str, prompt: &str, min: i64, max: i64) -> QuestionDefinition {
        QuestionDefinition {
            id: QuestionId::new(id),
            kind: QuestionKind::Scale { min, max },
            prompt: prompt.to_string(),
            options: Vec::new(),
            branch_rules: HashMap::new(),
        }
    }

    /// Adds a branch rule for the given option value.
    pub fn with_rule(mut self, option: &str, action: Action) -> QuestionDefinition {
        self.branch_rules.insert(option.to_string(), action);
        self
    }

    /// The action triggered by an answer. Only choice questions branch.
    pub fn action_for(&self, answer: &str) -> Action {
        match self.kind {
            QuestionKind::Choice => self
                .branch_rules
                .get(answer)
                .cloned()
                .unwrap_or(Action::Continue),
            _ => Action::Continue,
        }
    }
}

/// An ordered collection of questions.
///
/// A schema is an immutable snapshot: the builder creates a new one for each edit.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Schema {
    questions: Vec<QuestionDefinition>,
}

impl Schema {
    pub fn new(questions: Vec<QuestionDefinition>) -> Schema {
        Schema { questions }
    }

    pub fn questions(&self) -> &[QuestionDefinition] {
        &self.questions
    }

    pub fn position(&self, id: &QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| q.id == *id)
    }

    pub fn get(&self, id: &QuestionId) -> Option<&QuestionDefinition> {
        self.questions.iter().find(|q| q.id == *id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// A problem in a schema that prevents a question from being answered correctly.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ConfigIssue {
    DuplicateId(QuestionId),
    UnknownQuestion(QuestionId),
    UnknownSkipTarget {
        question: QuestionId,
        target: QuestionId,
    },
    /// The target exists, but not after the question that triggers the skip.
    BackwardSkipTarget {
        question: QuestionId,
        target: QuestionId,
    },
    BranchRulesOnNonChoice(QuestionId),
    EmptyOptions(QuestionId),
    UnknownBranchOption {
        question: QuestionId,
        option: String,
    },
    InvalidScale {
        question: QuestionId,
        min: i64,
        max: i64,
    },
}

impl Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigIssue::DuplicateId(id) => write!(f, "question id {} is used more than once", id),
            ConfigIssue::UnknownQuestion(id) => write!(f, "there is no question {}", id),
            ConfigIssue::UnknownSkipTarget { question, target } => write!(
                f,
                "question {} skips to {}, which does not exist",
                question, target
            ),
            ConfigIssue::BackwardSkipTarget { question, target } => write!(
                f,
                "question {} skips to {}, which does not come after it",
                question, target
            ),
            ConfigIssue::BranchRulesOnNonChoice(id) => {
                write!(f, "question {} has branch rules but is not a choice", id)
            }
            ConfigIssue::EmptyOptions(id) => write!(f, "choice question {} has no options", id),
            ConfigIssue::UnknownBranchOption { question, option } => write!(
                f,
                "question {} has a branch rule for {:?}, which is not one of its options",
                question, option
            ),
            ConfigIssue::InvalidScale { question, min, max } => write!(
                f,
                "scale question {} has an empty range {}..={}",
                question, min, max
            ),
        }
    }
}

// ******** Responses *********

/// How a session ended.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Outcome {
    Completed,
    Terminated,
}

/// The answers of one respondent, keyed by the prompt of each question.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResponseRecord {
    pub submitted_at: NaiveDateTime,
    pub outcome: Outcome,
    /// (prompt, answer), in the order the questions were answered.
    pub answers: Vec<(String, String)>,
}

impl ResponseRecord {
    pub fn get(&self, prompt: &str) -> Option<&str> {
        self.answers
            .iter()
            .find(|(p, _)| p == prompt)
            .map(|(_, a)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// A read-only table of responses: named columns, and rows of optional cells.
///
/// Every row has exactly one cell per column. A cell that is absent or only made of
/// whitespaces is considered missing.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Dataset {
    /// Builds a dataset, padding or truncating the rows to the number of columns.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Dataset {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row.into_iter()
                    .map(|cell| cell.filter(|s| !s.trim().is_empty()))
                    .collect()
            })
            .collect();
        Dataset { columns, rows }
    }

    /// Normalizes records into a uniform set of columns.
    ///
    /// The timestamp comes first, followed by the prompts in the order they are first seen.
    /// Column names are trimmed, as when they are read back from a file.
    pub fn from_records(records: &[ResponseRecord]) -> Dataset {
        let mut columns: Vec<String> = vec![TIMESTAMP_COLUMN.to_string()];
        for r in records.iter() {
            for (prompt, _) in r.answers.iter() {
                let name = prompt.trim();
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }
        let rows = records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| {
                        if c == TIMESTAMP_COLUMN {
                            Some(r.submitted_at.format(TIMESTAMP_FORMAT).to_string())
                        } else {
                            r.answers
                                .iter()
                                .find(|(p, _)| p.trim() == c)
                                .map(|(_, a)| a.clone())
                        }
                    })
                    .collect()
            })
            .collect();
        Dataset::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All the cells of a column, missing ones included.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_deref()).collect())
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The format of the submission timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ******** Report structure *********

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnalysisItem {
    SingleVariable { column: String },
    CrossTab { column_x: String, column_y: String },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Chapter {
    pub title: String,
    pub items: Vec<AnalysisItem>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportStructure {
    pub title: String,
    pub chapters: Vec<Chapter>,
}

// ******** Aggregates *********

/// Counts per category, most frequent first.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FrequencyTable {
    pub column: String,
    pub entries: Vec<(String, u64)>,
    /// The grand total: the number of non-missing values.
    pub total: u64,
}

impl FrequencyTable {
    pub fn count_of(&self, category: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, n)| *n)
    }
}

/// Percentages per category, in the same order as the matching frequency table.
#[derive(PartialEq, Debug, Clone)]
pub struct PercentTable {
    pub column: String,
    pub entries: Vec<(String, f64)>,
    /// The sum of the rounded percentages. It may drift away from 100.0.
    pub total: f64,
}

impl PercentTable {
    pub fn percent_of(&self, category: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, p)| *p)
    }
}

/// A contingency matrix. `counts[i][j]` is the number of rows with the i-th value
/// of the row column and the j-th value of the column column.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CrossTable {
    pub row_column: String,
    pub col_column: String,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub counts: Vec<Vec<u64>>,
}

impl CrossTable {
    pub fn count(&self, row_label: &str, col_label: &str) -> Option<u64> {
        let i = self.row_labels.iter().position(|l| l == row_label)?;
        let j = self.col_labels.iter().position(|l| l == col_label)?;
        Some(self.counts[i][j])
    }
}

// ******** Output data structures *********

/// A format-agnostic unit of report content.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RenderNode {
    Heading(u8, String),
    /// Rows of cells. The first row is the header.
    Table(Vec<Vec<String>>),
    Paragraph(String),
}

/// A compiled report, ready to be handed over to a renderer.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportDocument {
    pub title: String,
    pub nodes: Vec<RenderNode>,
}

// ******** Errors *********

/// Errors raised while running a questionnaire session.
#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FlowError {
    #[snafu(display("Configuration error: {issue}"))]
    Configuration { issue: ConfigIssue },
    #[snafu(display("Question {question} requires an answer"))]
    MissingAnswer { question: QuestionId },
    #[snafu(display("The session has already ended ({outcome:?})"))]
    SessionClosed { outcome: Outcome },
    #[snafu(display("The session is still waiting for an answer to question {question}"))]
    NotFinished { question: QuestionId },
}

/// Errors that prevent one analysis item from being computed.
#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AggregateError {
    #[snafu(display("column {column:?} does not exist in the dataset"))]
    MissingColumn { column: String },
    #[snafu(display("the dataset is empty"))]
    EmptyDataset {},
}

/// Errors when serializing a report.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RenderError {
    #[snafu(display("Failed to assemble the document archive"))]
    Archive { source: zip::result::ZipError },
    #[snafu(display("Failed to write the document"))]
    Write { source: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(minute: u32, answers: &[(&str, &str)]) -> ResponseRecord {
        ResponseRecord {
            submitted_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(10, minute, 0))
                .unwrap(),
            outcome: Outcome::Completed,
            answers: answers
                .iter()
                .map(|(p, a)| (p.to_string(), a.to_string()))
                .collect(),
        }
    }

    #[test]
    fn records_become_uniform_rows() {
        let ds = Dataset::from_records(&[
            record(0, &[("Consent", "Yes"), (" Gender", "Male")]),
            record(1, &[("Consent", "No")]),
            record(2, &[("Gender ", "Female"), ("Age", "  ")]),
        ]);
        assert_eq!(ds.columns(), &["Timestamp", "Consent", "Gender", "Age"]);
        assert_eq!(
            ds.column("Timestamp").unwrap(),
            vec![
                Some("2024-01-01 10:00:00"),
                Some("2024-01-01 10:01:00"),
                Some("2024-01-01 10:02:00")
            ]
        );
        assert_eq!(
            ds.column("Gender").unwrap(),
            vec![Some("Male"), None, Some("Female")]
        );
        // Blank answers are missing.
        assert_eq!(ds.column("Age").unwrap(), vec![None, None, None]);
    }

    #[test]
    fn no_records() {
        let ds = Dataset::from_records(&[]);
        assert_eq!(ds.columns(), &[TIMESTAMP_COLUMN]);
        assert!(ds.is_empty());
    }
}

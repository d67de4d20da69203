use crate::survey::*;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use survey_report::{
    Action, AnalysisItem, Chapter, QuestionDefinition, QuestionId, QuestionKind, ReportStructure,
    Schema, TIMESTAMP_COLUMN,
};

/// Title of the report when the configuration does not provide one.
pub const DEFAULT_REPORT_TITLE: &str = "Survey Report";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "reportTitle")]
    pub report_title: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "appUrl")]
    pub app_url: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawQuestion {
    pub id: String,
    pub kind: String,
    pub prompt: String,
    pub options: Option<Vec<String>>,
    #[serde(rename = "branchRules")]
    pub branch_rules: Option<HashMap<String, String>>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub column: Option<String>,
    #[serde(rename = "columnX")]
    pub column_x: Option<String>,
    #[serde(rename = "columnY")]
    pub column_y: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawChapter {
    pub title: String,
    pub items: Vec<RawItem>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawReport {
    pub title: Option<String>,
    pub chapters: Vec<RawChapter>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    #[serde(rename = "dataSource")]
    pub data_source: DataSource,
    pub questions: Option<Vec<RawQuestion>>,
    pub report: Option<RawReport>,
}

pub fn read_config(path: &str) -> BAppResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(config)
}

/// Parses a branch rule: `continue`, `terminate` or `skipTo:<question id>`.
pub fn parse_action(s: &str) -> AppResult<Action> {
    match s.trim() {
        "continue" => Ok(Action::Continue),
        "terminate" => Ok(Action::Terminate),
        x => match x.strip_prefix("skipTo:") {
            Some(target) if !target.trim().is_empty() => {
                Ok(Action::SkipTo(QuestionId::new(target.trim())))
            }
            _ => whatever!(
                "unknown branch rule {:?}: expected continue, terminate or skipTo:<id>",
                s
            ),
        },
    }
}

/// The questionnaire used when the configuration does not define one.
pub fn default_questions() -> Vec<QuestionDefinition> {
    vec![
        QuestionDefinition::text("q1", "Nama Penuh"),
        QuestionDefinition::choice("q2", "Jantina", &["Lelaki", "Perempuan"]),
    ]
}

fn validate_question(raw: &RawQuestion) -> AppResult<QuestionDefinition> {
    let options: Vec<String> = raw.options.clone().unwrap_or_default();
    let kind = match raw.kind.as_str() {
        "text" => QuestionKind::Text,
        "choice" => QuestionKind::Choice,
        "scale" => {
            let (dmin, dmax) = match QuestionKind::DEFAULT_SCALE {
                QuestionKind::Scale { min, max } => (min, max),
                _ => (1, 5),
            };
            QuestionKind::Scale {
                min: raw.min.unwrap_or(dmin),
                max: raw.max.unwrap_or(dmax),
            }
        }
        x => whatever!(
            "question {}: unknown kind {:?} (expected text, choice or scale)",
            raw.id,
            x
        ),
    };
    if kind != QuestionKind::Choice && !options.is_empty() {
        warn!(
            "validate_question: question {} is not a choice question, its options are ignored",
            raw.id
        );
    }
    let mut branch_rules: HashMap<String, Action> = HashMap::new();
    for (option, rule) in raw.branch_rules.clone().unwrap_or_default() {
        branch_rules.insert(option, parse_action(&rule)?);
    }
    Ok(QuestionDefinition {
        id: QuestionId::new(&raw.id),
        kind,
        // Prompts name the dataset columns, which are read back trimmed.
        prompt: raw.prompt.trim().to_string(),
        options,
        branch_rules,
    })
}

/// Builds the questionnaire. The structural checks are left to [`Schema::validate`].
pub fn validate_questions(config: &SurveyConfig) -> AppResult<Schema> {
    let questions: Vec<QuestionDefinition> = match &config.questions {
        None => {
            info!("validate_questions: no questions configured, using the default questionnaire");
            default_questions()
        }
        Some(raws) => {
            let mut res = Vec::new();
            for raw in raws.iter() {
                res.push(validate_question(raw)?);
            }
            res
        }
    };
    Ok(Schema::new(questions))
}

fn validate_item(chapter: &str, item: &RawItem) -> AppResult<AnalysisItem> {
    match (&item.column, &item.column_x, &item.column_y) {
        (Some(c), None, None) => Ok(AnalysisItem::SingleVariable { column: c.clone() }),
        (None, Some(x), Some(y)) => Ok(AnalysisItem::CrossTab {
            column_x: x.clone(),
            column_y: y.clone(),
        }),
        x => whatever!(
            "chapter {:?}: an item needs either column, or both columnX and columnY, got {:?}",
            chapter,
            x
        ),
    }
}

/// Builds the report structure.
///
/// Without a report section, a single chapter analyses every column of the dataset
/// except the submission time.
pub fn validate_report(config: &SurveyConfig, dataset: &Dataset) -> AppResult<ReportStructure> {
    let configured_title = config
        .output_settings
        .as_ref()
        .and_then(|os| os.report_title.clone());
    match &config.report {
        Some(report) => {
            let title = report
                .title
                .clone()
                .or(configured_title)
                .unwrap_or_else(|| DEFAULT_REPORT_TITLE.to_string());
            let mut chapters = Vec::new();
            for raw in report.chapters.iter() {
                let mut items = Vec::new();
                for item in raw.items.iter() {
                    items.push(validate_item(&raw.title, item)?);
                }
                chapters.push(Chapter {
                    title: raw.title.clone(),
                    items,
                });
            }
            Ok(ReportStructure { title, chapters })
        }
        None => {
            let items: Vec<AnalysisItem> = dataset
                .columns()
                .iter()
                .filter(|c| c.as_str() != TIMESTAMP_COLUMN)
                .map(|c| AnalysisItem::SingleVariable { column: c.clone() })
                .collect();
            debug!("validate_report: default report over {} columns", items.len());
            Ok(ReportStructure {
                title: configured_title.unwrap_or_else(|| DEFAULT_REPORT_TITLE.to_string()),
                chapters: vec![Chapter {
                    title: "Results".to_string(),
                    items,
                }],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(js: &str) -> SurveyConfig {
        serde_json::from_str(js).unwrap()
    }

    #[test]
    fn actions() {
        assert_eq!(parse_action("continue").unwrap(), Action::Continue);
        assert_eq!(parse_action(" terminate ").unwrap(), Action::Terminate);
        assert_eq!(
            parse_action("skipTo:q4").unwrap(),
            Action::SkipTo(QuestionId::new("q4"))
        );
        assert!(parse_action("skipTo:").is_err());
        assert!(parse_action("jump").is_err());
    }

    #[test]
    fn questions_from_json() {
        let c = config(
            r#"{
            "dataSource": { "provider": "csv", "filePath": "r.csv" },
            "questions": [
                { "id": "q1", "kind": "choice", "prompt": "Consent", "options": ["Yes", "No"],
                  "branchRules": { "No": "terminate", "Yes": "skipTo:q3" } },
                { "id": "q2", "kind": "text", "prompt": "Why" },
                { "id": "q3", "kind": "scale", "prompt": "Score", "max": 10 }
            ]
        }"#,
        );
        let schema = validate_questions(&c).unwrap();
        assert_eq!(schema.len(), 3);
        let q1 = &schema.questions()[0];
        assert_eq!(q1.action_for("No"), Action::Terminate);
        assert_eq!(q1.action_for("Yes"), Action::SkipTo(QuestionId::new("q3")));
        assert_eq!(
            schema.questions()[2].kind,
            QuestionKind::Scale { min: 1, max: 10 }
        );
        assert!(schema.validate().is_empty());
    }

    #[test]
    fn prompts_are_trimmed() {
        let c = config(
            r#"{
            "dataSource": { "provider": "csv", "filePath": "r.csv" },
            "questions": [ { "id": "q1", "kind": "text", "prompt": " Gender  " } ]
        }"#,
        );
        let schema = validate_questions(&c).unwrap();
        assert_eq!(schema.questions()[0].prompt, "Gender");
    }

    #[test]
    fn unknown_kind() {
        let c = config(
            r#"{
            "dataSource": { "provider": "csv", "filePath": "r.csv" },
            "questions": [ { "id": "q1", "kind": "date", "prompt": "When" } ]
        }"#,
        );
        assert!(validate_questions(&c).is_err());
    }

    #[test]
    fn default_questionnaire() {
        let c = config(r#"{ "dataSource": { "provider": "csv", "filePath": "r.csv" } }"#);
        let schema = validate_questions(&c).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.questions()[0].prompt, "Nama Penuh");
        assert_eq!(schema.questions()[1].options, vec!["Lelaki", "Perempuan"]);
    }

    #[test]
    fn report_items() {
        let c = config(
            r#"{
            "outputSettings": { "reportTitle": "Fallback" },
            "dataSource": { "provider": "csv", "filePath": "r.csv" },
            "report": { "chapters": [ { "title": "A", "items": [
                { "column": "Gender" }, { "columnX": "Gender", "columnY": "Age" } ] } ] }
        }"#,
        );
        let ds = Dataset::new(vec![], vec![]);
        let s = validate_report(&c, &ds).unwrap();
        assert_eq!(s.title, "Fallback");
        assert_eq!(
            s.chapters[0].items[1],
            AnalysisItem::CrossTab {
                column_x: "Gender".to_string(),
                column_y: "Age".to_string()
            }
        );

        let bad = config(
            r#"{
            "dataSource": { "provider": "csv", "filePath": "r.csv" },
            "report": { "chapters": [ { "title": "A", "items": [ { "columnX": "Gender" } ] } ] }
        }"#,
        );
        assert!(validate_report(&bad, &ds).is_err());
    }

    #[test]
    fn default_report_covers_all_columns() {
        let c = config(r#"{ "dataSource": { "provider": "csv", "filePath": "r.csv" } }"#);
        let ds = Dataset::new(
            vec![
                TIMESTAMP_COLUMN.to_string(),
                "Gender".to_string(),
                "Age".to_string(),
            ],
            vec![],
        );
        let s = validate_report(&c, &ds).unwrap();
        assert_eq!(s.title, DEFAULT_REPORT_TITLE);
        assert_eq!(s.chapters.len(), 1);
        assert_eq!(s.chapters[0].items.len(), 2);
    }
}

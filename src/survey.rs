use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use survey_report::{Dataset, FlowError, RenderError, ReportStructure, Schema};
use text_diff::print_diff;

use crate::args::{Args, Command};
use crate::survey::config_reader::*;
use crate::survey::store::{CsvStore, ResponseStore};

pub mod config_reader;
mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod respond;
pub mod store;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson { source: std::io::Error, path: String },
    #[snafu(display("Error parsing the configuration {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("The configuration file {path} has no parent directory"))]
    MissingParentDir { path: String },

    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Excel file {path} has no worksheet named {worksheet}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display(
        "Excel file {path} has {count} worksheets, the option excelWorksheetName must be provided"
    ))]
    AmbiguousWorksheet { path: String, count: usize },
    #[snafu(display("Excel file {path} is empty"))]
    EmptyExcel { path: String },
    #[snafu(display("Unexpected content in line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },

    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of CSV file {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: u64,
    },
    #[snafu(display("Error writing CSV data"))]
    CsvWrite { source: csv::Error },

    #[snafu(display(
        "Could not save the response to {path}. Nothing was written, the response can be submitted again."
    ))]
    PersistenceFailure { source: std::io::Error, path: String },

    #[snafu(display("Failed to render the report"))]
    RenderFailure { source: RenderError },
    #[snafu(display("Error reading the reference preview {path}"))]
    ReadingReference { source: std::io::Error, path: String },
    #[snafu(display("Failed to write {path}"))]
    WritingOutput { source: std::io::Error, path: String },

    #[snafu(display("{source}"))]
    Flow { source: FlowError },
    #[snafu(display("Error communicating with the respondent"))]
    Terminal { source: std::io::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AppResult<T> = Result<T, AppError>;
pub type BAppResult<T> = Result<T, Box<AppError>>;

/// Everything needed by a command, with paths resolved against the configuration file.
pub struct Project {
    pub config: SurveyConfig,
    pub root: PathBuf,
}

impl Project {
    pub fn load(config_path: &str) -> BAppResult<Project> {
        let config = read_config(config_path)?;
        debug!("Project::load: config: {:?}", config);
        let root = Path::new(config_path)
            .parent()
            .context(MissingParentDirSnafu { path: config_path })?
            .to_path_buf();
        Ok(Project { config, root })
    }

    pub fn resolve(&self, p: &str) -> PathBuf {
        let path = Path::new(p);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn data_path(&self) -> String {
        self.resolve(&self.config.data_source.file_path)
            .display()
            .to_string()
    }

    pub fn output_dir(&self) -> PathBuf {
        let dir = self
            .config
            .output_settings
            .as_ref()
            .and_then(|os| os.output_directory.clone())
            .unwrap_or_else(|| ".".to_string());
        self.resolve(&dir)
    }

    pub fn schema(&self) -> AppResult<Schema> {
        validate_questions(&self.config)
    }

    pub fn load_dataset(&self) -> BAppResult<Dataset> {
        let path = self.data_path();
        info!("Attempting to read data file {:?}", path);
        match self.config.data_source.provider.as_str() {
            "csv" => CsvStore::new(&path).load(),
            "excel" => io_excel::read_excel_dataset(
                &path,
                self.config.data_source.excel_worksheet_name.as_deref(),
            ),
            x => Err(Box::new(unknown_provider(x))),
        }
    }

    /// The store receiving new responses. Only CSV files can be written to.
    pub fn store(&self) -> AppResult<CsvStore> {
        match self.config.data_source.provider.as_str() {
            "csv" => Ok(CsvStore::new(&self.data_path())),
            "excel" => {
                whatever!("Excel data sources are read-only, use a csv data source to collect responses")
            }
            x => Err(unknown_provider(x)),
        }
    }
}

fn unknown_provider(provider: &str) -> AppError {
    AppError::Whatever {
        message: format!(
            "Unknown data source provider {:?} (expected csv or excel)",
            provider
        ),
        source: None,
    }
}

/// The link to give to respondents.
pub fn share_link(app_url: &str) -> String {
    let sep = if app_url.contains('?') { '&' } else { '?' };
    format!("{}{}view=respondent", app_url, sep)
}

fn write_output(path: &Path, content: &[u8]) -> BAppResult<()> {
    let p = path.display().to_string();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context(WritingOutputSnafu { path: p.clone() })?;
    }
    fs::write(path, content).context(WritingOutputSnafu { path: p })?;
    Ok(())
}

pub fn run_respond(project: &Project, preview: bool) -> BAppResult<()> {
    let schema = project.schema()?;
    let issues = schema.validate();
    for issue in issues.iter() {
        warn!("Questionnaire issue: {}", issue);
    }
    let store = if preview { None } else { Some(project.store()?) };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let record = respond::run_session(&schema, &mut input, &mut output)?;
    match (record, store) {
        (None, _) => {
            info!("run_respond: session abandoned, nothing saved");
        }
        (Some(r), None) => {
            info!("run_respond: preview mode, response not saved: {:?}", r);
            writeln!(output, "Preview finished, the response was not saved.").context(TerminalSnafu)?;
        }
        (Some(r), Some(store)) => {
            if !respond::submit(&store, &r, &mut input, &mut output)? {
                return Err(Box::new(AppError::Whatever {
                    message: "The response could not be saved".to_string(),
                    source: None,
                }));
            }
            writeln!(output, "Thank you, your response was saved.").context(TerminalSnafu)?;
        }
    }
    Ok(())
}

pub fn run_report(
    project: &Project,
    preview_out: Option<String>,
    docx_out: Option<String>,
    reference: Option<String>,
) -> BAppResult<()> {
    let dataset = project.load_dataset()?;
    info!(
        "run_report: dataset with {} rows and columns {:?}",
        dataset.num_rows(),
        dataset.columns()
    );
    let structure: ReportStructure = validate_report(&project.config, &dataset)?;
    let doc = survey_report::compile_document(&structure, &dataset);

    let preview = survey_report::preview(&doc).context(RenderFailureSnafu)?;
    match preview_out.as_deref() {
        None | Some("stdout") => println!("{}", preview),
        Some(p) => write_output(&project.resolve(p), preview.as_bytes())?,
    }

    let docx_path: PathBuf = match docx_out {
        Some(p) => project.resolve(&p),
        None => project
            .output_dir()
            .join(io_common::document_file_name(&structure.title)),
    };
    // The preview is already out: a failure here does not touch the data.
    let bytes = survey_report::export_docx(&doc).context(RenderFailureSnafu)?;
    write_output(&docx_path, &bytes)?;
    info!("run_report: document written to {:?}", docx_path);

    // The reference preview, if provided for comparison
    if let Some(ref_p) = reference {
        let ref_path = project.resolve(&ref_p);
        let expected = fs::read_to_string(&ref_path).context(ReadingReferenceSnafu {
            path: ref_path.display().to_string(),
        })?;
        if expected != preview {
            warn!("Found differences with the reference preview");
            print_diff(expected.as_str(), preview.as_str(), "\n");
            return Err(Box::new(AppError::Whatever {
                message: "Difference detected between the report and the reference".to_string(),
                source: None,
            }));
        }
    }
    Ok(())
}

pub fn run_validate(project: &Project) -> BAppResult<()> {
    let schema = project.schema()?;
    let issues = schema.validate();
    if issues.is_empty() {
        println!("The questionnaire has {} questions and no issue.", schema.len());
        return Ok(());
    }
    for issue in issues.iter() {
        println!("- {}", issue);
    }
    Err(Box::new(AppError::Whatever {
        message: format!("{} issue(s) found in the questionnaire", issues.len()),
        source: None,
    }))
}

pub fn run_share(project: &Project, url: Option<String>) -> BAppResult<()> {
    let configured = project
        .config
        .output_settings
        .as_ref()
        .and_then(|os| os.app_url.clone());
    let app_url = match url.or(configured) {
        Some(u) => u,
        None => {
            return Err(Box::new(AppError::Whatever {
                message: "No application URL: pass --url or set outputSettings.appUrl".to_string(),
                source: None,
            }))
        }
    };
    println!("{}", share_link(&app_url));
    Ok(())
}

pub fn run_export(project: &Project, out: Option<String>) -> BAppResult<()> {
    let dataset = project.load_dataset()?;
    match out.as_deref() {
        None | Some("stdout") => io_csv::write_csv_dataset(&dataset, io::stdout()),
        Some(p) => {
            let mut buf: Vec<u8> = Vec::new();
            io_csv::write_csv_dataset(&dataset, &mut buf)?;
            write_output(&project.resolve(p), &buf)
        }
    }
}

pub fn run(args: &Args) -> BAppResult<()> {
    let project = Project::load(&args.config)?;
    match args.command.clone() {
        Command::Respond { preview } => run_respond(&project, preview),
        Command::Report {
            out,
            docx,
            reference,
        } => run_report(&project, out, docx, reference),
        Command::Validate => run_validate(&project),
        Command::Share { url } => run_share(&project, url),
        Command::Export { out } => run_export(&project, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_project(dir: &Path, data: &str) -> String {
        let config = r#"{
            "outputSettings": { "reportTitle": "Unused", "outputDirectory": "out" },
            "dataSource": { "provider": "csv", "filePath": "responses.csv" },
            "questions": [
                { "id": "q1", "kind": "choice", "prompt": "Consent",
                  "options": ["Yes", "No"], "branchRules": { "No": "terminate" } },
                { "id": "q2", "kind": "choice", "prompt": "Gender", "options": ["Male", "Female"] }
            ],
            "report": {
                "title": "Gender study",
                "chapters": [
                    { "title": "Demographics", "items": [ { "column": "Gender" }, { "column": "NonexistentCol" } ] },
                    { "title": "Consent", "items": [ { "columnX": "Gender", "columnY": "Consent" } ] }
                ]
            }
        }"#;
        let config_path = dir.join("survey.json");
        fs::write(&config_path, config).unwrap();
        fs::write(dir.join("responses.csv"), data).unwrap();
        config_path.display().to_string()
    }

    const DATA: &str = "Timestamp,Consent,Gender\n\
        2024-01-01 10:00:00,Yes,Male\n\
        2024-01-01 10:01:00,Yes,Female\n\
        2024-01-01 10:02:00,Yes,Male\n\
        2024-01-01 10:03:00,Yes,Male\n";

    #[test]
    fn report_writes_preview_and_document() {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_project(dir.path(), DATA);
        let project = Project::load(&config_path).unwrap();
        run_report(&project, Some("preview.txt".to_string()), None, None).unwrap();

        let preview = fs::read_to_string(dir.path().join("preview.txt")).unwrap();
        assert!(preview.starts_with("# Gender study\n"));
        assert!(preview.contains("| Male   | 3         |"));
        assert!(preview.contains("| Total  | 100.0       |"));
        assert!(preview.contains("Analysis of \"NonexistentCol\" was skipped"));

        let docx = fs::read(dir.path().join("out").join("gender_study.docx")).unwrap();
        assert_eq!(&docx[0..2], b"PK");
        // Parts are stored without compression.
        let raw = String::from_utf8_lossy(&docx);
        assert!(raw.contains("Analysis: Gender"));
        assert!(raw.contains("Cross Tabulation: Gender by Consent"));
    }

    #[test]
    fn report_matches_its_own_reference() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_project(dir.path(), DATA);
        let project = Project::load(&config_path).unwrap();
        run_report(&project, Some("ref.txt".to_string()), None, None).unwrap();
        run_report(
            &project,
            Some("again.txt".to_string()),
            Some("again.docx".to_string()),
            Some("ref.txt".to_string()),
        )
        .unwrap();
        let missing = run_report(&project, None, None, Some("missing.txt".to_string()));
        assert!(matches!(
            missing.map_err(|e| *e),
            Err(AppError::ReadingReference { .. })
        ));
        fs::write(dir.path().join("ref.txt"), "something else").unwrap();
        assert!(run_report(&project, Some("again.txt".to_string()), None, Some("ref.txt".to_string())).is_err());
    }

    #[test]
    fn export_writes_the_dataset_as_csv() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_project(dir.path(), DATA);
        let project = Project::load(&config_path).unwrap();
        run_export(&project, Some("all.csv".to_string())).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("all.csv")).unwrap(), DATA);
    }

    #[test]
    fn excel_sources_cannot_collect() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_project(dir.path(), DATA);
        let mut project = Project::load(&config_path).unwrap();
        project.config.data_source.provider = "excel".to_string();
        assert!(project.store().is_err());
        project.config.data_source.provider = "parquet".to_string();
        assert!(project.load_dataset().is_err());
    }

    #[test]
    fn share_links() {
        assert_eq!(
            share_link("https://datasuite.example.app"),
            "https://datasuite.example.app?view=respondent"
        );
        assert_eq!(
            share_link("https://x.app/?lang=ms"),
            "https://x.app/?lang=ms&view=respondent"
        );
    }
}

use clap::{Parser, Subcommand};

/// Collects survey responses through conditional questionnaires, and turns them into
/// chaptered statistical reports.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON configuration of the survey: the questionnaire, the data source
    /// and the structure of the report. Relative paths inside it are resolved against its
    /// directory.
    #[clap(short, long, value_parser)]
    pub config: String,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Answers the questionnaire in the terminal. The response is appended to the data source
    /// once the questionnaire is completed or terminated.
    Respond {
        /// If passed, nothing is saved. This is useful to try a questionnaire being designed.
        #[clap(long, takes_value = false)]
        preview: bool,
    },
    /// Computes the report, prints its preview and exports it as a Word document.
    Report {
        /// (file path, 'stdout' or empty) Where the text preview is written.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (file path or empty) The Word document to write. Defaults to a file named after the
        /// report title in the output directory of the configuration.
        #[clap(long, value_parser)]
        docx: Option<String>,
        /// (file path) A reference preview. If provided, the command fails when the computed
        /// preview differs from it, and prints the difference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Checks the questionnaire and lists the issues found.
    Validate,
    /// Prints the link to send to the respondents.
    Share {
        /// The address of the application. Overrides outputSettings.appUrl.
        #[clap(long, value_parser)]
        url: Option<String>,
    },
    /// Writes all the collected responses as CSV.
    Export {
        /// (file path, 'stdout' or empty) The destination.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
}

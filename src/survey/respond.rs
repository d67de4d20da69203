// Answering a questionnaire in the terminal.

use std::io::{BufRead, Write};

use chrono::Local;
use survey_report::{FlowError, FlowStep, Outcome, QuestionDefinition, QuestionKind, ResponseRecord, Session};

use crate::survey::io_csv::write_csv_dataset;
use crate::survey::store::ResponseStore;
use crate::survey::*;

fn ask<W: Write>(question: &QuestionDefinition, output: &mut W) -> BAppResult<()> {
    writeln!(output).context(TerminalSnafu)?;
    writeln!(output, "{}", question.prompt).context(TerminalSnafu)?;
    match question.kind {
        QuestionKind::Choice => {
            for (idx, option) in question.options.iter().enumerate() {
                writeln!(output, "  {}) {}", idx + 1, option).context(TerminalSnafu)?;
            }
        }
        QuestionKind::Scale { min, max } => {
            writeln!(output, "  ({} to {})", min, max).context(TerminalSnafu)?;
        }
        QuestionKind::Text => {}
    }
    write!(output, "> ").context(TerminalSnafu)?;
    output.flush().context(TerminalSnafu)?;
    Ok(())
}

/// Reads one line, without its line terminator. None at the end of the input.
fn read_line<R: BufRead>(input: &mut R) -> BAppResult<Option<String>> {
    let mut line = String::new();
    let n = input.read_line(&mut line).context(TerminalSnafu)?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

/// Maps what the respondent typed to the value recorded for the question.
///
/// An empty string stays empty, the session decides what to do with it. Choice
/// questions accept the number of an option or its text in any case.
pub fn interpret(question: &QuestionDefinition, typed: &str) -> Result<String, String> {
    let typed = typed.trim();
    if typed.is_empty() {
        return Ok(String::new());
    }
    match question.kind {
        QuestionKind::Text => Ok(typed.to_string()),
        QuestionKind::Choice => {
            if let Ok(n) = typed.parse::<usize>() {
                if let Some(option) = n.checked_sub(1).and_then(|i| question.options.get(i)) {
                    return Ok(option.clone());
                }
            }
            question
                .options
                .iter()
                .find(|o| o.to_lowercase() == typed.to_lowercase())
                .cloned()
                .ok_or_else(|| {
                    format!("Please pick one of the {} options.", question.options.len())
                })
        }
        QuestionKind::Scale { min, max } => match typed.parse::<i64>() {
            Ok(v) if v >= min && v <= max => Ok(v.to_string()),
            _ => Err(format!("Please enter a number from {} to {}.", min, max)),
        },
    }
}

/// Runs one session, asking the questions on `output` and reading the answers from `input`.
///
/// Returns the response once the questionnaire is completed or terminated, and None
/// if the input ends before that.
pub fn run_session<R: BufRead, W: Write>(
    schema: &Schema,
    input: &mut R,
    output: &mut W,
) -> BAppResult<Option<ResponseRecord>> {
    let mut session = Session::new(schema);
    while let FlowStep::Ask(question) = session.current() {
        ask(question, output)?;
        let typed = match read_line(input)? {
            Some(l) => l,
            None => {
                info!("run_session: input closed at question {}", question.id);
                return Ok(None);
            }
        };
        let value = match interpret(question, &typed) {
            Ok(v) => v,
            Err(msg) => {
                writeln!(output, "{}", msg).context(TerminalSnafu)?;
                continue;
            }
        };
        match session.answer(&value) {
            Ok(step) => debug!("run_session: next step: {:?}", step),
            Err(FlowError::MissingAnswer { .. }) => {
                writeln!(output, "This question requires an answer.").context(TerminalSnafu)?;
            }
            Err(FlowError::Configuration { issue }) => {
                warn!("run_session: {}", issue);
                writeln!(
                    output,
                    "This answer cannot be accepted ({}). Please choose another answer.",
                    issue
                )
                .context(TerminalSnafu)?;
            }
            Err(e) => return Err(Box::new(AppError::Flow { source: e })),
        }
    }
    if session.outcome() == Some(Outcome::Terminated) {
        writeln!(output, "\nThe survey has ended.").context(TerminalSnafu)?;
    }
    let record = session
        .finish(Local::now().naive_local())
        .context(FlowSnafu)?;
    Ok(Some(record))
}

/// Saves a finished response.
///
/// When the store fails, the respondent may try again as many times as needed. Giving
/// up prints the response as CSV, so that it can still be entered later. Returns whether
/// the response was saved.
pub fn submit<S: ResponseStore + ?Sized, R: BufRead, W: Write>(
    store: &S,
    record: &ResponseRecord,
    input: &mut R,
    output: &mut W,
) -> BAppResult<bool> {
    loop {
        let e = match store.append(record) {
            Ok(()) => return Ok(true),
            Err(e) => e,
        };
        warn!("submit: {}", e);
        writeln!(output, "{}", e).context(TerminalSnafu)?;
        write!(output, "Press Enter to try again, or type quit to give up: ").context(TerminalSnafu)?;
        output.flush().context(TerminalSnafu)?;
        match read_line(input)? {
            Some(l) if !l.trim().eq_ignore_ascii_case("quit") => {
                info!("submit: trying again");
            }
            _ => break,
        }
    }
    writeln!(output, "\nThe response was not saved. Here it is, to be entered again later:")
        .context(TerminalSnafu)?;
    write_csv_dataset(&Dataset::from_records(std::slice::from_ref(record)), &mut *output)?;
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};
    use std::io::{self, Cursor};
    use survey_report::{Action, QuestionId};

    use crate::survey::store::CsvStore;

    fn schema() -> Schema {
        Schema::new(vec![
            QuestionDefinition::choice("q1", "Consent", &["Yes", "No"])
                .with_rule("No", Action::Terminate),
            QuestionDefinition::choice("q2", "Gender", &["Male", "Female"]),
            QuestionDefinition::scale("q3", "Satisfaction", 1, 5),
        ])
    }

    fn run(schema: &Schema, typed: &str) -> (Option<ResponseRecord>, String) {
        let mut input = Cursor::new(typed.as_bytes().to_vec());
        let mut output: Vec<u8> = Vec::new();
        let r = run_session(schema, &mut input, &mut output).unwrap();
        (r, String::from_utf8(output).unwrap())
    }

    #[test]
    fn complete_session() {
        let s = schema();
        let (r, out) = run(&s, "1\nfemale\n4\n");
        let r = r.unwrap();
        assert_eq!(r.outcome, Outcome::Completed);
        assert_eq!(r.get("Consent"), Some("Yes"));
        assert_eq!(r.get("Gender"), Some("Female"));
        assert_eq!(r.get("Satisfaction"), Some("4"));
        assert!(out.contains("  2) Female"));
        assert!(out.contains("  (1 to 5)"));
    }

    #[test]
    fn terminated_session() {
        let s = schema();
        let (r, out) = run(&s, "No\n");
        let r = r.unwrap();
        assert_eq!(r.outcome, Outcome::Terminated);
        assert_eq!(r.len(), 1);
        assert!(out.contains("The survey has ended."));
        assert!(!out.contains("Gender"));
    }

    #[test]
    fn invalid_answers_are_asked_again() {
        let s = schema();
        let (r, out) = run(&s, "\n3\nYes\nMale\n9\n5\n");
        let r = r.unwrap();
        assert_eq!(r.get("Satisfaction"), Some("5"));
        assert!(out.contains("This question requires an answer."));
        assert!(out.contains("Please pick one of the 2 options."));
        assert!(out.contains("Please enter a number from 1 to 5."));
    }

    #[test]
    fn abandoned_session() {
        let s = schema();
        let (r, _) = run(&s, "Yes\n");
        assert_eq!(r, None);
    }

    #[test]
    fn backward_skip_blocks_the_option() {
        let s = Schema::new(vec![
            QuestionDefinition::text("q1", "Name"),
            QuestionDefinition::choice("q2", "Again?", &["Yes", "No"])
                .with_rule("Yes", Action::SkipTo(QuestionId::new("q1"))),
        ]);
        let (r, out) = run(&s, "Ana\nYes\nNo\n");
        let r = r.unwrap();
        assert_eq!(r.get("Again?"), Some("No"));
        assert!(out.contains("This answer cannot be accepted"));
    }

    #[test]
    fn empty_questionnaire() {
        let s = Schema::new(vec![]);
        let (r, _) = run(&s, "");
        let r = r.unwrap();
        assert_eq!(r.outcome, Outcome::Completed);
        assert!(r.is_empty());
    }

    // Fails a given number of times, then keeps the responses in memory.
    struct FlakyStore {
        failures: Cell<u32>,
        saved: RefCell<Vec<ResponseRecord>>,
    }

    impl ResponseStore for FlakyStore {
        fn load(&self) -> BAppResult<Dataset> {
            Ok(Dataset::from_records(&self.saved.borrow()))
        }

        fn append(&self, record: &ResponseRecord) -> BAppResult<()> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(Box::new(AppError::PersistenceFailure {
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                    path: "r.csv".to_string(),
                }));
            }
            self.saved.borrow_mut().push(record.clone());
            Ok(())
        }
    }

    fn consent_no() -> ResponseRecord {
        ResponseRecord {
            submitted_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(10, 0, 0))
                .unwrap(),
            outcome: Outcome::Terminated,
            answers: vec![("Consent".to_string(), "No".to_string())],
        }
    }

    #[test]
    fn failed_save_can_be_retried() {
        let store = FlakyStore {
            failures: Cell::new(2),
            saved: RefCell::new(Vec::new()),
        };
        let mut input = Cursor::new(b"\n\n".to_vec());
        let mut output: Vec<u8> = Vec::new();
        let saved = submit(&store, &consent_no(), &mut input, &mut output).unwrap();
        assert!(saved);
        assert_eq!(store.saved.borrow().len(), 1);
        let out = String::from_utf8(output).unwrap();
        assert_eq!(out.matches("Could not save the response").count(), 2);
    }

    #[test]
    fn giving_up_prints_the_response() {
        let store = CsvStore::new("/nonexistent/dir/r.csv");
        let mut input = Cursor::new(b"\nquit\n".to_vec());
        let mut output: Vec<u8> = Vec::new();
        let saved = submit(&store, &consent_no(), &mut input, &mut output).unwrap();
        assert!(!saved);
        let out = String::from_utf8(output).unwrap();
        assert_eq!(out.matches("Could not save the response").count(), 2);
        assert!(out.ends_with("Timestamp,Consent\n2024-01-01 10:00:00,No\n"));
    }

    #[test]
    fn closed_input_gives_up() {
        let store = FlakyStore {
            failures: Cell::new(5),
            saved: RefCell::new(Vec::new()),
        };
        let mut input = Cursor::new(Vec::new());
        let mut output: Vec<u8> = Vec::new();
        assert!(!submit(&store, &consent_no(), &mut input, &mut output).unwrap());
        assert!(store.saved.borrow().is_empty());
    }
}

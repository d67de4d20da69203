//! The questionnaire flow engine.
//!
//! A [`Session`] walks a [`Schema`] in order, one question at a time. After each
//! answer to a choice question, the branch rule of the chosen value decides if the
//! session continues, terminates, or skips forward to a later question.

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use snafu::prelude::*;

use crate::config::*;

pub type FlowResult<T> = Result<T, FlowError>;

/// What the respondent should see next.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum FlowStep<'s> {
    Ask(&'s QuestionDefinition),
    Completed,
    Terminated,
}

/// One respondent going through a schema.
///
/// Sessions are independent from each other and only borrow the schema. Nothing is
/// produced until the session reaches a terminal step and [`Session::finish`] is called.
#[derive(Debug, Clone)]
pub struct Session<'s> {
    schema: &'s Schema,
    // Index of the question being asked. Only meaningful while the session is open.
    cursor: usize,
    // At most one skip target at a time.
    pending_skip: Option<QuestionId>,
    answers: Vec<(String, String)>,
    rendered: Vec<QuestionId>,
    suppressed: Vec<QuestionId>,
    outcome: Option<Outcome>,
}

impl<'s> Session<'s> {
    /// Starts a session at the first question of the schema.
    pub fn new(schema: &'s Schema) -> Session<'s> {
        let mut s = Session {
            schema,
            cursor: 0,
            pending_skip: None,
            answers: Vec::new(),
            rendered: Vec::new(),
            suppressed: Vec::new(),
            outcome: None,
        };
        s.present_from(0);
        s
    }

    /// The question currently asked, or the terminal signal.
    pub fn current(&self) -> FlowStep<'s> {
        match self.outcome {
            Some(Outcome::Completed) => FlowStep::Completed,
            Some(Outcome::Terminated) => FlowStep::Terminated,
            None => FlowStep::Ask(&self.schema.questions()[self.cursor]),
        }
    }

    /// Records the answer to the current question and moves to the next step.
    ///
    /// A skip to a question that does not come later in the schema is a configuration
    /// error: the answer is not recorded and the session stays on the current question.
    pub fn answer(&mut self, value: &str) -> FlowResult<FlowStep<'s>> {
        if let Some(outcome) = self.outcome {
            warn!("answer: session already ended with {:?}", outcome);
            return SessionClosedSnafu { outcome }.fail();
        }
        let schema: &'s Schema = self.schema;
        let question = &schema.questions()[self.cursor];
        ensure!(
            !value.trim().is_empty(),
            MissingAnswerSnafu {
                question: question.id.clone()
            }
        );

        let action = question.action_for(value);
        if let Action::SkipTo(target) = &action {
            self.check_skip_target(question, target)?;
        }

        debug!(
            "answer: question {} answer {:?} action {:?}",
            question.id, value, action
        );
        self.answers
            .push((question.prompt.clone(), value.to_string()));

        match action {
            Action::Continue => self.present_from(self.cursor + 1),
            Action::Terminate => {
                info!("answer: session terminated at question {}", question.id);
                self.outcome = Some(Outcome::Terminated);
            }
            Action::SkipTo(target) => {
                self.pending_skip = Some(target);
                self.present_from(self.cursor + 1);
            }
        }
        Ok(self.current())
    }

    /// Produces the response record of a finished session.
    pub fn finish(self, submitted_at: NaiveDateTime) -> FlowResult<ResponseRecord> {
        match self.outcome {
            Some(outcome) => Ok(ResponseRecord {
                submitted_at,
                outcome,
                answers: self.answers,
            }),
            None => NotFinishedSnafu {
                question: self.schema.questions()[self.cursor].id.clone(),
            }
            .fail(),
        }
    }

    /// The questions presented so far, in order.
    pub fn rendered(&self) -> &[QuestionId] {
        &self.rendered
    }

    /// The questions passed over by a skip.
    pub fn suppressed(&self) -> &[QuestionId] {
        &self.suppressed
    }

    /// The (prompt, answer) pairs recorded so far.
    pub fn answers(&self) -> &[(String, String)] {
        &self.answers
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    fn check_skip_target(
        &self,
        question: &QuestionDefinition,
        target: &QuestionId,
    ) -> FlowResult<()> {
        match self.schema.position(target) {
            Some(pos) if pos > self.cursor => Ok(()),
            Some(_) => ConfigurationSnafu {
                issue: ConfigIssue::BackwardSkipTarget {
                    question: question.id.clone(),
                    target: target.clone(),
                },
            }
            .fail(),
            None => ConfigurationSnafu {
                issue: ConfigIssue::UnknownSkipTarget {
                    question: question.id.clone(),
                    target: target.clone(),
                },
            }
            .fail(),
        }
    }

    // Scans forward from the given position for the next question to present.
    fn present_from(&mut self, start: usize) {
        let questions = self.schema.questions();
        for (idx, q) in questions.iter().enumerate().skip(start) {
            match &self.pending_skip {
                Some(target) if *target != q.id => {
                    debug!("present_from: suppressing {} (skipping to {})", q.id, target);
                    self.suppressed.push(q.id.clone());
                    continue;
                }
                Some(_) => {
                    self.pending_skip = None;
                }
                None => {}
            }
            self.cursor = idx;
            self.rendered.push(q.id.clone());
            return;
        }
        debug!("present_from: end of the schema reached");
        self.cursor = questions.len();
        self.pending_skip = None;
        self.outcome = Some(Outcome::Completed);
    }
}

pub use crate::config::*;

use std::collections::HashSet;

use log::debug;

/// A builder for questionnaires.
///
/// Every call to [`SchemaBuilder::build`] returns a new, independent snapshot. Sessions
/// that are already running on an older snapshot are not affected by later edits.
///
/// ```
/// use survey_report::builder::SchemaBuilder;
/// use survey_report::{Action, QuestionDefinition};
/// # use survey_report::ConfigIssue;
///
/// let mut builder = SchemaBuilder::new();
/// builder.add_question(QuestionDefinition::choice("q1", "Consent", &["Yes", "No"]))?;
/// builder.add_question(QuestionDefinition::text("q2", "Name"))?;
/// builder.set_rule("q1", "No", Action::Terminate)?;
///
/// let schema = builder.build().map_err(|mut issues| issues.remove(0))?;
/// assert_eq!(schema.len(), 2);
/// # Ok::<(), ConfigIssue>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    questions: Vec<QuestionDefinition>,
}

impl SchemaBuilder {
    pub fn new() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Starts editing from an existing snapshot.
    pub fn from_schema(schema: &Schema) -> SchemaBuilder {
        SchemaBuilder {
            questions: schema.questions().to_vec(),
        }
    }

    /// Adds a question at the end. Identifiers must be unique.
    pub fn add_question(&mut self, question: QuestionDefinition) -> Result<(), ConfigIssue> {
        if self.questions.iter().any(|q| q.id == question.id) {
            return Err(ConfigIssue::DuplicateId(question.id));
        }
        self.questions.push(question);
        Ok(())
    }

    /// Removes a question, and all the rules skipping to it.
    pub fn remove_question(&mut self, id: &str) -> Option<QuestionDefinition> {
        let qid = QuestionId::new(id);
        let pos = self.questions.iter().position(|q| q.id == qid)?;
        let removed = self.questions.remove(pos);
        for q in self.questions.iter_mut() {
            q.branch_rules
                .retain(|_, action| !matches!(action, Action::SkipTo(t) if *t == qid));
        }
        Some(removed)
    }

    /// Moves a question to a new position, shifting the following ones.
    pub fn move_question(&mut self, id: &str, new_index: usize) -> Result<(), ConfigIssue> {
        let qid = QuestionId::new(id);
        let pos = self
            .questions
            .iter()
            .position(|q| q.id == qid)
            .ok_or_else(|| ConfigIssue::UnknownQuestion(qid.clone()))?;
        let q = self.questions.remove(pos);
        let idx = new_index.min(self.questions.len());
        self.questions.insert(idx, q);
        Ok(())
    }

    /// Sets the branch rule of an option of a choice question.
    pub fn set_rule(&mut self, id: &str, option: &str, action: Action) -> Result<(), ConfigIssue> {
        let qid = QuestionId::new(id);
        let q = self
            .questions
            .iter_mut()
            .find(|q| q.id == qid)
            .ok_or_else(|| ConfigIssue::UnknownQuestion(qid.clone()))?;
        if q.kind != QuestionKind::Choice {
            return Err(ConfigIssue::BranchRulesOnNonChoice(qid));
        }
        if !q.options.iter().any(|o| o == option) {
            return Err(ConfigIssue::UnknownBranchOption {
                question: qid,
                option: option.to_string(),
            });
        }
        q.branch_rules.insert(option.to_string(), action);
        Ok(())
    }

    /// Returns a snapshot, or all the issues found in the current questions.
    pub fn build(&self) -> Result<Schema, Vec<ConfigIssue>> {
        let schema = Schema::new(self.questions.clone());
        let issues = schema.validate();
        if issues.is_empty() {
            Ok(schema)
        } else {
            Err(issues)
        }
    }
}

impl Schema {
    /// Checks the whole schema, and reports every issue found.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues: Vec<ConfigIssue> = Vec::new();
        let mut seen: HashSet<&QuestionId> = HashSet::new();
        for q in self.questions().iter() {
            if !seen.insert(&q.id) {
                issues.push(ConfigIssue::DuplicateId(q.id.clone()));
            }
        }

        for (pos, q) in self.questions().iter().enumerate() {
            match q.kind {
                QuestionKind::Choice if q.options.is_empty() => {
                    issues.push(ConfigIssue::EmptyOptions(q.id.clone()));
                }
                QuestionKind::Scale { min, max } if min > max => {
                    issues.push(ConfigIssue::InvalidScale {
                        question: q.id.clone(),
                        min,
                        max,
                    });
                }
                _ => {}
            }
            if q.branch_rules.is_empty() {
                continue;
            }
            if q.kind != QuestionKind::Choice {
                issues.push(ConfigIssue::BranchRulesOnNonChoice(q.id.clone()));
                continue;
            }
            // Sorted for stable reports.
            let mut rules: Vec<(&String, &Action)> = q.branch_rules.iter().collect();
            rules.sort_by_key(|(option, _)| option.as_str());
            for (option, action) in rules {
                if !q.options.contains(option) {
                    issues.push(ConfigIssue::UnknownBranchOption {
                        question: q.id.clone(),
                        option: option.clone(),
                    });
                }
                if let Action::SkipTo(target) = action {
                    match self.position(target) {
                        None => issues.push(ConfigIssue::UnknownSkipTarget {
                            question: q.id.clone(),
                            target: target.clone(),
                        }),
                        Some(tpos) if tpos <= pos => {
                            issues.push(ConfigIssue::BackwardSkipTarget {
                                question: q.id.clone(),
                                target: target.clone(),
                            })
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        debug!("validate: {} questions, {} issues", self.len(), issues.len());
        issues
    }
}

/// A builder for report structures.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    title: String,
    chapters: Vec<Chapter>,
}

impl ReportBuilder {
    pub fn new(title: &str) -> ReportBuilder {
        ReportBuilder {
            title: title.to_string(),
            chapters: Vec::new(),
        }
    }

    pub fn from_structure(structure: &ReportStructure) -> ReportBuilder {
        ReportBuilder {
            title: structure.title.clone(),
            chapters: structure.chapters.clone(),
        }
    }

    /// Adds a chapter at the end and returns its index.
    pub fn add_chapter(&mut self, title: &str) -> usize {
        self.chapters.push(Chapter {
            title: title.to_string(),
            items: Vec::new(),
        });
        self.chapters.len() - 1
    }

    /// Adds an item at the end of a chapter. Returns false if there is no such chapter.
    pub fn add_item(&mut self, chapter: usize, item: AnalysisItem) -> bool {
        match self.chapters.get_mut(chapter) {
            Some(c) => {
                c.items.push(item);
                true
            }
            None => false,
        }
    }

    pub fn remove_chapter(&mut self, chapter: usize) -> Option<Chapter> {
        if chapter < self.chapters.len() {
            Some(self.chapters.remove(chapter))
        } else {
            None
        }
    }

    pub fn build(&self) -> ReportStructure {
        ReportStructure {
            title: self.title.clone(),
            chapters: self.chapters.clone(),
        }
    }
}

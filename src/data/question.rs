use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::pattern::glob_match;
use crate::error::{HtkError, Result};

// ---------------------------------------------------------------------------
// Question – a named predicate over context labels
// ---------------------------------------------------------------------------

/// A named question: the label answers "yes" when any pattern matches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub name: String,
    /// Wildcard patterns (`*`, `?`, `[seq]`), tried in order.
    pub patterns: Vec<String>,
}

impl Question {
    /// Build a question. The name and every pattern must be non-empty and
    /// free of characters the file syntax reserves.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        patterns: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let name = name.into();
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if name.is_empty() {
            return Err(HtkError::structure("question name is empty"));
        }
        if patterns.is_empty() {
            return Err(HtkError::structure(format!(
                "question {name} has no patterns"
            )));
        }
        if name.contains(|c: char| c.is_whitespace() || matches!(c, '"' | '{' | '}')) {
            return Err(HtkError::structure(format!(
                "question name `{name}` contains whitespace, a quote or a brace"
            )));
        }
        for pattern in &patterns {
            if pattern.is_empty() {
                return Err(HtkError::structure(format!(
                    "question {name} has an empty pattern"
                )));
            }
            if pattern.contains(|c: char| c.is_whitespace() || matches!(c, '"' | ',' | '{' | '}')) {
                return Err(HtkError::structure(format!(
                    "question {name}: pattern `{pattern}` contains a reserved character"
                )));
            }
        }
        Ok(Self { name, patterns })
    }

    /// Whether `label` satisfies this question.
    pub fn matches(&self, label: &str) -> bool {
        self.patterns.iter().any(|p| glob_match(p, label))
    }
}

// ---------------------------------------------------------------------------
// QuestionSet – insertion-ordered, indexed by name
// ---------------------------------------------------------------------------

/// Ordered collection of questions with unique names.
///
/// Iteration follows insertion order so that re-serialising a parsed file
/// reproduces it; lookup by name goes through a hash index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Question>", into = "Vec<Question>")]
pub struct QuestionSet {
    questions: Vec<Question>,
    index: HashMap<String, usize>,
}

impl QuestionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a question. Fails if the name is already taken.
    pub fn insert(&mut self, question: Question) -> Result<()> {
        if self.index.contains_key(&question.name) {
            return Err(HtkError::structure(format!(
                "duplicate question name {}",
                question.name
            )));
        }
        self.index
            .insert(question.name.clone(), self.questions.len());
        self.questions.push(question);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Question> {
        self.index.get(name).map(|&i| &self.questions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Questions in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Question> {
        self.questions.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(|q| q.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Answer every question for one label, in set order.
    pub fn answers(&self, label: &str) -> Vec<bool> {
        self.questions.iter().map(|q| q.matches(label)).collect()
    }
}

impl PartialEq for QuestionSet {
    fn eq(&self, other: &Self) -> bool {
        self.questions == other.questions
    }
}

impl Eq for QuestionSet {}

impl TryFrom<Vec<Question>> for QuestionSet {
    type Error = HtkError;

    fn try_from(questions: Vec<Question>) -> Result<Self> {
        let mut set = QuestionSet::new();
        for question in questions {
            set.insert(question)?;
        }
        Ok(set)
    }
}

impl From<QuestionSet> for Vec<Question> {
    fn from(set: QuestionSet) -> Self {
        set.questions
    }
}

impl<'a> IntoIterator for &'a QuestionSet {
    type Item = &'a Question;
    type IntoIter = std::slice::Iter<'a, Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.iter()
    }
}

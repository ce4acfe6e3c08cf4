//! Decides how a question should be answered from its text alone.
//!
//! The result is never stored; it is recomputed whenever a question is shown,
//! so it must stay a pure function of the text.

use serde::{Deserialize, Serialize};

use super::model::{Modality, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Coding,
    FreeResponse,
}

impl QuestionKind {
    /// Capture mode offered first for this kind of question
    pub fn default_modality(self) -> Modality {
        match self {
            QuestionKind::Coding => Modality::Code,
            QuestionKind::FreeResponse => Modality::Voice,
        }
    }
}

/// Phrases that mark a question as a coding task on their own
const CODING_PHRASES: &[&str] = &[
    "write a function",
    "write a program",
    "write code",
    "write a script",
    "write an algorithm",
    "implement a",
    "implement an",
    "implement the",
    "given an array",
    "given a string",
    "given a linked list",
    "given a binary tree",
];

/// Imperatives that ask the candidate to produce something
const ACTION_VERBS: &[&str] = &["implement", "write", "code", "program", "compute", "design"];

/// Artifacts that only make sense as code
const CODE_NOUNS: &[&str] = &[
    "function",
    "functions",
    "algorithm",
    "method",
    "class",
    "array",
    "arrays",
    "string",
    "strings",
    "list",
    "tree",
    "stack",
    "queue",
    "matrix",
    "script",
    "query",
    "sql",
    "loop",
    "recursion",
];

pub struct QuestionClassifier;

impl QuestionClassifier {
    pub fn classify(question: &Question) -> QuestionKind {
        Self::classify_text(&question.text)
    }

    pub fn classify_text(text: &str) -> QuestionKind {
        let lowered = text.to_lowercase();

        if CODING_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
            return QuestionKind::Coding;
        }

        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
            .filter(|t| !t.is_empty())
            .collect();

        let has_verb = tokens.iter().any(|t| ACTION_VERBS.contains(t));
        let has_noun = tokens.iter().any(|t| CODE_NOUNS.contains(t));

        if has_verb && has_noun {
            QuestionKind::Coding
        } else {
            QuestionKind::FreeResponse
        }
    }
}

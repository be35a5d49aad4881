// src/models/question.rs

use serde::{Deserialize, Serialize};

/// Display item kind. Only `Single` items carry choices and can be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Heading,
    Intro,
    Single,
}

/// Server-side question, including the correct answer.
///
/// Deliberately not `Serialize`: the only wire form is [`PublicQuestion`].
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,
    pub question_type: QuestionType,
    pub stem: String,
    pub choices: Vec<String>,
    pub points: u32,
    /// Index into `choices`. `None` for headings, intros and unscorable problems.
    pub answer: Option<usize>,
}

impl Question {
    pub fn heading(id: String, stem: String) -> Self {
        Self {
            id,
            question_type: QuestionType::Heading,
            stem,
            choices: Vec::new(),
            points: 0,
            answer: None,
        }
    }

    pub fn intro(id: String, stem: String) -> Self {
        Self {
            id,
            question_type: QuestionType::Intro,
            stem,
            choices: Vec::new(),
            points: 0,
            answer: None,
        }
    }
}

/// DTO for sending a question to the candidate (no answer field at all).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub stem: String,
    pub choices: Vec<String>,
    pub points: u32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            question_type: q.question_type,
            stem: q.stem.clone(),
            choices: q.choices.clone(),
            points: q.points,
        }
    }
}

/// One parallel question set within a section.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub key: String,
    pub title: Option<String>,
    pub intro: Option<String>,
    pub problems: Vec<Question>,
}

impl Variant {
    /// Summed in `u64`: a single problem may carry up to `u32::MAX` points.
    pub fn total_points(&self) -> u64 {
        self.problems.iter().map(|p| u64::from(p.points)).sum()
    }
}

/// A topic grouping one or more interchangeable variants.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: String,
    pub title: Option<String>,
    pub variants: Vec<Variant>,
}

impl Section {
    pub fn variant(&self, key: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.key == key)
    }
}

/// Paper returned by `GET /exam/{token}/questions`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperResponse {
    pub title: String,
    pub duration_sec: i64,
    pub questions: Vec<PublicQuestion>,
}

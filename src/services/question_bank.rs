// src/services/question_bank.rs

//! Question document loader.
//!
//! Accepts either a sectioned document (`sections` -> variants -> problems)
//! or the legacy flat `questions` list. Field names drift between document
//! generations, so every semantic field has an ordered list of accepted keys
//! which is resolved once here; the rest of the crate only sees the canonical
//! [`Section`] / [`Question`] types.

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::issue::ChosenVariants;
use crate::models::question::{Question, QuestionType, Section, Variant};
use crate::services::variants::build_questions_for_chosen;

const ID_KEYS: &[&str] = &["id", "qid"];
const TYPE_KEYS: &[&str] = &["type", "kind"];
const STEM_KEYS: &[&str] = &["stem", "question", "body", "text", "prompt"];
const CHOICE_KEYS: &[&str] = &["choices", "options"];
const ANSWER_KEYS: &[&str] = &["answer", "answerIndex", "answer_index", "correct", "correctIndex"];
const POINT_KEYS: &[&str] = &["points", "score"];

const SECTION_ID_KEYS: &[&str] = &["id", "key", "name"];
const SECTION_TITLE_KEYS: &[&str] = &["title", "name", "heading"];
const VARIANT_KEY_KEYS: &[&str] = &["key", "id", "name"];
const VARIANT_TITLE_KEYS: &[&str] = &["title", "label"];
const VARIANT_INTRO_KEYS: &[&str] = &["intro", "introduction", "lead"];
const PROBLEM_LIST_KEYS: &[&str] = &["problems", "questions", "items"];

const DEFAULT_POINTS: u32 = 1;

#[derive(Debug, Error)]
pub enum BankError {
    #[error("failed to read question bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("malformed question bank: {0}")]
    Shape(String),
}

/// Loaded question bank. Built once at startup and shared read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionBank {
    pub title: Option<String>,
    /// Sectioned format. Takes precedence over `questions` when non-empty.
    pub sections: Vec<Section>,
    /// Legacy flat format.
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the bank from disk. A missing or broken document is logged and
    /// yields an empty bank so the rest of the service keeps running.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path)
            .map_err(BankError::from)
            .and_then(|raw| Self::from_json_str(&raw))
        {
            Ok(bank) => {
                tracing::info!(
                    path = %path.display(),
                    sections = bank.sections.len(),
                    questions = bank.questions.len(),
                    "Question bank loaded"
                );
                bank
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "Question bank unavailable: {}", e);
                Self::empty()
            }
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, BankError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, BankError> {
        let root = value
            .as_object()
            .ok_or_else(|| BankError::Shape("document root must be an object".to_string()))?;

        let title = first_str(root, &["title", "name"]);

        let sections = match root.get("sections") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| parse_section(i, item))
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err(BankError::Shape("`sections` must be an array".to_string())),
        };

        let questions = if sections.is_empty() {
            match root.get("questions") {
                Some(Value::Array(items)) => parse_flat(items),
                Some(Value::Null) | None => Vec::new(),
                Some(_) => return Err(BankError::Shape("`questions` must be an array".to_string())),
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            title,
            sections,
            questions,
        })
    }

    pub fn is_sectioned(&self) -> bool {
        !self.sections.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.questions.is_empty()
    }

    /// Number of display items in a default (first-variant) paper.
    pub fn item_count(&self) -> usize {
        self.paper_for(&ChosenVariants::new()).len()
    }

    /// Full paper (answers included) for a variant assignment.
    pub fn paper_for(&self, chosen: &ChosenVariants) -> Vec<Question> {
        if self.is_sectioned() {
            build_questions_for_chosen(&self.sections, chosen)
        } else {
            self.questions.clone()
        }
    }
}

fn first_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn parse_type(obj: &Map<String, Value>) -> Option<QuestionType> {
    let raw = first_str(obj, TYPE_KEYS).map(|s| s.to_ascii_lowercase());
    match raw.as_deref() {
        None | Some("single") | Some("mcq") | Some("radio") | Some("choice") => {
            Some(QuestionType::Single)
        }
        Some("heading") => Some(QuestionType::Heading),
        Some("intro") => Some(QuestionType::Intro),
        Some(other) => {
            tracing::warn!(question_type = other, "Unsupported question type, skipping");
            None
        }
    }
}

fn parse_points(obj: &Map<String, Value>) -> u32 {
    match first_value(obj, POINT_KEYS) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(|p| p.clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(DEFAULT_POINTS),
        Some(Value::String(s)) => s.trim().parse::<u32>().unwrap_or(DEFAULT_POINTS),
        _ => DEFAULT_POINTS,
    }
}

fn parse_answer(obj: &Map<String, Value>, choice_count: usize) -> Option<usize> {
    let index = match first_value(obj, ANSWER_KEYS)? {
        Value::Number(n) => n.as_u64()? as usize,
        Value::String(s) => s.trim().parse::<usize>().ok()?,
        _ => return None,
    };
    (index < choice_count).then_some(index)
}

fn parse_choices(obj: &Map<String, Value>) -> Vec<String> {
    match first_value(obj, CHOICE_KEYS) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|c| match c {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_single(obj: &Map<String, Value>, id: String, stem: String) -> Question {
    let choices = parse_choices(obj);
    let answer = parse_answer(obj, choices.len());
    if answer.is_none() {
        tracing::warn!(question_id = %id, "Question has no valid answer index, it will not be scored");
    }
    Question {
        id,
        question_type: QuestionType::Single,
        stem,
        points: parse_points(obj),
        choices,
        answer,
    }
}

/// Parses one entry of the legacy flat list. `default_id` is used when the
/// document has no id. Unsupported types are skipped.
fn parse_problem(value: &Value, default_id: String) -> Option<Question> {
    let obj = value.as_object()?;
    let question_type = parse_type(obj)?;
    let id = first_str(obj, ID_KEYS).unwrap_or(default_id);
    let stem = first_str(obj, STEM_KEYS).unwrap_or_default();

    match question_type {
        QuestionType::Heading => Some(Question::heading(id, stem)),
        QuestionType::Intro => Some(Question::intro(id, stem)),
        QuestionType::Single => Some(parse_single(obj, id, stem)),
    }
}

/// Parses one problem inside a variant. Variant problems are always
/// single-choice, whatever their type tag says.
fn parse_variant_problem(value: &Value, default_id: String) -> Option<Question> {
    let Some(obj) = value.as_object() else {
        tracing::warn!(question_id = %default_id, "Variant problem is not an object, skipping");
        return None;
    };
    let id = first_str(obj, ID_KEYS).unwrap_or(default_id);
    let stem = first_str(obj, STEM_KEYS).unwrap_or_default();
    Some(parse_single(obj, id, stem))
}

fn parse_flat(items: &[Value]) -> Vec<Question> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| parse_problem(item, format!("q{}", i + 1)))
        .collect()
}

fn parse_variant(section_id: &str, position: usize, key: Option<String>, value: &Value) -> Option<Variant> {
    let obj = value.as_object()?;
    let key = key
        .or_else(|| first_str(obj, VARIANT_KEY_KEYS))
        .unwrap_or_else(|| default_variant_key(position));

    let problems = match first_value(obj, PROBLEM_LIST_KEYS) {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| parse_variant_problem(item, format!("{}_q{}", section_id, i + 1)))
            .collect(),
        _ => Vec::new(),
    };

    Some(Variant {
        key,
        title: first_str(obj, VARIANT_TITLE_KEYS),
        intro: first_str(obj, VARIANT_INTRO_KEYS),
        problems,
    })
}

fn default_variant_key(position: usize) -> String {
    match u8::try_from(position) {
        Ok(p) if p < 26 => char::from(b'A' + p).to_string(),
        _ => format!("V{}", position + 1),
    }
}

fn parse_section(position: usize, value: &Value) -> Option<Section> {
    let obj = value.as_object()?;
    let id = first_str(obj, SECTION_ID_KEYS).unwrap_or_else(|| format!("s{}", position + 1));

    let variants = match obj.get("variants") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, v)| parse_variant(&id, i, None, v))
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .enumerate()
            .filter_map(|(i, (key, v))| parse_variant(&id, i, Some(key.clone()), v))
            .collect(),
        _ => Vec::new(),
    };

    if variants.is_empty() {
        tracing::warn!(section = %id, "Section has no variants, it will be skipped");
    }

    Some(Section {
        title: first_str(obj, SECTION_TITLE_KEYS),
        id,
        variants,
    })
}

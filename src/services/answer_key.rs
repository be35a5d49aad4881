// src/services/answer_key.rs

use std::collections::HashMap;

use crate::models::question::{Question, QuestionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEntry {
    pub answer_index: usize,
    pub points: u32,
}

/// Scoring key for one candidate's paper.
///
/// Always rebuilt from the issue's own variant choice: two candidates can
/// share a question id while holding different variants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerKey {
    entries: HashMap<String, KeyEntry>,
    total_points: u64,
}

impl AnswerKey {
    pub fn get(&self, id: &str) -> Option<&KeyEntry> {
        self.entries.get(id)
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Projects a full paper into its answer key. Headings, intros and problems
/// without an answer index are skipped. A repeated id keeps its first entry.
pub fn build_answer_key(questions: &[Question]) -> AnswerKey {
    let mut key = AnswerKey::default();

    for q in questions {
        if q.question_type != QuestionType::Single {
            continue;
        }
        let Some(answer_index) = q.answer else {
            continue;
        };
        if key.entries.contains_key(&q.id) {
            tracing::warn!(question_id = %q.id, "Duplicate question id in paper, keeping the first");
            continue;
        }
        key.entries.insert(
            q.id.clone(),
            KeyEntry {
                answer_index,
                points: q.points,
            },
        );
        key.total_points += u64::from(q.points);
    }

    key
}

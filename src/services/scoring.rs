// src/services/scoring.rs

use std::collections::HashSet;

use crate::models::attempt::SubmittedAnswer;
use crate::services::answer_key::AnswerKey;

/// Scores a submission against a key.
///
/// Pure and deterministic. Unknown ids and non-matching values earn nothing;
/// an id answered more than once is judged on its first answer only.
pub fn score_answers(answers: &[SubmittedAnswer], key: &AnswerKey) -> u64 {
    let mut seen = HashSet::new();
    let mut score = 0u64;

    for answer in answers {
        if !seen.insert(answer.id.as_str()) {
            continue;
        }
        let Some(entry) = key.get(&answer.id) else {
            continue;
        };
        if answer.value.as_u64() == Some(entry.answer_index as u64) {
            score += u64::from(entry.points);
        }
    }

    score
}

/// Pass/fail rule. An absolute threshold wins over the rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassPolicy {
    pub threshold: Option<u32>,
    pub rate: f64,
}

impl Default for PassPolicy {
    fn default() -> Self {
        Self {
            threshold: None,
            rate: 0.7,
        }
    }
}

impl PassPolicy {
    pub fn required_score(&self, total_points: u64) -> u64 {
        match self.threshold {
            Some(threshold) => u64::from(threshold),
            // The epsilon keeps float noise (0.7 * 30 = 21.000000000000004) from bumping ceil.
            None => (total_points as f64 * self.rate - 1e-9).ceil().max(0.0) as u64,
        }
    }

    /// A paper worth nothing can never be passed.
    pub fn passed(&self, score: u64, total_points: u64) -> bool {
        total_points > 0 && score >= self.required_score(total_points)
    }
}

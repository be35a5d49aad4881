// src/services/variants.rs

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{
    error::ExamError,
    models::{
        issue::{ChosenVariants, Issue, IssueStatus},
        question::{PublicQuestion, Question, Section, Variant},
    },
    repository::IssueTx,
};

/// Picks one variant key per section, uniformly at random.
/// Sections without variants are left out of the mapping.
pub fn pick_variants<R: Rng + ?Sized>(sections: &[Section], rng: &mut R) -> ChosenVariants {
    sections
        .iter()
        .filter_map(|section| {
            section
                .variants
                .choose(rng)
                .map(|variant| (section.id.clone(), variant.key.clone()))
        })
        .collect()
}

/// Returns the issue's persisted variant choice, assigning and persisting one
/// on first use.
///
/// Must run inside a transaction holding the issue's row lock so two
/// concurrent first fetches cannot assign different papers. Closed issues
/// (submitted or expired) never get a new assignment; they fall back to the
/// first variant of every section.
pub async fn select_or_load_variants(
    tx: &mut dyn IssueTx,
    issue: &mut Issue,
    sections: &[Section],
) -> Result<ChosenVariants, ExamError> {
    if let Some(chosen) = &issue.chosen_variants {
        return Ok(chosen.clone());
    }
    if matches!(issue.status, IssueStatus::Submitted | IssueStatus::Expired) {
        return Ok(ChosenVariants::new());
    }

    let chosen = pick_variants(sections, &mut rand::thread_rng());
    issue.chosen_variants = Some(chosen.clone());
    tx.update_issue(issue).await?;

    tracing::info!(issue_id = issue.id, variants = ?chosen, "Variants assigned");
    Ok(chosen)
}

fn heading_text(section: &Section, variant: &Variant) -> String {
    let section_title = section.title.as_deref().unwrap_or(&section.id);
    let label = match &variant.title {
        Some(title) => format!("{} / {}", section_title, title),
        None => section_title.to_string(),
    };
    format!("{} ({} points)", label, variant.total_points())
}

/// Flattens the chosen variants into the ordered paper, answers included.
///
/// Per section in document order: a heading, the variant intro if any, then
/// the problems. An unknown or missing choice falls back to the first variant.
pub fn build_questions_for_chosen(sections: &[Section], chosen: &ChosenVariants) -> Vec<Question> {
    let mut paper = Vec::new();

    for section in sections {
        let variant = chosen
            .get(&section.id)
            .and_then(|key| section.variant(key))
            .or_else(|| section.variants.first());
        let Some(variant) = variant else {
            continue;
        };

        paper.push(Question::heading(
            format!("{}_heading", section.id),
            heading_text(section, variant),
        ));
        if let Some(intro) = &variant.intro {
            paper.push(Question::intro(format!("{}_intro", section.id), intro.clone()));
        }
        paper.extend(variant.problems.iter().cloned());
    }

    paper
}

/// Client projection of a paper. The answer field does not exist on the output type.
pub fn strip_answers(questions: &[Question]) -> Vec<PublicQuestion> {
    questions.iter().map(PublicQuestion::from).collect()
}

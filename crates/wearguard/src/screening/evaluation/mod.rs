mod rules;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{Item, Match, SubjectId, SubjectItems};
use super::ruleset::Ruleset;

/// Score and best blacklist hit for a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEvaluation {
    pub score: f64,
    #[serde(rename = "match")]
    pub best: Option<Match>,
}

/// Aggregate over a set of items evaluated independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScore {
    pub score: f64,
    pub matches: Vec<Match>,
}

/// One subject's contribution to a multi-subject report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScore {
    pub subject_id: SubjectId,
    pub score: f64,
    pub matches: Vec<Match>,
}

/// Multi-subject evaluation output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectsReport {
    pub per_user: Vec<SubjectScore>,
    pub total_score: f64,
}

/// How far a whitelist hit reaches when suppressing blacklist entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuppressionScope {
    /// Any whitelist entry found anywhere in the name suppresses every blacklist hit.
    #[default]
    Name,
    /// A whitelist entry only suppresses blacklist hits whose span it overlaps.
    Span,
}

impl SuppressionScope {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Some(Self::Name),
            "span" => Some(Self::Span),
            _ => None,
        }
    }
}

/// Stateless evaluator; holds only the suppression policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationEngine {
    scope: SuppressionScope,
}

impl EvaluationEngine {
    pub fn new(scope: SuppressionScope) -> Self {
        Self { scope }
    }

    pub fn evaluate_item(&self, item: &Item, ruleset: &Ruleset) -> ItemEvaluation {
        let best = rules::best_match(item, ruleset, self.scope);
        ItemEvaluation {
            score: best.as_ref().map_or(0.0, |hit| hit.score),
            best,
        }
    }

    /// Evaluates every item on its own and sums the per-item best scores.
    pub fn evaluate_items(&self, items: &[Item], ruleset: &Ruleset) -> BatchScore {
        items
            .iter()
            .map(|item| self.evaluate_item(item, ruleset))
            .fold(BatchScore::default(), |mut batch, evaluation| {
                batch.score += evaluation.score;
                batch.matches.extend(evaluation.best);
                batch
            })
    }

    /// Fans out over subjects; subjects without items produce no entry.
    pub fn evaluate_subjects(&self, subjects: &[SubjectItems], ruleset: &Ruleset) -> SubjectsReport {
        let mut report = SubjectsReport::default();

        for subject in subjects {
            if subject.items.is_empty() {
                debug!(subject_id = %subject.subject_id, "no items to evaluate; skipping subject");
                continue;
            }

            let batch = self.evaluate_items(&subject.items, ruleset);
            debug!(
                subject_id = %subject.subject_id,
                items = subject.items.len(),
                matches = batch.matches.len(),
                score = batch.score,
                "subject evaluated"
            );

            report.total_score += batch.score;
            report.per_user.push(SubjectScore {
                subject_id: subject.subject_id,
                score: batch.score,
                matches: batch.matches,
            });
        }

        report
    }
}

/// Evaluates one item with whole-name whitelist suppression.
pub fn evaluate_item(item: &Item, ruleset: &Ruleset) -> ItemEvaluation {
    EvaluationEngine::default().evaluate_item(item, ruleset)
}

pub fn evaluate_items(items: &[Item], ruleset: &Ruleset) -> BatchScore {
    EvaluationEngine::default().evaluate_items(items, ruleset)
}

pub fn evaluate_subjects(subjects: &[SubjectItems], ruleset: &Ruleset) -> SubjectsReport {
    EvaluationEngine::default().evaluate_subjects(subjects, ruleset)
}

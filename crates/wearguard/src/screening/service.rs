use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Match, SubjectId, SubjectItems};
use super::evaluation::{EvaluationEngine, SubjectsReport};
use super::ruleset::{InvalidListKind, ListKind};
use super::sources::{FetchError, ItemSource, ItemSourceError, RulesetSource};
use super::store::{RulesetSnapshot, RulesetStore};

/// Result of screening a single subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectReport {
    pub subject_id: SubjectId,
    pub item_count: usize,
    pub score: f64,
    pub matches: Vec<Match>,
}

/// Item lookups a batch screening keeps in flight when no limit is configured.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Facade composing the item source, the cached ruleset and the evaluator.
pub struct ScreeningService<I, R> {
    items: Arc<I>,
    rulesets: Arc<RulesetStore<R>>,
    engine: EvaluationEngine,
    concurrency: usize,
}

impl<I, R> ScreeningService<I, R>
where
    I: ItemSource + 'static,
    R: RulesetSource + 'static,
{
    pub fn new(items: Arc<I>, rulesets: Arc<RulesetStore<R>>) -> Self {
        Self::with_engine(items, rulesets, EvaluationEngine::default())
    }

    pub fn with_engine(
        items: Arc<I>,
        rulesets: Arc<RulesetStore<R>>,
        engine: EvaluationEngine,
    ) -> Self {
        Self {
            items,
            rulesets,
            engine,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Caps the subjects whose items are looked up at once by [`Self::check_subjects`].
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn rulesets(&self) -> &Arc<RulesetStore<R>> {
        &self.rulesets
    }

    /// Screen one subject's worn items.
    pub async fn check_subject(
        &self,
        subject_id: SubjectId,
    ) -> Result<SubjectReport, ScreeningError> {
        let items = self
            .items
            .items_for(subject_id)
            .await
            .map_err(|source| ScreeningError::ItemSource { subject_id, source })?;
        if items.is_empty() {
            return Err(ScreeningError::NoItems(subject_id));
        }

        let snapshot = self.rulesets.get().await?;
        let batch = self.engine.evaluate_items(&items, &snapshot.ruleset);
        info!(
            %subject_id,
            items = items.len(),
            matches = batch.matches.len(),
            score = batch.score,
            revision = snapshot.revision,
            "subject screened"
        );

        Ok(SubjectReport {
            subject_id,
            item_count: items.len(),
            score: batch.score,
            matches: batch.matches,
        })
    }

    /// Screen several subjects. Subjects whose items cannot be listed, or who
    /// wear nothing, are left out of the report rather than failing it.
    pub async fn check_subjects(
        &self,
        subject_ids: &[SubjectId],
    ) -> Result<SubjectsReport, ScreeningError> {
        if subject_ids.is_empty() {
            return Ok(SubjectsReport::default());
        }

        let snapshot = self.rulesets.get().await?;
        let subjects: Vec<SubjectItems> = stream::iter(subject_ids.iter().copied())
            .map(|subject_id| async move {
                let items = match self.items.items_for(subject_id).await {
                    Ok(items) => items,
                    Err(error) => {
                        warn!(%subject_id, %error, "omitting subject whose items could not be listed");
                        Vec::new()
                    }
                };
                SubjectItems { subject_id, items }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = self.engine.evaluate_subjects(&subjects, &snapshot.ruleset);
        info!(
            requested = subject_ids.len(),
            scored = report.per_user.len(),
            total_score = report.total_score,
            revision = snapshot.revision,
            "subjects screened"
        );
        Ok(report)
    }

    /// Append `text` to the named list of the cached ruleset.
    pub async fn modify_pattern(
        &self,
        list: &str,
        text: &str,
        points: Option<f64>,
    ) -> Result<Arc<RulesetSnapshot>, ScreeningError> {
        let list: ListKind = list.parse()?;
        if text.is_empty() {
            return Err(ScreeningError::EmptyPattern);
        }

        let pattern = text.to_string();
        let snapshot = self
            .rulesets
            .update(move |ruleset| ruleset.modify_pattern(list, pattern, points))
            .await?;
        info!(%list, pattern = text, ?points, revision = snapshot.revision, "ruleset pattern added");
        Ok(snapshot)
    }

    pub async fn ruleset(&self) -> Result<Arc<RulesetSnapshot>, ScreeningError> {
        Ok(self.rulesets.get().await?)
    }

    pub async fn refresh_ruleset(&self) -> Result<Arc<RulesetSnapshot>, ScreeningError> {
        Ok(self.rulesets.refresh().await?)
    }
}

/// Error raised by the screening service.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningError {
    #[error("subject {0} has no items")]
    NoItems(SubjectId),
    #[error("items for subject {subject_id} could not be listed: {source}")]
    ItemSource {
        subject_id: SubjectId,
        #[source]
        source: ItemSourceError,
    },
    #[error("ruleset unavailable: {0}")]
    RulesetUnavailable(#[from] FetchError),
    #[error(transparent)]
    InvalidListKind(#[from] InvalidListKind),
    #[error("pattern text must not be empty")]
    EmptyPattern,
}

impl ScreeningError {
    /// Stable reason string reported to API callers.
    pub fn reason(&self) -> &'static str {
        match self {
            ScreeningError::NoItems(_) => "no items",
            ScreeningError::ItemSource { .. } => "item source unavailable",
            ScreeningError::RulesetUnavailable(_) => "ruleset unavailable",
            ScreeningError::InvalidListKind(_) => "invalid list kind",
            ScreeningError::EmptyPattern => "empty pattern",
        }
    }
}

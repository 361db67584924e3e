//! Worn-item screening: pattern matching, ruleset maintenance and scoring.
//!
//! [`evaluation`] is the pure scoring core. [`service::ScreeningService`]
//! wires it to an [`sources::ItemSource`] and a cached
//! [`sources::RulesetSource`], and [`router::screening_router`] exposes the
//! service over HTTP.

pub mod domain;
pub mod evaluation;
pub mod matcher;
pub mod router;
pub mod ruleset;
pub mod service;
pub mod sources;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{Item, ItemId, Match, SubjectId, SubjectItems};
pub use evaluation::{
    evaluate_item, evaluate_items, evaluate_subjects, BatchScore, EvaluationEngine,
    ItemEvaluation, SubjectScore, SubjectsReport, SuppressionScope,
};
pub use router::{screening_router, PatternEdit, ScreeningRequest};
pub use ruleset::{BlacklistEntry, InvalidListKind, ListKind, Ruleset};
pub use service::{ScreeningError, ScreeningService, SubjectReport, DEFAULT_CONCURRENCY};
pub use sources::{
    CsvItemSource, CsvItemSourceError, FetchError, FileRulesetSource, HttpItemSource,
    HttpRulesetSource, ItemLookupError, ItemSource, ItemSourceError, RulesetSource,
    SourceSetupError,
};
pub use store::{RulesetSnapshot, RulesetStore};

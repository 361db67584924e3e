//! Collaborators that supply worn items and the ruleset document.
//!
//! The screening service only depends on the two traits below; the concrete
//! HTTP and file-backed implementations live in the submodules.

mod file;
mod http;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

pub use file::{CsvItemSource, CsvItemSourceError, FileRulesetSource};
pub use http::{HttpItemSource, HttpRulesetSource};

use super::domain::{Item, ItemId, SubjectId};
use super::ruleset::Ruleset;

/// Supplies the ruleset document. Expected to be called once and cached.
pub trait RulesetSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<Ruleset, FetchError>> + Send;
}

/// Supplies the items a subject currently wears.
///
/// Implementations drop items whose individual lookup fails; only a failure
/// to enumerate the subject's items is reported as an error.
pub trait ItemSource: Send + Sync {
    fn items_for(
        &self,
        subject: SubjectId,
    ) -> impl Future<Output = Result<Vec<Item>, ItemSourceError>> + Send;
}

impl<T: RulesetSource> RulesetSource for Arc<T> {
    fn fetch(&self) -> impl Future<Output = Result<Ruleset, FetchError>> + Send {
        self.as_ref().fetch()
    }
}

impl<T: ItemSource> ItemSource for Arc<T> {
    fn items_for(
        &self,
        subject: SubjectId,
    ) -> impl Future<Output = Result<Vec<Item>, ItemSourceError>> + Send {
        self.as_ref().items_for(subject)
    }
}

/// The ruleset could not be retrieved or decoded.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("ruleset request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ruleset endpoint responded with status {0}")]
    Status(reqwest::StatusCode),
    #[error("unable to read ruleset file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ruleset document is malformed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("ruleset source unavailable: {0}")]
    Unavailable(String),
}

/// The subject's worn items could not be enumerated.
#[derive(Debug, thiserror::Error)]
pub enum ItemSourceError {
    #[error("item request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("item endpoint responded with status {0}")]
    Status(reqwest::StatusCode),
    #[error("item source unavailable: {0}")]
    Unavailable(String),
}

/// A single item's details could not be resolved; the item is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ItemLookupError {
    #[error("lookup for item {item} failed: {source}")]
    Http {
        item: ItemId,
        source: reqwest::Error,
    },
    #[error("lookup for item {item} responded with status {status}")]
    Status {
        item: ItemId,
        status: reqwest::StatusCode,
    },
}

/// Building an outbound client failed.
#[derive(Debug, thiserror::Error)]
pub enum SourceSetupError {
    #[error("unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

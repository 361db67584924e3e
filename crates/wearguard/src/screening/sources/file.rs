use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use super::{FetchError, ItemSource, ItemSourceError, RulesetSource};
use crate::screening::domain::{Item, ItemId, SubjectId};
use crate::screening::ruleset::Ruleset;

/// Reads the ruleset JSON document from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileRulesetSource {
    path: PathBuf,
}

impl FileRulesetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RulesetSource for FileRulesetSource {
    async fn fetch(&self) -> Result<Ruleset, FetchError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|source| FetchError::Io {
                path: self.path.clone(),
                source,
            })?;
        let ruleset: Ruleset = serde_json::from_slice(&raw)?;
        info!(
            path = %self.path.display(),
            whitelist = ruleset.whitelist.len(),
            blacklist = ruleset.blacklist.len(),
            "ruleset file loaded"
        );
        Ok(ruleset)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CsvItemSourceError {
    #[error("unable to read item csv: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct ItemRow {
    subject_id: u64,
    item_id: u64,
    name: String,
}

/// Serves items loaded up front from a `subject_id,item_id,name` CSV export.
#[derive(Debug, Clone, Default)]
pub struct CsvItemSource {
    items: BTreeMap<SubjectId, Vec<Item>>,
}

impl CsvItemSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CsvItemSourceError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        Self::from_csv(reader)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CsvItemSourceError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv(reader)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, CsvItemSourceError> {
        let mut items: BTreeMap<SubjectId, Vec<Item>> = BTreeMap::new();
        for row in reader.deserialize::<ItemRow>() {
            let row = row?;
            items.entry(SubjectId(row.subject_id)).or_default().push(Item {
                id: ItemId(row.item_id),
                name: row.name,
            });
        }
        Ok(Self { items })
    }

    /// Subjects present in the export, in ascending id order.
    pub fn subjects(&self) -> Vec<SubjectId> {
        self.items.keys().copied().collect()
    }
}

impl ItemSource for CsvItemSource {
    async fn items_for(&self, subject: SubjectId) -> Result<Vec<Item>, ItemSourceError> {
        Ok(self.items.get(&subject).cloned().unwrap_or_default())
    }
}

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::ruleset::Ruleset;
use super::sources::{FetchError, RulesetSource};

/// Immutable view of the ruleset observed by one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesetSnapshot {
    /// Bumped on every fetch and every edit.
    pub revision: u64,
    pub fetched_at: DateTime<Utc>,
    pub ruleset: Ruleset,
}

/// Fetch-once cache around a [`RulesetSource`].
///
/// Readers clone the current `Arc` and never block on writers; edits build a
/// new snapshot and swap it in, so an evaluation in flight keeps seeing the
/// snapshot it started with. Failed fetches are not cached.
pub struct RulesetStore<S> {
    source: S,
    current: RwLock<Option<Arc<RulesetSnapshot>>>,
    fetch_gate: Mutex<()>,
}

impl<S> RulesetStore<S>
where
    S: RulesetSource,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            fetch_gate: Mutex::new(()),
        }
    }

    /// Returns the cached snapshot without touching the source.
    pub fn cached(&self) -> Option<Arc<RulesetSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the cached snapshot, fetching it on first use.
    pub async fn get(&self) -> Result<Arc<RulesetSnapshot>, FetchError> {
        if let Some(snapshot) = self.cached() {
            return Ok(snapshot);
        }

        let _gate = self.fetch_gate.lock().await;
        if let Some(snapshot) = self.cached() {
            return Ok(snapshot);
        }
        self.load().await
    }

    /// Discards the cached ruleset in favour of a fresh fetch.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<Arc<RulesetSnapshot>, FetchError> {
        let _gate = self.fetch_gate.lock().await;
        self.load().await
    }

    /// Applies `edit` to a copy of the current ruleset and publishes the result.
    pub async fn update<F>(&self, edit: F) -> Result<Arc<RulesetSnapshot>, FetchError>
    where
        F: FnOnce(&mut Ruleset),
    {
        let loaded = self.get().await?;
        let _gate = self.fetch_gate.lock().await;

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let base = current.clone().unwrap_or(loaded);
        let mut ruleset = base.ruleset.clone();
        edit(&mut ruleset);

        let snapshot = Arc::new(RulesetSnapshot {
            revision: base.revision + 1,
            fetched_at: base.fetched_at,
            ruleset,
        });
        *current = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn load(&self) -> Result<Arc<RulesetSnapshot>, FetchError> {
        match self.source.fetch().await {
            Ok(ruleset) => {
                let snapshot = self.install(ruleset);
                info!(
                    revision = snapshot.revision,
                    whitelist = snapshot.ruleset.whitelist.len(),
                    blacklist = snapshot.ruleset.blacklist.len(),
                    "ruleset cached"
                );
                Ok(snapshot)
            }
            Err(error) => {
                warn!(%error, "ruleset fetch failed");
                Err(error)
            }
        }
    }

    fn install(&self, ruleset: Ruleset) -> Arc<RulesetSnapshot> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let revision = current.as_ref().map_or(1, |snapshot| snapshot.revision + 1);
        let snapshot = Arc::new(RulesetSnapshot {
            revision,
            fetched_at: Utc::now(),
            ruleset,
        });
        *current = Some(Arc::clone(&snapshot));
        snapshot
    }
}

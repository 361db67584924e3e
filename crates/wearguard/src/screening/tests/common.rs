use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::screening::domain::{Item, SubjectId};
use crate::screening::ruleset::{BlacklistEntry, Ruleset};
use crate::screening::service::ScreeningService;
use crate::screening::sources::{FetchError, ItemSource, ItemSourceError, RulesetSource};
use crate::screening::store::RulesetStore;

pub(super) fn item(id: u64, name: &str) -> Item {
    Item::new(id, name)
}

pub(super) fn blacklist(text: &str, points: f64) -> BlacklistEntry {
    BlacklistEntry {
        text: text.to_string(),
        points,
    }
}

/// Whitelist "cute bunny"; blacklist "bunny" (5) and "gun" (10).
pub(super) fn bunny_ruleset() -> Ruleset {
    Ruleset::new(
        vec!["cute bunny".to_string()],
        vec![blacklist("bunny", 5.0), blacklist("gun", 10.0)],
    )
}

#[derive(Default, Clone)]
pub(super) struct MemoryItems {
    items: HashMap<SubjectId, Vec<Item>>,
    unavailable: HashSet<SubjectId>,
}

impl MemoryItems {
    pub(super) fn with_subject(mut self, subject: u64, items: Vec<Item>) -> Self {
        self.items.insert(SubjectId(subject), items);
        self
    }

    pub(super) fn with_unavailable(mut self, subject: u64) -> Self {
        self.unavailable.insert(SubjectId(subject));
        self
    }
}

impl ItemSource for MemoryItems {
    async fn items_for(&self, subject: SubjectId) -> Result<Vec<Item>, ItemSourceError> {
        if self.unavailable.contains(&subject) {
            return Err(ItemSourceError::Unavailable(format!(
                "catalog offline for {subject}"
            )));
        }
        Ok(self.items.get(&subject).cloned().unwrap_or_default())
    }
}

/// Gives every subject one item and records the peak number of overlapping lookups.
#[derive(Default)]
pub(super) struct TrackingItems {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl TrackingItems {
    pub(super) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ItemSource for TrackingItems {
    async fn items_for(&self, subject: SubjectId) -> Result<Vec<Item>, ItemSourceError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![item(subject.0, "Shotgun")])
    }
}

pub(super) struct StaticRuleset(pub(super) Ruleset);

impl RulesetSource for StaticRuleset {
    async fn fetch(&self) -> Result<Ruleset, FetchError> {
        Ok(self.0.clone())
    }
}

pub(super) struct UnavailableRuleset;

impl RulesetSource for UnavailableRuleset {
    async fn fetch(&self) -> Result<Ruleset, FetchError> {
        Err(FetchError::Unavailable("ruleset host unreachable".to_string()))
    }
}

/// Counts fetches and fails the first `failures` of them.
pub(super) struct CountingRuleset {
    ruleset: Ruleset,
    calls: AtomicUsize,
    failures: usize,
}

impl CountingRuleset {
    pub(super) fn new(ruleset: Ruleset) -> Self {
        Self::failing_first(ruleset, 0)
    }

    pub(super) fn failing_first(ruleset: Ruleset, failures: usize) -> Self {
        Self {
            ruleset,
            calls: AtomicUsize::new(0),
            failures,
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RulesetSource for CountingRuleset {
    async fn fetch(&self) -> Result<Ruleset, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if call < self.failures {
            return Err(FetchError::Unavailable(format!("attempt {call} failed")));
        }
        Ok(self.ruleset.clone())
    }
}

/// Serves its ruleset until switched offline.
pub(super) struct ToggleRuleset {
    ruleset: Ruleset,
    offline: AtomicBool,
}

impl ToggleRuleset {
    pub(super) fn new(ruleset: Ruleset) -> Self {
        Self {
            ruleset,
            offline: AtomicBool::new(false),
        }
    }

    pub(super) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl RulesetSource for ToggleRuleset {
    async fn fetch(&self) -> Result<Ruleset, FetchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable("ruleset host offline".to_string()));
        }
        Ok(self.ruleset.clone())
    }
}

pub(super) fn build_service<R: RulesetSource + 'static>(
    items: MemoryItems,
    source: R,
) -> ScreeningService<MemoryItems, R> {
    ScreeningService::new(Arc::new(items), Arc::new(RulesetStore::new(source)))
}

pub(super) fn wardrobe() -> MemoryItems {
    MemoryItems::default()
        .with_subject(
            1,
            vec![item(10, "Shotgun"), item(11, "Top Hat"), item(12, "Cute Bunny Ears")],
        )
        .with_subject(2, vec![item(20, "Bunny Slippers")])
        .with_subject(3, Vec::new())
        .with_unavailable(4)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

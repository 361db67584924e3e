use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};
use wearguard::config::{ItemLocation, RulesetLocation, ScreeningConfig};
use wearguard::error::AppError;
use wearguard::screening::{
    CsvItemSource, FetchError, FileRulesetSource, HttpItemSource, HttpRulesetSource, Item,
    ItemSource, ItemSourceError, Ruleset, RulesetSource, SubjectId,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Ruleset source selected from `RULESET_URL` / `RULESET_PATH`.
pub(crate) enum ConfiguredRulesetSource {
    Http(HttpRulesetSource),
    File(FileRulesetSource),
}

impl ConfiguredRulesetSource {
    pub(crate) fn from_config(config: &ScreeningConfig) -> Result<Self, AppError> {
        let source = match config.ruleset_location()? {
            RulesetLocation::Url(url) => {
                info!(%url, "using remote ruleset");
                Self::Http(HttpRulesetSource::new(url.clone(), config.http_timeout)?)
            }
            RulesetLocation::Path(path) => {
                info!(path = %path.display(), "using ruleset file");
                Self::File(FileRulesetSource::new(path.clone()))
            }
        };
        Ok(source)
    }
}

impl RulesetSource for ConfiguredRulesetSource {
    async fn fetch(&self) -> Result<Ruleset, FetchError> {
        match self {
            Self::Http(source) => source.fetch().await,
            Self::File(source) => source.fetch().await,
        }
    }
}

/// Item source selected from `CATALOG_BASE_URL` / `ITEMS_CSV`.
pub(crate) enum ConfiguredItemSource {
    Catalog(HttpItemSource),
    Csv(CsvItemSource),
}

impl ConfiguredItemSource {
    pub(crate) fn from_config(config: &ScreeningConfig) -> Result<Self, AppError> {
        let source = match &config.items {
            Some(ItemLocation::Catalog(url)) => {
                info!(%url, "using catalog item source");
                Self::Catalog(
                    HttpItemSource::new(url.clone(), config.http_timeout)?
                        .with_concurrency(config.concurrency),
                )
            }
            Some(ItemLocation::Csv(path)) => {
                let source = CsvItemSource::from_path(path)?;
                info!(
                    path = %path.display(),
                    subjects = source.subjects().len(),
                    "loaded item export"
                );
                Self::Csv(source)
            }
            None => {
                warn!("no item source configured; every subject will report no items");
                Self::Csv(CsvItemSource::default())
            }
        };
        Ok(source)
    }
}

impl ItemSource for ConfiguredItemSource {
    async fn items_for(&self, subject: SubjectId) -> Result<Vec<Item>, ItemSourceError> {
        match self {
            Self::Catalog(source) => source.items_for(subject).await,
            Self::Csv(source) => source.items_for(subject).await,
        }
    }
}

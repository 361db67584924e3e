use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{
    FetchError, ItemLookupError, ItemSource, ItemSourceError, RulesetSource, SourceSetupError,
};
use crate::screening::domain::{Item, ItemId, SubjectId};
use crate::screening::ruleset::Ruleset;
use crate::screening::service::DEFAULT_CONCURRENCY;

const USER_AGENT: &str = concat!("wearguard/", env!("CARGO_PKG_VERSION"));

fn build_client(timeout: Duration) -> Result<reqwest::Client, SourceSetupError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Retrieves the ruleset JSON document from a remote URL.
#[derive(Debug, Clone)]
pub struct HttpRulesetSource {
    client: reqwest::Client,
    url: String,
}

impl HttpRulesetSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceSetupError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }
}

impl RulesetSource for HttpRulesetSource {
    async fn fetch(&self) -> Result<Ruleset, FetchError> {
        debug!(url = %self.url, "requesting ruleset document");
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        let ruleset: Ruleset = serde_json::from_slice(&body)?;
        info!(
            url = %self.url,
            whitelist = ruleset.whitelist.len(),
            blacklist = ruleset.blacklist.len(),
            "ruleset document retrieved"
        );
        Ok(ruleset)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WornItems {
    #[serde(default)]
    asset_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct AssetDetails {
    #[serde(alias = "Name")]
    name: String,
}

/// Resolves worn items through an avatar/catalog HTTP API.
///
/// `GET {base}/users/{subject}/currently-wearing` yields `{"assetIds": [..]}`;
/// each asset name is then read from `GET {base}/assets/{id}`.
#[derive(Debug, Clone)]
pub struct HttpItemSource {
    client: reqwest::Client,
    base_url: String,
    concurrency: usize,
}

impl HttpItemSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceSetupError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Caps the asset lookups issued at once for one subject.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    async fn lookup(&self, item: ItemId) -> Result<Item, ItemLookupError> {
        let url = format!("{}/assets/{}", self.base_url, item);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ItemLookupError::Http { item, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ItemLookupError::Status { item, status });
        }

        let details: AssetDetails = response
            .json()
            .await
            .map_err(|source| ItemLookupError::Http { item, source })?;

        Ok(Item {
            id: item,
            name: details.name,
        })
    }
}

impl ItemSource for HttpItemSource {
    async fn items_for(&self, subject: SubjectId) -> Result<Vec<Item>, ItemSourceError> {
        let url = format!("{}/users/{}/currently-wearing", self.base_url, subject);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ItemSourceError::Status(status));
        }

        let worn: WornItems = response.json().await?;
        let lookups: Vec<Result<Item, ItemLookupError>> = stream::iter(worn.asset_ids)
            .map(|asset| self.lookup(ItemId(asset)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let items: Vec<Item> = lookups
            .into_iter()
            .filter_map(|lookup| match lookup {
                Ok(item) => Some(item),
                Err(error) => {
                    warn!(%subject, %error, "dropping item whose lookup failed");
                    None
                }
            })
            .collect();

        debug!(%subject, items = items.len(), "resolved worn items");
        Ok(items)
    }
}

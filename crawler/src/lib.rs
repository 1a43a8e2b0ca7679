//! HTTP client for the comics catalog.
//!
//! The catalog serves the latest comic at `{base}/info.0.json` and comic `n`
//! at `{base}/{n}/info.0.json`.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use search_core::ports::Source;
use search_core::{DocId, Error, RawDocument, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct ComicInfo {
    num: DocId,
    #[serde(default)]
    img: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    safe_title: String,
    #[serde(default)]
    alt: String,
    #[serde(default)]
    transcript: String,
}

impl From<ComicInfo> for RawDocument {
    fn from(info: ComicInfo) -> Self {
        RawDocument {
            id: info.num,
            url: info.img,
            title: info.title,
            description: format!("{} {} {}", info.transcript, info.alt, info.safe_title),
        }
    }
}

#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base: Url,
}

impl CatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url).with_context(|| format!("invalid catalog url {base_url:?}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(concat!("comics-search/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    async fn get_info(&self, path: &str) -> Result<Option<ComicInfo>> {
        let url = self.base.join(path).with_context(|| format!("invalid catalog path {path}"))?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to request {url}"))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let info = resp.json().await.with_context(|| format!("failed to decode {url}"))?;
                Ok(Some(info))
            }
            status => Err(anyhow!("unexpected status {status} from {url}").into()),
        }
    }
}

#[async_trait]
impl Source for CatalogClient {
    async fn fetch(&self, id: DocId) -> Result<RawDocument> {
        let info = self.get_info(&format!("{id}/info.0.json")).await?.ok_or(Error::NotFound(id))?;
        tracing::debug!(id, title = %info.title, "got comic");
        Ok(info.into())
    }

    async fn frontier(&self) -> Result<DocId> {
        let info = self
            .get_info("info.0.json")
            .await?
            .ok_or_else(|| anyhow!("catalog has no latest comic"))?;
        tracing::debug!(num = info.num, "latest comic");
        Ok(info.num)
    }
}

use std::time::Duration;

use irradiance_client::{
    alignment::GRID_PERIOD,
    domain::{Quantity, Site, SitesResponse},
};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::{
    config::ApiConfig,
    pipeline::{PipelineError, SiteSource},
};

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("invalid url '{url}': {reason}")]
    Url { url: String, reason: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{what} request failed | response status code: {status}")]
    Status { what: String, status: StatusCode },
    #[error("response has no '{0}' array")]
    MissingQuantity(Quantity),
}

impl From<SourceError> for PipelineError {
    fn from(e: SourceError) -> Self {
        PipelineError::Source(e.to_string())
    }
}

/// Client for the utility-scale sites endpoints, authenticated by an API key
/// in the query string.
pub struct SolcastHttpSource {
    client: Client,
    base_url: String,
    api_key: String,
    site_tag: String,
}

impl SolcastHttpSource {
    pub fn new(cfg: &ApiConfig, api_key: &str, site_tag: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            site_tag: site_tag.to_string(),
        })
    }

    pub fn sites_url(&self) -> Result<Url, SourceError> {
        endpoint(
            &format!("{}/utility_scale_sites/search", self.base_url),
            &[
                ("tags", self.site_tag.as_str()),
                ("format", "json"),
                ("api_key", self.api_key.as_str()),
            ],
        )
    }

    pub fn weather_url(&self, resource_id: &str, quantity: Quantity) -> Result<Url, SourceError> {
        endpoint(
            &format!(
                "{}/utility_scale_sites/{resource_id}/weather/{quantity}",
                self.base_url
            ),
            &[
                ("period", GRID_PERIOD),
                ("format", "json"),
                ("api_key", self.api_key.as_str()),
            ],
        )
    }

    async fn get_json(&self, url: Url, what: &str) -> Result<Value, SourceError> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(what, body = %body, "response text");
            return Err(SourceError::Status {
                what: what.to_string(),
                status,
            });
        }

        Ok(resp.json::<Value>().await?)
    }

    pub async fn fetch_sites(&self) -> Result<Vec<Site>, SourceError> {
        tracing::debug!(tag = %self.site_tag, "retrieving all sites");
        let body = self.get_json(self.sites_url()?, "sites").await?;
        sites_from_body(body)
    }

    pub async fn fetch_steps(&self, resource_id: &str, quantity: Quantity) -> Result<Vec<Value>, SourceError> {
        tracing::debug!(resource_id, %quantity, "retrieving weather data");
        let body = self
            .get_json(self.weather_url(resource_id, quantity)?, quantity.as_str())
            .await?;
        steps_from_body(body, quantity)
    }
}

fn endpoint(url: &str, params: &[(&str, &str)]) -> Result<Url, SourceError> {
    Url::parse_with_params(url, params).map_err(|e| SourceError::Url {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn sites_from_body(body: Value) -> Result<Vec<Site>, SourceError> {
    let parsed: SitesResponse = serde_json::from_value(body)?;
    Ok(parsed.sites)
}

/// Pull the step array out of `{ "<quantity>": [ ... ] }`.
fn steps_from_body(mut body: Value, quantity: Quantity) -> Result<Vec<Value>, SourceError> {
    match body.get_mut(quantity.as_str()).map(Value::take) {
        Some(Value::Array(steps)) => Ok(steps),
        _ => Err(SourceError::MissingQuantity(quantity)),
    }
}

#[async_trait::async_trait]
impl SiteSource for SolcastHttpSource {
    async fn sites(&self) -> Result<Vec<Site>, PipelineError> {
        Ok(self.fetch_sites().await?)
    }

    async fn steps(&self, site: &Site, quantity: Quantity) -> Result<Vec<Value>, PipelineError> {
        Ok(self.fetch_steps(&site.resource_id, quantity).await?)
    }
}

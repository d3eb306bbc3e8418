//! Figure image download from the layout-analysis service.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{LayoutError, LayoutSettings, Result};
use crate::config::DocumentIntelligenceConfig;

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Anything that can produce the rendered image of a figure by id.
pub trait FigureSource {
    fn fetch_figure(&self, figure_id: &str) -> Result<Vec<u8>>;
}

/// Blocking client for the figure endpoint of one analysis result.
pub struct DocumentIntelligenceClient {
    client: Client,
    endpoint: Url,
    key: String,
    result_id: String,
    model_id: String,
    api_version: String,
    retries: u32,
}

impl DocumentIntelligenceClient {
    pub fn new(
        config: &DocumentIntelligenceConfig,
        result_id: impl Into<String>,
        settings: &LayoutSettings,
    ) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|source| {
            LayoutError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                source,
            }
        })?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.fetch_timeout_secs));
        if config.no_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            client: builder.build()?,
            endpoint,
            key: config.key.clone(),
            result_id: result_id.into(),
            model_id: settings.model_id.clone(),
            api_version: settings.api_version.clone(),
            retries: settings.fetch_retries.max(1),
        })
    }

    /// Full URL of one figure image.
    #[must_use]
    pub fn figure_url(&self, figure_id: &str) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}/analyzeResults/{}/figures/{}?api-version={}",
            self.endpoint.as_str().trim_end_matches('/'),
            self.model_id,
            self.result_id,
            figure_id,
            self.api_version
        )
    }
}

impl FigureSource for DocumentIntelligenceClient {
    #[instrument(skip(self))]
    fn fetch_figure(&self, figure_id: &str) -> Result<Vec<u8>> {
        let url = self.figure_url(figure_id);
        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.client.get(&url).header(KEY_HEADER, &self.key).send() {
                Ok(response) => break response,
                Err(e) if attempt < self.retries => {
                    warn!(attempt, error = %e, "figure request failed, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LayoutError::FigureStatus {
                id: figure_id.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes()?;
        debug!(bytes = bytes.len(), "figure downloaded");
        Ok(bytes.to_vec())
    }
}

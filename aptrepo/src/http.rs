// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! HTTP document fetching.

[HttpFetcher] implements [DocumentFetcher] on top of a [reqwest] client.

Requests that never produce an HTTP response (connection refused, DNS failure,
and so on) are retried. Responses with a non-200 status are not retried and
result in an error.
*/

use {
    crate::{
        download::{DocumentFetcher, Download},
        error::{AptRepoError, Result},
    },
    async_trait::async_trait,
    log::{debug, error, info, warn},
    reqwest::{header, Client, ClientBuilder, Response, StatusCode, Url},
    serde::Deserialize,
    std::time::Duration,
};

/// Default HTTP user agent string.
pub const USER_AGENT: &str = concat!("aptrepo/", env!("CARGO_PKG_VERSION"));

/// Configuration for [HttpFetcher].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Number of additional attempts for requests failing at the transport level.
    pub retries: u32,

    /// User agent to send.
    pub user_agent: String,

    /// Timeout for a whole request, in seconds.
    pub timeout_seconds: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            user_agent: USER_AGENT.to_string(),
            timeout_seconds: None,
        }
    }
}

/// Fetches documents over HTTP.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    config: ClientConfig,
}

impl HttpFetcher {
    /// Construct an instance with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Construct an instance from a [ClientConfig].
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new().user_agent(&config.user_agent);

        if let Some(timeout) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        Ok(Self::new_client(builder.build()?, config))
    }

    /// Construct an instance using the given [Client].
    ///
    /// The user agent and timeout of `config` are ignored; they are properties of the client.
    pub fn new_client(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    async fn read_download(url: &str, res: Response) -> Result<Download> {
        debug!("response status code for {}: {}", url, res.status());

        if res.status() != StatusCode::OK {
            error!("failed to download {}: status code {}", url, res.status());

            return Err(AptRepoError::HttpStatus {
                url: url.to_string(),
                status: res.status().as_u16(),
            });
        }

        let etag = res
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let content = res.text().await?;

        Ok(Download::new(url, etag, content))
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Download> {
        let request_url = Url::parse(url)?;
        let attempts = self.config.retries + 1;

        info!("downloading {}", url);

        let mut reason = String::new();

        for attempt in 1..=attempts {
            match self.client.get(request_url.clone()).send().await {
                Ok(res) => {
                    return Self::read_download(url, res).await;
                }
                Err(e) => {
                    warn!(
                        "attempt {} of {} to download {} failed: {}",
                        attempt, attempts, url, e
                    );
                    reason = e.to_string();
                }
            }
        }

        error!("giving up downloading {}", url);

        Err(AptRepoError::DownloadFailed {
            url: url.to_string(),
            reason,
        })
    }

    async fn needs_update(&self, url: &str, etag: &str) -> Result<bool> {
        let request_url = Url::parse(url)?;

        let res = self
            .client
            .head(request_url)
            .header(header::IF_NONE_MATCH, etag)
            .send()
            .await;

        match res.map(|res| res.status()) {
            Ok(StatusCode::NOT_MODIFIED) => {
                info!("no update needed for {}", url);
                Ok(false)
            }
            Ok(StatusCode::OK) => {
                info!("update available for {}", url);
                Ok(true)
            }
            Ok(status) => {
                error!("failed to check {} for updates: status code {}", url, status);
                Ok(true)
            }
            Err(e) => {
                error!("failed to check {} for updates: {}", url, e);
                Ok(true)
            }
        }
    }
}

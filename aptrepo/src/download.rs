// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Fetching `[In]Release` documents.

The parser works on text that is already in memory. [DocumentFetcher] is the
interface to whatever retrieves that text. [crate::http::HttpFetcher] is the
implementation used by default.
*/

use {crate::error::Result, async_trait::async_trait};

/// A fetched document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Download {
    url: String,
    etag: String,
    content: String,
}

impl Download {
    pub fn new(url: impl ToString, etag: impl ToString, content: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            etag: etag.to_string(),
            content: content.to_string(),
        }
    }

    /// URL the document was fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Entity tag sent by the server. Empty if there was none.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Text of the document.
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Retrieves documents and checks them for staleness.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the document at `url`.
    ///
    /// An error is returned unless the full document was obtained.
    async fn fetch(&self, url: &str) -> Result<Download>;

    /// Whether the document at `url` differs from the version with entity tag `etag`.
    ///
    /// Implementations should answer `true` when in doubt.
    async fn needs_update(&self, url: &str, etag: &str) -> Result<bool>;
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! APT repository `[In]Release` file parsing.

This crate reads the top-level metadata document of an APT repository, the
`Release` file (or `InRelease` when it is wrapped in a PGP cleartext
signature), into a queryable model. It does not verify signatures and does
not read the index files (`Packages`, `Sources`, `Contents`) the document
lists.

# A Tour of Functionality

[release::Release] is the parsed document. It has accessors for well-known
fields like [release::Release::suite] and [release::Release::date], the list of
architectures and components the repository advertises, and the references to
index files listed in its checksum sections.

[reference::Reference] describes one of those index files: its path, size and
the hashes listed for it, keyed by section name (`MD5Sum`, `SHA1`, `SHA256`).
Architecture and component are inferred from the path, which allows
filtering with [release::Release::references_for] and friends. The
[digest] module offers a typed view over the hashes.

[parser::ReleaseParser] does the parsing. It is tolerant: malformed lines are
skipped rather than failing the parse. Dates are interpreted in a configurable
UTC offset ([parser::ParserConfig]) instead of the host timezone.

Fetching is abstracted by [download::DocumentFetcher].
[http::HttpFetcher] implements it over HTTP, including conditional checks
for updated documents using entity tags.

[parse_release] ties it all together:

```no_run
# async fn run() -> aptrepo::error::Result<()> {
let release = aptrepo::parse_release("http://archive.ubuntu.com/ubuntu/dists/noble/InRelease").await?;

for reference in release.references_for("amd64", "main") {
    println!("{}", reference);
}
# Ok(())
# }
```

# Crate Features

The optional and enabled-by-default `http` feature enables [http::HttpFetcher].
*/

pub mod digest;
pub mod download;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod parser;
pub mod reference;
pub mod release;

use {
    crate::{
        download::DocumentFetcher, error::Result, parser::ReleaseParser, release::Release,
    },
    log::info,
};

/// Fetch and parse the `[In]Release` file at `url`.
///
/// Uses an [http::HttpFetcher] and parser with default configuration.
#[cfg(feature = "http")]
pub async fn parse_release(url: &str) -> Result<Release> {
    let fetcher = http::HttpFetcher::new()?;

    parse_release_with(&fetcher, &ReleaseParser::default(), url).await
}

/// Fetch the `[In]Release` file at `url` with `fetcher` and parse it with `parser`.
///
/// Fetch errors are returned as-is. Parsing itself can't fail.
pub async fn parse_release_with(
    fetcher: &dyn DocumentFetcher,
    parser: &ReleaseParser,
    url: &str,
) -> Result<Release> {
    info!("parsing release from {}", url);

    let download = fetcher.fetch(url).await?;

    Ok(parser.parse(download.url(), download.etag(), download.content()))
}

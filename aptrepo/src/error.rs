// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
///
/// Parsing a `[In]Release` document never produces an error. Variants here come
/// from fetching documents and from working with the digests of parsed references.
#[derive(Debug, Error)]
pub enum AptRepoError {
    #[error("URL error: {0:?}")]
    Url(#[from] url::ParseError),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("bad HTTP status code for {url}: {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("unknown checksum type: {0}")]
    UnknownChecksumType(String),

    #[error("bad hex digest {0}: {1:?}")]
    ContentDigestBadHex(String, hex::FromHexError),

    #[error("size mismatch for {path}: expected {expected} bytes; got {actual}")]
    ReferenceSizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("digest mismatch for {path}: expected {expected}; got {actual}")]
    ReferenceDigestMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("reference {0} does not contain a supported checksum flavor")]
    ReferenceNoKnownDigest(String),
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, AptRepoError>;

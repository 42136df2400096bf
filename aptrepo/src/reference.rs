// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Index file references.

Every line in a `MD5Sum`, `SHA1`, or `SHA256` section of a `Release` file
describes a file in the repository: `<digest> <size> <path>`. A [Reference]
collects all lines describing the same path, so it carries one hash per
section the path appeared in.

The architecture and component of a reference are guessed from its path when
the reference is created. The guess is driven by [INFERENCE_RULES], an ordered
rule list where the first rule whose predicate accepts the path decides the
architecture.
*/

use {
    crate::{
        digest::{ChecksumType, ContentDigest},
        error::{AptRepoError, Result},
    },
    std::{
        collections::BTreeMap,
        fmt::{Display, Formatter},
        str::FromStr,
    },
};

/// A rule deriving an architecture from a path.
#[derive(Clone, Copy)]
pub struct InferenceRule {
    /// Short name of this rule.
    pub name: &'static str,

    /// Whether this rule is responsible for the given path.
    pub predicate: fn(&str) -> bool,

    /// Extract the architecture from a path accepted by `predicate`.
    pub extract: fn(&str) -> Option<&str>,
}

impl std::fmt::Debug for InferenceRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceRule")
            .field("name", &self.name)
            .finish()
    }
}

/// Rules for inferring the architecture of a referenced path, in priority order.
pub static INFERENCE_RULES: &[InferenceRule] = &[
    InferenceRule {
        name: "contents",
        predicate: is_contents_path,
        extract: contents_architecture,
    },
    InferenceRule {
        name: "source-folder",
        predicate: is_source_folder,
        extract: source_folder_architecture,
    },
    InferenceRule {
        name: "binary-folder",
        predicate: is_binary_folder,
        extract: binary_folder_architecture,
    },
];

fn is_contents_path(path: &str) -> bool {
    path.starts_with("Contents")
}

/// `Contents-<arch>[.<ext>]`.
fn contents_architecture(path: &str) -> Option<&str> {
    let (_, suffix) = path.split_once('-')?;

    Some(match suffix.split_once('.') {
        Some((architecture, _)) => architecture,
        None => suffix,
    })
}

/// The directory name following the first `/` of a path.
///
/// A path without a second `/` yields everything after the first one.
fn second_level_folder(path: &str) -> Option<&str> {
    let (_, remainder) = path.split_once('/')?;

    Some(match remainder.split_once('/') {
        Some((folder, _)) => folder,
        None => remainder,
    })
}

fn is_source_folder(path: &str) -> bool {
    second_level_folder(path) == Some("source")
}

fn source_folder_architecture(_: &str) -> Option<&str> {
    Some("source")
}

fn is_binary_folder(path: &str) -> bool {
    binary_folder_architecture(path).is_some()
}

/// `<component>/binary-<arch>/...`.
fn binary_folder_architecture(path: &str) -> Option<&str> {
    match second_level_folder(path)?.split_once('-')? {
        ("binary", architecture) => Some(architecture),
        _ => None,
    }
}

/// Infer the architecture of a referenced path.
///
/// Returns an empty string if no rule accepts the path or the accepting rule
/// cannot extract a value.
pub fn infer_architecture(path: &str) -> &str {
    INFERENCE_RULES
        .iter()
        .find(|rule| (rule.predicate)(path))
        .and_then(|rule| (rule.extract)(path))
        .unwrap_or_default()
}

/// Infer the component of a referenced path.
///
/// This is the first path segment, or an empty string for top-level files.
pub fn infer_component(path: &str) -> &str {
    path.split_once('/')
        .map(|(component, _)| component)
        .unwrap_or_default()
}

/// A file listed in a `Release` file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reference {
    base_url: String,
    path: String,
    size_bytes: u64,
    architecture: String,
    component: String,
    /// Hex digests keyed by the section name they were listed under.
    hashes: BTreeMap<String, String>,
}

impl Reference {
    /// Construct a reference to `path` relative to `base_url`.
    ///
    /// Architecture and component are inferred from `path` here and never change.
    pub fn new(base_url: impl ToString, path: impl ToString, size_bytes: u64) -> Self {
        let path = path.to_string();
        let architecture = infer_architecture(&path).to_string();
        let component = infer_component(&path).to_string();

        Self {
            base_url: base_url.to_string(),
            path,
            size_bytes,
            architecture,
            component,
            hashes: BTreeMap::new(),
        }
    }

    /// Record a hash for this file.
    ///
    /// A hash previously recorded for the same algorithm is replaced.
    pub fn add_hash(&mut self, algorithm: impl ToString, hash: impl ToString) {
        self.hashes.insert(algorithm.to_string(), hash.to_string());
    }

    /// URL of the repository root this reference is relative to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Path of this file relative to [Self::base_url].
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full URL of this file.
    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.path)
    }

    /// Size of the file in bytes, as listed at its first appearance.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Inferred architecture. May be empty.
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Inferred component. May be empty.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// All hashes, keyed by algorithm name.
    pub fn hashes(&self) -> &BTreeMap<String, String> {
        &self.hashes
    }

    /// Obtain the hash recorded under an exact algorithm name.
    pub fn hash(&self, algorithm: &str) -> Option<&str> {
        self.hashes.get(algorithm).map(|x| x.as_str())
    }

    fn hash_for_checksum(&self, checksum: ChecksumType) -> Option<&str> {
        self.hashes
            .iter()
            .find(|(algorithm, _)| ChecksumType::from_str(algorithm).ok() == Some(checksum))
            .map(|(_, hash)| hash.as_str())
    }

    /// Obtain the typed digest for a checksum flavor.
    ///
    /// [None] if no hash of this flavor was listed. [Err] if the listed value isn't hex.
    pub fn digest(&self, checksum: ChecksumType) -> Option<Result<ContentDigest>> {
        self.hash_for_checksum(checksum)
            .map(|hash| ContentDigest::from_hex_digest(checksum, hash))
    }

    /// Obtain the strongest available digest.
    pub fn preferred_digest(&self) -> Option<Result<ContentDigest>> {
        ChecksumType::preferred_order().find_map(|checksum| self.digest(checksum))
    }

    /// Obtain the `by-hash` path variant for this reference.
    ///
    /// [None] if this reference has no hash of the requested flavor.
    pub fn by_hash_path(&self, checksum: ChecksumType) -> Option<String> {
        let hash = self.hash_for_checksum(checksum)?;

        Some(if let Some((prefix, _)) = self.path.rsplit_once('/') {
            format!("{}/by-hash/{}/{}", prefix, checksum.field_name(), hash)
        } else {
            format!("by-hash/{}/{}", checksum.field_name(), hash)
        })
    }

    /// Verify that `data` is the content this reference describes.
    ///
    /// The size is checked first, then the strongest available digest.
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        if data.len() as u64 != self.size_bytes {
            return Err(AptRepoError::ReferenceSizeMismatch {
                path: self.path.clone(),
                expected: self.size_bytes,
                actual: data.len() as u64,
            });
        }

        let expected = self
            .preferred_digest()
            .ok_or_else(|| AptRepoError::ReferenceNoKnownDigest(self.path.clone()))??;

        let actual = expected.checksum_type().digest_data(data);

        if actual != expected {
            return Err(AptRepoError::ReferenceDigestMismatch {
                path: self.path.clone(),
                expected: expected.digest_hex(),
                actual: actual.digest_hex(),
            });
        }

        Ok(())
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let hashes = self
            .hashes
            .iter()
            .map(|(algorithm, hash)| format!("{}={}", algorithm, hash))
            .collect::<Vec<_>>()
            .join(", ");

        write!(
            f,
            "Reference<{}/{} {} {}>",
            self.base_url, self.path, self.size_bytes, hashes
        )
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `Release` file primitives.

`Release` files (or `InRelease` if it contains a PGP cleartext signature) are
the main definition of a Debian repository. They consist of repository-level
metadata fields plus sections listing the *indices* files of the repository
together with their sizes and content digests.

[Release] represents a parsed `Release` or `InRelease` file. It exposes
accessor functions for obtaining well-known metadata fields and functions for
filtering the [Reference]s to index files by architecture and component.

Instances are produced by [crate::parser::ReleaseParser].
*/

use {
    crate::{
        download::Download,
        parser::{ParserConfig, ReleaseParser},
        reference::Reference,
    },
    chrono::{DateTime, Utc},
    log::{debug, warn},
    std::{
        collections::BTreeMap,
        fmt::{Display, Formatter},
    },
};

/// A parsed `[In]Release` file.
///
/// Fields and references are fixed once parsing completes. Only the
/// [flat](Self::set_flat) marker may be changed afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Release {
    pub(crate) url: String,
    pub(crate) etag: String,
    pub(crate) base_url: String,
    pub(crate) flat: bool,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) architectures: Vec<String>,
    pub(crate) components: Vec<String>,
    pub(crate) date: Option<DateTime<Utc>>,
    pub(crate) valid_until: Option<DateTime<Utc>>,
    pub(crate) references: BTreeMap<String, Reference>,
}

impl Release {
    /// Construct an empty instance for a document fetched from `url`.
    pub(crate) fn new(url: impl ToString, etag: impl ToString) -> Self {
        let url = url.to_string();
        let base_url = match url.rfind('/') {
            Some(pos) => url[..pos].to_string(),
            None => url.clone(),
        };

        Self {
            url,
            etag: etag.to_string(),
            base_url,
            flat: false,
            fields: BTreeMap::new(),
            architectures: vec![],
            components: vec![],
            date: None,
            valid_until: None,
            references: BTreeMap::new(),
        }
    }

    /// Parse the content of a [Download].
    pub fn from_download(download: &Download, config: &ParserConfig) -> Self {
        ReleaseParser::new(config.clone()).parse(
            download.url(),
            download.etag(),
            download.content(),
        )
    }

    pub(crate) fn add_field(&mut self, key: &str, value: &str) {
        debug!("adding field to release: {}: {}", key, value);
        self.fields.insert(key.to_string(), value.to_string());
    }

    /// Register a hash for a referenced path.
    ///
    /// The first appearance of a path defines its size.
    pub(crate) fn add_reference(&mut self, path: &str, size: u64, algorithm: &str, hash: &str) {
        if let Some(reference) = self.references.get_mut(path) {
            if reference.size_bytes() != size {
                warn!(
                    "inconsistent size for {} in {} section: {} != {}",
                    path,
                    algorithm,
                    size,
                    reference.size_bytes()
                );
            }

            debug!("adding {} hash to existing reference {}", algorithm, path);
            reference.add_hash(algorithm, hash);
        } else {
            debug!(
                "creating reference {} ({} bytes) with {} hash",
                path, size, algorithm
            );
            let mut reference = Reference::new(&self.base_url, path, size);
            reference.add_hash(algorithm, hash);
            self.references.insert(path.to_string(), reference);
        }
    }

    /// URL this document was fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Entity tag the server returned with this document. May be empty.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// [Self::url] without its final path segment.
    ///
    /// Paths of references are relative to this URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the repository uses the flat layout.
    pub fn is_flat(&self) -> bool {
        self.flat
    }

    /// Mark the repository as using the flat layout, without `dists/` hierarchy.
    pub fn set_flat(&mut self, flat: bool) {
        self.flat = flat;
    }

    /// All fields, keyed by their case-sensitive name.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Obtain the raw value of a field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|x| x.as_str())
    }

    fn field_or_empty(&self, name: &str) -> &str {
        self.field(name).unwrap_or_else(|| {
            warn!("{} field not present in {}", name, self.url);
            ""
        })
    }

    fn field_bool(&self, name: &str) -> Option<bool> {
        self.field(name).map(|v| matches!(v, "yes"))
    }

    /// Origin of the repository.
    pub fn origin(&self) -> &str {
        self.field_or_empty("Origin")
    }

    /// Label for the repository.
    pub fn label(&self) -> &str {
        self.field_or_empty("Label")
    }

    /// Suite of this repository.
    ///
    /// e.g. `stable`, `unstable`, `noble`.
    pub fn suite(&self) -> &str {
        self.field_or_empty("Suite")
    }

    /// Version of this repository.
    ///
    /// Typically a sequence of `.` delimited integers.
    pub fn version(&self) -> &str {
        self.field_or_empty("Version")
    }

    /// Codename of this repository.
    pub fn codename(&self) -> &str {
        self.field_or_empty("Codename")
    }

    /// Description of this repository.
    pub fn description(&self) -> &str {
        self.field_or_empty("Description")
    }

    /// Debian machine architectures supported by this repository.
    ///
    /// e.g. `amd64`, `arm64`. Empty if the `Architectures` field is missing.
    pub fn architectures(&self) -> &[String] {
        &self.architectures
    }

    /// Names of components within this repository.
    ///
    /// e.g. `main`, `universe`. Empty if the `Components` field is missing.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Time the release file was created.
    ///
    /// The Unix epoch is returned if the `Date` field is missing or couldn't be parsed.
    pub fn date(&self) -> DateTime<Utc> {
        self.date
            .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
    }

    /// Whether [Self::date] holds a value parsed from the `Date` field.
    pub fn has_date(&self) -> bool {
        self.date.is_some()
    }

    /// Time the release file should be considered expired by the client.
    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    /// Evaluated value for `NotAutomatic` field.
    ///
    /// `true` is returned iff the value is `yes`. `no` and other values result in `false`.
    pub fn not_automatic(&self) -> Option<bool> {
        self.field_bool("NotAutomatic")
    }

    /// Evaluated value for `ButAutomaticUpgrades` field.
    ///
    /// `true` is returned iff the value is `yes`. `no` and other values result in `false`.
    pub fn but_automatic_upgrades(&self) -> Option<bool> {
        self.field_bool("ButAutomaticUpgrades")
    }

    /// Whether to acquire files by hash.
    pub fn acquire_by_hash(&self) -> Option<bool> {
        self.field_bool("Acquire-By-Hash")
    }

    /// Obtain the reference for a path.
    pub fn reference(&self, path: &str) -> Option<&Reference> {
        self.references.get(path)
    }

    /// All references, ordered by path.
    pub fn references(&self) -> impl Iterator<Item = &Reference> + '_ {
        self.references.values()
    }

    /// References matching both an architecture and a component.
    ///
    /// Empty strings match references where nothing could be inferred.
    pub fn references_for<'a>(
        &'a self,
        architecture: &'a str,
        component: &'a str,
    ) -> impl Iterator<Item = &'a Reference> + 'a {
        self.references()
            .filter(move |r| r.architecture() == architecture && r.component() == component)
    }

    /// References belonging to a component.
    pub fn references_for_component<'a>(
        &'a self,
        component: &'a str,
    ) -> impl Iterator<Item = &'a Reference> + 'a {
        self.references().filter(move |r| r.component() == component)
    }

    /// References belonging to an architecture.
    pub fn references_for_architecture<'a>(
        &'a self,
        architecture: &'a str,
    ) -> impl Iterator<Item = &'a Reference> + 'a {
        self.references()
            .filter(move |r| r.architecture() == architecture)
    }
}

impl Display for Release {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Release<{}>", self.url)?;
        writeln!(f, "Etag: {}", self.etag)?;
        writeln!(f, "Base URL: {}", self.base_url)?;

        for (key, value) in &self.fields {
            writeln!(f, "{}: {}", key, value)?;
        }

        for reference in self.references.values() {
            writeln!(f, "{}", reference)?;
        }

        Ok(())
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `[In]Release` document parsing.

[ReleaseParser] turns the text of a `Release` or `InRelease` file into a
[Release]. Parsing is a single forward scan over the lines of the document.
Each line is classified by [classify_line] and then applied to the record
being built. The only state carried between lines is the name of the most
recently seen field, which labels the indented hash lines that follow it
(e.g. `MD5Sum:` followed by ` <md5> <size> <path>` lines).

Parsing never fails. Lines that can't be classified are skipped, so a document
with garbage in it still yields whatever fields and references it has. PGP
armor is tolerated: armor header lines are skipped and scanning stops at the
start of the signature block. Signatures are not verified.
*/

use {
    crate::release::Release,
    chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc},
    log::{info, trace, warn},
    once_cell::sync::Lazy,
    regex::Regex,
    serde::Deserialize,
};

/// Formatter string for dates in release files, minus the weekday and timezone tokens.
pub const DATE_FORMAT: &str = "%d %b %Y %H:%M:%S";

/// Regular expression matching a line in a checksum section.
pub static RE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        ^\s*
        # Hex digest.
        (?P<hash>\S+)
        \s+
        # File size in bytes.
        (?P<size>\d+)
        \s+
        # Path relative to the directory holding the Release file.
        (?P<path>\S+)
        .*$
        "#,
    )
    .expect("reference regex should compile")
});

/// Configuration for [ReleaseParser].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Offset from UTC, in seconds east, that date fields are expressed in.
    ///
    /// The timezone token at the end of date fields is ignored. Values are
    /// interpreted as local time at this offset and normalized to UTC.
    pub utc_offset_seconds: i32,
}

/// The meaning of a single line of a `[In]Release` document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Line<'a> {
    /// Empty line, comment, or PGP armor header. Nothing to do.
    Ignored,

    /// Start of the PGP signature block. Nothing after it is content.
    SignatureStart,

    /// `Key: value` line. `value` is trimmed and may be empty, as it is for
    /// headers of checksum sections.
    Field { key: &'a str, value: &'a str },

    /// `<hash> <size> <path>` line within a checksum section.
    Entry {
        hash: &'a str,
        size: u64,
        path: &'a str,
    },

    /// A line that couldn't be understood.
    Malformed,
}

/// Classify a line of a `[In]Release` document.
pub fn classify_line(line: &str) -> Line<'_> {
    if line.is_empty() || line.starts_with('#') {
        return Line::Ignored;
    }

    if line.contains("BEGIN PGP SIGNATURE") {
        return Line::SignatureStart;
    }

    // Armor lines like `-----BEGIN PGP SIGNED MESSAGE-----`.
    if line.starts_with("----") {
        return Line::Ignored;
    }

    if line.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return match line.split_once(':') {
            Some((key, value)) => Line::Field {
                key,
                value: value.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r')),
            },
            None => Line::Malformed,
        };
    }

    let caps = match RE_REFERENCE.captures(line) {
        Some(caps) => caps,
        None => return Line::Malformed,
    };

    match caps["size"].parse::<u64>() {
        Ok(size) => Line::Entry {
            hash: caps.name("hash").map(|m| m.as_str()).unwrap_or_default(),
            size,
            path: caps.name("path").map(|m| m.as_str()).unwrap_or_default(),
        },
        Err(_) => Line::Malformed,
    }
}

/// Parse a `Date`-like field value.
///
/// Values look like `Thu, 25 Apr 2024 15:10:33 UTC`. The weekday name is not
/// checked against the date. The trailing timezone token is not interpreted: the
/// value is taken as local time at `utc_offset_seconds`.
pub fn parse_date(value: &str, utc_offset_seconds: i32) -> Option<DateTime<Utc>> {
    let value = match value.trim().split_once(',') {
        Some((_, rest)) => rest.trim(),
        None => value.trim(),
    };

    let naive = NaiveDateTime::parse_from_str(value, DATE_FORMAT)
        .ok()
        .or_else(|| {
            let (datetime, _) = value.rsplit_once(char::is_whitespace)?;
            NaiveDateTime::parse_from_str(datetime.trim_end(), DATE_FORMAT).ok()
        })?;

    FixedOffset::east_opt(utc_offset_seconds)?
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Split a field value into words separated by single spaces.
fn field_words(value: &str) -> Vec<String> {
    value
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(|word| word.to_string())
        .collect()
}

/// Parser state for one document.
struct ParseState {
    release: Release,
    /// Name of the most recently seen field.
    section: String,
}

impl ParseState {
    /// Apply a line. Returns false once scanning should stop.
    fn apply(&mut self, line: &str) -> bool {
        match classify_line(line) {
            Line::Ignored => {}
            Line::SignatureStart => {
                return false;
            }
            Line::Field { key, value } => {
                self.section = key.to_string();

                if !key.is_empty() && !value.is_empty() {
                    self.release.add_field(key, value);
                }
            }
            Line::Entry { hash, size, path } => {
                self.release.add_reference(path, size, &self.section, hash);
            }
            Line::Malformed => {
                trace!("skipping unrecognized line: {}", line);
            }
        }

        true
    }
}

/// Parser for `[In]Release` documents.
#[derive(Clone, Debug, Default)]
pub struct ReleaseParser {
    config: ParserConfig,
}

impl ReleaseParser {
    /// Construct a parser with the given configuration.
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a document fetched from `url`.
    pub fn parse(&self, url: &str, etag: &str, content: &str) -> Release {
        info!("parsing release {}", url);

        let mut state = ParseState {
            release: Release::new(url, etag),
            section: String::new(),
        };

        for line in content.lines() {
            if !state.apply(line) {
                break;
            }
        }

        let mut release = state.release;
        self.finalize(&mut release);

        release
    }

    /// Derive typed values from parsed fields.
    fn finalize(&self, release: &mut Release) {
        release.architectures = self.words_field(release, "Architectures");
        release.components = self.words_field(release, "Components");
        release.date = self.date_field(release, "Date");
        release.valid_until = release
            .field("Valid-Until")
            .and_then(|value| parse_date(value, self.config.utc_offset_seconds));
    }

    fn words_field(&self, release: &Release, name: &str) -> Vec<String> {
        match release.field(name) {
            Some(value) => field_words(value),
            None => {
                warn!("{} field not present in {}", name, release.url());
                vec![]
            }
        }
    }

    fn date_field(&self, release: &Release, name: &str) -> Option<DateTime<Utc>> {
        let value = match release.field(name) {
            Some(value) => value,
            None => {
                warn!("{} field not present in {}", name, release.url());
                return None;
            }
        };

        let date = parse_date(value, self.config.utc_offset_seconds);
        if date.is_none() {
            warn!("unable to parse {} field value: {}", name, value);
        }

        date
    }
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    const NOBLE_URL: &str = "http://archive.ubuntu.com/ubuntu/dists/noble/InRelease";

    fn parse(content: &str) -> Release {
        ReleaseParser::default().parse(NOBLE_URL, "3e76a-616ed332a1b79", content)
    }

    #[test]
    fn classify() {
        assert_eq!(classify_line(""), Line::Ignored);
        assert_eq!(classify_line("# comment"), Line::Ignored);
        assert_eq!(
            classify_line("-----BEGIN PGP SIGNED MESSAGE-----"),
            Line::Ignored
        );
        assert_eq!(
            classify_line("-----BEGIN PGP SIGNATURE-----"),
            Line::SignatureStart
        );
        assert_eq!(
            classify_line("Origin:  Ubuntu \t"),
            Line::Field {
                key: "Origin",
                value: "Ubuntu"
            }
        );
        assert_eq!(
            classify_line("MD5Sum:"),
            Line::Field {
                key: "MD5Sum",
                value: ""
            }
        );
        assert_eq!(
            classify_line("Valid-Until: Thu, 02 May 2024 15:10:33 UTC"),
            Line::Field {
                key: "Valid-Until",
                value: "Thu, 02 May 2024 15:10:33 UTC"
            }
        );
        assert_eq!(classify_line("NoColonHere"), Line::Malformed);
        assert_eq!(
            classify_line(" 2fc7d01e0a1c7b351738abcd571eec59         51301092 Contents-amd64.gz"),
            Line::Entry {
                hash: "2fc7d01e0a1c7b351738abcd571eec59",
                size: 51301092,
                path: "Contents-amd64.gz"
            }
        );
        assert_eq!(
            classify_line("\tabc 12 main/source/Sources trailing"),
            Line::Entry {
                hash: "abc",
                size: 12,
                path: "main/source/Sources"
            }
        );
        assert_eq!(
            classify_line("0123 12 Contents-all"),
            Line::Entry {
                hash: "0123",
                size: 12,
                path: "Contents-all"
            }
        );
        assert_eq!(classify_line(" abc notasize path"), Line::Malformed);
        assert_eq!(classify_line(" abc 12"), Line::Malformed);
        assert_eq!(
            classify_line(" abc 99999999999999999999999 path"),
            Line::Malformed
        );
    }

    #[test]
    fn parse_fixture() {
        let release = parse(include_str!("testdata/inrelease-ubuntu-noble"));

        assert_eq!(release.url(), NOBLE_URL);
        assert_eq!(release.etag(), "3e76a-616ed332a1b79");
        assert_eq!(release.base_url(), "http://archive.ubuntu.com/ubuntu/dists/noble");

        assert_eq!(release.origin(), "Ubuntu");
        assert_eq!(release.label(), "Ubuntu");
        assert_eq!(release.suite(), "noble");
        assert_eq!(release.version(), "24.04");
        assert_eq!(release.codename(), "noble");
        assert_eq!(release.description(), "Ubuntu Noble 24.04");
        assert_eq!(release.acquire_by_hash(), Some(true));
        assert_eq!(
            release.architectures(),
            ["amd64", "arm64", "armhf", "i386", "ppc64el", "riscv64", "s390x"]
        );
        assert_eq!(
            release.components(),
            ["main", "restricted", "universe", "multiverse"]
        );
        assert_eq!(release.date().timestamp(), 1714057833);
        assert!(release.has_date());

        // Headers of checksum sections are not fields.
        assert_eq!(release.field("MD5Sum"), None);
        assert_eq!(release.field("SHA256"), None);
        // The armor `Hash:` header is shaped like a field and is kept.
        assert_eq!(release.field("Hash"), Some("SHA512"));

        let rendered = release.to_string();
        assert!(rendered.contains(
            "Release<http://archive.ubuntu.com/ubuntu/dists/noble/InRelease>"
        ));
        assert!(rendered.contains("Date: Thu, 25 Apr 2024 15:10:33 UTC"));
        assert!(rendered.contains("Acquire-By-Hash: yes"));
        assert!(rendered.contains("Reference<http://archive.ubuntu.com/ubuntu/dists/noble/Contents-amd64 829119597 MD5Sum=1ae40621b32609d6251d09b2a47ef936, SHA1=daf36358068b71e8064ac4e1f9adb6ae765f72a6, SHA256=e945cdeadad8067c9b569e66c058f709d5aa4cd11d8099cc088dc192705e7bc7>"));
        assert!(!rendered.contains("iQIzBAEBCgAd"));
    }

    #[test]
    fn hash_accumulation() {
        let release = parse(include_str!("testdata/inrelease-ubuntu-noble"));

        let reference = release.reference("main/binary-amd64/Packages.gz").unwrap();
        assert_eq!(reference.size_bytes(), 1402155);
        assert_eq!(
            reference.hashes().keys().collect::<Vec<_>>(),
            vec!["MD5Sum", "SHA1", "SHA256"]
        );
        assert_eq!(reference.architecture(), "amd64");
        assert_eq!(reference.component(), "main");

        // Every reference appears in all three sections.
        assert!(release.references().all(|r| r.hashes().len() == 3));
    }

    #[test]
    fn first_size_wins() {
        let release = parse(indoc! {"
            MD5Sum:
             aaaa 10 main/binary-amd64/Packages
            SHA256:
             bbbb 11 main/binary-amd64/Packages
        "});

        let reference = release.reference("main/binary-amd64/Packages").unwrap();
        assert_eq!(reference.size_bytes(), 10);
        assert_eq!(reference.hash("MD5Sum"), Some("aaaa"));
        assert_eq!(reference.hash("SHA256"), Some("bbbb"));
    }

    #[test]
    fn idempotent() {
        let content = include_str!("testdata/inrelease-ubuntu-noble");
        let a = parse(content);
        let b = parse(content);

        assert_eq!(a.fields(), b.fields());
        assert_eq!(a.architectures(), b.architectures());
        assert_eq!(a.components(), b.components());
        assert_eq!(
            a.references().collect::<Vec<_>>(),
            b.references().collect::<Vec<_>>()
        );
        assert_eq!(a, b);
    }

    #[test]
    fn pgp_envelope_tolerance() {
        let signed = include_str!("testdata/inrelease-ubuntu-noble");

        // Strip the armor header, its `Hash:` armor header line and the signature.
        let stripped = signed
            .lines()
            .skip_while(|line| !line.starts_with("Origin:"))
            .take_while(|line| !line.starts_with("-----BEGIN PGP SIGNATURE-----"))
            .collect::<Vec<_>>()
            .join("\n");

        let a = parse(signed);
        let b = parse(&stripped);

        let mut a_fields = a.fields().clone();
        a_fields.remove("Hash");

        assert_eq!(&a_fields, b.fields());
        assert_eq!(
            a.references().collect::<Vec<_>>(),
            b.references().collect::<Vec<_>>()
        );
    }

    #[test]
    fn content_after_signature_ignored() {
        let release = parse(indoc! {"
            Origin: Example
            -----BEGIN PGP SIGNATURE-----
            Suite: bogus
            SHA256:
             abcd 1 main/binary-amd64/Packages
        "});

        assert_eq!(release.origin(), "Example");
        assert_eq!(release.field("Suite"), None);
        assert_eq!(release.references().count(), 0);
    }

    #[test]
    fn malformed_lines_skipped() {
        let release = parse(indoc! {"
            Origin: Example
            this line has no colon
            # Comment: not a field
            Empty:
            SHA256:
             deadbeef notanumber main/binary-amd64/Packages
             deadbeef 12
             cafe 12 main/binary-amd64/Packages
            Label: Example Label
        "});

        assert_eq!(release.origin(), "Example");
        assert_eq!(release.label(), "Example Label");
        assert_eq!(release.fields().len(), 2);
        assert_eq!(release.references().count(), 1);
        assert_eq!(
            release
                .reference("main/binary-amd64/Packages")
                .unwrap()
                .hash("SHA256"),
            Some("cafe")
        );
    }

    #[test]
    fn field_keys_case_sensitive() {
        let release = parse("origin: lower\nOrigin: Upper\n");

        assert_eq!(release.field("origin"), Some("lower"));
        assert_eq!(release.origin(), "Upper");
    }

    #[test]
    fn missing_architectures() {
        let release = parse(indoc! {"
            Origin: Example
            Components: main  contrib
        "});

        assert!(release.architectures().is_empty());
        assert_eq!(release.components(), ["main", "contrib"]);
        assert!(!release.has_date());
        assert_eq!(release.date().timestamp(), 0);
    }

    #[test]
    fn date_parsing() {
        assert_eq!(
            parse_date("Thu, 25 Apr 2024 15:10:33 UTC", 0).map(|d| d.timestamp()),
            Some(1714057833)
        );
        assert_eq!(
            parse_date("Thu, 25 Apr 2024 15:10:33", 0).map(|d| d.timestamp()),
            Some(1714057833)
        );
        // The timezone token is not interpreted.
        assert_eq!(
            parse_date("Thu, 25 Apr 2024 15:10:33 +0200", 0).map(|d| d.timestamp()),
            Some(1714057833)
        );
        assert_eq!(
            parse_date("Thu, 25 Apr 2024 17:10:33 UTC", 7200).map(|d| d.timestamp()),
            Some(1714057833)
        );
        assert_eq!(
            parse_date("Thu, 25 Apr 2024 10:10:33 UTC", -18000).map(|d| d.timestamp()),
            Some(1714057833)
        );
        assert_eq!(
            parse_date("Sat, 2 Mar 2024 08:00:00 UTC", 0).map(|d| d.timestamp()),
            Some(1709366400)
        );
        // Weekday names aren't cross-checked.
        assert_eq!(
            parse_date("Fri, 25 Apr 2024 15:10:33 UTC", 0).map(|d| d.timestamp()),
            Some(1714057833)
        );
        assert_eq!(
            parse_date("Xyz, 25 Apr 2024 15:10:33 UTC", 0).map(|d| d.timestamp()),
            Some(1714057833)
        );
        assert_eq!(parse_date("Thu, 31 Apr 2024 15:10:33 UTC", 0), None);
        assert_eq!(parse_date("yesterday", 0), None);
        assert_eq!(parse_date("", 0), None);
        assert_eq!(parse_date("Thu, 25 Apr 2024 15:10:33 UTC", 100_000), None);
    }

    #[test]
    fn configured_offset() {
        let parser = ReleaseParser::new(ParserConfig {
            utc_offset_seconds: 3600,
        });
        let release = parser.parse(
            NOBLE_URL,
            "",
            "Date: Thu, 25 Apr 2024 16:10:33 UTC\nValid-Until: Thu, 02 May 2024 16:10:33 UTC\n",
        );

        assert_eq!(release.date().timestamp(), 1714057833);
        assert_eq!(
            release.valid_until().map(|d| d.timestamp()),
            Some(1714057833 + 7 * 86400)
        );
    }

    #[test]
    fn unparseable_date() {
        let release = parse("Date: sometime last week\n");

        assert_eq!(release.field("Date"), Some("sometime last week"));
        assert!(!release.has_date());
        assert_eq!(release.date().timestamp(), 0);
    }

    #[test]
    fn filters() {
        let release = parse(include_str!("testdata/inrelease-ubuntu-noble"));

        let arm64 = release
            .references_for_architecture("arm64")
            .map(|r| r.path())
            .collect::<Vec<_>>();
        assert_eq!(arm64, vec!["Contents-arm64", "Contents-arm64.gz"]);

        let packages = release
            .references_for("amd64", "main")
            .map(|r| r.path())
            .collect::<Vec<_>>();
        assert_eq!(packages, vec!["main/binary-amd64/Packages.gz"]);

        let main = release
            .references_for_component("main")
            .map(|r| r.path())
            .collect::<Vec<_>>();
        assert_eq!(
            main,
            vec!["main/binary-amd64/Packages.gz", "main/source/Sources.gz"]
        );

        let top_level = release
            .references_for("", "")
            .map(|r| r.path())
            .collect::<Vec<_>>();
        assert_eq!(top_level, Vec::<&str>::new());

        assert_eq!(release.references_for_architecture("source").count(), 1);
    }

    #[test]
    fn config_deserialize() -> Result<(), serde_yaml::Error> {
        let config: ParserConfig = serde_yaml::from_str("utc_offset_seconds: -3600")?;
        assert_eq!(config.utc_offset_seconds, -3600);

        let config: ParserConfig = serde_yaml::from_str("{}")?;
        assert_eq!(config, ParserConfig::default());

        Ok(())
    }
}

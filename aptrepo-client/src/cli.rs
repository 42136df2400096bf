// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    aptrepo::{
        download::DocumentFetcher,
        error::AptRepoError,
        http::{ClientConfig, HttpFetcher},
        parse_release_with,
        parser::{ParserConfig, ReleaseParser},
        release::Release,
    },
    clap::{Arg, ArgMatches, Command},
    log::{info, LevelFilter},
    serde::Deserialize,
    std::path::Path,
    thiserror::Error,
};

const CONFIG_ABOUT: &str = "\
Configuration File

The --config argument accepts a path to a YAML file. All keys are optional.

parser (optional) (mapping)
   utc_offset_seconds (integer)
      Offset from UTC, in seconds east, that `Date` and `Valid-Until` fields
      are interpreted in. The timezone name at the end of these fields is
      ignored. Defaults to 0.

client (optional) (mapping)
   retries (integer)
      How many more times to attempt a download that failed without an HTTP
      response. Defaults to 3.

   user_agent (string)
      User agent to send with HTTP requests.

   timeout_seconds (integer)
      Timeout for a whole HTTP request. No timeout by default.

The --utc-offset and --retries arguments override values from this file.
";

const REFERENCES_ABOUT: &str = "\
Print references to index files listed in a Release file.

Each reference has an architecture and component inferred from its path.
For example, `main/binary-amd64/Packages.gz` has architecture `amd64` and
component `main`, while `Contents-arm64.gz` has architecture `arm64` and no
component.

The --architecture and --component arguments filter on these values. Pass an
empty string to select references where nothing could be inferred.
";

#[derive(Debug, Error)]
pub enum AptClientError {
    #[error("argument parsing error: {0}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    AptRepo(#[from] AptRepoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),
}

pub type Result<T> = std::result::Result<T, AptClientError>;

/// Content of a `--config` file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct AptClientConfig {
    parser: ParserConfig,
    client: ClientConfig,
}

impl AptClientConfig {
    fn from_path(path: &Path) -> Result<Self> {
        let f = std::fs::File::open(path)?;

        Ok(serde_yaml::from_reader(f)?)
    }

    /// Resolve configuration from a config file and command line overrides.
    fn from_args(args: &ArgMatches) -> Result<Self> {
        let mut config = match args.value_of_os("config") {
            Some(path) => Self::from_path(Path::new(path))?,
            None => Self::default(),
        };

        if args.is_present("utc-offset") {
            config.parser.utc_offset_seconds = args.value_of_t("utc-offset")?;
        }
        if args.is_present("retries") {
            config.client.retries = args.value_of_t("retries")?;
        }

        Ok(config)
    }
}

fn init_logging(args: &ArgMatches) {
    let log_level = if args.occurrences_of("verbose") > 1 {
        LevelFilter::Trace
    } else if args.occurrences_of("verbose") == 1 || args.is_present("debug") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    // HTTP internals are noisy at default level.
    if log_level == LevelFilter::Info {
        builder.filter_module("rustls", LevelFilter::Error);
        builder.filter_module("reqwest", LevelFilter::Warn);
    }

    builder.init();
}

fn url_arg() -> Arg<'static> {
    Arg::new("url")
        .required(true)
        .help("URL of an InRelease or Release file")
}

pub async fn run_cli() -> Result<()> {
    let app = Command::new("APT Repository Client")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Parse APT repository Release files independent of the local system's package sources")
        .arg_required_else_help(true);

    let app = app
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .global(true)
                .help("Enable debug logging"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .takes_value(true)
                .global(true)
                .allow_invalid_utf8(true)
                .help("Path to a YAML configuration file"),
        )
        .arg(
            Arg::new("utc-offset")
                .long("utc-offset")
                .takes_value(true)
                .allow_hyphen_values(true)
                .global(true)
                .help("Offset from UTC, in seconds east, that dates are interpreted in"),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .takes_value(true)
                .global(true)
                .help("Number of retries for downloads failing without a response"),
        );

    let app = app
        .subcommand(
            Command::new("show")
                .about("Fetch a Release file and print everything parsed from it")
                .arg(url_arg()),
        )
        .subcommand(
            Command::new("fields")
                .about("Fetch a Release file and print its well-known fields")
                .arg(url_arg()),
        )
        .subcommand(
            Command::new("references")
                .about("Fetch a Release file and print references to index files")
                .long_about(REFERENCES_ABOUT)
                .arg(url_arg())
                .arg(
                    Arg::new("architecture")
                        .long("architecture")
                        .takes_value(true)
                        .help("Only print references for this architecture"),
                )
                .arg(
                    Arg::new("component")
                        .long("component")
                        .takes_value(true)
                        .help("Only print references for this component"),
                ),
        )
        .subcommand(
            Command::new("check-update")
                .about("Check whether a Release file changed since it had the given entity tag")
                .arg(url_arg())
                .arg(
                    Arg::new("etag")
                        .required(true)
                        .help("Entity tag of the known version"),
                ),
        )
        .subcommand(
            Command::new("parse-file")
                .about("Parse a Release file from the local filesystem")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .allow_invalid_utf8(true)
                        .help("Path to the file to parse"),
                )
                .arg(
                    Arg::new("url")
                        .long("url")
                        .takes_value(true)
                        .help("URL to record as the origin of the file"),
                ),
        );

    let mut app = app.subcommand(
        Command::new("config").about("Print documentation about the configuration file"),
    );

    let matches = app.clone().get_matches();

    let (command, args) = match matches.subcommand() {
        Some(v) => v,
        None => {
            app.print_help()?;
            return Ok(());
        }
    };

    init_logging(args);

    match command {
        "show" => command_show(args).await,
        "fields" => command_fields(args).await,
        "references" => command_references(args).await,
        "check-update" => command_check_update(args).await,
        "parse-file" => command_parse_file(args),
        "config" => {
            println!("{}", CONFIG_ABOUT);
            Ok(())
        }
        command => Err(AptClientError::InvalidSubCommand(command.to_string())),
    }
}

async fn fetch_release(args: &ArgMatches) -> Result<Release> {
    let config = AptClientConfig::from_args(args)?;
    let url = args.value_of("url").expect("url argument is required");

    let fetcher = HttpFetcher::with_config(config.client)?;
    let parser = ReleaseParser::new(config.parser);

    Ok(parse_release_with(&fetcher, &parser, url).await?)
}

async fn command_show(args: &ArgMatches) -> Result<()> {
    let release = fetch_release(args).await?;

    print!("{}", release);

    Ok(())
}

fn format_fields(release: &Release) -> String {
    let date = if release.has_date() {
        release.date().to_rfc2822()
    } else {
        "unknown".to_string()
    };

    [
        format!("Origin: {}", release.origin()),
        format!("Label: {}", release.label()),
        format!("Suite: {}", release.suite()),
        format!("Version: {}", release.version()),
        format!("Codename: {}", release.codename()),
        format!("Description: {}", release.description()),
        format!("Date: {}", date),
        format!("Architectures: {}", release.architectures().join(" ")),
        format!("Components: {}", release.components().join(" ")),
        format!("References: {}", release.references().count()),
    ]
    .join("\n")
}

async fn command_fields(args: &ArgMatches) -> Result<()> {
    let release = fetch_release(args).await?;

    println!("{}", format_fields(&release));

    Ok(())
}

async fn command_references(args: &ArgMatches) -> Result<()> {
    let release = fetch_release(args).await?;

    let architecture = args.value_of("architecture");
    let component = args.value_of("component");

    let references = match (architecture, component) {
        (Some(architecture), Some(component)) => release
            .references_for(architecture, component)
            .collect::<Vec<_>>(),
        (Some(architecture), None) => release
            .references_for_architecture(architecture)
            .collect::<Vec<_>>(),
        (None, Some(component)) => release
            .references_for_component(component)
            .collect::<Vec<_>>(),
        (None, None) => release.references().collect::<Vec<_>>(),
    };

    for reference in references {
        println!("{}", reference);
    }

    Ok(())
}

async fn command_check_update(args: &ArgMatches) -> Result<()> {
    let config = AptClientConfig::from_args(args)?;
    let url = args.value_of("url").expect("url argument is required");
    let etag = args.value_of("etag").expect("etag argument is required");

    let fetcher = HttpFetcher::with_config(config.client)?;

    if fetcher.needs_update(url, etag).await? {
        println!("update available");
    } else {
        println!("up to date");
    }

    Ok(())
}

fn command_parse_file(args: &ArgMatches) -> Result<()> {
    let config = AptClientConfig::from_args(args)?;
    let path = Path::new(args.value_of_os("path").expect("path argument is required"));

    info!("reading {}", path.display());
    let content = std::fs::read_to_string(path)?;

    let url = match args.value_of("url") {
        Some(url) => url.to_string(),
        None => format!("file://{}", path.display()),
    };

    let release = ReleaseParser::new(config.parser).parse(&url, "", &content);

    print!("{}", release);

    Ok(())
}

#[cfg(test)]
mod test {
    use {super::*, std::io::Write};

    #[test]
    fn config_file() -> Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        f.write_all(b"parser:\n  utc_offset_seconds: 3600\nclient:\n  retries: 1\n")?;
        f.flush()?;

        let config = AptClientConfig::from_path(f.path())?;

        assert_eq!(config.parser.utc_offset_seconds, 3600);
        assert_eq!(config.client.retries, 1);
        assert_eq!(config.client.timeout_seconds, None);

        Ok(())
    }

    #[test]
    fn config_rejects_unknown_keys() {
        assert!(serde_yaml::from_str::<AptClientConfig>("bogus: true").is_err());
    }

    #[test]
    fn fields_output() {
        let release = ReleaseParser::default().parse(
            "http://archive.ubuntu.com/ubuntu/dists/noble/InRelease",
            "",
            "Origin: Ubuntu\nSuite: noble\nArchitectures: amd64 arm64\n",
        );

        let output = format_fields(&release);
        assert!(output.contains("Origin: Ubuntu\n"));
        assert!(output.contains("Label: \n"));
        assert!(output.contains("Date: unknown\n"));
        assert!(output.contains("Architectures: amd64 arm64\n"));
        assert!(output.ends_with("References: 0"));
    }
}

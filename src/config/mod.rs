use std::{borrow::Cow, path::PathBuf};

use clap::{ArgAction, Args, Parser, ValueEnum};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment, Provider,
};
use hcl_format::Hcl;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::level_filters::LevelFilter;

mod hcl_format;
mod validate;

const DEFAULT_CONFIG_DIR: &str = "/etc/unifi-cert-rotate";
const DEFAULT_CERT_PATH: &str = "/etc/letsencrypt/live/unifi/fullchain.pem";
const DEFAULT_KEY_PATH: &str = "/etc/letsencrypt/live/unifi/privkey.pem";
const DEFAULT_LOG_PATH: &str = "/var/log/unifi-cert-rotate.log";

/// Where the candidate certificate and its key are dropped by the issuing process.
#[derive(Debug, Serialize, Deserialize, Clone, Args)]
#[group(id = "certificate")]
pub struct CertificatePaths {
    /// PEM certificate to install. The leaf comes first, a chain may follow.
    #[arg(
        long = "certificate.path",
        id = "certificate.path",
        required = false,
        value_parser,
        default_value = DEFAULT_CERT_PATH
    )]
    pub path: PathBuf,

    /// PEM private key matching the certificate
    #[arg(
        long = "certificate.key_path",
        id = "certificate.key_path",
        required = false,
        value_parser,
        default_value = DEFAULT_KEY_PATH
    )]
    pub key_path: PathBuf,
}

impl Default for CertificatePaths {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CERT_PATH),
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
        }
    }
}

/// The controller's credential store.
///
/// Alias and password are the values the controller expects, they are
/// part of its interface and not secrets chosen by this tool.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeystoreCfg {
    /// Directory holding the keystore (also receives the backup and the transient bundle)
    pub directory: PathBuf,

    /// Name of the keystore file inside `directory`
    pub file_name: String,

    /// Entry holding the controller certificate
    pub alias: String,

    /// Password of both the keystore and the entry
    pub password: String,

    /// Account owning the keystore after an import. Empty disables `chown`.
    pub owner: Option<String>,

    /// The `keytool` binary (from the JRE shipped with the controller)
    pub keytool: PathBuf,
}

impl Default for KeystoreCfg {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/lib/unifi"),
            file_name: "keystore".to_string(),
            alias: "unifi".to_string(),
            password: "aircontrolenterprise".to_string(),
            owner: Some("unifi".to_string()),
            keytool: PathBuf::from("keytool"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceManager {
    Systemd,
    Sysv,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceCfg {
    /// Name of the controller service
    pub name: String,

    #[serde(deserialize_with = "service_manager_deser")]
    pub manager: ServiceManager,

    /// Overrides the init system binary (`systemctl` or `service`)
    pub command: Option<PathBuf>,
}

impl Default for ServiceCfg {
    fn default() -> Self {
        Self {
            name: "unifi".to_string(),
            manager: ServiceManager::Systemd,
            command: None,
        }
    }
}

/// Registration of the recurring run in the host's crontab.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Schedule {
    /// Registers the daily run on every invocation when missing (default: true)
    pub enabled: bool,

    /// Five-field cron expression (default: every day at 03:00)
    pub expression: String,

    /// The `crontab` binary
    pub crontab: PathBuf,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            enabled: true,
            expression: "0 3 * * *".to_string(),
            crontab: PathBuf::from("crontab"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Trace,
}

/// Transforms our custom `LogLevel` enum into a `tracing::level_filters::LevelFilter`
/// enum used by the `tracing` crate.
impl From<&LogLevel> for tracing::level_filters::LevelFilter {
    fn from(val: &LogLevel) -> Self {
        match val {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Eq, PartialEq)]
pub enum LogRotation {
    #[default]
    Never,
    Daily,
    Monthly,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Serialize, Deserialize, Clone, Args)]
#[group(id = "logging")]
pub struct Logging {
    /// The level of logging to be used.
    #[serde(deserialize_with = "log_level_deser")]
    #[arg(
        long = "log.level",
        required = false,
        value_enum,
        default_value = "info"
    )]
    pub level: LogLevel,

    /// The format of the log output
    #[serde(deserialize_with = "log_format_deser")]
    #[arg(
        long = "log.format",
        required = false,
        value_enum,
        default_value = "pretty"
    )]
    pub format: LogFormat,

    /// Log file every line is appended to (in addition to the console).
    /// An empty path logs to the console only.
    #[arg(
        long = "log.path",
        required = false,
        value_parser,
        default_value = DEFAULT_LOG_PATH
    )]
    pub path: Option<PathBuf>,

    #[clap(skip)]
    #[serde(deserialize_with = "log_rotation_deser", default)]
    pub rotation: LogRotation,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            path: Some(PathBuf::from(DEFAULT_LOG_PATH)),
            rotation: LogRotation::Never,
        }
    }
}

/// The main configuration struct.
/// A configuration file (YAML, HCL or through ENV) will be parsed into this struct.
/// Example:
///
/// ```yaml
///
/// # Example configuration file
/// certificate:
///   path: "/etc/letsencrypt/live/unifi.example.net/fullchain.pem"
///   key_path: "/etc/letsencrypt/live/unifi.example.net/privkey.pem"
/// keystore:
///   directory: "/var/lib/unifi"
///   file_name: "keystore"
///   alias: "unifi"
///   password: "aircontrolenterprise"
///   owner: "unifi"
/// service:
///   name: "unifi"
///   manager: "systemd"
/// schedule:
///   enabled: true
///   expression: "0 3 * * *"
/// logging:
///   level: "INFO"
///   format: "pretty"
///   path: "/var/log/unifi-cert-rotate.log"
/// ```
///
#[derive(Debug, Serialize, Deserialize, Parser)]
#[command(name = "unifi-cert-rotate")]
#[command(version, about, long_about = None)]
pub(crate) struct Config {
    /// Test mode (`--test yes`): inspects and converts the certificate but
    /// neither stops the controller nor touches its keystore.
    #[serde(default, deserialize_with = "yes_no_deser")]
    #[arg(
        long,
        value_name = "yes|no",
        required = false,
        action = ArgAction::Set,
        value_parser = parse_yes_no,
        default_value = "no"
    )]
    pub test: bool,

    /// The PATH to the configuration file to be used.
    ///
    /// Either a file or a directory holding `cert-rotate.yaml` or `cert-rotate.hcl`.
    #[clap(short, required = false, long)]
    #[allow(clippy::struct_field_names)]
    pub config_path: Option<Cow<'static, str>>,

    #[command(flatten)]
    pub certificate: CertificatePaths,

    #[command(flatten)]
    pub logging: Logging,

    #[clap(skip)]
    pub keystore: KeystoreCfg,

    #[clap(skip)]
    pub service: ServiceCfg,

    #[clap(skip)]
    pub schedule: Schedule,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            test: false,
            config_path: Some(Cow::Borrowed(DEFAULT_CONFIG_DIR)),
            certificate: CertificatePaths::default(),
            logging: Logging::default(),
            keystore: KeystoreCfg::default(),
            service: ServiceCfg::default(),
            schedule: Schedule::default(),
        }
    }
}

/// Implement the `Provider` trait for the `Config` struct.
/// This allows the `Config` struct to be used as a configuration provider with *defaults*.
impl Provider for Config {
    fn metadata(&self) -> figment::Metadata {
        figment::Metadata::named("unifi-cert-rotate")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        Serialized::defaults(Config::default()).data()
    }
}

/// Load the configuration from the command line, configuration file(s) and environment.
///
/// Nested keys can be separated by double underscores (__) in the environment variables.
/// E.g. `CERT_ROTATE_KEYSTORE__PASSWORD=secret` will set the `password` key in the
/// `keystore` section.
pub fn load(fallback: &str) -> Result<Config, figment::Error> {
    let parsed_commands = Config::parse();

    let path_with_fallback = match &parsed_commands.config_path {
        Some(path) => path.as_ref(),
        None => fallback,
    };

    load_from_path(path_with_fallback, &parsed_commands)
}

/// Test-friendly version of load that doesn't parse command line arguments
#[cfg(test)]
pub(crate) fn load_for_test(fallback: &str) -> Result<Config, figment::Error> {
    load_from_path(fallback, &Config::default())
}

/// Load configuration from a specific path, used for testing and internal logic
pub(crate) fn load_from_path(
    config_path: &str,
    parsed_commands: &Config,
) -> Result<Config, figment::Error> {
    let mut figment = Figment::new()
        .merge(Config::default())
        .merge(Serialized::defaults(parsed_commands));

    let path = std::path::Path::new(config_path);
    if path.is_file() {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml" | "yaml") => figment = figment.merge(Yaml::file(config_path)),
            Some("hcl") => figment = figment.merge(Hcl::file(config_path)),
            // No (known) extension, try both formats
            _ => {
                figment = figment
                    .merge(Yaml::file(config_path))
                    .merge(Hcl::file(config_path));
            }
        }
    } else {
        // missing files are skipped by figment
        figment = figment
            .merge(Yaml::file(format!("{config_path}/cert-rotate.yml")))
            .merge(Yaml::file(format!("{config_path}/cert-rotate.yaml")))
            .merge(Hcl::file(format!("{config_path}/cert-rotate.hcl")));
    }

    let mut config: Config = figment
        .merge(Env::prefixed("CERT_ROTATE_").split("__"))
        .extract()?;

    // `--test yes` on the command line wins over files and environment
    config.test |= parsed_commands.test;

    // validate configuration and throw error upwards
    validate::check_config(&config).map_err(|err| figment::Error::from(err.to_string()))?;

    Ok(config)
}

/// Parses the `--test` value
fn parse_yes_no(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" => Ok(false),
        other => Err(format!("expected one of: yes, no (got '{other}')")),
    }
}

/// Deserialize function accepting booleans or yes/no strings
fn yes_no_deser<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum YesNo {
        Bool(bool),
        Text(String),
    }

    match YesNo::deserialize(deserializer)? {
        YesNo::Bool(value) => Ok(value),
        YesNo::Text(text) => parse_yes_no(&text).map_err(serde::de::Error::custom),
    }
}

/// Deserialize function to convert a string to a `LogLevel` Enum
fn log_level_deser<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.to_lowercase().as_str() {
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        "trace" => Ok(LogLevel::Trace),
        _ => Err(serde::de::Error::custom(
            "expected one of DEBUG, INFO, WARN, ERROR, TRACE",
        )),
    }
}

/// Deserialize function to convert a string to a `LogFormat` Enum
fn log_format_deser<'de, D>(deserializer: D) -> Result<LogFormat, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.to_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" => Ok(LogFormat::Pretty),
        _ => Err(serde::de::Error::custom("expected one of: json, pretty")),
    }
}

fn log_rotation_deser<'de, D>(deserializer: D) -> Result<LogRotation, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.to_lowercase().as_str() {
        "daily" => Ok(LogRotation::Daily),
        "monthly" => Ok(LogRotation::Monthly),
        "never" => Ok(LogRotation::Never),
        _ => Err(serde::de::Error::custom(
            "expected one of: daily, monthly, never",
        )),
    }
}

fn service_manager_deser<'de, D>(deserializer: D) -> Result<ServiceManager, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.to_lowercase().as_str() {
        "systemd" => Ok(ServiceManager::Systemd),
        "sysv" => Ok(ServiceManager::Sysv),
        _ => Err(serde::de::Error::custom("expected one of: systemd, sysv")),
    }
}

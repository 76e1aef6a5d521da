//! Configuration types for the DDNS system
//!
//! The daemon reads one TOML file at startup. Every section maps onto a
//! structure in this module:
//!
//! ```toml
//! [api]
//! SecretId = "AKID..."
//! SecretKey = "..."
//!
//! [dns]
//! domain = "example.com"
//! sub_domain = "home"
//! record_type = "AAAA"
//! record_line = "默认"
//!
//! [log]
//! level = "INFO"
//! format = "full"
//! handlers = [{ handler = "CONSOLE" }]
//! ```
//!
//! `[engine]` and `[probe]` are optional and fall back to defaults.

use crate::error::{Error, Result};
use crate::traits::IpVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Environment variable overriding `api.SecretId`
pub const ENV_SECRET_ID: &str = "DDNS_SECRET_ID";

/// Environment variable overriding `api.SecretKey`
pub const ENV_SECRET_KEY: &str = "DDNS_SECRET_KEY";

/// Longest accepted `engine.interval_secs` (30 days)
pub const MAX_INTERVAL_SECS: u64 = 30 * 24 * 60 * 60;

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Provider credentials
    pub api: ApiConfig,

    /// The record to keep in sync
    pub dns: DomainTarget,

    /// Logging settings
    pub log: LogConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Optional address probe settings
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl DdnsConfig {
    /// Load and validate the configuration file at `path`
    ///
    /// Credentials from `DDNS_SECRET_ID` / `DDNS_SECRET_KEY` take precedence
    /// over the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&raw)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from TOML text without validating it
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::config(e.to_string()))
    }

    /// Apply credential overrides from a key lookup (normally the environment)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret_id) = lookup(ENV_SECRET_ID).filter(|v| !v.is_empty()) {
            self.api.secret_id = secret_id;
        }
        if let Some(secret_key) = lookup(ENV_SECRET_KEY).filter(|v| !v.is_empty()) {
            self.api.secret_key = secret_key;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.dns.validate()?;
        self.log.validate()?;
        self.engine.validate()?;
        self.probe.validate()?;
        Ok(())
    }
}

/// Provider credentials
///
/// Both values are opaque tokens issued by the provider console.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API secret id
    #[serde(rename = "SecretId", alias = "secret_id")]
    pub secret_id: String,

    /// API secret key
    /// ⚠️ NEVER log this value
    #[serde(rename = "SecretKey", alias = "secret_key")]
    pub secret_key: String,
}

// Custom Debug implementation that hides the secret key
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<REDACTED>")
            .finish()
    }
}

impl ApiConfig {
    /// Validate the credentials
    pub fn validate(&self) -> Result<()> {
        if self.secret_id.trim().is_empty() {
            return Err(Error::config("api.SecretId cannot be empty"));
        }
        if self.secret_key.trim().is_empty() {
            return Err(Error::config("api.SecretKey cannot be empty"));
        }
        Ok(())
    }
}

/// DNS record type managed by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Address family a record of this type holds
    pub fn ip_version(&self) -> IpVersion {
        match self {
            RecordType::A => IpVersion::V4,
            RecordType::Aaaa => IpVersion::V6,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" | "IPV4" => Ok(RecordType::A),
            "AAAA" | "IPV6" => Ok(RecordType::Aaaa),
            _ => Err(Error::config(format!(
                "Invalid record_type: {}. Valid options are [A, AAAA]",
                s
            ))),
        }
    }
}

impl TryFrom<String> for RecordType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

/// The (sub)domain record kept in sync with the local address
///
/// Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTarget {
    /// Registered domain managed by the provider (e.g., "example.com")
    pub domain: String,

    /// Host label below the domain; `None` or `"@"` means the apex
    #[serde(default)]
    pub sub_domain: Option<String>,

    /// Record type (A for IPv4, AAAA for IPv6)
    pub record_type: RecordType,

    /// Provider routing line (e.g., "默认" or "default")
    pub record_line: String,
}

impl DomainTarget {
    /// Create a new apex target
    pub fn new(
        domain: impl Into<String>,
        record_type: RecordType,
        record_line: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            sub_domain: None,
            record_type,
            record_line: record_line.into(),
        }
    }

    /// Set the host label
    pub fn with_sub_domain(mut self, sub_domain: impl Into<String>) -> Self {
        self.sub_domain = Some(sub_domain.into());
        self
    }

    /// Host label as the provider expects it, `"@"` for the apex
    pub fn host_label(&self) -> &str {
        match self.sub_domain.as_deref().map(str::trim) {
            None | Some("") => "@",
            Some(label) => label,
        }
    }

    /// Fully qualified name of the record (for logging)
    pub fn fqdn(&self) -> String {
        match self.host_label() {
            "@" => self.domain.clone(),
            label => format!("{}.{}", label, self.domain),
        }
    }

    /// Validate the target
    pub fn validate(&self) -> Result<()> {
        validate_domain_name(&self.domain)?;

        let label = self.host_label();
        if label != "@" {
            validate_sub_domain(label)?;
        }

        if self.record_line.trim().is_empty() {
            return Err(Error::config("dns.record_line cannot be empty"));
        }

        Ok(())
    }
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("dns.domain cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(Error::config(format!(
            "Domain name must contain at least two labels. Got: {}",
            domain
        )));
    }

    for label in domain.split('.') {
        validate_label(label, domain, false)?;
    }

    Ok(())
}

/// Validate a host label, which may span several DNS labels ("a.b")
fn validate_sub_domain(sub_domain: &str) -> Result<()> {
    for label in sub_domain.split('.') {
        if label == "*" {
            continue;
        }
        validate_label(label, sub_domain, true)?;
    }
    Ok(())
}

fn validate_label(label: &str, name: &str, allow_underscore: bool) -> Result<()> {
    if label.is_empty() {
        return Err(Error::config(format!("Name has empty label: '{}'", name)));
    }

    if label.len() > 63 {
        return Err(Error::config(format!(
            "Label too long: {} chars (max 63). Label: '{}'",
            label.len(),
            label
        )));
    }

    // Check for valid characters (alphanumeric and hyphen)
    if !label
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || (allow_underscore && c == '_'))
    {
        return Err(Error::config(format!(
            "Label contains invalid characters. Label: '{}'. \
            Valid: alphanumeric and hyphen only.",
            label
        )));
    }

    // Label cannot start or end with hyphen
    if label.starts_with('-') || label.ends_with('-') {
        return Err(Error::config(format!(
            "Label cannot start or end with hyphen. Label: '{}'",
            label
        )));
    }

    Ok(())
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level
    #[serde(default)]
    pub level: LogLevel,

    /// Output format shared by all handlers
    #[serde(default)]
    pub format: LogFormat,

    /// Output sinks
    #[serde(default = "default_handlers")]
    pub handlers: Vec<HandlerConfig>,
}

impl LogConfig {
    /// Validate the logging configuration
    pub fn validate(&self) -> Result<()> {
        if self.handlers.is_empty() {
            return Err(Error::config("log.handlers must name at least one handler"));
        }
        for handler in &self.handlers {
            if handler.path().trim().is_empty() {
                return Err(Error::config(format!(
                    "log handler {} has an empty path",
                    handler.handler
                )));
            }
        }
        Ok(())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            handlers: default_handlers(),
        }
    }
}

fn default_handlers() -> Vec<HandlerConfig> {
    vec![HandlerConfig::new(HandlerKind::Console)]
}

/// Log level names accepted in `log.level`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    /// Treated as ERROR; tracing has no separate critical level
    Critical,
}

impl LogLevel {
    /// Convert to a tracing level filter
    pub fn as_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(Error::config(format!(
                "Invalid log level: {}. Valid options are: \
                [TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL]",
                s
            ))),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Log line layout
///
/// Any value other than the four layout names is kept verbatim as a
/// `Template` (e.g. `%(asctime)s - %(levelname)s - %(message)s` from older
/// configs) and rendered with the `Full` layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogFormat {
    /// Timestamp, level, span context, fields
    #[default]
    Full,
    /// Single line, abbreviated context
    Compact,
    /// Multi-line, human oriented
    Pretty,
    /// Newline-delimited JSON objects
    Json,
    /// Unrecognized format string
    Template(String),
}

impl LogFormat {
    /// The format string, if it did not name a layout
    pub fn template(&self) -> Option<&str> {
        match self {
            LogFormat::Template(template) => Some(template),
            _ => None,
        }
    }
}

impl From<String> for LogFormat {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => LogFormat::Full,
            "compact" => LogFormat::Compact,
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => LogFormat::Template(value),
        }
    }
}

impl From<LogFormat> for String {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Full => "full".to_string(),
            LogFormat::Compact => "compact".to_string(),
            LogFormat::Pretty => "pretty".to_string(),
            LogFormat::Json => "json".to_string(),
            LogFormat::Template(template) => template,
        }
    }
}

/// A named log output sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Sink type
    pub handler: HandlerKind,

    /// Output file (FILE and TimeROTA only)
    #[serde(default)]
    pub path: Option<String>,

    /// Number of rotated files kept (TimeROTA only)
    #[serde(default)]
    pub backup_count: Option<usize>,
}

impl HandlerConfig {
    /// Create a handler with default settings
    pub fn new(handler: HandlerKind) -> Self {
        Self {
            handler,
            path: None,
            backup_count: None,
        }
    }

    /// Output file path, defaulted per handler kind
    pub fn path(&self) -> &str {
        match (&self.path, self.handler) {
            (Some(path), _) => path,
            (None, HandlerKind::Console) => "-",
            (None, HandlerKind::File) => "logfile.log",
            (None, HandlerKind::TimeRotating) => "logRoteFile.log",
        }
    }

    /// Rotated files to keep
    pub fn backup_count(&self) -> usize {
        self.backup_count.unwrap_or(2)
    }
}

/// Supported log sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerKind {
    /// Standard error
    #[serde(rename = "CONSOLE", alias = "console")]
    Console,
    /// Plain append-only file
    #[serde(rename = "FILE", alias = "file")]
    File,
    /// File rotated at midnight
    #[serde(rename = "TimeROTA", alias = "TIME_ROTATING", alias = "time_rotating")]
    TimeRotating,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandlerKind::Console => "CONSOLE",
            HandlerKind::File => "FILE",
            HandlerKind::TimeRotating => "TimeROTA",
        })
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between reconciliation ticks (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Deadline for each provider call (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// First retry delay after a failed tick (in seconds)
    ///
    /// Doubles with every consecutive failure, capped at `interval_secs`.
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events will be dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::config("engine.interval_secs must be > 0"));
        }
        if self.interval_secs > MAX_INTERVAL_SECS {
            return Err(Error::config(format!(
                "engine.interval_secs ({}) cannot exceed {}",
                self.interval_secs, MAX_INTERVAL_SECS
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::config("engine.request_timeout_secs must be > 0"));
        }
        if self.request_timeout_secs > self.interval_secs {
            return Err(Error::config(format!(
                "engine.request_timeout_secs ({}) cannot exceed engine.interval_secs ({})",
                self.request_timeout_secs, self.interval_secs
            )));
        }
        if self.retry_base_secs == 0 {
            return Err(Error::config("engine.retry_base_secs must be > 0"));
        }
        if self.retry_base_secs > self.interval_secs {
            return Err(Error::config(format!(
                "engine.retry_base_secs ({}) cannot exceed engine.interval_secs ({})",
                self.retry_base_secs, self.interval_secs
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("engine.event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_secs(self.retry_base_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_base_secs: default_retry_base_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_retry_base_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Address probe configuration
///
/// The probe never sends traffic to these endpoints; they only steer the
/// routing table lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Well-known IPv4 endpoint (public resolver)
    #[serde(default = "default_ipv4_target")]
    pub ipv4_target: SocketAddr,

    /// Well-known IPv6 endpoint (public resolver)
    #[serde(default = "default_ipv6_target")]
    pub ipv6_target: SocketAddr,
}

impl ProbeConfig {
    /// Validate the probe configuration
    pub fn validate(&self) -> Result<()> {
        if !self.ipv4_target.is_ipv4() {
            return Err(Error::config(format!(
                "probe.ipv4_target must be an IPv4 socket address. Got: {}",
                self.ipv4_target
            )));
        }
        if !self.ipv6_target.is_ipv6() {
            return Err(Error::config(format!(
                "probe.ipv6_target must be an IPv6 socket address. Got: {}",
                self.ipv6_target
            )));
        }
        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ipv4_target: default_ipv4_target(),
            ipv6_target: default_ipv6_target(),
        }
    }
}

fn default_ipv4_target() -> SocketAddr {
    SocketAddr::from(([8, 8, 8, 8], 80))
}

fn default_ipv6_target() -> SocketAddr {
    SocketAddr::from(([0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888], 80))
}

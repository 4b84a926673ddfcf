use crate::errors::{FileOperation, IoError};
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    ffi::{OsStr, OsString},
    fmt, fs, io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

pub const DEFAULT_POSTGRES_USER: &str = "app";
pub const DEFAULT_POSTGRES_PASSWORD: &str = "app";
pub const DEFAULT_POSTGRES_DB: &str = "app";
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_BACKEND_PORT: u16 = 8000;
pub const DEFAULT_FRONTEND_PORT: u16 = 3000;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";
/// Host the browser uses to reach the backend.
pub const PUBLIC_API_HOST: &str = "localhost";
/// Not user-overridable.
pub const NEXT_TELEMETRY_DISABLED: &str = "1";

/// Characters refused in text values. They would end or alter the quoting of the string
/// literals the values are rendered into, or trigger compose interpolation in `.env`.
pub const RESERVED_CHARS: [char; 5] = ['"', '\'', '\\', '$', '`'];

/// Every environment variable the generated stack reads, in declaration order.
pub const ENV_KEYS: [&str; 9] = [
    "POSTGRES_USER",
    "POSTGRES_PASSWORD",
    "POSTGRES_DB",
    "POSTGRES_PORT",
    "BACKEND_PORT",
    "FRONTEND_PORT",
    "NEXT_PUBLIC_API_URL",
    "CORS_ORIGINS",
    "NEXT_TELEMETRY_DISABLED",
];

/// Everything that can go wrong while turning command line input into a [`Configuration`].
///
/// All variants are invalid-argument failures: they are raised before anything touches the
/// filesystem under the target root.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid root directory '{root}': {reason}")]
    #[diagnostic(
        code(kickstack::config::invalid_root),
        help("Pass a directory path to --root, or omit it to use the current directory")
    )]
    InvalidRoot { root: String, reason: &'static str },

    #[error("unable to determine the current directory")]
    #[diagnostic(
        code(kickstack::config::working_directory),
        help("Pass an absolute path to --root, or run from a directory that still exists")
    )]
    WorkingDirectory(#[source] io::Error),

    #[error("malformed assignment '{input}'")]
    #[diagnostic(
        code(kickstack::config::malformed_assignment),
        help("Overrides look like KEY=VALUE, e.g. --set BACKEND_PORT=9000")
    )]
    MalformedAssignment { input: String },

    #[error("unknown configuration key '{key}'")]
    #[diagnostic(
        code(kickstack::config::unknown_key),
        help("Recognized keys: POSTGRES_USER, POSTGRES_PASSWORD, POSTGRES_DB, POSTGRES_PORT, BACKEND_PORT, FRONTEND_PORT, NEXT_PUBLIC_API_URL, CORS_ORIGINS")
    )]
    UnknownKey { key: String },

    #[error("configuration key '{key}' cannot be overridden")]
    #[diagnostic(code(kickstack::config::fixed_key))]
    FixedKey { key: String },

    #[error("invalid port for '{key}': '{value}'")]
    #[diagnostic(
        code(kickstack::config::invalid_port),
        help("Ports are integers between 1 and 65535")
    )]
    InvalidPort { key: String, value: String },

    #[error("invalid value for '{key}': {reason}")]
    #[diagnostic(code(kickstack::config::invalid_value))]
    InvalidValue { key: String, reason: &'static str },

    #[error("I/O error within config domain")]
    #[diagnostic(code(kickstack::config::io))]
    Io(#[from] IoError),

    #[error("Unable to parse toml file at '{path}': {source}")]
    #[diagnostic(
        code(kickstack::config::parse_toml),
        help("The config file is a flat table of KEY = value pairs")
    )]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Command line input, before any interpretation.
#[derive(Debug, Default, Clone)]
pub struct RawArgs {
    pub root: Option<OsString>,
    pub force: bool,
    /// `KEY=VALUE` overrides, in the order given.
    pub assignments: Vec<String>,
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Leave files that already exist untouched.
    KeepExisting,
    /// Replace existing files with freshly generated content.
    Force,
}
impl OverwritePolicy {
    pub fn is_force(self) -> bool {
        matches!(self, Self::Force)
    }
}
impl From<bool> for OverwritePolicy {
    fn from(force: bool) -> Self {
        if force {
            Self::Force
        } else {
            Self::KeepExisting
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
enum OverrideValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}
impl fmt::Display for OverrideValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Ordered `KEY -> value` overrides collected from one source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides(pub IndexMap<String, String>);
impl Overrides {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let parsed: IndexMap<String, OverrideValue> =
            toml::from_str(content).map_err(|err| ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: err,
            })?;

        Ok(Self(
            parsed
                .into_iter()
                .map(|(key, value)| (key, value.to_string()))
                .collect(),
        ))
    }

    /// Parses `KEY=VALUE` assignments. A repeated key keeps its last value.
    pub fn from_assignments(assignments: &[String]) -> Result<Self, ConfigError> {
        lazy_static::lazy_static! {
            static ref ASSIGNMENT_REGEX: regex::Regex =
                regex::Regex::new(r"^(?P<key>[A-Z][A-Z0-9_]*)=(?P<value>.*)$")
                    .expect("a valid regex pattern");
        }

        let mut overrides = IndexMap::new();

        for input in assignments {
            let captures =
                ASSIGNMENT_REGEX
                    .captures(input)
                    .ok_or_else(|| ConfigError::MalformedAssignment {
                        input: input.clone(),
                    })?;

            overrides.insert(captures["key"].to_string(), captures["value"].to_string());
        }

        Ok(Self(overrides))
    }

    /// Layers `other` on top of `self`; keys in `other` win.
    pub fn merge(mut self, other: Overrides) -> Self {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }

        self
    }
}

/// Resolved values consumed by the content producers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    postgres_user: String,
    postgres_password: String,
    postgres_db: String,
    postgres_port: u16,
    backend_port: u16,
    frontend_port: u16,
    next_public_api_url: String,
    cors_origins: Vec<String>,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            postgres_user: DEFAULT_POSTGRES_USER.to_string(),
            postgres_password: DEFAULT_POSTGRES_PASSWORD.to_string(),
            postgres_db: DEFAULT_POSTGRES_DB.to_string(),
            postgres_port: DEFAULT_POSTGRES_PORT,
            backend_port: DEFAULT_BACKEND_PORT,
            frontend_port: DEFAULT_FRONTEND_PORT,
            next_public_api_url: public_api_url(DEFAULT_BACKEND_PORT),
            cors_origins: vec![DEFAULT_CORS_ORIGINS.to_string()],
        }
    }
}
impl Settings {
    /// Applies overrides on top of the fixed defaults.
    ///
    /// `NEXT_PUBLIC_API_URL` is the only derived default: unless given explicitly it points at
    /// the resolved backend port.
    pub fn from_overrides(overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        let mut api_url = None;

        for (key, value) in &overrides.0 {
            match key.as_str() {
                "POSTGRES_USER" => settings.postgres_user = text_value(key, value)?,
                "POSTGRES_PASSWORD" => settings.postgres_password = text_value(key, value)?,
                "POSTGRES_DB" => settings.postgres_db = text_value(key, value)?,
                "POSTGRES_PORT" => settings.postgres_port = port_value(key, value)?,
                "BACKEND_PORT" => settings.backend_port = port_value(key, value)?,
                "FRONTEND_PORT" => settings.frontend_port = port_value(key, value)?,
                "NEXT_PUBLIC_API_URL" => api_url = Some(text_value(key, value)?),
                "CORS_ORIGINS" => settings.cors_origins = origins_value(key, value)?,
                "NEXT_TELEMETRY_DISABLED" => {
                    return Err(ConfigError::FixedKey { key: key.clone() })
                }
                _ => return Err(ConfigError::UnknownKey { key: key.clone() }),
            }
        }

        settings.next_public_api_url =
            api_url.unwrap_or_else(|| public_api_url(settings.backend_port));

        Ok(settings)
    }

    pub fn postgres_user(&self) -> &str {
        &self.postgres_user
    }
    pub fn postgres_password(&self) -> &str {
        &self.postgres_password
    }
    pub fn postgres_db(&self) -> &str {
        &self.postgres_db
    }
    pub fn postgres_port(&self) -> u16 {
        self.postgres_port
    }
    pub fn backend_port(&self) -> u16 {
        self.backend_port
    }
    pub fn frontend_port(&self) -> u16 {
        self.frontend_port
    }
    pub fn next_public_api_url(&self) -> &str {
        &self.next_public_api_url
    }
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    /// The environment of the generated stack, keyed in [`ENV_KEYS`] order.
    pub fn env_vars(&self) -> IndexMap<&'static str, String> {
        let mut vars = IndexMap::with_capacity(ENV_KEYS.len());

        vars.insert("POSTGRES_USER", self.postgres_user.clone());
        vars.insert("POSTGRES_PASSWORD", self.postgres_password.clone());
        vars.insert("POSTGRES_DB", self.postgres_db.clone());
        vars.insert("POSTGRES_PORT", self.postgres_port.to_string());
        vars.insert("BACKEND_PORT", self.backend_port.to_string());
        vars.insert("FRONTEND_PORT", self.frontend_port.to_string());
        vars.insert("NEXT_PUBLIC_API_URL", self.next_public_api_url.clone());
        vars.insert("CORS_ORIGINS", self.cors_origins.join(","));
        vars.insert("NEXT_TELEMETRY_DISABLED", NEXT_TELEMETRY_DISABLED.to_string());

        vars
    }
}

/// The single immutable record every content producer reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    root: PathBuf,
    overwrite: OverwritePolicy,
    settings: Settings,
}
impl Configuration {
    pub fn new(root: impl Into<PathBuf>, overwrite: OverwritePolicy, settings: Settings) -> Self {
        Self {
            root: root.into(),
            overwrite,
            settings,
        }
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    pub fn overwrite(&self) -> OverwritePolicy {
        self.overwrite
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Builds the [`Configuration`] for one run.
///
/// Precedence, highest first: `raw.assignments`, `file_overrides`, fixed defaults. A relative
/// root is taken relative to `working_dir`. Nothing is read from or written to disk here.
pub fn resolve(
    raw: &RawArgs,
    working_dir: &Path,
    file_overrides: Overrides,
) -> Result<Configuration, ConfigError> {
    let root = resolve_root(raw.root.as_deref(), working_dir)?;

    let cli_overrides = Overrides::from_assignments(&raw.assignments)?;

    let settings = Settings::from_overrides(&file_overrides.merge(cli_overrides))?;

    let overwrite = OverwritePolicy::from(raw.force);

    log::debug!(
        "resolved root: {}, overwrite: {:?}",
        root.display(),
        overwrite
    );

    Ok(Configuration {
        root,
        overwrite,
        settings,
    })
}

fn resolve_root(root: Option<&OsStr>, working_dir: &Path) -> Result<PathBuf, ConfigError> {
    let Some(root) = root else {
        return Ok(normalize_path(working_dir));
    };

    if root.is_empty() {
        return Err(ConfigError::InvalidRoot {
            root: String::new(),
            reason: "path is empty",
        });
    }

    if root.as_encoded_bytes().contains(&0) {
        return Err(ConfigError::InvalidRoot {
            root: root.to_string_lossy().into_owned(),
            reason: "path contains a NUL byte",
        });
    }

    let root = Path::new(root);

    if root.is_absolute() {
        Ok(normalize_path(root))
    } else {
        Ok(normalize_path(&working_dir.join(root)))
    }
}

/// Lexically normalizes a path without touching the filesystem.
pub fn normalize_path(input: &Path) -> PathBuf {
    let mut new_path = PathBuf::new();

    for component in input.components() {
        match component {
            // Skip the current-dir marker "."
            Component::CurDir => {}

            // For "..", pop the last component if possible
            Component::ParentDir => {
                new_path.pop();
            }

            other => new_path.push(other.as_os_str()),
        }
    }

    new_path
}

fn public_api_url(backend_port: u16) -> String {
    format!("http://{}:{}", PUBLIC_API_HOST, backend_port)
}

fn text_value(key: &str, value: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "value is empty",
        });
    }

    if value.chars().any(char::is_control) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "value contains control characters",
        });
    }

    if value.contains(RESERVED_CHARS) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "value contains a quote, backslash, backtick or '$'",
        });
    }

    Ok(value.to_string())
}

fn port_value(key: &str, value: &str) -> Result<u16, ConfigError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn origins_value(key: &str, value: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = text_value(key, value)?
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect();

    if origins.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "no origins listed",
        });
    }

    Ok(origins)
}

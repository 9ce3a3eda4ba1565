//! Profiles and credential resolution for pbxctl.
//!
//! TOML profiles merged with `PBXCTL_*` environment overrides, an AMI
//! password chain (env + keyring + plaintext), and translation to
//! `pbxctl_core::PbxConfig`. The CLI layers its own flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use pbxctl_ami::{ManagerConfig, ReconnectPolicy};
use pbxctl_core::PbxConfig;
use pbxctl_core::config::DEFAULT_AMI_PORT;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keyring service name for stored AMI passwords.
pub const KEYRING_SERVICE: &str = "pbxctl";

/// Fallback environment variable for the AMI password.
pub const PASSWORD_ENV: &str = "AMI_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no AMI password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found in {}", .path.display())]
    UnknownProfile { profile: String, path: PathBuf },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named switch profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: the requested one, else `default_profile`,
    /// else `"default"`.
    pub fn profile_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }

    /// Look up a profile. A missing `"default"` profile yields the built-in
    /// defaults so the tool works without a config file; any other missing
    /// name is an error.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == "default" => Ok(Profile::default()),
            None => Err(ConfigError::UnknownProfile {
                profile: name.into(),
                path: config_path(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Connect + login timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named switch profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default = "default_host")]
    pub ami_host: String,

    #[serde(default = "default_port")]
    pub ami_port: u16,

    #[serde(default = "default_username")]
    pub username: String,

    /// AMI secret (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the AMI secret.
    pub password_env: Option<String>,

    /// Directory holding the switch config files.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Record store snapshot. `~` is expanded.
    pub data_file: Option<PathBuf>,

    #[serde(default)]
    pub sip_trace_enabled: bool,

    pub reconnect_initial_secs: Option<u64>,
    pub reconnect_max_secs: Option<u64>,
    pub reconnect_max_attempts: Option<u32>,

    /// Per-action response deadline. Unset waits indefinitely.
    pub action_timeout_secs: Option<u64>,

    /// Override `defaults.timeout`.
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            ami_host: default_host(),
            ami_port: default_port(),
            username: default_username(),
            password: None,
            password_env: None,
            config_dir: default_config_dir(),
            data_file: None,
            sip_trace_enabled: false,
            reconnect_initial_secs: None,
            reconnect_max_secs: None,
            reconnect_max_attempts: None,
            action_timeout_secs: None,
            timeout: None,
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    DEFAULT_AMI_PORT
}
fn default_username() -> String {
    "admin".into()
}
fn default_config_dir() -> PathBuf {
    PathBuf::from("/etc/asterisk")
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "pbxctl")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default record store snapshot when a profile names none.
pub fn default_data_file() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share").join("records.json"),
        |dirs| dirs.data_dir().join("records.json"),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("pbxctl");
    p
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), BaseDirs::new()) {
        (Ok(rest), Some(base)) => base.home_dir().join(rest),
        _ => path.to_path_buf(),
    }
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file contributes nothing.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PBXCTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/ami-password")
}

/// Resolve the AMI password: the profile's `password_env`, then
/// `AMI_PASSWORD`, then the system keyring, then plaintext.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |user| {
            keyring::Entry::new(KEYRING_SERVICE, user)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env
    if let Some(value) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(value));
    }

    // 2. Generic env var
    if let Some(value) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(value));
    }

    // 3. System keyring
    if let Some(value) = keyring(&keyring_user(profile_name)) {
        tracing::debug!(profile = profile_name, "using keyring password");
        return Ok(SecretString::from(value));
    }

    // 4. Plaintext in config
    if let Some(ref password) = profile.password {
        return Ok(SecretString::from(password.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store the AMI password for a profile in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(password)?;
    Ok(())
}

// ── Profile → PbxConfig ─────────────────────────────────────────────

/// Whether building a [`PbxConfig`] must find a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials {
    /// Connecting to the switch: a missing password is an error.
    Required,
    /// Offline use: a missing password leaves the secret empty.
    Optional,
}

pub fn validate(profile: &Profile) -> Result<(), ConfigError> {
    if profile.ami_host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "ami_host".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.ami_port == 0 {
        return Err(ConfigError::Validation {
            field: "ami_port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }
    if profile.config_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            field: "config_dir".into(),
            reason: "must not be empty".into(),
        });
    }
    if let (Some(initial), Some(max)) = (profile.reconnect_initial_secs, profile.reconnect_max_secs)
    {
        if initial > max {
            return Err(ConfigError::Validation {
                field: "reconnect_initial_secs".into(),
                reason: format!("{initial}s exceeds reconnect_max_secs ({max}s)"),
            });
        }
    }
    Ok(())
}

fn reconnect_policy(profile: &Profile) -> ReconnectPolicy {
    let defaults = ReconnectPolicy::default();
    ReconnectPolicy {
        initial_delay: profile
            .reconnect_initial_secs
            .map_or(defaults.initial_delay, Duration::from_secs),
        max_delay: profile
            .reconnect_max_secs
            .map_or(defaults.max_delay, Duration::from_secs),
        max_attempts: profile.reconnect_max_attempts.or(defaults.max_attempts),
    }
}

/// Build a `PbxConfig` from a profile and the global defaults.
pub fn profile_to_pbx_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    credentials: Credentials,
) -> Result<PbxConfig, ConfigError> {
    validate(profile)?;

    let secret = match resolve_password(profile, profile_name) {
        Ok(secret) => secret,
        Err(ConfigError::NoCredentials { .. }) if credentials == Credentials::Optional => {
            SecretString::from(String::new())
        }
        Err(e) => return Err(e),
    };

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    let mut manager = ManagerConfig::new(profile.username.clone(), String::new());
    manager.secret = secret;
    manager.reconnect = reconnect_policy(profile);
    manager.login_timeout = timeout;
    manager.action_timeout = profile.action_timeout_secs.map(Duration::from_secs);

    Ok(PbxConfig {
        ami_host: profile.ami_host.clone(),
        ami_port: profile.ami_port,
        manager,
        connect_timeout: timeout,
        config_dir: expand_home(&profile.config_dir),
        data_file: Some(
            profile
                .data_file
                .as_deref()
                .map_or_else(default_data_file, expand_home),
        ),
        sip_trace_enabled: profile.sip_trace_enabled,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
output = "json"
timeout = 5

[profiles.lab]
ami_host = "10.0.0.5"
username = "ops"
password = "plain"
config_dir = "/srv/pbx"
data_file = "/var/lib/pbxctl/records.json"
sip_trace_enabled = true
reconnect_initial_secs = 1
reconnect_max_secs = 8
reconnect_max_attempts = 3
action_timeout_secs = 20
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn loads_profiles_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;

            assert_eq!(cfg.profile_name(None), "lab");
            assert_eq!(cfg.defaults.output, "json");
            let lab = cfg.profile("lab").map_err(|e| e.to_string())?;
            assert_eq!(lab.ami_host, "10.0.0.5");
            assert_eq!(lab.ami_port, 5038);
            assert_eq!(lab.username, "ops");
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("PBXCTL_PROFILES__LAB__AMI_PORT", "6038");
            jail.set_env("PBXCTL_DEFAULTS__TIMEOUT", "3");
            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;

            assert_eq!(cfg.profiles["lab"].ami_port, 6038);
            assert_eq!(cfg.defaults.timeout, 3);
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_| {
            let cfg = load_config_from(Path::new("absent.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.profile_name(None), "default");
            assert_eq!(cfg.defaults.timeout, 10);
            assert!(cfg.profiles.is_empty());
            Ok(())
        });
    }

    #[test]
    fn default_profile_exists_implicitly() {
        let cfg = Config::default();
        let profile = cfg.profile("default").unwrap();
        assert_eq!(profile.ami_host, "localhost");
        assert!(matches!(
            cfg.profile("staging"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn password_chain_order() {
        let profile = Profile {
            password_env: Some("LAB_SECRET".into()),
            password: Some("plain".into()),
            ..Profile::default()
        };
        let all_env = |name: &str| Some(format!("env:{name}"));
        let keyring = |user: &str| Some(format!("keyring:{user}"));

        let secret = resolve_password_with(&profile, "lab", all_env, keyring).unwrap();
        assert_eq!(secret.expose_secret(), "env:LAB_SECRET");

        let generic_only = |name: &str| (name == PASSWORD_ENV).then(|| "generic".to_owned());
        let secret = resolve_password_with(&profile, "lab", generic_only, keyring).unwrap();
        assert_eq!(secret.expose_secret(), "generic");

        let secret = resolve_password_with(&profile, "lab", no_env, keyring).unwrap();
        assert_eq!(secret.expose_secret(), "keyring:lab/ami-password");

        let secret = resolve_password_with(&profile, "lab", no_env, no_env).unwrap();
        assert_eq!(secret.expose_secret(), "plain");
    }

    #[test]
    fn missing_password_is_reported() {
        let err = resolve_password_with(&Profile::default(), "lab", no_env, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { profile } if profile == "lab"));
    }

    #[test]
    fn profile_translates_to_pbx_config() {
        let profile = Profile {
            ami_host: "10.0.0.5".into(),
            password: Some("plain".into()),
            config_dir: "/srv/pbx".into(),
            data_file: Some("/var/lib/pbxctl/records.json".into()),
            sip_trace_enabled: true,
            reconnect_initial_secs: Some(1),
            reconnect_max_secs: Some(8),
            reconnect_max_attempts: Some(3),
            action_timeout_secs: Some(20),
            timeout: Some(4),
            ..Profile::default()
        };
        let config =
            profile_to_pbx_config(&profile, "lab", &Defaults::default(), Credentials::Optional)
                .unwrap();

        assert_eq!(config.ami_target(), "10.0.0.5:5038");
        assert_eq!(config.config_dir, PathBuf::from("/srv/pbx"));
        assert_eq!(
            config.data_file,
            Some(PathBuf::from("/var/lib/pbxctl/records.json"))
        );
        assert!(config.sip_trace_enabled);
        assert_eq!(config.connect_timeout, Duration::from_secs(4));
        assert_eq!(
            config.manager.reconnect.initial_delay,
            Duration::from_secs(1)
        );
        assert_eq!(config.manager.reconnect.max_delay, Duration::from_secs(8));
        assert_eq!(config.manager.reconnect.max_attempts, Some(3));
        assert_eq!(config.manager.action_timeout, Some(Duration::from_secs(20)));
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let profile = Profile {
            reconnect_initial_secs: Some(60),
            reconnect_max_secs: Some(30),
            ..Profile::default()
        };
        let err =
            profile_to_pbx_config(&profile, "lab", &Defaults::default(), Credentials::Optional)
                .unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { field, .. } if field == "reconnect_initial_secs")
        );
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_home(Path::new("~/pbx/records.json"));
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("pbx/records.json"));
        assert_eq!(
            expand_home(Path::new("/abs/records.json")),
            PathBuf::from("/abs/records.json")
        );
    }

    #[test]
    fn saved_config_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                ami_host: "pbx.local".into(),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("ami_host = \"pbx.local\""));
        let reloaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(reloaded.profiles["default"].ami_host, "pbx.local");
    }
}

//! CLI configuration: thin wrapper around `pbxctl_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--ami-host, --config-dir, --data-file, ...).

use clap::ValueEnum;
use secrecy::SecretString;

use pbxctl_config::ConfigError;
use pbxctl_core::PbxConfig;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use pbxctl_config::{
    Config, Credentials, Profile, config_path, load_config, load_config_or_default, save_config,
    store_password, validate,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref()).to_owned()
}

/// Comma-separated profile names, for error help.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    names.sort();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// The active profile with CLI flag overrides applied.
pub fn active_profile(global: &GlobalOpts, config: &Config) -> Result<Profile, CliError> {
    let name = active_profile_name(global, config);
    let mut profile = config.profile(&name).map_err(|e| match e {
        ConfigError::UnknownProfile { profile, .. } => CliError::ProfileNotFound {
            name: profile,
            available: available_profiles(config),
        },
        other => other.into(),
    })?;

    if let Some(ref host) = global.ami_host {
        profile.ami_host.clone_from(host);
    }
    if let Some(port) = global.ami_port {
        profile.ami_port = port;
    }
    if let Some(ref user) = global.ami_user {
        profile.username.clone_from(user);
    }
    if let Some(ref dir) = global.config_dir {
        profile.config_dir.clone_from(dir);
    }
    if let Some(ref file) = global.data_file {
        profile.data_file = Some(file.clone());
    }
    if let Some(secs) = global.connect_timeout {
        profile.timeout = Some(secs);
    }
    Ok(profile)
}

/// Translate the active profile + global flags into a `PbxConfig`.
///
/// `--ami-password` beats every other credential source.
pub fn resolve_pbx_config(
    global: &GlobalOpts,
    config: &Config,
    credentials: Credentials,
) -> Result<PbxConfig, CliError> {
    let name = active_profile_name(global, config);
    let profile = active_profile(global, config)?;

    let credentials = if global.ami_password.is_some() {
        Credentials::Optional
    } else {
        credentials
    };
    let mut pbx_config =
        pbxctl_config::profile_to_pbx_config(&profile, &name, &config.defaults, credentials)?;

    if let Some(ref password) = global.ami_password {
        pbx_config.manager.secret = SecretString::from(password.clone());
    }
    Ok(pbx_config)
}

/// `--output`, else `defaults.output` from the file, else table.
pub fn output_format(global: &GlobalOpts, config: &Config) -> Result<OutputFormat, CliError> {
    if let Some(ref format) = global.output {
        return Ok(format.clone());
    }
    let configured = &config.defaults.output;
    <OutputFormat as ValueEnum>::from_str(configured, true).map_err(|_| CliError::Validation {
        field: "defaults.output".into(),
        reason: format!("expected table, json, json-compact, yaml or plain, got '{configured}'"),
    })
}

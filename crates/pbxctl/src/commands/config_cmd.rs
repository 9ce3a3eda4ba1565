//! `pbxctl config`: setup wizard, redacted display, keyring secrets.

use std::fmt::Write as _;
use std::path::PathBuf;

use dialoguer::{Input, Password, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking secrets.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "ami_host = \"{}\"", p.ami_host);
        let _ = writeln!(out, "ami_port = {}", p.ami_port);
        let _ = writeln!(out, "username = \"{}\"", p.username);
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"{REDACTED}\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        let _ = writeln!(out, "config_dir = \"{}\"", p.config_dir.display());
        if let Some(ref file) = p.data_file {
            let _ = writeln!(out, "data_file = \"{}\"", file.display());
        }
        let _ = writeln!(out, "sip_trace_enabled = {}", p.sip_trace_enabled);
        for (key, value) in [
            ("reconnect_initial_secs", p.reconnect_initial_secs),
            ("reconnect_max_secs", p.reconnect_max_secs),
            ("action_timeout_secs", p.action_timeout_secs),
            ("timeout", p.timeout),
        ] {
            if let Some(v) = value {
                let _ = writeln!(out, "{key} = {v}");
            }
        }
        if let Some(n) = p.reconnect_max_attempts {
            let _ = writeln!(out, "reconnect_max_attempts = {n}");
        }
    }

    out.trim_end().to_owned()
}

/// Same config with plaintext passwords masked, for structured output.
fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}

/// Prompt I/O failures surface as a usage error.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password() -> Result<String, CliError> {
    let password = Password::new()
        .with_prompt("AMI secret")
        .interact()
        .map_err(prompt_err)?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "the AMI secret cannot be empty".into(),
        });
    }
    Ok(password)
}

/// Store the secret in the keyring, or hand it back for the config file.
fn prompt_password_storage(
    profile_name: &str,
    password: String,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the AMI secret?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_password(profile_name, &password)?;
        eprintln!("   ✓ secret stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password))
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("pbxctl configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let mut cfg = config::load_config_or_default();

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let defaults = Profile::default();
            let ami_host: String = Input::new()
                .with_prompt("Manager host")
                .default(defaults.ami_host.clone())
                .interact_text()
                .map_err(prompt_err)?;

            let ami_port: u16 = Input::new()
                .with_prompt("Manager port")
                .default(defaults.ami_port)
                .interact_text()
                .map_err(prompt_err)?;

            let username: String = Input::new()
                .with_prompt("Manager username")
                .default(defaults.username.clone())
                .interact_text()
                .map_err(prompt_err)?;

            let password = prompt_password_storage(&profile_name, prompt_password()?)?;

            let config_dir: String = Input::new()
                .with_prompt("Switch config directory")
                .default(defaults.config_dir.display().to_string())
                .interact_text()
                .map_err(prompt_err)?;

            let profile = Profile {
                ami_host,
                ami_port,
                username,
                password,
                config_dir: PathBuf::from(config_dir),
                ..defaults
            };
            config::validate(&profile)?;

            cfg.profiles.insert(profile_name.clone(), profile);
            if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
                cfg.default_profile = Some(profile_name.clone());
            }

            let written = config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", written.display());
            eprintln!("  Profile: {profile_name}");
            eprintln!("\n  Test it: pbxctl status");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(config::load_config()?);
            let format = config::output_format(global, &cfg)?;
            let out = output::render_single(&format, &cfg, format_config_redacted, |c| {
                c.profile_name(None).to_owned()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── Set-password ────────────────────────────────────────────
        ConfigCommand::SetPassword => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let password = prompt_password()?;
            config::store_password(&profile_name, &password)?;
            output::success(
                &format!("AMI secret for profile '{profile_name}' stored in system keyring"),
                &global.color,
                global.quiet,
            );
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with_secret() -> Config {
        let mut profiles = HashMap::new();
        profiles.insert(
            "lab".to_owned(),
            Profile {
                password: Some("hunter2".into()),
                password_env: Some("LAB_SECRET".into()),
                ..Profile::default()
            },
        );
        Config {
            default_profile: Some("lab".into()),
            profiles,
            ..Config::default()
        }
    }

    #[test]
    fn table_view_masks_password() {
        let text = format_config_redacted(&config_with_secret());
        assert!(text.contains("[profiles.lab]"));
        assert!(text.contains("password = \"****\""));
        assert!(text.contains("password_env = \"LAB_SECRET\""));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn structured_view_masks_password() {
        let cfg = redacted(config_with_secret());
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("hunter2"));
        assert_eq!(cfg.profiles["lab"].password.as_deref(), Some("****"));
    }
}

//! CLI configuration: thin wrapper around `homelink_config`.
//!
//! Layers `GlobalOpts` flag overrides (--controller, --username, ...) on
//! top of the active profile before translating to a `ControllerConfig`.

use std::io::{self, IsTerminal};

use homelink_config::{ConfigError, Profile};
use homelink_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use homelink_config::{Config, config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Build a `ControllerConfig` from the config file, profile, and CLI overrides.
pub fn build_controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = load_config_or_default();
    resolve(global, &cfg)
}

fn resolve(global: &GlobalOpts, cfg: &Config) -> Result<ControllerConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let base = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        // An explicit --profile must exist.
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: cfg.available_profiles(),
            });
        }
        None if global.controller.is_some() => Profile::default(),
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    let mut profile = apply_overrides(base, global);
    prompt_for_missing_password(&mut profile, &profile_name)?;

    Ok(homelink_config::profile_to_controller_config(
        &profile,
        &profile_name,
        &cfg.defaults,
    )?)
}

/// Flag > env > profile.
fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref url) = global.controller {
        profile.controller.clone_from(url);
    }
    if global.username.is_some() {
        profile.username.clone_from(&global.username);
    }
    if global.role.is_some() {
        profile.role.clone_from(&global.role);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    profile
}

/// Ask on the terminal when no stored password can be found.
fn prompt_for_missing_password(profile: &mut Profile, profile_name: &str) -> Result<(), CliError> {
    if !io::stdin().is_terminal() {
        return Ok(());
    }
    if let Err(ConfigError::NoCredentials { .. }) =
        homelink_config::resolve_password(profile, profile_name)
    {
        let user = profile.username.as_deref().unwrap_or("controller");
        let password = rpassword::prompt_password(format!("Password for {user}: "))?;
        profile.password = Some(password);
    }
    Ok(())
}

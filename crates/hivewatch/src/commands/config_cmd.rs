//! Config subcommand handlers.

use std::io::{BufRead, IsTerminal};

use dialoguer::{Input, Select};

use hivewatch_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Use `value` if given, else prompt. Without a terminal the value is
/// required.
fn value_or_prompt(
    value: Option<String>,
    field: &str,
    prompt: &str,
    default: Option<&str>,
) -> Result<String, CliError> {
    if let Some(value) = value {
        return Ok(value);
    }
    if !interactive() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: format!("--{} is required when not running interactively", field.replace('_', "-")),
        });
    }
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_owned());
    }
    input.interact_text().map_err(prompt_err)
}

/// Read a token from the terminal without echo, or one line from a pipe.
fn read_token() -> Result<String, CliError> {
    let token = if interactive() {
        rpassword::prompt_password("API token: ").map_err(prompt_err)?
    } else {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line
    };
    Ok(token.trim().to_owned())
}

/// Store `token` for `profile_name`, in the keyring unless `plaintext`.
fn store_token(
    cfg: &mut Config,
    profile_name: &str,
    token: String,
    plaintext: bool,
) -> Result<(), CliError> {
    if plaintext {
        if let Some(profile) = cfg.profiles.get_mut(profile_name) {
            profile.token = Some(token);
        }
    } else {
        hivewatch_config::store_token(profile_name, &token)?;
        eprintln!("   ✓ API token stored in system keyring");
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(init) => handle_init(init, global),

        ConfigCommand::Show => {
            let mut cfg = config::load(global)?;
            for profile in cfg.profiles.values_mut() {
                if profile.token.is_some() {
                    profile.token = Some(REDACTED.into());
                }
            }
            let path = config::config_file(global);
            let out = output::render_single(
                global.output,
                &cfg,
                |c| {
                    let body = toml::to_string_pretty(c)
                        .unwrap_or_else(|e| format!("# failed to render config: {e}\n"));
                    format!("# {}\n{body}", path.display())
                },
                |_| path.display().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { plaintext } => {
            let mut cfg = config::load(global)?;
            let name = match cfg.profile(global.profile.as_deref()) {
                Ok((name, _)) => name.to_owned(),
                Err(hivewatch_config::ConfigError::UnknownProfile { name }) => {
                    return Err(config::profile_not_found(&cfg, name));
                }
                Err(e) => return Err(e.into()),
            };

            let token = read_token()?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "API token cannot be empty".into(),
                });
            }

            store_token(&mut cfg, &name, token, plaintext)?;
            if plaintext {
                config::save(global, &cfg)?;
            }
            if !global.quiet {
                eprintln!("Token saved for profile '{name}'");
            }
            Ok(())
        }
    }
}

fn handle_init(args: ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);
    let mut cfg = config::load(global)?;

    if interactive() && global.output == OutputFormat::Table {
        eprintln!("hivewatch configuration");
        eprintln!("   Config path: {}\n", path.display());
    }

    let profile_name = match global.profile.clone() {
        Some(name) => name,
        None if interactive() => value_or_prompt(None, "profile", "Profile name", Some("default"))?,
        None => "default".to_owned(),
    };
    let api_url = value_or_prompt(
        args.api_url,
        "api_url",
        "Sensor API URL",
        Some("https://api.hivewatch.dev/v1"),
    )?;
    let feed_url = value_or_prompt(
        args.feed_url,
        "feed_url",
        "Event feed URL",
        Some("wss://feed.hivewatch.dev/events"),
    )?;
    let owner = value_or_prompt(args.owner, "owner", "Owner id", None)?;

    let mut profile = cfg.profiles.remove(&profile_name).unwrap_or_default();
    profile.api_url = api_url;
    profile.feed_url = feed_url;
    profile.owner = owner;
    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }

    hivewatch_config::check_profile(&cfg, &profile_name)?;

    if !args.no_token && interactive() {
        let token = read_token()?;
        if !token.is_empty() {
            let choices = &[
                "Store in system keyring (recommended)",
                "Save to config file (plaintext)",
            ];
            let selection = Select::new()
                .with_prompt("Where to store the API token?")
                .items(choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;
            store_token(&mut cfg, &profile_name, token, selection == 1)?;
        }
    }

    config::save(global, &cfg)?;
    if !global.quiet {
        eprintln!("Profile '{profile_name}' saved to {}", path.display());
    }
    Ok(())
}

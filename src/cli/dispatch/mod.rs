use crate::cli::{
    actions::{signup::Args, Action},
    commands::{ARG_API_URL, ARG_CODE_TTL, ARG_TIMEOUT, CMD_SIGNUP},
};
use crate::config::{DEFAULT_CODE_TTL_SECS, DEFAULT_TIMEOUT_SECS};
use anyhow::{anyhow, Context, Result};

/// # Errors
/// Returns an error if the subcommand is unknown or required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand_name() {
        Some(CMD_SIGNUP) => {
            let api_url = matches
                .get_one::<String>(ARG_API_URL)
                .cloned()
                .context("missing required argument: --api-url")?;
            let timeout = matches
                .get_one::<u64>(ARG_TIMEOUT)
                .copied()
                .unwrap_or(DEFAULT_TIMEOUT_SECS);
            let code_ttl = matches
                .get_one::<u64>(ARG_CODE_TTL)
                .copied()
                .unwrap_or(DEFAULT_CODE_TTL_SECS);

            Ok(Action::Signup(Args {
                api_url,
                timeout,
                code_ttl,
            }))
        }
        Some(other) => Err(anyhow!("unknown command: {other}")),
        None => Err(anyhow!("missing command")),
    }
}

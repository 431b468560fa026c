//! Interactive terminal driver for the signup flow.
//!
//! Registration fields are prompted one per line. During verification the
//! driver waits on whichever comes first: a line of input or a countdown tick.

use crate::{
    api::{ApiClient, Channel},
    config::{ApiConfig, FlowSettings},
    signup::{FlowError, FlowState, FormField, ResendOutcome, SignupFlow, CODE_LENGTH},
};
use anyhow::{Context, Result};
use std::{io::Write, time::Duration};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info};

const BACKSPACE: char = '<';

#[derive(Debug)]
pub struct Args {
    pub api_url: String,
    pub timeout: u64,
    pub code_ttl: u64,
}

/// Run the signup flow on the terminal.
///
/// # Errors
/// Returns an error if the API URL is invalid, the HTTP client cannot be built
/// or stdin closes before the account is verified.
pub async fn execute(args: Args) -> Result<()> {
    let config = ApiConfig::new(&args.api_url, Duration::from_secs(args.timeout))?;
    let api = ApiClient::new(&config)?;

    let settings = FlowSettings {
        code_ttl: Duration::from_secs(args.code_ttl),
        ..FlowSettings::default()
    };

    info!("signing up against {}", config.base_url);

    let mut flow = SignupFlow::new(api, settings);
    let mut stdout = std::io::stdout();

    drive(&mut flow, BufReader::new(tokio::io::stdin()), &mut stdout).await
}

/// Runs `flow` to completion reading answers from `input`.
///
/// # Errors
/// Returns an error if `input` ends before the flow completes or `out` fails.
pub async fn drive<R, W>(flow: &mut SignupFlow, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        match flow.state() {
            FlowState::Signup => registration(flow, &mut lines, out).await?,
            FlowState::VerifyEmail | FlowState::VerifyPhone => {
                verification(flow, &mut lines, out).await?;
            }
            FlowState::Complete => {
                writeln!(out, "Your account is verified. Welcome to EatRite!")?;
                return Ok(());
            }
        }
    }
}

async fn read_line<R>(lines: &mut Lines<R>) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    lines
        .next_line()
        .await?
        .context("input closed before signup finished")
}

async fn registration<R, W>(flow: &mut SignupFlow, lines: &mut Lines<R>, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let errors = flow.registration().errors();

    // after a failed validation only the offending fields are asked again
    let prompts: Vec<(FormField, Option<String>)> = if errors.is_empty() {
        FormField::ALL.iter().map(|field| (*field, None)).collect()
    } else {
        errors
            .iter()
            .map(|(field, message)| (field, Some(message.to_string())))
            .collect()
    };

    for (field, error) in prompts {
        if let Some(error) = error {
            writeln!(out, "  {error}")?;
        }
        if field == FormField::AcceptTerms {
            write!(out, "{} [y/N]: ", field.label())?;
        } else {
            write!(out, "{}: ", field.label())?;
        }
        out.flush()?;

        let answer = read_line(lines).await?;
        flow.edit(field, &answer)?;
    }

    match flow.submit_registration().await {
        Ok(_) => {}
        Err(FlowError::Validation(errors)) => {
            writeln!(out, "Please fix {} field(s):", errors.len())?;
        }
        Err(err) => {
            writeln!(out, "{err}")?;
        }
    }

    Ok(())
}

async fn verification<R, W>(flow: &mut SignupFlow, lines: &mut Lines<R>, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let stage = flow.state();
    let Some(session_id) = flow.session().map(|session| session.id()) else {
        return Ok(());
    };

    announce(flow, out)?;

    while flow.state() == stage && flow.session().map(|session| session.id()) == Some(session_id) {
        tokio::select! {
            line = lines.next_line() => {
                let line = line?.context("input closed before signup finished")?;
                command(flow, line.trim(), out).await?;
            }
            Some(tick) = flow.next_tick() => {
                if flow.apply_tick(tick) {
                    report_tick(flow, out)?;
                }
            }
        }
    }

    Ok(())
}

fn announce<W: Write>(flow: &SignupFlow, out: &mut W) -> Result<()> {
    let Some(session) = flow.session() else {
        return Ok(());
    };

    let medium = match session.channel() {
        Channel::Email => "email",
        Channel::Phone => "phone",
    };

    writeln!(
        out,
        "Enter the {CODE_LENGTH}-digit code sent to your {medium} {} (expires in {}).",
        session.target(),
        clock(session.remaining())
    )?;
    writeln!(out, "Type `resend` for a new code or `back` to go back.")?;

    Ok(())
}

fn report_tick<W: Write>(flow: &SignupFlow, out: &mut W) -> Result<()> {
    let Some(session) = flow.session() else {
        return Ok(());
    };

    match session.remaining() {
        0 => writeln!(out, "The code has expired. Type `resend` for a new one.")?,
        remaining if remaining % 60 == 0 => {
            writeln!(out, "Code expires in {}.", clock(remaining))?;
        }
        _ => {}
    }

    Ok(())
}

async fn command<W: Write>(flow: &mut SignupFlow, input: &str, out: &mut W) -> Result<()> {
    match input {
        "" => {}
        "resend" => match flow.resend().await {
            Ok(ResendOutcome::Sent) => {
                // the new session is announced when the stage loop restarts
                writeln!(out, "A new code is on its way.")?;
            }
            Ok(ResendOutcome::Unavailable) => {
                let remaining = flow.session().map_or(0, |session| session.remaining());
                writeln!(
                    out,
                    "You can ask for a new code once this one expires ({} left).",
                    clock(remaining)
                )?;
            }
            Err(err) => writeln!(out, "{err}")?,
        },
        "back" => {
            let state = flow.back()?;
            if state == FlowState::Signup {
                writeln!(out, "Back to registration. Review your details.")?;
            }
        }
        _ => keystrokes(flow, input, out).await?,
    }

    Ok(())
}

async fn keystrokes<W: Write>(flow: &mut SignupFlow, input: &str, out: &mut W) -> Result<()> {
    let stage = flow.state();

    let digits = input.chars().filter(char::is_ascii_digit).count();
    let result = if digits == CODE_LENGTH && !input.contains(BACKSPACE) {
        flow.submit_code(input).await
    } else {
        type_chars(flow, input).await
    };

    match result {
        Ok(state) if state != stage => debug!("stage {} finished", stage),
        Ok(_) => {
            if let Some(session) = flow.session() {
                writeln!(out, "Code: {}", session.code())?;
            }
        }
        Err(err) => writeln!(out, "{err}")?,
    }

    Ok(())
}

async fn type_chars(flow: &mut SignupFlow, input: &str) -> Result<FlowState, FlowError> {
    let stage = flow.state();

    for c in input.chars() {
        let Some(code) = flow.session().map(|session| session.code().clone()) else {
            break;
        };
        let focus = code.focus();

        if c == BACKSPACE {
            flow.backspace(focus)?;
            // an empty slot only moves the focus left, so clear the previous one too
            if code.slot(focus).is_none() && focus > 0 {
                flow.backspace(focus - 1)?;
            }
        } else if c.is_ascii_digit() {
            let state = flow.enter_digit(focus, &c.to_string()).await?;
            if state != stage {
                return Ok(state);
            }
        }
    }

    Ok(flow.state())
}

fn clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

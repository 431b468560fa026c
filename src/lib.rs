//! # EatRite (account signup and verification)
//!
//! `eatrite` drives the account signup flow for the EatRite meal-delivery service:
//! a registration form is validated locally, the account is created through the
//! users API, and ownership of the email address and phone number is then proven
//! with two sequential one-time passcodes.
//!
//! ## Flow
//!
//! `signup → verify-email → verify-phone → complete`
//!
//! - **Registration:** [`signup::form::validate`] is a pure function returning a typed
//!   map of field errors. No request is sent while it reports errors.
//! - **Verification:** [`signup::controller::VerificationController`] owns the single
//!   active [`signup::session::VerificationSession`], its six-slot code input and a
//!   one-second countdown task. Ticks and late responses carry the session generation
//!   and are dropped when they do not match the active session.
//! - **Best-effort sends:** code delivery after signup and after email verification is
//!   typed as [`signup::best_effort::BestEffort`]; failures are logged and never block
//!   a transition.
//!
//! Passwords, OTP codes and full contact targets are never logged.

pub mod api;
pub mod cli;
pub mod config;
pub mod signup;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with("eatrite/"));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}

use super::{flow::FlowState, form::FieldErrors};
use thiserror::Error;

pub const SIGNUP_FALLBACK: &str = "Signup failed, please try again";
pub const VERIFY_FALLBACK: &str = "Verification failed, please try again";
pub const RESEND_FALLBACK: &str = "Resend failed, please try again";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    /// Local form validation failed; nothing was sent.
    #[error("{} field(s) need attention", .0.len())]
    Validation(FieldErrors),
    /// The API refused to create the account.
    #[error("{0}")]
    Submission(String),
    #[error("{0}")]
    VerificationRejected(String),
    #[error("Verification code expired, request a new one")]
    ExpiredCode,
    #[error("{0}")]
    ResendFailed(String),
    #[error("Enter all 6 digits of the code")]
    IncompleteCode,
    #[error("A request is already in progress")]
    Busy,
    #[error("No verification in progress")]
    NoActiveSession,
    /// A response arrived for a session that has since been replaced.
    #[error("Verification session was replaced")]
    Stale,
    #[error("Not available while in state {0}")]
    InvalidState(FlowState),
}

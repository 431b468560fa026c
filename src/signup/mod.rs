//! Signup and two-stage contact verification.

pub mod best_effort;
pub mod controller;
pub mod countdown;
pub mod error;
pub mod flow;
pub mod form;
pub mod otp;
pub mod registration;
pub mod session;

pub use self::controller::{ResendOutcome, VerificationController};
pub use self::error::FlowError;
pub use self::flow::{FlowState, SignupFlow};
pub use self::form::{validate, FieldErrors, FormField, RegistrationForm};
pub use self::otp::{OtpInput, CODE_LENGTH};
pub use self::registration::{Contact, RegistrationStep};
pub use self::session::{StageStatus, VerificationSession};

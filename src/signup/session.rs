use super::otp::OtpInput;
use crate::api::{mask_target, Channel};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    Entering,
    AwaitingInput,
    Submitting,
    Verified,
    Rejected,
    Expired,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entering => "entering",
            Self::AwaitingInput => "awaiting-input",
            Self::Submitting => "submitting",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// One in-progress code challenge on one channel.
#[derive(Clone, Debug)]
pub struct VerificationSession {
    id: u64,
    channel: Channel,
    target: String,
    pub(crate) code: OtpInput,
    expires_at: DateTime<Utc>,
    remaining: u64,
    attempts_error: Option<String>,
    resend_available: bool,
    resend_in_flight: bool,
    status: StageStatus,
}

impl VerificationSession {
    /// Opens a session that lives for `ttl_ticks` countdown ticks.
    #[must_use]
    pub fn new(
        id: u64,
        channel: Channel,
        target: String,
        expires_at: DateTime<Utc>,
        ttl_ticks: u64,
    ) -> Self {
        let mut session = Self {
            id,
            channel,
            target,
            code: OtpInput::new(),
            expires_at,
            remaining: ttl_ticks,
            attempts_error: None,
            resend_available: false,
            resend_in_flight: false,
            status: StageStatus::Entering,
        };
        session.status = if ttl_ticks == 0 {
            session.resend_available = true;
            StageStatus::Expired
        } else {
            StageStatus::AwaitingInput
        };
        session
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn masked_target(&self) -> String {
        mask_target(self.channel, &self.target)
    }

    #[must_use]
    pub fn code(&self) -> &OtpInput {
        &self.code
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Countdown ticks left before the code expires.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    #[must_use]
    pub fn attempts_error(&self) -> Option<&str> {
        self.attempts_error.as_deref()
    }

    #[must_use]
    pub fn resend_available(&self) -> bool {
        self.resend_available
    }

    #[must_use]
    pub fn resend_in_flight(&self) -> bool {
        self.resend_in_flight
    }

    #[must_use]
    pub fn status(&self) -> StageStatus {
        self.status
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// Whether a correct code could still be accepted.
    #[must_use]
    pub fn can_verify(&self) -> bool {
        !self.is_expired() && self.status != StageStatus::Verified
    }

    /// Advances the countdown by one tick. Returns true on the tick that expires
    /// the session. `attempts_error` is left alone.
    pub(crate) fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }

        self.remaining -= 1;
        if self.remaining > 0 {
            return false;
        }

        self.resend_available = true;
        if self.status != StageStatus::Verified {
            self.status = StageStatus::Expired;
            self.code.set_disabled(false);
        }
        true
    }

    /// Moves a rejected session back to input once the user types again.
    pub(crate) fn resume_input(&mut self) {
        if self.status == StageStatus::Rejected {
            self.status = StageStatus::AwaitingInput;
        }
    }

    pub(crate) fn begin_submit(&mut self) {
        self.status = StageStatus::Submitting;
        self.code.set_disabled(true);
    }

    pub(crate) fn mark_verified(&mut self) {
        self.status = StageStatus::Verified;
        self.attempts_error = None;
    }

    /// Records a refused code: error shown, slots cleared, expiry untouched.
    pub(crate) fn reject(&mut self, message: String) {
        self.attempts_error = Some(message);
        self.code.set_disabled(false);
        self.code.clear();
        self.status = if self.is_expired() {
            StageStatus::Expired
        } else {
            StageStatus::Rejected
        };
    }

    pub(crate) fn set_resend_in_flight(&mut self, in_flight: bool) {
        self.resend_in_flight = in_flight;
    }

    pub(crate) fn fail_resend(&mut self, message: String) {
        self.resend_in_flight = false;
        self.attempts_error = Some(message);
    }
}

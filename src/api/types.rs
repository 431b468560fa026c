//! Request and response payloads of the users API. Signup requests carry the
//! password and verify requests carry the OTP, so neither type implements `Debug`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Contact channel a code is delivered to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Phone,
}

impl Channel {
    #[must_use]
    pub fn send_path(self) -> &'static str {
        match self {
            Self::Email => "/api/users/send-email-verification",
            Self::Phone => "/api/users/send-phone-verification",
        }
    }

    #[must_use]
    pub fn verify_path(self) -> &'static str {
        match self {
            Self::Email => "/api/users/verify-email",
            Self::Phone => "/api/users/verify-phone",
        }
    }

    #[must_use]
    pub fn resend_path(self) -> &'static str {
        match self {
            Self::Email => "/api/users/resend-email-verification",
            Self::Phone => "/api/users/resend-phone-verification",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
            Self::Phone => f.write_str("phone"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub password: &'a str,
}

/// Account info returned by a successful signup. The API is loose about the
/// shape, so every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

/// `{email}` or `{phone}` body of the send and resend endpoints.
#[derive(Serialize)]
#[serde(untagged)]
pub enum ContactRequest<'a> {
    Email { email: &'a str },
    Phone { phone: &'a str },
}

impl<'a> ContactRequest<'a> {
    #[must_use]
    pub fn new(channel: Channel, target: &'a str) -> Self {
        match channel {
            Channel::Email => Self::Email { email: target },
            Channel::Phone => Self::Phone { phone: target },
        }
    }
}

/// `{email, otp}` or `{phone, otp}` body of the verify endpoints.
#[derive(Serialize)]
#[serde(untagged)]
pub enum VerifyRequest<'a> {
    Email { email: &'a str, otp: &'a str },
    Phone { phone: &'a str, otp: &'a str },
}

impl<'a> VerifyRequest<'a> {
    #[must_use]
    pub fn new(channel: Channel, target: &'a str, otp: &'a str) -> Self {
        match channel {
            Channel::Email => Self::Email { email: target, otp },
            Channel::Phone => Self::Phone { phone: target, otp },
        }
    }
}

/// Error body sent by the API on 4xx/5xx.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

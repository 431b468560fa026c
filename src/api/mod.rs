//! JSON client for the users API. Every call is a `POST` with a JSON body; errors
//! are mapped into [`ApiError`] with the server's `{message}` preserved so the flow
//! can show it inline. Contact targets are masked before they reach the logs.

pub mod error;
pub mod types;

pub use self::error::ApiError;
pub use self::types::{Channel, SignupRequest, SignupResponse};

use self::types::{ContactRequest, ErrorBody, VerifyRequest};
use crate::{config::ApiConfig, APP_USER_AGENT};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

pub const SIGNUP_PATH: &str = "/api/users/signup";

/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    /// Builds a client with the configured timeout and the crate user agent.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// Creates the account.
    ///
    /// # Errors
    ///
    /// Returns the transport or HTTP failure; the request body is never logged.
    #[instrument(skip_all)]
    pub async fn signup(&self, request: &SignupRequest<'_>) -> Result<SignupResponse, ApiError> {
        let response = self.post_json(SIGNUP_PATH, request).await?;
        handle_json_response(response).await
    }

    /// Asks the API to deliver a code to `target`.
    ///
    /// # Errors
    ///
    /// Returns the transport or HTTP failure.
    #[instrument(skip(self, target), fields(contact = %mask_target(channel, target)))]
    pub async fn send_code(&self, channel: Channel, target: &str) -> Result<(), ApiError> {
        let body = ContactRequest::new(channel, target);
        let response = self.post_json(channel.send_path(), &body).await?;
        handle_empty_response(response).await
    }

    /// Submits `otp` for `target`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` when the server rejects the code.
    #[instrument(skip(self, target, otp), fields(contact = %mask_target(channel, target)))]
    pub async fn verify_code(
        &self,
        channel: Channel,
        target: &str,
        otp: &str,
    ) -> Result<(), ApiError> {
        let body = VerifyRequest::new(channel, target, otp);
        let response = self.post_json(channel.verify_path(), &body).await?;
        handle_empty_response(response).await
    }

    /// Asks the API to issue a fresh code for `target`.
    ///
    /// # Errors
    ///
    /// Returns the transport or HTTP failure.
    #[instrument(skip(self, target), fields(contact = %mask_target(channel, target)))]
    pub async fn resend_code(&self, channel: Channel, target: &str) -> Result<(), ApiError> {
        let body = ContactRequest::new(channel, target);
        let response = self.post_json(channel.resend_path(), &body).await?;
        handle_empty_response(response).await
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, ApiError> {
        let url = build_url(&self.base_url, path);

        debug!("POST {}", url);

        self.http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_request_error)
    }
}

/// Masks an email local part or all but the last four phone digits.
#[must_use]
pub fn mask_target(channel: Channel, target: &str) -> String {
    match channel {
        Channel::Email => match target.split_once('@') {
            Some((local, domain)) => {
                let first = local.chars().next().map(String::from).unwrap_or_default();
                format!("{first}***@{domain}")
            }
            None => "***".to_string(),
        },
        Channel::Phone => {
            let digits: Vec<char> = target.chars().filter(char::is_ascii_digit).collect();
            let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
            format!("***{tail}")
        }
    }
}

/// Joins the base URL (which may carry a path prefix) with an endpoint path.
fn build_url(base_url: &Url, path: &str) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    format!("{}/{}", base, path.trim().trim_start_matches('/'))
}

fn map_request_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout("Request timed out. Please try again.".to_string())
    } else if err.is_builder() {
        ApiError::Config(format!("Failed to build request: {err}"))
    } else {
        ApiError::Network(format!("Unable to reach the server: {err}"))
    }
}

/// Parses a JSON body. The status decides success: an empty or undecodable
/// success body yields `T::default()`.
async fn handle_json_response<T: DeserializeOwned + Default>(
    response: Response,
) -> Result<T, ApiError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let body = response
        .text()
        .await
        .map_err(|err| ApiError::Parse(format!("Failed to read response: {err}")))?;

    if body.trim().is_empty() {
        return Ok(T::default());
    }

    Ok(serde_json::from_str(&body).unwrap_or_else(|err| {
        warn!("ignoring undecodable success body: {}", err);
        T::default()
    }))
}

async fn handle_empty_response(response: Response) -> Result<(), ApiError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    ApiError::Http {
        status,
        message: extract_message(&body),
    }
}

/// Pulls `{message}` out of an error body, trimmed and truncated.
fn extract_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = parsed.message?;
    let trimmed = message.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(MAX_ERROR_CHARS).collect())
    }
}

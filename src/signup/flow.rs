//! Coarse signup flow: `signup → verify-email → verify-phone → complete`, with
//! explicit back navigation from the two verification stages.

use super::{
    best_effort::BestEffort,
    controller::{ResendOutcome, VerificationController},
    countdown::Tick,
    error::FlowError,
    form::FormField,
    otp::CODE_LENGTH,
    registration::{Contact, RegistrationStep},
    session::VerificationSession,
};
use crate::{
    api::{ApiClient, Channel},
    config::FlowSettings,
};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowState {
    Signup,
    VerifyEmail,
    VerifyPhone,
    Complete,
}

impl FlowState {
    /// Channel being verified in this state, if any.
    #[must_use]
    pub fn channel(self) -> Option<Channel> {
        match self {
            Self::VerifyEmail => Some(Channel::Email),
            Self::VerifyPhone => Some(Channel::Phone),
            Self::Signup | Self::Complete => None,
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Signup => "signup",
            Self::VerifyEmail => "verify-email",
            Self::VerifyPhone => "verify-phone",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

pub struct SignupFlow {
    state: FlowState,
    api: ApiClient,
    registration: RegistrationStep,
    controller: VerificationController,
    contact: Option<Contact>,
}

impl SignupFlow {
    #[must_use]
    pub fn new(api: ApiClient, settings: FlowSettings) -> Self {
        Self {
            state: FlowState::Signup,
            controller: VerificationController::new(api.clone(), settings),
            api,
            registration: RegistrationStep::new(),
            contact: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> FlowState {
        self.state
    }

    #[must_use]
    pub fn registration(&self) -> &RegistrationStep {
        &self.registration
    }

    #[must_use]
    pub fn session(&self) -> Option<&VerificationSession> {
        self.controller.session()
    }

    #[must_use]
    pub fn contact(&self) -> Option<&Contact> {
        self.contact.as_ref()
    }

    /// # Errors
    ///
    /// Returns `InvalidState` outside the signup step.
    pub fn edit(&mut self, field: FormField, value: &str) -> Result<(), FlowError> {
        self.expect_state(FlowState::Signup)?;
        self.registration.edit(field, value);
        Ok(())
    }

    /// Submits the registration form and opens the email stage.
    ///
    /// # Errors
    ///
    /// Returns the registration failure; the flow stays on `signup`.
    pub async fn submit_registration(&mut self) -> Result<FlowState, FlowError> {
        self.expect_state(FlowState::Signup)?;

        let contact = self.registration.submit(&self.api).await?;
        self.controller
            .enter(Channel::Email, contact.email.clone());
        self.contact = Some(contact);
        self.transition(FlowState::VerifyEmail);

        Ok(self.state)
    }

    /// Types one character into slot `index` of the active code input.
    ///
    /// # Errors
    ///
    /// Returns the verify failure when the keystroke completed a code.
    pub async fn enter_digit(&mut self, index: usize, value: &str) -> Result<FlowState, FlowError> {
        self.expect_verifying()?;

        match self.controller.enter_digit(index, value).await? {
            Some(channel) => self.advance(channel).await,
            None => Ok(self.state),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidState` outside the verification stages.
    pub fn backspace(&mut self, index: usize) -> Result<(), FlowError> {
        self.expect_verifying()?;
        self.controller.backspace(index)
    }

    /// Replaces whatever the input holds with `code`, typed slot by slot from
    /// the first one.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteCode` unless `code` holds exactly six digits, or the
    /// verify failure.
    pub async fn submit_code(&mut self, code: &str) -> Result<FlowState, FlowError> {
        self.expect_verifying()?;

        let digits: Vec<char> = code.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != CODE_LENGTH {
            return Err(FlowError::IncompleteCode);
        }

        self.controller.clear_code()?;

        for (index, digit) in digits.iter().enumerate() {
            if let Some(channel) = self
                .controller
                .enter_digit(index, &digit.to_string())
                .await?
            {
                return self.advance(channel).await;
            }
        }

        Ok(self.state)
    }

    /// # Errors
    ///
    /// Returns `ResendFailed` when the new code could not be requested.
    pub async fn resend(&mut self) -> Result<ResendOutcome, FlowError> {
        self.expect_verifying()?;
        self.controller.resend().await
    }

    /// Leaves the current verification stage for the previous step. Nothing is
    /// sent to the server.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` from `signup` and `complete`.
    pub fn back(&mut self) -> Result<FlowState, FlowError> {
        match self.state {
            FlowState::VerifyEmail => {
                self.controller.discard();
                self.transition(FlowState::Signup);
            }
            FlowState::VerifyPhone => {
                let email = self
                    .contact
                    .as_ref()
                    .map(|contact| contact.email.clone())
                    .ok_or(FlowError::InvalidState(self.state))?;
                self.controller.discard();
                self.controller.enter(Channel::Email, email);
                self.transition(FlowState::VerifyEmail);
            }
            state => return Err(FlowError::InvalidState(state)),
        }

        Ok(self.state)
    }

    pub async fn next_tick(&mut self) -> Option<Tick> {
        self.controller.next_tick().await
    }

    pub fn apply_tick(&mut self, tick: Tick) -> bool {
        self.controller.apply_tick(tick)
    }

    /// Applies one countdown tick to the active session.
    pub fn tick(&mut self) -> bool {
        self.controller.tick()
    }

    async fn advance(&mut self, verified: Channel) -> Result<FlowState, FlowError> {
        match (self.state, verified) {
            (FlowState::VerifyEmail, Channel::Email) => {
                let phone = self
                    .contact
                    .as_ref()
                    .map(|contact| contact.phone.clone())
                    .ok_or(FlowError::InvalidState(self.state))?;

                let delivery = BestEffort::run(
                    "send phone verification",
                    self.api.send_code(Channel::Phone, &phone),
                )
                .await;
                debug!("phone code delivered: {}", delivery.is_delivered());

                self.controller.enter(Channel::Phone, phone);
                self.transition(FlowState::VerifyPhone);
            }
            (FlowState::VerifyPhone, Channel::Phone) => {
                self.controller.discard();
                self.transition(FlowState::Complete);
            }
            (state, _) => return Err(FlowError::InvalidState(state)),
        }

        Ok(self.state)
    }

    fn transition(&mut self, next: FlowState) {
        info!("signup flow {} -> {}", self.state, next);
        self.state = next;
    }

    fn expect_state(&self, expected: FlowState) -> Result<(), FlowError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(FlowError::InvalidState(self.state))
        }
    }

    fn expect_verifying(&self) -> Result<(), FlowError> {
        match self.state {
            FlowState::VerifyEmail | FlowState::VerifyPhone => Ok(()),
            state => Err(FlowError::InvalidState(state)),
        }
    }
}

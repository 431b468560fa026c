//! Verification controller. Owns the single active [`VerificationSession`], its
//! countdown task and the verify/resend calls, with identical logic for the
//! email and phone channels.
//!
//! Every session gets a new generation number. Countdown ticks and verify
//! results carry the generation they were issued for and are dropped once the
//! session they belong to has been replaced or discarded.

use super::{
    countdown::{Countdown, Tick},
    error::{FlowError, RESEND_FALLBACK, VERIFY_FALLBACK},
    otp::CODE_LENGTH,
    session::{StageStatus, VerificationSession},
};
use crate::{
    api::{mask_target, ApiClient, ApiError, Channel},
    config::FlowSettings,
};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::sleep,
};
use tracing::{debug, info, instrument, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResendOutcome {
    /// A new code was requested and the session was reset.
    Sent,
    /// Resend is not available yet (or already running); nothing happened.
    Unavailable,
}

/// A verify call that has left the controller and not come back yet.
pub struct PendingVerify {
    generation: u64,
    channel: Channel,
    target: String,
    code: String,
}

impl PendingVerify {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
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
    pub fn code(&self) -> &str {
        &self.code
    }
}

pub struct VerificationController {
    api: ApiClient,
    settings: FlowSettings,
    session: Option<VerificationSession>,
    generation: u64,
    countdown: Option<Countdown>,
    tick_tx: UnboundedSender<Tick>,
    tick_rx: UnboundedReceiver<Tick>,
}

impl VerificationController {
    #[must_use]
    pub fn new(api: ApiClient, settings: FlowSettings) -> Self {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        Self {
            api,
            settings,
            session: None,
            generation: 0,
            countdown: None,
            tick_tx,
            tick_rx,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&VerificationSession> {
        self.session.as_ref()
    }

    /// Generation of the most recently created session.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Replaces any current session with a fresh one for `target` and starts
    /// its countdown.
    #[instrument(skip(self, target), fields(contact = %mask_target(channel, &target)))]
    pub fn enter(&mut self, channel: Channel, target: String) -> &VerificationSession {
        // drops (and aborts) the previous ticker before the new one starts
        self.countdown = None;
        self.generation += 1;

        let generation = self.generation;
        let ticks = self.settings.ttl_ticks();
        let session = VerificationSession::new(
            generation,
            channel,
            target,
            expiry_from_now(&self.settings),
            ticks,
        );

        if self.settings.auto_countdown && ticks > 0 {
            self.countdown = Some(Countdown::start(
                generation,
                self.settings.tick,
                ticks,
                self.tick_tx.clone(),
            ));
        }

        info!(
            "{} verification session {} expires at {}",
            channel,
            generation,
            session.expires_at()
        );

        self.session.insert(session)
    }

    /// Drops the current session without contacting the server.
    pub fn discard(&mut self) -> Option<Channel> {
        self.countdown = None;
        let session = self.session.take()?;

        debug!(
            "discarded {} verification session {}",
            session.channel(),
            session.id()
        );

        Some(session.channel())
    }

    /// Feeds a keystroke to the code input. When it completes the code the code
    /// is verified right away; `Some(channel)` means that channel is verified.
    ///
    /// # Errors
    ///
    /// Returns the verify failure, see [`Self::on_code_complete`].
    pub async fn enter_digit(
        &mut self,
        index: usize,
        value: &str,
    ) -> Result<Option<Channel>, FlowError> {
        let session = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;

        if session.code().is_disabled() {
            return Ok(None);
        }

        let completed = session.code.on_digit(index, value);
        session.resume_input();

        match completed {
            Some(code) => self.on_code_complete(&code).await.map(Some),
            None => Ok(None),
        }
    }

    /// Empties the code input, unless a verify call currently holds it.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::NoActiveSession` when no stage is active.
    pub fn clear_code(&mut self) -> Result<(), FlowError> {
        let session = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;
        if !session.code().is_disabled() {
            session.code.clear();
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `FlowError::NoActiveSession` when no stage is active.
    pub fn backspace(&mut self, index: usize) -> Result<(), FlowError> {
        let session = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;
        session.code.on_backspace(index);
        Ok(())
    }

    /// Verifies a complete code against the active session's channel.
    ///
    /// # Errors
    ///
    /// - `ExpiredCode` when the countdown already ran out (nothing is sent)
    /// - `VerificationRejected` when the server refuses the code
    /// - `Stale` when the session was replaced while the call was in flight
    pub async fn on_code_complete(&mut self, code: &str) -> Result<Channel, FlowError> {
        let pending = self.begin_verify(code)?;
        let result = self
            .api
            .verify_code(pending.channel, &pending.target, &pending.code)
            .await;
        self.finish_verify(pending, result).await
    }

    /// First half of a verify: checks the session and locks the code input.
    ///
    /// # Errors
    ///
    /// Returns `Busy`, `IncompleteCode` or `ExpiredCode` without side effects.
    pub fn begin_verify(&mut self, code: &str) -> Result<PendingVerify, FlowError> {
        let session = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;

        if matches!(
            session.status(),
            StageStatus::Submitting | StageStatus::Verified
        ) {
            return Err(FlowError::Busy);
        }

        if code.len() != CODE_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(FlowError::IncompleteCode);
        }

        if session.is_expired() {
            warn!(
                "{} code submitted after expiry (session {})",
                session.channel(),
                session.id()
            );
            return Err(FlowError::ExpiredCode);
        }

        session.begin_submit();

        Ok(PendingVerify {
            generation: session.id(),
            channel: session.channel(),
            target: session.target().to_string(),
            code: code.to_string(),
        })
    }

    /// Second half of a verify: applies the server's answer if the session it
    /// was issued for is still active.
    ///
    /// # Errors
    ///
    /// Returns `Stale` for a replaced session and `VerificationRejected` for a
    /// refused code.
    pub async fn finish_verify(
        &mut self,
        pending: PendingVerify,
        result: Result<(), ApiError>,
    ) -> Result<Channel, FlowError> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.id() == pending.generation)
        else {
            debug!(
                "discarding verify result for replaced session {}",
                pending.generation
            );
            return Err(FlowError::Stale);
        };

        if let Err(err) = result {
            warn!("{} verification rejected: {}", pending.channel, err);
            let message = err.user_message(VERIFY_FALLBACK);
            session.reject(message.clone());
            return Err(FlowError::VerificationRejected(message));
        }

        session.mark_verified();
        info!("{} verified (session {})", pending.channel, pending.generation);

        if !self.settings.success_delay.is_zero() {
            sleep(self.settings.success_delay).await;
        }

        Ok(pending.channel)
    }

    /// Waits for the next countdown tick. Pending forever while no ticker runs.
    pub async fn next_tick(&mut self) -> Option<Tick> {
        self.tick_rx.recv().await
    }

    /// Applies a tick if it belongs to the active session. Returns whether it did.
    pub fn apply_tick(&mut self, tick: Tick) -> bool {
        match self.session.as_mut() {
            Some(session) if session.id() == tick.generation => {
                if session.tick() {
                    info!(
                        "{} code expired (session {})",
                        session.channel(),
                        session.id()
                    );
                }
                true
            }
            _ => {
                trace!("ignoring stale tick for generation {}", tick.generation);
                false
            }
        }
    }

    /// Applies one tick to the active session, as the countdown would.
    pub fn tick(&mut self) -> bool {
        let generation = self.generation;
        self.apply_tick(Tick { generation })
    }

    /// Requests a new code once the current one has run out.
    ///
    /// # Errors
    ///
    /// Returns `ResendFailed` when the request fails; the session keeps its
    /// expiry and stays resendable.
    pub async fn resend(&mut self) -> Result<ResendOutcome, FlowError> {
        let session = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;

        if !session.resend_available() || session.resend_in_flight() {
            debug!("resend not available for session {}", session.id());
            return Ok(ResendOutcome::Unavailable);
        }

        session.set_resend_in_flight(true);
        let generation = session.id();
        let channel = session.channel();
        let target = session.target().to_string();

        let result = self.api.resend_code(channel, &target).await;

        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.id() == generation)
        else {
            debug!("discarding resend result for replaced session {}", generation);
            return Err(FlowError::Stale);
        };

        match result {
            Ok(()) => {
                info!("{} code resent", channel);
                self.enter(channel, target);
                Ok(ResendOutcome::Sent)
            }
            Err(err) => {
                warn!("{} resend failed: {}", channel, err);
                let message = err.user_message(RESEND_FALLBACK);
                session.fail_resend(message.clone());
                Err(FlowError::ResendFailed(message))
            }
        }
    }
}

fn expiry_from_now(settings: &FlowSettings) -> DateTime<Utc> {
    TimeDelta::from_std(settings.code_ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use anyhow::Result;
    use serde_json::json;
    use std::{net::TcpListener, time::Duration};
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const EMAIL: &str = "jane@x.com";

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn manual_settings() -> FlowSettings {
        FlowSettings {
            success_delay: Duration::ZERO,
            auto_countdown: false,
            ..FlowSettings::default()
        }
    }

    fn controller_for(server: &MockServer) -> Result<VerificationController> {
        let config = ApiConfig::new(&server.uri(), Duration::from_secs(5))?;
        Ok(VerificationController::new(
            ApiClient::new(&config)?,
            manual_settings(),
        ))
    }

    async fn type_code(
        controller: &mut VerificationController,
        code: &str,
    ) -> Result<Option<Channel>, FlowError> {
        let mut outcome = Ok(None);
        for (index, digit) in code.chars().enumerate() {
            outcome = controller.enter_digit(index, &digit.to_string()).await;
        }
        outcome
    }

    async fn mount_verify(server: &MockServer, otp: &str, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/api/users/verify-email"))
            .and(body_json(json!({ "email": EMAIL, "otp": otp })))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn enter_creates_fresh_session() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        let mut controller = controller_for(&server)?;

        let before = Utc::now();
        let session = controller.enter(Channel::Email, EMAIL.to_string());

        assert_eq!(session.id(), 1);
        assert_eq!(session.target(), EMAIL);
        assert_eq!(session.remaining(), 600);
        assert!(!session.resend_available());
        assert!(session.code().is_empty());
        let ttl = session.expires_at() - before;
        assert!(ttl >= TimeDelta::seconds(599) && ttl <= TimeDelta::seconds(601));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_code_clears_slots_and_keeps_expiry() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        mount_verify(
            &server,
            "111111",
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Invalid code" })),
        )
        .await;
        mount_verify(&server, "482913", ResponseTemplate::new(200)).await;

        let mut controller = controller_for(&server)?;
        controller.enter(Channel::Email, EMAIL.to_string());
        let expires_at = controller.session().map(VerificationSession::expires_at);

        for _ in 0..10 {
            controller.tick();
        }
        let err = type_code(&mut controller, "111111").await.unwrap_err();
        assert_eq!(err, FlowError::VerificationRejected("Invalid code".to_string()));

        let session = controller.session().unwrap();
        assert!(session.code().is_empty());
        assert_eq!(session.code().focus(), 0);
        assert_eq!(session.attempts_error(), Some("Invalid code"));
        assert_eq!(session.status(), StageStatus::Rejected);
        assert_eq!(Some(session.expires_at()), expires_at);
        assert_eq!(session.remaining(), 590);

        for _ in 0..10 {
            controller.tick();
        }
        let verified = type_code(&mut controller, "482913").await?;
        assert_eq!(verified, Some(Channel::Email));
        assert_eq!(
            controller.session().map(VerificationSession::status),
            Some(StageStatus::Verified)
        );
        Ok(())
    }

    #[tokio::test]
    async fn rejection_without_message_uses_fallback() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        mount_verify(&server, "222222", ResponseTemplate::new(500)).await;

        let mut controller = controller_for(&server)?;
        controller.enter(Channel::Email, EMAIL.to_string());

        let err = type_code(&mut controller, "222222").await.unwrap_err();
        assert_eq!(
            err,
            FlowError::VerificationRejected(VERIFY_FALLBACK.to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn expired_session_refuses_codes_without_calling_server() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/verify-email"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut controller = controller_for(&server)?;
        controller.enter(Channel::Email, EMAIL.to_string());

        for _ in 0..600 {
            controller.tick();
        }
        let session = controller.session().unwrap();
        assert!(session.resend_available());
        assert_eq!(session.status(), StageStatus::Expired);

        let err = type_code(&mut controller, "123456").await.unwrap_err();
        assert_eq!(err, FlowError::ExpiredCode);
        Ok(())
    }

    #[tokio::test]
    async fn resend_is_noop_while_unavailable() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/resend-email-verification"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut controller = controller_for(&server)?;
        controller.enter(Channel::Email, EMAIL.to_string());
        controller.tick();
        let before = controller.session().cloned().unwrap();

        assert_eq!(controller.resend().await?, ResendOutcome::Unavailable);

        let after = controller.session().unwrap();
        assert_eq!(after.id(), before.id());
        assert_eq!(after.expires_at(), before.expires_at());
        assert_eq!(after.remaining(), before.remaining());
        assert_eq!(after.attempts_error(), None);
        Ok(())
    }

    #[tokio::test]
    async fn resend_after_expiry_resets_session() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/resend-email-verification"))
            .and(body_json(json!({ "email": EMAIL })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut controller = controller_for(&server)?;
        controller.enter(Channel::Email, EMAIL.to_string());
        for _ in 0..600 {
            controller.tick();
        }

        assert_eq!(controller.resend().await?, ResendOutcome::Sent);

        let session = controller.session().unwrap();
        assert_eq!(session.id(), 2);
        assert_eq!(session.remaining(), 600);
        assert!(!session.resend_available());
        assert_eq!(session.attempts_error(), None);
        assert_eq!(session.status(), StageStatus::AwaitingInput);

        // a late tick from the first session must not touch the new one
        assert!(!controller.apply_tick(Tick { generation: 1 }));
        assert_eq!(controller.session().map(VerificationSession::remaining), Some(600));
        Ok(())
    }

    #[tokio::test]
    async fn failed_resend_keeps_window_and_stays_resendable() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/resend-email-verification"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({ "message": "Too many requests" })),
            )
            .expect(2)
            .mount(&server)
            .await;

        let mut controller = controller_for(&server)?;
        controller.enter(Channel::Email, EMAIL.to_string());
        for _ in 0..600 {
            controller.tick();
        }
        let expires_at = controller.session().map(VerificationSession::expires_at);

        let err = controller.resend().await.unwrap_err();
        assert_eq!(err, FlowError::ResendFailed("Too many requests".to_string()));

        let session = controller.session().unwrap();
        assert_eq!(session.id(), 1);
        assert_eq!(Some(session.expires_at()), expires_at);
        assert!(session.resend_available());
        assert!(!session.resend_in_flight());
        assert_eq!(session.attempts_error(), Some("Too many requests"));

        // the user can simply try again
        assert!(controller.resend().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn late_verify_result_is_discarded_after_discard() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        let mut controller = controller_for(&server)?;
        controller.enter(Channel::Email, EMAIL.to_string());

        let pending = controller.begin_verify("123456")?;
        assert_eq!(pending.generation(), 1);
        assert_eq!(
            controller.session().map(VerificationSession::status),
            Some(StageStatus::Submitting)
        );
        assert!(matches!(
            controller.begin_verify("123456"),
            Err(FlowError::Busy)
        ));

        assert_eq!(controller.discard(), Some(Channel::Email));
        controller.enter(Channel::Email, EMAIL.to_string());

        let err = controller.finish_verify(pending, Ok(())).await.unwrap_err();
        assert_eq!(err, FlowError::Stale);
        let session = controller.session().unwrap();
        assert_eq!(session.id(), 2);
        assert_eq!(session.status(), StageStatus::AwaitingInput);
        Ok(())
    }

    #[tokio::test]
    async fn submitting_session_ignores_keystrokes() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        let mut controller = controller_for(&server)?;
        controller.enter(Channel::Phone, "555-123-4567".to_string());

        let _pending = controller.begin_verify("123456")?;
        assert_eq!(controller.enter_digit(0, "9").await?, None);
        controller.backspace(0)?;
        assert!(controller.session().unwrap().code().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn incomplete_codes_are_refused() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        let mut controller = controller_for(&server)?;
        controller.enter(Channel::Email, EMAIL.to_string());

        assert!(matches!(
            controller.begin_verify("12345"),
            Err(FlowError::IncompleteCode)
        ));
        assert!(matches!(
            controller.begin_verify("12a456"),
            Err(FlowError::IncompleteCode)
        ));
        assert_eq!(
            controller.session().map(VerificationSession::status),
            Some(StageStatus::AwaitingInput)
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_task_drives_expiry() {
        let config = ApiConfig::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let settings = FlowSettings {
            code_ttl: Duration::from_secs(3),
            success_delay: Duration::ZERO,
            ..FlowSettings::default()
        };
        let mut controller = VerificationController::new(ApiClient::new(&config).unwrap(), settings);
        controller.enter(Channel::Email, EMAIL.to_string());

        for _ in 0..3 {
            let tick = controller.next_tick().await.unwrap();
            assert!(controller.apply_tick(tick));
        }

        let session = controller.session().unwrap();
        assert!(session.is_expired());
        assert!(session.resend_available());
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_session_ignores_queued_ticks() {
        let config = ApiConfig::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let settings = FlowSettings {
            success_delay: Duration::ZERO,
            ..FlowSettings::default()
        };
        let mut controller = VerificationController::new(ApiClient::new(&config).unwrap(), settings);
        controller.enter(Channel::Email, EMAIL.to_string());

        let first = controller.next_tick().await.unwrap();
        assert_eq!(first.generation, 1);

        controller.enter(Channel::Phone, "555-123-4567".to_string());
        assert!(!controller.apply_tick(first));

        let next = controller.next_tick().await.unwrap();
        assert_eq!(next.generation, 2);
        assert!(controller.apply_tick(next));
        assert_eq!(controller.session().map(VerificationSession::remaining), Some(599));
    }
}

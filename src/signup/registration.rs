//! Registration step: holds the form, validates it locally and creates the
//! account. A field's error disappears as soon as that field is edited again.

use super::{
    best_effort::BestEffort,
    error::{FlowError, SIGNUP_FALLBACK},
    form::{validate, FieldErrors, FormField, RegistrationForm},
};
use crate::api::{mask_target, ApiClient, Channel, SignupRequest};
use secrecy::ExposeSecret;
use tracing::{debug, info, instrument, warn};

/// Contact details collected at signup, verified one after the other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Default)]
pub struct RegistrationStep {
    form: RegistrationForm,
    errors: FieldErrors,
    submit_error: Option<String>,
}

impl RegistrationStep {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn form(&self) -> &RegistrationForm {
        &self.form
    }

    #[must_use]
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Top-level message from the last failed account creation.
    #[must_use]
    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    pub fn edit(&mut self, field: FormField, value: &str) {
        self.form.set(field, value);
        self.errors.remove(field);
        self.submit_error = None;
    }

    /// Validates the form, creates the account and asks for the first email code.
    ///
    /// # Errors
    ///
    /// - `Validation` with every failing field; nothing is sent
    /// - `Submission` when account creation fails; the form is kept as is
    #[instrument(skip_all)]
    pub async fn submit(&mut self, api: &ApiClient) -> Result<Contact, FlowError> {
        self.submit_error = None;

        let errors = validate(&self.form);
        if !errors.is_empty() {
            debug!("registration has {} invalid field(s)", errors.len());
            self.errors = errors.clone();
            return Err(FlowError::Validation(errors));
        }
        self.errors.clear();

        let email = self.form.normalized_email();
        let phone = self.form.phone.trim().to_string();

        let request = SignupRequest {
            first_name: self.form.first_name.trim(),
            last_name: self.form.last_name.trim(),
            email: &email,
            phone: &phone,
            password: self.form.password.expose_secret(),
        };

        match api.signup(&request).await {
            Ok(account) => {
                info!(
                    "account created for {}",
                    mask_target(Channel::Email, &email)
                );
                if let Some(message) = account.message {
                    debug!("signup response: {}", message);
                }
            }
            Err(err) => {
                warn!("account creation failed: {}", err);
                let message = err.user_message(SIGNUP_FALLBACK);
                self.submit_error = Some(message.clone());
                return Err(FlowError::Submission(message));
            }
        }

        self.form.clear_secrets();

        let delivery = BestEffort::run(
            "send email verification",
            api.send_code(Channel::Email, &email),
        )
        .await;
        debug!("email code delivered: {}", delivery.is_delivered());

        Ok(Contact { email, phone })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::SIGNUP_PATH, config::ApiConfig};
    use anyhow::Result;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use std::{net::TcpListener, time::Duration};
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn filled_step() -> RegistrationStep {
        let mut step = RegistrationStep::new();
        step.edit(FormField::FirstName, "Jane");
        step.edit(FormField::LastName, "Doe");
        step.edit(FormField::Email, " Jane@X.com ");
        step.edit(FormField::Phone, "555-123-4567");
        step.edit(FormField::Password, "Abcdef12");
        step.edit(FormField::ConfirmPassword, "Abcdef12");
        step.edit(FormField::AcceptTerms, "true");
        step
    }

    fn client_for(server: &MockServer) -> Result<ApiClient> {
        let config = ApiConfig::new(&server.uri(), Duration::from_secs(5))?;
        Ok(ApiClient::new(&config)?)
    }

    #[tokio::test]
    async fn invalid_form_is_not_sent() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let mut step = filled_step();
        step.edit(FormField::Email, "not-an-email");

        let err = step.submit(&client_for(&server)?).await.unwrap_err();
        let FlowError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.len(), 1);
        assert!(errors.get(FormField::Email).is_some());
        assert_eq!(step.errors(), &errors);
        Ok(())
    }

    #[test]
    fn editing_a_field_clears_only_its_error() {
        let mut step = RegistrationStep::new();
        step.errors = validate(step.form());
        step.submit_error = Some("Signup failed".to_string());
        let before = step.errors().len();

        step.edit(FormField::FirstName, "J");
        assert!(step.errors().get(FormField::FirstName).is_none());
        assert!(step.errors().get(FormField::LastName).is_some());
        assert_eq!(step.errors().len(), before - 1);
        assert_eq!(step.submit_error(), None);
    }

    #[tokio::test]
    async fn server_rejection_sets_submit_error() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNUP_PATH))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({ "message": "Email already registered" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/users/send-email-verification"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut step = filled_step();
        let err = step.submit(&client_for(&server)?).await.unwrap_err();

        assert_eq!(
            err,
            FlowError::Submission("Email already registered".to_string())
        );
        assert_eq!(step.submit_error(), Some("Email already registered"));
        assert!(step.errors().is_empty());
        // the user can retry with the same passwords
        assert_eq!(step.form().password.expose_secret(), "Abcdef12");
        Ok(())
    }

    #[tokio::test]
    async fn success_survives_failed_email_send() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNUP_PATH))
            .and(body_json(json!({
                "firstName": "Jane",
                "lastName": "Doe",
                "email": "jane@x.com",
                "phone": "555-123-4567",
                "password": "Abcdef12"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "user": { "id": 7 } })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/users/send-email-verification"))
            .and(body_json(json!({ "email": "jane@x.com" })))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let mut step = filled_step();
        let contact = step.submit(&client_for(&server)?).await?;

        assert_eq!(
            contact,
            Contact {
                email: "jane@x.com".to_string(),
                phone: "555-123-4567".to_string(),
            }
        );
        assert_eq!(step.form().password.expose_secret(), "");
        assert_eq!(step.form().first_name, "Jane");
        Ok(())
    }
}

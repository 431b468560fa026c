//! Registration form model and its pure validator. Validation never touches the
//! network; it only reports which fields need attention and why.

use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

pub const MIN_NAME_LENGTH: usize = 2;
pub const MIN_PHONE_DIGITS: usize = 10;
pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    FirstName,
    LastName,
    Email,
    Phone,
    Password,
    ConfirmPassword,
    AcceptTerms,
}

impl FormField {
    pub const ALL: [FormField; 7] = [
        FormField::FirstName,
        FormField::LastName,
        FormField::Email,
        FormField::Phone,
        FormField::Password,
        FormField::ConfirmPassword,
        FormField::AcceptTerms,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Password => "password",
            Self::ConfirmPassword => "confirmPassword",
            Self::AcceptTerms => "acceptTerms",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::Password => "Password",
            Self::ConfirmPassword => "Confirm password",
            Self::AcceptTerms => "Accept terms",
        }
    }

    #[must_use]
    pub fn is_secret(self) -> bool {
        matches!(self, Self::Password | Self::ConfirmPassword)
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-scoped validation messages, at most one per field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<FormField, String>);

impl FieldErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, field: FormField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn insert(&mut self, field: FormField, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn remove(&mut self, field: FormField) -> Option<String> {
        self.0.remove(&field)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (FormField, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub accept_terms: bool,
}

impl Default for RegistrationForm {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            password: empty_secret(),
            confirm_password: empty_secret(),
            accept_terms: false,
        }
    }
}

impl RegistrationForm {
    /// Writes one field from raw text input. `acceptTerms` understands
    /// `true/yes/y/1` and treats anything else as not accepted.
    pub fn set(&mut self, field: FormField, value: &str) {
        match field {
            FormField::FirstName => self.first_name = value.to_string(),
            FormField::LastName => self.last_name = value.to_string(),
            FormField::Email => self.email = value.to_string(),
            FormField::Phone => self.phone = value.to_string(),
            FormField::Password => self.password = SecretString::from(value.to_string()),
            FormField::ConfirmPassword => {
                self.confirm_password = SecretString::from(value.to_string());
            }
            FormField::AcceptTerms => {
                self.accept_terms = matches!(
                    value.trim().to_lowercase().as_str(),
                    "true" | "yes" | "y" | "1"
                );
            }
        }
    }

    /// Email as it is sent to the API.
    #[must_use]
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }

    /// Drops both password values once they are no longer needed.
    pub fn clear_secrets(&mut self) {
        self.password = empty_secret();
        self.confirm_password = empty_secret();
    }
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"[REDACTED]")
            .field("confirm_password", &"[REDACTED]")
            .field("accept_terms", &self.accept_terms)
            .finish()
    }
}

/// Checks every field and returns one message per failing field.
#[must_use]
pub fn validate(form: &RegistrationForm) -> FieldErrors {
    let mut errors = FieldErrors::default();

    if let Some(message) = validate_name(FormField::FirstName, &form.first_name) {
        errors.insert(FormField::FirstName, message);
    }

    if let Some(message) = validate_name(FormField::LastName, &form.last_name) {
        errors.insert(FormField::LastName, message);
    }

    let email = form.email.trim();
    if email.is_empty() {
        errors.insert(FormField::Email, "Email is required");
    } else if !valid_email(email) {
        errors.insert(FormField::Email, "Please enter a valid email address");
    }

    if form.phone.trim().is_empty() {
        errors.insert(FormField::Phone, "Phone number is required");
    } else if phone_digits(&form.phone) < MIN_PHONE_DIGITS {
        errors.insert(FormField::Phone, "Please enter a valid phone number");
    }

    let password = form.password.expose_secret();
    if let Some(message) = validate_password(password) {
        errors.insert(FormField::Password, message);
    }

    if form.confirm_password.expose_secret() != password {
        errors.insert(FormField::ConfirmPassword, "Passwords do not match");
    }

    if !form.accept_terms {
        errors.insert(
            FormField::AcceptTerms,
            "You must accept the terms and conditions",
        );
    }

    errors
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email))
}

#[must_use]
pub fn phone_digits(phone: &str) -> usize {
    phone.chars().filter(char::is_ascii_digit).count()
}

fn validate_name(field: FormField, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        Some(format!("{} is required", field.label()))
    } else if value.chars().count() < MIN_NAME_LENGTH {
        Some(format!(
            "{} must be at least {MIN_NAME_LENGTH} characters",
            field.label()
        ))
    } else {
        None
    }
}

fn validate_password(password: &str) -> Option<String> {
    if password.is_empty() {
        return Some("Password is required".to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Some(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }

    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_upper && has_lower && has_digit {
        None
    } else {
        Some("Password must contain uppercase, lowercase, and a number".to_string())
    }
}

use crate::i18n::MessageKey;
use crate::models::{ContactForm, ContactMethod};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Minimum number of digits a phone number must contain.
pub const MIN_PHONE_DIGITS: usize = 6;

/// Required contact form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormField {
    Name,
    Email,
    Phone,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::Email => "email",
            FormField::Phone => "phone",
        }
    }

    pub fn error_key(&self) -> MessageKey {
        match self {
            FormField::Name => MessageKey::ErrorName,
            FormField::Email => MessageKey::ErrorEmail,
            FormField::Phone => MessageKey::ErrorPhone,
        }
    }
}

/// Fields that failed validation, in form order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub fields: Vec<FormField>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields.iter().map(FormField::as_str).collect();
        write!(f, "Invalid fields: {}", names.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Contact details after trimming and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidContact {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub preferred_contact_method: ContactMethod,
    pub message: Option<String>,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

/// Validate email address: something@domain.tld, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email.trim())
}

/// Validate phone number: non-empty with at least six digits, any formatting.
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    !phone.is_empty() && phone.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS
}

/// Validates the contact form. Every failing field is reported, not just the
/// first.
pub fn validate_contact(form: &ContactForm) -> Result<ValidContact, ValidationErrors> {
    let mut fields = Vec::new();

    let name = form.name.trim();
    if name.is_empty() {
        fields.push(FormField::Name);
    }

    let email = form.email.trim();
    if !is_valid_email(email) {
        fields.push(FormField::Email);
    }

    let phone = form.phone.trim();
    if !is_valid_phone(phone) {
        fields.push(FormField::Phone);
    }

    if !fields.is_empty() {
        tracing::debug!("Contact form rejected: {:?}", fields);
        return Err(ValidationErrors { fields });
    }

    let message = form
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    Ok(ValidContact {
        name: name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        preferred_contact_method: form.preferred_contact_method,
        message,
    })
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the site is published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Macedonian (site default).
    #[default]
    Mk,
    /// English.
    En,
    /// Albanian.
    Sq,
}

impl Language {
    /// Order in which attribute labels are looked up when the current
    /// language has no label of its own.
    pub const LABEL_FALLBACK: [Language; 3] = [Language::Mk, Language::Sq, Language::En];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Mk => "mk",
            Language::En => "en",
            Language::Sq => "sq",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mk" => Ok(Language::Mk),
            "en" => Ok(Language::En),
            "sq" => Ok(Language::Sq),
            other => Err(format!("Unsupported language '{}'", other)),
        }
    }
}

/// Lead-form strings shown to the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    Submit,
    Submitting,
    ApartmentLabel,
    ErrorName,
    ErrorEmail,
    ErrorPhone,
    Success,
    ErrorGeneral,
    ErrorConfig,
    ErrorTimeout,
    ErrorRequiredFields,
    ErrorPermission,
    ErrorInFlight,
}

/// Looks up a lead-form string.
pub fn t(language: Language, key: MessageKey) -> &'static str {
    use MessageKey::*;

    match language {
        Language::Mk => match key {
            Submit => "Испрати барање",
            Submitting => "Се испраќа...",
            ApartmentLabel => "Стан:",
            ErrorName => "Ве молиме внесете го вашето име",
            ErrorEmail => "Ве молиме внесете валидна емаил адреса",
            ErrorPhone => "Ве молиме внесете валиден телефонски број",
            Success => "Вашето барање е успешно испратено! Наш тим ќе ве контактира наскоро.",
            ErrorGeneral => "Се случи грешка. Ве молиме обидете се повторно или контактирајте не директно.",
            ErrorConfig => "Системот не е правилно конфигуриран. Ве молиме контактирајте не директно.",
            ErrorTimeout => "Барањето истече. Ве молиме проверете ја вашата интернет врска и обидете се повторно.",
            ErrorRequiredFields => "Ве молиме пополнете ги сите задолжителни полиња (име, емаил, телефон).",
            ErrorPermission => "Грешка во конфигурацијата на базата. Ве молиме контактирајте ја поддршката.",
            ErrorInFlight => "Вашето барање веќе се испраќа.",
        },
        Language::En => match key {
            Submit => "Submit Request",
            Submitting => "Submitting...",
            ApartmentLabel => "Apartment:",
            ErrorName => "Please enter your name",
            ErrorEmail => "Please enter a valid email address",
            ErrorPhone => "Please enter a valid phone number",
            Success => "Your request has been submitted successfully! Our team will contact you soon.",
            ErrorGeneral => "An error occurred. Please try again or contact us directly.",
            ErrorConfig => "System is not properly configured. Please contact us directly.",
            ErrorTimeout => "Request timed out. Please check your internet connection and try again.",
            ErrorRequiredFields => "Please fill in all required fields (name, email, phone).",
            ErrorPermission => "Database configuration error. Please contact support.",
            ErrorInFlight => "Your request is already being submitted.",
        },
        Language::Sq => match key {
            Submit => "Dërgo Kërkesën",
            Submitting => "Duke dërguar...",
            ApartmentLabel => "Apartamenti:",
            ErrorName => "Ju lutemi vendosni emrin tuaj",
            ErrorEmail => "Ju lutemi vendosni një adresë emaili të vlefshme",
            ErrorPhone => "Ju lutemi vendosni një numër telefoni të vlefshëm",
            Success => "Kërkesa juaj u dërgua me sukses! Ekipi ynë do t'ju kontaktojë së shpejti.",
            ErrorGeneral => "Ndodhi një gabim. Ju lutemi provoni përsëri ose na kontaktoni drejtpërdrejt.",
            ErrorConfig => "Sistemi nuk është konfiguruar siç duhet. Ju lutemi na kontaktoni drejtpërdrejt.",
            ErrorTimeout => "Kërkesa skadoi. Ju lutemi kontrolloni lidhjen tuaj të internetit dhe provoni përsëri.",
            ErrorRequiredFields => "Ju lutemi plotësoni të gjitha fushat e detyrueshme (emri, emaili, telefoni).",
            ErrorPermission => "Gabim në konfigurimin e bazës së të dhënave. Ju lutemi kontaktoni mbështetjen.",
            ErrorInFlight => "Kërkesa juaj po dërgohet tashmë.",
        },
    }
}

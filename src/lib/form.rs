//! Client-side checks for the registration and top-up forms.
//!
//! The `check_*` functions are pure. The `validate_*` functions look the form
//! up on the page, run the check and show the first failure as an error
//! banner. A page without the form passes, which lets one client script run
//! on every page.
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::{
    notify::Notifier,
    page::{Form, Page, REGISTRATION_FORM, TOPUP_FORM},
};

static USN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Z]{10}$").unwrap());
static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").unwrap());
static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Longest leading float literal, the way a browser's `parseFloat` reads it.
static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)").unwrap()
});

pub const MIN_PASSWORD_LEN: usize = 6;

/// The first failed check. The display text is what the user sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("USN should be 10 characters, alphanumeric format.")]
    Usn,
    #[error("Password should be at least 6 characters.")]
    PasswordTooShort,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Please enter a valid 10-digit phone number.")]
    Phone,
    #[error("Please enter a valid email address.")]
    Email,
    #[error("Please enter a valid amount greater than 0.")]
    Amount,
}

/// Runs the registration checks in order and stops at the first failure.
pub fn check_registration(form: &Form) -> Result<(), ValidationError> {
    check_registration_fields(
        form.value("usn").trim(),
        form.value("password"),
        form.value("confirm_password"),
        form.value("phone").trim(),
        form.value("email").trim(),
    )
}

pub fn check_registration_fields(
    usn: &str,
    password: &str,
    confirm_password: &str,
    phone: &str,
    email: &str,
) -> Result<(), ValidationError> {
    if !USN.is_match(usn) {
        return Err(ValidationError::Usn);
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }

    if password != confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }

    if !PHONE.is_match(phone) {
        return Err(ValidationError::Phone);
    }

    if !EMAIL.is_match(email) {
        return Err(ValidationError::Email);
    }

    Ok(())
}

/// Checks the top-up amount and returns it.
pub fn check_topup(form: &Form) -> Result<f64, ValidationError> {
    match parse_float(form.value("amount")) {
        Some(amount) if amount > 0.0 => Ok(amount),
        _ => Err(ValidationError::Amount),
    }
}

/// Parses the leading float of `input`, ignoring anything after it.
/// Returns `None` when there is no number at the start.
pub fn parse_float(input: &str) -> Option<f64> {
    let literal = FLOAT_PREFIX.find(input.trim_start())?;

    literal.as_str().parse::<f64>().ok().filter(|v| !v.is_nan())
}

pub fn validate_registration_form(page: &dyn Page, notifier: &Notifier) -> bool {
    validate(page, notifier, REGISTRATION_FORM, check_registration)
}

pub fn validate_topup_form(page: &dyn Page, notifier: &Notifier) -> bool {
    validate(page, notifier, TOPUP_FORM, |form| check_topup(form).map(|_| ()))
}

fn validate<F>(page: &dyn Page, notifier: &Notifier, form_id: &str, check: F) -> bool
where
    F: FnOnce(&Form) -> Result<(), ValidationError>,
{
    let Some(form) = page.form(form_id) else {
        debug!("no {form_id:?} on this page, nothing to validate");
        return true;
    };

    match check(&form) {
        Ok(()) => true,
        Err(err) => {
            debug!("{form_id:?} rejected: {err:?}");
            notifier.error(&err.to_string());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{notify::NotificationKind, page::MemoryPage};

    fn registration() -> Form {
        Form::new()
            .with("usn", "4NM21CS042")
            .with("name", "Asha Rao")
            .with("password", "secret1")
            .with("confirm_password", "secret1")
            .with("phone", "9876543210")
            .with("email", "user@example.com")
    }

    #[test]
    fn valid_registration_passes() {
        assert_eq!(check_registration(&registration()), Ok(()));
    }

    #[test]
    fn usn_must_be_ten_uppercase_alphanumerics() {
        for usn in ["4NM21CS04", "4NM21CS0421", "4nm21cs042", "4NM21CS04!", "4NM21 CS04", ""] {
            let form = registration().with("usn", usn);
            assert_eq!(check_registration(&form), Err(ValidationError::Usn), "{usn:?}");
        }

        for usn in ["ABCDEFGHIJ", "0123456789", "1RV20EC999"] {
            let form = registration().with("usn", usn);
            assert_eq!(check_registration(&form), Ok(()), "{usn:?}");
        }
    }

    #[test]
    fn usn_is_trimmed() {
        let form = registration().with("usn", "  4NM21CS042 ");

        assert_eq!(check_registration(&form), Ok(()));
    }

    #[test]
    fn short_password_rejects_regardless_of_other_fields() {
        let form = registration()
            .with("password", "abc")
            .with("confirm_password", "different")
            .with("phone", "12")
            .with("email", "nope");

        assert_eq!(
            check_registration(&form),
            Err(ValidationError::PasswordTooShort)
        );
    }

    #[test]
    fn mismatched_confirmation_rejects() {
        let form = registration()
            .with("password", "longenough")
            .with("confirm_password", "longenough ");

        assert_eq!(
            check_registration(&form),
            Err(ValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn phone_must_be_ten_digits() {
        for phone in ["12345", "12345678901", "98765x3210", "+919876543"] {
            let form = registration().with("phone", phone);
            assert_eq!(check_registration(&form), Err(ValidationError::Phone), "{phone:?}");
        }

        let form = registration().with("phone", "1234567890");
        assert_eq!(check_registration(&form), Ok(()));
    }

    #[test]
    fn email_needs_at_sign_and_domain_dot() {
        for email in ["userexample.com", "user@example", "us er@example.com", "@example.com"] {
            let form = registration().with("email", email);
            assert_eq!(check_registration(&form), Err(ValidationError::Email), "{email:?}");
        }
    }

    #[test]
    fn topup_amounts() {
        for amount in ["0", "-5", "abc", "", "NaN", "-0.01"] {
            let form = Form::new().with("amount", amount);
            assert_eq!(check_topup(&form), Err(ValidationError::Amount), "{amount:?}");
        }

        let form = Form::new().with("amount", "10.50");
        assert_eq!(check_topup(&form), Ok(10.5));
    }

    #[test]
    fn parse_float_reads_leading_number() {
        assert_eq!(parse_float(" 12.5rupees"), Some(12.5));
        assert_eq!(parse_float(".5"), Some(0.5));
        assert_eq!(parse_float("1e3"), Some(1000.0));
        assert_eq!(parse_float("1e"), Some(1.0));
        assert_eq!(parse_float("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_float("rupees 12"), None);
    }

    #[tokio::test]
    async fn missing_form_passes() {
        let page = Arc::new(MemoryPage::new());
        let notifier = Notifier::new(page.clone());

        assert!(validate_registration_form(page.as_ref(), &notifier));
        assert!(validate_topup_form(page.as_ref(), &notifier));
        assert!(page.banners().is_empty());
    }

    #[tokio::test]
    async fn failed_validation_shows_one_error_banner() {
        let form = registration().with("phone", "12345");
        let page = Arc::new(MemoryPage::new().with_form(REGISTRATION_FORM, form));
        let notifier = Notifier::new(page.clone());

        assert!(!validate_registration_form(page.as_ref(), &notifier));

        let banners = page.banners();
        assert_eq!(banners.len(), 1);
        assert_eq!(banners[0].kind, NotificationKind::Error);
        assert_eq!(
            banners[0].message,
            "Please enter a valid 10-digit phone number."
        );
    }

    #[tokio::test]
    async fn passing_topup_shows_nothing() {
        let form = Form::new().with("amount", "250");
        let page = Arc::new(MemoryPage::new().with_form(TOPUP_FORM, form));
        let notifier = Notifier::new(page.clone());

        assert!(validate_topup_form(page.as_ref(), &notifier));
        assert!(page.banners().is_empty());
    }
}

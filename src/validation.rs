//! Field-level request validation.
//!
//! Handlers collect every problem with a request body into a
//! [`ValidationErrors`] map before touching the database, so a client gets all
//! of its mistakes back in a single 400 response.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Converts the collected errors into a `Result`, `Ok` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Records a missing required value and hands back the value when present.
    pub fn required<'a, T>(&mut self, field: &str, value: &'a Option<T>) -> Option<&'a T> {
        if value.is_none() {
            self.add(field, format!("The {} field is required.", field));
        }
        value.as_ref()
    }

    /// Checks the trimmed character length of a string.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.add(
                field,
                format!(
                    "The field {} must be a string with a minimum length of {} and a maximum length of {}.",
                    field, min, max
                ),
            );
        }
    }

    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            self.add(
                field,
                format!("The field {} must be between {} and {}.", field, min, max),
            );
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !is_email(value) {
            self.add(
                field,
                format!("The {} field is not a valid e-mail address.", field),
            );
        }
    }

    pub fn phone(&mut self, field: &str, value: &str) {
        if !is_phone(value) {
            self.add(
                field,
                format!("The {} field is not a valid phone number.", field),
            );
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn is_phone(value: &str) -> bool {
    let allowed = |c: char| c.is_ascii_digit() || " -().+".contains(c);
    let digits = value.chars().filter(char::is_ascii_digit).count();

    value.chars().all(allowed) && (7..=15).contains(&digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_records_missing_field() {
        let mut errors = ValidationErrors::new();
        let present: Option<i32> = Some(1);
        let missing: Option<i32> = None;

        assert_eq!(errors.required("present", &present), Some(&1));
        assert_eq!(errors.required("missing", &missing), None);

        assert!(errors.messages("present").is_empty());
        assert_eq!(errors.messages("missing").len(), 1);
    }

    #[test]
    fn test_length_uses_trimmed_value() {
        let mut errors = ValidationErrors::new();
        errors.length("name", "   ", 1, 256);
        errors.length("address", "12 Main St", 5, 256);

        assert_eq!(errors.messages("name").len(), 1);
        assert!(errors.messages("address").is_empty());
    }

    #[test]
    fn test_email_and_phone() {
        assert!(is_email("vet@example.org"));
        assert!(!is_email("vet@example"));
        assert!(!is_email("vet example@x.org"));
        assert!(!is_email("@example.org"));

        assert!(is_phone("(563) 555-0134"));
        assert!(is_phone("+1 563.555.0134"));
        assert!(!is_phone("555"));
        assert!(!is_phone("call me"));
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.range("cardNumber", 42, 1000, 9999);
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.to_string(), "invalid fields: cardNumber");
    }
}
